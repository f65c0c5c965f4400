//! Test helpers.
//!
//! Enable with the `test-utils` feature flag.

use crate::adapters::memory::InMemoryEngine;
use crate::deferred;
use crate::domain::config::CoordinatorConfig;
use crate::domain::errors::EngineError;
use crate::domain::types::{CollectionName, DatabaseName, SchemaVersion};
use crate::ports::outbound::{EngineConnection, OpenCall, StorageEngine, UpgradeScope};
use crate::service::coordinator::Coordinator;
use std::sync::Arc;
use std::time::Duration;

/// Open `database` straight through the engine, bypassing any coordinator.
///
/// Creates the named collections that are missing when an upgrade runs.
/// The returned connection has no version-change handler, so it blocks
/// upgrades until closed.
pub async fn open_raw(
    engine: &InMemoryEngine,
    database: &str,
    version: Option<u64>,
    collections: &[&str],
) -> Result<Arc<dyn EngineConnection>, EngineError> {
    let (settler, deferred) = deferred::pair();
    let mut call = OpenCall::new(
        DatabaseName::from(database),
        version.and_then(SchemaVersion::new),
    );

    if !collections.is_empty() {
        let names: Vec<CollectionName> = collections.iter().map(|c| (*c).into()).collect();
        call.on_upgrade = Some(Box::new(move |scope: &mut dyn UpgradeScope| {
            for name in &names {
                if !scope.contains(name) {
                    scope.create_collection(name)?;
                }
            }
            Ok(())
        }));
    }

    engine.open(call, settler);
    deferred.await
}

/// Engine and coordinator sharing a short blocked grace period.
pub fn coordinator_with_engine() -> (InMemoryEngine, Coordinator) {
    let config = CoordinatorConfig::default().with_blocked_grace(Duration::from_millis(20));
    let engine = InMemoryEngine::with_config(&config);
    let coordinator = Coordinator::with_config(Arc::new(engine.clone()), config);
    (engine, coordinator)
}
