//! # Integration Scenarios
//!
//! Every scenario runs real coordinators against a shared `InMemoryEngine`.

mod key_value;
mod multi_coordinator;
mod open_negotiation;
mod persistence;

use std::sync::Arc;
use std::time::Duration;
use vkv_store::{Coordinator, CoordinatorConfig, InMemoryEngine};

/// Grace period short enough to keep blocked scenarios fast.
pub const TEST_GRACE: Duration = Duration::from_millis(25);

/// One engine and `n` independent coordinators on top of it.
pub fn engine_with_coordinators(n: usize) -> (InMemoryEngine, Vec<Coordinator>) {
    vkv_telemetry::init_test_tracing();

    let config = CoordinatorConfig::default().with_blocked_grace(TEST_GRACE);
    let engine = InMemoryEngine::with_config(&config);
    let coordinators = (0..n)
        .map(|_| Coordinator::with_config(Arc::new(engine.clone()), config.clone()))
        .collect();
    (engine, coordinators)
}
