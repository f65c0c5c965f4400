//! # Coordinator
//!
//! Opens database handles on behalf of many concurrent callers.
//!
//! ## Open flow
//!
//! ```text
//! open(request)
//!   │
//!   ├─ registry.lookup_or_create ──→ join pending open, or start one:
//!   │                                 engine.open(version, upgrade hook, blocked hook)
//!   ├─ await shared outcome
//!   │
//!   └─ negotiation::decide(request, connection)
//!        Reuse                 → return
//!        ReopenForVersion      → invalidate generation, loop
//!        ReopenForCollections  → pin version = current + 1, invalidate, loop
//!        conflict / unconverged → error
//! ```
//!
//! ## Side effect
//!
//! Asking for collections without a version upgrades the database to
//! `current + 1` when any are missing. Other coordinators on the same
//! engine get a version-change signal and drop their handles.

use super::connection::Connection;
use super::registry::{ConnectionRegistry, PendingOpen, WeakRegistry};
use crate::deferred;
use crate::domain::config::CoordinatorConfig;
use crate::domain::errors::{EngineError, OpenError};
use crate::domain::negotiation::{decide, Decision, Observed, Rounds};
use crate::domain::types::{CollectionName, DatabaseName, OpenRequest, SchemaVersion};
use crate::ports::outbound::{
    BlockedEvent, EngineConnection, OpenCall, StorageEngine, UpgradeHook, UpgradeScope,
    VersionChangeEvent, VersionChangeHandler,
};
use futures::FutureExt;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use vkv_bus::{
    ConnectionEvent, ConnectionEventKind, EventFilter, EventPublisher, InMemoryEventBus,
    InvalidationReason, Subscription,
};

struct CoordinatorInner {
    id: Uuid,
    engine: Arc<dyn StorageEngine>,
    registry: ConnectionRegistry,
    bus: Arc<InMemoryEventBus>,
}

/// Deduplicating, version-negotiating front end to a `StorageEngine`.
///
/// Cheap to clone. Clones share one registry and one event bus.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<CoordinatorInner>,
}

impl Coordinator {
    pub fn new(engine: Arc<dyn StorageEngine>) -> Self {
        Self::with_config(engine, CoordinatorConfig::default())
    }

    pub fn with_config(engine: Arc<dyn StorageEngine>, config: CoordinatorConfig) -> Self {
        let id = Uuid::new_v4();
        let bus = Arc::new(InMemoryEventBus::with_capacity(config.event_capacity));
        let registry = ConnectionRegistry::new(id, bus.clone());

        debug!(coordinator = %id, event_capacity = config.event_capacity, "coordinator created");

        Self {
            inner: Arc::new(CoordinatorInner {
                id,
                engine,
                registry,
                bus,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn engine(&self) -> &Arc<dyn StorageEngine> {
        &self.inner.engine
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.inner.bus
    }

    /// Subscribe to lifecycle events from this coordinator.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.inner.bus.subscribe(filter)
    }

    /// Resolve a handle satisfying `request`.
    ///
    /// Concurrent calls for one database share a single engine open. A
    /// registered handle that was closed is replaced once.
    pub async fn open(&self, request: OpenRequest) -> Result<Connection, OpenError> {
        let mut request = request;
        let mut rounds = Rounds::default();
        let mut replaced_closed = false;

        loop {
            let pending = self.pending_open(&request);
            let connection = pending.future.clone().await?;

            if connection.is_closed() && !replaced_closed {
                debug!(
                    database = %request.database,
                    connection_id = connection.id(),
                    "registered connection was closed, reopening"
                );
                replaced_closed = true;
                self.inner.registry.invalidate_generation(
                    &request.database,
                    pending.generation,
                    InvalidationReason::Closed,
                );
                continue;
            }

            let collections = connection.collection_names();
            let decision = decide(
                &request,
                Observed {
                    version: connection.version(),
                    collections: &collections,
                },
                rounds,
            );

            match &decision {
                Decision::Reuse => {
                    debug!(
                        database = %request.database,
                        version = %connection.version(),
                        connection_id = connection.id(),
                        "connection ready"
                    );
                    return Ok(connection);
                }
                Decision::ReopenForVersion => {
                    debug!(
                        database = %request.database,
                        have = %connection.version(),
                        want = ?request.version.map(SchemaVersion::get),
                        "connection behind requested version, reopening"
                    );
                    self.inner.registry.invalidate_generation(
                        &request.database,
                        pending.generation,
                        InvalidationReason::VersionBehind,
                    );
                }
                Decision::ReopenForCollections { next_version } => {
                    info!(
                        database = %request.database,
                        from = %connection.version(),
                        to = %next_version,
                        missing = ?request.missing_from(&collections),
                        "collections missing, upgrading"
                    );
                    request.version = Some(*next_version);
                    self.inner.registry.invalidate_generation(
                        &request.database,
                        pending.generation,
                        InvalidationReason::MissingCollections,
                    );
                }
                Decision::ConflictVersion {
                    requested,
                    existing,
                } => {
                    warn!(
                        database = %request.database,
                        requested = %requested,
                        existing = %existing,
                        "open version conflict"
                    );
                    return Err(OpenError::VersionConflict {
                        requested: requested.get(),
                        existing: existing.get(),
                    });
                }
                Decision::Unconverged { requested, reached } => {
                    warn!(
                        database = %request.database,
                        requested = %requested,
                        reached = %reached,
                        "version negotiation did not converge"
                    );
                    return Err(OpenError::Unconverged {
                        requested: requested.get(),
                        reached: reached.get(),
                    });
                }
                Decision::ConflictSchema { version, missing } => {
                    warn!(
                        database = %request.database,
                        version = %version,
                        ?missing,
                        "requested collections absent at pinned version"
                    );
                    return Err(OpenError::SchemaMismatch {
                        version: *version,
                        missing: missing.clone(),
                    });
                }
            }

            rounds.record(&decision);
        }
    }

    /// Open `database` at exactly `version` with `collections` present.
    ///
    /// Creates missing collections when the database is below `version`.
    /// Fails with `VersionConflict` when it is above, and `SchemaMismatch`
    /// when it is at `version` but lacks a collection.
    pub async fn check_version<I, C>(
        &self,
        database: impl Into<DatabaseName>,
        version: u64,
        collections: I,
    ) -> Result<Connection, OpenError>
    where
        I: IntoIterator<Item = C>,
        C: Into<CollectionName>,
    {
        let version =
            SchemaVersion::new(version).ok_or(OpenError::InvalidVersion { requested: version })?;
        let request = OpenRequest::new(database)
            .with_version(version)
            .with_collections(collections);
        self.open(request).await
    }

    /// Forget the registered handle for `database`. The next open starts over.
    pub fn invalidate(&self, database: &DatabaseName) -> Option<u64> {
        self.inner
            .registry
            .invalidate(database, InvalidationReason::Explicit)
    }

    /// Close this coordinator's handle and delete `database` from the engine.
    pub async fn delete_database(
        &self,
        database: impl Into<DatabaseName>,
    ) -> Result<(), OpenError> {
        let database = database.into();

        let generation = self
            .inner
            .registry
            .invalidate(&database, InvalidationReason::Explicit);
        debug!(database = %database, ?generation, "deleting database");

        self.inner
            .engine
            .delete_database(&database)
            .await
            .map_err(|err| OpenError::from_engine(&database, err))?;

        info!(database = %database, "database deleted");
        Ok(())
    }

    /// Databases the engine knows about.
    pub fn databases(&self) -> Vec<(DatabaseName, SchemaVersion)> {
        self.inner.engine.databases()
    }

    fn pending_open(&self, request: &OpenRequest) -> PendingOpen {
        let engine = self.inner.engine.clone();
        let bus = self.inner.bus.clone();
        let coordinator = self.inner.id;
        let registry = self.inner.registry.downgrade();
        let database = request.database.clone();
        let version = request.version;
        let collections = request.collections.clone();

        self.inner
            .registry
            .lookup_or_create(&request.database, move |generation| {
                async move {
                    publish(
                        &bus,
                        coordinator,
                        &database,
                        ConnectionEventKind::OpenStarted {
                            generation,
                            requested_version: version.map(SchemaVersion::get),
                        },
                    );

                    let (settler, outcome) = deferred::pair::<Arc<dyn EngineConnection>>();
                    let rejector = settler.rejector();

                    let mut call = OpenCall::new(database.clone(), version);
                    call.on_upgrade = collections.map(create_missing);
                    call.on_version_change = Some(version_change_handler(
                        generation,
                        registry,
                        bus.clone(),
                        coordinator,
                    ));
                    call.on_blocked = Some(Box::new(move |event: BlockedEvent| {
                        warn!(
                            database = %event.database,
                            old_version = event.old_version,
                            new_version = %event.new_version,
                            stale_connections = event.stale_connections,
                            "open blocked by connections that did not close"
                        );
                        rejector.reject(EngineError::Blocked {
                            database: event.database.to_string(),
                            stale_connections: event.stale_connections,
                        });
                    }));

                    engine.open(call, settler);

                    match outcome.await {
                        Ok(raw) => {
                            let connection = Connection::new(raw, generation);
                            publish(
                                &bus,
                                coordinator,
                                &database,
                                ConnectionEventKind::Opened {
                                    generation,
                                    connection_id: connection.id(),
                                    version: connection.version().get(),
                                },
                            );
                            Ok(connection)
                        }
                        Err(err) => {
                            debug!(database = %database, generation, error = %err, "engine open failed");
                            publish(
                                &bus,
                                coordinator,
                                &database,
                                ConnectionEventKind::OpenFailed {
                                    generation,
                                    reason: err.to_string(),
                                },
                            );
                            Err(OpenError::from_engine(&database, err))
                        }
                    }
                }
                .boxed()
            })
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("id", &self.inner.id)
            .field("registered", &self.inner.registry.len())
            .finish()
    }
}

fn publish(
    bus: &InMemoryEventBus,
    coordinator: Uuid,
    database: &DatabaseName,
    kind: ConnectionEventKind,
) {
    bus.publish(ConnectionEvent::new(coordinator, database.as_str(), kind));
}

/// Upgrade hook creating every collection in `required` that does not exist.
fn create_missing(required: BTreeSet<CollectionName>) -> UpgradeHook {
    Box::new(move |scope: &mut dyn UpgradeScope| {
        for name in &required {
            if !scope.contains(name) {
                scope.create_collection(name)?;
            }
        }
        Ok(())
    })
}

/// On version change: close the connection and drop its registry entry, so
/// the upgrading opener is not blocked and the next caller reopens.
///
/// Travels with the open call, so it is live before the open resolves.
fn version_change_handler(
    generation: u64,
    registry: WeakRegistry,
    bus: Arc<InMemoryEventBus>,
    coordinator: Uuid,
) -> VersionChangeHandler {
    Arc::new(move |connection: &dyn EngineConnection, event: VersionChangeEvent| {
        info!(
            database = %event.database,
            connection_id = event.connection_id,
            old_version = %event.old_version,
            new_version = ?event.new_version.map(SchemaVersion::get),
            "version change requested, closing connection"
        );
        publish(
            &bus,
            coordinator,
            &event.database,
            ConnectionEventKind::VersionChange {
                connection_id: event.connection_id,
                old_version: event.old_version.get(),
                new_version: event.new_version.map(SchemaVersion::get),
            },
        );

        connection.close();
        publish(
            &bus,
            coordinator,
            &event.database,
            ConnectionEventKind::Closed {
                connection_id: event.connection_id,
            },
        );

        if let Some(registry) = registry.upgrade() {
            registry.invalidate_generation(
                &event.database,
                generation,
                InvalidationReason::VersionChange,
            );
        }
    })
}
