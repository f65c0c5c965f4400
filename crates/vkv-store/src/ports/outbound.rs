//! # Outbound Ports (Driven Ports)
//!
//! The storage engine boundary. Everything the coordinator needs from an
//! embedded database lives behind these traits.
//!
//! Production engines settle requests from their own threads or tasks;
//! the coordinator only sees `Deferred` futures.
//!
//! Testing: `InMemoryEngine` (adapters/memory.rs)

use crate::deferred::{Deferred, Settler};
use crate::domain::errors::EngineError;
use crate::domain::types::{
    CollectionName, DatabaseName, Key, SchemaVersion, TransactionMode, Value,
};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Runs inside the engine's upgrade step with write access to the schema.
///
/// Returning an error aborts the upgrade; the stored schema stays as it was.
pub type UpgradeHook = Box<dyn FnOnce(&mut dyn UpgradeScope) -> Result<(), EngineError> + Send>;

/// Fired when an upgrade has to wait on connections that did not close.
pub type BlockedHook = Box<dyn FnOnce(BlockedEvent) + Send>;

/// Fired on an open connection when another open wants a newer version
/// (or wants the database deleted). Receives the connection it fired on.
pub type VersionChangeHandler =
    Arc<dyn Fn(&dyn EngineConnection, VersionChangeEvent) + Send + Sync>;

/// A request to open `database`.
pub struct OpenCall {
    pub database: DatabaseName,

    /// `None` opens the stored version, or creates the database at 1.
    pub version: Option<SchemaVersion>,

    pub on_upgrade: Option<UpgradeHook>,
    pub on_blocked: Option<BlockedHook>,

    /// Installed on the new connection before any other open can see it.
    pub on_version_change: Option<VersionChangeHandler>,
}

impl OpenCall {
    pub fn new(database: DatabaseName, version: Option<SchemaVersion>) -> Self {
        Self {
            database,
            version,
            on_upgrade: None,
            on_blocked: None,
            on_version_change: None,
        }
    }
}

/// Payload of the blocked signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedEvent {
    pub database: DatabaseName,
    /// Zero when the database did not exist yet.
    pub old_version: u64,
    pub new_version: SchemaVersion,
    pub stale_connections: usize,
}

/// Payload of the version-change signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionChangeEvent {
    pub database: DatabaseName,
    pub connection_id: u64,
    pub old_version: SchemaVersion,
    /// `None` when the database is being deleted.
    pub new_version: Option<SchemaVersion>,
}

/// Schema access during an upgrade.
pub trait UpgradeScope {
    fn database(&self) -> &DatabaseName;

    /// Zero for a database that is being created.
    fn old_version(&self) -> u64;

    fn new_version(&self) -> SchemaVersion;

    fn collection_names(&self) -> BTreeSet<CollectionName>;

    fn contains(&self, name: &CollectionName) -> bool {
        self.collection_names().contains(name)
    }

    /// Create an empty collection. Fails with `ConstraintError` if it exists.
    fn create_collection(&mut self, name: &CollectionName) -> Result<(), EngineError>;
}

/// The embedded database.
pub trait StorageEngine: Send + Sync {
    /// Start an open. The engine settles `settler` exactly once, unless the
    /// blocked hook rejected it first; a connection produced after that must
    /// be closed by the engine.
    fn open(&self, call: OpenCall, settler: Settler<Arc<dyn EngineConnection>>);

    /// Delete a database and everything in it.
    fn delete_database(&self, database: &DatabaseName) -> Deferred<()>;

    /// Databases currently known to this engine, with their versions.
    fn databases(&self) -> Vec<(DatabaseName, SchemaVersion)>;
}

/// An open connection at a fixed version.
#[async_trait]
pub trait EngineConnection: Send + Sync {
    /// Unique per engine instance.
    fn id(&self) -> u64;

    fn database(&self) -> &DatabaseName;

    fn version(&self) -> SchemaVersion;

    /// Collections present when the connection was opened.
    fn collection_names(&self) -> BTreeSet<CollectionName>;

    /// Begin a transaction over `collections`.
    async fn transaction(
        &self,
        collections: &[CollectionName],
        mode: TransactionMode,
    ) -> Result<Box<dyn EngineTransaction>, EngineError>;

    /// Replace the version-change handler.
    fn on_version_change(&self, handler: VersionChangeHandler);

    /// Close the connection. Transactions already begun still complete.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// A transaction scoped to fixed collections and one mode.
///
/// Requests are issued immediately; their results arrive through `Deferred`.
/// Writes become visible to other transactions on `commit`. Dropping a
/// read-write transaction commits it in the background unless one of its
/// requests failed, in which case its writes are discarded.
pub trait EngineTransaction: Send + Sync {
    fn mode(&self) -> TransactionMode;

    fn get(&self, collection: &CollectionName, key: &[u8]) -> Deferred<Option<Value>>;

    fn put(&self, collection: &CollectionName, key: Key, value: Value) -> Deferred<()>;

    fn delete(&self, collection: &CollectionName, key: &[u8]) -> Deferred<()>;

    /// All keys in ascending order.
    fn get_all_keys(&self, collection: &CollectionName) -> Deferred<Vec<Key>>;

    /// All values in ascending key order.
    fn get_all(&self, collection: &CollectionName) -> Deferred<Vec<Value>>;

    fn clear(&self, collection: &CollectionName) -> Deferred<()>;

    /// Publish and persist the writes. Resolves once they are durable.
    fn commit(self: Box<Self>) -> Deferred<()>;
}
