//! Coordinator-side view of an engine connection.

use crate::domain::errors::EngineError;
use crate::domain::types::{CollectionName, DatabaseName, SchemaVersion, TransactionMode};
use crate::ports::outbound::{EngineConnection, EngineTransaction};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// A shared database handle.
///
/// Cheap to clone; every clone refers to the same engine connection and the
/// same registry generation.
#[derive(Clone)]
pub struct Connection {
    engine: Arc<dyn EngineConnection>,
    generation: u64,
}

impl Connection {
    pub(crate) fn new(engine: Arc<dyn EngineConnection>, generation: u64) -> Self {
        Self { engine, generation }
    }

    pub fn id(&self) -> u64 {
        self.engine.id()
    }

    pub fn database(&self) -> &DatabaseName {
        self.engine.database()
    }

    pub fn version(&self) -> SchemaVersion {
        self.engine.version()
    }

    pub fn collection_names(&self) -> BTreeSet<CollectionName> {
        self.engine.collection_names()
    }

    pub fn has_collection(&self, name: &CollectionName) -> bool {
        self.engine.collection_names().contains(name)
    }

    /// Registry generation this connection was opened under.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_closed(&self) -> bool {
        self.engine.is_closed()
    }

    /// Close the engine connection. The registry keeps its entry until the
    /// next caller finds it closed.
    pub fn close(&self) {
        self.engine.close();
    }

    pub async fn transaction(
        &self,
        collections: &[CollectionName],
        mode: TransactionMode,
    ) -> Result<Box<dyn EngineTransaction>, EngineError> {
        self.engine.transaction(collections, mode).await
    }

    /// Both handles refer to the same engine connection.
    pub fn same_as(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.engine, &other.engine)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("database", self.database())
            .field("version", &self.version())
            .field("generation", &self.generation)
            .field("closed", &self.is_closed())
            .finish()
    }
}
