//! # Key-Value Store
//!
//! Binds a coordinator to one (database, collection) pair and implements
//! `KeyValueApi` on top of it.
//!
//! Every operation resolves the database handle through the coordinator,
//! which makes sure the collection exists (upgrading if needed), and then
//! runs in its own transaction.

use super::collection::CollectionHandle;
use super::coordinator::Coordinator;
use crate::domain::errors::{EngineError, StoreError};
use crate::domain::types::{CollectionName, DatabaseName, Key, OpenRequest, TransactionMode, Value};
use crate::ports::inbound::KeyValueApi;
use async_trait::async_trait;
use futures::future::{try_join, try_join_all};
use tracing::{debug, trace};
use vkv_bus::InvalidationReason;

/// Key-value access to one collection.
#[derive(Clone)]
pub struct KvStore {
    coordinator: Coordinator,
    database: DatabaseName,
    collection: CollectionName,
}

impl KvStore {
    /// Nothing is opened until the first operation or `warm_up`.
    pub fn new(
        coordinator: Coordinator,
        database: impl Into<DatabaseName>,
        collection: impl Into<CollectionName>,
    ) -> Self {
        Self {
            coordinator,
            database: database.into(),
            collection: collection.into(),
        }
    }

    pub fn database(&self) -> &DatabaseName {
        &self.database
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// Open the database now, so the first operation does not pay for it.
    pub async fn warm_up(&self) -> Result<(), StoreError> {
        self.coordinator.open(self.request()).await?;
        Ok(())
    }

    fn request(&self) -> OpenRequest {
        OpenRequest::new(self.database.clone()).with_collections([self.collection.clone()])
    }

    /// Begin a transaction on this store's collection.
    ///
    /// A handle that closes between resolution and transaction start is
    /// dropped from the registry and resolved once more.
    pub async fn handle(&self, mode: TransactionMode) -> Result<CollectionHandle, StoreError> {
        let connection = self.coordinator.open(self.request()).await?;
        match CollectionHandle::begin(&connection, &self.collection, mode).await {
            Err(EngineError::ConnectionClosed(_)) => {
                debug!(
                    database = %self.database,
                    connection_id = connection.id(),
                    "connection closed before transaction, resolving again"
                );
                self.coordinator.registry().invalidate_generation(
                    &self.database,
                    connection.generation(),
                    InvalidationReason::Closed,
                );
                let connection = self.coordinator.open(self.request()).await?;
                Ok(CollectionHandle::begin(&connection, &self.collection, mode).await?)
            }
            other => Ok(other?),
        }
    }

    /// All keys in ascending order.
    pub async fn keys(&self) -> Result<Vec<Key>, StoreError> {
        let handle = self.handle(TransactionMode::ReadOnly).await?;
        Ok(handle.get_all_keys().await?)
    }

    /// Remove every entry.
    pub async fn clear(&self) -> Result<(), StoreError> {
        let handle = self.handle(TransactionMode::ReadWrite).await?;
        handle.clear().await?;
        handle.commit().await?;
        debug!(database = %self.database, collection = %self.collection, "collection cleared");
        Ok(())
    }
}

#[async_trait]
impl KeyValueApi for KvStore {
    async fn get(&self, key: &[u8]) -> Result<Option<Value>, StoreError> {
        let handle = self.handle(TransactionMode::ReadOnly).await?;
        Ok(handle.get(key).await?)
    }

    async fn get_many(&self, keys: &[Key]) -> Result<Vec<Option<Value>>, StoreError> {
        let handle = self.handle(TransactionMode::ReadOnly).await?;
        Ok(try_join_all(keys.iter().map(|key| handle.get(key))).await?)
    }

    async fn set(&self, key: Key, value: Value) -> Result<(), StoreError> {
        let handle = self.handle(TransactionMode::ReadWrite).await?;
        trace!(collection = %self.collection, key_len = key.len(), value_len = value.len(), "set");
        handle.put(key, value).await?;
        Ok(handle.commit().await?)
    }

    async fn set_many(&self, entries: Vec<(Key, Value)>) -> Result<(), StoreError> {
        let handle = self.handle(TransactionMode::ReadWrite).await?;
        trace!(collection = %self.collection, count = entries.len(), "set_many");
        try_join_all(
            entries
                .into_iter()
                .map(|(key, value)| handle.put(key, value)),
        )
        .await?;
        Ok(handle.commit().await?)
    }

    async fn entries(&self) -> Result<Vec<(Key, Value)>, StoreError> {
        let handle = self.handle(TransactionMode::ReadOnly).await?;
        let (keys, values) = try_join(handle.get_all_keys(), handle.get_all()).await?;
        if keys.len() != values.len() {
            return Err(EngineError::InvalidState(format!(
                "engine returned {} keys and {} values",
                keys.len(),
                values.len()
            ))
            .into());
        }
        Ok(keys.into_iter().zip(values).collect())
    }

    async fn update<F>(&self, key: Key, updater: F) -> Result<(), StoreError>
    where
        F: FnOnce(Option<Value>) -> Value + Send + 'static,
    {
        let handle = self.handle(TransactionMode::ReadWrite).await?;
        let current = handle.get(&key).await?;
        handle.put(key, updater(current)).await?;
        Ok(handle.commit().await?)
    }

    async fn del(&self, key: &[u8]) -> Result<(), StoreError> {
        let handle = self.handle(TransactionMode::ReadWrite).await?;
        handle.delete(key).await?;
        Ok(handle.commit().await?)
    }

    async fn del_many(&self, keys: &[Key]) -> Result<(), StoreError> {
        let handle = self.handle(TransactionMode::ReadWrite).await?;
        try_join_all(keys.iter().map(|key| handle.delete(key))).await?;
        Ok(handle.commit().await?)
    }
}

impl std::fmt::Debug for KvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvStore")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish()
    }
}
