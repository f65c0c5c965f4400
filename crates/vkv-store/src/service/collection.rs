//! # Collection Handle
//!
//! One transaction over one collection. Each request is issued right away
//! and returns a `Deferred`, so several requests can be in flight at once
//! and joined together.

use super::connection::Connection;
use crate::deferred::Deferred;
use crate::domain::errors::EngineError;
use crate::domain::types::{CollectionName, Key, TransactionMode, Value};
use crate::ports::outbound::EngineTransaction;

/// A collection inside a live transaction.
///
/// Writes are published by `commit`. A handle dropped without it commits in
/// the background, without reporting failures.
pub struct CollectionHandle {
    collection: CollectionName,
    transaction: Box<dyn EngineTransaction>,
}

impl CollectionHandle {
    /// Start a `mode` transaction on `collection`.
    pub async fn begin(
        connection: &Connection,
        collection: &CollectionName,
        mode: TransactionMode,
    ) -> Result<Self, EngineError> {
        let transaction = connection
            .transaction(std::slice::from_ref(collection), mode)
            .await?;
        Ok(Self {
            collection: collection.clone(),
            transaction,
        })
    }

    pub fn collection(&self) -> &CollectionName {
        &self.collection
    }

    pub fn mode(&self) -> TransactionMode {
        self.transaction.mode()
    }

    pub fn get(&self, key: &[u8]) -> Deferred<Option<Value>> {
        self.transaction.get(&self.collection, key)
    }

    pub fn put(&self, key: Key, value: Value) -> Deferred<()> {
        self.transaction.put(&self.collection, key, value)
    }

    pub fn delete(&self, key: &[u8]) -> Deferred<()> {
        self.transaction.delete(&self.collection, key)
    }

    pub fn get_all_keys(&self) -> Deferred<Vec<Key>> {
        self.transaction.get_all_keys(&self.collection)
    }

    pub fn get_all(&self) -> Deferred<Vec<Value>> {
        self.transaction.get_all(&self.collection)
    }

    pub fn clear(&self) -> Deferred<()> {
        self.transaction.clear(&self.collection)
    }

    /// End the transaction, resolving once its writes are durable.
    pub fn commit(self) -> Deferred<()> {
        self.transaction.commit()
    }
}

impl std::fmt::Debug for CollectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("collection", &self.collection)
            .field("mode", &self.mode())
            .finish()
    }
}
