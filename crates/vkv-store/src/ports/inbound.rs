//! # Inbound Ports (Driving Ports)
//!
//! The key-value API offered to applications. Implemented by `KvStore`.

use crate::domain::errors::StoreError;
use crate::domain::types::{Key, Value};
use async_trait::async_trait;

/// Key-value access to one collection of one database.
///
/// Every call opens (or reuses) the database handle on demand and runs in
/// its own transaction. Batch calls share one transaction and fail as a
/// whole if any request fails.
#[async_trait]
pub trait KeyValueApi: Send + Sync {
    /// Value stored under `key`, or `None`.
    async fn get(&self, key: &[u8]) -> Result<Option<Value>, StoreError>;

    /// Values for `keys`, in the same order.
    async fn get_many(&self, keys: &[Key]) -> Result<Vec<Option<Value>>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: Key, value: Value) -> Result<(), StoreError>;

    async fn set_many(&self, entries: Vec<(Key, Value)>) -> Result<(), StoreError>;

    /// Every pair in ascending key order.
    async fn entries(&self) -> Result<Vec<(Key, Value)>, StoreError>;

    /// Read, transform and write back `key` in one read-write transaction.
    async fn update<F>(&self, key: Key, updater: F) -> Result<(), StoreError>
    where
        F: FnOnce(Option<Value>) -> Value + Send + 'static;

    /// Remove `key`. Missing keys are not an error.
    async fn del(&self, key: &[u8]) -> Result<(), StoreError>;

    async fn del_many(&self, keys: &[Key]) -> Result<(), StoreError>;
}
