//! Typed values on top of `KvStore`, encoded with bincode.

use super::store::KvStore;
use crate::domain::errors::StoreError;
use crate::domain::types::{Key, TransactionMode};
use crate::ports::inbound::KeyValueApi;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;

/// A `KvStore` whose values are `T`.
pub struct TypedStore<T> {
    store: KvStore,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for TypedStore<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _marker: PhantomData,
        }
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(bincode::deserialize(bytes)?)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(bincode::serialize(value)?)
}

impl<T> TypedStore<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    pub fn new(store: KvStore) -> Self {
        Self {
            store,
            _marker: PhantomData,
        }
    }

    pub fn inner(&self) -> &KvStore {
        &self.store
    }

    pub async fn get(&self, key: impl AsRef<[u8]>) -> Result<Option<T>, StoreError> {
        self.store
            .get(key.as_ref())
            .await?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    pub async fn set(&self, key: impl Into<Key>, value: &T) -> Result<(), StoreError> {
        let bytes = encode(value)?;
        self.store.set(key.into(), bytes).await
    }

    pub async fn entries(&self) -> Result<Vec<(Key, T)>, StoreError> {
        self.store
            .entries()
            .await?
            .into_iter()
            .map(|(key, bytes)| Ok((key, decode(&bytes)?)))
            .collect()
    }

    /// Read, transform and write back in one read-write transaction.
    ///
    /// A stored value that does not decode fails the update and leaves the
    /// entry untouched.
    pub async fn update<F>(&self, key: impl Into<Key>, updater: F) -> Result<(), StoreError>
    where
        F: FnOnce(Option<T>) -> T,
    {
        let key = key.into();
        let handle = self.store.handle(TransactionMode::ReadWrite).await?;
        let current = handle
            .get(&key)
            .await?
            .map(|bytes| decode(&bytes))
            .transpose()?;
        let next = encode(&updater(current))?;
        handle.put(key, next).await?;
        Ok(handle.commit().await?)
    }

    pub async fn del(&self, key: impl AsRef<[u8]>) -> Result<(), StoreError> {
        self.store.del(key.as_ref()).await
    }
}
