//! # Domain Types
//!
//! Value objects shared by the coordinator, the engine port and the store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::num::NonZeroU64;

/// Opaque key bytes.
pub type Key = Vec<u8>;

/// Opaque value bytes.
pub type Value = Vec<u8>;

/// Name of a logical database inside one engine namespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatabaseName(String);

impl DatabaseName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DatabaseName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for DatabaseName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Name of a keyed container inside a database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for CollectionName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Strictly positive schema version.
///
/// Versions never decrease for a given database; the engine rejects opens
/// that ask for a lower version than the stored one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SchemaVersion(NonZeroU64);

impl SchemaVersion {
    /// Version of a freshly created database.
    pub const INITIAL: SchemaVersion = SchemaVersion(NonZeroU64::MIN);

    /// Returns `None` for zero.
    pub fn new(version: u64) -> Option<Self> {
        NonZeroU64::new(version).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }

    /// The version right after this one, saturating at `u64::MAX`.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionMode {
    ReadOnly,
    ReadWrite,
}

impl TransactionMode {
    pub fn is_writable(self) -> bool {
        matches!(self, TransactionMode::ReadWrite)
    }
}

/// A caller's request for a database handle.
///
/// - `version: None` lets the coordinator pick a version when an upgrade is
///   needed (current + 1).
/// - `version: Some(v)` means any upgrade must land exactly on `v`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenRequest {
    pub database: DatabaseName,
    pub version: Option<SchemaVersion>,
    pub collections: Option<BTreeSet<CollectionName>>,
}

impl OpenRequest {
    /// Open whatever version exists, requiring nothing.
    pub fn new(database: impl Into<DatabaseName>) -> Self {
        Self {
            database: database.into(),
            version: None,
            collections: None,
        }
    }

    pub fn with_version(mut self, version: SchemaVersion) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_collections<I, C>(mut self, collections: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<CollectionName>,
    {
        self.collections = Some(collections.into_iter().map(Into::into).collect());
        self
    }

    /// Required collections absent from `existing`, in name order.
    pub fn missing_from(&self, existing: &BTreeSet<CollectionName>) -> Vec<CollectionName> {
        self.collections
            .iter()
            .flatten()
            .filter(|name| !existing.contains(*name))
            .cloned()
            .collect()
    }
}
