//! # Domain Errors
//!
//! Three layers:
//!
//! - `EngineError` - what the storage engine reports for a single request
//! - `OpenError` - outcome of coordinating an open; `Clone` because every
//!   waiter on a shared pending open receives the same failure
//! - `StoreError` - what key-value operations return

use super::types::{CollectionName, DatabaseName, SchemaVersion};
use thiserror::Error;

/// Errors reported by the storage engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Requested version is lower than the stored one.
    #[error("The requested version ({requested}) is less than the existing version ({existing})")]
    VersionTooLow { requested: u64, existing: u64 },

    /// An upgrade is waiting on connections that did not close.
    #[error("Open of '{database}' blocked by {stale_connections} stale connection(s)")]
    Blocked {
        database: String,
        stale_connections: usize,
    },

    /// Collection does not exist in the database.
    #[error("Collection '{0}' not found")]
    NotFound(String),

    /// Collection already exists.
    #[error("Collection '{0}' already exists")]
    ConstraintError(String),

    /// Write issued in a read-only transaction.
    #[error("Transaction is read-only")]
    ReadOnly,

    /// Connection was closed before the request was issued.
    #[error("Connection to '{0}' is closed")]
    ConnectionClosed(String),

    /// Operation not allowed in the current engine state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The request was dropped without being settled.
    #[error("Request abandoned before completion")]
    Abandoned,
}

/// Errors from opening a database through the coordinator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpenError {
    /// Caller asked for a version lower than the one that exists.
    #[error("The requested version ({requested}) is less than the existing version ({existing})")]
    VersionConflict { requested: u64, existing: u64 },

    /// An explicit version was given but required collections are absent.
    #[error("Version {version} does not contain required collections {missing:?}")]
    SchemaMismatch {
        version: SchemaVersion,
        missing: Vec<CollectionName>,
    },

    /// The engine failed to open the database.
    #[error("Failed to open '{database}': {reason}")]
    OpenFailed {
        database: DatabaseName,
        reason: EngineError,
    },

    /// Another connection kept the upgrade from running.
    #[error("Open of '{database}' was blocked by a stale connection")]
    Blocked { database: DatabaseName },

    /// Version zero was requested.
    #[error("Invalid version {requested}: versions start at 1")]
    InvalidVersion { requested: u64 },

    /// A reopen for a higher version still came back at a lower one.
    #[error("Version negotiation did not converge: requested {requested}, reached {reached}")]
    Unconverged { requested: u64, reached: u64 },
}

impl OpenError {
    /// Map an engine failure during open onto the coordinator taxonomy.
    pub fn from_engine(database: &DatabaseName, err: EngineError) -> Self {
        match err {
            EngineError::VersionTooLow {
                requested,
                existing,
            } => OpenError::VersionConflict {
                requested,
                existing,
            },
            EngineError::Blocked { .. } => OpenError::Blocked {
                database: database.clone(),
            },
            other => OpenError::OpenFailed {
                database: database.clone(),
                reason: other,
            },
        }
    }
}

/// Errors from key-value operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error(transparent)]
    Open(#[from] OpenError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Typed value could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(String),
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}
