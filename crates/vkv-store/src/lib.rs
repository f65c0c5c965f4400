//! # VKV Store
//!
//! Concurrency-safe coordinator for opening, versioning and upgrading handles
//! to an embedded, versioned key-value engine, plus a small key-value API
//! on top of it.
//!
//! ## Architecture
//!
//! ```text
//!  KvStore / TypedStore ──→ Coordinator ──→ ConnectionRegistry (one open per name)
//!         │                     │
//!         │                     └──→ negotiation::decide (reuse / reopen / fail)
//!         ▼                     ▼
//!  CollectionHandle ──→ StorageEngine port ←── InMemoryEngine (+ snapshots)
//!                               │
//!                        Deferred / Settler (request → future)
//! ```
//!
//! ## Guarantees
//!
//! | Guarantee | Where |
//! |-----------|-------|
//! | One engine open per database per coordinator at a time | `service::registry` |
//! | Failed opens are never replayed to later callers | `service::registry` |
//! | Versions only grow; lower requests fail without touching the database | `domain::negotiation` |
//! | Upgrades only add collections | `service::coordinator` |
//! | A handle asked to step aside closes and is forgotten | `service::coordinator` |
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Names, versions, errors, config, the negotiation function
//! - `deferred` - Deferred Request Adapter
//! - `ports/` - `KeyValueApi` (inbound), engine traits (outbound)
//! - `service/` - Registry, coordinator, collection handle, stores
//! - `adapters/` - In-memory engine and snapshot files
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use vkv_store::{Coordinator, InMemoryEngine, KeyValueApi, KvStore};
//!
//! let coordinator = Coordinator::new(Arc::new(InMemoryEngine::new()));
//! let store = KvStore::new(coordinator, "app", "settings");
//!
//! store.set(b"theme".to_vec(), b"dark".to_vec()).await?;
//! let theme = store.get(b"theme").await?;
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod deferred;
pub mod domain;
pub mod ports;
pub mod service;

/// Test helpers.
///
/// Requires feature: `test-utils`
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export key types for convenience
pub use adapters::{InMemoryConnection, InMemoryEngine};
pub use deferred::{Deferred, Rejector, Settler};
pub use domain::config::CoordinatorConfig;
pub use domain::errors::{EngineError, OpenError, StoreError};
pub use domain::types::{
    CollectionName, DatabaseName, Key, OpenRequest, SchemaVersion, TransactionMode, Value,
};
pub use ports::inbound::KeyValueApi;
pub use ports::outbound::{
    BlockedEvent, EngineConnection, EngineTransaction, OpenCall, StorageEngine, UpgradeScope,
    VersionChangeEvent,
};
pub use service::{CollectionHandle, Connection, Coordinator, KvStore, TypedStore};

// Re-export bus types used in the public API
pub use vkv_bus::{ConnectionEvent, ConnectionEventKind, EventFilter, EventTopic, InvalidationReason};
