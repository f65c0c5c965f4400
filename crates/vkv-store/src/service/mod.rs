//! # Service Layer
//!
//! - `registry` - Deduplicated pending/open handles per database
//! - `coordinator` - Open driver: dedup, negotiation, version-change wiring
//! - `connection` - Shared handle returned by the coordinator
//! - `collection` - One collection inside one transaction
//! - `store` - `KeyValueApi` implementation
//! - `typed` - Serde-typed values over `KvStore`

pub mod collection;
pub mod connection;
pub mod coordinator;
pub mod registry;
pub mod store;
pub mod typed;

pub use collection::CollectionHandle;
pub use connection::Connection;
pub use coordinator::Coordinator;
pub use registry::{ConnectionRegistry, PendingOpen};
pub use store::KvStore;
pub use typed::TypedStore;
