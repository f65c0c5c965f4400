//! # Adapters Module
//!
//! - `memory`: process-local `StorageEngine`
//! - `snapshot`: bincode snapshot files backing `memory`

pub mod memory;
pub mod snapshot;

pub use memory::{InMemoryConnection, InMemoryEngine};
