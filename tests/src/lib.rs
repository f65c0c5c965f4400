//! # VKV Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! ├── benchmarks/       # Criterion benchmark bodies (run from benches/)
//! │   └── store.rs
//! │
//! └── integration/      # Scenarios across coordinators sharing one engine
//!     ├── open_negotiation.rs
//!     ├── key_value.rs
//!     ├── multi_coordinator.rs
//!     └── persistence.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p vkv-tests
//!
//! # By category
//! cargo test -p vkv-tests integration::multi_coordinator
//!
//! # Benchmarks
//! cargo bench -p vkv-tests
//! ```

#![allow(dead_code)]

pub mod benchmarks;
pub mod integration;
