//! # Domain Layer
//!
//! Engine-independent logic for the coordinator.
//!
//! ## Modules
//!
//! - `types` - Names, versions, open requests
//! - `errors` - Engine, open and store error types
//! - `negotiation` - Pure version/schema decision function
//! - `config` - Coordinator and engine settings

pub mod config;
pub mod errors;
pub mod negotiation;
pub mod types;
