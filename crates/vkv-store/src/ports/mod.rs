//! # Ports Layer
//!
//! - `inbound` - API offered to applications (Driving Ports)
//! - `outbound` - Storage engine boundary (Driven Ports)

pub mod inbound;
pub mod outbound;
