//! # VKV Bus - Connection Lifecycle Events
//!
//! Broadcast channel carrying the lifecycle of database connections managed
//! by a coordinator: opens starting and settling, registry invalidations,
//! version-change notifications and closes.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ Coordinator  │    publish()       │  KvStore /   │
//! │  (registry)  │ ──────┐            │  observers   │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │  Event Bus   │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! Publishing is synchronous so it can happen inside engine callbacks
//! (the version-change handler runs on the engine's call stack).

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{ConnectionEvent, ConnectionEventKind, EventFilter, EventTopic, InvalidationReason};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;
