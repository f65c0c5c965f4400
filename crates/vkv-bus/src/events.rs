//! # Connection Events
//!
//! Event types that flow through the lifecycle bus.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a registry entry was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidationReason {
    /// The open future rejected; the next caller gets a fresh attempt.
    OpenFailed,
    /// The open connection is older than a caller's desired version.
    VersionBehind,
    /// Required collections are missing and an upgrade was scheduled.
    MissingCollections,
    /// Another opener asked for a higher version.
    VersionChange,
    /// The connection was found closed while resolving a transaction.
    Closed,
    /// Caller-requested invalidation.
    Explicit,
}

/// What happened to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionEventKind {
    /// A new engine open was registered.
    OpenStarted {
        /// Registry generation of the pending open.
        generation: u64,
        /// Version passed to the engine, if any.
        requested_version: Option<u64>,
    },

    /// The engine open settled successfully.
    Opened {
        generation: u64,
        connection_id: u64,
        version: u64,
    },

    /// The engine open rejected.
    OpenFailed { generation: u64, reason: String },

    /// A registry entry was removed.
    Invalidated {
        /// Generation removed, `None` when nothing was registered.
        generation: Option<u64>,
        reason: InvalidationReason,
    },

    /// The engine asked an open connection to step aside for a newer version.
    VersionChange {
        connection_id: u64,
        old_version: u64,
        /// `None` when the database is being deleted.
        new_version: Option<u64>,
    },

    /// A connection was closed by the coordinator.
    Closed { connection_id: u64 },
}

/// Event envelope published on the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEvent {
    /// Unique event id.
    pub id: Uuid,
    /// Coordinator instance that published the event.
    pub coordinator: Uuid,
    /// Database the event concerns.
    pub database: String,
    pub kind: ConnectionEventKind,
}

impl ConnectionEvent {
    /// Create a new event with a fresh id.
    pub fn new(coordinator: Uuid, database: impl Into<String>, kind: ConnectionEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            coordinator,
            database: database.into(),
            kind,
        }
    }

    /// Topic this event belongs to.
    #[must_use]
    pub fn topic(&self) -> EventTopic {
        match self.kind {
            ConnectionEventKind::OpenStarted { .. }
            | ConnectionEventKind::Opened { .. }
            | ConnectionEventKind::OpenFailed { .. } => EventTopic::Open,
            ConnectionEventKind::Invalidated { .. } => EventTopic::Invalidation,
            ConnectionEventKind::VersionChange { .. } | ConnectionEventKind::Closed { .. } => {
                EventTopic::Lifecycle
            }
        }
    }
}

/// Event topics for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// Every event.
    All,
    /// Open started / settled.
    Open,
    /// Registry invalidations.
    Invalidation,
    /// Version change and close.
    Lifecycle,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to include (empty = all).
    pub topics: Vec<EventTopic>,
    /// Databases to include (empty = all).
    pub databases: Vec<String>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for specific topics.
    #[must_use]
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            databases: Vec::new(),
        }
    }

    /// Create a filter for a single database.
    #[must_use]
    pub fn database(name: impl Into<String>) -> Self {
        Self {
            topics: Vec::new(),
            databases: vec![name.into()],
        }
    }

    /// Narrow an existing filter to the given topics.
    #[must_use]
    pub fn with_topics(mut self, topics: Vec<EventTopic>) -> Self {
        self.topics = topics;
        self
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &ConnectionEvent) -> bool {
        let topic_match = self.topics.is_empty()
            || self.topics.contains(&EventTopic::All)
            || self.topics.contains(&event.topic());

        let database_match =
            self.databases.is_empty() || self.databases.iter().any(|d| *d == event.database);

        topic_match && database_match
    }
}
