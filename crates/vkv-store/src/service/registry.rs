//! # Connection Registry
//!
//! Per-coordinator map from database name to the one pending-or-resolved
//! open for that name.
//!
//! ```text
//!   caller A ─┐                          ┌─ Shared<open future> ── engine.open (once)
//!   caller B ─┼─ lookup_or_create(name) ─┤
//!   caller C ─┘                          └─ generation 7
//! ```
//!
//! - Entries are inserted and removed under one lock, so concurrent callers
//!   always join the same open.
//! - The factory future is lazy: the engine is only touched once a caller
//!   polls it, never while the lock is held.
//! - A rejected open removes its own entry (matching generation only), so
//!   the next caller starts a fresh attempt.

use super::connection::Connection;
use crate::domain::errors::OpenError;
use crate::domain::types::DatabaseName;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;
use uuid::Uuid;
use vkv_bus::{
    ConnectionEvent, ConnectionEventKind, EventPublisher, InMemoryEventBus, InvalidationReason,
};

pub type OpenOutcome = Result<Connection, OpenError>;

/// A pending or settled open, shared by every caller that joined it.
#[derive(Clone)]
pub struct PendingOpen {
    pub generation: u64,
    pub future: Shared<BoxFuture<'static, OpenOutcome>>,
}

struct RegistryInner {
    coordinator: Uuid,
    entries: Mutex<HashMap<DatabaseName, PendingOpen>>,
    next_generation: AtomicU64,
    bus: Arc<InMemoryEventBus>,
}

impl RegistryInner {
    fn publish(&self, database: &DatabaseName, kind: ConnectionEventKind) {
        self.bus
            .publish(ConnectionEvent::new(self.coordinator, database.as_str(), kind));
    }

    fn remove_generation(
        &self,
        database: &DatabaseName,
        generation: u64,
        reason: InvalidationReason,
    ) -> bool {
        let removed = {
            let mut entries = self.entries.lock();
            match entries.get(database) {
                Some(entry) if entry.generation == generation => {
                    entries.remove(database);
                    true
                }
                _ => false,
            }
        };

        if removed {
            debug!(database = %database, generation, ?reason, "registry entry invalidated");
            self.publish(
                database,
                ConnectionEventKind::Invalidated {
                    generation: Some(generation),
                    reason,
                },
            );
        }
        removed
    }
}

/// Registry of pending and open connections, keyed by database name.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

/// Non-owning handle, held by version-change handlers.
#[derive(Clone)]
pub struct WeakRegistry {
    inner: Weak<RegistryInner>,
}

impl WeakRegistry {
    pub fn upgrade(&self) -> Option<ConnectionRegistry> {
        self.inner.upgrade().map(|inner| ConnectionRegistry { inner })
    }
}

impl ConnectionRegistry {
    pub fn new(coordinator: Uuid, bus: Arc<InMemoryEventBus>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                coordinator,
                entries: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
                bus,
            }),
        }
    }

    pub fn downgrade(&self) -> WeakRegistry {
        WeakRegistry {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Return the entry for `database`, or register `factory(generation)` as
    /// the new one.
    ///
    /// `factory` runs under the registry lock and must only build the
    /// future, not poll it.
    pub fn lookup_or_create<F>(&self, database: &DatabaseName, factory: F) -> PendingOpen
    where
        F: FnOnce(u64) -> BoxFuture<'static, OpenOutcome>,
    {
        let mut entries = self.inner.entries.lock();
        if let Some(existing) = entries.get(database) {
            debug!(database = %database, generation = existing.generation, "joining registered open");
            return existing.clone();
        }

        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let open = factory(generation);
        let registry = Arc::downgrade(&self.inner);
        let name = database.clone();

        let future = async move {
            let outcome = open.await;
            if outcome.is_err() {
                if let Some(registry) = registry.upgrade() {
                    registry.remove_generation(&name, generation, InvalidationReason::OpenFailed);
                }
            }
            outcome
        }
        .boxed()
        .shared();

        let pending = PendingOpen { generation, future };
        entries.insert(database.clone(), pending.clone());
        debug!(database = %database, generation, "registered new open");
        pending
    }

    /// Drop whatever is registered for `database`.
    ///
    /// Returns the removed generation.
    pub fn invalidate(&self, database: &DatabaseName, reason: InvalidationReason) -> Option<u64> {
        let removed = self
            .inner
            .entries
            .lock()
            .remove(database)
            .map(|entry| entry.generation);

        debug!(database = %database, generation = ?removed, ?reason, "registry entry invalidated");
        self.inner.publish(
            database,
            ConnectionEventKind::Invalidated {
                generation: removed,
                reason,
            },
        );
        removed
    }

    /// Drop the entry for `database` only if it is still `generation`.
    ///
    /// A newer entry registered by a concurrent caller stays in place.
    pub fn invalidate_generation(
        &self,
        database: &DatabaseName,
        generation: u64,
        reason: InvalidationReason,
    ) -> bool {
        self.inner.remove_generation(database, generation, reason)
    }

    pub fn contains(&self, database: &DatabaseName) -> bool {
        self.inner.entries.lock().contains_key(database)
    }

    pub fn generation_of(&self, database: &DatabaseName) -> Option<u64> {
        self.inner
            .entries
            .lock()
            .get(database)
            .map(|entry| entry.generation)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    pub fn bus(&self) -> &Arc<InMemoryEventBus> {
        &self.inner.bus
    }

    pub fn coordinator(&self) -> Uuid {
        self.inner.coordinator
    }
}
