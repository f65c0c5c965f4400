//! # In-Memory Engine
//!
//! A complete `StorageEngine` that keeps every database in process memory,
//! optionally mirrored to snapshot files.
//!
//! ```text
//! InMemoryEngine
//!   └─ DatabaseSlot (one per name)
//!        ├─ open_queue      opens and deletes run one at a time
//!        ├─ state           version + collections (copy-on-write maps)
//!        ├─ write_locks     one async mutex per collection
//!        └─ connections     weak refs + live count (watch channel)
//! ```
//!
//! ## Upgrade protocol
//!
//! 1. Fire the version-change handler on every open connection.
//! 2. Wait `blocked_grace` for them to close.
//! 3. Still open: fire the blocked hook, then keep waiting.
//! 4. Lock every collection, run the upgrade hook on a draft, persist, commit.
//!
//! Read-only transactions take a snapshot of their collections. Read-write
//! transactions hold the collection locks and write to private copies that
//! are published on commit. With a data directory, each commit rewrites the
//! snapshot file once, on the blocking pool, before publishing.

use super::snapshot;
use crate::deferred::{self, Deferred, Settler};
use crate::domain::config::CoordinatorConfig;
use crate::domain::errors::EngineError;
use crate::domain::types::{
    CollectionName, DatabaseName, Key, SchemaVersion, TransactionMode, Value,
};
use crate::ports::outbound::{
    BlockedEvent, EngineConnection, EngineTransaction, OpenCall, StorageEngine, UpgradeHook,
    UpgradeScope, VersionChangeEvent, VersionChangeHandler,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{watch, OwnedMutexGuard};
use tracing::{debug, info, trace, warn};

type WriteLock = Arc<tokio::sync::Mutex<()>>;
type Contents = BTreeMap<CollectionName, Arc<BTreeMap<Key, Value>>>;

/// Committed contents of one database.
#[derive(Debug, Clone)]
pub(crate) struct DatabaseState {
    pub(crate) version: SchemaVersion,
    pub(crate) collections: Contents,
}

impl DatabaseState {
    fn empty(version: SchemaVersion) -> Self {
        Self {
            version,
            collections: BTreeMap::new(),
        }
    }

    fn collection_names(&self) -> BTreeSet<CollectionName> {
        self.collections.keys().cloned().collect()
    }
}

struct DatabaseSlot {
    name: DatabaseName,
    data_dir: Option<PathBuf>,
    open_queue: tokio::sync::Mutex<()>,
    /// Serializes snapshot file writes so the last one on disk is the newest.
    persist_lock: tokio::sync::Mutex<()>,
    snapshot_writes: Arc<AtomicU64>,
    /// `None` until created, and again after deletion.
    state: Mutex<Option<DatabaseState>>,
    write_locks: Mutex<HashMap<CollectionName, WriteLock>>,
    connections: Mutex<Vec<Weak<InMemoryConnection>>>,
    open_count: watch::Sender<usize>,
}

impl DatabaseSlot {
    fn new(
        name: DatabaseName,
        data_dir: Option<PathBuf>,
        state: Option<DatabaseState>,
        snapshot_writes: Arc<AtomicU64>,
    ) -> Self {
        Self {
            name,
            data_dir,
            open_queue: tokio::sync::Mutex::new(()),
            persist_lock: tokio::sync::Mutex::new(()),
            snapshot_writes,
            state: Mutex::new(state),
            write_locks: Mutex::new(HashMap::new()),
            connections: Mutex::new(Vec::new()),
            open_count: watch::channel(0).0,
        }
    }

    fn current_version(&self) -> Option<SchemaVersion> {
        self.state.lock().as_ref().map(|state| state.version)
    }

    fn committed(&self) -> Result<DatabaseState, EngineError> {
        self.state
            .lock()
            .clone()
            .ok_or_else(|| EngineError::NotFound(self.name.to_string()))
    }

    /// Replace the committed contents of the collections in `changed`.
    fn publish(&self, changed: Contents) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let state = state
            .as_mut()
            .ok_or_else(|| EngineError::NotFound(self.name.to_string()))?;
        state.collections.extend(changed);
        Ok(())
    }

    /// Write `state` to the snapshot file off the async workers.
    ///
    /// Callers hold `persist_lock`.
    async fn save(&self, dir: &Path, state: DatabaseState) -> Result<(), EngineError> {
        let dir = dir.to_path_buf();
        let name = self.name.clone();
        off_runtime(move || snapshot::save(&dir, &name, &state)).await?;
        self.snapshot_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Persist the committed state merged with `changed`, then publish it.
    /// Nothing is published when the write fails.
    async fn persist_and_publish(&self, changed: Contents) -> Result<(), EngineError> {
        let Some(dir) = &self.data_dir else {
            return self.publish(changed);
        };

        let _persist = self.persist_lock.lock().await;
        let mut draft = self.committed()?;
        draft
            .collections
            .extend(changed.iter().map(|(name, data)| (name.clone(), data.clone())));
        self.save(dir, draft).await?;
        self.publish(changed)
    }

    /// Persist whatever is committed now. Used after background commits.
    async fn persist_current(&self) -> Result<(), EngineError> {
        let Some(dir) = &self.data_dir else {
            return Ok(());
        };

        let _persist = self.persist_lock.lock().await;
        let current = self.state.lock().clone();
        match current {
            Some(state) => self.save(dir, state).await,
            // Deleted in the meantime.
            None => Ok(()),
        }
    }

    fn all_collections(&self) -> Vec<CollectionName> {
        self.state
            .lock()
            .as_ref()
            .map(|state| state.collections.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Lock `names` in order. Callers pass sorted, deduplicated names.
    async fn lock_collections(&self, names: &[CollectionName]) -> Vec<OwnedMutexGuard<()>> {
        let locks: Vec<WriteLock> = {
            let mut map = self.write_locks.lock();
            names
                .iter()
                .map(|name| map.entry(name.clone()).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(locks.len());
        for lock in locks {
            guards.push(lock.lock_owned().await);
        }
        guards
    }

    fn open_connections(&self) -> Vec<Arc<InMemoryConnection>> {
        let mut connections = self.connections.lock();
        connections.retain(|weak| weak.strong_count() > 0);
        connections
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|connection| !connection.is_closed())
            .collect()
    }

    fn live_connections(&self) -> usize {
        *self.open_count.borrow()
    }

    /// Ask every open connection to go away and wait up to `grace`.
    ///
    /// Returns how many were still open afterwards.
    async fn request_close(&self, new_version: Option<SchemaVersion>, grace: Duration) -> usize {
        let stale = self.open_connections();
        if stale.is_empty() {
            return 0;
        }

        debug!(
            database = %self.name,
            stale_connections = stale.len(),
            new_version = ?new_version.map(SchemaVersion::get),
            "firing version change"
        );
        for connection in &stale {
            connection.fire_version_change(new_version);
        }
        drop(stale);

        let mut rx = self.open_count.subscribe();
        let closed = tokio::time::timeout(grace, rx.wait_for(|open| *open == 0))
            .await
            .map_or(false, |changed| changed.is_ok());

        if closed {
            0
        } else {
            self.live_connections()
        }
    }

    async fn wait_all_closed(&self) {
        let mut rx = self.open_count.subscribe();
        let _ = rx.wait_for(|open| *open == 0).await.map(|_| ());
    }

    async fn upgrade(
        &self,
        old_version: u64,
        target: SchemaVersion,
        hook: Option<UpgradeHook>,
    ) -> Result<(), EngineError> {
        let names = self.all_collections();
        let _guards = self.lock_collections(&names).await;

        let mut draft = self
            .state
            .lock()
            .clone()
            .unwrap_or_else(|| DatabaseState::empty(target));
        draft.version = target;

        if let Some(hook) = hook {
            let mut scope = Upgrade {
                database: &self.name,
                old_version,
                draft: &mut draft,
            };
            hook(&mut scope)?;
        }

        let _persist = self.persist_lock.lock().await;
        if let Some(dir) = &self.data_dir {
            self.save(dir, draft.clone()).await?;
        }

        info!(
            database = %self.name,
            old_version,
            new_version = %target,
            collections = draft.collections.len(),
            "database upgraded"
        );
        *self.state.lock() = Some(draft);
        Ok(())
    }
}

/// Run blocking file work on the blocking pool.
async fn off_runtime<R, F>(work: F) -> Result<R, EngineError>
where
    F: FnOnce() -> Result<R, EngineError> + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| EngineError::Io(format!("snapshot task failed: {err}")))?
}

/// The handler is in place before the connection is counted, so an upgrade
/// queued behind this open always reaches it.
fn connect(
    slot: &Arc<DatabaseSlot>,
    id: u64,
    handler: Option<VersionChangeHandler>,
) -> Result<Arc<InMemoryConnection>, EngineError> {
    let (version, collections) = {
        let state = slot.state.lock();
        let state = state.as_ref().ok_or_else(|| {
            EngineError::InvalidState(format!("database '{}' does not exist", slot.name))
        })?;
        (state.version, state.collection_names())
    };

    let connection = Arc::new(InMemoryConnection {
        id,
        version,
        collections,
        slot: slot.clone(),
        closed: AtomicBool::new(false),
        handler: Mutex::new(handler),
    });

    slot.open_count.send_modify(|open| *open += 1);
    let mut connections = slot.connections.lock();
    connections.retain(|weak| weak.strong_count() > 0);
    connections.push(Arc::downgrade(&connection));

    Ok(connection)
}

struct Upgrade<'a> {
    database: &'a DatabaseName,
    old_version: u64,
    draft: &'a mut DatabaseState,
}

impl UpgradeScope for Upgrade<'_> {
    fn database(&self) -> &DatabaseName {
        self.database
    }

    fn old_version(&self) -> u64 {
        self.old_version
    }

    fn new_version(&self) -> SchemaVersion {
        self.draft.version
    }

    fn collection_names(&self) -> BTreeSet<CollectionName> {
        self.draft.collection_names()
    }

    fn contains(&self, name: &CollectionName) -> bool {
        self.draft.collections.contains_key(name)
    }

    fn create_collection(&mut self, name: &CollectionName) -> Result<(), EngineError> {
        if self.draft.collections.contains_key(name) {
            return Err(EngineError::ConstraintError(name.to_string()));
        }
        debug!(database = %self.database, collection = %name, "creating collection");
        self.draft
            .collections
            .insert(name.clone(), Arc::new(BTreeMap::new()));
        Ok(())
    }
}

/// Connection handed out by `InMemoryEngine`.
pub struct InMemoryConnection {
    id: u64,
    version: SchemaVersion,
    collections: BTreeSet<CollectionName>,
    slot: Arc<DatabaseSlot>,
    closed: AtomicBool,
    handler: Mutex<Option<VersionChangeHandler>>,
}

impl InMemoryConnection {
    fn fire_version_change(&self, new_version: Option<SchemaVersion>) {
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => handler(
                self,
                VersionChangeEvent {
                    database: self.slot.name.clone(),
                    connection_id: self.id,
                    old_version: self.version,
                    new_version,
                },
            ),
            None => debug!(connection_id = self.id, "no version-change handler installed"),
        }
    }

    fn mark_closed(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.slot
            .open_count
            .send_modify(|open| *open = open.saturating_sub(1));
        true
    }
}

impl Drop for InMemoryConnection {
    fn drop(&mut self) {
        self.mark_closed();
    }
}

impl std::fmt::Debug for InMemoryConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryConnection")
            .field("id", &self.id)
            .field("database", &self.slot.name)
            .field("version", &self.version)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[async_trait]
impl EngineConnection for InMemoryConnection {
    fn id(&self) -> u64 {
        self.id
    }

    fn database(&self) -> &DatabaseName {
        &self.slot.name
    }

    fn version(&self) -> SchemaVersion {
        self.version
    }

    fn collection_names(&self) -> BTreeSet<CollectionName> {
        self.collections.clone()
    }

    async fn transaction(
        &self,
        collections: &[CollectionName],
        mode: TransactionMode,
    ) -> Result<Box<dyn EngineTransaction>, EngineError> {
        if self.is_closed() {
            return Err(EngineError::ConnectionClosed(self.slot.name.to_string()));
        }
        if collections.is_empty() {
            return Err(EngineError::InvalidState(
                "a transaction needs at least one collection".into(),
            ));
        }

        let mut scope = collections.to_vec();
        scope.sort();
        scope.dedup();
        if let Some(missing) = scope.iter().find(|name| !self.collections.contains(*name)) {
            return Err(EngineError::NotFound(missing.to_string()));
        }

        let guards = self.slot.lock_collections(&scope).await;
        trace!(connection_id = self.id, ?mode, collections = ?scope, "transaction started");

        let snapshot = {
            let state = self.slot.state.lock();
            let state = state
                .as_ref()
                .ok_or_else(|| EngineError::NotFound(self.slot.name.to_string()))?;
            let mut snapshot = BTreeMap::new();
            for name in scope {
                let data = state
                    .collections
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| EngineError::NotFound(name.to_string()))?;
                snapshot.insert(name, data);
            }
            snapshot
        };

        match mode {
            TransactionMode::ReadOnly => Ok(Box::new(ReadOnlyTransaction { snapshot })),
            TransactionMode::ReadWrite => Ok(Box::new(ReadWriteTransaction {
                slot: self.slot.clone(),
                working: Mutex::new(Working {
                    collections: snapshot,
                    ..Working::default()
                }),
                _guards: guards,
            })),
        }
    }

    fn on_version_change(&self, handler: VersionChangeHandler) {
        *self.handler.lock() = Some(handler);
    }

    fn close(&self) {
        if self.mark_closed() {
            debug!(connection_id = self.id, database = %self.slot.name, "connection closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn out_of_scope(collection: &CollectionName) -> EngineError {
    EngineError::InvalidState(format!(
        "collection '{collection}' is not in the transaction scope"
    ))
}

struct ReadOnlyTransaction {
    snapshot: Contents,
}

impl ReadOnlyTransaction {
    fn read<R>(
        &self,
        collection: &CollectionName,
        f: impl FnOnce(&BTreeMap<Key, Value>) -> R,
    ) -> Deferred<R> {
        deferred::ready(
            self.snapshot
                .get(collection)
                .map(|data| f(data))
                .ok_or_else(|| out_of_scope(collection)),
        )
    }
}

impl EngineTransaction for ReadOnlyTransaction {
    fn mode(&self) -> TransactionMode {
        TransactionMode::ReadOnly
    }

    fn get(&self, collection: &CollectionName, key: &[u8]) -> Deferred<Option<Value>> {
        self.read(collection, |data| data.get(key).cloned())
    }

    fn put(&self, _collection: &CollectionName, _key: Key, _value: Value) -> Deferred<()> {
        deferred::ready(Err(EngineError::ReadOnly))
    }

    fn delete(&self, _collection: &CollectionName, _key: &[u8]) -> Deferred<()> {
        deferred::ready(Err(EngineError::ReadOnly))
    }

    fn get_all_keys(&self, collection: &CollectionName) -> Deferred<Vec<Key>> {
        self.read(collection, |data| data.keys().cloned().collect())
    }

    fn get_all(&self, collection: &CollectionName) -> Deferred<Vec<Value>> {
        self.read(collection, |data| data.values().cloned().collect())
    }

    fn clear(&self, _collection: &CollectionName) -> Deferred<()> {
        deferred::ready(Err(EngineError::ReadOnly))
    }

    fn commit(self: Box<Self>) -> Deferred<()> {
        deferred::ready(Ok(()))
    }
}

/// Private copies of the transaction's collections.
#[derive(Default)]
struct Working {
    collections: Contents,
    dirty: bool,
    failed: bool,
    finished: bool,
}

struct ReadWriteTransaction {
    slot: Arc<DatabaseSlot>,
    working: Mutex<Working>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ReadWriteTransaction {
    fn read<R>(
        &self,
        collection: &CollectionName,
        f: impl FnOnce(&BTreeMap<Key, Value>) -> R,
    ) -> Result<R, EngineError> {
        let working = self.working.lock();
        working
            .collections
            .get(collection)
            .map(|data| f(data))
            .ok_or_else(|| out_of_scope(collection))
    }

    fn write(
        &self,
        collection: &CollectionName,
        f: impl FnOnce(&mut BTreeMap<Key, Value>),
    ) -> Result<(), EngineError> {
        let mut guard = self.working.lock();
        let working = &mut *guard;
        if working.finished {
            return Err(EngineError::InvalidState("transaction already committed".into()));
        }
        match working.collections.get_mut(collection) {
            Some(data) => {
                f(Arc::make_mut(data));
                working.dirty = true;
                Ok(())
            }
            None => {
                working.failed = true;
                Err(out_of_scope(collection))
            }
        }
    }

    /// Take the writes out, leaving the transaction finished.
    fn finish(&self) -> Result<Option<Contents>, EngineError> {
        let mut working = self.working.lock();
        if working.finished {
            return Err(EngineError::InvalidState("transaction already committed".into()));
        }
        working.finished = true;
        if working.failed {
            return Err(EngineError::InvalidState(
                "transaction has failed requests".into(),
            ));
        }
        if !working.dirty {
            return Ok(None);
        }
        Ok(Some(std::mem::take(&mut working.collections)))
    }
}

impl EngineTransaction for ReadWriteTransaction {
    fn mode(&self) -> TransactionMode {
        TransactionMode::ReadWrite
    }

    fn get(&self, collection: &CollectionName, key: &[u8]) -> Deferred<Option<Value>> {
        deferred::ready(self.read(collection, |data| data.get(key).cloned()))
    }

    fn put(&self, collection: &CollectionName, key: Key, value: Value) -> Deferred<()> {
        deferred::ready(self.write(collection, |data| {
            data.insert(key, value);
        }))
    }

    fn delete(&self, collection: &CollectionName, key: &[u8]) -> Deferred<()> {
        deferred::ready(self.write(collection, |data| {
            data.remove(key);
        }))
    }

    fn get_all_keys(&self, collection: &CollectionName) -> Deferred<Vec<Key>> {
        deferred::ready(self.read(collection, |data| data.keys().cloned().collect()))
    }

    fn get_all(&self, collection: &CollectionName) -> Deferred<Vec<Value>> {
        deferred::ready(self.read(collection, |data| data.values().cloned().collect()))
    }

    fn clear(&self, collection: &CollectionName) -> Deferred<()> {
        deferred::ready(self.write(collection, BTreeMap::clear))
    }

    fn commit(self: Box<Self>) -> Deferred<()> {
        let changed = match self.finish() {
            Ok(Some(changed)) => changed,
            Ok(None) => return deferred::ready(Ok(())),
            Err(err) => return deferred::ready(Err(err)),
        };
        if self.slot.data_dir.is_none() {
            return deferred::ready(self.slot.publish(changed));
        }
        let Ok(handle) = Handle::try_current() else {
            return deferred::ready(Err(EngineError::InvalidState(
                "the in-memory engine needs a tokio runtime".into(),
            )));
        };

        let (settler, deferred) = deferred::pair();
        handle.spawn(async move {
            let result = self.slot.persist_and_publish(changed).await;
            if let Err(err) = &result {
                warn!(database = %self.slot.name, error = %err, "commit failed, writes discarded");
            }
            // Collection locks go before the caller hears back.
            drop(self);
            let _ = settler.settle(result);
        });
        deferred
    }
}

impl Drop for ReadWriteTransaction {
    fn drop(&mut self) {
        let working = self.working.get_mut();
        if working.finished || !working.dirty {
            return;
        }
        if working.failed {
            debug!(database = %self.slot.name, "discarding writes of a failed transaction");
            return;
        }

        let changed = std::mem::take(&mut working.collections);
        if let Err(err) = self.slot.publish(changed) {
            warn!(database = %self.slot.name, error = %err, "dropped transaction could not commit");
            return;
        }
        if self.slot.data_dir.is_none() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!(database = %self.slot.name, "no runtime, snapshot not written");
            return;
        };
        let slot = self.slot.clone();
        handle.spawn(async move {
            if let Err(err) = slot.persist_current().await {
                warn!(database = %slot.name, error = %err, "background snapshot write failed");
            }
        });
    }
}

struct EngineInner {
    data_dir: Option<PathBuf>,
    blocked_grace: Duration,
    slots: Mutex<HashMap<DatabaseName, Arc<DatabaseSlot>>>,
    next_connection_id: AtomicU64,
    opens_issued: AtomicU64,
    snapshot_writes: Arc<AtomicU64>,
    injected_failures: Mutex<HashMap<DatabaseName, EngineError>>,
}

impl EngineInner {
    fn slot(&self, database: &DatabaseName) -> Result<Arc<DatabaseSlot>, EngineError> {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get(database) {
            return Ok(slot.clone());
        }

        let state = match &self.data_dir {
            Some(dir) => snapshot::load(dir, database)?,
            None => None,
        };
        let slot = Arc::new(DatabaseSlot::new(
            database.clone(),
            self.data_dir.clone(),
            state,
            self.snapshot_writes.clone(),
        ));
        slots.insert(database.clone(), slot.clone());
        Ok(slot)
    }

    async fn open(&self, call: OpenCall) -> Result<Arc<InMemoryConnection>, EngineError> {
        let OpenCall {
            database,
            version,
            on_upgrade,
            on_blocked,
            on_version_change,
        } = call;
        let database = &database;

        let injected = self.injected_failures.lock().remove(database);
        if let Some(err) = injected {
            debug!(database = %database, error = %err, "failing open on request");
            return Err(err);
        }

        let slot = self.slot(database)?;
        let _queue = slot.open_queue.lock().await;

        let current = slot.current_version();
        let target = version.or(current).unwrap_or(SchemaVersion::INITIAL);

        if let Some(existing) = current {
            if target < existing {
                return Err(EngineError::VersionTooLow {
                    requested: target.get(),
                    existing: existing.get(),
                });
            }
        }

        if current.map_or(true, |existing| target > existing) {
            let old_version = current.map_or(0, SchemaVersion::get);
            let still_open = slot.request_close(Some(target), self.blocked_grace).await;
            if still_open > 0 {
                warn!(
                    database = %database,
                    stale_connections = still_open,
                    new_version = %target,
                    "upgrade blocked by open connections"
                );
                if let Some(hook) = on_blocked {
                    hook(BlockedEvent {
                        database: database.clone(),
                        old_version,
                        new_version: target,
                        stale_connections: still_open,
                    });
                }
                slot.wait_all_closed().await;
            }
            slot.upgrade(old_version, target, on_upgrade).await?;
        }

        connect(
            &slot,
            self.next_connection_id.fetch_add(1, Ordering::Relaxed),
            on_version_change,
        )
    }

    async fn delete(&self, database: &DatabaseName) -> Result<(), EngineError> {
        let slot = self.slot(database)?;
        let _queue = slot.open_queue.lock().await;

        let still_open = slot.request_close(None, self.blocked_grace).await;
        if still_open > 0 {
            return Err(EngineError::Blocked {
                database: database.to_string(),
                stale_connections: still_open,
            });
        }

        let names = slot.all_collections();
        let _guards = slot.lock_collections(&names).await;
        let _persist = slot.persist_lock.lock().await;
        if let Some(dir) = &slot.data_dir {
            let dir = dir.clone();
            let name = database.clone();
            off_runtime(move || snapshot::remove(&dir, &name)).await?;
        }
        *slot.state.lock() = None;

        info!(database = %database, "database deleted");
        Ok(())
    }
}

/// Process-local storage engine.
///
/// Needs a tokio runtime: opens and deletes run as spawned tasks.
#[derive(Clone)]
pub struct InMemoryEngine {
    inner: Arc<EngineInner>,
}

impl Default for InMemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryEngine {
    pub fn new() -> Self {
        Self::with_config(&CoordinatorConfig::default())
    }

    /// Uses `data_dir` for snapshots and `blocked_grace` for upgrades.
    pub fn with_config(config: &CoordinatorConfig) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                data_dir: config.data_dir.clone(),
                blocked_grace: config.blocked_grace,
                slots: Mutex::new(HashMap::new()),
                next_connection_id: AtomicU64::new(1),
                opens_issued: AtomicU64::new(0),
                snapshot_writes: Arc::new(AtomicU64::new(0)),
                injected_failures: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Number of `open` calls received so far.
    pub fn opens_issued(&self) -> u64 {
        self.inner.opens_issued.load(Ordering::Relaxed)
    }

    /// Snapshot files written so far, across all databases.
    pub fn snapshot_writes(&self) -> u64 {
        self.inner.snapshot_writes.load(Ordering::Relaxed)
    }

    /// Make the next open of `database` fail with `err`.
    pub fn fail_next_open(&self, database: impl Into<DatabaseName>, err: EngineError) {
        self.inner
            .injected_failures
            .lock()
            .insert(database.into(), err);
    }

    /// Open connections to `database`.
    pub fn open_connections(&self, database: &DatabaseName) -> usize {
        self.inner
            .slots
            .lock()
            .get(database)
            .map_or(0, |slot| slot.live_connections())
    }
}

impl StorageEngine for InMemoryEngine {
    fn open(&self, call: OpenCall, settler: Settler<Arc<dyn EngineConnection>>) {
        self.inner.opens_issued.fetch_add(1, Ordering::Relaxed);

        let Ok(handle) = Handle::try_current() else {
            settler.reject(EngineError::InvalidState(
                "the in-memory engine needs a tokio runtime".into(),
            ));
            return;
        };

        let inner = self.inner.clone();
        handle.spawn(async move {
            let database = call.database.clone();
            match inner.open(call).await {
                Ok(connection) => {
                    let connection: Arc<dyn EngineConnection> = connection;
                    if let Err(orphan) = settler.resolve(connection) {
                        debug!(
                            database = %database,
                            connection_id = orphan.id(),
                            "open already rejected, closing late connection"
                        );
                        orphan.close();
                    }
                }
                Err(err) => {
                    debug!(database = %database, error = %err, "open failed");
                    settler.reject(err);
                }
            }
        });
    }

    fn delete_database(&self, database: &DatabaseName) -> Deferred<()> {
        let Ok(handle) = Handle::try_current() else {
            return deferred::ready(Err(EngineError::InvalidState(
                "the in-memory engine needs a tokio runtime".into(),
            )));
        };

        let (settler, deferred) = deferred::pair();
        let inner = self.inner.clone();
        let database = database.clone();
        handle.spawn(async move {
            let _ = settler.settle(inner.delete(&database).await);
        });
        deferred
    }

    fn databases(&self) -> Vec<(DatabaseName, SchemaVersion)> {
        let slots = self.inner.slots.lock();
        let mut databases: Vec<_> = slots
            .values()
            .filter_map(|slot| {
                slot.current_version()
                    .map(|version| (slot.name.clone(), version))
            })
            .collect();
        databases.sort();
        databases
    }
}
