use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};

use shared::error::FetchFailure;
use tokio::{
    sync::{broadcast, watch},
    task::AbortHandle,
    time::Instant,
};
use tracing::debug;

use crate::query::{QueryData, QueryKey, QueryState, QueryStatus};

pub(crate) type CachedQuery = QueryState<QueryData>;

const DEFAULT_STALE_TIME: Duration = Duration::from_secs(15 * 60);
const DEFAULT_RETENTION: Duration = Duration::from_secs(15 * 60);
const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// How long a successful result is served without going back to the network.
    pub stale_time: Duration,
    /// How long an entry nobody subscribes to is kept after its last activity.
    pub retention: Duration,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            retention: DEFAULT_RETENTION,
        }
    }
}

/// A status transition published by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    pub key: QueryKey,
    pub status: QueryStatus,
}

/// A counted interest in one cache entry. Every `EntryWatch` handed out must be given back to
/// [`QueryCache::release`] with its `entry_id`.
pub(crate) struct EntryWatch {
    pub(crate) entry_id: u64,
    pub(crate) receiver: watch::Receiver<CachedQuery>,
}

pub(crate) enum Begin {
    Fresh(CachedQuery),
    Wait(EntryWatch),
    Run { generation: u64, watch: EntryWatch },
}

struct CacheEntry {
    /// Distinguishes this entry from a later one created under the same key.
    id: u64,
    state: watch::Sender<CachedQuery>,
    generation: u64,
    subscribers: usize,
    stale: bool,
    /// State to restore if the in-flight request is abandoned.
    rollback: Option<CachedQuery>,
    request: Option<AbortHandle>,
    last_active: Instant,
}

impl CacheEntry {
    fn new(id: u64, now: Instant) -> Self {
        let (state, _) = watch::channel(QueryState::idle());
        Self {
            id,
            state,
            generation: 0,
            subscribers: 0,
            stale: false,
            rollback: None,
            request: None,
            last_active: now,
        }
    }

    fn watch(&mut self) -> EntryWatch {
        self.subscribers += 1;
        EntryWatch {
            entry_id: self.id,
            receiver: self.state.subscribe(),
        }
    }

    fn cancel_request(&mut self) {
        if let Some(request) = self.request.take() {
            request.abort();
        }
    }

    fn snapshot(&self) -> CachedQuery {
        self.state.borrow().clone()
    }

    fn status(&self) -> QueryStatus {
        self.state.borrow().status
    }
}

/// Query results keyed by [`QueryKey`].
///
/// Created once by the application and handed to a [`crate::QueryClient`]. Only the client
/// mutates it; everything else reads through `status`, `contains` or `events`.
pub struct QueryCache {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    next_generation: AtomicU64,
    options: QueryOptions,
    events: broadcast::Sender<QueryEvent>,
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(QueryOptions::default())
    }
}

impl QueryCache {
    pub fn new(options: QueryOptions) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
            options,
            events,
        }
    }

    pub fn options(&self) -> QueryOptions {
        self.options
    }

    pub fn status(&self, key: &QueryKey) -> QueryStatus {
        self.entries()
            .get(key)
            .map(CacheEntry::status)
            .unwrap_or_default()
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn events(&self) -> broadcast::Receiver<QueryEvent> {
        self.events.subscribe()
    }

    /// Drops every entry. In-flight requests resolve into nothing and waiters see `idle`.
    pub fn clear(&self) {
        let mut entries = self.entries();
        for (key, entry) in entries.iter_mut() {
            entry.cancel_request();
            if entry.status() == QueryStatus::Loading {
                entry.state.send_replace(QueryState::idle());
                self.publish(key, QueryStatus::Idle);
            }
        }
        entries.clear();
        debug!("cache: cleared");
    }

    /// Marks `key` stale so the next fetch goes to the network. An in-flight request for the
    /// key is abandoned.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return false;
        };
        entry.stale = true;
        if entry.status() == QueryStatus::Loading {
            self.abandon_entry(key, entry);
        }
        debug!("cache: invalidated key={key}");
        true
    }

    /// Removes entries with no subscriber, no request in flight and no activity within the
    /// retention window.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let retention = self.options.retention;
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|key, entry| {
            let keep = entry.subscribers > 0
                || entry.status() == QueryStatus::Loading
                || now.duration_since(entry.last_active) < retention;
            if !keep {
                debug!("cache: evicted key={key}");
            }
            keep
        });
        before - entries.len()
    }

    pub(crate) fn snapshot(&self, key: &QueryKey) -> CachedQuery {
        self.entries()
            .get(key)
            .map(CacheEntry::snapshot)
            .unwrap_or_default()
    }

    /// Decides how a fetch of `key` proceeds. `Wait` and `Run` register the caller as a
    /// subscriber until it releases its watch.
    pub(crate) fn begin(&self, key: &QueryKey) -> Begin {
        let now = Instant::now();
        let mut entries = self.entries();
        let entry = self.entry_for(&mut entries, key, now);
        entry.last_active = now;

        let current = entry.snapshot();
        if current.is_loading() {
            return Begin::Wait(entry.watch());
        }
        if !entry.stale && current.is_fresh(now, self.options.stale_time) {
            return Begin::Fresh(current);
        }

        let generation = self.next_generation();
        entry.generation = generation;
        entry.stale = false;
        entry.state.send_replace(QueryState {
            status: QueryStatus::Loading,
            data: current.data.clone(),
            error: None,
            updated_at: current.updated_at,
        });
        entry.rollback = Some(current);
        self.publish(key, QueryStatus::Loading);
        Begin::Run {
            generation,
            watch: entry.watch(),
        }
    }

    /// Ties the task running `generation` to its entry so abandoning the request aborts it.
    pub(crate) fn attach_request(&self, key: &QueryKey, generation: u64, request: AbortHandle) {
        let mut entries = self.entries();
        match entries.get_mut(key) {
            Some(entry)
                if entry.generation == generation && entry.status() == QueryStatus::Loading =>
            {
                entry.request = Some(request);
            }
            _ => request.abort(),
        }
    }

    /// Whether `entry_id` still names the live entry for `key`.
    pub(crate) fn holds_entry(&self, key: &QueryKey, entry_id: u64) -> bool {
        self.entries()
            .get(key)
            .is_some_and(|entry| entry.id == entry_id)
    }

    /// Applies a result if `generation` is still the key's current request. Returns `None`
    /// when the result arrived for a request that was abandoned in the meantime.
    pub(crate) fn complete(
        &self,
        key: &QueryKey,
        generation: u64,
        result: Result<QueryData, FetchFailure>,
    ) -> Option<CachedQuery> {
        let now = Instant::now();
        let mut entries = self.entries();
        let entry = entries.get_mut(key)?;
        if entry.generation != generation || entry.status() != QueryStatus::Loading {
            return None;
        }

        let previous = entry.snapshot();
        let next = match result {
            Ok(data) => QueryState {
                status: QueryStatus::Success,
                data: Some(data),
                error: None,
                updated_at: Some(now),
            },
            Err(err) => QueryState {
                status: QueryStatus::Error,
                data: previous.data,
                error: Some(err),
                updated_at: previous.updated_at,
            },
        };
        entry.rollback = None;
        entry.request = None;
        entry.last_active = now;
        entry.state.send_replace(next.clone());
        self.publish(key, next.status);
        Some(next)
    }

    pub(crate) fn subscribe(&self, key: &QueryKey) -> EntryWatch {
        let now = Instant::now();
        let mut entries = self.entries();
        let entry = self.entry_for(&mut entries, key, now);
        entry.last_active = now;
        entry.watch()
    }

    /// Drops one subscriber. When the last one leaves while a request is in flight, the
    /// request is abandoned so its late result is never applied. Watches taken from an entry
    /// that has since been cleared or evicted are ignored.
    pub(crate) fn release(&self, key: &QueryKey, entry_id: u64) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.id != entry_id {
            return;
        }
        entry.subscribers = entry.subscribers.saturating_sub(1);
        entry.last_active = Instant::now();
        if entry.subscribers == 0 && entry.status() == QueryStatus::Loading {
            self.abandon_entry(key, entry);
        }
    }

    fn abandon_entry(&self, key: &QueryKey, entry: &mut CacheEntry) {
        entry.cancel_request();
        entry.generation = self.next_generation();
        entry.stale = true;
        let restored = entry.rollback.take().unwrap_or_default();
        let status = restored.status;
        entry.state.send_replace(restored);
        debug!("cache: abandoned in-flight request key={key}");
        self.publish(key, status);
    }

    fn entry_for<'a>(
        &self,
        entries: &'a mut HashMap<QueryKey, CacheEntry>,
        key: &QueryKey,
        now: Instant,
    ) -> &'a mut CacheEntry {
        entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(self.next_generation(), now))
    }

    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed)
    }

    fn publish(&self, key: &QueryKey, status: QueryStatus) {
        let _ = self.events.send(QueryEvent {
            key: key.clone(),
            status,
        });
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/cache_tests.rs"]
mod tests;
