use std::{
    marker::PhantomData,
    sync::{Arc, Weak},
    time::Duration,
};

use futures::{stream, Stream, StreamExt};
use shared::{
    domain::LaunchId,
    protocol::{Launch, Rocket},
};
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::{
    cache::{Begin, CachedQuery, EntryWatch, QueryCache, QueryEvent},
    gateway::LaunchGateway,
    query::{
        DependentQuery, DependentState, LaunchDetailQuery, LaunchesQuery, QueryDescriptor,
        QueryKey, QueryState,
    },
};

/// Runs queries against a gateway and records their state in an injected [`QueryCache`].
///
/// At most one request per key is in flight; concurrent callers for the same key wait for that
/// request instead of issuing their own.
#[derive(Clone)]
pub struct QueryClient {
    gateway: Arc<dyn LaunchGateway>,
    cache: Arc<QueryCache>,
}

impl QueryClient {
    pub fn new(gateway: Arc<dyn LaunchGateway>, cache: Arc<QueryCache>) -> Self {
        Self { gateway, cache }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn events(&self) -> broadcast::Receiver<QueryEvent> {
        self.cache.events()
    }

    /// Status transitions for every key. Events missed by a lagging consumer are skipped.
    pub fn event_stream(&self) -> impl Stream<Item = QueryEvent> {
        BroadcastStream::new(self.cache.events()).filter_map(|event| async move {
            match event {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!("query: event stream skipped events error={err}");
                    None
                }
            }
        })
    }

    /// Resolves `query` from the cache, by joining the request already in flight for its key,
    /// or by starting a new one. The request runs on its own task, so it survives this caller
    /// as long as another fetch or subscription still waits on the key.
    pub async fn fetch<Q: QueryDescriptor>(&self, query: &Q) -> QueryState<Q::Output> {
        let key = query.key();
        loop {
            let entry_watch = match self.cache.begin(&key) {
                Begin::Fresh(state) => {
                    debug!("query: cache hit key={key}");
                    return state.typed::<Q>();
                }
                Begin::Wait(entry_watch) => {
                    debug!("query: joining in-flight request key={key}");
                    entry_watch
                }
                Begin::Run {
                    generation,
                    watch: entry_watch,
                } => {
                    debug!("query: fetching key={key} generation={generation}");
                    self.start_request(query, &key, generation);
                    entry_watch
                }
            };

            let EntryWatch {
                entry_id,
                mut receiver,
            } = entry_watch;
            let _claim = EntryClaim {
                cache: &self.cache,
                key: &key,
                entry_id,
            };
            let settled = match receiver.wait_for(|state| !state.is_loading()).await {
                Ok(state) => Some(state.clone()),
                Err(_) => None,
            };

            match settled {
                Some(state) if state.is_idle() && self.cache.holds_entry(&key, entry_id) => {
                    debug!("query: request abandoned, retrying key={key}");
                }
                Some(state) => return state.typed::<Q>(),
                None => return QueryState::idle(),
            }
        }
    }

    fn start_request<Q: QueryDescriptor>(&self, query: &Q, key: &QueryKey, generation: u64) {
        let query = query.clone();
        let gateway = Arc::clone(&self.gateway);
        let cache = Arc::clone(&self.cache);
        let request_key = key.clone();
        let task = tokio::spawn(async move {
            let result = query.run(gateway.as_ref()).await;
            match &result {
                Ok(_) => info!("query: fetched key={request_key}"),
                Err(err) => warn!("query: fetch failed key={request_key} error={err}"),
            }
            if cache.complete(&request_key, generation, result).is_none() {
                debug!("query: discarded late result key={request_key} generation={generation}");
            }
        });
        self.cache
            .attach_request(key, generation, task.abort_handle());
    }

    /// Current state for `query` without touching the network.
    pub fn state<Q: QueryDescriptor>(&self, query: &Q) -> QueryState<Q::Output> {
        self.cache.snapshot(&query.key()).typed::<Q>()
    }

    pub fn subscribe<Q: QueryDescriptor>(&self, query: &Q) -> QuerySubscription<Q> {
        let key = query.key();
        let EntryWatch { entry_id, receiver } = self.cache.subscribe(&key);
        QuerySubscription {
            cache: Arc::clone(&self.cache),
            key,
            entry_id,
            receiver,
            _query: PhantomData,
        }
    }

    /// Runs the parent, then the child derived from the parent's payload. The child request is
    /// only issued after the parent's success has been published.
    pub async fn fetch_dependent<P, C>(
        &self,
        edge: &DependentQuery<P, C>,
    ) -> DependentState<P::Output, C::Output>
    where
        P: QueryDescriptor,
        C: QueryDescriptor,
    {
        let parent = self.fetch(&edge.parent).await;
        let Some(child_query) = edge.child_for(&parent) else {
            debug!(
                "query: dependent child gated parent={} status={}",
                edge.parent.key(),
                parent.status
            );
            return DependentState {
                parent,
                child: QueryState::idle(),
                child_enabled: false,
            };
        };

        let child = self.fetch(&child_query).await;
        DependentState {
            parent,
            child,
            child_enabled: true,
        }
    }

    pub fn dependent_state<P, C>(
        &self,
        edge: &DependentQuery<P, C>,
    ) -> DependentState<P::Output, C::Output>
    where
        P: QueryDescriptor,
        C: QueryDescriptor,
    {
        let parent = self.state(&edge.parent);
        match edge.child_for(&parent) {
            Some(child_query) => DependentState {
                child: self.state(&child_query),
                parent,
                child_enabled: true,
            },
            None => DependentState {
                parent,
                child: QueryState::idle(),
                child_enabled: false,
            },
        }
    }

    pub async fn launches(&self) -> QueryState<Arc<Vec<Launch>>> {
        self.fetch(&LaunchesQuery).await
    }

    pub async fn launch_detail(&self, id: &LaunchId) -> DependentState<Arc<Launch>, Arc<Rocket>> {
        self.fetch_dependent(&LaunchDetailQuery::launch_detail(id.clone()))
            .await
    }

    pub fn invalidate(&self, key: &QueryKey) -> bool {
        self.cache.invalidate(key)
    }

    pub async fn refetch<Q: QueryDescriptor>(&self, query: &Q) -> QueryState<Q::Output> {
        self.cache.invalidate(&query.key());
        self.fetch(query).await
    }

    pub fn evict_expired(&self) -> usize {
        self.cache.evict_expired()
    }

    /// Periodically evicts expired entries until the cache is dropped.
    pub fn spawn_eviction_task(&self, period: Duration) -> JoinHandle<()> {
        let cache: Weak<QueryCache> = Arc::downgrade(&self.cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let evicted = cache.evict_expired();
                if evicted > 0 {
                    debug!("cache: eviction pass removed={evicted}");
                }
            }
        })
    }
}

/// A waiting fetch counts as a subscriber of its key until it returns or is dropped.
struct EntryClaim<'a> {
    cache: &'a QueryCache,
    key: &'a QueryKey,
    entry_id: u64,
}

impl Drop for EntryClaim<'_> {
    fn drop(&mut self) {
        self.cache.release(self.key, self.entry_id);
    }
}

/// A live view of one query key. Once the last subscription and the last waiting fetch of a
/// loading key are gone, its request is abandoned.
pub struct QuerySubscription<Q: QueryDescriptor> {
    cache: Arc<QueryCache>,
    key: QueryKey,
    entry_id: u64,
    receiver: watch::Receiver<CachedQuery>,
    _query: PhantomData<fn() -> Q>,
}

impl<Q: QueryDescriptor> QuerySubscription<Q> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn current(&self) -> QueryState<Q::Output> {
        self.receiver.borrow().typed::<Q>()
    }

    /// Waits for the next transition. `None` once the cache entry is gone.
    pub async fn changed(&mut self) -> Option<QueryState<Q::Output>> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().typed::<Q>())
    }

    /// The current state followed by every later transition.
    pub fn into_stream(self) -> impl Stream<Item = QueryState<Q::Output>> {
        let current = self.current();
        stream::once(async move { current }).chain(stream::unfold(
            self,
            |mut subscription| async move {
                let state = subscription.changed().await?;
                Some((state, subscription))
            },
        ))
    }
}

impl<Q: QueryDescriptor> Drop for QuerySubscription<Q> {
    fn drop(&mut self) {
        self.cache.release(&self.key, self.entry_id);
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
