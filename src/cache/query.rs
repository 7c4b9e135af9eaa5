//! Query Cache Module
//!
//! Stale-while-revalidate memoization of asynchronous reads, keyed by query
//! name. Concurrent fetches for the same name are coalesced into one
//! producer invocation.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::cache::{
    CacheObserver, CacheStats, CacheStore, Clock, EntryInfo, StatsCounters, SystemClock,
    TracingObserver,
};
use crate::config::{CacheConfig, QueryOptions};
use crate::error::Result;

/// A fetch shared by every caller waiting on the same query name.
type SharedFetch<T, E> = Shared<BoxFuture<'static, std::result::Result<T, E>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchKind {
    Miss,
    Refresh,
}

/// Outcome of a lookup taken under the write lock.
enum Lookup<T, E> {
    Fresh { data: T, age_ms: u64 },
    Stale { data: T, age_ms: u64 },
    Miss(SharedFetch<T, E>),
}

// == Cache State ==
/// Store and in-flight registry live under one lock so a lookup and the
/// decision to start a fetch are atomic.
struct CacheState<T, E> {
    store: CacheStore<T>,
    in_flight: HashMap<String, SharedFetch<T, E>>,
}

struct Inner<T, E> {
    state: RwLock<CacheState<T, E>>,
    stats: StatsCounters,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
}

// == Query Cache ==
/// Process-local cache in front of database reads.
///
/// Cloning is cheap and every clone shares the same store.
///
/// # Example
/// ```ignore
/// let cache: QueryCache<Vec<Category>, DbError> = QueryCache::new(CacheConfig::from_env())?;
/// let categories = cache
///     .cached_query("categories", || db.fetch_categories(), QueryOptions::with_ttl_ms(7_200_000))
///     .await?;
/// ```
pub struct QueryCache<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for QueryCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// == Builder ==
/// Assembles a `QueryCache` with a custom clock or observer.
pub struct QueryCacheBuilder {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn CacheObserver>,
}

impl QueryCacheBuilder {
    /// Starts a builder with the system clock and tracing observer.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Replaces the wall clock.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the default `TracingObserver`.
    pub fn observer(mut self, observer: Arc<dyn CacheObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Validates the config and builds the cache.
    pub fn build<T, E>(self) -> Result<QueryCache<T, E>> {
        self.config.validate()?;
        let store = CacheStore::new(self.config.max_entries, self.config.eviction_fraction);
        Ok(QueryCache {
            inner: Arc::new(Inner {
                state: RwLock::new(CacheState {
                    store,
                    in_flight: HashMap::new(),
                }),
                stats: StatsCounters::new(),
                config: self.config,
                clock: self.clock,
                observer: self.observer,
            }),
        })
    }
}

impl<T, E> QueryCache<T, E> {
    /// Creates a cache with the system clock and tracing observer.
    pub fn new(config: CacheConfig) -> Result<Self> {
        QueryCacheBuilder::new(config).build()
    }

    /// Configuration this cache was built with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    // == Diagnostics ==
    /// Snapshot of the diagnostic counters.
    pub async fn stats(&self) -> CacheStats {
        let total_entries = self.len().await;
        self.inner.stats.snapshot(total_entries)
    }

    // == Length ==
    /// Returns the current number of cached entries.
    pub async fn len(&self) -> usize {
        self.inner.state.read().await.store.len()
    }

    // == Is Empty ==
    /// Returns true if nothing is cached.
    pub async fn is_empty(&self) -> bool {
        self.inner.state.read().await.store.is_empty()
    }

    // == Contains ==
    /// Returns true if an entry exists for `query_name`, stale or not.
    pub async fn contains(&self, query_name: &str) -> bool {
        self.inner.state.read().await.store.contains(query_name)
    }

    // == Entry Info ==
    /// Metadata for one entry, without cloning its value.
    pub async fn entry_info(&self, query_name: &str) -> Option<EntryInfo> {
        let now = self.inner.clock.now_ms();
        let state = self.inner.state.read().await;
        state
            .store
            .get(query_name)
            .map(|entry| entry.info(query_name, now))
    }

    // == Is Refreshing ==
    /// True while a fetch for `query_name` is in flight.
    pub async fn is_refreshing(&self, query_name: &str) -> bool {
        self.inner
            .state
            .read()
            .await
            .in_flight
            .contains_key(query_name)
    }
}

impl<T, E> QueryCache<T, E>
where
    T: Clone + Serialize + Send + Sync + 'static,
    E: Clone + Display + Send + Sync + 'static,
{
    // == Cached Query ==
    /// Returns the cached value for `query_name`, fetching it with `producer`
    /// when absent.
    ///
    /// - Absent: waits for a fetch (shared with concurrent callers), caches
    ///   and returns it. Producer errors are returned unchanged and nothing
    ///   is cached.
    /// - Older than `ttl * early_refresh_fraction`: returns the cached value
    ///   at once and refreshes it in the background. A failed refresh keeps
    ///   the old entry.
    /// - Otherwise: returns the cached value.
    ///
    /// `producer` is only called when a new fetch is started.
    pub async fn cached_query<F, Fut>(
        &self,
        query_name: &str,
        producer: F,
        options: QueryOptions,
    ) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let ttl = options.effective_ttl(&self.inner.config);
        let fraction = self.inner.config.early_refresh_fraction;

        // Fresh hits only need the read lock
        let fresh = {
            let state = self.inner.state.read().await;
            let now = self.inner.clock.now_ms();
            state
                .store
                .get(query_name)
                .filter(|entry| !entry.is_stale(now, ttl, fraction))
                .map(|entry| (entry.data.clone(), entry.age_ms(now)))
        };
        if let Some((data, age_ms)) = fresh {
            self.inner.stats.record_hit();
            self.inner.observer.on_hit(query_name, age_ms);
            return Ok(data);
        }

        // Another caller may have stored or refreshed the entry in between
        let lookup = {
            let mut state = self.inner.state.write().await;
            let now = self.inner.clock.now_ms();

            let cached = state.store.get(query_name).map(|entry| {
                (
                    entry.data.clone(),
                    entry.age_ms(now),
                    entry.is_stale(now, ttl, fraction),
                )
            });

            match cached {
                Some((data, age_ms, false)) => Lookup::Fresh { data, age_ms },
                Some((data, age_ms, true)) => {
                    if !state.in_flight.contains_key(query_name) {
                        self.inner.stats.record_refresh();
                        let _ = self.start_fetch(
                            &mut state,
                            query_name,
                            producer(),
                            FetchKind::Refresh,
                        );
                    }
                    Lookup::Stale { data, age_ms }
                }
                None => match state.in_flight.get(query_name).cloned() {
                    Some(pending) => Lookup::Miss(pending),
                    None => Lookup::Miss(self.start_fetch(
                        &mut state,
                        query_name,
                        producer(),
                        FetchKind::Miss,
                    )),
                },
            }
        };

        match lookup {
            Lookup::Fresh { data, age_ms } => {
                self.inner.stats.record_hit();
                self.inner.observer.on_hit(query_name, age_ms);
                Ok(data)
            }
            Lookup::Stale { data, age_ms } => {
                self.inner.stats.record_stale_hit();
                self.inner.observer.on_stale_hit(query_name, age_ms);
                Ok(data)
            }
            Lookup::Miss(fetch) => {
                self.inner.stats.record_miss();
                self.inner.observer.on_miss(query_name);
                fetch.await
            }
        }
    }

    // == Start Fetch ==
    /// Registers a shared fetch for `query_name` and spawns a task that
    /// drives it to completion, so waiters dropping out never cancel it.
    fn start_fetch<Fut>(
        &self,
        state: &mut CacheState<T, E>,
        query_name: &str,
        fetch: Fut,
        kind: FetchKind,
    ) -> SharedFetch<T, E>
    where
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let weak = Arc::downgrade(&self.inner);
        let name = query_name.to_string();
        let shared = async move {
            let result = fetch.await;
            if let Some(inner) = weak.upgrade() {
                inner.finish_fetch(&name, &result, kind).await;
            }
            result
        }
        .boxed()
        .shared();

        state
            .in_flight
            .insert(query_name.to_string(), shared.clone());

        let driver = shared.clone();
        tokio::spawn(async move {
            let _ = driver.await;
        });

        shared
    }
}

impl<T, E> Inner<T, E>
where
    T: Clone + Serialize + Send + Sync + 'static,
    E: Clone + Display + Send + Sync + 'static,
{
    /// Stores a successful result, counts a failed refresh, and clears the
    /// in-flight slot. Observers are notified once the lock is released.
    async fn finish_fetch(
        &self,
        name: &str,
        result: &std::result::Result<T, E>,
        kind: FetchKind,
    ) {
        let stored = {
            let mut state = self.state.write().await;

            let stored = match result {
                Ok(data) => {
                    let now = self.clock.now_ms();
                    let evicted = state.store.insert(name, data.clone(), now);
                    self.stats.record_evictions(evicted.len());
                    let size = state.store.get(name).and_then(|entry| entry.size);
                    Some((size, evicted))
                }
                Err(_) => {
                    if kind == FetchKind::Refresh {
                        self.stats.record_refresh_failure();
                    }
                    None
                }
            };

            state.in_flight.remove(name);
            stored
        };

        match (stored, result) {
            (Some((size, evicted)), _) => {
                self.observer.on_stored(name, size);
                if !evicted.is_empty() {
                    self.observer.on_evicted(&evicted);
                }
            }
            (None, Err(error)) if kind == FetchKind::Refresh => {
                self.observer.on_refresh_failed(name, error);
            }
            _ => {}
        }
    }
}
