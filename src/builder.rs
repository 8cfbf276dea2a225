use crate::cache::{Cache, LoadingCache};
use crate::entry::ExpiryConfig;
use crate::error::BoxError;
use crate::listener::Listener;
use crate::loader::Executor;
use crate::policy::{self, PolicyKind};
use crate::shared::CacheShared;
use crate::stats::{ConcurrentStatsCounter, StatsCounter};
use crate::store::ShardedStore;
use crate::task::{Maintenance, MaintenanceContext};

use std::hash::{BuildHasher, Hash};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

/// Hard ceiling on `maximum_size`.
const MAXIMUM_CAPACITY: usize = 1 << 30;
/// Buffer size of each maintenance event queue. Producers block when a queue
/// is full, throttling themselves to the rate bookkeeping can be applied.
const EVENT_QUEUE_CAPACITY: usize = 16;

/// Builder for [`Cache`] and [`LoadingCache`].
///
/// All options are optional; construction never fails and out-of-range
/// values are normalized. A zero `maximum_size` means unlimited, and zero
/// durations disable the corresponding behavior.
pub struct CacheBuilder<K, V, S = ahash::RandomState> {
  cap: usize,
  shards: usize,
  policy: PolicyKind,
  expire_after_access: Option<Duration>,
  expire_after_write: Option<Duration>,
  refresh_after_write: Option<Duration>,
  on_insertion: Option<Listener<K, V>>,
  on_removal: Option<Listener<K, V>>,
  stats: Option<Arc<dyn StatsCounter>>,
  executor: Option<Arc<dyn Executor>>,
  hasher: S,
  _marker: PhantomData<fn(K, V)>,
}

impl<K, V> CacheBuilder<K, V, ahash::RandomState> {
  pub fn new() -> Self {
    Self {
      cap: 0,
      shards: (num_cpus::get() * 4).max(1).next_power_of_two(),
      policy: PolicyKind::default(),
      expire_after_access: None,
      expire_after_write: None,
      refresh_after_write: None,
      on_insertion: None,
      on_removal: None,
      stats: None,
      executor: None,
      hasher: ahash::RandomState::default(),
      _marker: PhantomData,
    }
  }
}

impl<K, V> Default for CacheBuilder<K, V, ahash::RandomState> {
  fn default() -> Self {
    Self::new()
  }
}

impl<K, V, S> CacheBuilder<K, V, S> {
  /// Bounds the cache to `size` entries. Zero means unlimited; anything
  /// above 2^30 is capped there.
  pub fn maximum_size(mut self, size: usize) -> Self {
    self.cap = size.min(MAXIMUM_CAPACITY);
    self
  }

  /// Selects the replacement policy. Defaults to LRU.
  pub fn policy(mut self, policy: PolicyKind) -> Self {
    self.policy = policy;
    self
  }

  /// Number of shards for the concurrent hash table, rounded up to a power
  /// of two. Defaults to four per CPU.
  pub fn shards(mut self, shards: usize) -> Self {
    self.shards = shards.max(1).next_power_of_two();
    self
  }

  /// Expires an entry once `duration` passes without a successful read.
  /// `Duration::ZERO` disables access expiration.
  pub fn expire_after_access(mut self, duration: Duration) -> Self {
    self.expire_after_access = (!duration.is_zero()).then_some(duration);
    self
  }

  /// Expires an entry once `duration` passes since its insert or refresh.
  /// `Duration::ZERO` disables write expiration.
  pub fn expire_after_write(mut self, duration: Duration) -> Self {
    self.expire_after_write = (!duration.is_zero()).then_some(duration);
    self
  }

  /// Refresh threshold for entries whose write is older than `duration`.
  /// Only meaningful for a [`LoadingCache`]; `Duration::ZERO` disables it.
  ///
  /// The read path currently schedules refreshes only for expired entries,
  /// so this threshold is stored but not yet consulted.
  pub fn refresh_after_write(mut self, duration: Duration) -> Self {
    self.refresh_after_write = (!duration.is_zero()).then_some(duration);
    self
  }

  /// Called with `(key, value)` for every entry removed by eviction,
  /// expiration, invalidation, or close.
  ///
  /// Listeners run synchronously on the maintenance task and must not block.
  pub fn removal_listener(mut self, listener: impl Fn(&K, &Arc<V>) + Send + Sync + 'static) -> Self {
    self.on_removal = Some(Arc::new(listener));
    self
  }

  /// Called with `(key, value)` when an entry is admitted by the policy.
  ///
  /// Same contract as [`removal_listener`](Self::removal_listener): runs on
  /// the maintenance task, must not block.
  pub fn insertion_listener(
    mut self,
    listener: impl Fn(&K, &Arc<V>) + Send + Sync + 'static,
  ) -> Self {
    self.on_insertion = Some(Arc::new(listener));
    self
  }

  /// Replaces the default in-memory stats counter.
  pub fn stats_counter(mut self, stats: impl StatsCounter + 'static) -> Self {
    self.stats = Some(Arc::new(stats));
    self
  }

  /// Runs asynchronous refreshes on `executor` instead of detached threads.
  pub fn executor(mut self, executor: impl Executor + 'static) -> Self {
    self.executor = Some(Arc::new(executor));
    self
  }

  /// Replaces the hasher supplying the 64-bit key digests.
  pub fn hasher<S2: BuildHasher>(self, hasher: S2) -> CacheBuilder<K, V, S2> {
    CacheBuilder {
      cap: self.cap,
      shards: self.shards,
      policy: self.policy,
      expire_after_access: self.expire_after_access,
      expire_after_write: self.expire_after_write,
      refresh_after_write: self.refresh_after_write,
      on_insertion: self.on_insertion,
      on_removal: self.on_removal,
      stats: self.stats,
      executor: self.executor,
      hasher,
      _marker: PhantomData,
    }
  }
}

impl<K, V, S> CacheBuilder<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  S: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Builds a plain cache.
  pub fn build(self) -> Cache<K, V, S> {
    Cache {
      shared: self.build_shared(None),
    }
  }

  /// Builds a loading cache around `loader`.
  ///
  /// The loader is invoked synchronously for misses in
  /// [`LoadingCache::get`] and asynchronously for refreshes.
  pub fn build_with_loader(
    self,
    loader: impl Fn(&K) -> Result<V, BoxError> + Send + Sync + 'static,
  ) -> LoadingCache<K, V, S> {
    LoadingCache {
      shared: self.build_shared(Some(Arc::new(loader))),
    }
  }

  fn build_shared(
    self,
    loader: Option<Arc<dyn Fn(&K) -> Result<V, BoxError> + Send + Sync>>,
  ) -> Arc<CacheShared<K, V, S>> {
    let store = Arc::new(ShardedStore::new(self.shards, self.hasher.clone()));
    let stats = self
      .stats
      .unwrap_or_else(|| Arc::new(ConcurrentStatsCounter::new()));
    let expiry = ExpiryConfig::new(
      self.expire_after_access,
      self.expire_after_write,
      self.refresh_after_write,
    );

    let (add_tx, add_rx) = crossbeam_channel::bounded(EVENT_QUEUE_CAPACITY);
    let (hit_tx, hit_rx) = crossbeam_channel::bounded(EVENT_QUEUE_CAPACITY);
    let (delete_tx, delete_rx) = crossbeam_channel::bounded(EVENT_QUEUE_CAPACITY);

    let maintenance = Maintenance::spawn(MaintenanceContext {
      store: Arc::clone(&store),
      policy: policy::build(self.policy, Arc::clone(&store), self.cap),
      stats: Arc::clone(&stats),
      expiry,
      on_insertion: self.on_insertion,
      on_removal: self.on_removal,
      add_rx,
      hit_rx,
      delete_rx,
    });

    Arc::new(CacheShared {
      store,
      stats,
      expiry,
      cap: self.cap,
      loader,
      executor: self.executor,
      add_tx,
      hit_tx,
      delete_tx,
      maintenance,
    })
  }
}
