use crate::builder::CacheBuilder;
use crate::error::LoadError;
use crate::shared::CacheShared;
use crate::stats::Stats;

use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// A concurrent in-process cache.
///
/// Handles are cheap to clone and share one underlying cache. Values are
/// returned as `Arc<V>` clones; a reader observes some committed value for
/// the key, never a torn one.
///
/// After [`close`](Cache::close), behavior of further operations is
/// unspecified; quiesce all users first.
pub struct Cache<K, V, S = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, S>>,
}

impl<K, V, S> Clone for Cache<K, V, S> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<K, V, S> fmt::Debug for Cache<K, V, S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache").finish_non_exhaustive()
  }
}

impl<K, V> Cache<K, V, ahash::RandomState>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
{
  /// Starts building a cache with default settings.
  pub fn builder() -> CacheBuilder<K, V> {
    CacheBuilder::new()
  }
}

impl<K, V, S> Cache<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  S: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Returns the value for `key` if one is cached and fresh.
  ///
  /// An expired entry is reported as absent and queued for removal; "not
  /// found" is authoritative even while that removal is pending.
  pub fn get_if_present(&self, key: &K) -> Option<Arc<V>> {
    self.shared.get_if_present(key)
  }

  /// Inserts or replaces the value for `key`.
  ///
  /// The value is visible to readers immediately; policy bookkeeping is
  /// applied by the maintenance task, which may evict another entry.
  pub fn put(&self, key: K, value: V) {
    self.shared.put(key, value);
  }

  /// Removes the entry for `key`, if any. Observably immediate: a subsequent
  /// `get_if_present` misses even before the removal is processed.
  pub fn invalidate(&self, key: &K) {
    self.shared.invalidate(key);
  }

  /// Removes every entry, firing the removal listener for each entry that
  /// was live at the time of the call.
  pub fn invalidate_all(&self) {
    self.shared.invalidate_all();
  }

  /// A point-in-time snapshot of this cache's statistics.
  pub fn stats(&self) -> Stats {
    self.shared.stats()
  }

  /// Drains pending maintenance, removes every entry (firing the removal
  /// listener), and stops the maintenance task. Idempotent; also runs when
  /// the last handle is dropped.
  pub fn close(&self) {
    self.shared.close();
  }
}

/// A [`Cache`] that can compute values for missing keys through a loader.
pub struct LoadingCache<K, V, S = ahash::RandomState> {
  pub(crate) shared: Arc<CacheShared<K, V, S>>,
}

impl<K, V, S> Clone for LoadingCache<K, V, S> {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<K, V, S> fmt::Debug for LoadingCache<K, V, S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LoadingCache").finish_non_exhaustive()
  }
}

impl<K, V, S> LoadingCache<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  S: BuildHasher + Clone + Send + Sync + 'static,
{
  /// Returns the value for `key`, invoking the loader on a miss.
  ///
  /// A miss blocks the calling thread for the duration of the load; only a
  /// successful load populates the cache. An expired entry is served stale
  /// immediately while a background refresh replaces it. Concurrent misses
  /// for the same absent key may each invoke the loader.
  pub fn get(&self, key: &K) -> Result<Arc<V>, LoadError> {
    self.shared.get(key)
  }

  /// Reloads the value for `key`: synchronously if it is absent, otherwise
  /// via an asynchronous refresh that keeps serving the current value.
  pub fn refresh(&self, key: &K) {
    self.shared.refresh(key);
  }

  /// Same as [`Cache::get_if_present`]; never invokes the loader.
  pub fn get_if_present(&self, key: &K) -> Option<Arc<V>> {
    self.shared.get_if_present(key)
  }

  /// Same as [`Cache::put`].
  pub fn put(&self, key: K, value: V) {
    self.shared.put(key, value);
  }

  /// Same as [`Cache::invalidate`].
  pub fn invalidate(&self, key: &K) {
    self.shared.invalidate(key);
  }

  /// Same as [`Cache::invalidate_all`].
  pub fn invalidate_all(&self) {
    self.shared.invalidate_all();
  }

  /// Same as [`Cache::stats`].
  pub fn stats(&self) -> Stats {
    self.shared.stats()
  }

  /// Same as [`Cache::close`].
  pub fn close(&self) {
    self.shared.close();
  }
}
