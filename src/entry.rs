use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

/// Shared handle to a cache entry.
///
/// An entry is referenced by the hash table, by the replacement policy's
/// ordering, and transiently by every in-flight maintenance event. It is freed
/// once the last of those references is dropped.
pub(crate) type EntryRef<K, V> = Arc<CacheEntry<K, V>>;

/// A single key's record: value, precomputed hash, timestamps, and flags.
///
/// All mutable fields are atomic so readers on arbitrary threads observe a
/// value consistent with some past write without taking a lock.
pub(crate) struct CacheEntry<K, V> {
  key: K,
  /// 64-bit digest of the key, computed once at creation.
  hash: u64,
  value: ArcSwap<V>,
  /// Last successful read, nanoseconds since the reference clock's epoch.
  access_time: AtomicU64,
  /// Last insert or refresh, same clock.
  write_time: AtomicU64,
  /// Once set, readers treat the entry as expired.
  invalidated: AtomicBool,
  /// Set while a refresh is in flight to suppress duplicates.
  loading: AtomicBool,
}

impl<K, V> CacheEntry<K, V> {
  pub(crate) fn new(key: K, hash: u64, value: Arc<V>, now: u64) -> Self {
    Self {
      key,
      hash,
      value: ArcSwap::new(value),
      access_time: AtomicU64::new(now),
      write_time: AtomicU64::new(now),
      invalidated: AtomicBool::new(false),
      loading: AtomicBool::new(false),
    }
  }

  #[inline]
  pub(crate) fn key(&self) -> &K {
    &self.key
  }

  #[inline]
  pub(crate) fn hash(&self) -> u64 {
    self.hash
  }

  /// Returns the current value. Readers see some committed value, never a tear.
  #[inline]
  pub(crate) fn value(&self) -> Arc<V> {
    self.value.load_full()
  }

  #[inline]
  pub(crate) fn set_value(&self, value: Arc<V>) {
    self.value.store(value);
  }

  #[inline]
  pub(crate) fn access_time(&self) -> u64 {
    self.access_time.load(Ordering::Relaxed)
  }

  #[inline]
  pub(crate) fn set_access_time(&self, nanos: u64) {
    self.access_time.store(nanos, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn write_time(&self) -> u64 {
    self.write_time.load(Ordering::Relaxed)
  }

  #[inline]
  pub(crate) fn set_write_time(&self, nanos: u64) {
    self.write_time.store(nanos, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn is_invalidated(&self) -> bool {
    self.invalidated.load(Ordering::Acquire)
  }

  #[inline]
  pub(crate) fn set_invalidated(&self) {
    self.invalidated.store(true, Ordering::Release);
  }

  #[inline]
  pub(crate) fn is_loading(&self) -> bool {
    self.loading.load(Ordering::Acquire)
  }

  /// Transitions the loading flag from unset to set. Returns `false` if a
  /// refresh was already in flight.
  #[inline]
  pub(crate) fn begin_loading(&self) -> bool {
    self
      .loading
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  #[inline]
  pub(crate) fn end_loading(&self) {
    self.loading.store(false, Ordering::Release);
  }
}

/// Expiration and refresh thresholds, as nanoseconds with `0` meaning
/// disabled. Copied into both the cache facade and the maintenance task.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ExpiryConfig {
  pub(crate) expire_after_access: u64,
  pub(crate) expire_after_write: u64,
  pub(crate) refresh_after_write: u64,
}

impl ExpiryConfig {
  pub(crate) fn new(
    expire_after_access: Option<Duration>,
    expire_after_write: Option<Duration>,
    refresh_after_write: Option<Duration>,
  ) -> Self {
    let nanos = |d: Option<Duration>| d.map_or(0, |d| d.as_nanos() as u64);
    Self {
      expire_after_access: nanos(expire_after_access),
      expire_after_write: nanos(expire_after_write),
      refresh_after_write: nanos(refresh_after_write),
    }
  }

  /// An entry is expired once invalidated, or once either configured
  /// expiration window has elapsed.
  pub(crate) fn is_expired<K, V>(&self, entry: &CacheEntry<K, V>, now: u64) -> bool {
    if entry.is_invalidated() {
      return true;
    }
    if self.expire_after_access > 0
      && entry.access_time() < now.saturating_sub(self.expire_after_access)
    {
      return true;
    }
    if self.expire_after_write > 0
      && entry.write_time() < now.saturating_sub(self.expire_after_write)
    {
      return true;
    }
    false
  }

  /// Whether a still-fresh entry has aged past its refresh threshold. An entry
  /// with a refresh already in flight never needs another.
  ///
  /// The read path currently schedules refreshes only for expired entries;
  /// this predicate is not consulted there yet.
  #[allow(dead_code)]
  pub(crate) fn needs_refresh<K, V>(&self, entry: &CacheEntry<K, V>, now: u64) -> bool {
    if entry.is_loading() {
      return false;
    }
    if self.refresh_after_write > 0 {
      let written = entry.write_time();
      if written > 0 && written < now.saturating_sub(self.refresh_after_write) {
        return true;
      }
    }
    false
  }
}
