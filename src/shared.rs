use crate::entry::{CacheEntry, EntryRef, ExpiryConfig};
use crate::error::LoadError;
use crate::loader::{Executor, LoaderFn};
use crate::stats::{Stats, StatsCounter};
use crate::store::ShardedStore;
use crate::task::{Maintenance, Removal};
use crate::time;

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::Sender;
use tracing::warn;

/// The thread-safe core behind every cache handle.
///
/// Read and write paths operate directly on the sharded store and then
/// enqueue an event for the maintenance task; the bounded queues provide
/// backpressure when callers outrun policy bookkeeping.
pub(crate) struct CacheShared<K, V, S> {
  pub(crate) store: Arc<ShardedStore<K, V, S>>,
  pub(crate) stats: Arc<dyn StatsCounter>,
  pub(crate) expiry: ExpiryConfig,
  pub(crate) cap: usize,
  pub(crate) loader: Option<LoaderFn<K, V>>,
  pub(crate) executor: Option<Arc<dyn Executor>>,
  pub(crate) add_tx: Sender<EntryRef<K, V>>,
  pub(crate) hit_tx: Sender<EntryRef<K, V>>,
  pub(crate) delete_tx: Sender<Removal<K, V>>,
  pub(crate) maintenance: Maintenance,
}

impl<K, V, S> Drop for CacheShared<K, V, S> {
  fn drop(&mut self) {
    self.maintenance.close();
  }
}

impl<K, V, S> CacheShared<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  S: BuildHasher + Clone + Send + Sync + 'static,
{
  pub(crate) fn get_if_present(&self, key: &K) -> Option<Arc<V>> {
    let hash = self.store.hash(key);
    let Some(entry) = self.store.get(key, hash) else {
      self.stats.record_misses(1);
      return None;
    };
    let now = time::now_nanos();
    if self.expiry.is_expired(&entry, now) {
      // "Not found" is authoritative even though the removal is queued.
      self.stats.record_misses(1);
      let _ = self.delete_tx.send(Removal::Entry(entry));
      return None;
    }
    self.stats.record_hits(1);
    entry.set_access_time(now);
    let value = entry.value();
    let _ = self.hit_tx.send(entry);
    Some(value)
  }

  pub(crate) fn put(&self, key: K, value: V) {
    let hash = self.store.hash(&key);
    let now = time::now_nanos();
    let value = Arc::new(value);
    let entry = match self.store.get(&key, hash) {
      None => {
        let fresh: EntryRef<K, V> = Arc::new(CacheEntry::new(key, hash, value.clone(), now));
        // Insert into the table right away so readers observe the value
        // without waiting for the maintenance task, but only within the
        // capacity hint; beyond it, admission happens when the policy
        // processes the add event.
        if self.cap == 0 || self.store.len() < self.cap {
          match self.store.get_or_insert(fresh.clone()) {
            Some(existing) => {
              existing.set_value(value);
              existing
            }
            None => fresh,
          }
        } else {
          fresh
        }
      }
      Some(existing) => {
        existing.set_value(value);
        existing.set_write_time(now);
        existing
      }
    };
    let _ = self.add_tx.send(entry);
  }

  pub(crate) fn invalidate(&self, key: &K) {
    let hash = self.store.hash(key);
    if let Some(entry) = self.store.get(key, hash) {
      entry.set_invalidated();
      let _ = self.delete_tx.send(Removal::Entry(entry));
    }
  }

  pub(crate) fn invalidate_all(&self) {
    self.store.walk(|entry| entry.set_invalidated());
    let _ = self.delete_tx.send(Removal::All);
  }

  /// Looks up `key`, loading it on a miss. An expired entry is served stale
  /// while an asynchronous refresh replaces it, which bounds the latency of
  /// an expired hit.
  pub(crate) fn get(self: &Arc<Self>, key: &K) -> Result<Arc<V>, LoadError> {
    let hash = self.store.hash(key);
    let Some(entry) = self.store.get(key, hash) else {
      self.stats.record_misses(1);
      return self.load(key);
    };
    let now = time::now_nanos();
    if self.expiry.is_expired(&entry, now) {
      self.stats.record_misses(1);
      if self.loader.is_none() {
        let _ = self.delete_tx.send(Removal::Entry(entry.clone()));
      } else {
        entry.set_access_time(now);
        self.refresh_async(&entry);
      }
      return Ok(entry.value());
    }
    self.stats.record_hits(1);
    entry.set_access_time(now);
    let _ = self.hit_tx.send(entry.clone());
    Ok(entry.value())
  }

  /// Reloads `key`: synchronously when absent, asynchronously when present.
  /// A no-op unless a loader is configured.
  pub(crate) fn refresh(self: &Arc<Self>, key: &K) {
    if self.loader.is_none() {
      return;
    }
    let hash = self.store.hash(key);
    match self.store.get(key, hash) {
      None => {
        let _ = self.load(key);
      }
      Some(entry) => self.refresh_async(&entry),
    }
  }

  /// Invokes the loader on the calling thread. Only a successful load touches
  /// the cache; the fresh entry is fed to the policy through the add queue.
  fn load(&self, key: &K) -> Result<Arc<V>, LoadError> {
    let loader = self
      .loader
      .as_ref()
      .expect("cache loader must be configured");
    let start = Instant::now();
    let outcome = loader(key);
    let elapsed = start.elapsed();
    match outcome {
      Err(source) => {
        self.stats.record_load_error(elapsed);
        Err(LoadError::new(source))
      }
      Ok(value) => {
        self.stats.record_load_success(elapsed);
        let now = time::now_nanos();
        let hash = self.store.hash(key);
        let value = Arc::new(value);
        let entry: EntryRef<K, V> =
          Arc::new(CacheEntry::new(key.clone(), hash, value.clone(), now));
        let _ = self.add_tx.send(entry);
        Ok(value)
      }
    }
  }

  /// Schedules a reload of `entry` on the executor, or on a detached thread
  /// when none is configured. At most one refresh per entry is in flight;
  /// concurrent calls while one is running do nothing.
  fn refresh_async(self: &Arc<Self>, entry: &EntryRef<K, V>) {
    assert!(
      self.loader.is_some(),
      "cache loader must be configured for refresh"
    );
    if !entry.begin_loading() {
      return;
    }
    let shared = Arc::clone(self);
    let entry = entry.clone();
    let task = Box::new(move || shared.refresh_entry(&entry));
    match &self.executor {
      Some(executor) => executor.execute(task),
      None => {
        thread::spawn(move || task());
      }
    }
  }

  /// Runs on the executor: reloads the entry's value in place. A loader error
  /// is swallowed and the previous value keeps serving.
  fn refresh_entry(&self, entry: &EntryRef<K, V>) {
    struct ClearLoading<'a, K, V>(&'a CacheEntry<K, V>);
    impl<K, V> Drop for ClearLoading<'_, K, V> {
      fn drop(&mut self) {
        self.0.end_loading();
      }
    }
    let _clear = ClearLoading(entry.as_ref());

    let loader = self
      .loader
      .as_ref()
      .expect("cache loader must be configured for refresh");
    let start = Instant::now();
    match loader(entry.key()) {
      Ok(value) => {
        self.stats.record_load_success(start.elapsed());
        entry.set_value(Arc::new(value));
        entry.set_write_time(time::now_nanos());
        let _ = self.add_tx.send(entry.clone());
      }
      Err(error) => {
        self.stats.record_load_error(start.elapsed());
        warn!(error = %error, "refresh failed, keeping previous value");
      }
    }
  }

  pub(crate) fn stats(&self) -> Stats {
    let mut stats = Stats::default();
    self.stats.snapshot(&mut stats);
    stats
  }

  pub(crate) fn close(&self) {
    self.maintenance.close();
  }
}
