use crate::entry::{EntryRef, ExpiryConfig};
use crate::listener::Listener;
use crate::policy::CachePolicy;
use crate::stats::StatsCounter;
use crate::store::ShardedStore;
use crate::task::Removal;
use crate::time;

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Read events processed between expiration sweeps.
const SWEEP_READ_THRESHOLD: u32 = 64;
/// Maximum entries removed per expiration sweep, to bound tail latency.
const SWEEP_MAX_REMOVALS: usize = 16;

/// Everything the maintenance task needs to own or share.
///
/// The policy moves in here permanently: after spawn, the maintenance thread
/// is the only writer of the ordering structures.
pub(crate) struct MaintenanceContext<K, V, S> {
  pub(crate) store: Arc<ShardedStore<K, V, S>>,
  pub(crate) policy: Box<dyn CachePolicy<K, V, S>>,
  pub(crate) stats: Arc<dyn StatsCounter>,
  pub(crate) expiry: ExpiryConfig,
  pub(crate) on_insertion: Option<Listener<K, V>>,
  pub(crate) on_removal: Option<Listener<K, V>>,
  pub(crate) add_rx: Receiver<EntryRef<K, V>>,
  pub(crate) hit_rx: Receiver<EntryRef<K, V>>,
  pub(crate) delete_rx: Receiver<Removal<K, V>>,
}

/// Handle to the background maintenance task.
pub(crate) struct Maintenance {
  close_tx: Sender<()>,
  handle: Mutex<Option<JoinHandle<()>>>,
}

impl Maintenance {
  /// Spawns the maintenance thread and hands it the policy.
  pub(crate) fn spawn<K, V, S>(context: MaintenanceContext<K, V, S>) -> Self
  where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: BuildHasher + Clone + Send + Sync + 'static,
  {
    let (close_tx, close_rx) = crossbeam_channel::bounded::<()>(1);
    let handle = std::thread::spawn(move || {
      Worker {
        context,
        close_rx,
        read_count: 0,
      }
      .run()
    });
    Self {
      close_tx,
      handle: Mutex::new(Some(handle)),
    }
  }

  /// Signals the task to drain, tear down every entry, and exit, then waits
  /// for it. Subsequent calls are no-ops.
  pub(crate) fn close(&self) {
    let mut handle = self.handle.lock();
    if let Some(handle) = handle.take() {
      let _ = self.close_tx.send(());
      let _ = handle.join();
    }
  }
}

struct Worker<K, V, S> {
  context: MaintenanceContext<K, V, S>,
  close_rx: Receiver<()>,
  read_count: u32,
}

impl<K, V, S> Worker<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync,
  V: Send + Sync,
  S: BuildHasher + Clone + Send + Sync,
{
  fn run(mut self) {
    debug!("cache maintenance task started");
    // Receiver handles are cloned out of `self` so the select arms can take
    // `&mut self`.
    let close_rx = self.close_rx.clone();
    let add_rx = self.context.add_rx.clone();
    let hit_rx = self.context.hit_rx.clone();
    let delete_rx = self.context.delete_rx.clone();
    loop {
      select! {
        recv(close_rx) -> _ => {
          self.drain();
          self.remove_all();
          debug!("cache maintenance task stopped");
          return;
        }
        recv(add_rx) -> msg => match msg {
          Ok(entry) => {
            self.apply_add(entry);
            self.post_write_cleanup();
          }
          Err(_) => return,
        },
        recv(hit_rx) -> msg => match msg {
          Ok(entry) => {
            self.context.policy.hit(&entry);
            self.post_read_cleanup();
          }
          Err(_) => return,
        },
        recv(delete_rx) -> msg => match msg {
          Ok(removal) => {
            self.apply_delete(removal);
            self.post_read_cleanup();
          }
          Err(_) => return,
        },
      }
    }
  }

  /// Applies every event still queued at close time before the teardown, so
  /// pending listeners fire and the final removal pass sees a consistent
  /// policy.
  fn drain(&mut self) {
    while let Ok(entry) = self.context.add_rx.try_recv() {
      self.apply_add(entry);
    }
    while let Ok(entry) = self.context.hit_rx.try_recv() {
      self.context.policy.hit(&entry);
    }
    while let Ok(removal) = self.context.delete_rx.try_recv() {
      self.apply_delete(removal);
    }
  }

  fn apply_add(&mut self, entry: EntryRef<K, V>) {
    // A queued add can arrive after the entry was invalidated and torn down;
    // admitting it would resurrect the mapping the teardown just deleted.
    if entry.is_invalidated() {
      self.apply_remove(&entry);
      return;
    }
    let result = self.context.policy.add(entry);
    if result.admitted {
      if let Some(listener) = &self.context.on_insertion {
        listener(result.entry.key(), &result.entry.value());
      }
    }
    if let Some(victim) = result.evicted {
      self.context.stats.record_eviction();
      if let Some(listener) = &self.context.on_removal {
        listener(victim.key(), &victim.value());
      }
    }
  }

  fn apply_delete(&mut self, removal: Removal<K, V>) {
    match removal {
      Removal::Entry(entry) => self.apply_remove(&entry),
      Removal::All => self.remove_all(),
    }
  }

  fn apply_remove(&mut self, entry: &EntryRef<K, V>) {
    if let Some(removed) = self.context.policy.remove(entry) {
      if let Some(listener) = &self.context.on_removal {
        listener(removed.key(), &removed.value());
      }
    }
  }

  fn remove_all(&mut self) {
    let mut entries = Vec::new();
    self.context.store.walk(|entry| entries.push(entry.clone()));
    trace!(entries = entries.len(), "removing all entries");
    for entry in entries {
      entry.set_invalidated();
      // The entry may predate the policy's knowledge of it (its add event
      // raced with this teardown), so delete from the table either way.
      self.context.policy.remove(&entry);
      self.context.store.remove(&entry);
      if let Some(listener) = &self.context.on_removal {
        listener(entry.key(), &entry.value());
      }
    }
  }

  fn post_read_cleanup(&mut self) {
    self.read_count += 1;
    if self.read_count > SWEEP_READ_THRESHOLD {
      self.read_count = 0;
      self.expire_entries();
    }
  }

  fn post_write_cleanup(&mut self) {
    self.read_count = 0;
    self.expire_entries();
  }

  /// Removes up to [`SWEEP_MAX_REMOVALS`] access-expired entries. The walk is
  /// in ascending access order, so it stops at the first fresh entry; any
  /// residue is reclaimed on a later turn.
  fn expire_entries(&mut self) {
    if self.context.expiry.expire_after_access == 0 {
      return;
    }
    let cutoff = time::now_nanos().saturating_sub(self.context.expiry.expire_after_access);
    let mut expired = Vec::new();
    self.context.policy.walk_access(&mut |entry| {
      if entry.access_time() >= cutoff {
        return false;
      }
      expired.push(entry.clone());
      expired.len() < SWEEP_MAX_REMOVALS
    });
    if expired.is_empty() {
      return;
    }
    trace!(expired = expired.len(), "expiring idle entries");
    for entry in expired {
      if let Some(removed) = self.context.policy.remove(&entry) {
        self.context.stats.record_eviction();
        if let Some(listener) = &self.context.on_removal {
          listener(removed.key(), &removed.value());
        }
      }
    }
  }
}
