use crate::entry::EntryRef;
use crate::policy::{AccessList, AddResult, CachePolicy};
use crate::store::ShardedStore;

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// Segmented LRU.
///
/// New entries land in a probationary segment; a hit promotes into the
/// protected segment, which holds at most four fifths of the capacity.
/// Overflowing the protected segment demotes its tail back to probation, and
/// capacity victims are taken from the probationary tail first, so one-shot
/// scans cannot flush entries that have proven themselves.
pub(crate) struct SlruPolicy<K, V, S> {
  store: Arc<ShardedStore<K, V, S>>,
  cap: usize,
  protected_cap: usize,
  probation: AccessList<K, V>,
  protected: AccessList<K, V>,
}

impl<K, V, S> SlruPolicy<K, V, S>
where
  K: Eq + Hash + Clone,
  S: BuildHasher + Clone,
{
  pub(crate) fn new(store: Arc<ShardedStore<K, V, S>>, cap: usize) -> Self {
    let protected_cap = if cap == 0 {
      usize::MAX
    } else {
      let probation_cap = (cap / 5).max(1);
      cap.saturating_sub(probation_cap)
    };
    Self {
      store,
      cap,
      protected_cap,
      probation: AccessList::new(),
      protected: AccessList::new(),
    }
  }

  fn len(&self) -> usize {
    self.probation.len() + self.protected.len()
  }

  /// Demotes protected tails until the protected segment fits again.
  fn rebalance(&mut self) {
    while self.protected.len() > self.protected_cap {
      match self.protected.pop_back() {
        Some(demoted) => self.probation.push_front(demoted),
        None => break,
      }
    }
  }

  fn evict_one(&mut self) -> Option<EntryRef<K, V>> {
    let victim = self.probation.pop_back().or_else(|| self.protected.pop_back())?;
    self.store.remove(&victim);
    Some(victim)
  }
}

impl<K, V, S> CachePolicy<K, V, S> for SlruPolicy<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync,
  V: Send + Sync,
  S: BuildHasher + Clone + Send + Sync,
{
  fn add(&mut self, entry: EntryRef<K, V>) -> AddResult<K, V> {
    let entry = super::resolve_live_entry(&self.store, entry);

    if self.protected.contains(entry.key()) {
      self.protected.push_front(entry.clone());
      return AddResult {
        entry,
        admitted: false,
        evicted: None,
      };
    }
    if self.probation.contains(entry.key()) {
      self.probation.push_front(entry.clone());
      return AddResult {
        entry,
        admitted: false,
        evicted: None,
      };
    }

    self.probation.push_front(entry.clone());
    let mut evicted = None;
    if self.cap != 0 && self.len() > self.cap {
      evicted = self.evict_one();
    }
    AddResult {
      entry,
      admitted: true,
      evicted,
    }
  }

  fn hit(&mut self, entry: &EntryRef<K, V>) {
    if self.protected.tracks(entry) {
      self.protected.move_to_front(entry.key());
      return;
    }
    if self.probation.tracks(entry) {
      let promoted = self.probation.remove(entry.key()).expect("tracked above");
      self.protected.push_front(promoted);
      self.rebalance();
    }
  }

  fn remove(&mut self, entry: &EntryRef<K, V>) -> Option<EntryRef<K, V>> {
    let removed = if self.probation.tracks(entry) {
      self.probation.remove(entry.key())
    } else if self.protected.tracks(entry) {
      self.protected.remove(entry.key())
    } else {
      return None;
    }?;
    self.store.remove(&removed);
    Some(removed)
  }

  fn walk_access(&self, visit: &mut dyn FnMut(&EntryRef<K, V>) -> bool) {
    let mut keep_going = true;
    self.probation.walk_from_back(&mut |en| {
      keep_going = visit(en);
      keep_going
    });
    if keep_going {
      self.protected.walk_from_back(visit);
    }
  }
}
