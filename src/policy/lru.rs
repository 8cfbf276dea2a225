use crate::entry::EntryRef;
use crate::policy::{AccessList, AddResult, CachePolicy};
use crate::store::ShardedStore;

use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

/// Evicts the least recently used entry on capacity overflow.
pub(crate) struct LruPolicy<K, V, S> {
  store: Arc<ShardedStore<K, V, S>>,
  cap: usize,
  list: AccessList<K, V>,
}

impl<K, V, S> LruPolicy<K, V, S>
where
  K: Eq + Hash + Clone,
{
  pub(crate) fn new(store: Arc<ShardedStore<K, V, S>>, cap: usize) -> Self {
    Self {
      store,
      cap,
      list: AccessList::new(),
    }
  }
}

impl<K, V, S> CachePolicy<K, V, S> for LruPolicy<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync,
  V: Send + Sync,
  S: BuildHasher + Clone + Send + Sync,
{
  fn add(&mut self, entry: EntryRef<K, V>) -> AddResult<K, V> {
    let entry = super::resolve_live_entry(&self.store, entry);

    if self.list.contains(entry.key()) {
      self.list.push_front(entry.clone());
      return AddResult {
        entry,
        admitted: false,
        evicted: None,
      };
    }

    self.list.push_front(entry.clone());
    let mut evicted = None;
    if self.cap != 0 && self.list.len() > self.cap {
      if let Some(victim) = self.list.pop_back() {
        self.store.remove(&victim);
        evicted = Some(victim);
      }
    }
    AddResult {
      entry,
      admitted: true,
      evicted,
    }
  }

  fn hit(&mut self, entry: &EntryRef<K, V>) {
    if self.list.tracks(entry) {
      self.list.move_to_front(entry.key());
    }
  }

  fn remove(&mut self, entry: &EntryRef<K, V>) -> Option<EntryRef<K, V>> {
    if !self.list.tracks(entry) {
      return None;
    }
    let removed = self.list.remove(entry.key())?;
    self.store.remove(&removed);
    Some(removed)
  }

  fn walk_access(&self, visit: &mut dyn FnMut(&EntryRef<K, V>) -> bool) {
    self.list.walk_from_back(visit);
  }
}
