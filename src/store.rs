use crate::entry::EntryRef;

use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

/// A concurrent keyed index of live entries, partitioned into independently
/// locked shards so operations on different keys rarely contend.
///
/// The store is deliberately dumb: it has no notion of capacity, ordering, or
/// expiration. Those belong to the replacement policy and the maintenance
/// task; the store only answers "which entry is live for this key right now".
pub(crate) struct ShardedStore<K, V, S> {
  shards: Box<[CachePadded<RwLock<HashMap<K, EntryRef<K, V>, S>>>]>,
  hasher: S,
}

/// Hashes a key with the store's `BuildHasher`, producing the 64-bit digest
/// carried on the entry.
#[inline]
pub(crate) fn hash_key<K: Hash, S: BuildHasher>(hasher: &S, key: &K) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

impl<K, V, S> ShardedStore<K, V, S>
where
  K: Eq + Hash + Clone,
  S: BuildHasher + Clone,
{
  /// `num_shards` is rounded up to a power of two for mask-based selection.
  pub(crate) fn new(num_shards: usize, hasher: S) -> Self {
    let num_shards = num_shards.max(1).next_power_of_two();
    let mut shards = Vec::with_capacity(num_shards);
    for _ in 0..num_shards {
      shards.push(CachePadded::new(RwLock::new(HashMap::with_hasher(
        hasher.clone(),
      ))));
    }
    Self {
      shards: shards.into_boxed_slice(),
      hasher,
    }
  }

  #[inline]
  pub(crate) fn hash(&self, key: &K) -> u64 {
    hash_key(&self.hasher, key)
  }

  #[inline]
  fn shard(&self, hash: u64) -> &RwLock<HashMap<K, EntryRef<K, V>, S>> {
    &self.shards[hash as usize & (self.shards.len() - 1)]
  }

  pub(crate) fn get(&self, key: &K, hash: u64) -> Option<EntryRef<K, V>> {
    self.shard(hash).read().get(key).cloned()
  }

  /// Inserts `entry` if its key is absent. On a lost race the pre-existing
  /// entry is returned untouched and `entry` is not inserted.
  pub(crate) fn get_or_insert(&self, entry: EntryRef<K, V>) -> Option<EntryRef<K, V>> {
    let mut guard = self.shard(entry.hash()).write();
    match guard.entry(entry.key().clone()) {
      std::collections::hash_map::Entry::Occupied(occupied) => Some(occupied.get().clone()),
      std::collections::hash_map::Entry::Vacant(vacant) => {
        vacant.insert(entry);
        None
      }
    }
  }

  /// Removes `entry` by identity: the mapping is deleted only if the live
  /// entry for the key is this exact allocation. Returns whether it was.
  pub(crate) fn remove(&self, entry: &EntryRef<K, V>) -> bool {
    let mut guard = self.shard(entry.hash()).write();
    match guard.get(entry.key()) {
      Some(current) if Arc::ptr_eq(current, entry) => {
        guard.remove(entry.key());
        true
      }
      _ => false,
    }
  }

  /// Visits every live entry. Visitors may touch atomic entry fields but must
  /// not call back into the store.
  pub(crate) fn walk(&self, mut visit: impl FnMut(&EntryRef<K, V>)) {
    for shard in self.shards.iter() {
      let guard = shard.read();
      for entry in guard.values() {
        visit(entry);
      }
    }
  }

  /// Approximate entry count; only usable as a capacity hint at insertion.
  pub(crate) fn len(&self) -> usize {
    self.shards.iter().map(|shard| shard.read().len()).sum()
  }
}
