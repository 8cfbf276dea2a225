mod access_list;
pub(crate) mod lru;
pub(crate) mod slru;
pub(crate) mod tinylfu;

use crate::entry::EntryRef;
use crate::error::UnknownPolicy;
use crate::store::ShardedStore;

use std::hash::{BuildHasher, Hash};
use std::str::FromStr;
use std::sync::Arc;

pub(crate) use access_list::AccessList;

/// Replacement policy selected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolicyKind {
  /// Plain least-recently-used.
  #[default]
  Lru,
  /// Segmented LRU: a probationary segment absorbs scans, a protected
  /// segment keeps proven entries.
  Slru,
  /// TinyLFU: an admission window in front of a segmented main space, with a
  /// frequency sketch arbitrating admission.
  TinyLfu,
}

impl FromStr for PolicyKind {
  type Err = UnknownPolicy;

  fn from_str(name: &str) -> Result<Self, Self::Err> {
    match name {
      "lru" => Ok(Self::Lru),
      "slru" => Ok(Self::Slru),
      "tinylfu" => Ok(Self::TinyLfu),
      other => Err(UnknownPolicy(other.to_string())),
    }
  }
}

/// Outcome of presenting an entry to the policy.
pub(crate) struct AddResult<K, V> {
  /// The entry the policy now tracks for this key. Usually the presented
  /// entry, but a racing insert can substitute the live table entry.
  pub(crate) entry: EntryRef<K, V>,
  /// Whether a new node was admitted, as opposed to repositioning a key the
  /// policy already tracked.
  pub(crate) admitted: bool,
  /// At most one capacity victim, already removed from both the ordering and
  /// the hash table.
  pub(crate) evicted: Option<EntryRef<K, V>>,
}

/// A replacement policy's ordering structures.
///
/// The policy is owned exclusively by the maintenance task, so every mutator
/// takes `&mut self` and no internal locking is needed. The policy is also
/// responsible for keeping the hash table consistent with its ordering:
/// `add` inserts absent entries into the table and `remove` deletes from it.
pub(crate) trait CachePolicy<K, V, S>: Send {
  /// Presents an entry for admission. A key the policy already tracks is
  /// repositioned rather than duplicated. On capacity overflow the policy
  /// picks a victim, removes it from its ordering and the hash table, and
  /// returns it in the result.
  fn add(&mut self, entry: EntryRef<K, V>) -> AddResult<K, V>;

  /// Records a read. A hit for an entry no longer tracked is a no-op.
  fn hit(&mut self, entry: &EntryRef<K, V>);

  /// Removes the entry from the ordering and the hash table. Returns it iff
  /// this exact entry was still tracked.
  fn remove(&mut self, entry: &EntryRef<K, V>) -> Option<EntryRef<K, V>>;

  /// Visits entries in ascending access order as known to the policy,
  /// stopping when `visit` returns `false`.
  fn walk_access(&self, visit: &mut dyn FnMut(&EntryRef<K, V>) -> bool);
}

/// Builds the policy bound to `store` with the given capacity, where a
/// capacity of zero means unlimited.
pub(crate) fn build<K, V, S>(
  kind: PolicyKind,
  store: Arc<ShardedStore<K, V, S>>,
  cap: usize,
) -> Box<dyn CachePolicy<K, V, S>>
where
  K: Eq + Hash + Clone + Send + Sync + 'static,
  V: Send + Sync + 'static,
  S: BuildHasher + Clone + Send + Sync + 'static,
{
  match kind {
    PolicyKind::Lru => Box::new(lru::LruPolicy::new(store, cap)),
    PolicyKind::Slru => Box::new(slru::SlruPolicy::new(store, cap)),
    PolicyKind::TinyLfu => Box::new(tinylfu::TinyLfuPolicy::new(store, cap)),
  }
}

/// Resolves which entry the policy should track after `get_or_insert`: the
/// presented entry if the table accepted it, otherwise the live entry that
/// won the race.
pub(crate) fn resolve_live_entry<K, V, S>(
  store: &ShardedStore<K, V, S>,
  entry: EntryRef<K, V>,
) -> EntryRef<K, V>
where
  K: Eq + Hash + Clone,
  S: BuildHasher + Clone,
{
  match store.get_or_insert(entry.clone()) {
    None => entry,
    Some(existing) if Arc::ptr_eq(&existing, &entry) => entry,
    Some(existing) => existing,
  }
}
