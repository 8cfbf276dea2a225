use crate::entry::EntryRef;

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use generational_arena::{Arena, Index};

struct Node<K, V> {
  entry: EntryRef<K, V>,
  prev: Option<Index>,
  next: Option<Index>,
}

/// A doubly linked list of entries in recency order, with O(1) key lookup.
///
/// Nodes live in an arena and are addressed by index, so the list owns its
/// link handles outright and entries carry no back-pointers. The head is the
/// most recently used position; walking from the tail yields entries in
/// ascending access order.
pub(crate) struct AccessList<K, V> {
  nodes: Arena<Node<K, V>>,
  lookup: HashMap<K, Index>,
  head: Option<Index>,
  tail: Option<Index>,
}

impl<K, V> AccessList<K, V>
where
  K: Eq + Hash + Clone,
{
  pub(crate) fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
    }
  }

  pub(crate) fn len(&self) -> usize {
    self.lookup.len()
  }

  pub(crate) fn contains(&self, key: &K) -> bool {
    self.lookup.contains_key(key)
  }

  /// The entry currently tracked for `key`, if any.
  pub(crate) fn get(&self, key: &K) -> Option<&EntryRef<K, V>> {
    let index = *self.lookup.get(key)?;
    Some(&self.nodes[index].entry)
  }

  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev = node.prev;
    let next = node.next;

    match prev {
      Some(prev_index) => self.nodes[prev_index].next = next,
      None => self.head = next,
    }
    match next {
      Some(next_index) => self.nodes[next_index].prev = prev,
      None => self.tail = prev,
    }
  }

  fn link_front(&mut self, index: Index) {
    let old_head = self.head;
    self.nodes[index].prev = None;
    self.nodes[index].next = old_head;
    self.head = Some(index);

    if let Some(old_head) = old_head {
      self.nodes[old_head].prev = Some(index);
    }
    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  /// Inserts `entry` at the most-recently-used position. If the key is
  /// already tracked, the existing node is repointed at `entry` and moved to
  /// the front instead of being duplicated.
  pub(crate) fn push_front(&mut self, entry: EntryRef<K, V>) {
    if let Some(&index) = self.lookup.get(entry.key()) {
      self.nodes[index].entry = entry;
      self.unlink(index);
      self.link_front(index);
    } else {
      let key = entry.key().clone();
      let index = self.nodes.insert(Node {
        entry,
        prev: None,
        next: None,
      });
      self.lookup.insert(key, index);
      self.link_front(index);
    }
  }

  pub(crate) fn move_to_front(&mut self, key: &K) {
    if let Some(&index) = self.lookup.get(key) {
      if self.head != Some(index) {
        self.unlink(index);
        self.link_front(index);
      }
    }
  }

  /// The least recently used entry, without removing it.
  pub(crate) fn back(&self) -> Option<&EntryRef<K, V>> {
    self.tail.map(|index| &self.nodes[index].entry)
  }

  /// Removes and returns the least recently used entry.
  pub(crate) fn pop_back(&mut self) -> Option<EntryRef<K, V>> {
    let tail = self.tail?;
    let key = self.nodes[tail].entry.key().clone();
    self.remove(&key)
  }

  pub(crate) fn remove(&mut self, key: &K) -> Option<EntryRef<K, V>> {
    let index = self.lookup.remove(key)?;
    self.unlink(index);
    let node = self.nodes.remove(index)?;
    Some(node.entry)
  }

  /// Visits entries from least to most recently used, stopping when `visit`
  /// returns `false`.
  pub(crate) fn walk_from_back(&self, visit: &mut dyn FnMut(&EntryRef<K, V>) -> bool) {
    let mut current = self.tail;
    while let Some(index) = current {
      let node = &self.nodes[index];
      if !visit(&node.entry) {
        return;
      }
      current = node.prev;
    }
  }

  #[cfg(test)]
  pub(crate) fn keys_front_to_back(&self) -> Vec<K> {
    let mut keys = Vec::with_capacity(self.len());
    let mut current = self.head;
    while let Some(index) = current {
      let node = &self.nodes[index];
      keys.push(node.entry.key().clone());
      current = node.next;
    }
    keys
  }
}

impl<K, V> AccessList<K, V>
where
  K: Eq + Hash + Clone,
{
  /// Whether the list tracks this exact entry allocation, not merely its key.
  pub(crate) fn tracks(&self, entry: &EntryRef<K, V>) -> bool {
    self
      .get(entry.key())
      .map_or(false, |current| Arc::ptr_eq(current, entry))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entry::CacheEntry;

  fn entry(key: i32) -> EntryRef<i32, &'static str> {
    Arc::new(CacheEntry::new(key, key as u64, Arc::new("v"), 0))
  }

  #[test]
  fn new_list_is_empty() {
    let list: AccessList<i32, &str> = AccessList::new();
    assert_eq!(list.len(), 0);
    assert!(!list.contains(&1));
    assert!(list.back().is_none());
  }

  #[test]
  fn push_front_orders_newest_first() {
    let mut list = AccessList::new();
    list.push_front(entry(1));
    list.push_front(entry(2));
    list.push_front(entry(3));
    assert_eq!(list.keys_front_to_back(), vec![3, 2, 1]);
    assert_eq!(list.back().unwrap().key(), &1);
  }

  #[test]
  fn push_front_existing_key_repoints_and_moves() {
    let mut list = AccessList::new();
    let first = entry(1);
    list.push_front(first.clone());
    list.push_front(entry(2));

    let replacement = entry(1);
    list.push_front(replacement.clone());
    assert_eq!(list.len(), 2);
    assert_eq!(list.keys_front_to_back(), vec![1, 2]);
    assert!(Arc::ptr_eq(list.get(&1).unwrap(), &replacement));
    assert!(!Arc::ptr_eq(list.get(&1).unwrap(), &first));
  }

  #[test]
  fn move_to_front_reorders() {
    let mut list = AccessList::new();
    list.push_front(entry(1));
    list.push_front(entry(2));
    list.push_front(entry(3));
    list.move_to_front(&1);
    assert_eq!(list.keys_front_to_back(), vec![1, 3, 2]);
  }

  #[test]
  fn pop_back_removes_lru() {
    let mut list = AccessList::new();
    list.push_front(entry(1));
    list.push_front(entry(2));
    let popped = list.pop_back().unwrap();
    assert_eq!(popped.key(), &1);
    assert_eq!(list.len(), 1);
    assert!(!list.contains(&1));
  }

  #[test]
  fn remove_from_middle_keeps_links() {
    let mut list = AccessList::new();
    list.push_front(entry(1));
    list.push_front(entry(2));
    list.push_front(entry(3));
    assert!(list.remove(&2).is_some());
    assert_eq!(list.keys_front_to_back(), vec![3, 1]);
    assert!(list.remove(&99).is_none());
  }

  #[test]
  fn walk_from_back_ascends_and_stops() {
    let mut list = AccessList::new();
    for key in 1..=4 {
      list.push_front(entry(key));
    }
    let mut seen = Vec::new();
    list.walk_from_back(&mut |en| {
      seen.push(*en.key());
      seen.len() < 2
    });
    assert_eq!(seen, vec![1, 2]);
  }
}
