use crate::entry::EntryRef;
use crate::policy::{AccessList, AddResult, CachePolicy};
use crate::store::ShardedStore;

use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::Arc;

const SKETCH_DEPTH: usize = 4;
const MIN_SKETCH_WIDTH: usize = 64;
const MAX_SKETCH_WIDTH: usize = 1 << 20;

/// A count-min sketch estimating access frequency.
///
/// Counters are halved once the number of increments reaches the sample
/// period, so stale popularity decays instead of pinning the cache.
struct CountMinSketch {
  rows: Vec<Vec<u32>>,
  hashers: Vec<ahash::RandomState>,
  increments: usize,
  sample_period: usize,
}

impl CountMinSketch {
  fn new(cap: usize) -> Self {
    let width = cap
      .next_power_of_two()
      .clamp(MIN_SKETCH_WIDTH, MAX_SKETCH_WIDTH);
    Self {
      rows: vec![vec![0; width]; SKETCH_DEPTH],
      hashers: (0..SKETCH_DEPTH).map(|_| ahash::RandomState::new()).collect(),
      increments: 0,
      sample_period: width * 8,
    }
  }

  fn column<K: Hash>(&self, row: usize, key: &K) -> usize {
    let mut hasher = self.hashers[row].build_hasher();
    key.hash(&mut hasher);
    hasher.finish() as usize & (self.rows[row].len() - 1)
  }

  fn increment<K: Hash>(&mut self, key: &K) {
    for row in 0..SKETCH_DEPTH {
      let column = self.column(row, key);
      self.rows[row][column] = self.rows[row][column].saturating_add(1);
    }
    self.increments += 1;
    if self.increments >= self.sample_period {
      self.decay();
    }
  }

  fn estimate<K: Hash>(&self, key: &K) -> u32 {
    (0..SKETCH_DEPTH)
      .map(|row| self.rows[row][self.column(row, key)])
      .min()
      .unwrap_or(0)
  }

  fn decay(&mut self) {
    self.increments = 0;
    for row in &mut self.rows {
      for counter in row.iter_mut() {
        *counter /= 2;
      }
    }
  }
}

/// TinyLFU: a small admission window in front of a segmented main space.
///
/// Every new entry gets a grace period in the window. When the window
/// overflows, its oldest entry becomes a candidate for the main space; if the
/// main space is full, the frequency sketch compares the candidate against
/// the main space's coldest entry and the less popular of the two is dropped.
pub(crate) struct TinyLfuPolicy<K, V, S> {
  store: Arc<ShardedStore<K, V, S>>,
  cap: usize,
  window_cap: usize,
  protected_cap: usize,
  sketch: CountMinSketch,
  window: AccessList<K, V>,
  probation: AccessList<K, V>,
  protected: AccessList<K, V>,
}

impl<K, V, S> TinyLfuPolicy<K, V, S>
where
  K: Eq + Hash + Clone,
  S: BuildHasher + Clone,
{
  pub(crate) fn new(store: Arc<ShardedStore<K, V, S>>, cap: usize) -> Self {
    let window_cap = if cap == 0 { usize::MAX } else { (cap / 100).max(1) };
    let main_cap = cap.saturating_sub(window_cap);
    let protected_cap = if cap == 0 {
      usize::MAX
    } else {
      main_cap.saturating_sub((main_cap / 5).max(1)).max(1)
    };
    Self {
      store,
      cap,
      window_cap,
      protected_cap,
      sketch: CountMinSketch::new(cap.max(MIN_SKETCH_WIDTH)),
      window: AccessList::new(),
      probation: AccessList::new(),
      protected: AccessList::new(),
    }
  }

  fn segment_of(&self, key: &K) -> Option<Segment> {
    if self.window.contains(key) {
      Some(Segment::Window)
    } else if self.probation.contains(key) {
      Some(Segment::Probation)
    } else if self.protected.contains(key) {
      Some(Segment::Protected)
    } else {
      None
    }
  }

  fn main_len(&self) -> usize {
    self.probation.len() + self.protected.len()
  }

  fn main_cap(&self) -> usize {
    self.cap.saturating_sub(self.window_cap)
  }

  fn rebalance_protected(&mut self) {
    while self.protected.len() > self.protected_cap {
      match self.protected.pop_back() {
        Some(demoted) => self.probation.push_front(demoted),
        None => break,
      }
    }
  }

  /// Moves the window's oldest entry toward the main space, dropping either
  /// it or the main space's coldest entry when the main space is full.
  fn admit_window_victim(&mut self) -> Option<EntryRef<K, V>> {
    let candidate = self.window.pop_back()?;
    if self.main_len() < self.main_cap() {
      self.probation.push_front(candidate);
      return None;
    }

    let victim_freq = self
      .probation
      .back()
      .or_else(|| self.protected.back())
      .map(|victim| self.sketch.estimate(victim.key()));
    match victim_freq {
      Some(victim_freq) if self.sketch.estimate(candidate.key()) < victim_freq => {
        // The candidate is colder than anything it would displace.
        self.store.remove(&candidate);
        Some(candidate)
      }
      Some(_) => {
        let victim = self
          .probation
          .pop_back()
          .or_else(|| self.protected.pop_back())
          .expect("main space is full");
        self.store.remove(&victim);
        self.probation.push_front(candidate);
        Some(victim)
      }
      None => {
        self.probation.push_front(candidate);
        None
      }
    }
  }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Segment {
  Window,
  Probation,
  Protected,
}

impl<K, V, S> CachePolicy<K, V, S> for TinyLfuPolicy<K, V, S>
where
  K: Eq + Hash + Clone + Send + Sync,
  V: Send + Sync,
  S: BuildHasher + Clone + Send + Sync,
{
  fn add(&mut self, entry: EntryRef<K, V>) -> AddResult<K, V> {
    let entry = super::resolve_live_entry(&self.store, entry);
    self.sketch.increment(entry.key());

    match self.segment_of(entry.key()) {
      Some(Segment::Window) => {
        self.window.push_front(entry.clone());
        return AddResult {
          entry,
          admitted: false,
          evicted: None,
        };
      }
      Some(Segment::Probation) => {
        self.probation.push_front(entry.clone());
        return AddResult {
          entry,
          admitted: false,
          evicted: None,
        };
      }
      Some(Segment::Protected) => {
        self.protected.push_front(entry.clone());
        return AddResult {
          entry,
          admitted: false,
          evicted: None,
        };
      }
      None => {}
    }

    self.window.push_front(entry.clone());
    let mut evicted = None;
    if self.cap != 0 && self.window.len() > self.window_cap {
      evicted = self.admit_window_victim();
    }
    AddResult {
      entry,
      admitted: true,
      evicted,
    }
  }

  fn hit(&mut self, entry: &EntryRef<K, V>) {
    match self.segment_of(entry.key()) {
      Some(Segment::Window) if self.window.tracks(entry) => {
        self.sketch.increment(entry.key());
        self.window.move_to_front(entry.key());
      }
      Some(Segment::Probation) if self.probation.tracks(entry) => {
        self.sketch.increment(entry.key());
        let promoted = self.probation.remove(entry.key()).expect("tracked above");
        self.protected.push_front(promoted);
        self.rebalance_protected();
      }
      Some(Segment::Protected) if self.protected.tracks(entry) => {
        self.sketch.increment(entry.key());
        self.protected.move_to_front(entry.key());
      }
      _ => {}
    }
  }

  fn remove(&mut self, entry: &EntryRef<K, V>) -> Option<EntryRef<K, V>> {
    let removed = match self.segment_of(entry.key())? {
      Segment::Window if self.window.tracks(entry) => self.window.remove(entry.key()),
      Segment::Probation if self.probation.tracks(entry) => self.probation.remove(entry.key()),
      Segment::Protected if self.protected.tracks(entry) => self.protected.remove(entry.key()),
      _ => return None,
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
      self.protected.walk_from_back(&mut |en| {
        keep_going = visit(en);
        keep_going
      });
    }
    if keep_going {
      self.window.walk_from_back(visit);
    }
  }
}
