mod common;

use common::{eventually, settle, Recorder};

use cachette::{Cache, PolicyKind};

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[test]
fn lru_evicts_the_least_recently_used() {
  let removals = Recorder::new();
  let cache = Cache::builder()
    .maximum_size(3)
    .policy(PolicyKind::Lru)
    .removal_listener(removals.listener())
    .build();

  cache.put("a".to_string(), 1);
  cache.put("b".to_string(), 2);
  cache.put("c".to_string(), 3);
  settle();
  assert_eq!(cache.get_if_present(&"a".to_string()).as_deref(), Some(&1));
  settle();

  cache.put("d".to_string(), 4);
  assert!(eventually(|| removals.count() == 1));
  assert_eq!(removals.events(), vec![("b".to_string(), 2)]);

  assert_eq!(cache.get_if_present(&"a".to_string()).as_deref(), Some(&1));
  assert!(cache.get_if_present(&"b".to_string()).is_none());
  assert_eq!(cache.get_if_present(&"c".to_string()).as_deref(), Some(&3));
  assert!(eventually(|| cache
    .get_if_present(&"d".to_string())
    .is_some()));
  assert!(eventually(|| cache.stats().eviction_count == 1));
  cache.close();
}

fn live_size_stays_bounded(policy: PolicyKind) {
  let live = Arc::new(AtomicI64::new(0));
  let inserted = Arc::clone(&live);
  let removed = Arc::clone(&live);
  let cache = Cache::builder()
    .maximum_size(10)
    .policy(policy)
    .insertion_listener(move |_: &String, _: &Arc<i32>| {
      inserted.fetch_add(1, Ordering::Relaxed);
    })
    .removal_listener(move |_: &String, _: &Arc<i32>| {
      removed.fetch_sub(1, Ordering::Relaxed);
    })
    .build();

  for i in 0..200 {
    cache.put(format!("k{i}"), i);
  }
  // Quiescent state: admissions minus removals is the live entry count.
  assert!(
    eventually(|| {
      let size = live.load(Ordering::Relaxed);
      (0..=10).contains(&size)
    }),
    "live size out of bounds: {}",
    live.load(Ordering::Relaxed)
  );
  settle();
  let size = live.load(Ordering::Relaxed);
  assert!((0..=10).contains(&size), "live size out of bounds: {size}");
  cache.close();
}

#[test]
fn lru_respects_capacity() {
  live_size_stays_bounded(PolicyKind::Lru);
}

#[test]
fn slru_respects_capacity() {
  live_size_stays_bounded(PolicyKind::Slru);
}

#[test]
fn tinylfu_respects_capacity() {
  live_size_stays_bounded(PolicyKind::TinyLfu);
}

#[test]
fn unbounded_cache_never_evicts() {
  let removals = Recorder::new();
  let cache = Cache::builder().removal_listener(removals.listener()).build();
  for i in 0..500 {
    cache.put(format!("k{i}"), i);
  }
  settle();
  assert_eq!(removals.count(), 0);
  assert_eq!(cache.stats().eviction_count, 0);
  for i in (0..500).step_by(97) {
    assert_eq!(
      cache.get_if_present(&format!("k{i}")).as_deref(),
      Some(&i)
    );
  }
  cache.close();
}

#[test]
fn slru_protects_reused_entries_from_scans() {
  let cache = Cache::builder()
    .maximum_size(10)
    .policy(PolicyKind::Slru)
    .build();

  cache.put("hot".to_string(), 0);
  settle();
  // Promote into the protected segment.
  assert!(cache.get_if_present(&"hot".to_string()).is_some());
  settle();

  // A scan of one-shot keys churns the probationary segment only.
  for i in 0..50 {
    cache.put(format!("scan{i}"), i);
  }
  settle();
  assert_eq!(
    cache.get_if_present(&"hot".to_string()).as_deref(),
    Some(&0)
  );
  cache.close();
}
