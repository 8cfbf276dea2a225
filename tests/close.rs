mod common;

use common::{eventually, Recorder};

use cachette::Cache;

#[test]
fn close_drains_and_notifies_every_entry() {
  let removals = Recorder::new();
  let cache = Cache::builder()
    .removal_listener(removals.listener())
    .build();

  for i in 0..5 {
    cache.put(format!("k{i}"), i);
  }
  cache.close();

  // close blocks until the maintenance task has torn everything down.
  assert_eq!(removals.count(), 5);
  for i in 0..5 {
    assert!(removals.contains(&format!("k{i}"), i));
  }
}

#[test]
fn close_is_idempotent() {
  let removals = Recorder::new();
  let cache = Cache::builder()
    .removal_listener(removals.listener())
    .build();
  cache.put("k".to_string(), 1);
  cache.close();
  cache.close();
  assert_eq!(removals.count(), 1);
}

#[test]
fn dropping_the_last_handle_closes() {
  let removals = Recorder::new();
  let cache = Cache::builder()
    .removal_listener(removals.listener())
    .build();
  for i in 0..3 {
    cache.put(format!("k{i}"), i);
  }
  drop(cache);
  assert!(eventually(|| removals.count() == 3));
}

#[test]
fn close_applies_queued_insertions_first() {
  let insertions = Recorder::new();
  let removals = Recorder::new();
  let cache = Cache::builder()
    .insertion_listener(insertions.listener())
    .removal_listener(removals.listener())
    .build();

  for i in 0..5 {
    cache.put(format!("k{i}"), i);
  }
  cache.close();
  assert_eq!(insertions.count(), 5, "pending adds are drained before teardown");
  assert_eq!(removals.count(), 5);
}
