#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Records listener invocations for assertions.
#[derive(Clone, Default)]
pub struct Recorder {
  events: Arc<Mutex<Vec<(String, i32)>>>,
}

impl Recorder {
  pub fn new() -> Self {
    Self::default()
  }

  /// A listener closure that appends every `(key, value)` it sees.
  pub fn listener(&self) -> impl Fn(&String, &Arc<i32>) + Send + Sync + 'static {
    let events = Arc::clone(&self.events);
    move |key, value| events.lock().unwrap().push((key.clone(), **value))
  }

  pub fn events(&self) -> Vec<(String, i32)> {
    self.events.lock().unwrap().clone()
  }

  pub fn count(&self) -> usize {
    self.events.lock().unwrap().len()
  }

  pub fn contains(&self, key: &str, value: i32) -> bool {
    self
      .events
      .lock()
      .unwrap()
      .iter()
      .any(|(k, v)| k == key && *v == value)
  }
}

/// Polls `condition` until it holds or two seconds elapse. Use instead of a
/// fixed sleep wherever the maintenance task must catch up.
pub fn eventually(condition: impl Fn() -> bool) -> bool {
  let deadline = Instant::now() + Duration::from_secs(2);
  loop {
    if condition() {
      return true;
    }
    if Instant::now() >= deadline {
      return false;
    }
    thread::sleep(Duration::from_millis(5));
  }
}

/// Gives the maintenance task a moment to apply already-enqueued events.
/// Only for cases where the effect has no directly observable condition,
/// such as ordering between a hit and a later add.
pub fn settle() {
  thread::sleep(Duration::from_millis(100));
}
