mod common;

use common::{eventually, settle};

use cachette::{CacheBuilder, LoadingCache};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A loader that returns `base + number of prior calls` and counts calls.
fn counting_loader(
  base: i32,
) -> (
  Arc<AtomicUsize>,
  impl Fn(&String) -> Result<i32, cachette::BoxError> + Send + Sync + 'static,
) {
  let calls = Arc::new(AtomicUsize::new(0));
  let loader_calls = Arc::clone(&calls);
  let loader = move |_key: &String| {
    let call = loader_calls.fetch_add(1, Ordering::SeqCst);
    Ok(base + call as i32)
  };
  (calls, loader)
}

#[test]
fn miss_loads_and_caches() {
  let (calls, loader) = counting_loader(10);
  let cache = CacheBuilder::new().build_with_loader(loader);

  assert_eq!(*cache.get(&"k".to_string()).unwrap(), 10);
  assert_eq!(calls.load(Ordering::SeqCst), 1);

  // Once the add event lands, hits stop consulting the loader.
  assert!(eventually(|| cache
    .get_if_present(&"k".to_string())
    .is_some()));
  assert_eq!(*cache.get(&"k".to_string()).unwrap(), 10);
  assert_eq!(calls.load(Ordering::SeqCst), 1);

  let stats = cache.stats();
  assert_eq!(stats.load_success_count, 1);
  assert_eq!(stats.load_error_count, 0);
  cache.close();
}

#[test]
fn loader_error_leaves_cache_untouched() {
  let cache: LoadingCache<String, i32> = CacheBuilder::new()
    .build_with_loader(|_key: &String| Err("backend unavailable".into()));

  let error = cache.get(&"k".to_string()).unwrap_err();
  assert!(error.to_string().contains("backend unavailable"));
  assert!(cache.get_if_present(&"k".to_string()).is_none());

  let stats = cache.stats();
  assert_eq!(stats.load_error_count, 1);
  assert_eq!(stats.load_success_count, 0);
  cache.close();
}

#[test]
fn expired_entry_serves_stale_then_refreshes() {
  let (calls, loader) = counting_loader(1);
  let cache = CacheBuilder::new()
    .expire_after_access(Duration::from_millis(50))
    .build_with_loader(loader);

  assert_eq!(*cache.get(&"k".to_string()).unwrap(), 1);
  assert!(eventually(|| cache
    .get_if_present(&"k".to_string())
    .is_some()));

  thread::sleep(Duration::from_millis(80));
  // The expired hit returns the stale value immediately and schedules a
  // background reload.
  assert_eq!(*cache.get(&"k".to_string()).unwrap(), 1);
  assert!(eventually(|| calls.load(Ordering::SeqCst) == 2));
  assert!(eventually(|| *cache.get(&"k".to_string()).unwrap() == 2));
  cache.close();
}

#[test]
fn refresh_reloads_in_the_background() {
  let (calls, loader) = counting_loader(1);
  let cache = CacheBuilder::new().build_with_loader(loader);

  assert_eq!(*cache.get(&"k".to_string()).unwrap(), 1);
  assert!(eventually(|| cache
    .get_if_present(&"k".to_string())
    .is_some()));

  cache.refresh(&"k".to_string());
  assert!(eventually(|| *cache.get(&"k".to_string()).unwrap() == 2));
  assert_eq!(calls.load(Ordering::SeqCst), 2);
  cache.close();
}

#[test]
fn refresh_of_absent_key_loads_synchronously() {
  let (calls, loader) = counting_loader(7);
  let cache = CacheBuilder::new().build_with_loader(loader);

  cache.refresh(&"k".to_string());
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  assert!(eventually(|| cache
    .get_if_present(&"k".to_string())
    .as_deref()
    == Some(&7)));
  cache.close();
}

#[test]
fn concurrent_refreshes_collapse_to_one_load() {
  let calls = Arc::new(AtomicUsize::new(0));
  let loader_calls = Arc::clone(&calls);
  let cache = CacheBuilder::new().build_with_loader(move |_key: &String| {
    loader_calls.fetch_add(1, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150));
    Ok(42)
  });

  cache.put("k".to_string(), 0);
  for _ in 0..5 {
    cache.refresh(&"k".to_string());
  }
  assert!(eventually(|| *cache.get(&"k".to_string()).unwrap() == 42));
  assert_eq!(
    calls.load(Ordering::SeqCst),
    1,
    "only the first refresh may reach the loader"
  );
  cache.close();
}

#[test]
fn refresh_failure_keeps_serving_the_old_value() {
  let attempts = Arc::new(AtomicUsize::new(0));
  let loader_attempts = Arc::clone(&attempts);
  let cache = CacheBuilder::new().build_with_loader(move |_key: &String| {
    if loader_attempts.fetch_add(1, Ordering::SeqCst) == 0 {
      Ok(1)
    } else {
      Err("flaky backend".into())
    }
  });

  assert_eq!(*cache.get(&"k".to_string()).unwrap(), 1);
  cache.refresh(&"k".to_string());
  assert!(eventually(|| cache.stats().load_error_count == 1));
  assert_eq!(attempts.load(Ordering::SeqCst), 2);
  assert_eq!(*cache.get(&"k".to_string()).unwrap(), 1, "old value survives");
  cache.close();
}

#[test]
fn fresh_hits_never_reload() {
  let (calls, loader) = counting_loader(1);
  let cache = CacheBuilder::new()
    .refresh_after_write(Duration::from_millis(50))
    .build_with_loader(loader);

  assert_eq!(*cache.get(&"k".to_string()).unwrap(), 1);
  thread::sleep(Duration::from_millis(80));
  // Refreshes are scheduled only once an entry expires; an aged but fresh
  // entry keeps serving without going back to the loader.
  assert_eq!(*cache.get(&"k".to_string()).unwrap(), 1);
  settle();
  assert_eq!(calls.load(Ordering::SeqCst), 1);
  cache.close();
}

#[test]
fn executor_runs_the_refresh_tasks() {
  let executed = Arc::new(AtomicUsize::new(0));
  let executed_by_pool = Arc::clone(&executed);
  let (calls, loader) = counting_loader(1);
  let cache = CacheBuilder::new()
    .executor(move |task: Box<dyn FnOnce() + Send>| {
      executed_by_pool.fetch_add(1, Ordering::SeqCst);
      thread::spawn(task);
    })
    .build_with_loader(loader);

  assert_eq!(*cache.get(&"k".to_string()).unwrap(), 1);
  cache.refresh(&"k".to_string());
  assert!(eventually(|| executed.load(Ordering::SeqCst) == 1));
  assert!(eventually(|| calls.load(Ordering::SeqCst) == 2));
  cache.close();
}
