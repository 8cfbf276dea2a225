use crate::error::BoxError;

use std::sync::Arc;

/// Function computing the value for a missing key.
///
/// Invoked synchronously on the calling thread for cache misses in
/// [`LoadingCache::get`](crate::LoadingCache::get), and from a background
/// task for asynchronous refreshes. A loader is expected to honor its own
/// timeout; the cache never cancels an in-flight load.
pub(crate) type LoaderFn<K, V> = Arc<dyn Fn(&K) -> Result<V, BoxError> + Send + Sync>;

/// Capability that runs submitted tasks some time after the call.
///
/// Used for asynchronous refreshes. When no executor is configured each
/// refresh runs on its own detached thread. Any
/// `Fn(Box<dyn FnOnce() + Send>)` closure qualifies, so a thread pool can be
/// plugged in with a one-liner.
pub trait Executor: Send + Sync {
  fn execute(&self, task: Box<dyn FnOnce() + Send>);
}

impl<F> Executor for F
where
  F: Fn(Box<dyn FnOnce() + Send>) + Send + Sync,
{
  fn execute(&self, task: Box<dyn FnOnce() + Send>) {
    self(task)
  }
}
