use thiserror::Error;

/// Type-erased error returned by a loader function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error returned by [`LoadingCache::get`](crate::LoadingCache::get) when the
/// configured loader fails.
///
/// The loader's error is carried verbatim as the source; a failed load never
/// mutates the cache.
#[derive(Debug, Error)]
#[error("cache loader failed: {source}")]
pub struct LoadError {
  #[source]
  source: BoxError,
}

impl LoadError {
  pub(crate) fn new(source: BoxError) -> Self {
    Self { source }
  }

  /// Consumes the wrapper and returns the loader's original error.
  pub fn into_inner(self) -> BoxError {
    self.source
  }
}

/// Error returned when parsing a replacement policy name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown replacement policy {0:?}, expected one of: lru, slru, tinylfu")]
pub struct UnknownPolicy(pub(crate) String);
