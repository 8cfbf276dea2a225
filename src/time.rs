use once_cell::sync::Lazy;
use std::time::Instant;

// The single reference clock for every timestamp in the cache. Initialized
// lazily on first use so short-lived processes pay nothing up front.
static CLOCK_EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Current time as nanoseconds since the process-local epoch.
///
/// Entry timestamps are plain `u64`s so they can live in atomic fields and be
/// compared with saturating arithmetic.
#[inline]
pub(crate) fn now_nanos() -> u64 {
  Instant::now().saturating_duration_since(*CLOCK_EPOCH).as_nanos() as u64
}
