use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_utils::CachePadded;

/// Receiver for cache events: hits, misses, evictions, and loader outcomes.
///
/// The default implementation is [`ConcurrentStatsCounter`]; hosts that
/// aggregate metrics elsewhere can supply their own via
/// [`CacheBuilder::stats_counter`](crate::CacheBuilder::stats_counter).
/// Implementations must be cheap and non-blocking; they are invoked inline
/// from read and write paths.
pub trait StatsCounter: Send + Sync {
  fn record_hits(&self, count: u64);
  fn record_misses(&self, count: u64);
  fn record_eviction(&self);
  fn record_load_success(&self, load_time: Duration);
  fn record_load_error(&self, load_time: Duration);
  /// Copies the current counter values into `into`.
  fn snapshot(&self, into: &mut Stats);
}

/// A point-in-time copy of cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
  pub hit_count: u64,
  pub miss_count: u64,
  pub load_success_count: u64,
  pub load_error_count: u64,
  pub eviction_count: u64,
  /// Cumulative wall time spent in the loader, successes and failures alike.
  pub total_load_time: Duration,
}

impl Stats {
  /// Total number of lookups, hits and misses combined.
  pub fn request_count(&self) -> u64 {
    self.hit_count + self.miss_count
  }

  pub fn hit_rate(&self) -> f64 {
    let total = self.request_count();
    if total == 0 {
      0.0
    } else {
      self.hit_count as f64 / total as f64
    }
  }

  pub fn miss_rate(&self) -> f64 {
    let total = self.request_count();
    if total == 0 {
      0.0
    } else {
      self.miss_count as f64 / total as f64
    }
  }

  pub fn load_error_rate(&self) -> f64 {
    let total = self.load_success_count + self.load_error_count;
    if total == 0 {
      0.0
    } else {
      self.load_error_count as f64 / total as f64
    }
  }

  /// Mean time spent per loader invocation.
  pub fn average_load_penalty(&self) -> Duration {
    let total = self.load_success_count + self.load_error_count;
    if total == 0 {
      Duration::ZERO
    } else {
      self.total_load_time / total as u32
    }
  }
}

/// The default in-memory stats counter.
///
/// Counters are cache-line padded so concurrent readers on different cores do
/// not false-share.
#[derive(Default)]
pub struct ConcurrentStatsCounter {
  hits: CachePadded<AtomicU64>,
  misses: CachePadded<AtomicU64>,
  load_successes: CachePadded<AtomicU64>,
  load_errors: CachePadded<AtomicU64>,
  evictions: CachePadded<AtomicU64>,
  total_load_time_nanos: CachePadded<AtomicU64>,
}

impl ConcurrentStatsCounter {
  pub fn new() -> Self {
    Self::default()
  }
}

impl fmt::Debug for ConcurrentStatsCounter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut stats = Stats::default();
    self.snapshot(&mut stats);
    f.debug_tuple("ConcurrentStatsCounter").field(&stats).finish()
  }
}

impl StatsCounter for ConcurrentStatsCounter {
  fn record_hits(&self, count: u64) {
    self.hits.fetch_add(count, Ordering::Relaxed);
  }

  fn record_misses(&self, count: u64) {
    self.misses.fetch_add(count, Ordering::Relaxed);
  }

  fn record_eviction(&self) {
    self.evictions.fetch_add(1, Ordering::Relaxed);
  }

  fn record_load_success(&self, load_time: Duration) {
    self.load_successes.fetch_add(1, Ordering::Relaxed);
    self
      .total_load_time_nanos
      .fetch_add(load_time.as_nanos() as u64, Ordering::Relaxed);
  }

  fn record_load_error(&self, load_time: Duration) {
    self.load_errors.fetch_add(1, Ordering::Relaxed);
    self
      .total_load_time_nanos
      .fetch_add(load_time.as_nanos() as u64, Ordering::Relaxed);
  }

  fn snapshot(&self, into: &mut Stats) {
    into.hit_count = self.hits.load(Ordering::Relaxed);
    into.miss_count = self.misses.load(Ordering::Relaxed);
    into.load_success_count = self.load_successes.load(Ordering::Relaxed);
    into.load_error_count = self.load_errors.load(Ordering::Relaxed);
    into.eviction_count = self.evictions.load(Ordering::Relaxed);
    into.total_load_time = Duration::from_nanos(self.total_load_time_nanos.load(Ordering::Relaxed));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn snapshot_copies_all_counters() {
    let counter = ConcurrentStatsCounter::new();
    counter.record_hits(3);
    counter.record_misses(1);
    counter.record_eviction();
    counter.record_load_success(Duration::from_millis(10));
    counter.record_load_error(Duration::from_millis(30));

    let mut stats = Stats::default();
    counter.snapshot(&mut stats);
    assert_eq!(stats.hit_count, 3);
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.eviction_count, 1);
    assert_eq!(stats.load_success_count, 1);
    assert_eq!(stats.load_error_count, 1);
    assert_eq!(stats.total_load_time, Duration::from_millis(40));
  }

  #[test]
  fn derived_rates() {
    let stats = Stats {
      hit_count: 3,
      miss_count: 1,
      load_success_count: 1,
      load_error_count: 1,
      eviction_count: 0,
      total_load_time: Duration::from_millis(40),
    };
    assert_eq!(stats.request_count(), 4);
    assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
    assert!((stats.miss_rate() - 0.25).abs() < f64::EPSILON);
    assert!((stats.load_error_rate() - 0.5).abs() < f64::EPSILON);
    assert_eq!(stats.average_load_penalty(), Duration::from_millis(20));
  }

  #[test]
  fn empty_stats_have_zero_rates() {
    let stats = Stats::default();
    assert_eq!(stats.hit_rate(), 0.0);
    assert_eq!(stats.miss_rate(), 0.0);
    assert_eq!(stats.average_load_penalty(), Duration::ZERO);
  }
}
