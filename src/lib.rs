//! A concurrent in-process key/value cache with pluggable replacement
//! policies, time-based expiration, and optional loader-backed population
//! with asynchronous refresh.
//!
//! Reads are served directly from a sharded lock-light hash table. All policy
//! bookkeeping (admission, reordering, eviction, expiration sweeps, listener
//! invocation) happens on a single background maintenance task fed through
//! bounded event queues, so the ordering structures need no locks and writers
//! naturally throttle to the rate maintenance keeps up.
//!
//! ```
//! use cachette::{Cache, PolicyKind};
//!
//! let cache = Cache::builder()
//!   .maximum_size(10_000)
//!   .policy(PolicyKind::TinyLfu)
//!   .build();
//! cache.put("user:42", "profile");
//! assert_eq!(cache.get_if_present(&"user:42").as_deref(), Some(&"profile"));
//! ```
//!
//! A [`LoadingCache`] adds read-through population:
//!
//! ```
//! use cachette::CacheBuilder;
//!
//! let cache = CacheBuilder::new().build_with_loader(|key: &String| Ok(key.len()));
//! assert_eq!(*cache.get(&"four".to_string()).unwrap(), 4);
//! ```

pub mod builder;
mod cache;
mod entry;
mod error;
mod listener;
mod loader;
pub mod policy;
mod shared;
pub mod stats;
mod store;
mod task;
mod time;

pub use builder::CacheBuilder;
pub use cache::{Cache, LoadingCache};
pub use error::{BoxError, LoadError, UnknownPolicy};
pub use loader::Executor;
pub use policy::PolicyKind;
pub use stats::{ConcurrentStatsCounter, Stats, StatsCounter};
