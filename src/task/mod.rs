mod maintenance;

pub(crate) use maintenance::{Maintenance, MaintenanceContext};

use crate::entry::EntryRef;

/// Message on the delete queue.
pub(crate) enum Removal<K, V> {
  /// Remove this entry if it is still tracked.
  Entry(EntryRef<K, V>),
  /// Remove every entry, firing the removal listener for each.
  All,
}
