use std::sync::Arc;

/// Callback fired for entry lifecycle events, carrying the key and the value
/// current at the time of the event.
///
/// Listeners are invoked synchronously from the maintenance task, which is
/// also the only thread applying policy mutations. A listener that blocks
/// therefore stalls evictions and expirations for the whole cache; keep them
/// short and hand anything slow to another thread.
pub(crate) type Listener<K, V> = Arc<dyn Fn(&K, &Arc<V>) + Send + Sync>;
