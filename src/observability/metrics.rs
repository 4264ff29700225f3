//! Optimizer counters
//!
//! - Counters only, monotonic, reset on process start
//! - Atomic with `Relaxed` ordering; values are exact, cross-counter
//!   consistency is not guaranteed mid-flight

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Registry of optimizer counters
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    plans_generated: AtomicU64,
    plans_selected: AtomicU64,
    plans_reused: AtomicU64,
    queries_executed: AtomicU64,
    queries_rejected: AtomicU64,
    store_failures: AtomicU64,
    correlations_created: AtomicU64,
    correlations_reused: AtomicU64,
    hints_propagated: AtomicU64,
}

macro_rules! counter {
    ($inc:ident, $field:ident) => {
        pub fn $inc(&self) {
            self.$field.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(increment_cache_hits, cache_hits);
    counter!(increment_cache_misses, cache_misses);
    counter!(increment_plans_selected, plans_selected);
    counter!(increment_plans_reused, plans_reused);
    counter!(increment_queries_executed, queries_executed);
    counter!(increment_queries_rejected, queries_rejected);
    counter!(increment_store_failures, store_failures);
    counter!(increment_correlations_created, correlations_created);
    counter!(increment_correlations_reused, correlations_reused);
    counter!(increment_hints_propagated, hints_propagated);

    /// Count generated candidates
    pub fn add_plans_generated(&self, count: u64) {
        self.plans_generated.fetch_add(count, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            plans_generated: self.plans_generated.load(Ordering::Relaxed),
            plans_selected: self.plans_selected.load(Ordering::Relaxed),
            plans_reused: self.plans_reused.load(Ordering::Relaxed),
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            store_failures: self.store_failures.load(Ordering::Relaxed),
            correlations_created: self.correlations_created.load(Ordering::Relaxed),
            correlations_reused: self.correlations_reused.load(Ordering::Relaxed),
            hints_propagated: self.hints_propagated.load(Ordering::Relaxed),
        }
    }

    /// Snapshot as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or(serde_json::Value::Null)
    }
}

/// A point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub plans_generated: u64,
    pub plans_selected: u64,
    pub plans_reused: u64,
    pub queries_executed: u64,
    pub queries_rejected: u64,
    pub store_failures: u64,
    pub correlations_created: u64,
    pub correlations_reused: u64,
    pub hints_propagated: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_is_zero() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_increments() {
        let registry = MetricsRegistry::new();
        registry.increment_cache_hits();
        registry.increment_cache_misses();
        registry.increment_cache_misses();
        registry.add_plans_generated(3);
        registry.increment_hints_propagated();

        let snap = registry.snapshot();
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.cache_misses, 2);
        assert_eq!(snap.plans_generated, 3);
        assert_eq!(snap.hints_propagated, 1);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.increment_queries_executed();

        let json = registry.to_json();
        assert_eq!(json["queries_executed"], 1);
        assert_eq!(json["store_failures"], 0);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..250 {
                        reg.increment_cache_hits();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(registry.snapshot().cache_hits, 2000);
    }
}
