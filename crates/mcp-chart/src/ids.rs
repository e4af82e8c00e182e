//! Request id allocation.
//!
//! Ids must be unique among calls in flight, including rapid calls to the
//! same method. The dispatcher takes any [`IdAllocator`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of JSON-RPC request ids.
pub trait IdAllocator: Send + Sync {
    /// Allocate an id for a call to `method`.
    fn next_id(&self, method: &str) -> String;
}

/// Monotonic counter ids of the form `<prefix>-<n>`.
#[derive(Debug)]
pub struct CounterIds {
    prefix: String,
    next: AtomicU64,
}

impl CounterIds {
    /// Create a counter starting at 1.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for CounterIds {
    fn default() -> Self {
        Self::new("req")
    }
}

impl IdAllocator for CounterIds {
    fn next_id(&self, _method: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }
}

/// Random v4 UUID ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdAllocator for UuidIds {
    fn next_id(&self, _method: &str) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_counter_increments() {
        let ids = CounterIds::new("chart");
        assert_eq!(ids.next_id("tools/call"), "chart-1");
        assert_eq!(ids.next_id("tools/call"), "chart-2");
        assert_eq!(ids.next_id("tools/list"), "chart-3");
    }

    #[test]
    fn test_counter_unique_across_threads() {
        let ids = Arc::new(CounterIds::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || {
                    (0..250).map(|_| ids.next_id("tools/call")).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id");
            }
        }
        assert_eq!(seen.len(), 2000);
    }

    #[test]
    fn test_uuid_ids_differ() {
        let ids = UuidIds;
        assert_ne!(ids.next_id("tools/call"), ids.next_id("tools/call"));
    }
}
