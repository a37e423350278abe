//! Per-instance cache of the last read raw string and its parsed value.
//!
//! Revalidation is a raw-string comparison against the current effective
//! raw (fallback entry first, durable value otherwise), so unrelated
//! re-renders reuse the parsed value instead of reparsing. Checking and
//! refreshing are idempotent; notifying the same instance twice is safe.

use std::cell::RefCell;

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod snapshot_test;

struct Snapshot<T> {
    raw: Option<String>,
    value: T,
}

/// Cache of one parsed read, revalidated by raw-string identity.
pub(crate) struct SnapshotCache<T> {
    entry: RefCell<Option<Snapshot<T>>>,
}

impl<T: Clone> SnapshotCache<T> {
    pub(crate) fn new() -> Self {
        Self { entry: RefCell::new(None) }
    }

    /// The cached value, if `raw` matches the raw string it was parsed from.
    pub(crate) fn lookup(&self, raw: Option<&str>) -> Option<T> {
        let entry = self.entry.borrow();
        let snapshot = entry.as_ref()?;
        (snapshot.raw.as_deref() == raw).then(|| snapshot.value.clone())
    }

    /// Replace the cache with a freshly parsed read.
    pub(crate) fn store(&self, raw: Option<String>, value: T) {
        *self.entry.borrow_mut() = Some(Snapshot { raw, value });
    }
}
