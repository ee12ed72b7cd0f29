//! Round-robin record sources.
//!
//! Every operation draws from its own feeder so that repeated iterations
//! walk the dataset in a fixed order. Feeders are shared by all workers; the
//! cursor is a single atomic counter.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Circular feeder over a fixed set of records.
#[derive(Debug)]
pub struct CircularFeeder<T> {
    records: Arc<[T]>,
    cursor: AtomicUsize,
}

impl<T: Clone> CircularFeeder<T> {
    pub fn new(records: impl Into<Arc<[T]>>) -> Self {
        Self {
            records: records.into(),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Next record, wrapping to the first one after the last.
    /// Returns `None` only when the feeder has no records at all.
    pub fn next_record(&self) -> Option<T> {
        if self.records.is_empty() {
            return None;
        }
        let draw = self.cursor.fetch_add(1, Ordering::Relaxed);
        Some(self.records[draw % self.records.len()].clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A property update aimed at one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyUpdate<T> {
    pub target: T,
    pub updates: BTreeMap<String, String>,
}

/// Feeder yielding a target identity plus a property change that differs on
/// every draw, so consecutive updates of the same entity are never no-ops.
#[derive(Debug)]
pub struct PropertyUpdateFeeder<T> {
    targets: CircularFeeder<T>,
    property_count: usize,
    sequence: AtomicUsize,
}

impl<T: Clone> PropertyUpdateFeeder<T> {
    pub fn new(targets: impl Into<Arc<[T]>>, property_count: usize) -> Self {
        Self {
            targets: CircularFeeder::new(targets),
            property_count: property_count.max(1),
            sequence: AtomicUsize::new(0),
        }
    }

    pub fn next_record(&self) -> Option<PropertyUpdate<T>> {
        let target = self.targets.next_record()?;
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let mut updates = BTreeMap::new();
        updates.insert(
            format!("UpdatedAttribute_{}", seq % self.property_count),
            format!("UpdatedValue_{}", seq),
        );
        Some(PropertyUpdate { target, updates })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
