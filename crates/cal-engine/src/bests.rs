//! Top-N best-candidate tracking.
//!
//! Each process owns one [`BestSet`]: a fixed-capacity sequence of
//! (candidate, objective value) entries kept sorted ascending by value.
//! Worker threads reach it through [`SharedBestSet`], whose `offer` is the
//! single atomic mutation; cross-process aggregation reuses the same sorted
//! merge via [`BestSet::merge`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One retained result: the objective value of one candidate. Lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BestEntry {
    pub candidate: usize,
    pub value: f64,
}

/// Bounded ordered collection of the best entries seen so far.
#[derive(Debug, Clone, PartialEq)]
pub struct BestSet {
    capacity: usize,
    entries: Vec<BestEntry>,
}

impl BestSet {
    /// Capacity comes from the validated `bests` count and is at least 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Vec::with_capacity(capacity.max(1)),
        }
    }

    /// Offer one result. Admits it when there is room or it beats the current
    /// worst entry, evicting that entry if the set is full. Returns whether
    /// the entry was admitted.
    pub fn offer(&mut self, candidate: usize, value: f64) -> bool {
        if self.entries.len() >= self.capacity {
            let worst = self.entries[self.entries.len() - 1].value;
            if !(value < worst) {
                return false;
            }
            self.entries.pop();
        }
        self.entries.push(BestEntry { candidate, value });
        // Single insertion-sort step; capacity is intended to be small.
        let mut i = self.entries.len() - 1;
        while i > 0 && self.entries[i].value < self.entries[i - 1].value {
            self.entries.swap(i, i - 1);
            i -= 1;
        }
        true
    }

    /// Fold another sorted entry list into this one, keeping the first
    /// `capacity` entries of the merged stream. Linear in the two sizes.
    pub fn merge(&mut self, other: &[BestEntry]) {
        let mut merged = Vec::with_capacity(self.capacity);
        let (mut i, mut j) = (0, 0);
        while merged.len() < self.capacity {
            let take_own = match (self.entries.get(i), other.get(j)) {
                (Some(a), Some(b)) => a.value <= b.value,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            if take_own {
                merged.push(self.entries[i]);
                i += 1;
            } else {
                merged.push(other[j]);
                j += 1;
            }
        }
        self.entries = merged;
    }

    /// Entries sorted ascending by objective value.
    pub fn entries(&self) -> &[BestEntry] {
        &self.entries
    }

    pub fn best(&self) -> Option<&BestEntry> {
        self.entries.first()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Thread-shared tracker. The lock is held only for the O(N) insertion,
/// never across a process spawn.
#[derive(Debug, Clone)]
pub struct SharedBestSet {
    inner: Arc<Mutex<BestSet>>,
}

impl SharedBestSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BestSet::new(capacity))),
        }
    }

    pub fn offer(&self, candidate: usize, value: f64) -> bool {
        self.inner.lock().offer(candidate, value)
    }

    /// Recover the underlying set once all workers have joined.
    pub fn into_inner(self) -> BestSet {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner(),
            Err(arc) => arc.lock().clone(),
        }
    }
}
