//! Changed spans of the flattened member list

use serde::Serialize;

/// Half-open `[from, to)` span of view indices. A zero-width range marks
/// growth at the tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexRange {
    pub from: usize,
    pub to: usize,
}

impl IndexRange {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }

    /// Proper overlap; empty ranges overlap nothing.
    pub fn overlaps(&self, other: &IndexRange) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.from < other.to && other.from < self.to
    }

    /// Overlap or shared boundary, so tail growth at the end of a window
    /// still counts.
    pub fn touches(&self, other: &IndexRange) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    /// Smallest range covering both.
    pub fn union(&self, other: &IndexRange) -> IndexRange {
        IndexRange {
            from: self.from.min(other.from),
            to: self.to.max(other.to),
        }
    }
}

/// Positional diff of two views: every maximal run of indices whose entry
/// differs, measured against the old length. Pure growth yields a single
/// zero-width range at the old end.
pub fn diff_views<T: PartialEq>(old: &[T], new: &[T]) -> Vec<IndexRange> {
    let mut changes = Vec::new();
    let mut start: Option<usize> = None;

    for idx in 0..old.len() {
        let changed = new.get(idx).is_none_or(|entry| *entry != old[idx]);
        match (changed, start) {
            (true, None) => start = Some(idx),
            (false, Some(from)) => {
                changes.push(IndexRange::new(from, idx));
                start = None;
            }
            _ => {}
        }
    }

    if let Some(from) = start {
        changes.push(IndexRange::new(from, old.len()));
    } else if new.len() > old.len() {
        changes.push(IndexRange::new(old.len(), old.len()));
    }

    changes
}
