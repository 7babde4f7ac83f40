use std::collections::BTreeSet;
use std::ops::Range;

/// Snapshot of which indexes of a pool's active window are live.
///
/// Produced fresh for each job dispatch; later structural changes to the
/// pool do not affect an existing snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ArrayRange {
    pub start: usize,
    pub end: usize,
    /// Indexes inside `start..end` that are logically removed.
    pub holes: BTreeSet<usize>,
}

impl ArrayRange {
    pub fn new(start: usize, end: usize, holes: BTreeSet<usize>) -> Self {
        debug_assert!(start <= end);
        debug_assert!(holes.iter().all(|&h| h >= start && h < end));
        Self { start, end, holes }
    }

    #[inline]
    pub fn is_live(&self, index: usize) -> bool {
        index >= self.start && index < self.end && !self.holes.contains(&index)
    }

    pub fn live_count(&self) -> usize {
        self.end - self.start - self.holes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    /// Live indexes in ascending order.
    pub fn live_indexes(&self) -> impl Iterator<Item = usize> + '_ {
        self.live_in(self.start..self.end)
    }

    /// Live indexes of `range` (clamped to the window), ascending.
    pub fn live_in(&self, range: Range<usize>) -> impl Iterator<Item = usize> + '_ {
        let lo = range.start.max(self.start);
        let hi = range.end.min(self.end);
        (lo..hi).filter(move |i| !self.holes.contains(i))
    }
}
