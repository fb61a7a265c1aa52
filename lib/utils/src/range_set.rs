use alloc::{vec, vec::Vec};
use core::{cmp::max, ops::Range, slice::Iter};

/// A set of disjoint, non-empty address ranges kept sorted by start address.
///
/// Touching or overlapping ranges are merged on insertion.
#[derive(Debug, Default, Clone)]
pub struct SortedRangeSet {
    inner: Vec<Range<usize>>,
}

impl SortedRangeSet {
    pub const fn new() -> SortedRangeSet {
        SortedRangeSet { inner: vec![] }
    }

    pub fn iter(&self) -> Iter<'_, Range<usize>> {
        self.inner.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn combine(&mut self) {
        let mut merged: Vec<Range<usize>> = Vec::with_capacity(self.inner.len());
        for range in self.inner.drain(..) {
            if range.is_empty() {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.end >= range.start => last.end = max(last.end, range.end),
                _ => merged.push(range),
            }
        }
        self.inner = merged;
    }

    pub fn add(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let pos = self.inner.partition_point(|r| r.start <= range.start);
        self.inner.insert(pos, range);
        self.combine();
    }

    pub fn sub(&mut self, range: Range<usize>) {
        if range.is_empty() {
            return;
        }
        let mut res = Vec::with_capacity(self.inner.len() + 1);
        for current in self.inner.drain(..) {
            if current.end <= range.start || current.start >= range.end {
                res.push(current);
                continue;
            }
            // [      ]
            //    [      ]
            if current.start < range.start {
                res.push(current.start..range.start);
            }
            //     [      ]
            //  [       ]
            if current.end > range.end {
                res.push(range.end..current.end);
            }
        }
        self.inner = res;
    }

    /// Whether any range of the set shares at least one address with `range`.
    pub fn overlaps(&self, range: &Range<usize>) -> bool {
        self.inner
            .iter()
            .any(|r| r.start < range.end && range.start < r.end)
    }
}
