//! Index ranges and the per-node range set.
//!
//! Selection state for one node's direct children is stored as a
//! [`RangeCollection`]: a sorted list of non-overlapping inclusive
//! [`IndexRange`]s. Runs of selected siblings stay compact no matter how many
//! items they cover.

use std::fmt;

/// An inclusive interval `[begin, end]` of sibling indices.
///
/// Both bounds are part of the range; `IndexRange::new(2, 4)` covers indices
/// 2, 3 and 4. The constructor normalizes bound order.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRange {
    begin: usize,
    end: usize,
}

impl IndexRange {
    /// Creates a range covering `[begin, end]` inclusive.
    ///
    /// Bounds given in the wrong order are swapped.
    #[inline]
    pub fn new(begin: usize, end: usize) -> Self {
        if begin <= end {
            Self { begin, end }
        } else {
            Self {
                begin: end,
                end: begin,
            }
        }
    }

    /// Creates a range covering a single index.
    #[inline]
    pub fn single(index: usize) -> Self {
        Self {
            begin: index,
            end: index,
        }
    }

    /// The first index in the range.
    #[inline]
    pub fn begin(&self) -> usize {
        self.begin
    }

    /// The last index in the range (inclusive).
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of indices covered.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.begin + 1
    }

    /// Always `false`; an `IndexRange` covers at least one index.
    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Returns `true` if `index` falls inside the range.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.begin && index <= self.end
    }

    /// Returns `true` if the two ranges share at least one index.
    #[inline]
    pub fn intersects(&self, other: &IndexRange) -> bool {
        self.begin <= other.end && other.begin <= self.end
    }

    /// Iterates over the covered indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + use<> {
        self.begin..=self.end
    }

    /// Shifts both bounds by `delta`.
    pub(crate) fn shifted(&self, delta: isize) -> IndexRange {
        debug_assert!(self.begin as isize + delta >= 0, "range shifted below zero");
        IndexRange {
            begin: (self.begin as isize + delta) as usize,
            end: (self.end as isize + delta) as usize,
        }
    }
}

impl fmt::Debug for IndexRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..={}]", self.begin, self.end)
    }
}

impl From<usize> for IndexRange {
    fn from(index: usize) -> Self {
        Self::single(index)
    }
}

impl From<std::ops::RangeInclusive<usize>> for IndexRange {
    fn from(range: std::ops::RangeInclusive<usize>) -> Self {
        Self::new(*range.start(), *range.end())
    }
}

/// A sorted set of non-overlapping index ranges for one node's children.
///
/// `select` and `deselect` report the exact delta they applied, which is what
/// the selection model aggregates into its change notifications. After any
/// sequence of `select`/`deselect` calls the ranges are sorted,
/// non-overlapping, and non-adjacent (adjacent ranges coalesce eagerly on
/// select). Structural shifts ([`insert_items`](Self::insert_items) /
/// [`remove_items`](Self::remove_items)) preserve sortedness and disjointness
/// but may leave two ranges adjacent, mirroring how index shifts land.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RangeCollection {
    ranges: Vec<IndexRange>,
}

impl RangeCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored ranges, sorted by begin.
    #[inline]
    pub fn ranges(&self) -> &[IndexRange] {
        &self.ranges
    }

    /// Returns `true` if nothing is selected.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Total number of selected indices.
    pub fn count(&self) -> usize {
        self.ranges.iter().map(IndexRange::len).sum()
    }

    /// Iterates over the stored ranges.
    pub fn iter(&self) -> impl Iterator<Item = IndexRange> + '_ {
        self.ranges.iter().copied()
    }

    /// Returns `true` if `index` is selected.
    ///
    /// Binary search over the sorted ranges.
    pub fn contains(&self, index: usize) -> bool {
        let slot = self.ranges.partition_point(|r| r.end() < index);
        self.ranges
            .get(slot)
            .is_some_and(|r| r.begin() <= index)
    }

    /// Marks every index in `range` selected.
    ///
    /// Overlapping and adjacent stored ranges are merged with the new span.
    /// Returns the sub-ranges that were newly added; indices that were already
    /// selected contribute nothing.
    pub fn select(&mut self, range: IndexRange) -> Vec<IndexRange> {
        // Ranges entirely before the span (and not adjacent to it) are untouched.
        let start = self
            .ranges
            .partition_point(|r| r.end() + 1 < range.begin());

        // Gather the uncovered gaps inside the span; these are the actual delta.
        let mut added = Vec::new();
        let mut cursor = range.begin();
        for r in &self.ranges[start..] {
            if r.begin() > range.end() {
                break;
            }
            if r.begin() > cursor {
                added.push(IndexRange::new(cursor, r.begin() - 1));
            }
            cursor = cursor.max(r.end() + 1);
            if cursor > range.end() {
                break;
            }
        }
        if cursor <= range.end() {
            added.push(IndexRange::new(cursor, range.end()));
        }

        if added.is_empty() {
            return added;
        }

        // Coalesce the span with every mergeable stored range.
        let mut begin = range.begin();
        let mut end = range.end();
        let mut stop = start;
        while stop < self.ranges.len() && self.ranges[stop].begin() <= range.end() + 1 {
            begin = begin.min(self.ranges[stop].begin());
            end = end.max(self.ranges[stop].end());
            stop += 1;
        }
        self.ranges.splice(start..stop, [IndexRange::new(begin, end)]);

        added
    }

    /// Removes every index in `range` from the selection.
    ///
    /// A stored range strictly containing the span is split in two. Returns
    /// the sub-ranges actually removed; indices outside the current selection
    /// contribute nothing.
    pub fn deselect(&mut self, range: IndexRange) -> Vec<IndexRange> {
        let mut removed = Vec::new();
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);

        for r in &self.ranges {
            if !r.intersects(&range) {
                kept.push(*r);
                continue;
            }
            let cut_begin = r.begin().max(range.begin());
            let cut_end = r.end().min(range.end());
            removed.push(IndexRange::new(cut_begin, cut_end));
            if r.begin() < cut_begin {
                kept.push(IndexRange::new(r.begin(), cut_begin - 1));
            }
            if r.end() > cut_end {
                kept.push(IndexRange::new(cut_end + 1, r.end()));
            }
        }

        if !removed.is_empty() {
            self.ranges = kept;
        }
        removed
    }

    /// Adjusts the selection for `count` items inserted at `index`.
    ///
    /// Ranges at or after the insertion point shift right; a range straddling
    /// the insertion point splits, since the inserted items are not selected.
    /// Returns `true` if any selected index moved.
    pub fn insert_items(&mut self, index: usize, count: usize) -> bool {
        if count == 0 {
            return false;
        }
        let delta = count as isize;
        let mut changed = false;
        let mut i = 0;
        while i < self.ranges.len() {
            let r = self.ranges[i];
            if r.begin() >= index {
                self.ranges[i] = r.shifted(delta);
                changed = true;
            } else if r.end() >= index {
                self.ranges[i] = IndexRange::new(r.begin(), index - 1);
                self.ranges.insert(
                    i + 1,
                    IndexRange::new(index + count, r.end() + count),
                );
                changed = true;
                i += 1;
            }
            i += 1;
        }
        changed
    }

    /// Adjusts the selection for `count` items removed starting at `index`.
    ///
    /// Indices inside the removed span are deselected; the deselected
    /// sub-ranges are returned in pre-removal coordinates so callers can
    /// resolve the affected item values. Ranges after the span shift left.
    /// The bool reports whether any index changed.
    pub fn remove_items(&mut self, index: usize, count: usize) -> (Vec<IndexRange>, bool) {
        if count == 0 {
            return (Vec::new(), false);
        }
        let removed = self.deselect(IndexRange::new(index, index + count - 1));
        let mut changed = !removed.is_empty();
        for r in &mut self.ranges {
            if r.begin() >= index + count {
                *r = r.shifted(-(count as isize));
                changed = true;
            }
        }
        (removed, changed)
    }

    /// Removes all ranges.
    pub fn clear(&mut self) {
        self.ranges.clear();
    }
}

impl fmt::Debug for RangeCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.ranges).finish()
    }
}
