// Copyright 2015-2020 Parity Technologies (UK) Ltd.
// This file is part of Ferron.

// Ferron is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// Ferron is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.

// You should have received a copy of the GNU General Public License
// along with Ferron.  If not, see <http://www.gnu.org/licenses/>.

//! A set of disjoint inclusive intervals over the 256-bit account-hash
//! space, tracking which ranges remain to fetch. Intervals are kept
//! maximally coalesced: neighbours that touch are merged.

use ethereum_types::U256;

/// A set of disjoint, coalesced, inclusive `[lo, hi]` intervals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathIntervalSet {
    // Sorted by lower bound; no two intervals overlap or touch.
    intervals: Vec<(U256, U256)>,
}

impl PathIntervalSet {
    /// An empty set.
    pub fn new() -> Self {
        PathIntervalSet::default()
    }

    /// The set covering the whole hash space.
    pub fn full() -> Self {
        PathIntervalSet {
            intervals: vec![(U256::zero(), U256::max_value())],
        }
    }

    /// Whether nothing remains.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of stored intervals.
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// The stored intervals, ascending.
    pub fn intervals(&self) -> &[(U256, U256)] {
        &self.intervals
    }

    /// Whether the whole `[lo, hi]` range is covered.
    pub fn covers(&self, lo: U256, hi: U256) -> bool {
        self.intervals
            .iter()
            .any(|(a, b)| *a <= lo && hi <= *b)
    }

    /// Insert `[lo, hi]`, merging with any overlapping or adjacent
    /// intervals.
    pub fn insert(&mut self, lo: U256, hi: U256) {
        debug_assert!(lo <= hi);
        let mut merged_lo = lo;
        let mut merged_hi = hi;
        let mut result = Vec::with_capacity(self.intervals.len() + 1);
        let mut placed = false;

        for &(a, b) in &self.intervals {
            if b.saturating_add(U256::one()) < merged_lo {
                // Strictly left of the new interval, with a gap.
                result.push((a, b));
            } else if a > merged_hi.saturating_add(U256::one()) {
                // Strictly right with a gap: emit the merged interval first.
                if !placed {
                    result.push((merged_lo, merged_hi));
                    placed = true;
                }
                result.push((a, b));
            } else {
                // Overlapping or adjacent: absorb.
                if a < merged_lo {
                    merged_lo = a;
                }
                if b > merged_hi {
                    merged_hi = b;
                }
            }
        }
        if !placed {
            result.push((merged_lo, merged_hi));
        }
        self.intervals = result;
    }

    /// Remove `[lo, hi]`, splitting any partially covered interval.
    pub fn remove(&mut self, lo: U256, hi: U256) {
        debug_assert!(lo <= hi);
        let mut result = Vec::with_capacity(self.intervals.len() + 1);
        for &(a, b) in &self.intervals {
            if b < lo || a > hi {
                result.push((a, b));
                continue;
            }
            if a < lo {
                result.push((a, lo - U256::one()));
            }
            if b > hi {
                result.push((hi + U256::one(), b));
            }
        }
        self.intervals = result;
    }

    /// Take the leftmost interval, clipped to at most `max_len` values.
    /// The taken range is removed from the set.
    pub fn acquire(&mut self, max_len: U256) -> Option<(U256, U256)> {
        debug_assert!(!max_len.is_zero());
        let (lo, hi) = *self.intervals.first()?;

        // Span fits: take the whole interval.
        let span = hi - lo;
        if span < max_len {
            self.intervals.remove(0);
            return Some((lo, hi));
        }

        // Clip: keep the suffix.
        let taken_hi = lo + max_len - U256::one();
        self.intervals[0] = (taken_hi + U256::one(), hi);
        Some((lo, taken_hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ranges: &[(u64, u64)]) -> PathIntervalSet {
        let mut set = PathIntervalSet::new();
        for (lo, hi) in ranges {
            set.insert((*lo).into(), (*hi).into());
        }
        set
    }

    fn ranges(set: &PathIntervalSet) -> Vec<(u64, u64)> {
        set.intervals()
            .iter()
            .map(|(a, b)| (a.as_u64(), b.as_u64()))
            .collect()
    }

    #[test]
    fn inserts_coalesce() {
        let s = set(&[(10, 20), (30, 40)]);
        assert_eq!(ranges(&s), vec![(10, 20), (30, 40)]);

        // Overlap merges.
        let s = set(&[(10, 20), (15, 35), (30, 40)]);
        assert_eq!(ranges(&s), vec![(10, 40)]);

        // Adjacency merges too.
        let s = set(&[(10, 20), (21, 30)]);
        assert_eq!(ranges(&s), vec![(10, 30)]);

        // A hole of one value does not merge.
        let s = set(&[(10, 20), (22, 30)]);
        assert_eq!(ranges(&s), vec![(10, 20), (22, 30)]);
    }

    #[test]
    fn remove_splits() {
        let mut s = set(&[(10, 40)]);
        s.remove(20.into(), 29.into());
        assert_eq!(ranges(&s), vec![(10, 19), (30, 40)]);

        s.remove(0.into(), 14.into());
        assert_eq!(ranges(&s), vec![(15, 19), (30, 40)]);

        s.remove(0.into(), 100.into());
        assert!(s.is_empty());
    }

    #[test]
    fn insert_remove_insert_is_identity() {
        let original = set(&[(10, 40), (100, 200)]);
        let mut s = original.clone();
        s.insert(50.into(), 60.into());
        s.remove(50.into(), 60.into());
        assert_eq!(s, original);
        s.insert(50.into(), 60.into());
        s.remove(50.into(), 60.into());
        assert_eq!(s, original);
    }

    #[test]
    fn acquire_takes_leftmost_clipped() {
        let mut s = set(&[(10, 40), (100, 200)]);
        assert_eq!(s.acquire(16.into()), Some((10.into(), 25.into())));
        assert_eq!(ranges(&s), vec![(26, 40), (100, 200)]);

        // The rest of the first interval fits entirely.
        assert_eq!(s.acquire(100.into()), Some((26.into(), 40.into())));
        assert_eq!(ranges(&s), vec![(100, 200)]);
    }

    #[test]
    fn acquire_on_full_space_is_safe_at_the_edges() {
        let mut s = PathIntervalSet::full();
        let (lo, hi) = s.acquire(U256::from(1u64) << 128).unwrap();
        assert_eq!(lo, U256::zero());
        assert_eq!(hi, (U256::from(1u64) << 128) - 1);

        // Putting it back restores the full space.
        s.insert(lo, hi);
        assert_eq!(s, PathIntervalSet::full());
    }

    #[test]
    fn covers_checks_single_interval_containment() {
        let s = set(&[(10, 40), (100, 200)]);
        assert!(s.covers(15.into(), 40.into()));
        assert!(!s.covers(15.into(), 120.into()));
    }
}
