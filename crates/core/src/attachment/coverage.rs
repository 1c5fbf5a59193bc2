//! Byte ranges received so far for one upload.

use serde::{Deserialize, Serialize};

/// Sorted, merged, inclusive byte ranges.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coverage {
    ranges: Vec<(u64, u64)>,
}

impl Coverage {
    /// Empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `[start, end]` as received, merging with touching neighbours.
    pub fn insert(&mut self, start: u64, end: u64) {
        let mut merged = (start, end);
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);

        for &(s, e) in &self.ranges {
            if e.saturating_add(1) < merged.0 || merged.1.saturating_add(1) < s {
                kept.push((s, e));
            } else {
                merged = (merged.0.min(s), merged.1.max(e));
            }
        }

        kept.push(merged);
        kept.sort_unstable();
        self.ranges = kept;
    }

    /// Whether every offset in `[0, total)` has been received.
    #[must_use]
    pub fn covers(&self, total: u64) -> bool {
        total > 0 && matches!(self.ranges.as_slice(), [(0, end)] if *end + 1 >= total)
    }

    /// Total number of distinct bytes received.
    #[must_use]
    pub fn received(&self) -> u64 {
        self.ranges.iter().map(|(s, e)| e - s + 1).sum()
    }

    /// The merged ranges.
    #[must_use]
    pub fn ranges(&self) -> &[(u64, u64)] {
        &self.ranges
    }

    /// Decode a ledger, treating unreadable content as empty.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes).unwrap_or_default()
    }

    /// Encode the ledger.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_ranges_merge() {
        let mut coverage = Coverage::new();
        coverage.insert(0, 4);
        coverage.insert(5, 9);
        assert_eq!(coverage.ranges(), &[(0, 9)]);
        assert!(coverage.covers(10));
        assert!(!coverage.covers(11));
    }

    #[test]
    fn test_tail_first_leaves_gap() {
        let mut coverage = Coverage::new();
        coverage.insert(6, 9);
        coverage.insert(0, 2);
        assert_eq!(coverage.ranges(), &[(0, 2), (6, 9)]);
        assert!(!coverage.covers(10));
        assert_eq!(coverage.received(), 7);

        coverage.insert(3, 5);
        assert_eq!(coverage.ranges(), &[(0, 9)]);
        assert!(coverage.covers(10));
    }

    #[test]
    fn test_overlap_is_counted_once() {
        let mut coverage = Coverage::new();
        coverage.insert(0, 5);
        coverage.insert(3, 7);
        assert_eq!(coverage.ranges(), &[(0, 7)]);
        assert_eq!(coverage.received(), 8);
    }

    #[test]
    fn test_bridging_range_merges_both_sides() {
        let mut coverage = Coverage::new();
        coverage.insert(0, 1);
        coverage.insert(8, 9);
        coverage.insert(4, 5);
        coverage.insert(2, 7);
        assert_eq!(coverage.ranges(), &[(0, 9)]);
    }

    #[test]
    fn test_empty_never_covers() {
        assert!(!Coverage::new().covers(0));
        assert!(!Coverage::new().covers(1));
    }

    #[test]
    fn test_bytes_roundtrip_and_garbage() {
        let mut coverage = Coverage::new();
        coverage.insert(0, 3);
        coverage.insert(10, 12);
        assert_eq!(Coverage::from_bytes(&coverage.to_bytes()), coverage);
        assert_eq!(coverage.to_bytes(), b"[[0,3],[10,12]]");
        assert_eq!(Coverage::from_bytes(b"not json"), Coverage::new());
    }
}
