//! Domain partitioning.
//!
//! `partition(n, k)` splits `[0, n)` into `min(k, n)` contiguous ranges.
//! Every range but the last holds `floor(n / k')` items, where `k' = min(k, n)`;
//! the last absorbs the remainder. For `n = 10, k = 4`:
//!
//! ```text
//! [0..2) [2..4) [4..6) [6..10)
//! ```

use std::ops::Range;

/// Split `[0, n)` into at most `k` ordered, disjoint, contiguous ranges.
///
/// Returns no ranges when `n` or `k` is zero.
pub fn partition(n: usize, k: usize) -> Vec<Range<usize>> {
    let parts = k.min(n);
    if parts == 0 {
        return Vec::new();
    }

    let chunk = n / parts;
    (0..parts)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == parts { n } else { start + chunk };
            start..end
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_last_range_absorbs_remainder() {
        assert_eq!(partition(10, 4), vec![0..2, 2..4, 4..6, 6..10]);
        assert_eq!(partition(16, 4), vec![0..4, 4..8, 8..12, 12..16]);
    }

    #[test]
    fn test_more_parts_than_items() {
        assert_eq!(partition(3, 8), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(partition(0, 4).is_empty());
        assert!(partition(5, 0).is_empty());
        assert_eq!(partition(5, 1), vec![0..5]);
    }

    proptest! {
        #[test]
        fn prop_ranges_cover_domain_exactly_once(n in 0usize..5000, k in 1usize..64) {
            let ranges = partition(n, k);
            prop_assert_eq!(ranges.len(), k.min(n));

            let mut cursor = 0;
            for range in &ranges {
                prop_assert_eq!(range.start, cursor);
                prop_assert!(range.end > range.start);
                cursor = range.end;
            }
            prop_assert_eq!(cursor, n);
        }

        #[test]
        fn prop_last_range_length(n in 1usize..5000, k in 1usize..64) {
            prop_assume!(k <= n);
            let ranges = partition(n, k);
            let last = ranges.last().unwrap();
            prop_assert_eq!(last.len(), n - (n / k) * (k - 1));
            for range in &ranges[..ranges.len() - 1] {
                prop_assert_eq!(range.len(), n / k);
            }
        }
    }
}
