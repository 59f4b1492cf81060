//! Hierarchical binning geometry shared by BAI and TBI indexes.
//!
//! The coordinate space `[0, 2^29)` is cut into six levels of bins:
//!
//! | Level | Bin ids       | Bin size | Shift |
//! |-------|---------------|----------|-------|
//! | 0     | 0             | 512 Mbp  | 29    |
//! | 1     | 1-8           | 64 Mbp   | 26    |
//! | 2     | 9-72          | 8 Mbp    | 23    |
//! | 3     | 73-584        | 1 Mbp    | 20    |
//! | 4     | 585-4680      | 128 Kbp  | 17    |
//! | 5     | 4681-37448    | 16 Kbp   | 14    |
//!
//! A record is stored in the smallest bin that fully contains it, so every
//! bin on every level that intersects a query can hold an overlapping record.
//! Everything here is pure arithmetic over two integers.

/// Shift of the finest level (16 Kbp bins); also the linear index window shift
pub const MIN_SHIFT: u32 = 14;

/// Number of levels below the root bin
pub const DEPTH: u32 = 5;

/// Exclusive upper bound of the coordinate space covered by the bins
pub const MAX_COORDINATE: u64 = 1 << (MIN_SHIFT + 3 * DEPTH);

/// First bin id of each level, root first, followed by the total bin count
pub const LEVEL_OFFSETS: [u32; 7] = [0, 1, 9, 73, 585, 4681, 37449];

/// Largest bin id that describes a coordinate range
pub const MAX_BIN: u32 = 37448;

/// Pseudo-bin holding per-reference metadata instead of data chunks
pub const METADATA_BIN: u32 = 37450;

/// Shift turning a coordinate into a linear index window number
pub const LINEAR_WINDOW_SHIFT: u32 = MIN_SHIFT;

/// Linear index window size (16 Kbp)
pub const LINEAR_WINDOW_SIZE: u64 = 1 << LINEAR_WINDOW_SHIFT;

/// Clamp a half-open interval into the binned coordinate space and return it
/// as an inclusive `(first, last)` pair.
///
/// An empty or inverted interval is treated as the single position `start`.
fn inclusive_bounds(start: u64, end: u64) -> (u64, u64) {
    let first = start.min(MAX_COORDINATE - 1);
    let end = if end <= start {
        first + 1
    } else {
        end.min(MAX_COORDINATE)
    };
    (first, end.max(first + 1) - 1)
}

fn level_shift(level: usize) -> u32 {
    MIN_SHIFT + 3 * (DEPTH - level as u32)
}

/// Compute every bin id that overlaps `[start, end)` (0-based, half-open).
///
/// The returned ids are sorted, unique, always include the root bin 0, and
/// never exceed 37,449 entries. `end <= start` behaves like `[start, start + 1)`.
///
/// # Example
///
/// ```
/// use biometal_tabix::formats::index::binning::bins_overlapping;
///
/// let bins = bins_overlapping(1, 4000);
/// assert_eq!(bins, vec![0, 1, 9, 73, 585, 4681]);
/// ```
pub fn bins_overlapping(start: u64, end: u64) -> Vec<u32> {
    let (first, last) = inclusive_bounds(start, end);
    let mut bins = Vec::new();

    for level in 0..=DEPTH as usize {
        let shift = level_shift(level);
        let offset = u64::from(LEVEL_OFFSETS[level]);
        let beg_bin = offset + (first >> shift);
        let end_bin = offset + (last >> shift);
        bins.extend((beg_bin..=end_bin).map(|bin| bin as u32));
    }

    bins
}

/// Smallest single bin fully containing `[start, end)`.
///
/// This is the bin a record spanning the interval is filed under.
pub fn region_to_bin(start: u64, end: u64) -> u32 {
    let (first, last) = inclusive_bounds(start, end);

    for level in (1..=DEPTH as usize).rev() {
        let shift = level_shift(level);
        if first >> shift == last >> shift {
            return LEVEL_OFFSETS[level] + (first >> shift) as u32;
        }
    }
    0
}

/// Level of a bin id (0 = root, 5 = finest), or `None` for ids outside the scheme.
pub fn bin_level(bin: u32) -> Option<usize> {
    if bin > MAX_BIN {
        return None;
    }
    (0..=DEPTH as usize)
        .rev()
        .find(|&level| bin >= LEVEL_OFFSETS[level])
}

/// Coordinate range `[start, end)` covered by a bin id.
///
/// # Example
///
/// ```
/// use biometal_tabix::formats::index::binning::bin_span;
///
/// assert_eq!(bin_span(4681), Some((0, 16384)));
/// assert_eq!(bin_span(0), Some((0, 1 << 29)));
/// assert_eq!(bin_span(40000), None);
/// ```
pub fn bin_span(bin: u32) -> Option<(u64, u64)> {
    let level = bin_level(bin)?;
    let shift = level_shift(level);
    let index = u64::from(bin - LEVEL_OFFSETS[level]);
    let start = index << shift;
    Some((start, start + (1u64 << shift)))
}

/// Linear index window containing a coordinate.
///
/// Positions past the binned space map to the last window, so the result
/// always fits a `usize` (at most 32,767).
pub fn linear_window(position: u64) -> usize {
    (position.min(MAX_COORDINATE - 1) >> LINEAR_WINDOW_SHIFT) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bins_overlapping_small_region() {
        assert_eq!(bins_overlapping(1000, 2000), vec![0, 1, 9, 73, 585, 4681]);
    }

    #[test]
    fn test_bins_overlapping_sorted_and_unique() {
        let bins = bins_overlapping(100_000, 3_000_000);
        assert!(bins.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(bins[0], 0);
    }

    #[test]
    fn test_bins_overlapping_spans_window_boundary() {
        let bins = bins_overlapping(16_000, 17_000);
        assert!(bins.contains(&4681));
        assert!(bins.contains(&4682));
        assert!(!bins.contains(&4683));
    }

    #[test]
    fn test_empty_interval_is_single_position() {
        assert_eq!(bins_overlapping(5000, 5000), bins_overlapping(5000, 5001));
        assert_eq!(bins_overlapping(5000, 10), bins_overlapping(5000, 5001));
        assert!(!bins_overlapping(0, 0).is_empty());
    }

    #[test]
    fn test_whole_space_bin_count() {
        let bins = bins_overlapping(0, u64::MAX);
        assert_eq!(bins.len(), 37449);
        assert_eq!(*bins.last().unwrap(), MAX_BIN);
    }

    #[test]
    fn test_start_beyond_coordinate_space_is_clamped() {
        let bins = bins_overlapping(MAX_COORDINATE + 10, MAX_COORDINATE + 20);
        assert_eq!(bins.len(), 6);
        assert_eq!(*bins.last().unwrap(), MAX_BIN);
    }

    #[test]
    fn test_region_to_bin() {
        assert_eq!(region_to_bin(0, 1), 4681);
        assert_eq!(region_to_bin(16_383, 16_385), 585);
        assert_eq!(region_to_bin(0, 1 << 17), 585);
        assert_eq!(region_to_bin(0, (1 << 17) + 1), 73);
        assert_eq!(region_to_bin(0, 1 << 29), 0);
    }

    #[test]
    fn test_region_to_bin_is_in_overlapping_set() {
        for &(start, end) in &[(0u64, 10u64), (70_000, 200_000), (5_000_000, 90_000_000)] {
            assert!(bins_overlapping(start, end).contains(&region_to_bin(start, end)));
        }
    }

    #[test]
    fn test_bin_level() {
        assert_eq!(bin_level(0), Some(0));
        assert_eq!(bin_level(8), Some(1));
        assert_eq!(bin_level(9), Some(2));
        assert_eq!(bin_level(584), Some(3));
        assert_eq!(bin_level(4680), Some(4));
        assert_eq!(bin_level(4681), Some(5));
        assert_eq!(bin_level(MAX_BIN), Some(5));
        assert_eq!(bin_level(METADATA_BIN), None);
    }

    #[test]
    fn test_bin_span_round_trips_through_region_to_bin() {
        for bin in [0u32, 1, 8, 9, 100, 585, 4680, 4681, 20_000, MAX_BIN] {
            let (start, end) = bin_span(bin).unwrap();
            assert_eq!(region_to_bin(start, end), bin);
        }
    }

    #[test]
    fn test_linear_window() {
        assert_eq!(linear_window(0), 0);
        assert_eq!(linear_window(16_383), 0);
        assert_eq!(linear_window(16_384), 1);
        assert_eq!(linear_window(MAX_COORDINATE - 1), 32_767);
        assert_eq!(linear_window(1 << 46), 32_767);
        assert_eq!(linear_window(u64::MAX), 32_767);
    }
}
