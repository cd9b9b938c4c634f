//! Interval partitioning for chunked retrieval
//!
//! [`split`] turns one half-open genomic interval into an ordered, gap-free
//! plan of sub-ranges sized against two budgets: a target block size and a
//! task cap. The function is pure; identical inputs always produce the
//! identical plan.

use crate::error::ValidationError;
use crate::Result;

/// One contiguous half-open sub-range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubRange {
    pub start: i64,
    pub end: i64,
}

impl SubRange {
    /// Number of positions covered
    #[must_use]
    pub const fn len(&self) -> i64 {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// An ordered, disjoint, gap-free partition of one interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalPlan {
    start: i64,
    end: i64,
    ranges: Vec<SubRange>,
}

impl IntervalPlan {
    /// Sub-ranges in ascending coordinate order
    #[must_use]
    pub fn ranges(&self) -> &[SubRange] {
        &self.ranges
    }

    /// Number of sub-ranges
    #[must_use]
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Overall interval start
    #[must_use]
    pub const fn start(&self) -> i64 {
        self.start
    }

    /// Overall interval end (exclusive)
    #[must_use]
    pub const fn end(&self) -> i64 {
        self.end
    }
}

/// Partitions `[start, end)` into at most `max_tasks` contiguous sub-ranges
///
/// An interval smaller than `max_block_size` stays whole. Otherwise the plan
/// holds `min((end - start) / max_block_size, max_tasks)` sub-ranges whose
/// sizes differ by at most one position, the larger ones first. Capping by
/// `max_tasks` can push a sub-range past `max_block_size`; the cap always
/// wins.
///
/// # Arguments
/// * `start` - Interval start, inclusive
/// * `end` - Interval end, exclusive
/// * `max_block_size` - Target positions per sub-range
/// * `max_tasks` - Hard upper bound on the number of sub-ranges
///
/// # Errors
/// [`ValidationError::InvalidInterval`] when `end <= start`, or
/// [`ValidationError::InvalidBudget`] when either budget is zero or negative.
pub fn split(start: i64, end: i64, max_block_size: i64, max_tasks: usize) -> Result<IntervalPlan> {
    if end <= start {
        return Err(ValidationError::InvalidInterval { start, end }.into());
    }
    if max_block_size <= 0 {
        return Err(ValidationError::InvalidBudget("max_block_size").into());
    }
    if max_tasks == 0 {
        return Err(ValidationError::InvalidBudget("max_tasks").into());
    }

    let size = end - start;
    let count = if size < max_block_size {
        1
    } else {
        let task_cap = i64::try_from(max_tasks).unwrap_or(i64::MAX);
        (size / max_block_size).min(task_cap)
    };

    let base = size / count;
    let remainder = size % count;
    let mut ranges = Vec::with_capacity(count as usize);
    let mut cursor = start;
    for i in 0..count {
        let len = base + i64::from(i < remainder);
        ranges.push(SubRange {
            start: cursor,
            end: cursor + len,
        });
        cursor += len;
    }
    Ok(IntervalPlan { start, end, ranges })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn assert_covers(plan: &IntervalPlan, start: i64, end: i64, max_tasks: usize) {
        assert!(!plan.is_empty());
        assert!(plan.len() <= max_tasks);
        assert_eq!(plan.ranges().first().map(|r| r.start), Some(start));
        assert_eq!(plan.ranges().last().map(|r| r.end), Some(end));
        for pair in plan.ranges().windows(2) {
            assert_eq!(pair[1].start, pair[0].end, "gap or overlap in {plan:?}");
        }
        let sizes: Vec<i64> = plan.ranges().iter().map(SubRange::len).collect();
        let min = sizes.iter().min().copied().unwrap_or(0);
        let max = sizes.iter().max().copied().unwrap_or(0);
        assert!(max - min <= 1, "uneven partition {sizes:?}");
    }

    #[test]
    fn test_reference_partition() -> Result<()> {
        let plan = split(0, 2_500_000, 1_000_000, 4)?;
        assert_eq!(
            plan.ranges(),
            &[
                SubRange { start: 0, end: 1_250_000 },
                SubRange { start: 1_250_000, end: 2_500_000 },
            ]
        );
        Ok(())
    }

    #[test]
    fn test_small_interval_stays_whole() -> Result<()> {
        let plan = split(10, 500, 1_000, 8)?;
        assert_eq!(plan.ranges(), &[SubRange { start: 10, end: 500 }]);
        assert_eq!((plan.start(), plan.end()), (10, 500));
        Ok(())
    }

    #[test]
    fn test_task_cap_wins_over_block_size() -> Result<()> {
        let plan = split(0, 10_000, 10, 4)?;
        assert_eq!(plan.len(), 4);
        assert_covers(&plan, 0, 10_000, 4);
        // Every sub-range exceeds the block budget; the cap is the hard limit
        assert!(plan.ranges().iter().all(|r| r.len() == 2_500));
        Ok(())
    }

    #[test]
    fn test_remainder_spreads_over_leading_ranges() -> Result<()> {
        let plan = split(0, 10, 3, 10)?;
        let sizes: Vec<i64> = plan.ranges().iter().map(SubRange::len).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
        assert_covers(&plan, 0, 10, 10);
        Ok(())
    }

    #[test]
    fn test_exact_multiple_is_even() -> Result<()> {
        let plan = split(100, 100 + 9_000, 3_000, 8)?;
        let sizes: Vec<i64> = plan.ranges().iter().map(SubRange::len).collect();
        assert_eq!(sizes, vec![3_000, 3_000, 3_000]);
        Ok(())
    }

    #[test]
    fn test_boundary_equal_to_block_size() -> Result<()> {
        // Exactly one block's worth splits into one range
        let plan = split(0, 1_000, 1_000, 4)?;
        assert_eq!(plan.len(), 1);
        Ok(())
    }

    #[test]
    fn test_random_inputs_always_cover() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        for _ in 0..500 {
            let start = rng.random_range(-1_000_000..1_000_000);
            let size = rng.random_range(1..5_000_000);
            let max_block_size = rng.random_range(1..2_000_000);
            let max_tasks = rng.random_range(1..16);
            let plan = split(start, start + size, max_block_size, max_tasks)?;
            assert_covers(&plan, start, start + size, max_tasks);
        }
        Ok(())
    }

    #[test]
    fn test_identical_inputs_identical_plans() -> Result<()> {
        let a = split(5, 1_000_003, 1_024, 7)?;
        let b = split(5, 1_000_003, 1_024, 7)?;
        assert_eq!(a, b);
        Ok(())
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(split(10, 10, 100, 4).is_err());
        assert!(split(10, 5, 100, 4).is_err());
        assert!(split(0, 100, 0, 4).is_err());
        assert!(split(0, 100, -5, 4).is_err());
        assert!(split(0, 100, 100, 0).is_err());
    }
}
