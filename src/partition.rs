//! Row partitioning of the output matrix.
//!
//! With `w` spawned workers the n rows are cut into `w + 1` contiguous
//! slices. Every spawned worker gets `q = n / (w + 1)` rows and the caller
//! takes whatever is left, so any remainder of the division lands in the
//! caller's (last) partition:
//!
//! ```text
//! n = 10, w = 3  ->  q = 2
//! worker 0: [0, 2)   worker 1: [2, 4)   worker 2: [4, 6)   caller: [6, 10)
//! ```

use std::ops::Range;

use crate::config::MAX_WORKERS;
use crate::error::{MatmulError, Result};

/// A half-open range of output rows owned by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Position in the plan. Spawned workers are `0..workers`, the caller is `workers`.
    pub index: usize,
    pub rows: Range<usize>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of `i32` cells this partition covers in an n×n output.
    pub fn cells(&self, n: usize) -> usize {
        self.len() * n
    }
}

/// The full split of an n-row output between spawned workers and the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionPlan {
    n: usize,
    parts: Vec<Partition>,
}

impl PartitionPlan {
    /// Split `n` rows between `workers` spawned workers and the caller.
    ///
    /// Fails with [`MatmulError::TooManyWorkers`] above [`MAX_WORKERS`].
    pub fn try_new(n: usize, workers: usize) -> Result<Self> {
        let slots = workers
            .checked_add(1)
            .filter(|_| workers <= MAX_WORKERS)
            .ok_or(MatmulError::TooManyWorkers {
                workers,
                max: MAX_WORKERS,
            })?;

        let share = n / slots;
        let mut parts = Vec::with_capacity(slots);

        for t in 0..workers {
            parts.push(Partition {
                index: t,
                rows: t * share..(t + 1) * share,
            });
        }
        parts.push(Partition {
            index: workers,
            rows: workers * share..n,
        });

        let plan = Self { n, parts };
        debug_assert!(plan.validate().is_ok(), "{:?}", plan.validate());
        Ok(plan)
    }

    /// Panicking shorthand for [`PartitionPlan::try_new`], for tests and fixed worker counts.
    pub fn new(n: usize, workers: usize) -> Self {
        match Self::try_new(n, workers) {
            Ok(plan) => plan,
            Err(e) => panic!("PartitionPlan::new({}, {}): {}", n, workers, e),
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Number of spawned workers.
    pub fn workers(&self) -> usize {
        self.parts.len() - 1
    }

    /// All partitions, spawned ones first, caller last.
    pub fn partitions(&self) -> &[Partition] {
        &self.parts
    }

    pub fn spawned(&self) -> &[Partition] {
        &self.parts[..self.parts.len() - 1]
    }

    /// The partition the coordinating caller computes itself.
    pub fn caller(&self) -> &Partition {
        &self.parts[self.parts.len() - 1]
    }

    /// Check that the partitions are contiguous, in order, and cover `[0, n)`
    /// exactly once.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut next = 0;
        for (i, p) in self.parts.iter().enumerate() {
            if p.index != i {
                return Err(format!("partition at slot {} has index {}", i, p.index));
            }
            if p.rows.start != next {
                return Err(format!(
                    "partition {} starts at row {}, expected {}",
                    i, p.rows.start, next
                ));
            }
            if p.rows.end < p.rows.start {
                return Err(format!("partition {} has a reversed range", i));
            }
            next = p.rows.end;
        }
        if next != self.n {
            return Err(format!("partitions end at row {}, expected {}", next, self.n));
        }
        Ok(())
    }

    /// Split an n×n output buffer into one exclusive slice per partition.
    ///
    /// The slices come from repeated `split_at_mut`, so no two workers can
    /// ever hold overlapping rows.
    pub fn split_output<'a>(&self, out: &'a mut [i32]) -> SplitOutput<'a> {
        assert_eq!(out.len(), self.n * self.n, "output buffer is not n*n");

        let mut spawned = Vec::with_capacity(self.workers());
        let mut rest = out;
        for p in self.spawned() {
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(p.cells(self.n));
            spawned.push(head);
            rest = tail;
        }
        debug_assert_eq!(rest.len(), self.caller().cells(self.n));

        SplitOutput {
            spawned,
            caller: rest,
        }
    }
}

/// Disjoint output regions produced by [`PartitionPlan::split_output`].
pub struct SplitOutput<'a> {
    /// One slice per spawned worker, in partition order.
    pub spawned: Vec<&'a mut [i32]>,
    pub caller: &'a mut [i32],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_split_of_four() {
        let plan = PartitionPlan::new(16, 3);
        let rows: Vec<_> = plan.partitions().iter().map(|p| p.rows.clone()).collect();
        assert_eq!(rows, vec![0..4, 4..8, 8..12, 12..16]);
        assert_eq!(plan.caller().index, 3);
        assert_eq!(plan.spawned().len(), 3);
    }

    #[test]
    fn test_remainder_goes_to_caller() {
        let plan = PartitionPlan::new(7, 3);
        let rows: Vec<_> = plan.partitions().iter().map(|p| p.rows.clone()).collect();
        assert_eq!(rows, vec![0..1, 1..2, 2..3, 3..7]);
        assert_eq!(plan.caller().len(), 7 - 3 * (7 / 4));
    }

    #[test]
    fn test_coverage_for_reference_sizes() {
        for n in [1, 2, 3, 4, 5, 8, 16, 1023, 1024] {
            let plan = PartitionPlan::new(n, 3);
            assert_eq!(plan.validate(), Ok(()), "n = {}", n);

            let mut seen = vec![0u8; n];
            for p in plan.partitions() {
                for r in p.rows.clone() {
                    seen[r] += 1;
                }
            }
            assert!(seen.iter().all(|&c| c == 1), "n = {}: {:?}", n, seen);
        }
    }

    #[test]
    fn test_small_n_everything_on_caller() {
        let plan = PartitionPlan::new(3, 3);
        assert!(plan.spawned().iter().all(|p| p.is_empty()));
        assert_eq!(plan.caller().rows, 0..3);
    }

    #[test]
    fn test_zero_workers() {
        let plan = PartitionPlan::new(5, 0);
        assert_eq!(plan.workers(), 0);
        assert_eq!(plan.caller().rows, 0..5);
    }

    #[test]
    fn test_worker_limit() {
        assert_eq!(PartitionPlan::try_new(8, MAX_WORKERS).unwrap().workers(), MAX_WORKERS);

        for workers in [MAX_WORKERS + 1, usize::MAX - 1, usize::MAX] {
            match PartitionPlan::try_new(8, workers) {
                Err(MatmulError::TooManyWorkers { workers: w, max }) => {
                    assert_eq!(w, workers);
                    assert_eq!(max, MAX_WORKERS);
                }
                other => panic!("workers = {}: unexpected {:?}", workers, other),
            }
        }
    }

    #[test]
    fn test_validate_catches_gap() {
        let plan = PartitionPlan {
            n: 4,
            parts: vec![
                Partition { index: 0, rows: 0..1 },
                Partition { index: 1, rows: 2..4 },
            ],
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_split_output_sizes() {
        let plan = PartitionPlan::new(6, 3);
        let mut buf = vec![0; 36];
        let split = plan.split_output(&mut buf);
        let lens: Vec<_> = split.spawned.iter().map(|s| s.len()).collect();
        assert_eq!(lens, vec![6, 6, 6]);
        assert_eq!(split.caller.len(), 18);
    }
}
