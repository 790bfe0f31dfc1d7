//! Multi-threaded multiplication.
//!
//! The output rows are split by [`PartitionPlan`](crate::partition::PartitionPlan);
//! each spawned thread gets an exclusive `&mut` slice of the shared output and
//! the calling thread computes the last partition itself.
//!
//! - `row_parallel`: scoped-thread engine with timeout and cancellation

pub mod row_parallel;

pub use row_parallel::{ThreadEngine, run_partitions};
