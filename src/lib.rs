//! Square integer matrix multiplication, four ways.
//!
//! I built this to see what actually changes between the textbook triple
//! loop, the same loop with B transposed first, and the same work split
//! four ways across threads or across processes. Short answer: the
//! transpose fixes the cache misses, the parallel versions divide the
//! rows, and the process version pays for it in file I/O.
//!
//! ## Usage
//!
//! ```
//! use parmatmul::{Matrix, multiply_standard, multiply_transposed};
//!
//! let a = Matrix::from_rows(&[[1, 2], [3, 4]]).unwrap();
//! let b = Matrix::from_rows(&[[5, 6], [7, 8]]).unwrap();
//!
//! let c = multiply_standard(&a, &b).unwrap();
//! assert_eq!(c.as_slice(), &[19, 22, 43, 50]);
//! assert_eq!(multiply_transposed(&a, &b).unwrap(), c);
//! ```
//!
//! For larger matrices, split the rows across threads:
//!
//! ```
//! use parmatmul::{EngineConfig, Matrix, ThreadEngine, verify};
//!
//! let a = Matrix::random(256, 1).unwrap();
//! let b = Matrix::random(256, 2).unwrap();
//!
//! let engine = ThreadEngine::new(EngineConfig::default().with_workers(3));
//! let c = engine.multiply(&a, &b).unwrap();
//! assert!(verify(&c, &parmatmul::multiply_standard(&a, &b).unwrap()));
//! ```
//!
//! ## What's inside
//!
//! - Row-major `i32` matrix store with in-place transpose
//! - Standard (i-j-k) and transpose-first row kernels
//! - Fixed split: `workers` spawned units plus the caller, remainder rows on the caller
//! - Thread engine on scoped threads, writing disjoint slices of one buffer
//! - Process engine with one raw binary artifact per partition
//! - Optional timeout, sibling cancellation, per-partition failure reports
//!
//! Entries are summed in `i32` with wrapping arithmetic. Inputs from
//! [`Matrix::random`] (0..=9) never overflow for n ≤ 1024.

pub mod config;
pub mod error;
pub mod kernel;
pub mod matrix;
pub mod partition;
pub mod process;
pub mod threaded;
pub mod verify;

pub use config::{DEFAULT_WORKERS, EngineConfig, MAX_WORKERS};
pub use error::{MatmulError, Result};
pub use kernel::Kernel;
pub use matrix::Matrix;
pub use matrix::standard::multiply_standard;
pub use matrix::transpose::multiply_transposed;
pub use partition::{Partition, PartitionPlan};
pub use process::{ProcessEngine, WorkerCommand};
pub use threaded::ThreadEngine;
pub use verify::{Timed, Verdict, time, verify};

/// C = A × B on the default thread split (3 workers + caller).
pub fn multiply_parallel(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    ThreadEngine::default().multiply(a, b)
}
