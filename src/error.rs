//! Error types shared by every multiplication engine.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MatmulError>;

/// Why a single worker did not deliver its partition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// The worker thread panicked; carries the panic message when it was a string.
    #[error("panicked: {0}")]
    Panicked(String),
    /// The worker process exited with a nonzero status code.
    #[error("exited with status {0}")]
    Exited(i32),
    /// The worker process was terminated by a signal (or exited without a code).
    #[error("terminated by signal")]
    Signalled,
    /// The worker was still running when the timeout expired.
    #[error("timed out")]
    TimedOut,
    /// The worker stopped early because a sibling failed.
    #[error("cancelled")]
    Cancelled,
    /// Waiting on the worker itself failed.
    #[error("wait failed: {0}")]
    WaitFailed(String),
}

/// One failed partition in a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("partition {partition} {reason}")]
pub struct WorkerFailure {
    pub partition: usize,
    pub reason: FailureReason,
}

/// One partition whose artifact could not be read back.
#[derive(Debug, Error)]
#[error("partition {partition} ({}): {source}", .path.display())]
pub struct ArtifactFailure {
    pub partition: usize,
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

#[derive(Debug, Error)]
pub enum MatmulError {
    #[error("could not allocate a matrix of {elements} elements")]
    AllocationFailure { elements: usize },

    #[error("matrix side length must be positive, got {0}")]
    InvalidSize(usize),

    #[error("{workers} workers requested, at most {max} are supported")]
    TooManyWorkers { workers: usize, max: usize },

    #[error("dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("failed to spawn worker for partition {partition}: {source}")]
    WorkerSpawnFailure {
        partition: usize,
        #[source]
        source: io::Error,
    },

    #[error("{} worker(s) failed: {}", .failures.len(), join_display(.failures))]
    WorkerJoinFailure { failures: Vec<WorkerFailure> },

    #[error("{} artifact(s) unreadable: {}", .failures.len(), join_display(.failures))]
    ArtifactIoFailure { failures: Vec<ArtifactFailure> },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl MatmulError {
    /// Partition indices named by a join or artifact failure, in report order.
    pub fn failed_partitions(&self) -> Vec<usize> {
        match self {
            MatmulError::WorkerJoinFailure { failures } => {
                failures.iter().map(|f| f.partition).collect()
            }
            MatmulError::ArtifactIoFailure { failures } => {
                failures.iter().map(|f| f.partition).collect()
            }
            MatmulError::WorkerSpawnFailure { partition, .. } => vec![*partition],
            _ => Vec::new(),
        }
    }
}

fn join_display<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_failure_lists_every_partition() {
        let err = MatmulError::WorkerJoinFailure {
            failures: vec![
                WorkerFailure {
                    partition: 0,
                    reason: FailureReason::Exited(3),
                },
                WorkerFailure {
                    partition: 2,
                    reason: FailureReason::TimedOut,
                },
            ],
        };

        let msg = err.to_string();
        assert!(msg.starts_with("2 worker(s) failed"), "{}", msg);
        assert!(msg.contains("partition 0 exited with status 3"), "{}", msg);
        assert!(msg.contains("partition 2 timed out"), "{}", msg);
        assert_eq!(err.failed_partitions(), vec![0, 2]);
    }

    #[test]
    fn test_artifact_failure_names_path() {
        let err = MatmulError::ArtifactIoFailure {
            failures: vec![ArtifactFailure {
                partition: 2,
                path: PathBuf::from("/tmp/c_parallel2.bin"),
                source: io::Error::new(io::ErrorKind::NotFound, "missing"),
            }],
        };

        assert!(err.to_string().contains("c_parallel2.bin"));
        assert_eq!(err.failed_partitions(), vec![2]);
    }

    #[test]
    fn test_artifact_failure_keeps_io_source() {
        use std::error::Error as _;

        let failure = ArtifactFailure {
            partition: 1,
            path: PathBuf::from("c_parallel1.bin"),
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "short read"),
        };
        assert_eq!(failure.to_string(), "partition 1 (c_parallel1.bin): short read");

        let source = failure.source().expect("io error chained");
        let io_err = source.downcast_ref::<io::Error>().expect("io::Error source");
        assert_eq!(io_err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
