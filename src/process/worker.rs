//! The child side of the process engine.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Args;
use tracing::debug;

use super::artifact;
use crate::error::{MatmulError, Result};
use crate::kernel::Kernel;
use crate::matrix::try_buffer;

/// Everything one child process needs to compute its partition.
///
/// The parent turns this into command-line flags with [`WorkerJob::to_args`];
/// the binary's hidden `worker` subcommand parses them back with clap.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct WorkerJob {
    /// Side length of the matrices
    #[arg(long)]
    pub n: usize,

    /// Partition index; names the output artifact
    #[arg(long)]
    pub partition: usize,

    /// First output row (inclusive)
    #[arg(long)]
    pub start: usize,

    /// Last output row (exclusive)
    #[arg(long)]
    pub end: usize,

    /// Kernel the right operand was prepared for
    #[arg(long, default_value = "standard")]
    pub kernel: Kernel,

    /// Left operand dump
    #[arg(long)]
    pub lhs: PathBuf,

    /// Right operand dump, already transposed for the transposed kernel
    #[arg(long)]
    pub rhs: PathBuf,

    /// Where to write the partition's rows
    #[arg(long)]
    pub out: PathBuf,
}

impl WorkerJob {
    pub fn to_args(&self) -> Vec<OsString> {
        vec![
            "--n".into(),
            self.n.to_string().into(),
            "--partition".into(),
            self.partition.to_string().into(),
            "--start".into(),
            self.start.to_string().into(),
            "--end".into(),
            self.end.to_string().into(),
            "--kernel".into(),
            self.kernel.as_str().into(),
            "--lhs".into(),
            self.lhs.clone().into_os_string(),
            "--rhs".into(),
            self.rhs.clone().into_os_string(),
            "--out".into(),
            self.out.clone().into_os_string(),
        ]
    }

    /// Load both operands, compute rows `start..end`, and write the artifact.
    pub fn run(&self) -> Result<()> {
        if self.start > self.end || self.end > self.n {
            return Err(MatmulError::DimensionMismatch {
                left: self.end,
                right: self.n,
            });
        }
        let n = self.n;
        let a = artifact::read_matrix(&self.lhs, n)?;
        let b = artifact::read_matrix(&self.rhs, n)?;

        let mut rows = try_buffer((self.end - self.start) * n)?;
        self.kernel
            .compute_rows(a.as_slice(), b.as_slice(), &mut rows, n, self.start..self.end);

        artifact::write_rows(&self.out, &rows).map_err(|source| MatmulError::Io {
            path: self.out.clone(),
            source,
        })?;
        debug!(partition = self.partition, rows = self.end - self.start, "worker wrote artifact");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use crate::matrix::standard::multiply_standard;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        job: WorkerJob,
    }

    fn job_in(dir: &std::path::Path, start: usize, end: usize) -> WorkerJob {
        WorkerJob {
            n: 6,
            partition: 1,
            start,
            end,
            kernel: Kernel::Standard,
            lhs: artifact::lhs_path(dir),
            rhs: artifact::rhs_path(dir),
            out: artifact::artifact_path(dir, 1),
        }
    }

    #[test]
    fn test_args_parse_back() {
        let job = WorkerJob {
            kernel: Kernel::Transposed,
            ..job_in(std::path::Path::new("/tmp/work"), 1, 3)
        };
        let mut argv: Vec<OsString> = vec!["worker".into()];
        argv.extend(job.to_args());

        let parsed = Harness::try_parse_from(argv).unwrap();
        assert_eq!(parsed.job, job);
    }

    #[test]
    fn test_run_writes_its_rows() {
        let dir = tempfile::tempdir().unwrap();
        let a = Matrix::random(6, 1).unwrap();
        let b = Matrix::random(6, 2).unwrap();
        artifact::write_matrix(&artifact::lhs_path(dir.path()), &a).unwrap();
        artifact::write_matrix(&artifact::rhs_path(dir.path()), &b).unwrap();

        let job = job_in(dir.path(), 1, 3);
        job.run().unwrap();

        let full = multiply_standard(&a, &b).unwrap();
        let rows = artifact::read_rows(&job.out, 2 * 6).unwrap();
        assert_eq!(&rows[..6], full.row(1));
        assert_eq!(&rows[6..], full.row(2));
    }

    #[test]
    fn test_run_without_inputs_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = job_in(dir.path(), 0, 1).run().unwrap_err();
        assert!(matches!(err, MatmulError::Io { .. }));
    }

    #[test]
    fn test_bad_row_range_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(job_in(dir.path(), 4, 9).run().is_err());
    }
}
