//! Multi-process multiplication.
//!
//! Children share no memory with the parent. The parent dumps both operands
//! into an artifact directory, starts one child per spawned partition, and
//! computes the last partition itself. Each partition ends up in its own
//! artifact file ([`artifact::artifact_path`]); once every child has exited
//! successfully the parent reads all `workers + 1` artifacts back into one
//! matrix.
//!
//! A child is any program that accepts the flags of [`WorkerJob`]. The
//! `parmatmul` binary provides one through its hidden `worker` subcommand.

pub mod artifact;
pub mod worker;

use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

pub use worker::WorkerJob;

use crate::config::EngineConfig;
use crate::error::{FailureReason, MatmulError, Result, WorkerFailure};
use crate::matrix::{Matrix, try_buffer};
use crate::partition::PartitionPlan;

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Program (plus leading arguments) started once per spawned partition.
/// The job's flags are appended after `args`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Re-run the current executable's `worker` subcommand.
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?).arg("worker"))
    }

    fn command(&self, job: &WorkerJob) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(job.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit());
        cmd
    }
}

/// Multiplies with `workers` child processes plus the calling process.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    config: EngineConfig,
    command: WorkerCommand,
    artifact_dir: Option<PathBuf>,
}

impl ProcessEngine {
    pub fn new(command: WorkerCommand, config: EngineConfig) -> Self {
        Self {
            config,
            command,
            artifact_dir: None,
        }
    }

    /// Keep artifacts in `dir` instead of a temporary directory removed after
    /// each multiplication. Stale partition artifacts in `dir` are deleted
    /// before any worker starts.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    /// C = A × B, split across child processes.
    pub fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        a.check_same_size(b)?;

        match &self.artifact_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|source| MatmulError::Io {
                    path: dir.clone(),
                    source,
                })?;
                self.multiply_in(dir, a, b)
            }
            None => {
                let temp = tempfile::Builder::new()
                    .prefix("parmatmul-")
                    .tempdir()
                    .map_err(|source| MatmulError::Io {
                        path: std::env::temp_dir(),
                        source,
                    })?;
                self.multiply_in(temp.path(), a, b)
            }
        }
    }

    fn multiply_in(&self, dir: &Path, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let n = a.n();
        let kernel = self.config.kernel;
        let plan = PartitionPlan::try_new(n, self.config.workers)?;
        let start = Instant::now();

        artifact::clear(dir, &plan)?;
        let b_prepared = kernel.prepare(b)?;
        artifact::write_matrix(&artifact::lhs_path(dir), a)?;
        artifact::write_matrix(&artifact::rhs_path(dir), &b_prepared)?;

        let job_for = |index: usize, rows: &std::ops::Range<usize>| WorkerJob {
            n,
            partition: index,
            start: rows.start,
            end: rows.end,
            kernel,
            lhs: artifact::lhs_path(dir),
            rhs: artifact::rhs_path(dir),
            out: artifact::artifact_path(dir, index),
        };

        // Every early return (or panic) below kills whatever is still running.
        let mut children = Children(Vec::with_capacity(plan.workers()));
        for part in plan.spawned() {
            let job = job_for(part.index, &part.rows);
            debug!(partition = part.index, rows = ?part.rows, "spawning worker process");
            match self.command.command(&job).spawn() {
                Ok(child) => children.0.push((part.index, child)),
                Err(source) => {
                    warn!(partition = part.index, error = %source, "failed to spawn worker process");
                    return Err(MatmulError::WorkerSpawnFailure {
                        partition: part.index,
                        source,
                    });
                }
            }
        }

        // The caller's partition is computed from memory but persisted like
        // every other partition, so read-back treats all of them alike.
        let caller = plan.caller();
        let mut rows = try_buffer(caller.cells(n))?;
        kernel.compute_rows(a.as_slice(), b_prepared.as_slice(), &mut rows, n, caller.rows.clone());
        let caller_out = artifact::artifact_path(dir, caller.index);
        artifact::write_rows(&caller_out, &rows).map_err(|source| MatmulError::Io {
            path: caller_out,
            source,
        })?;

        let deadline = self.config.timeout.map(|t| Instant::now() + t);
        let failures = wait_all(std::mem::take(&mut children.0), deadline);
        if !failures.is_empty() {
            for f in &failures {
                warn!(partition = f.partition, reason = %f.reason, "worker process failed");
            }
            return Err(MatmulError::WorkerJoinFailure { failures });
        }

        let c = artifact::assemble(dir, &plan)?;
        info!(
            n,
            workers = plan.workers(),
            %kernel,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "process multiplication complete"
        );
        Ok(c)
    }
}

/// Running children, keyed by partition. Dropping it kills and reaps them.
struct Children(Vec<(usize, Child)>);

impl Drop for Children {
    fn drop(&mut self) {
        for (partition, child) in self.0.iter_mut() {
            debug!(partition = *partition, "killing worker process");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn exit_failure(status: ExitStatus) -> Option<FailureReason> {
    if status.success() {
        None
    } else {
        Some(match status.code() {
            Some(code) => FailureReason::Exited(code),
            None => FailureReason::Signalled,
        })
    }
}

/// Wait for every child. The first failure (or the deadline) kills the rest,
/// which are then reported as cancelled (or timed out).
fn wait_all(mut running: Vec<(usize, Child)>, deadline: Option<Instant>) -> Vec<WorkerFailure> {
    let mut failures = Vec::new();

    while !running.is_empty() {
        let mut still_running = Vec::with_capacity(running.len());
        for (partition, mut child) in running {
            match child.try_wait() {
                Ok(Some(status)) => {
                    if let Some(reason) = exit_failure(status) {
                        failures.push(WorkerFailure { partition, reason });
                    }
                }
                Ok(None) => still_running.push((partition, child)),
                Err(e) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    failures.push(WorkerFailure {
                        partition,
                        reason: FailureReason::WaitFailed(e.to_string()),
                    });
                }
            }
        }
        running = still_running;
        if running.is_empty() {
            break;
        }

        let expired = deadline.is_some_and(|d| Instant::now() >= d);
        if expired || !failures.is_empty() {
            let reason = if expired {
                FailureReason::TimedOut
            } else {
                FailureReason::Cancelled
            };
            for (partition, child) in running.iter_mut() {
                let _ = child.kill();
                let _ = child.wait();
                failures.push(WorkerFailure {
                    partition: *partition,
                    reason: reason.clone(),
                });
            }
            break;
        }

        thread::sleep(POLL_INTERVAL);
    }

    failures.sort_by_key(|f| f.partition);
    failures
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_exit_status_mapping() {
        let ok = Command::new("true").status().unwrap();
        let bad = Command::new("false").status().unwrap();
        assert_eq!(exit_failure(ok), None);
        assert_eq!(exit_failure(bad), Some(FailureReason::Exited(1)));
    }

    #[test]
    fn test_wait_all_times_out_and_kills() {
        let child = Command::new("sleep").arg("5").spawn().unwrap();
        let start = Instant::now();
        let failures = wait_all(vec![(0, child)], Some(Instant::now() + Duration::from_millis(100)));

        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(
            failures,
            vec![WorkerFailure {
                partition: 0,
                reason: FailureReason::TimedOut,
            }]
        );
    }

    #[test]
    fn test_one_failure_cancels_siblings() {
        let failing = Command::new("false").spawn().unwrap();
        let slow = Command::new("sleep").arg("5").spawn().unwrap();
        let failures = wait_all(vec![(0, slow), (1, failing)], None);

        assert_eq!(
            failures,
            vec![
                WorkerFailure {
                    partition: 0,
                    reason: FailureReason::Cancelled,
                },
                WorkerFailure {
                    partition: 1,
                    reason: FailureReason::Exited(1),
                },
            ]
        );
    }

    #[test]
    fn test_children_killed_when_caller_unwinds() {
        let child = Command::new("sleep").arg("5").spawn().unwrap();
        let pid = child.id() as libc::pid_t;

        let start = Instant::now();
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _children = Children(vec![(0, child)]);
            panic!("caller partition failed");
        }));

        assert!(outcome.is_err());
        assert!(start.elapsed() < Duration::from_secs(4));
        // Killed and reaped: the pid no longer names a process.
        assert_eq!(unsafe { libc::kill(pid, 0) }, -1);
    }

    #[test]
    fn test_too_many_workers_spawns_nothing() {
        let engine = ProcessEngine::new(
            WorkerCommand::new("/nonexistent/parmatmul-worker"),
            EngineConfig::default().with_workers(usize::MAX),
        );
        let a = Matrix::random(4, 1).unwrap();
        let err = engine.multiply(&a, &a).unwrap_err();
        assert!(matches!(err, MatmulError::TooManyWorkers { workers: usize::MAX, .. }));
    }

    #[test]
    fn test_missing_program_is_spawn_failure() {
        let engine = ProcessEngine::new(
            WorkerCommand::new("/nonexistent/parmatmul-worker"),
            EngineConfig::default(),
        );
        let a = Matrix::random(8, 1).unwrap();
        let err = engine.multiply(&a, &a).unwrap_err();
        assert!(matches!(err, MatmulError::WorkerSpawnFailure { partition: 0, .. }));
    }
}
