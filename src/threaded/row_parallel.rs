//! Row-partitioned multiplication on scoped threads.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::error::{FailureReason, MatmulError, Result, WorkerFailure};
use crate::kernel::Kernel;
use crate::matrix::Matrix;
use crate::partition::{Partition, PartitionPlan};

/// Multiplies on `workers` scoped threads plus the calling thread.
///
/// Every worker writes straight into its own rows of one shared output
/// buffer. Joining the threads is the whole aggregation step: `join`
/// synchronizes with the end of each worker, so its rows are visible to the
/// caller afterwards.
#[derive(Debug, Clone, Default)]
pub struct ThreadEngine {
    config: EngineConfig,
}

impl ThreadEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// C = A × B, split across threads.
    pub fn multiply(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        a.check_same_size(b)?;
        let n = a.n();
        let kernel = self.config.kernel;
        let plan = PartitionPlan::try_new(n, self.config.workers)?;

        // Transposition (if any) happens once, before the first worker starts.
        let b_prepared = kernel.prepare(b)?;
        let mut c = Matrix::try_zeros(n)?;

        let task = RowTask {
            n,
            a: a.as_slice(),
            b: b_prepared.as_slice(),
            kernel,
        };

        let start = Instant::now();
        run_partitions(&plan, c.as_mut_slice(), self.config.timeout, |part, out, cancel| {
            task.run(part, out, cancel)
        })?;

        info!(
            n,
            workers = plan.workers(),
            %kernel,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "threaded multiplication complete"
        );
        Ok(c)
    }
}

/// Read-only inputs shared by every worker of one multiplication.
///
/// Borrowed from the caller; the thread scope guarantees it outlives every
/// worker that sees it.
#[derive(Clone, Copy)]
struct RowTask<'a> {
    n: usize,
    a: &'a [i32],
    b: &'a [i32],
    kernel: Kernel,
}

impl RowTask<'_> {
    /// Compute `part` into `out` one row at a time. Returns `false` if
    /// cancelled before finishing.
    fn run(&self, part: &Partition, out: &mut [i32], cancel: &AtomicBool) -> bool {
        let n = self.n;
        debug_assert_eq!(out.len(), part.cells(n));

        for (local, row) in part.rows.clone().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            let dst = &mut out[local * n..(local + 1) * n];
            self.kernel.compute_rows(self.a, self.b, dst, n, row..row + 1);
        }
        true
    }
}

/// Raises the shared cancel flag if the owning worker unwinds.
struct CancelOnPanic<'a>(&'a AtomicBool);

impl Drop for CancelOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.store(true, Ordering::Relaxed);
        }
    }
}

/// Run `work` once per partition of `plan`: on a new thread for each spawned
/// partition, and on the calling thread for the caller's partition.
///
/// `work` receives the partition, the exclusive slice of `out` holding its
/// rows, and a cancel flag it should poll; it returns `true` once the
/// partition is complete.
///
/// Returns only after every spawned thread has been joined. Any panic,
/// cancellation or timeout is reported for every affected partition in one
/// [`MatmulError::WorkerJoinFailure`]; a failed spawn cancels and joins the
/// threads already running before returning
/// [`MatmulError::WorkerSpawnFailure`].
pub fn run_partitions<F>(
    plan: &PartitionPlan,
    out: &mut [i32],
    timeout: Option<Duration>,
    work: F,
) -> Result<()>
where
    F: Fn(&Partition, &mut [i32], &AtomicBool) -> bool + Sync,
{
    let split = plan.split_output(out);
    let cancel = AtomicBool::new(false);
    let (tx, rx) = mpsc::channel::<usize>();
    let deadline = timeout.map(|t| Instant::now() + t);

    thread::scope(|s| {
        let work = &work;
        let cancel = &cancel;
        let mut handles = Vec::with_capacity(plan.workers());

        for (part, slice) in plan.spawned().iter().zip(split.spawned) {
            let tx = tx.clone();
            debug!(partition = part.index, rows = ?part.rows, "dispatching worker thread");

            let spawned = thread::Builder::new()
                .name(format!("matmul-worker-{}", part.index))
                .spawn_scoped(s, move || {
                    let _guard = CancelOnPanic(cancel);
                    let done = work(part, slice, cancel);
                    if done {
                        let _ = tx.send(part.index);
                    }
                    done
                });

            match spawned {
                Ok(handle) => handles.push((part.index, handle)),
                Err(source) => {
                    warn!(partition = part.index, error = %source, "failed to spawn worker thread");
                    cancel.store(true, Ordering::Relaxed);
                    for (_, handle) in handles {
                        let _ = handle.join();
                    }
                    return Err(MatmulError::WorkerSpawnFailure {
                        partition: part.index,
                        source,
                    });
                }
            }
        }
        drop(tx);

        let caller = plan.caller();
        debug!(partition = caller.index, rows = ?caller.rows, "computing caller partition");
        let caller_done = work(caller, split.caller, cancel);

        let mut failures: BTreeMap<usize, FailureReason> = BTreeMap::new();
        if !caller_done {
            failures.insert(caller.index, FailureReason::Cancelled);
        }

        let mut pending: Vec<usize> = handles.iter().map(|(index, _)| *index).collect();
        while !pending.is_empty() {
            let received = match deadline {
                Some(d) => rx.recv_timeout(d.saturating_duration_since(Instant::now())),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };
            match received {
                Ok(index) => pending.retain(|&p| p != index),
                Err(RecvTimeoutError::Timeout) => {
                    cancel.store(true, Ordering::Relaxed);
                    for index in pending.drain(..) {
                        failures.insert(index, FailureReason::TimedOut);
                    }
                }
                // Every remaining worker has exited without reporting; joining says why.
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for (index, handle) in handles {
            match handle.join() {
                Ok(true) => {}
                Ok(false) => {
                    failures.entry(index).or_insert(FailureReason::Cancelled);
                }
                Err(payload) => {
                    failures.insert(index, FailureReason::Panicked(panic_message(payload)));
                }
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        let failures: Vec<WorkerFailure> = failures
            .into_iter()
            .map(|(partition, reason)| {
                warn!(partition, %reason, "worker thread failed");
                WorkerFailure { partition, reason }
            })
            .collect();
        Err(MatmulError::WorkerJoinFailure { failures })
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
