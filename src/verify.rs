//! Result comparison and timing.

use std::fmt;
use std::time::{Duration, Instant};

use crate::matrix::Matrix;

/// Outcome of comparing two products. A mismatch is a result, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Same,
    /// First differing cell in row-major order.
    Different {
        row: usize,
        col: usize,
        left: i32,
        right: i32,
    },
    /// The matrices do not even have the same side length.
    SizeMismatch { left: usize, right: usize },
}

impl Verdict {
    /// Compare cell by cell, stopping at the first difference.
    pub fn compare(m1: &Matrix, m2: &Matrix) -> Self {
        if m1.n() != m2.n() {
            return Verdict::SizeMismatch {
                left: m1.n(),
                right: m2.n(),
            };
        }
        let n = m1.n();
        match m1
            .as_slice()
            .iter()
            .zip(m2.as_slice())
            .position(|(x, y)| x != y)
        {
            None => Verdict::Same,
            Some(idx) => Verdict::Different {
                row: idx / n,
                col: idx % n,
                left: m1.as_slice()[idx],
                right: m2.as_slice()[idx],
            },
        }
    }

    pub fn is_same(&self) -> bool {
        matches!(self, Verdict::Same)
    }

    /// The one-line PASS/FAIL report printed by the benchmark driver.
    pub fn report_line(&self) -> &'static str {
        if self.is_same() {
            "RESULTS ARE THE SAME"
        } else {
            "RESULTS ARE NOT THE SAME"
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Same => f.write_str(self.report_line()),
            Verdict::Different {
                row,
                col,
                left,
                right,
            } => write!(
                f,
                "{} (first difference at [{}][{}]: {} vs {})",
                self.report_line(),
                row,
                col,
                left,
                right
            ),
            Verdict::SizeMismatch { left, right } => write!(
                f,
                "{} ({}x{} vs {}x{})",
                self.report_line(),
                left,
                left,
                right,
                right
            ),
        }
    }
}

/// True iff both matrices have the same size and all n² cells are equal.
pub fn verify(m1: &Matrix, m2: &Matrix) -> bool {
    Verdict::compare(m1, m2).is_same()
}

/// A value together with how long it took to produce.
#[derive(Debug, Clone)]
pub struct Timed<T> {
    pub value: T,
    /// Monotonic wall-clock time.
    pub wall: Duration,
    /// CPU time consumed by this process (not its children), where available.
    pub cpu: Option<Duration>,
}

/// Run `op` and measure it.
pub fn time<T>(op: impl FnOnce() -> T) -> Timed<T> {
    let cpu_start = process_cpu_time();
    let start = Instant::now();
    let value = op();
    let wall = start.elapsed();
    let cpu = match (cpu_start, process_cpu_time()) {
        (Some(before), Some(after)) => after.checked_sub(before),
        _ => None,
    };
    Timed { value, wall, cpu }
}

/// CPU time used so far by the whole process.
#[cfg(unix)]
pub fn process_cpu_time() -> Option<Duration> {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: `ts` is a valid, writable timespec for the duration of the call.
    let rc = unsafe { libc::clock_gettime(libc::CLOCK_PROCESS_CPUTIME_ID, &mut ts) };
    if rc != 0 {
        return None;
    }
    Some(Duration::new(ts.tv_sec as u64, ts.tv_nsec as u32))
}

#[cfg(not(unix))]
pub fn process_cpu_time() -> Option<Duration> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_matrices_pass() {
        let m = Matrix::random(8, 3).unwrap();
        assert!(verify(&m, &m.clone()));
        assert_eq!(Verdict::compare(&m, &m).report_line(), "RESULTS ARE THE SAME");
    }

    #[test]
    fn test_first_difference_located() {
        let a = Matrix::zeros(4);
        let mut b = Matrix::zeros(4);
        b.set(2, 1, 5);
        b.set(3, 3, 6);

        let v = Verdict::compare(&a, &b);
        assert_eq!(
            v,
            Verdict::Different {
                row: 2,
                col: 1,
                left: 0,
                right: 5,
            }
        );
        assert!(!verify(&a, &b));
        assert_eq!(v.report_line(), "RESULTS ARE NOT THE SAME");
    }

    #[test]
    fn test_size_mismatch_is_not_same() {
        let v = Verdict::compare(&Matrix::zeros(2), &Matrix::zeros(3));
        assert_eq!(v, Verdict::SizeMismatch { left: 2, right: 3 });
        assert!(v.to_string().starts_with("RESULTS ARE NOT THE SAME"));
    }

    #[test]
    fn test_time_returns_value() {
        let timed = time(|| {
            std::thread::sleep(Duration::from_millis(5));
            42
        });
        assert_eq!(timed.value, 42);
        assert!(timed.wall >= Duration::from_millis(5));
    }

    #[cfg(unix)]
    #[test]
    fn test_cpu_clock_available() {
        assert!(process_cpu_time().is_some());
    }
}
