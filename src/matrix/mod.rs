//! Square matrix storage and the scalar multiplication kernels.
//!
//! A [`Matrix`] is an n×n block of `i32` stored row-major, so cell (i, j)
//! lives at `i * n + j`. The kernels in [`standard`] and [`transpose`] only
//! ever write the output rows they are handed, which is what lets the
//! parallel engines split one output buffer between workers.

pub mod standard;
pub mod transpose;

use std::fmt;
use std::ops::Range;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{MatmulError, Result};

/// Largest value produced by [`Matrix::fill_random`].
///
/// With entries in `0..=RANDOM_MAX` and n ≤ 1024 every product cell stays
/// below `81 * 1024`, far from `i32::MAX`.
pub const RANDOM_MAX: i32 = 9;

/// Dense n×n matrix of `i32`, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct Matrix {
    n: usize,
    data: Vec<i32>,
}

impl Matrix {
    /// Allocate a zero-filled n×n matrix.
    ///
    /// Fails with [`MatmulError::InvalidSize`] for `n == 0` and with
    /// [`MatmulError::AllocationFailure`] if the buffer cannot be reserved.
    pub fn try_zeros(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(MatmulError::InvalidSize(n));
        }
        let elements = n
            .checked_mul(n)
            .ok_or(MatmulError::AllocationFailure { elements: usize::MAX })?;

        Ok(Self {
            n,
            data: try_buffer(elements)?,
        })
    }

    /// Copy of `self` that reports [`MatmulError::AllocationFailure`]
    /// instead of aborting when memory runs out.
    pub fn try_clone(&self) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(self.data.len())
            .map_err(|_| MatmulError::AllocationFailure {
                elements: self.data.len(),
            })?;
        data.extend_from_slice(&self.data);
        Ok(Self { n: self.n, data })
    }

    /// Panicking shorthand for [`Matrix::try_zeros`], for tests and small sizes.
    pub fn zeros(n: usize) -> Self {
        match Self::try_zeros(n) {
            Ok(m) => m,
            Err(e) => panic!("Matrix::zeros({}): {}", n, e),
        }
    }

    /// Wrap an existing row-major buffer. Its length must be exactly n².
    pub fn from_vec(n: usize, data: Vec<i32>) -> Result<Self> {
        if n == 0 {
            return Err(MatmulError::InvalidSize(n));
        }
        if n.checked_mul(n) != Some(data.len()) {
            return Err(MatmulError::DimensionMismatch {
                left: n.saturating_mul(n),
                right: data.len(),
            });
        }
        Ok(Self { n, data })
    }

    /// Build from nested rows. Every row must be as long as there are rows.
    pub fn from_rows<R: AsRef<[i32]>>(rows: &[R]) -> Result<Self> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for row in rows {
            let row = row.as_ref();
            if row.len() != n {
                return Err(MatmulError::DimensionMismatch {
                    left: n,
                    right: row.len(),
                });
            }
            data.extend_from_slice(row);
        }
        Self::from_vec(n, data)
    }

    /// The n×n identity matrix.
    pub fn identity(n: usize) -> Result<Self> {
        let mut m = Self::try_zeros(n)?;
        for i in 0..n {
            m.data[i * n + i] = 1;
        }
        Ok(m)
    }

    /// Random matrix with entries in `0..=RANDOM_MAX`, reproducible from `seed`.
    pub fn random(n: usize, seed: u64) -> Result<Self> {
        let mut m = Self::try_zeros(n)?;
        m.fill_random(&mut StdRng::seed_from_u64(seed));
        Ok(m)
    }

    /// Overwrite every cell with a value drawn from `0..=RANDOM_MAX`.
    pub fn fill_random<R: Rng>(&mut self, rng: &mut R) {
        for x in self.data.iter_mut() {
            *x = rng.gen_range(0..=RANDOM_MAX);
        }
    }

    /// Side length.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> i32 {
        self.data[self.index(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, v: i32) {
        let idx = self.index(i, j);
        self.data[idx] = v;
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.n && j < self.n,
            "index ({}, {}) out of bounds for {}x{} matrix",
            i,
            j,
            self.n,
            self.n
        );
        i * self.n + j
    }

    /// Row `i` as a slice of n values.
    pub fn row(&self, i: usize) -> &[i32] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Mutable view over a contiguous range of rows.
    pub fn rows_mut(&mut self, rows: Range<usize>) -> &mut [i32] {
        let n = self.n;
        &mut self.data[rows.start * n..rows.end * n]
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.data
    }

    /// Transpose in place by swapping each cell above the diagonal with its
    /// mirror below it.
    pub fn transpose_in_place(&mut self) {
        let n = self.n;
        for i in 0..n {
            for j in (i + 1)..n {
                self.data.swap(i * n + j, j * n + i);
            }
        }
    }

    /// Fail with [`MatmulError::DimensionMismatch`] unless `other` has the same side.
    pub fn check_same_size(&self, other: &Matrix) -> Result<()> {
        if self.n != other.n {
            return Err(MatmulError::DimensionMismatch {
                left: self.n,
                right: other.n,
            });
        }
        Ok(())
    }
}

/// Zero-filled buffer of `elements` cells, reserved up front so a failed
/// allocation is an error rather than an abort.
pub(crate) fn try_buffer(elements: usize) -> Result<Vec<i32>> {
    let mut data = Vec::new();
    data.try_reserve_exact(elements)
        .map_err(|_| MatmulError::AllocationFailure { elements })?;
    data.resize(elements, 0);
    Ok(data)
}

impl fmt::Debug for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Matrix({}x{}) ", self.n, self.n)?;
        f.debug_list()
            .entries((0..self.n).map(|i| self.row(i)))
            .finish()
    }
}

/// Prints one row per line, entries separated by spaces.
impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.n {
            let row = self.row(i);
            for (j, v) in row.iter().enumerate() {
                if j > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", v)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
