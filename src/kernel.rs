//! Choice of inner-loop addressing shared by every engine.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use crate::error::Result;
use crate::matrix::Matrix;
use crate::matrix::standard::multiply_rows_standard;
use crate::matrix::transpose::multiply_rows_transposed;

/// How the second operand is addressed in the inner product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Kernel {
    /// B read column-wise, stride n.
    #[default]
    Standard,
    /// B transposed once up front, then read row-wise.
    Transposed,
}

impl Kernel {
    /// Produce the operand the row kernel expects for B.
    ///
    /// For [`Kernel::Transposed`] this is a transposed copy, built once by the
    /// caller before any worker starts. Workers never see B change under them.
    pub fn prepare(self, b: &Matrix) -> Result<Matrix> {
        let mut prepared = b.try_clone()?;
        if self == Kernel::Transposed {
            prepared.transpose_in_place();
        }
        Ok(prepared)
    }

    /// Compute output rows `rows` into `out`, with `b` already [`prepare`]d.
    ///
    /// [`prepare`]: Kernel::prepare
    #[inline]
    pub fn compute_rows(self, a: &[i32], b: &[i32], out: &mut [i32], n: usize, rows: Range<usize>) {
        match self {
            Kernel::Standard => multiply_rows_standard(a, b, out, n, rows),
            Kernel::Transposed => multiply_rows_transposed(a, b, out, n, rows),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Kernel::Standard => "standard",
            Kernel::Transposed => "transposed",
        }
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kernel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Kernel::Standard),
            "transposed" => Ok(Kernel::Transposed),
            other => Err(format!("unknown kernel '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernels_agree_on_every_row() {
        let n = 9;
        let a = Matrix::random(n, 11).unwrap();
        let b = Matrix::random(n, 12).unwrap();

        let mut std_out = vec![0; n * n];
        let mut tr_out = vec![0; n * n];
        let bt = Kernel::Transposed.prepare(&b).unwrap();

        Kernel::Standard.compute_rows(a.as_slice(), b.as_slice(), &mut std_out, n, 0..n);
        Kernel::Transposed.compute_rows(a.as_slice(), bt.as_slice(), &mut tr_out, n, 0..n);

        assert_eq!(std_out, tr_out);
    }

    #[test]
    fn test_prepare_leaves_b_untouched() {
        let b = Matrix::from_rows(&[[1, 2], [3, 4]]).unwrap();
        assert_eq!(Kernel::Standard.prepare(&b).unwrap(), b);
        assert_eq!(Kernel::Transposed.prepare(&b).unwrap().as_slice(), &[1, 3, 2, 4]);
        assert_eq!(b.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_round_trip() {
        for k in [Kernel::Standard, Kernel::Transposed] {
            assert_eq!(k.as_str().parse::<Kernel>().unwrap(), k);
        }
        assert!("blocked".parse::<Kernel>().is_err());
    }
}
