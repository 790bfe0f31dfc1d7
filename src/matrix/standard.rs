//! Textbook i-j-k multiplication.

use std::ops::Range;

use super::Matrix;
use crate::error::Result;

/// Compute output rows `rows` of C = A × B with the i-j-k loop order.
///
/// The innermost loop walks B down a column (stride `n`), so every step
/// touches a new cache line once n gets large. This is the reference the
/// other strategies are checked against.
///
/// `out` holds only the requested rows: `out[0..n]` is row `rows.start`.
/// Cells are overwritten, not accumulated. Arithmetic wraps on overflow;
/// see [`super::RANDOM_MAX`] for the range that never overflows.
///
/// # Arguments
///
/// * `a` - Matrix A (n × n), row-major
/// * `b` - Matrix B (n × n), row-major
/// * `out` - Destination for `rows.len()` rows of C
/// * `n` - Side length
/// * `rows` - Half-open row range of C to compute
pub fn multiply_rows_standard(a: &[i32], b: &[i32], out: &mut [i32], n: usize, rows: Range<usize>) {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(b.len(), n * n);
    debug_assert_eq!(out.len(), rows.len() * n, "output slice does not match row range");

    for (local, i) in rows.enumerate() {
        for j in 0..n {
            let mut sum = 0i32;
            for k in 0..n {
                sum = sum.wrapping_add(a[i * n + k].wrapping_mul(b[k * n + j]));
            }
            out[local * n + j] = sum;
        }
    }
}

/// C = A × B over the whole matrix, single-threaded.
pub fn multiply_standard(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    a.check_same_size(b)?;
    let n = a.n();
    let mut c = Matrix::try_zeros(n)?;
    multiply_rows_standard(a.as_slice(), b.as_slice(), c.as_mut_slice(), n, 0..n);
    Ok(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_2x2_known_product() {
        let a = Matrix::from_rows(&[[1, 2], [3, 4]]).unwrap();
        let b = Matrix::from_rows(&[[5, 6], [7, 8]]).unwrap();
        let c = multiply_standard(&a, &b).unwrap();
        assert_eq!(c.as_slice(), &[19, 22, 43, 50]);
    }

    #[test]
    fn test_row_range_writes_only_its_rows() {
        let n = 4;
        let a = Matrix::random(n, 1).unwrap();
        let b = Matrix::random(n, 2).unwrap();
        let full = multiply_standard(&a, &b).unwrap();

        let mut part = vec![-1; 2 * n];
        multiply_rows_standard(a.as_slice(), b.as_slice(), &mut part, n, 1..3);

        assert_eq!(&part[..n], full.row(1));
        assert_eq!(&part[n..], full.row(2));
    }

    #[test]
    fn test_empty_range_is_noop() {
        let a = Matrix::random(3, 1).unwrap();
        let mut out: Vec<i32> = Vec::new();
        multiply_rows_standard(a.as_slice(), a.as_slice(), &mut out, 3, 2..2);
        assert!(out.is_empty());
    }

    #[test]
    fn test_size_mismatch() {
        let a = Matrix::zeros(2);
        let b = Matrix::zeros(3);
        assert!(multiply_standard(&a, &b).is_err());
    }

    #[test]
    fn test_overflow_wraps() {
        let a = Matrix::from_vec(1, vec![i32::MAX]).unwrap();
        let b = Matrix::from_vec(1, vec![2]).unwrap();
        let c = multiply_standard(&a, &b).unwrap();
        assert_eq!(c.get(0, 0), i32::MAX.wrapping_mul(2));
    }
}
