//! Transpose-first multiplication.

use std::ops::Range;

use super::Matrix;
use crate::error::Result;

/// Compute output rows `rows` of C = A × B given `bt` = Bᵀ.
///
/// With B already transposed, column j of B is row j of `bt`, so the inner
/// product walks both operands with stride 1. Same output contract as
/// [`super::standard::multiply_rows_standard`].
///
/// # Arguments
///
/// * `bt` - Transposed matrix Bᵀ (n × n), row-major
pub fn multiply_rows_transposed(
    a: &[i32],
    bt: &[i32],
    out: &mut [i32],
    n: usize,
    rows: Range<usize>,
) {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(bt.len(), n * n);
    debug_assert_eq!(out.len(), rows.len() * n, "output slice does not match row range");

    for (local, i) in rows.enumerate() {
        let a_row = &a[i * n..(i + 1) * n];
        for j in 0..n {
            let bt_row = &bt[j * n..(j + 1) * n];
            out[local * n + j] = a_row
                .iter()
                .zip(bt_row)
                .fold(0i32, |sum, (&x, &y)| sum.wrapping_add(x.wrapping_mul(y)));
        }
    }
}

/// C = A × B by transposing a copy of B once, then multiplying row by row.
pub fn multiply_transposed(a: &Matrix, b: &Matrix) -> Result<Matrix> {
    a.check_same_size(b)?;
    let n = a.n();
    let mut bt = b.try_clone()?;
    bt.transpose_in_place();

    let mut c = Matrix::try_zeros(n)?;
    multiply_rows_transposed(a.as_slice(), bt.as_slice(), c.as_mut_slice(), n, 0..n);
    Ok(c)
}
