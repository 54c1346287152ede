//! Triangular solves.

use crate::{
    assert, linalg::reductions::diag_norm_max, LinalgError, MatMut, MatRef, RealField, Tolerance,
};
use reborrow::*;

/// Computes the solution of `U·X = B`, where `U` is the upper triangular part of
/// `triangular_upper` (including the diagonal), and stores the result in `rhs`.
///
/// No check is made for small pivots: a zero diagonal element produces infinite or NaN values.
///
/// # Panics
/// Panics if `triangular_upper` is not square, or if its dimension differs from
/// `rhs.nrows()`.
#[track_caller]
pub fn solve_upper_triangular_in_place<E: RealField>(
    triangular_upper: MatRef<'_, E>,
    rhs: MatMut<'_, E>,
) {
    let mut rhs = rhs;
    let n = triangular_upper.nrows();
    assert!(all(triangular_upper.ncols() == n, rhs.nrows() == n));

    for j in 0..rhs.ncols() {
        for i in (0..n).rev() {
            let mut sum = unsafe { rhs.rb().read_unchecked(i, j) };
            for k in i + 1..n {
                sum -= unsafe {
                    triangular_upper.read_unchecked(i, k) * rhs.rb().read_unchecked(k, j)
                };
            }
            let value = sum / unsafe { triangular_upper.read_unchecked(i, i) };
            unsafe { rhs.write_unchecked(i, j, value) };
        }
    }
}

/// Computes the solution of `U·X = B` like [`solve_upper_triangular_in_place`], after checking
/// that no diagonal element is negligible.
///
/// A diagonal element `u_ii` is negligible when `|u_ii| <= eps * max_k |u_kk|`. In that case
/// `rhs` is left untouched and [`LinalgError::Singular`] reports the first such index.
///
/// # Panics
/// Panics if `triangular_upper` is not square, or if its dimension differs from
/// `rhs.nrows()`.
#[track_caller]
pub fn solve_upper_in_place<E: RealField>(
    triangular_upper: MatRef<'_, E>,
    rhs: MatMut<'_, E>,
    tolerance: Tolerance<E>,
) -> Result<(), LinalgError> {
    let n = triangular_upper.nrows();
    assert!(all(triangular_upper.ncols() == n, rhs.nrows() == n));

    let max = diag_norm_max(triangular_upper);
    for i in 0..n {
        let pivot = unsafe { triangular_upper.read_unchecked(i, i) };
        if tolerance.is_negligible(pivot, max) {
            return Err(LinalgError::Singular { index: i });
        }
    }

    solve_upper_triangular_in_place(triangular_upper, rhs);
    Ok(())
}
