//! Householder reflectors.
//!
//! A Householder reflector is an orthogonal matrix of the form $H = I - \gamma u u^T$, where the
//! first component of $u$ is one. Given a vector $x$, the reflector computed by
//! [`make_householder_in_place`] satisfies $Hx = \beta e_0$.
//!
//! The vector is first divided by its largest absolute value before its norm is taken, so
//! that neither the squares of huge entries overflow nor those of tiny entries underflow. The sign
//! of $\tau = \pm\lVert x \rVert$ is taken from $x_0$ so that $u_0 = x_0 + \tau$ never cancels.
//!
//! Only the components of $u$ after the leading one are stored. We call them the essential part
//! of the reflector. The decompositions store the essential parts below the diagonal of their
//! working matrix, and the scale factors $\gamma$ in a separate array.
//!
//! A zero vector produces $\gamma = 0$, that is the identity reflector. This is not an error: it
//! signals a structurally zero pivot, which the decompositions tolerate.

use crate::{assert, MatMut, RealField};
use dyn_stack::{PodStack, SizeOverflow, StackReq};
use reborrow::*;

/// Scale factor and new leading entry of a Householder reflector.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Householder<E> {
    /// The scale factor $\gamma$ of $I - \gamma u u^T$. Zero for the identity reflector.
    pub gamma: E,
    /// The leading entry of $Hx$, equal to $-\tau \cdot \max_i |x_i|$.
    pub beta: E,
}

/// Returns the largest absolute value of the elements of `x`, or zero if `x` is empty.
#[inline]
pub fn find_max<E: RealField>(x: &[E]) -> E {
    let mut max = E::zero();
    for &v in x {
        let v = v.abs();
        if v > max {
            max = v;
        }
    }
    max
}

/// Divides the elements of `x` by `max`, and returns the norm of the result with the sign of its
/// first element.
#[inline]
pub fn compute_tau_and_divide<E: RealField>(x: &mut [E], max: E) -> E {
    let mut norm2 = E::zero();
    for v in x.iter_mut() {
        *v /= max;
        norm2 += *v * *v;
    }
    let tau = norm2.sqrt();
    match x.first() {
        Some(&x0) if x0 < E::zero() => -tau,
        _ => tau,
    }
}

/// Divides the elements of `x` by `value`.
#[inline]
pub fn divide_elements<E: RealField>(x: &mut [E], value: E) {
    for v in x.iter_mut() {
        *v /= value;
    }
}

/// Computes the Householder reflector that maps `x` to a multiple of the first unit vector.
///
/// On output, `x[0]` holds $\beta$ and `x[1..]` holds the essential part of $u$. If `x` is zero,
/// it is left untouched and the returned $\gamma$ is zero.
#[inline]
pub fn make_householder_in_place<E: RealField>(x: &mut [E]) -> Householder<E> {
    let max = find_max(x);
    if max == E::zero() {
        return Householder {
            gamma: E::zero(),
            beta: E::zero(),
        };
    }

    let tau = compute_tau_and_divide(x, max);
    let u0 = x[0] + tau;
    divide_elements(&mut x[1..], u0);
    let beta = -tau * max;
    x[0] = beta;

    Householder {
        gamma: u0 / tau,
        beta,
    }
}

/// Computes the size and alignment of required workspace for applying a Householder reflector
/// to a matrix with `ncols` columns from the left.
pub fn apply_householder_on_the_left_req<E: RealField>(
    ncols: usize,
) -> Result<StackReq, SizeOverflow> {
    StackReq::try_new::<E>(ncols)
}

/// Computes the size and alignment of required workspace for applying a Householder reflector
/// to a matrix with `nrows` rows from the right.
pub fn apply_householder_on_the_right_req<E: RealField>(
    nrows: usize,
) -> Result<StackReq, SizeOverflow> {
    StackReq::try_new::<E>(nrows)
}

/// Computes $x \gets (I - \gamma u u^T) x$ for a contiguous vector, where
/// $u = (1, \text{essential})$.
///
/// # Panics
/// Panics if `x.len() != essential.len() + 1`.
#[inline]
#[track_caller]
pub fn apply_householder_on_the_left_col<E: RealField>(x: &mut [E], essential: &[E], gamma: E) {
    assert!(x.len() == essential.len() + 1);
    let (head, tail) = x.split_at_mut(1);

    let mut dot = head[0];
    for (&u, &v) in essential.iter().zip(tail.iter()) {
        dot += u * v;
    }
    dot *= gamma;

    head[0] -= dot;
    for (&u, v) in essential.iter().zip(tail.iter_mut()) {
        *v -= u * dot;
    }
}

/// Computes $A \gets (I - \gamma u u^T) A$, where $u = (1, \text{essential})$.
///
/// Column-major matrices are updated one column at a time. Other layouts accumulate $u^T A$ into
/// a row of workspace first, so that the matrix is traversed along its rows.
///
/// # Panics
/// Panics if `matrix.nrows() != essential.len() + 1`.
#[track_caller]
pub fn apply_householder_on_the_left<E: RealField>(
    matrix: MatMut<'_, E>,
    essential: &[E],
    gamma: E,
    stack: PodStack<'_>,
) {
    let mut matrix = matrix;
    let n = matrix.ncols();
    assert!(matrix.nrows() == essential.len() + 1);

    if gamma == E::zero() || n == 0 {
        return;
    }

    if matrix.row_stride() == 1 {
        for j in 0..n {
            let col = matrix.rb_mut().col_as_slice_mut(j);
            apply_householder_on_the_left_col(col, essential, gamma);
        }
    } else {
        #[cfg(feature = "perf-warn")]
        if crate::__perf_warn!(HOUSEHOLDER_WARN) {
            if matrix.col_stride().unsigned_abs() == 1 {
                log::warn!(target: "qreig_perf", "Householder reflection from the left prefers column-major matrix. Found row-major matrix.");
            } else {
                log::warn!(target: "qreig_perf", "Householder reflection from the left prefers column-major matrix. Found matrix with generic strides.");
            }
        }

        let (temp, _) = stack.make_raw::<E>(n);

        unsafe {
            for (j, t) in temp.iter_mut().enumerate() {
                *t = matrix.rb().read_unchecked(0, j);
            }
            for (k, &u) in essential.iter().enumerate() {
                for (j, t) in temp.iter_mut().enumerate() {
                    *t += u * matrix.rb().read_unchecked(k + 1, j);
                }
            }
            for t in temp.iter_mut() {
                *t *= gamma;
            }

            for (j, &t) in temp.iter().enumerate() {
                let v = matrix.rb().read_unchecked(0, j);
                matrix.write_unchecked(0, j, v - t);
            }
            for (k, &u) in essential.iter().enumerate() {
                for (j, &t) in temp.iter().enumerate() {
                    let v = matrix.rb().read_unchecked(k + 1, j);
                    matrix.write_unchecked(k + 1, j, v - u * t);
                }
            }
        }
    }
}

/// Computes $A \gets A (I - \gamma u u^T)$, where $u = (1, \text{essential})$.
///
/// Row-major matrices are updated one row at a time. Other layouts accumulate $Au$ into a column
/// of workspace first, so that the matrix is traversed along its columns.
///
/// # Panics
/// Panics if `matrix.ncols() != essential.len() + 1`.
#[track_caller]
pub fn apply_householder_on_the_right<E: RealField>(
    matrix: MatMut<'_, E>,
    essential: &[E],
    gamma: E,
    stack: PodStack<'_>,
) {
    let mut matrix = matrix;
    let m = matrix.nrows();
    assert!(matrix.ncols() == essential.len() + 1);

    if gamma == E::zero() || m == 0 {
        return;
    }

    if matrix.col_stride() == 1 {
        for i in 0..m {
            let row = matrix.rb_mut().row_as_slice_mut(i);
            let (head, tail) = row.split_at_mut(1);

            let mut sum = head[0];
            for (&u, &x) in essential.iter().zip(tail.iter()) {
                sum += u * x;
            }
            sum *= gamma;

            head[0] -= sum;
            for (&u, x) in essential.iter().zip(tail.iter_mut()) {
                *x -= sum * u;
            }
        }
    } else {
        let (temp, _) = stack.make_raw::<E>(m);

        unsafe {
            for (i, t) in temp.iter_mut().enumerate() {
                *t = matrix.rb().read_unchecked(i, 0);
            }
            for (k, &u) in essential.iter().enumerate() {
                for (i, t) in temp.iter_mut().enumerate() {
                    *t += u * matrix.rb().read_unchecked(i, k + 1);
                }
            }
            for t in temp.iter_mut() {
                *t *= gamma;
            }

            for (i, &t) in temp.iter().enumerate() {
                let v = matrix.rb().read_unchecked(i, 0);
                matrix.write_unchecked(i, 0, v - t);
            }
            for (k, &u) in essential.iter().enumerate() {
                for (i, &t) in temp.iter().enumerate() {
                    let v = matrix.rb().read_unchecked(i, k + 1);
                    matrix.write_unchecked(i, k + 1, v - t * u);
                }
            }
        }
    }
}
