//! Matrix multiplication.

use crate::{
    assert,
    utils::thread::{for_each_raw, Ptr},
    MatMut, MatRef, Parallelism, RealField,
};
use reborrow::*;

#[inline(always)]
fn dot_col<E: RealField>(lhs: MatRef<'_, E>, rhs: MatRef<'_, E>, i: usize, j: usize) -> E {
    let mut acc = E::zero();
    for k in 0..lhs.ncols() {
        unsafe { acc += lhs.read_unchecked(i, k) * rhs.read_unchecked(k, j) };
    }
    acc
}

fn matmul_col<E: RealField>(
    acc: MatMut<'_, E>,
    lhs: MatRef<'_, E>,
    rhs: MatRef<'_, E>,
    j: usize,
    alpha: Option<E>,
    beta: E,
) {
    let mut acc = acc;
    for i in 0..acc.nrows() {
        let prod = beta * dot_col(lhs, rhs, i, j);
        let value = match alpha {
            Some(alpha) => alpha * unsafe { acc.rb().read_unchecked(i, 0) } + prod,
            None => prod,
        };
        unsafe { acc.write_unchecked(i, 0, value) };
    }
}

/// Computes the matrix product `[alpha * acc] + beta * lhs * rhs` and stores the result in
/// `acc`.
///
/// Performs the operation:
/// - `acc = beta * lhs * rhs` if `alpha` is `None` (in this case, the preexisting values in `acc`
///   are not read),
/// - `acc = alpha * acc + beta * lhs * rhs` if `alpha` is `Some(_)`.
///
/// Each column of `acc` is computed by a single task, and every element is accumulated in the same
/// order regardless of `parallelism`, so the result does not depend on the number of threads.
///
/// # Panics
///
/// Panics if the matrix dimensions are not compatible for matrix multiplication.
/// i.e.
///  - `acc.nrows() == lhs.nrows()`
///  - `acc.ncols() == rhs.ncols()`
///  - `lhs.ncols() == rhs.nrows()`
///
/// # Example
///
/// ```
/// use qreig::{linalg::matmul::matmul, mat, Mat, Parallelism};
///
/// let lhs = mat![[0.0, 2.0], [1.0, 3.0]];
/// let rhs = mat![[4.0, 6.0], [5.0, 7.0]];
///
/// let mut acc = Mat::<f64>::zeros(2, 2);
/// matmul(
///     acc.as_mut(),
///     lhs.as_ref(),
///     rhs.as_ref(),
///     None,
///     2.5,
///     Parallelism::None,
/// );
///
/// assert_eq!(acc.read(0, 0), 2.5 * (0.0 * 4.0 + 2.0 * 5.0));
/// assert_eq!(acc.read(1, 1), 2.5 * (1.0 * 6.0 + 3.0 * 7.0));
/// ```
#[track_caller]
pub fn matmul<E: RealField>(
    acc: MatMut<'_, E>,
    lhs: MatRef<'_, E>,
    rhs: MatRef<'_, E>,
    alpha: Option<E>,
    beta: E,
    parallelism: Parallelism,
) {
    assert!(all(
        acc.nrows() == lhs.nrows(),
        acc.ncols() == rhs.ncols(),
        lhs.ncols() == rhs.nrows(),
    ));

    let (m, n) = acc.shape();
    if m == 0 || n == 0 {
        return;
    }

    let parallelism = if m * n * lhs.ncols() <= 48 * 48 * 48 {
        Parallelism::None
    } else {
        parallelism
    };

    let rs = acc.row_stride();
    let cs = acc.col_stride();
    let ptr = Ptr(acc.as_ptr_mut());
    for_each_raw(
        n,
        |j| {
            let ptr = ptr;
            // SAFETY: each task only accesses column `j` of `acc`.
            let col = unsafe {
                MatMut::from_raw_parts(ptr.0.wrapping_offset(j as isize * cs), m, 1, rs, cs)
            };
            matmul_col(col, lhs, rhs, j, alpha, beta);
        },
        parallelism,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert, Layout, Mat};
    use rand::prelude::*;
    use std::cell::RefCell;

    thread_local! {
        static RNG: RefCell<StdRng> = RefCell::new(StdRng::seed_from_u64(0));
    }

    fn random_mat(m: usize, n: usize) -> Mat<f64> {
        RNG.with(|rng| {
            let mut rng = rng.borrow_mut();
            Mat::from_fn(m, n, |_, _| rng.gen::<f64>())
        })
    }

    #[test]
    fn test_matmul_against_naive() {
        for (m, n, k) in [(1, 1, 1), (3, 4, 5), (7, 2, 0), (60, 50, 70)] {
            let lhs = random_mat(m, k);
            let rhs = random_mat(k, n);
            let init = random_mat(m, n);

            for layout in [Layout::ColMajor, Layout::RowMajor] {
                for alpha in [None, Some(0.5)] {
                    let mut acc = init.to_layout(layout);
                    matmul(
                        acc.as_mut(),
                        lhs.as_ref(),
                        rhs.as_ref(),
                        alpha,
                        2.0,
                        Parallelism::None,
                    );
                    for i in 0..m {
                        for j in 0..n {
                            let mut expected = 0.0;
                            for p in 0..k {
                                expected += lhs.read(i, p) * rhs.read(p, j);
                            }
                            expected *= 2.0;
                            if let Some(alpha) = alpha {
                                expected += alpha * init.read(i, j);
                            }
                            assert!((acc.read(i, j) - expected).abs() < 1e-12);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_matmul_parallel_is_bit_identical() {
        let lhs = random_mat(80, 64);
        let rhs = random_mat(64, 90);
        let mut serial = Mat::zeros(80, 90);
        let mut parallel = Mat::zeros(80, 90);
        matmul(
            serial.as_mut(),
            lhs.as_ref(),
            rhs.transpose().transpose(),
            None,
            1.0,
            Parallelism::None,
        );
        #[cfg(feature = "rayon")]
        let par = Parallelism::Rayon(4);
        #[cfg(not(feature = "rayon"))]
        let par = Parallelism::None;
        matmul(
            parallel.as_mut(),
            lhs.as_ref(),
            rhs.as_ref(),
            None,
            1.0,
            par,
        );
        assert!(serial == parallel);
    }
}
