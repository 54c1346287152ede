//! The QR decomposition decomposes a matrix $A$ into the product
//! $$A = QR,$$
//! where $Q$ is an orthogonal matrix and $R$ is an upper trapezoidal matrix.
//!
//! $Q$ is never formed during the decomposition. It is stored as the sequence of Householder
//! reflectors $H_0 H_1 \dots H_{k-1}$, with $k = \min(m, n)$: the essential part of each
//! reflector below the diagonal of the working storage, and its scale factor in a separate array
//! (see [`householder`](crate::linalg::householder)). $Q$ can be materialized with
//! [`QrDecomposition::q`], or applied to another matrix with [`QrDecomposition::apply_q`] and
//! [`QrDecomposition::apply_transpose_q`].
//!
//! The available implementations differ by their working storage:
//! - [`HouseholderTranQr`] keeps the transpose of the input in row-major storage, so that the
//!   columns of the input are contiguous.
//! - [`HouseholderColQr`] keeps one vector per column.
//! - [`ColPivHouseholderQr`] builds on [`HouseholderColQr`] and additionally pivots the columns,
//!   so that $AP = QR$ where $P$ is a permutation matrix.
//! - [`BlockHouseholderQr`] works on [`BlockMat`](crate::BlockMat) tiles and applies the trailing
//!   updates with matrix products, optionally in parallel.
//!
//! A zero column does not make the decomposition fail. The corresponding reflector is the
//! identity, and the diagonal element of $R$ is zero.

use crate::{assert, check_shape, LinalgError, Mat, MatMut, MatRef, RealField};

pub mod blocked;
pub mod col_pivoting;
pub mod householder_col;
pub mod householder_tran;

pub use blocked::{BlockHouseholderQr, BlockQrParams};
pub use col_pivoting::{ColPivHouseholderQr, ColPivQrParams};
pub use householder_col::HouseholderColQr;
pub use householder_tran::HouseholderTranQr;

/// Interface of the QR decompositions of a dense matrix.
///
/// The factors can only be extracted after a successful call to
/// [`decompose`](QrDecomposition::decompose). Calling an extraction method before that is a
/// programmer error and panics.
pub trait QrDecomposition<E: RealField> {
    /// Decomposes `matrix`, overwriting the result of any previous decomposition.
    ///
    /// The working storage grows to fit `matrix` and is reused by later calls.
    fn decompose(&mut self, matrix: MatRef<'_, E>) -> Result<(), LinalgError>;

    /// Returns `true` if [`decompose`](QrDecomposition::decompose) overwrites its input.
    fn input_modified(&self) -> bool;

    /// Returns the number of rows of the decomposed matrix.
    fn nrows(&self) -> usize;

    /// Returns the number of columns of the decomposed matrix.
    fn ncols(&self) -> usize;

    /// Returns the scale factors of the Householder reflectors.
    fn gammas(&self) -> &[E];

    /// Writes $Q$ into `q`, which must have the shape returned by
    /// [`q_shape`](QrDecomposition::q_shape).
    ///
    /// # Panics
    /// Panics if `q` does not have the expected shape.
    fn write_q(&self, q: MatMut<'_, E>, compact: bool);

    /// Writes $R$ into `r`, which must have the shape returned by
    /// [`r_shape`](QrDecomposition::r_shape). Elements below the diagonal are set to zero.
    ///
    /// # Panics
    /// Panics if `r` does not have the expected shape.
    fn write_r(&self, r: MatMut<'_, E>, compact: bool);

    /// Computes $B \gets QB$ without forming $Q$.
    fn apply_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError>;

    /// Computes $B \gets Q^T B$ without forming $Q$.
    fn apply_transpose_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError>;

    /// Returns the shape of $Q$: `m×min(m, n)` if `compact`, `m×m` otherwise.
    #[inline]
    fn q_shape(&self, compact: bool) -> (usize, usize) {
        let m = self.nrows();
        let size = Ord::min(m, self.ncols());
        (m, if compact { size } else { m })
    }

    /// Returns the shape of $R$: `min(m, n)×n` if `compact`, `m×n` otherwise.
    #[inline]
    fn r_shape(&self, compact: bool) -> (usize, usize) {
        let (m, n) = (self.nrows(), self.ncols());
        (if compact { Ord::min(m, n) } else { m }, n)
    }

    /// Writes $Q$ into a caller provided buffer.
    ///
    /// Returns [`LinalgError::DimensionMismatch`] if `q` does not have the shape returned by
    /// [`q_shape`](QrDecomposition::q_shape).
    fn q_into(&self, q: MatMut<'_, E>, compact: bool) -> Result<(), LinalgError> {
        check_shape(self.q_shape(compact), q.shape())?;
        self.write_q(q, compact);
        Ok(())
    }

    /// Writes $R$ into a caller provided buffer.
    ///
    /// Returns [`LinalgError::DimensionMismatch`] if `r` does not have the shape returned by
    /// [`r_shape`](QrDecomposition::r_shape).
    fn r_into(&self, r: MatMut<'_, E>, compact: bool) -> Result<(), LinalgError> {
        check_shape(self.r_shape(compact), r.shape())?;
        self.write_r(r, compact);
        Ok(())
    }

    /// Returns a newly allocated $Q$.
    fn q(&self, compact: bool) -> Mat<E> {
        let (m, n) = self.q_shape(compact);
        let mut q = Mat::zeros(m, n);
        self.write_q(q.as_mut(), compact);
        q
    }

    /// Returns a newly allocated $R$.
    fn r(&self, compact: bool) -> Mat<E> {
        let (m, n) = self.r_shape(compact);
        let mut r = Mat::zeros(m, n);
        self.write_r(r.as_mut(), compact);
        r
    }
}

/// Interface of the column pivoting QR decompositions, $AP = QR$.
pub trait QrpDecomposition<E: RealField>: QrDecomposition<E> {
    /// Returns the number of reflectors that were computed before the remaining columns became
    /// negligible.
    ///
    /// The block of $R$ starting at `(rank, rank)` is the upper triangular part of the
    /// corresponding block of $Q^T A P$, whose elements are all negligible.
    fn rank(&self) -> usize;

    /// Returns the column permutation: column `i` of $AP$ is column `pivots()[i]` of $A$.
    fn pivots(&self) -> &[usize];

    /// Returns the permutation matrix $P$, with `P[(pivots()[i], i)] == 1`.
    fn pivot_matrix(&self) -> Mat<E> {
        let pivots = self.pivots();
        let n = pivots.len();
        let mut p = Mat::zeros(n, n);
        for (i, &pivot) in pivots.iter().enumerate() {
            p.write(pivot, i, E::one());
        }
        p
    }
}

#[track_caller]
#[inline]
pub(crate) fn assert_decomposed(decomposed: bool) {
    assert!(decomposed);
}

/// Checks that `b` has as many rows as the decomposed matrix, as required by
/// [`QrDecomposition::apply_q`].
#[inline]
pub(crate) fn check_apply_shape(nrows: usize, b: (usize, usize)) -> Result<(), LinalgError> {
    check_shape((nrows, b.1), b)
}

#[cfg(test)]
pub(crate) mod tests_common {
    use super::*;
    use crate::{assert, linalg::matmul::matmul, Parallelism};
    use assert_approx_eq::assert_approx_eq;
    use rand::prelude::*;
    use std::cell::RefCell;

    thread_local! {
        static RNG: RefCell<StdRng> = RefCell::new(StdRng::seed_from_u64(0));
    }

    pub fn random_value() -> f64 {
        RNG.with(|rng| rng.borrow_mut().gen::<f64>() * 2.0 - 1.0)
    }

    pub fn random_mat(m: usize, n: usize) -> Mat<f64> {
        Mat::from_fn(m, n, |_, _| random_value())
    }

    pub fn mul(lhs: MatRef<'_, f64>, rhs: MatRef<'_, f64>) -> Mat<f64> {
        let mut out = Mat::zeros(lhs.nrows(), rhs.ncols());
        matmul(out.as_mut(), lhs, rhs, None, 1.0, Parallelism::None);
        out
    }

    pub fn assert_mat_approx_eq(a: MatRef<'_, f64>, b: MatRef<'_, f64>) {
        assert!(a.shape() == b.shape());
        for j in 0..a.ncols() {
            for i in 0..a.nrows() {
                assert_approx_eq!(a.read(i, j), b.read(i, j), 1e-10);
            }
        }
    }

    pub const SHAPES: &[(usize, usize)] = &[
        (1, 1),
        (2, 2),
        (4, 4),
        (7, 7),
        (8, 3),
        (3, 8),
        (10, 6),
        (6, 10),
        (20, 20),
        (25, 13),
    ];

    /// `Q·R ≈ A` and `Qᵗ·Q ≈ I` in both extraction modes.
    pub fn check_reconstruction<D: QrDecomposition<f64>>(qr: &mut D, a: &Mat<f64>) {
        qr.decompose(a.as_ref()).unwrap();
        for compact in [true, false] {
            let q = qr.q(compact);
            let r = qr.r(compact);
            assert_mat_approx_eq(mul(q.as_ref(), r.as_ref()).as_ref(), a.as_ref());

            let qtq = mul(q.transpose(), q.as_ref());
            let n = q.ncols();
            assert_mat_approx_eq(qtq.as_ref(), Mat::identity(n, n).as_ref());

            for i in 0..r.nrows() {
                for j in 0..Ord::min(i, r.ncols()) {
                    assert!(r.read(i, j) == 0.0);
                }
            }
        }
    }

    /// Caller provided buffers give the same results as fresh allocations, and buffers with the
    /// wrong shape are rejected.
    pub fn check_buffers<D: QrDecomposition<f64>>(qr: &D) {
        for compact in [true, false] {
            let (qm, qn) = qr.q_shape(compact);
            let mut q = random_mat(qm, qn);
            qr.q_into(q.as_mut(), compact).unwrap();
            assert!(q == qr.q(compact));

            let (rm, rn) = qr.r_shape(compact);
            let mut r = random_mat(rm, rn);
            qr.r_into(r.as_mut(), compact).unwrap();
            assert!(r == qr.r(compact));

            for (dm, dn) in [(1, 0), (0, 1), (1, 1)] {
                let mut bad = Mat::zeros(rm + dm, rn + dn);
                assert!(matches!(
                    qr.r_into(bad.as_mut(), compact),
                    Err(LinalgError::DimensionMismatch { .. })
                ));
                let mut bad = Mat::zeros(qm + dm, qn + dn);
                assert!(matches!(
                    qr.q_into(bad.as_mut(), compact),
                    Err(LinalgError::DimensionMismatch { .. })
                ));
            }
            if rm > 0 {
                let mut bad = Mat::zeros(rm - 1, rn);
                assert!(qr.r_into(bad.as_mut(), compact).is_err());
            }
        }
    }

    /// `apply_q` and `apply_transpose_q` match products with the explicit `Q`.
    pub fn check_apply<D: QrDecomposition<f64>>(qr: &D) {
        let m = qr.nrows();
        let q = qr.q(false);
        let b = random_mat(m, 3);

        let mut qb = b.clone();
        qr.apply_q(qb.as_mut()).unwrap();
        assert_mat_approx_eq(qb.as_ref(), mul(q.as_ref(), b.as_ref()).as_ref());

        let mut qtb = b.to_layout(crate::Layout::RowMajor);
        qr.apply_transpose_q(qtb.as_mut()).unwrap();
        assert_mat_approx_eq(qtb.as_ref(), mul(q.transpose(), b.as_ref()).as_ref());

        let mut bad = Mat::zeros(m + 1, 2);
        assert!(qr.apply_q(bad.as_mut()).is_err());
        assert!(qr.apply_transpose_q(bad.as_mut()).is_err());
    }
}
