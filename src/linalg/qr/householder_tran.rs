use super::{assert_decomposed, check_apply_shape, QrDecomposition};
use crate::{
    assert,
    linalg::householder::{
        apply_householder_on_the_left, apply_householder_on_the_left_col,
        make_householder_in_place,
    },
    Layout, LinalgError, Mat, MatMut, MatRef, RealField,
};
use dyn_stack::{GlobalPodBuffer, PodStack, StackReq};
use reborrow::*;

/// Householder QR decomposition working on the transpose of the input.
///
/// The input is copied transposed into row-major storage, so that each column of the input is a
/// contiguous row of the working matrix. The reflector of step `j` is computed in place on row `j`
/// and applied to the following rows, which keeps every inner loop on contiguous memory.
///
/// # Example
/// ```
/// use qreig::linalg::qr::{HouseholderTranQr, QrDecomposition};
/// use qreig::mat;
///
/// let a = mat![[1.0f64, 2.0], [3.0, 4.0], [5.0, 6.0]];
/// let mut qr = HouseholderTranQr::new();
/// qr.decompose(a.as_ref()).unwrap();
///
/// let r = qr.r(true);
/// assert_eq!(r.read(1, 0), 0.0);
/// assert!((r.read(0, 0).abs() - 35.0f64.sqrt()).abs() < 1e-12);
/// ```
#[derive(Clone, Debug)]
pub struct HouseholderTranQr<E: RealField> {
    qr_t: Mat<E>,
    gammas: Vec<E>,
    nrows: usize,
    ncols: usize,
    decomposed: bool,
}

impl<E: RealField> Default for HouseholderTranQr<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RealField> HouseholderTranQr<E> {
    /// Creates a decomposition object with empty working storage.
    pub fn new() -> Self {
        Self {
            qr_t: Mat::zeros_with_layout(0, 0, Layout::RowMajor),
            gammas: Vec::new(),
            nrows: 0,
            ncols: 0,
            decomposed: false,
        }
    }

    /// Preallocates the working storage for matrices of up to `nrows×ncols` elements.
    pub fn set_expected_max_size(&mut self, nrows: usize, ncols: usize) {
        self.qr_t.reshape(ncols, nrows);
        self.gammas.reserve(Ord::min(nrows, ncols));
        self.decomposed = false;
    }

    /// Returns the packed result of the decomposition: $R$ on and above the diagonal, and the
    /// essential parts of the reflectors below it.
    ///
    /// # Panics
    /// Panics if no matrix has been decomposed.
    #[track_caller]
    pub fn qr(&self) -> MatRef<'_, E> {
        assert_decomposed(self.decomposed);
        self.qr_t.transpose()
    }

    #[inline]
    fn essential(&self, j: usize) -> &[E] {
        &self.qr_t.as_ref().row_as_slice(j)[j + 1..]
    }
}

impl<E: RealField> QrDecomposition<E> for HouseholderTranQr<E> {
    fn decompose(&mut self, matrix: MatRef<'_, E>) -> Result<(), LinalgError> {
        let (m, n) = matrix.shape();
        self.qr_t.reshape(n, m);
        self.qr_t.as_mut().copy_from(matrix.transpose());

        let size = Ord::min(m, n);
        self.gammas.clear();
        self.gammas.resize(size, E::zero());

        for j in 0..size {
            let (head, mut tail) = self.qr_t.as_mut().split_at_row_mut(j + 1);
            let u = &mut head.row_as_slice_mut(j)[j..];

            let householder = make_householder_in_place(u);
            self.gammas[j] = householder.gamma;
            if householder.gamma == E::zero() {
                log::debug!("zero column at step {j}, reflector is the identity");
                continue;
            }

            let essential = &u[1..];
            for k in 0..tail.nrows() {
                let row = &mut tail.rb_mut().row_as_slice_mut(k)[j..];
                apply_householder_on_the_left_col(row, essential, householder.gamma);
            }
        }

        self.nrows = m;
        self.ncols = n;
        self.decomposed = true;
        Ok(())
    }

    #[inline]
    fn input_modified(&self) -> bool {
        false
    }

    #[track_caller]
    fn nrows(&self) -> usize {
        assert_decomposed(self.decomposed);
        self.nrows
    }

    #[track_caller]
    fn ncols(&self) -> usize {
        assert_decomposed(self.decomposed);
        self.ncols
    }

    #[track_caller]
    fn gammas(&self) -> &[E] {
        assert_decomposed(self.decomposed);
        &self.gammas
    }

    #[track_caller]
    fn write_q(&self, q: MatMut<'_, E>, compact: bool) {
        let mut q = q;
        assert!(q.shape() == self.q_shape(compact));
        q.set_identity();

        let m = self.nrows;
        let qcols = q.ncols();
        let mut mem = GlobalPodBuffer::new(StackReq::new::<E>(qcols));
        for j in (0..self.gammas.len()).rev() {
            apply_householder_on_the_left(
                q.rb_mut().submatrix_mut(j, j, m - j, qcols - j),
                self.essential(j),
                self.gammas[j],
                PodStack::new(&mut mem),
            );
        }
    }

    #[track_caller]
    fn write_r(&self, r: MatMut<'_, E>, compact: bool) {
        let mut r = r;
        assert!(r.shape() == self.r_shape(compact));
        r.fill_zero();
        let qr = self.qr_t.as_ref();
        for i in 0..r.nrows() {
            for j in i..r.ncols() {
                r.write(i, j, qr.read(j, i));
            }
        }
    }

    fn apply_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError> {
        let mut b = b;
        check_apply_shape(self.nrows(), b.shape())?;

        let m = self.nrows;
        let mut mem = GlobalPodBuffer::new(StackReq::new::<E>(b.ncols()));
        for j in (0..self.gammas.len()).rev() {
            apply_householder_on_the_left(
                b.rb_mut().subrows_mut(j, m - j),
                self.essential(j),
                self.gammas[j],
                PodStack::new(&mut mem),
            );
        }
        Ok(())
    }

    fn apply_transpose_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError> {
        let mut b = b;
        check_apply_shape(self.nrows(), b.shape())?;

        let m = self.nrows;
        let mut mem = GlobalPodBuffer::new(StackReq::new::<E>(b.ncols()));
        for j in 0..self.gammas.len() {
            apply_householder_on_the_left(
                b.rb_mut().subrows_mut(j, m - j),
                self.essential(j),
                self.gammas[j],
                PodStack::new(&mut mem),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assert,
        linalg::qr::tests_common::{
            check_apply, check_buffers, check_reconstruction, random_mat, SHAPES,
        },
        mat,
    };

    #[test]
    fn test_reconstruction() {
        let mut qr = HouseholderTranQr::new();
        for &(m, n) in SHAPES {
            let a = random_mat(m, n);
            check_reconstruction(&mut qr, &a);
            check_buffers(&qr);
            check_apply(&qr);
        }
    }

    #[test]
    fn test_zero_leading_entry() {
        let a = mat![[0.0, 1.0, 2.0], [3.0, 0.0, 1.0], [4.0, 5.0, 0.0]];
        let mut qr = HouseholderTranQr::new();
        check_reconstruction(&mut qr, &a);
    }

    #[test]
    fn test_zero_column_is_tolerated() {
        let a = mat![[0.0, 1.0], [0.0, 2.0], [0.0, 3.0]];
        let mut qr = HouseholderTranQr::new();
        check_reconstruction(&mut qr, &a);
        assert!(qr.gammas()[0] == 0.0);
        assert!(qr.r(true).read(0, 0) == 0.0);
    }

    #[test]
    fn test_storage_is_reused() {
        let mut qr = HouseholderTranQr::<f64>::new();
        qr.set_expected_max_size(10, 10);
        check_reconstruction(&mut qr, &random_mat(10, 4));
        check_reconstruction(&mut qr, &random_mat(3, 7));
        assert!(qr.qr().shape() == (3, 7));
        assert!(qr.gammas().len() == 3);
    }

    #[test]
    fn test_empty() {
        let mut qr = HouseholderTranQr::<f64>::new();
        qr.decompose(Mat::zeros(0, 0).as_ref()).unwrap();
        assert!(qr.q(true).shape() == (0, 0));
        assert!(qr.r(false).shape() == (0, 0));
    }

    #[test]
    #[should_panic]
    fn test_extract_before_decompose() {
        let qr = HouseholderTranQr::<f64>::new();
        let _ = qr.q(true);
    }
}
