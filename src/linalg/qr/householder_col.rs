use super::{assert_decomposed, check_apply_shape, QrDecomposition};
use crate::{
    assert,
    linalg::householder::{
        apply_householder_on_the_left, apply_householder_on_the_left_col,
        make_householder_in_place, Householder,
    },
    LinalgError, Mat, MatMut, MatRef, RealField,
};
use dyn_stack::{GlobalPodBuffer, PodStack, StackReq};
use reborrow::*;

/// Householder QR decomposition storing the working matrix as one vector per column.
///
/// Each column is owned separately, so exchanging two columns is a pointer swap, which the
/// pivoting variant [`ColPivHouseholderQr`](super::ColPivHouseholderQr) relies on. Column vectors
/// grow to the largest matrix decomposed so far and are never shrunk.
#[derive(Clone, Debug)]
pub struct HouseholderColQr<E: RealField> {
    pub(super) columns: Vec<Vec<E>>,
    pub(super) gammas: Vec<E>,
    pub(super) nrows: usize,
    pub(super) ncols: usize,
    pub(super) decomposed: bool,
}

impl<E: RealField> Default for HouseholderColQr<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RealField> HouseholderColQr<E> {
    /// Creates a decomposition object with empty working storage.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            gammas: Vec::new(),
            nrows: 0,
            ncols: 0,
            decomposed: false,
        }
    }

    /// Preallocates the working storage for matrices of up to `nrows×ncols` elements.
    pub fn set_expected_max_size(&mut self, nrows: usize, ncols: usize) {
        if self.columns.len() < ncols {
            self.columns.resize_with(ncols, Vec::new);
        }
        for col in self.columns.iter_mut() {
            if col.len() < nrows {
                col.resize(nrows, E::zero());
            }
        }
        self.gammas.reserve(Ord::min(nrows, ncols));
        self.decomposed = false;
    }

    /// Returns column `j` of the packed result: $R$ on and above the diagonal, and the
    /// essential part of reflector `j` below it.
    ///
    /// # Panics
    /// Panics if no matrix has been decomposed, or if `j >= self.ncols()`.
    #[track_caller]
    pub fn column(&self, j: usize) -> &[E] {
        assert_decomposed(self.decomposed);
        assert!(j < self.ncols);
        &self.columns[j][..self.nrows]
    }

    /// Returns a copy of the packed result of the decomposition.
    ///
    /// # Panics
    /// Panics if no matrix has been decomposed.
    #[track_caller]
    pub fn qr(&self) -> Mat<E> {
        assert_decomposed(self.decomposed);
        Mat::from_fn(self.nrows, self.ncols, |i, j| self.columns[j][i])
    }

    /// Copies `matrix` into the column storage, growing it if needed.
    pub(super) fn load(&mut self, matrix: MatRef<'_, E>) {
        let (m, n) = matrix.shape();
        self.set_expected_max_size(m, n);
        for (j, col) in self.columns[..n].iter_mut().enumerate() {
            for (i, v) in col[..m].iter_mut().enumerate() {
                *v = matrix.read(i, j);
            }
        }
        self.nrows = m;
        self.ncols = n;
        self.gammas.clear();
        self.gammas.resize(Ord::min(m, n), E::zero());
    }

    /// Computes the reflector of step `j` in place, from the elements of column `j` on and below
    /// the diagonal.
    #[inline]
    pub(super) fn householder(&mut self, j: usize) -> Householder<E> {
        let m = self.nrows;
        make_householder_in_place(&mut self.columns[j][j..m])
    }

    /// Applies reflector `j` with scale factor `gamma` to the columns on its right.
    pub(super) fn update(&mut self, j: usize, gamma: E) {
        if gamma == E::zero() {
            return;
        }
        let (m, n) = (self.nrows, self.ncols);
        let (left, right) = self.columns.split_at_mut(j + 1);
        let essential = &left[j][j + 1..m];
        for col in right[..n - j - 1].iter_mut() {
            apply_householder_on_the_left_col(&mut col[j..m], essential, gamma);
        }
    }

    #[inline]
    fn essential(&self, j: usize) -> &[E] {
        &self.columns[j][j + 1..self.nrows]
    }

    fn apply_reflectors(&self, b: MatMut<'_, E>, reverse: bool) {
        let mut b = b;
        let m = self.nrows;
        let mut mem = GlobalPodBuffer::new(StackReq::new::<E>(b.ncols()));
        let mut apply = |j: usize| {
            apply_householder_on_the_left(
                b.rb_mut().subrows_mut(j, m - j),
                self.essential(j),
                self.gammas[j],
                PodStack::new(&mut mem),
            )
        };
        if reverse {
            (0..self.gammas.len()).rev().for_each(&mut apply);
        } else {
            (0..self.gammas.len()).for_each(&mut apply);
        }
    }
}

impl<E: RealField> QrDecomposition<E> for HouseholderColQr<E> {
    fn decompose(&mut self, matrix: MatRef<'_, E>) -> Result<(), LinalgError> {
        self.load(matrix);
        for j in 0..self.gammas.len() {
            let householder = self.householder(j);
            self.gammas[j] = householder.gamma;
            if householder.gamma == E::zero() {
                log::debug!("zero column at step {j}, reflector is the identity");
            }
            self.update(j, householder.gamma);
        }
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
        for (j, col) in self.columns[..self.ncols].iter().enumerate() {
            for (i, &v) in col[..Ord::min(j + 1, r.nrows())].iter().enumerate() {
                r.write(i, j, v);
            }
        }
    }

    fn apply_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError> {
        check_apply_shape(self.nrows(), b.shape())?;
        self.apply_reflectors(b, true);
        Ok(())
    }

    fn apply_transpose_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError> {
        check_apply_shape(self.nrows(), b.shape())?;
        self.apply_reflectors(b, false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assert,
        linalg::qr::{
            tests_common::{check_apply, check_buffers, check_reconstruction, random_mat, SHAPES},
            HouseholderTranQr,
        },
        mat,
    };

    #[test]
    fn test_reconstruction() {
        let mut qr = HouseholderColQr::new();
        for &(m, n) in SHAPES {
            let a = random_mat(m, n);
            check_reconstruction(&mut qr, &a);
            check_buffers(&qr);
            check_apply(&qr);
        }
    }

    #[test]
    fn test_matches_transposed_storage() {
        let mut col = HouseholderColQr::new();
        let mut tran = HouseholderTranQr::new();
        for &(m, n) in SHAPES {
            let a = random_mat(m, n);
            col.decompose(a.as_ref()).unwrap();
            tran.decompose(a.as_ref()).unwrap();
            assert!(col.gammas() == tran.gammas());
            assert!(col.qr() == tran.qr().to_owned());
        }
    }

    #[test]
    fn test_zero_leading_entry() {
        let a = mat![[0.0, 2.0], [0.0, 1.0], [3.0, 0.0], [1.0, 1.0]];
        let mut qr = HouseholderColQr::new();
        check_reconstruction(&mut qr, &a);
    }

    #[test]
    fn test_storage_grows_lazily() {
        let mut qr = HouseholderColQr::<f64>::new();
        check_reconstruction(&mut qr, &random_mat(4, 3));
        check_reconstruction(&mut qr, &random_mat(9, 6));
        check_reconstruction(&mut qr, &random_mat(2, 5));
        assert!(qr.columns.len() == 6);
        assert!(qr.columns.iter().all(|c| c.len() == 9));
        assert!(qr.column(4).len() == 2);
    }
}
