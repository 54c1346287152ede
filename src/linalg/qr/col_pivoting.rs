//! Column pivoting QR decomposition.
//!
//! At each step, the remaining column with the largest norm (restricted to the rows that have not
//! been processed yet) is swapped to the front before its reflector is computed. The resulting
//! factorization is $AP = QR$, where the diagonal of $R$ is non-increasing in absolute value.
//!
//! The squared column norms are computed once, then downdated after each step by the square of
//! the element that moved into the processed rows. Downdating loses precision, so if any norm
//! becomes negative they are all recomputed from the remaining rows.
//!
//! The decomposition stops as soon as the largest remaining column is negligible, that is when
//! the new diagonal element satisfies $|r_{jj}| \le \varepsilon \max_{ij} |a_{ij}|$, where
//! $\varepsilon$ is the singular threshold. The number of reflectors computed up to that point is
//! the numerical rank of the matrix.

use super::{householder_col::HouseholderColQr, QrDecomposition, QrpDecomposition};
use crate::{linalg::reductions::norm_max, LinalgError, MatMut, MatRef, RealField};

/// Tuning parameters of [`ColPivHouseholderQr`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct ColPivQrParams<E> {
    /// Relative threshold below which a pivot is considered zero. `None` uses the machine
    /// epsilon.
    pub singular_threshold: Option<E>,
}

impl<E> Default for ColPivQrParams<E> {
    #[inline]
    fn default() -> Self {
        Self {
            singular_threshold: None,
        }
    }
}

/// Householder QR decomposition with column pivoting.
#[derive(Clone, Debug)]
pub struct ColPivHouseholderQr<E: RealField> {
    inner: HouseholderColQr<E>,
    pivots: Vec<usize>,
    norms: Vec<E>,
    saved: Vec<E>,
    rank: usize,
    singular_threshold: E,
}

impl<E: RealField> Default for ColPivHouseholderQr<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RealField> ColPivHouseholderQr<E> {
    /// Creates a decomposition object with the default parameters.
    pub fn new() -> Self {
        Self::with_params(ColPivQrParams::default())
    }

    /// Creates a decomposition object with the given parameters.
    pub fn with_params(params: ColPivQrParams<E>) -> Self {
        Self {
            inner: HouseholderColQr::new(),
            pivots: Vec::new(),
            norms: Vec::new(),
            saved: Vec::new(),
            rank: 0,
            singular_threshold: params.singular_threshold.unwrap_or(E::EPSILON),
        }
    }

    /// Preallocates the working storage for matrices of up to `nrows×ncols` elements.
    pub fn set_expected_max_size(&mut self, nrows: usize, ncols: usize) {
        self.inner.set_expected_max_size(nrows, ncols);
        self.pivots.reserve(ncols);
        self.norms.reserve(ncols);
    }

    /// Returns a copy of the packed result of the decomposition, with the columns in pivoted
    /// order.
    ///
    /// # Panics
    /// Panics if no matrix has been decomposed.
    #[track_caller]
    pub fn qr(&self) -> crate::Mat<E> {
        self.inner.qr()
    }

    fn setup_pivots(&mut self) {
        let (m, n) = (self.inner.nrows, self.inner.ncols);
        self.pivots.clear();
        self.pivots.extend(0..n);
        self.norms.clear();
        self.norms.extend(
            self.inner.columns[..n]
                .iter()
                .map(|col| col[..m].iter().fold(E::zero(), |acc, &v| acc + v * v)),
        );
    }

    fn update_norms(&mut self, j: usize) {
        let (m, n) = (self.inner.nrows, self.inner.ncols);
        let mut found_negative = false;
        for col in j..n {
            let e = self.inner.columns[col][j - 1];
            self.norms[col] -= e * e;
            if self.norms[col] < E::zero() {
                found_negative = true;
                break;
            }
        }

        if found_negative {
            log::trace!("column norm downdate went negative at step {j}, recomputing");
            for col in j..n {
                self.norms[col] = self.inner.columns[col][j..m]
                    .iter()
                    .fold(E::zero(), |acc, &v| acc + v * v);
            }
        }
    }

    fn swap_columns(&mut self, j: usize) {
        let n = self.inner.ncols;
        let mut largest = j;
        let mut largest_norm = self.norms[j];
        for col in j + 1..n {
            if self.norms[col] > largest_norm {
                largest_norm = self.norms[col];
                largest = col;
            }
        }
        self.inner.columns.swap(j, largest);
        self.norms.swap(j, largest);
        self.pivots.swap(j, largest);
    }
}

impl<E: RealField> QrDecomposition<E> for ColPivHouseholderQr<E> {
    fn decompose(&mut self, matrix: MatRef<'_, E>) -> Result<(), LinalgError> {
        self.inner.load(matrix);
        let max_abs = norm_max(matrix);
        self.setup_pivots();
        self.rank = 0;

        for j in 0..self.inner.gammas.len() {
            if j > 0 {
                self.update_norms(j);
            }
            self.swap_columns(j);

            let m = self.inner.nrows;
            self.saved.clear();
            self.saved.extend_from_slice(&self.inner.columns[j][j..m]);

            let householder = self.inner.householder(j);
            if householder.gamma == E::zero()
                || householder.beta.abs() <= self.singular_threshold * max_abs
            {
                // the rejected reflector is not part of the factorization
                self.inner.columns[j][j..m].copy_from_slice(&self.saved);
                log::debug!("column pivoting QR stopped at rank {j}");
                break;
            }
            self.inner.gammas[j] = householder.gamma;
            self.inner.update(j, householder.gamma);
            self.rank = j + 1;
        }

        self.inner.decomposed = true;
        Ok(())
    }

    #[inline]
    fn input_modified(&self) -> bool {
        false
    }

    #[track_caller]
    fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    #[track_caller]
    fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    /// Returns the scale factors of the reflectors. The factors past
    /// [`rank`](QrpDecomposition::rank) are zero.
    #[track_caller]
    fn gammas(&self) -> &[E] {
        self.inner.gammas()
    }

    #[track_caller]
    fn write_q(&self, q: MatMut<'_, E>, compact: bool) {
        self.inner.write_q(q, compact)
    }

    #[track_caller]
    fn write_r(&self, r: MatMut<'_, E>, compact: bool) {
        self.inner.write_r(r, compact)
    }

    fn apply_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError> {
        self.inner.apply_q(b)
    }

    fn apply_transpose_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError> {
        self.inner.apply_transpose_q(b)
    }
}

impl<E: RealField> QrpDecomposition<E> for ColPivHouseholderQr<E> {
    #[track_caller]
    fn rank(&self) -> usize {
        super::assert_decomposed(self.inner.decomposed);
        self.rank
    }

    #[track_caller]
    fn pivots(&self) -> &[usize] {
        super::assert_decomposed(self.inner.decomposed);
        &self.pivots
    }
}
