//! Reduction of a square matrix to upper Hessenberg form.
//!
//! The matrix $A$ is decomposed as $A = QHQ^T$, where $Q$ is orthogonal and $H$ is zero below its
//! first subdiagonal. $Q$ is stored as the product of $n - 2$ Householder reflectors
//! $H_0 H_1 \dots H_{n-3}$, where reflector $k$ zeroes column $k$ below row $k + 1$. Since this is
//! a similarity transform, each reflector is applied on both sides of the trailing part of the
//! matrix.
//!
//! The packed result keeps $H$ on and above the first subdiagonal, and the essential part of
//! reflector $k$ in column $k$ below the first subdiagonal.

use crate::{
    assert, check_shape,
    linalg::householder::{
        apply_householder_on_the_left, apply_householder_on_the_left_req,
        apply_householder_on_the_right, apply_householder_on_the_right_req,
        make_householder_in_place,
    },
    LinalgError, Mat, MatMut, MatRef, RealField,
};
use dyn_stack::{GlobalPodBuffer, PodStack, SizeOverflow, StackReq};
use reborrow::*;

/// Computes the size and alignment of required workspace for reducing an `n×n` matrix to
/// Hessenberg form with [`make_hessenberg_in_place`].
pub fn make_hessenberg_in_place_req<E: RealField>(n: usize) -> Result<StackReq, SizeOverflow> {
    StackReq::try_any_of([
        apply_householder_on_the_left_req::<E>(n)?,
        apply_householder_on_the_right_req::<E>(n)?,
    ])
}

/// Reduces `matrix` to upper Hessenberg form in place.
///
/// On output, `matrix` holds the packed result described in the [module level
/// documentation](self), and `gammas` the scale factors of the reflectors.
///
/// # Panics
/// Panics if `matrix` is not square, if its rows are not contiguous, or if
/// `gammas.len() != n.saturating_sub(2)`.
#[track_caller]
pub fn make_hessenberg_in_place<E: RealField>(
    matrix: MatMut<'_, E>,
    gammas: &mut [E],
    stack: PodStack<'_>,
) {
    let mut matrix = matrix;
    let mut stack = stack;
    let n = matrix.nrows();
    assert!(all(
        matrix.ncols() == n,
        gammas.len() == n.saturating_sub(2),
        any(n == 0, matrix.row_stride() == 1),
    ));

    for k in 0..n.saturating_sub(2) {
        let (left, mut right) = matrix.rb_mut().split_at_col_mut(k + 1);
        let col = &mut left.col_as_slice_mut(k)[k + 1..];

        let householder = make_householder_in_place(col);
        gammas[k] = householder.gamma;
        let essential = &col[1..];

        apply_householder_on_the_left(
            right.rb_mut().subrows_mut(k + 1, n - k - 1),
            essential,
            householder.gamma,
            stack.rb_mut(),
        );
        apply_householder_on_the_right(right, essential, householder.gamma, stack.rb_mut());
    }
}

/// Hessenberg decomposition $A = QHQ^T$ of a square matrix.
///
/// The working storage is a column-major copy of the input, grown to the largest matrix
/// decomposed so far.
#[derive(Clone, Debug)]
pub struct HessenbergDecomposition<E: RealField> {
    qh: Mat<E>,
    gammas: Vec<E>,
    decomposed: bool,
}

impl<E: RealField> Default for HessenbergDecomposition<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RealField> HessenbergDecomposition<E> {
    /// Creates a decomposition object with empty working storage.
    pub fn new() -> Self {
        Self {
            qh: Mat::new(),
            gammas: Vec::new(),
            decomposed: false,
        }
    }

    /// Decomposes `matrix`, overwriting the result of any previous decomposition.
    ///
    /// Returns [`LinalgError::NotSquare`] if `matrix` is not square.
    pub fn decompose(&mut self, matrix: MatRef<'_, E>) -> Result<(), LinalgError> {
        let (m, n) = matrix.shape();
        if m != n {
            return Err(LinalgError::NotSquare { nrows: m, ncols: n });
        }

        self.qh.reshape(n, n);
        self.qh.as_mut().copy_from(matrix);
        self.gammas.clear();
        self.gammas.resize(n.saturating_sub(2), E::zero());

        let mut mem = GlobalPodBuffer::new(StackReq::new::<E>(n));
        make_hessenberg_in_place(self.qh.as_mut(), &mut self.gammas, PodStack::new(&mut mem));

        self.decomposed = true;
        Ok(())
    }

    /// Returns `false`: the input is copied before being reduced.
    #[inline]
    pub fn input_modified(&self) -> bool {
        false
    }

    /// Returns the dimension of the decomposed matrix.
    ///
    /// # Panics
    /// Panics if no matrix has been decomposed.
    #[track_caller]
    pub fn dim(&self) -> usize {
        assert!(self.decomposed);
        self.qh.nrows()
    }

    /// Returns the scale factors of the reflectors.
    ///
    /// # Panics
    /// Panics if no matrix has been decomposed.
    #[track_caller]
    pub fn gammas(&self) -> &[E] {
        assert!(self.decomposed);
        &self.gammas
    }

    /// Returns the packed result of the decomposition.
    ///
    /// # Panics
    /// Panics if no matrix has been decomposed.
    #[track_caller]
    pub fn qh(&self) -> MatRef<'_, E> {
        assert!(self.decomposed);
        self.qh.as_ref()
    }

    /// Writes $H$ into `h`, with zeros below the first subdiagonal.
    ///
    /// Returns [`LinalgError::DimensionMismatch`] if `h` is not `n×n`.
    #[track_caller]
    pub fn h_into(&self, h: MatMut<'_, E>) -> Result<(), LinalgError> {
        let n = self.dim();
        check_shape((n, n), h.shape())?;
        self.write_h(h);
        Ok(())
    }

    /// Returns a newly allocated $H$.
    #[track_caller]
    pub fn h(&self) -> Mat<E> {
        let n = self.dim();
        let mut h = Mat::zeros(n, n);
        self.write_h(h.as_mut());
        h
    }

    /// Writes $Q$ into `q`.
    ///
    /// Returns [`LinalgError::DimensionMismatch`] if `q` is not `n×n`.
    #[track_caller]
    pub fn q_into(&self, q: MatMut<'_, E>) -> Result<(), LinalgError> {
        let n = self.dim();
        check_shape((n, n), q.shape())?;
        self.write_q(q);
        Ok(())
    }

    /// Returns a newly allocated $Q$.
    #[track_caller]
    pub fn q(&self) -> Mat<E> {
        let n = self.dim();
        let mut q = Mat::zeros(n, n);
        self.write_q(q.as_mut());
        q
    }

    fn write_h(&self, h: MatMut<'_, E>) {
        let mut h = h;
        let n = self.qh.nrows();
        h.fill_zero();
        for j in 0..n {
            for i in 0..Ord::min(j + 2, n) {
                h.write(i, j, self.qh.read(i, j));
            }
        }
    }

    fn write_q(&self, q: MatMut<'_, E>) {
        let mut q = q;
        let n = self.qh.nrows();
        q.set_identity();

        let mut mem = GlobalPodBuffer::new(StackReq::new::<E>(n));
        for k in (0..self.gammas.len()).rev() {
            apply_householder_on_the_left(
                q.rb_mut().submatrix_mut(k + 1, k + 1, n - k - 1, n - k - 1),
                self.essential(k),
                self.gammas[k],
                PodStack::new(&mut mem),
            );
        }
    }

    /// Computes $B \gets QB$ without forming $Q$.
    ///
    /// Returns [`LinalgError::DimensionMismatch`] if `b` does not have `n` rows.
    #[track_caller]
    pub fn apply_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError> {
        let mut b = b;
        let n = self.dim();
        check_shape((n, b.ncols()), b.shape())?;

        let mut mem = GlobalPodBuffer::new(StackReq::new::<E>(b.ncols()));
        for k in (0..self.gammas.len()).rev() {
            apply_householder_on_the_left(
                b.rb_mut().subrows_mut(k + 1, n - k - 1),
                self.essential(k),
                self.gammas[k],
                PodStack::new(&mut mem),
            );
        }
        Ok(())
    }

    #[inline]
    fn essential(&self, k: usize) -> &[E] {
        &self.qh.as_ref().col_as_slice(k)[k + 2..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assert,
        linalg::qr::tests_common::{assert_mat_approx_eq, mul, random_mat},
        mat,
    };

    macro_rules! make_stack {
        ($req: expr $(,)?) => {
            ::dyn_stack::PodStack::new(&mut ::dyn_stack::GlobalPodBuffer::new($req.unwrap()))
        };
    }

    const DIMS: &[usize] = &[0, 1, 2, 3, 4, 5, 10, 17];

    #[test]
    fn test_similarity() {
        let mut hess = HessenbergDecomposition::new();
        for &n in DIMS {
            let a = random_mat(n, n);
            hess.decompose(a.as_ref()).unwrap();

            let q = hess.q();
            let h = hess.h();
            let qt_a_q = mul(mul(q.transpose(), a.as_ref()).as_ref(), q.as_ref());
            assert_mat_approx_eq(qt_a_q.as_ref(), h.as_ref());
            assert_mat_approx_eq(
                mul(q.transpose(), q.as_ref()).as_ref(),
                Mat::identity(n, n).as_ref(),
            );

            for j in 0..n {
                for i in j + 2..n {
                    assert!(h.read(i, j) == 0.0);
                }
            }
        }
    }

    #[test]
    fn test_kernel_matches_object() {
        let n = 7;
        let a = random_mat(n, n);
        let mut packed = a.clone();
        let mut gammas = vec![0.0; n - 2];
        make_hessenberg_in_place(
            packed.as_mut(),
            &mut gammas,
            make_stack!(make_hessenberg_in_place_req::<f64>(n)),
        );

        let mut hess = HessenbergDecomposition::new();
        hess.decompose(a.as_ref()).unwrap();
        assert!(hess.gammas() == &*gammas);
        assert!(hess.qh().to_owned() == packed);
    }

    #[test]
    fn test_apply_q() {
        let n = 6;
        let a = random_mat(n, n);
        let mut hess = HessenbergDecomposition::new();
        hess.decompose(a.as_ref()).unwrap();

        let b = random_mat(n, 3);
        let mut qb = b.clone();
        hess.apply_q(qb.as_mut()).unwrap();
        assert_mat_approx_eq(qb.as_ref(), mul(hess.q().as_ref(), b.as_ref()).as_ref());

        let mut wrong = Mat::zeros(n + 1, 3);
        assert!(
            hess.apply_q(wrong.as_mut())
                == Err(LinalgError::DimensionMismatch {
                    expected: (n, 3),
                    found: (n + 1, 3),
                })
        );
    }

    #[test]
    fn test_buffers() {
        let a = mat![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 10.0]];
        let mut hess = HessenbergDecomposition::new();
        hess.decompose(a.as_ref()).unwrap();
        assert!(!hess.input_modified());

        let mut h = Mat::zeros(3, 3);
        hess.h_into(h.as_mut()).unwrap();
        assert!(h == hess.h());

        let mut q = Mat::zeros(3, 3);
        hess.q_into(q.as_mut()).unwrap();
        assert!(q == hess.q());

        let mut wrong = Mat::zeros(3, 2);
        assert!(hess.h_into(wrong.as_mut()).is_err());
        assert!(hess.q_into(wrong.as_mut()).is_err());
    }

    #[test]
    fn test_not_square() {
        let mut hess = HessenbergDecomposition::<f64>::new();
        assert!(
            hess.decompose(Mat::zeros(3, 4).as_ref())
                == Err(LinalgError::NotSquare { nrows: 3, ncols: 4 })
        );
    }

    #[test]
    fn test_zero_column() {
        let a = mat![
            [1.0, 2.0, 3.0, 4.0],
            [0.0, 1.0, 2.0, 3.0],
            [0.0, 5.0, 1.0, 2.0],
            [0.0, 6.0, 7.0, 1.0],
        ];
        let mut hess = HessenbergDecomposition::new();
        hess.decompose(a.as_ref()).unwrap();
        assert!(hess.gammas()[0] == 0.0);

        let q = hess.q();
        let qt_a_q = mul(mul(q.transpose(), a.as_ref()).as_ref(), q.as_ref());
        assert_mat_approx_eq(qt_a_q.as_ref(), hess.h().as_ref());
    }
}
