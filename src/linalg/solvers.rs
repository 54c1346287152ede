//! Linear solvers built on the QR decompositions.
//!
//! A solver is given the system matrix once with [`LinearSolver::set_a`], which factorizes it, and
//! can then solve for any number of right hand sides with [`LinearSolver::solve`]. Scratch
//! matrices are kept between calls and only grow.
//!
//! Some solvers use their inputs as workspace, which they report with
//! [`LinearSolver::modifies_a`] and [`LinearSolver::modifies_b`]. [`SafeSolver`] wraps such a
//! solver and copies the inputs first.

use crate::{
    assert,
    linalg::{
        qr::{
            ColPivHouseholderQr, ColPivQrParams, HouseholderColQr, QrDecomposition,
            QrpDecomposition,
        },
        reductions::quality_triangular,
        triangular_solve::solve_upper_in_place,
    },
    check_shape, LinalgError, Mat, MatMut, MatRef, RealField, Tolerance,
};
use reborrow::*;

/// Interface of the solvers of `A·X = B`.
pub trait LinearSolver<E: RealField> {
    /// Sets the system matrix, and computes its decomposition.
    fn set_a(&mut self, a: MatRef<'_, E>) -> Result<(), LinalgError>;

    /// Solves `A·X = B` for the matrix given to [`set_a`](LinearSolver::set_a), storing the
    /// result in `x`.
    ///
    /// `b` must have as many rows as `A`, and `x` must have shape `A.ncols()×B.ncols()`.
    /// If [`modifies_b`](LinearSolver::modifies_b) returns `true`, the contents of `b` are
    /// unspecified after the call.
    ///
    /// # Panics
    /// Panics if [`set_a`](LinearSolver::set_a) has not been called successfully.
    fn solve(&mut self, b: MatMut<'_, E>, x: MatMut<'_, E>) -> Result<(), LinalgError>;

    /// Computes the inverse of the square matrix given to [`set_a`](LinearSolver::set_a).
    ///
    /// # Panics
    /// Panics if [`set_a`](LinearSolver::set_a) has not been called successfully.
    fn invert(&mut self, inv: MatMut<'_, E>) -> Result<(), LinalgError>;

    /// Returns a scale invariant indicator of how close the system matrix is to being singular,
    /// see [`quality_triangular`]. Smaller is worse.
    fn quality(&self) -> E;

    /// Returns `true` if [`set_a`](LinearSolver::set_a) may use the storage of its input.
    fn modifies_a(&self) -> bool;

    /// Returns `true` if [`solve`](LinearSolver::solve) may overwrite `b`.
    fn modifies_b(&self) -> bool;
}

#[track_caller]
fn assert_a_set(a_set: bool) {
    assert!(a_set);
}

fn check_solve_shapes(
    a: (usize, usize),
    b: (usize, usize),
    x: (usize, usize),
) -> Result<(), LinalgError> {
    check_shape((a.0, b.1), b)?;
    check_shape((a.1, b.1), x)
}

fn check_invert_shapes(a: (usize, usize), inv: (usize, usize)) -> Result<(), LinalgError> {
    if a.0 != a.1 {
        return Err(LinalgError::NotSquare {
            nrows: a.0,
            ncols: a.1,
        });
    }
    check_shape((a.1, a.0), inv)
}

/// Solver of square or overdetermined systems through a QR decomposition.
///
/// With $A = QR$, the solution is $X = R^{-1} Q^T B$. $Q^T$ is applied to `b` in place through the
/// stored reflectors, then the top `n` rows are back-substituted against $R$. For an
/// overdetermined system this is the least squares solution.
///
/// The decomposition is a type parameter, so any [`QrDecomposition`] can be used.
///
/// # Example
/// ```
/// use qreig::linalg::qr::HouseholderTranQr;
/// use qreig::linalg::solvers::{LinearSolver, QrSolver};
/// use qreig::{mat, Mat};
///
/// let a = mat![[5.0f64, 2.0, 3.0], [1.5, -2.0, 8.0], [-3.0, 4.7, -0.5]];
/// let mut b = mat![[18.0], [21.5], [4.9]];
/// let mut x = Mat::zeros(3, 1);
///
/// let mut solver = QrSolver::new(HouseholderTranQr::new());
/// solver.set_a(a.as_ref()).unwrap();
/// solver.solve(b.as_mut(), x.as_mut()).unwrap();
///
/// assert!((x.read(2, 0) - 3.0).abs() < 1e-10);
/// ```
#[derive(Clone, Debug)]
pub struct QrSolver<E: RealField, D: QrDecomposition<E>> {
    decomposition: D,
    r: Mat<E>,
    tolerance: Tolerance<E>,
    shape: (usize, usize),
    a_set: bool,
}

impl<E: RealField> Default for QrSolver<E, HouseholderColQr<E>> {
    fn default() -> Self {
        Self::new(HouseholderColQr::new())
    }
}

impl<E: RealField, D: QrDecomposition<E>> QrSolver<E, D> {
    /// Creates a solver using the given decomposition, and the machine tolerance for the
    /// singularity check of $R$.
    pub fn new(decomposition: D) -> Self {
        Self::with_tolerance(decomposition, Tolerance::machine())
    }

    /// Creates a solver using the given decomposition and tolerance.
    pub fn with_tolerance(decomposition: D, tolerance: Tolerance<E>) -> Self {
        Self {
            decomposition,
            r: Mat::new(),
            tolerance,
            shape: (0, 0),
            a_set: false,
        }
    }

    /// Returns the underlying decomposition.
    #[inline]
    pub fn decomposition(&self) -> &D {
        &self.decomposition
    }
}

impl<E: RealField, D: QrDecomposition<E>> LinearSolver<E> for QrSolver<E, D> {
    fn set_a(&mut self, a: MatRef<'_, E>) -> Result<(), LinalgError> {
        let (m, n) = a.shape();
        self.a_set = false;
        if m < n {
            return Err(LinalgError::Underdetermined { nrows: m, ncols: n });
        }

        self.decomposition.decompose(a)?;
        self.r.reshape(n, n);
        self.decomposition.r_into(self.r.as_mut(), true)?;
        self.shape = (m, n);
        self.a_set = true;
        Ok(())
    }

    #[track_caller]
    fn solve(&mut self, b: MatMut<'_, E>, x: MatMut<'_, E>) -> Result<(), LinalgError> {
        let mut b = b;
        let mut x = x;
        assert_a_set(self.a_set);
        check_solve_shapes(self.shape, b.shape(), x.shape())?;

        let n = self.shape.1;
        self.decomposition.apply_transpose_q(b.rb_mut())?;
        x.copy_from(b.rb().subrows(0, n));
        solve_upper_in_place(self.r.as_ref(), x.rb_mut(), self.tolerance)
    }

    #[track_caller]
    fn invert(&mut self, inv: MatMut<'_, E>) -> Result<(), LinalgError> {
        assert_a_set(self.a_set);
        check_invert_shapes(self.shape, inv.shape())?;
        let n = self.shape.0;
        let mut identity = Mat::identity(n, n);
        self.solve(identity.as_mut(), inv)
    }

    fn quality(&self) -> E {
        quality_triangular(self.r.as_ref())
    }

    #[inline]
    fn modifies_a(&self) -> bool {
        self.decomposition.input_modified()
    }

    #[inline]
    fn modifies_b(&self) -> bool {
        true
    }
}

/// Solver through a column pivoting QR decomposition, $AP = QR$.
///
/// Only the first `rank` columns of $AP$ are used, and the remaining unknowns are set to zero.
/// The result is a basic solution: it solves full rank systems, and gives the least squares
/// solution of overdetermined or rank deficient ones, though not the one of minimum norm.
#[derive(Clone, Debug)]
pub struct QrpSolver<E: RealField> {
    decomposition: ColPivHouseholderQr<E>,
    r: Mat<E>,
    y: Mat<E>,
    tolerance: Tolerance<E>,
    shape: (usize, usize),
    a_set: bool,
}

impl<E: RealField> Default for QrpSolver<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RealField> QrpSolver<E> {
    /// Creates a solver with the default pivoting parameters.
    pub fn new() -> Self {
        Self::with_params(ColPivQrParams::default())
    }

    /// Creates a solver with the given pivoting parameters.
    pub fn with_params(params: ColPivQrParams<E>) -> Self {
        Self {
            decomposition: ColPivHouseholderQr::with_params(params),
            r: Mat::new(),
            y: Mat::new(),
            tolerance: Tolerance::machine(),
            shape: (0, 0),
            a_set: false,
        }
    }

    /// Returns the underlying decomposition.
    #[inline]
    pub fn decomposition(&self) -> &ColPivHouseholderQr<E> {
        &self.decomposition
    }

    /// Returns the numerical rank of the system matrix.
    ///
    /// # Panics
    /// Panics if [`set_a`](LinearSolver::set_a) has not been called successfully.
    #[track_caller]
    pub fn rank(&self) -> usize {
        assert_a_set(self.a_set);
        self.decomposition.rank()
    }
}

impl<E: RealField> LinearSolver<E> for QrpSolver<E> {
    fn set_a(&mut self, a: MatRef<'_, E>) -> Result<(), LinalgError> {
        let (m, n) = a.shape();
        self.a_set = false;
        self.decomposition.decompose(a)?;
        self.r.reshape(Ord::min(m, n), n);
        self.decomposition.r_into(self.r.as_mut(), true)?;
        self.shape = (m, n);
        self.a_set = true;
        Ok(())
    }

    #[track_caller]
    fn solve(&mut self, b: MatMut<'_, E>, x: MatMut<'_, E>) -> Result<(), LinalgError> {
        let mut x = x;
        assert_a_set(self.a_set);
        check_solve_shapes(self.shape, b.shape(), x.shape())?;

        let k = b.ncols();
        self.y.reshape(b.nrows(), k);
        self.y.as_mut().copy_from(b.rb());
        self.decomposition.apply_transpose_q(self.y.as_mut())?;

        let rank = self.decomposition.rank();
        let mut z = self.y.as_mut().subrows_mut(0, rank);
        solve_upper_in_place(
            self.r.as_ref().submatrix(0, 0, rank, rank),
            z.rb_mut(),
            self.tolerance,
        )?;

        x.fill_zero();
        for (i, &pivot) in self.decomposition.pivots()[..rank].iter().enumerate() {
            for j in 0..k {
                x.write(pivot, j, z.read(i, j));
            }
        }
        Ok(())
    }

    #[track_caller]
    fn invert(&mut self, inv: MatMut<'_, E>) -> Result<(), LinalgError> {
        assert_a_set(self.a_set);
        check_invert_shapes(self.shape, inv.shape())?;
        let n = self.shape.0;
        let mut identity = Mat::identity(n, n);
        self.solve(identity.as_mut(), inv)
    }

    fn quality(&self) -> E {
        let size = Ord::min(self.r.nrows(), self.r.ncols());
        quality_triangular(self.r.as_ref().submatrix(0, 0, size, size))
    }

    #[inline]
    fn modifies_a(&self) -> bool {
        false
    }

    #[inline]
    fn modifies_b(&self) -> bool {
        false
    }
}

/// Wrapper that copies the inputs of a solver that would otherwise modify them.
///
/// The copies are only made when the inner solver reports that it needs them, and the scratch
/// storage is reused between calls.
#[derive(Clone, Debug)]
pub struct SafeSolver<E: RealField, S: LinearSolver<E>> {
    inner: S,
    a: Mat<E>,
    b: Mat<E>,
}

impl<E: RealField, S: LinearSolver<E>> SafeSolver<E, S> {
    /// Wraps `inner`.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            a: Mat::new(),
            b: Mat::new(),
        }
    }

    /// Returns the wrapped solver.
    #[inline]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Consumes the wrapper and returns the inner solver.
    #[inline]
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<E: RealField, S: LinearSolver<E>> LinearSolver<E> for SafeSolver<E, S> {
    fn set_a(&mut self, a: MatRef<'_, E>) -> Result<(), LinalgError> {
        if self.inner.modifies_a() {
            self.a.reshape(a.nrows(), a.ncols());
            self.a.as_mut().copy_from(a);
            self.inner.set_a(self.a.as_ref())
        } else {
            self.inner.set_a(a)
        }
    }

    fn solve(&mut self, b: MatMut<'_, E>, x: MatMut<'_, E>) -> Result<(), LinalgError> {
        if self.inner.modifies_b() {
            self.b.reshape(b.nrows(), b.ncols());
            self.b.as_mut().copy_from(b.rb());
            self.inner.solve(self.b.as_mut(), x)
        } else {
            self.inner.solve(b, x)
        }
    }

    fn invert(&mut self, inv: MatMut<'_, E>) -> Result<(), LinalgError> {
        self.inner.invert(inv)
    }

    fn quality(&self) -> E {
        self.inner.quality()
    }

    #[inline]
    fn modifies_a(&self) -> bool {
        false
    }

    #[inline]
    fn modifies_b(&self) -> bool {
        false
    }
}
