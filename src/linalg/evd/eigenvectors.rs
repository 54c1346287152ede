//! Driver computing the eigenvectors of an upper Hessenberg matrix.
//!
//! The iteration is run a second time with the orthogonal transform accumulated, so that on
//! exit $T = QHQ^T$ is quasi upper triangular. The eigenvalues found by
//! [`EigenvalueSolver`](super::EigenvalueSolver) are used as the shifts, in the order they were
//! found, which usually deflates one eigenvalue per sweep. If that stops working, the solver falls
//! back to the regular shift strategy.
//!
//! Since the eigenvalues are found from the bottom of the matrix to the top, eigenvalue `k` is
//! the diagonal element `n - 1 - k` of $T$. For a real eigenvalue $\lambda$ at position `i`,
//! the eigenvector $x$ of $T$ has $x_i = 1$, zeros below, and its leading part solves
//! $$(T_{0:i,0:i} - \lambda I) x_{0:i} = -T_{0:i,i}.$$
//! The system is triangular as long as no complex eigenvalue was found above position `i`, and
//! is solved with a QR decomposition otherwise. The eigenvector of $H$ is then $Q^T x$.
//!
//! Each copy of a repeated eigenvalue is solved on its own. When a diagonal element above
//! position `i` equals $\lambda$ up to a relative tolerance of $100\varepsilon$ and the system is
//! consistent, its unknown is free and set to zero, which keeps the vectors of the copies
//! independent. For a defective eigenvalue the system is inconsistent, and the resulting vectors
//! are close to linearly dependent. The quasi triangular case relies on a rank revealing QR
//! decomposition for the same purpose. No eigenvectors are computed for complex eigenvalues.

use super::{
    double_shift::DoubleShiftQr,
    eigenvalues::{move_to_next_split, no_convergence, notify_deflations, split_window},
    observer::{StepKind, StepObserver},
};
use crate::{
    linalg::{
        matmul::matmul,
        qr::ColPivQrParams,
        reductions::{has_uncountable, norm_max},
        solvers::{LinearSolver, QrpSolver},
    },
    LinalgError, Mat, MatMut, MatRef, Parallelism, RealField, Tolerance,
};
use num_complex::Complex;

/// Recomputes the Schur form with its orthogonal transform, and extracts the eigenvectors of the
/// real eigenvalues.
#[derive(Clone, Debug)]
pub struct EigenvectorSolver<E: RealField> {
    known: Vec<Complex<E>>,
    vectors: Vec<Option<Mat<E>>>,
    splits: Vec<usize>,
    x1: usize,
    end: usize,
    index: usize,
    onscript: bool,
}

impl<E: RealField> Default for EigenvectorSolver<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RealField> EigenvectorSolver<E> {
    /// Creates a solver.
    pub fn new() -> Self {
        Self {
            known: Vec::new(),
            vectors: Vec::new(),
            splits: Vec::new(),
            x1: 0,
            end: 0,
            index: 0,
            onscript: true,
        }
    }

    /// Computes the eigenvectors of the upper Hessenberg matrix `h`.
    ///
    /// `qr` must hold the eigenvalues of `h` computed by
    /// [`EigenvalueSolver::process`](super::EigenvalueSolver::process). They are only used as
    /// shifts, and are replaced by the eigenvalues found during this pass. If `h` comes from a
    /// Hessenberg reduction $A = Q_h H Q_h^T$, passing $Q_h$ as `q_h` produces the eigenvectors
    /// of $A$.
    ///
    /// Returns [`LinalgError::NotSquare`] if `h` is not square, and
    /// [`LinalgError::NoConvergence`] if an eigenvalue was not found within
    /// [`DoubleShiftQr::max_iterations`] iterations, or if `h` contains NaN or infinite values.
    pub fn process(
        &mut self,
        qr: &mut DoubleShiftQr<E>,
        h: MatRef<'_, E>,
        q_h: Option<MatRef<'_, E>>,
        observer: &mut dyn StepObserver<E>,
    ) -> Result<(), LinalgError> {
        self.known.clear();
        self.known.extend_from_slice(qr.eigenvalues());
        self.vectors.clear();

        qr.set_accumulate_q(true);
        qr.setup(h)?;

        let n = qr.dim();
        if let Some(q_h) = q_h {
            crate::check_shape((n, n), q_h.shape())?;
        }
        if has_uncountable(qr.a()) {
            return Err(no_convergence(qr));
        }

        self.splits.clear();
        self.x1 = 0;
        self.end = n;
        self.index = 0;
        self.onscript = true;

        while self.index < n {
            let found = qr.number_of_eigenvalues();
            let converged = self.find_next_eigenvalue(qr, observer);
            notify_deflations(qr, observer, found);
            if !converged {
                return Err(no_convergence(qr));
            }
        }

        self.extract_vectors(qr, q_h);
        Ok(())
    }

    /// Returns the eigenvector of eigenvalue `index`, or `None` if the eigenvalue is complex or
    /// its eigenvector could not be computed.
    #[inline]
    pub fn eigenvector(&self, index: usize) -> Option<&Mat<E>> {
        self.vectors.get(index).and_then(Option::as_ref)
    }

    /// Returns the eigenvectors, indexed like the eigenvalues.
    #[inline]
    pub fn eigenvectors(&self) -> &[Option<Mat<E>>] {
        &self.vectors
    }

    fn find_next_eigenvalue(
        &mut self,
        qr: &mut DoubleShiftQr<E>,
        observer: &mut dyn StepObserver<E>,
    ) -> bool {
        while qr.steps() < qr.max_iterations() {
            qr.increment_steps();
            let (x1, end) = (self.x1, self.end);

            if end <= x1 {
                if !move_to_next_split(&mut self.x1, &mut self.end, &mut self.splits) {
                    return false;
                }
            } else if end - x1 == 1 {
                qr.add_eigen_at(x1);
                self.end -= 1;
                self.index += 1;
                return true;
            } else if end - x1 == 2 && !qr.is_real_2x2(x1, x1 + 1) {
                qr.add_computed_eigen_2x2(x1, x1 + 1);
                self.end -= 2;
                self.index += 2;
                return true;
            } else if qr.needs_exceptional_shift() {
                let shift = qr.exceptional_shift(x1, end - 1);
                observer.on_exceptional_shift(qr.steps(), shift);
                observer.on_step(StepKind::SingleShift, x1, end - 1, qr.a());
            } else if qr.is_zero(end - 1, end - 2) {
                qr.add_eigen_at(end - 1);
                self.end -= 1;
                self.index += 1;
                return true;
            } else {
                self.check_split_perform_implicit(qr, observer);
            }
        }
        false
    }

    fn check_split_perform_implicit(
        &mut self,
        qr: &mut DoubleShiftQr<E>,
        observer: &mut dyn StepObserver<E>,
    ) {
        if split_window(qr, &mut self.x1, self.end, &mut self.splits) {
            return;
        }

        let (x1, x2) = (self.x1, self.end - 1);
        // a double step needs a window of at least three rows
        let wide = x2 - x1 >= 2;

        let kind = if self.onscript {
            if qr.steps() > qr.exceptional_threshold() / 2 {
                self.onscript = false;
                return;
            }
            match self.known.get(self.index) {
                Some(value) if value.im == E::zero() => {
                    qr.perform_implicit_single_step(x1, x2, value.re);
                    StepKind::SingleShift
                }
                Some(value) if wide => {
                    qr.perform_implicit_double_step(x1, x2, value.re, value.im);
                    StepKind::DoubleShift
                }
                _ => {
                    self.onscript = false;
                    return;
                }
            }
        } else if wide {
            qr.implicit_double_step(x1, x2);
            StepKind::DoubleShift
        } else {
            let shift = qr.a().read(x2, x2);
            qr.perform_implicit_single_step(x1, x2, shift);
            StepKind::SingleShift
        };

        observer.on_step(kind, x1, x2, qr.a());
    }

    fn extract_vectors(&mut self, qr: &DoubleShiftQr<E>, q_h: Option<MatRef<'_, E>>) {
        let n = qr.dim();
        let eigenvalues = qr.eigenvalues();
        self.vectors.clear();
        self.vectors.resize(n, None);

        let q = match qr.q() {
            Some(q) => q,
            None => return,
        };
        let t_norm = norm_max(qr.a());

        let mut triangular = true;
        for i in 0..n {
            let value = eigenvalues[n - 1 - i];
            if value.im != E::zero() {
                triangular = false;
                continue;
            }

            let mut x = Mat::zeros(n, 1);
            x.write(i, 0, E::one());
            let solved = if triangular {
                solve_shifted_triangular(qr.a(), value.re, i, t_norm, qr.tolerance(), x.as_mut());
                Ok(())
            } else {
                solve_shifted_general(qr.a(), value.re, i, qr.tolerance(), x.as_mut())
            };
            if let Err(err) = solved {
                log::warn!("could not compute the eigenvector of {value:?}: {err}");
                continue;
            }

            let mut v = Mat::zeros(n, 1);
            matmul(v.as_mut(), q.transpose(), x.as_ref(), None, E::one(), Parallelism::None);
            normalize(&mut v);
            self.vectors[n - 1 - i] = Some(v);
        }

        if let Some(q_h) = q_h {
            for v in self.vectors.iter_mut().flatten() {
                let mut out = Mat::zeros(n, 1);
                matmul(out.as_mut(), q_h, v.as_ref(), None, E::one(), Parallelism::None);
                *v = out;
            }
        }
    }
}

/// Solves $(T_{0:i,0:i} - \lambda I) x_{0:i} = -T_{0:i,i}$ by back substitution, where $T$ is upper
/// triangular in its leading `i+1` rows, and writes the solution into `x[0..i]`.
///
/// A diagonal element equal to $\lambda$ up to $100\varepsilon$ is another copy of the
/// eigenvalue. If the right-hand side is consistent, the corresponding unknown is free and is set
/// to zero. Otherwise the eigenvalue is defective, and the diagonal element is replaced by
/// $\varepsilon \|T\|$, which yields a vector close to the one of the other copy.
fn solve_shifted_triangular<E: RealField>(
    t: MatRef<'_, E>,
    value: E,
    i: usize,
    t_norm: E,
    tolerance: Tolerance<E>,
    x: MatMut<'_, E>,
) {
    let mut x = x;
    let factor = E::from_f64(100.0);
    let mut scale = value.abs();
    if scale == E::zero() {
        scale = E::one();
    }
    let small = if t_norm == E::zero() {
        tolerance.eps
    } else {
        tolerance.eps * t_norm
    };

    let mut x_max = E::one();
    for k in (0..i).rev() {
        let mut sum = -t.read(k, i);
        for j in k + 1..i {
            sum -= t.read(k, j) * x.read(j, 0);
        }

        let diag = t.read(k, k);
        let value_k = if tolerance.is_relatively_equal(diag, value, scale, factor) {
            if sum.abs() <= factor * small * x_max {
                E::zero()
            } else if diag >= value {
                sum / small
            } else {
                -sum / small
            }
        } else {
            sum / (diag - value)
        };

        x.write(k, 0, value_k);
        x_max = x_max.max(value_k.abs());
    }
}

/// Solves the same system as [`solve_shifted_triangular`] when complex blocks make $T$ only quasi
/// triangular, with a rank revealing QR decomposition so that copies of the eigenvalue on the
/// diagonal do not make the solve fail.
fn solve_shifted_general<E: RealField>(
    t: MatRef<'_, E>,
    value: E,
    i: usize,
    tolerance: Tolerance<E>,
    x: MatMut<'_, E>,
) -> Result<(), LinalgError> {
    let mut x = x;
    if i == 0 {
        return Ok(());
    }

    let shifted = Mat::from_fn(i, i, |r, c| {
        if r == c {
            t.read(r, c) - value
        } else {
            t.read(r, c)
        }
    });
    let mut rhs = Mat::from_fn(i, 1, |r, _| -t.read(r, i));
    let mut sol = Mat::zeros(i, 1);

    let mut solver = QrpSolver::with_params(ColPivQrParams {
        singular_threshold: Some(E::from_f64(100.0) * tolerance.eps),
    });
    solver.set_a(shifted.as_ref())?;
    solver.solve(rhs.as_mut(), sol.as_mut())?;

    for r in 0..i {
        x.write(r, 0, sol.read(r, 0));
    }
    Ok(())
}

/// Divides `v` by its Euclidean norm.
fn normalize<E: RealField>(v: &mut Mat<E>) {
    let max = norm_max(v.as_ref());
    if max == E::zero() {
        return;
    }
    let mut norm2 = E::zero();
    for x in v.as_slice() {
        let x = *x / max;
        norm2 += x * x;
    }
    let norm = norm2.sqrt() * max;
    for x in v.as_slice_mut() {
        *x /= norm;
    }
}
