//! Eigenvalue decomposition of a general real square matrix.
//!
//! The eigenvalues of a real matrix $A$ of shape $(n, n)$ are either real or come in complex
//! conjugate pairs. They are computed in three stages:
//!
//! - $A$ is reduced to upper Hessenberg form, $A = Q_h H Q_h^T$ (see [`hessenberg`]).
//! - The implicit double-shift QR iteration drives $H$ to quasi upper triangular form, with
//!   $1 \times 1$ blocks for the real eigenvalues and $2 \times 2$ blocks for the complex pairs
//!   (see [`double_shift`] and [`EigenvalueSolver`]).
//! - If eigenvectors are requested, the iteration is replayed with the orthogonal transform
//!   accumulated, using the known eigenvalues as shifts, and the eigenvectors of the real
//!   eigenvalues are recovered by back-substitution (see [`EigenvectorSolver`]).
//!
//! [`Eigendecomposition`] runs the three stages.
//!
//! # Example
//! ```
//! use qreig::linalg::evd::Eigendecomposition;
//! use qreig::mat;
//!
//! let a = mat![[2.0f64, 0.0, 0.0], [0.0, 3.0, 4.0], [0.0, 4.0, 9.0]];
//! let mut evd = Eigendecomposition::new();
//! evd.decompose(a.as_ref()).unwrap();
//!
//! let mut eigenvalues = evd.eigenvalues().iter().map(|l| l.re).collect::<Vec<_>>();
//! eigenvalues.sort_by(|a, b| a.partial_cmp(b).unwrap());
//! assert!((eigenvalues[0] - 1.0).abs() < 1e-10);
//! assert!((eigenvalues[1] - 2.0).abs() < 1e-10);
//! assert!((eigenvalues[2] - 11.0).abs() < 1e-10);
//! ```

use crate::{LinalgError, Mat, MatRef, RealField, Tolerance};
use num_complex::Complex;

pub mod double_shift;
pub mod eigenvalues;
pub mod eigenvectors;
pub mod hessenberg;
pub mod observer;
pub mod small;

pub use double_shift::DoubleShiftQr;
pub use eigenvalues::EigenvalueSolver;
pub use eigenvectors::EigenvectorSolver;
pub use hessenberg::HessenbergDecomposition;
pub use observer::{HessenbergChecker, NoopObserver, StepKind, StepObserver};

/// Parameters of [`Eigendecomposition`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct EigenParams<E: RealField> {
    /// Number of iterations without finding an eigenvalue after which a random shift is used.
    pub exceptional_threshold: usize,
    /// Number of iterations without finding an eigenvalue after which the decomposition fails.
    /// `None` uses `20 * exceptional_threshold`.
    pub max_iterations: Option<usize>,
    /// Seed of the generator of the random shifts.
    pub seed: u64,
    /// Tolerance of the convergence tests.
    pub tolerance: Tolerance<E>,
    /// Whether the eigenvectors are computed.
    pub compute_vectors: bool,
}

impl<E: RealField> Default for EigenParams<E> {
    fn default() -> Self {
        Self {
            exceptional_threshold: double_shift::DEFAULT_EXCEPTIONAL_THRESHOLD,
            max_iterations: None,
            seed: double_shift::DEFAULT_SEED,
            tolerance: Tolerance::machine(),
            compute_vectors: true,
        }
    }
}

impl<E: RealField> EigenParams<E> {
    /// Returns the default parameters, with the computation of the eigenvectors enabled or not.
    pub fn with_vectors(compute_vectors: bool) -> Self {
        Self {
            compute_vectors,
            ..Self::default()
        }
    }
}

/// Eigenvalue decomposition of a general real square matrix.
///
/// The eigenvalues are reported in the order they were found. Complex eigenvalues come in
/// conjugate pairs, the one with a positive imaginary part first. Eigenvectors are only computed
/// for the real eigenvalues, normalized to a unit Euclidean norm.
///
/// If [`decompose`](Eigendecomposition::decompose) fails with
/// [`LinalgError::NoConvergence`], the eigenvalues found before the failure are still returned
/// by [`eigenvalues`](Eigendecomposition::eigenvalues), and no eigenvectors are available.
pub struct Eigendecomposition<E: RealField> {
    params: EigenParams<E>,
    hessenberg: HessenbergDecomposition<E>,
    qr: DoubleShiftQr<E>,
    values: EigenvalueSolver,
    vectors: EigenvectorSolver<E>,
    h: Mat<E>,
    q_h: Mat<E>,
    has_vectors: bool,
}

impl<E: RealField> Default for Eigendecomposition<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RealField> Eigendecomposition<E> {
    /// Creates a decomposition object computing eigenvalues and eigenvectors with the default
    /// parameters.
    pub fn new() -> Self {
        Self::with_params(EigenParams::default())
    }

    /// Creates a decomposition object with the given parameters.
    pub fn with_params(params: EigenParams<E>) -> Self {
        Self {
            params,
            hessenberg: HessenbergDecomposition::new(),
            qr: DoubleShiftQr::new(
                params.exceptional_threshold,
                params.max_iterations,
                params.seed,
                params.tolerance,
            ),
            values: EigenvalueSolver::new(),
            vectors: EigenvectorSolver::new(),
            h: Mat::new(),
            q_h: Mat::new(),
            has_vectors: false,
        }
    }

    /// Returns the parameters of the decomposition.
    #[inline]
    pub fn params(&self) -> &EigenParams<E> {
        &self.params
    }

    /// Computes the eigenvalues, and the eigenvectors if enabled, of `matrix`.
    ///
    /// Returns [`LinalgError::NotSquare`] if `matrix` is not square, and
    /// [`LinalgError::NoConvergence`] if the iteration failed to converge.
    pub fn decompose(&mut self, matrix: MatRef<'_, E>) -> Result<(), LinalgError> {
        self.decompose_with_observer(matrix, &mut NoopObserver)
    }

    /// Same as [`decompose`](Eigendecomposition::decompose), reporting the progress of the
    /// iteration to `observer`.
    pub fn decompose_with_observer(
        &mut self,
        matrix: MatRef<'_, E>,
        observer: &mut dyn StepObserver<E>,
    ) -> Result<(), LinalgError> {
        self.has_vectors = false;
        self.hessenberg.decompose(matrix)?;

        let n = matrix.nrows();
        self.h.reshape(n, n);
        self.hessenberg.h_into(self.h.as_mut())?;

        self.values.process(&mut self.qr, self.h.as_ref(), observer)?;

        if self.params.compute_vectors {
            self.q_h.reshape(n, n);
            self.hessenberg.q_into(self.q_h.as_mut())?;
            self.vectors.process(
                &mut self.qr,
                self.h.as_ref(),
                Some(self.q_h.as_ref()),
                observer,
            )?;
            self.has_vectors = true;
        }
        Ok(())
    }

    /// Returns the number of eigenvalues that were found.
    #[inline]
    pub fn number_of_eigenvalues(&self) -> usize {
        self.qr.number_of_eigenvalues()
    }

    /// Returns the eigenvalues that were found.
    #[inline]
    pub fn eigenvalues(&self) -> &[Complex<E>] {
        self.qr.eigenvalues()
    }

    /// Returns eigenvalue `index`.
    ///
    /// # Panics
    /// Panics if `index >= self.number_of_eigenvalues()`.
    #[inline]
    #[track_caller]
    pub fn eigenvalue(&self, index: usize) -> Complex<E> {
        self.qr.eigenvalues()[index]
    }

    /// Returns the eigenvector of eigenvalue `index`, as an `n×1` matrix.
    ///
    /// Returns `None` if the eigenvectors were not computed, if the eigenvalue is complex, or if
    /// its eigenvector could not be computed.
    #[inline]
    pub fn eigenvector(&self, index: usize) -> Option<&Mat<E>> {
        if self.has_vectors {
            self.vectors.eigenvector(index)
        } else {
            None
        }
    }

    /// Returns the number of iterations that each eigenvalue took to converge.
    #[inline]
    pub fn steps_per_eigenvalue(&self) -> &[usize] {
        self.qr.steps_per_eigenvalue()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assert,
        linalg::{
            qr::{
                tests_common::{mul, random_mat},
                HouseholderColQr,
            },
            solvers::{LinearSolver, QrSolver},
        },
        mat,
    };

    fn check_decomposition(evd: &Eigendecomposition<f64>, a: &Mat<f64>) {
        let n = a.nrows();
        assert!(evd.number_of_eigenvalues() == n);

        let trace = (0..n).map(|i| a.read(i, i)).sum::<f64>();
        let sum = evd.eigenvalues().iter().map(|l| l.re).sum::<f64>();
        assert!((sum - trace).abs() < 1e-8 * (1.0 + trace.abs()));

        for k in 0..n {
            let value = evd.eigenvalue(k);
            match evd.eigenvector(k) {
                Some(v) => {
                    let av = mul(a.as_ref(), v.as_ref());
                    for i in 0..n {
                        assert!((av.read(i, 0) - value.re * v.read(i, 0)).abs() < 1e-8);
                    }
                }
                None => assert!(value.im != 0.0),
            }
        }
    }

    #[test]
    fn test_random() {
        let mut evd = Eigendecomposition::new();
        for n in [0, 1, 2, 3, 4, 7, 10, 16, 25] {
            let a = random_mat(n, n);
            evd.decompose(a.as_ref()).unwrap();
            check_decomposition(&evd, &a);
        }
    }

    #[test]
    fn test_symmetric() {
        let mut evd = Eigendecomposition::new();
        let b = random_mat(9, 9);
        let a = mul(b.transpose(), b.as_ref());
        evd.decompose(a.as_ref()).unwrap();
        check_decomposition(&evd, &a);
        assert!(evd.eigenvalues().iter().all(|l| l.im == 0.0));
        assert!((0..9).all(|k| evd.eigenvector(k).is_some()));
    }

    #[test]
    fn test_2x2_real_block() {
        // the trailing 2x2 block has real eigenvalues 1 and 3
        let a = mat![[2.0, 1.0], [1.0, 2.0]];
        let mut evd = Eigendecomposition::new();
        evd.decompose(a.as_ref()).unwrap();
        check_decomposition(&evd, &a);

        let a = mat![
            [4.0, 1.0, 0.5, 0.0],
            [0.0, 2.0, 1.0, 0.0],
            [0.0, 1.0, 2.0, 1.0],
            [0.0, 0.0, 0.0, 5.0],
        ];
        evd.decompose(a.as_ref()).unwrap();
        check_decomposition(&evd, &a);
    }

    #[test]
    fn test_complex_pairs() {
        let (c, s) = (0.6, 0.8);
        let a = mat![[c, -s, 0.0], [s, c, 0.0], [0.0, 0.0, 2.0]];
        let mut evd = Eigendecomposition::new();
        evd.decompose(a.as_ref()).unwrap();
        check_decomposition(&evd, &a);

        let complex = evd
            .eigenvalues()
            .iter()
            .filter(|l| l.im != 0.0)
            .collect::<Vec<_>>();
        assert!(complex.len() == 2);
        assert!((complex[0].re - c).abs() < 1e-12);
        assert!((complex[0].im - s).abs() < 1e-12);
        assert!(*complex[1] == complex[0].conj());
    }

    #[test]
    fn test_repeated_eigenvalues() {
        let mut evd = Eigendecomposition::new();
        let a = Mat::from_fn(5, 5, |i, j| if i == j { 3.0 } else { 0.0 });
        evd.decompose(a.as_ref()).unwrap();
        check_decomposition(&evd, &a);
        assert!(evd.eigenvalues().iter().all(|&l| l == Complex::new(3.0, 0.0)));

        // similarity transform of diag(1, 1, 2, 2, 2) by an orthogonal matrix
        let mut hess = HessenbergDecomposition::new();
        hess.decompose(random_mat(5, 5).as_ref()).unwrap();
        let q = hess.q();
        let d = Mat::from_diagonal(&[1.0, 1.0, 2.0, 2.0, 2.0]);
        let a = mul(mul(q.as_ref(), d.as_ref()).as_ref(), q.transpose());
        evd.decompose(a.as_ref()).unwrap();
        check_decomposition(&evd, &a);
    }

    fn similar_to_diagonal(v: &Mat<f64>, diagonal: &[f64]) -> Mat<f64> {
        let n = v.nrows();
        let mut solver = QrSolver::new(HouseholderColQr::new());
        solver.set_a(v.as_ref()).unwrap();
        let mut v_inv = Mat::zeros(n, n);
        solver.invert(v_inv.as_mut()).unwrap();
        let d = Mat::from_diagonal(diagonal);
        mul(mul(v.as_ref(), d.as_ref()).as_ref(), v_inv.as_ref())
    }

    #[test]
    fn test_repeated_eigenvalues_non_orthogonal_similarity() {
        let v = mat![[1.0, 2.0, 0.5], [0.3, 1.0, 1.5], [2.0, -1.0, 1.0]];
        let a = similar_to_diagonal(&v, &[2.0, 3.0, 2.0]);
        let mut evd = Eigendecomposition::new();
        evd.decompose(a.as_ref()).unwrap();
        check_decomposition(&evd, &a);

        let twos = (0..3)
            .filter(|&k| (evd.eigenvalue(k) - Complex::new(2.0, 0.0)).norm() < 1e-8)
            .map(|k| evd.eigenvector(k).unwrap())
            .collect::<Vec<_>>();
        assert!(twos.len() == 2);
        let dot = mul(twos[0].transpose(), twos[1].as_ref()).read(0, 0);
        assert!(dot.abs() < 0.99);
    }

    #[test]
    fn test_values_only() {
        let a = random_mat(6, 6);
        let mut evd = Eigendecomposition::with_params(EigenParams::with_vectors(false));
        evd.decompose(a.as_ref()).unwrap();
        assert!(evd.number_of_eigenvalues() == 6);
        assert!((0..6).all(|k| evd.eigenvector(k).is_none()));

        let mut with_vectors = Eigendecomposition::new();
        with_vectors.decompose(a.as_ref()).unwrap();
        let mut lhs = evd.eigenvalues().to_vec();
        let mut rhs = with_vectors.eigenvalues().to_vec();
        let key = |l: &Complex<f64>| (l.re, l.im);
        lhs.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap());
        rhs.sort_by(|a, b| key(a).partial_cmp(&key(b)).unwrap());
        for (l, r) in lhs.iter().zip(rhs.iter()) {
            assert!((l - r).norm() < 1e-8);
        }
    }

    #[test]
    fn test_observer() {
        let a = random_mat(12, 12);
        let mut checker = HessenbergChecker::default();
        let mut evd = Eigendecomposition::new();
        evd.decompose_with_observer(a.as_ref(), &mut checker).unwrap();
        assert!(checker.steps() > 0);
        assert!(checker.violations() == 0);

        struct Count(usize);
        impl StepObserver<f64> for Count {
            fn on_deflation(&mut self, _: usize, _: Complex<f64>, _: usize) {
                self.0 += 1;
            }
        }
        let mut count = Count(0);
        evd.decompose_with_observer(a.as_ref(), &mut count).unwrap();
        // once for the eigenvalues, once for the eigenvectors
        assert!(count.0 == 24);
    }

    #[test]
    fn test_errors() {
        let mut evd = Eigendecomposition::<f64>::new();
        assert!(
            evd.decompose(Mat::zeros(3, 2).as_ref())
                == Err(LinalgError::NotSquare { nrows: 3, ncols: 2 })
        );

        let params = EigenParams {
            max_iterations: Some(1),
            ..EigenParams::default()
        };
        let mut evd = Eigendecomposition::with_params(params);
        let result = evd.decompose(random_mat(8, 8).as_ref());
        assert!(matches!(result, Err(LinalgError::NoConvergence { .. })));
        assert!(evd.number_of_eigenvalues() < 8);
        assert!(evd.eigenvector(0).is_none());
    }
}
