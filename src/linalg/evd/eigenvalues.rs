//! Driver computing the eigenvalues of an upper Hessenberg matrix.

use super::{
    double_shift::DoubleShiftQr,
    observer::{StepKind, StepObserver},
};
use crate::{linalg::reductions::has_uncountable, LinalgError, MatRef, RealField};

/// Runs the double-shift QR iteration until every eigenvalue has been found.
///
/// The active window `[x1, end)` starts as the whole matrix and shrinks from the bottom as
/// eigenvalues are found. When a negligible subdiagonal element is found inside the window,
/// the window is split: the bottom part is processed first and the end of the top part is
/// pushed on a stack, to be resumed once the bottom part is done. Eigenvalues are therefore
/// found from the bottom of the matrix to the top.
#[derive(Clone, Debug, Default)]
pub struct EigenvalueSolver {
    splits: Vec<usize>,
    x1: usize,
    end: usize,
}

impl EigenvalueSolver {
    /// Creates a solver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes the eigenvalues of the upper Hessenberg matrix `h`, which are then available from
    /// [`DoubleShiftQr::eigenvalues`].
    ///
    /// Returns [`LinalgError::NotSquare`] if `h` is not square, and
    /// [`LinalgError::NoConvergence`] if an eigenvalue was not found within
    /// [`DoubleShiftQr::max_iterations`] iterations, or if the working matrix contains NaN or
    /// infinite values. The eigenvalues that were found before the failure stay available.
    pub fn process<E: RealField>(
        &mut self,
        qr: &mut DoubleShiftQr<E>,
        h: MatRef<'_, E>,
        observer: &mut dyn StepObserver<E>,
    ) -> Result<(), LinalgError> {
        qr.set_accumulate_q(false);
        qr.setup(h)?;

        let n = qr.dim();
        self.splits.clear();
        self.x1 = 0;
        self.end = n;
        if has_uncountable(qr.a()) {
            return Err(no_convergence(qr));
        }

        while qr.number_of_eigenvalues() < n {
            if qr.steps() >= qr.max_iterations() {
                return Err(no_convergence(qr));
            }
            let (x1, end) = (self.x1, self.end);
            if end > x1 && qr.a().read(end - 1, end - 1).is_nan() {
                return Err(no_convergence(qr));
            }
            qr.increment_steps();
            let found = qr.number_of_eigenvalues();

            if end <= x1 {
                if !self.move_to_next_split() {
                    return Err(no_convergence(qr));
                }
            } else if end - x1 == 1 {
                qr.add_eigen_at(x1);
                self.end -= 1;
            } else if end - x1 == 2 {
                qr.add_computed_eigen_2x2(x1, x1 + 1);
                self.end -= 2;
            } else if qr.needs_exceptional_shift() {
                let shift = qr.exceptional_shift(x1, end - 1);
                observer.on_exceptional_shift(qr.steps(), shift);
                observer.on_step(StepKind::SingleShift, x1, end - 1, qr.a());
            } else if qr.is_zero(end - 1, end - 2) {
                qr.add_eigen_at(end - 1);
                self.end -= 1;
            } else if !self.split(qr) {
                qr.implicit_double_step(x1, end - 1);
                observer.on_step(StepKind::DoubleShift, x1, end - 1, qr.a());
            }

            notify_deflations(qr, observer, found);
        }

        Ok(())
    }

    /// Looks for a negligible subdiagonal element inside the window, from the bottom up. If one
    /// is found, the window is reduced to the part below it.
    pub(super) fn split<E: RealField>(&mut self, qr: &DoubleShiftQr<E>) -> bool {
        split_window(qr, &mut self.x1, self.end, &mut self.splits)
    }

    fn move_to_next_split(&mut self) -> bool {
        move_to_next_split(&mut self.x1, &mut self.end, &mut self.splits)
    }
}

pub(super) fn split_window<E: RealField>(
    qr: &DoubleShiftQr<E>,
    x1: &mut usize,
    end: usize,
    splits: &mut Vec<usize>,
) -> bool {
    for i in (*x1 + 1..end).rev() {
        if qr.is_zero(i, i - 1) {
            *x1 = i;
            splits.push(i);
            return true;
        }
    }
    false
}

pub(super) fn move_to_next_split(
    x1: &mut usize,
    end: &mut usize,
    splits: &mut Vec<usize>,
) -> bool {
    match splits.pop() {
        Some(split) => {
            *end = split;
            *x1 = splits.last().copied().unwrap_or(0);
            true
        }
        None => false,
    }
}

pub(super) fn notify_deflations<E: RealField>(
    qr: &DoubleShiftQr<E>,
    observer: &mut dyn StepObserver<E>,
    since: usize,
) {
    let eigenvalues = qr.eigenvalues();
    let steps = qr.steps_per_eigenvalue();
    for index in since..eigenvalues.len() {
        observer.on_deflation(index, eigenvalues[index], steps[index]);
    }
}

pub(super) fn no_convergence<E: RealField>(qr: &DoubleShiftQr<E>) -> LinalgError {
    let found = qr.number_of_eigenvalues();
    let steps = qr.steps();
    log::warn!("eigenvalue iteration did not converge: {found} eigenvalues found, {steps} steps");
    LinalgError::NoConvergence { found, steps }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assert,
        linalg::{
            evd::{hessenberg::HessenbergDecomposition, observer::NoopObserver},
            qr::tests_common::random_mat,
        },
        mat, Mat, Tolerance,
    };
    use num_complex::Complex;

    fn sorted(values: &[Complex<f64>]) -> Vec<Complex<f64>> {
        let mut values = values.to_vec();
        values.sort_by(|a, b| {
            a.re.partial_cmp(&b.re)
                .unwrap()
                .then(a.im.partial_cmp(&b.im).unwrap())
        });
        values
    }

    fn check_eigenvalues(h: MatRef<'_, f64>, expected: &[Complex<f64>]) {
        let mut qr = DoubleShiftQr::default();
        EigenvalueSolver::new()
            .process(&mut qr, h, &mut NoopObserver)
            .unwrap();
        let found = sorted(qr.eigenvalues());
        let expected = sorted(expected);
        assert!(found.len() == expected.len());
        for (found, expected) in found.iter().zip(expected.iter()) {
            assert!((found - expected).norm() < 1e-8);
        }
    }

    #[test]
    fn test_known_eigenvalues() {
        // upper triangular
        let h = mat![[3.0, 1.0, 2.0], [0.0, -1.0, 4.0], [0.0, 0.0, 2.0]];
        check_eigenvalues(
            h.as_ref(),
            &[
                Complex::new(3.0, 0.0),
                Complex::new(-1.0, 0.0),
                Complex::new(2.0, 0.0),
            ],
        );

        // symmetric tridiagonal with eigenvalues 2 - sqrt(2), 2, 2 + sqrt(2)
        let h = mat![[2.0, 1.0, 0.0], [1.0, 2.0, 1.0], [0.0, 1.0, 2.0]];
        let s = 2f64.sqrt();
        check_eigenvalues(
            h.as_ref(),
            &[
                Complex::new(2.0 - s, 0.0),
                Complex::new(2.0, 0.0),
                Complex::new(2.0 + s, 0.0),
            ],
        );

        // rotation by 90 degrees in the plane of the first two axes
        let h = mat![
            [0.0, -1.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 3.0, 0.0],
            [0.0, 0.0, 1.0, 5.0],
        ];
        check_eigenvalues(
            h.as_ref(),
            &[
                Complex::new(0.0, 1.0),
                Complex::new(0.0, -1.0),
                Complex::new(3.0, 0.0),
                Complex::new(5.0, 0.0),
            ],
        );
    }

    #[test]
    fn test_trace_and_pairs() {
        for n in [1, 2, 3, 5, 10, 20] {
            let a = random_mat(n, n);
            let mut hess = HessenbergDecomposition::new();
            hess.decompose(a.as_ref()).unwrap();

            let mut qr = DoubleShiftQr::default();
            EigenvalueSolver::new()
                .process(&mut qr, hess.h().as_ref(), &mut NoopObserver)
                .unwrap();
            let eigenvalues = qr.eigenvalues();
            assert!(eigenvalues.len() == n);

            let trace = (0..n).map(|i| a.read(i, i)).sum::<f64>();
            let sum = eigenvalues.iter().sum::<Complex<f64>>();
            assert!((sum.re - trace).abs() < 1e-8);
            assert!(sum.im.abs() < 1e-8);

            // complex eigenvalues come in conjugate pairs, found one after the other
            let mut i = 0;
            while i < n {
                if eigenvalues[i].im != 0.0 {
                    assert!(eigenvalues[i + 1] == eigenvalues[i].conj());
                    i += 2;
                } else {
                    i += 1;
                }
            }
        }
    }

    #[test]
    fn test_identical_eigenvalues() {
        let n = 6;
        let h = Mat::from_fn(n, n, |i, j| if i == j { 2.0 } else { 0.0 });
        check_eigenvalues(h.as_ref(), &vec![Complex::new(2.0, 0.0); n]);

        let h = Mat::from_fn(n, n, |i, j| if i + 1 == j || i == j + 1 { 1.0 } else { 0.0 });
        let expected = (1..=n)
            .map(|k| {
                Complex::new(
                    2.0 * (k as f64 * core::f64::consts::PI / (n + 1) as f64).cos(),
                    0.0,
                )
            })
            .collect::<Vec<_>>();
        check_eigenvalues(h.as_ref(), &expected);
    }

    #[test]
    fn test_no_convergence() {
        let h = mat![
            [1.0, 2.0, 3.0, 4.0],
            [1.0, 1.0, 2.0, 3.0],
            [0.0, 1.0, 1.0, 2.0],
            [0.0, 0.0, 1.0, 1.0],
        ];
        let mut qr = DoubleShiftQr::new(20, Some(0), 0x2342, Tolerance::machine());
        let result = EigenvalueSolver::new().process(&mut qr, h.as_ref(), &mut NoopObserver);
        assert!(result == Err(LinalgError::NoConvergence { found: 0, steps: 0 }));
        assert!(qr.number_of_eigenvalues() == 0);

        for max in [1, 2, 5] {
            let mut qr = DoubleShiftQr::new(20, Some(max), 0x2342, Tolerance::machine());
            let result = EigenvalueSolver::new().process(&mut qr, h.as_ref(), &mut NoopObserver);
            if let Err(LinalgError::NoConvergence { steps, .. }) = result {
                assert!(steps == max);
            }
            assert!(qr.steps() <= max);
        }
    }

    #[test]
    fn test_uncountable_values_fail_immediately() {
        let h = mat![
            [1.0, 2.0, 3.0, 4.0],
            [1.0, 1.0, 2.0, 3.0],
            [0.0, 1.0, 1.0, 2.0],
            [0.0, 0.0, 1.0, 1.0],
        ];
        for (i, j, value) in [(3, 3, f64::NAN), (0, 0, f64::NAN), (1, 2, f64::INFINITY)] {
            let mut bad = h.clone();
            bad.write(i, j, value);
            let mut qr = DoubleShiftQr::default();
            let result = EigenvalueSolver::new().process(&mut qr, bad.as_ref(), &mut NoopObserver);
            assert!(result == Err(LinalgError::NoConvergence { found: 0, steps: 0 }));
        }
    }

    #[test]
    fn test_not_square() {
        let mut qr = DoubleShiftQr::<f64>::default();
        let result =
            EigenvalueSolver::new().process(&mut qr, Mat::zeros(2, 3).as_ref(), &mut NoopObserver);
        assert!(result == Err(LinalgError::NotSquare { nrows: 2, ncols: 3 }));
    }

    #[test]
    fn test_empty() {
        let mut qr = DoubleShiftQr::<f64>::default();
        EigenvalueSolver::new()
            .process(&mut qr, Mat::zeros(0, 0).as_ref(), &mut NoopObserver)
            .unwrap();
        assert!(qr.eigenvalues().is_empty());
    }
}
