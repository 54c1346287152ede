//! Instrumentation hooks for the eigenvalue iteration.
//!
//! The solvers in [`evd`](super) call a [`StepObserver`] after each QR sweep, exceptional shift
//! and deflation. The numerical state is only ever exposed read-only, so an observer cannot
//! change the outcome of the iteration.

use crate::{linalg::reductions::norm_max, MatRef, RealField, Tolerance};
use num_complex::Complex;

/// Kind of implicit QR sweep.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepKind {
    /// Francis double-shift sweep, chasing a `3×1` bulge.
    DoubleShift,
    /// Single-shift sweep, chasing a `2×1` bulge.
    SingleShift,
}

/// Callbacks invoked by the eigenvalue iteration.
///
/// All methods have empty default implementations.
pub trait StepObserver<E: RealField> {
    /// Called after a sweep over the active window `[x1, x2]`, with the updated working matrix.
    #[allow(unused_variables)]
    fn on_step(&mut self, kind: StepKind, x1: usize, x2: usize, a: MatRef<'_, E>) {}

    /// Called after an exceptional shift, with the iteration count and the shift that was used.
    #[allow(unused_variables)]
    fn on_exceptional_shift(&mut self, steps: usize, shift: E) {}

    /// Called when eigenvalue number `index` has been found, after `steps` iterations.
    #[allow(unused_variables)]
    fn on_deflation(&mut self, index: usize, value: Complex<E>, steps: usize) {}
}

/// Observer that does nothing.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopObserver;

impl<E: RealField> StepObserver<E> for NoopObserver {}

/// Observer checking that the working matrix stays upper Hessenberg after every sweep.
///
/// An element below the first subdiagonal counts as a violation when it is not negligible
/// relative to the largest absolute element of the matrix.
#[derive(Copy, Clone, Debug)]
pub struct HessenbergChecker<E: RealField> {
    tolerance: Tolerance<E>,
    violations: usize,
    steps: usize,
}

impl<E: RealField> Default for HessenbergChecker<E> {
    fn default() -> Self {
        Self::new(Tolerance::new(E::from_f64(1e3) * E::EPSILON))
    }
}

impl<E: RealField> HessenbergChecker<E> {
    /// Creates a checker with the given tolerance.
    pub fn new(tolerance: Tolerance<E>) -> Self {
        Self {
            tolerance,
            violations: 0,
            steps: 0,
        }
    }

    /// Returns the number of sweeps after which the matrix was not upper Hessenberg.
    #[inline]
    pub fn violations(&self) -> usize {
        self.violations
    }

    /// Returns the number of sweeps that were checked.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }
}

impl<E: RealField> StepObserver<E> for HessenbergChecker<E> {
    fn on_step(&mut self, kind: StepKind, x1: usize, x2: usize, a: MatRef<'_, E>) {
        self.steps += 1;
        let scale = norm_max(a);
        let n = a.nrows();
        for j in 0..n {
            for i in j + 2..n {
                if !self.tolerance.is_negligible(a.read(i, j), scale) {
                    log::warn!(
                        "{kind:?} sweep over [{x1}, {x2}] left a non-negligible element at ({i}, {j})"
                    );
                    self.violations += 1;
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert, mat};

    #[test]
    fn test_checker() {
        let mut checker = HessenbergChecker::default();
        let h = mat![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [0.0, 7.0, 8.0]];
        checker.on_step(StepKind::DoubleShift, 0, 2, h.as_ref());
        assert!(checker.violations() == 0);

        let a = mat![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [1e-3, 7.0, 8.0]];
        checker.on_step(StepKind::SingleShift, 0, 2, a.as_ref());
        assert!(all(checker.violations() == 1, checker.steps() == 2));

        let mut noop = NoopObserver;
        StepObserver::<f64>::on_exceptional_shift(&mut noop, 3, 1.0);
    }
}
