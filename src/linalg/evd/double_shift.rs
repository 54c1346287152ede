//! Implicit double-shift QR iteration on an upper Hessenberg matrix.
//!
//! [`DoubleShiftQr`] holds the working matrix and the primitive operations of the iteration:
//! convergence tests, bulge creation and chasing, exceptional shifts, and the bookkeeping of the
//! eigenvalues found so far. The order in which these are combined lives in the drivers,
//! [`EigenvalueSolver`](super::EigenvalueSolver) and [`EigenvectorSolver`](super::EigenvectorSolver).
//!
//! A sweep over the active window `[x1, x2]` introduces a bulge at the top of the window with a
//! reflector computed from the shift polynomial, then chases it down the subdiagonal with one
//! reflector per column until it falls off the bottom of the window. Each reflector is applied
//! as a similarity transform, so the eigenvalues are preserved. The reflectors are normalized by
//! their largest element before their norm is taken.
//!
//! When the orthogonal transform is accumulated, $Q$ is the product of all the reflectors applied
//! from the left, so that the working matrix is $QAQ^T$ where $A$ is the matrix passed to
//! [`DoubleShiftQr::setup`].

use super::small::eigenvalues_2x2;
use crate::{
    assert,
    linalg::householder::{apply_householder_on_the_left, apply_householder_on_the_right},
    LinalgError, Mat, MatRef, RealField, Tolerance,
};
use dyn_stack::{GlobalPodBuffer, PodStack, StackReq};
use num_complex::Complex;
use rand::{rngs::StdRng, Rng, SeedableRng};
use reborrow::*;

/// Default number of iterations without a deflation before an exceptional shift is used.
pub const DEFAULT_EXCEPTIONAL_THRESHOLD: usize = 20;

/// Default seed of the generator used by the exceptional shifts.
pub const DEFAULT_SEED: u64 = 0x2342;

/// Working state of the implicit double-shift QR iteration.
pub struct DoubleShiftQr<E: RealField> {
    a: Mat<E>,
    q: Mat<E>,
    accumulate_q: bool,

    tolerance: Tolerance<E>,
    exceptional_threshold: usize,
    max_iterations: usize,
    seed: u64,
    rng: StdRng,

    eigenvalues: Vec<Complex<E>>,
    steps_per_eigenvalue: Vec<usize>,

    steps: usize,
    last_exceptional: usize,
    num_exceptional: usize,

    u: [E; 3],
    gamma: E,
    mem: GlobalPodBuffer,
    mem_len: usize,
}

impl<E: RealField> Default for DoubleShiftQr<E> {
    fn default() -> Self {
        Self::new(
            DEFAULT_EXCEPTIONAL_THRESHOLD,
            None,
            DEFAULT_SEED,
            Tolerance::machine(),
        )
    }
}

impl<E: RealField> DoubleShiftQr<E> {
    /// Creates the iteration state.
    ///
    /// An exceptional shift is used when `exceptional_threshold` iterations went by without
    /// finding an eigenvalue. The iteration gives up after `max_iterations` iterations without
    /// finding an eigenvalue, `20 * exceptional_threshold` if `None`.
    pub fn new(
        exceptional_threshold: usize,
        max_iterations: Option<usize>,
        seed: u64,
        tolerance: Tolerance<E>,
    ) -> Self {
        Self {
            a: Mat::new(),
            q: Mat::new(),
            accumulate_q: false,
            tolerance,
            exceptional_threshold,
            max_iterations: max_iterations.unwrap_or(20 * exceptional_threshold),
            seed,
            rng: StdRng::seed_from_u64(seed),
            eigenvalues: Vec::new(),
            steps_per_eigenvalue: Vec::new(),
            steps: 0,
            last_exceptional: 0,
            num_exceptional: 0,
            u: [E::zero(); 3],
            gamma: E::zero(),
            mem: GlobalPodBuffer::new(StackReq::empty()),
            mem_len: 0,
        }
    }

    /// Selects whether the orthogonal transform is accumulated by the following iterations.
    ///
    /// Takes effect at the next call to [`setup`](Self::setup).
    #[inline]
    pub fn set_accumulate_q(&mut self, accumulate_q: bool) {
        self.accumulate_q = accumulate_q;
    }

    /// Prepares the iteration for the upper Hessenberg matrix `h`.
    ///
    /// The elements of `h` below the first subdiagonal are ignored and treated as zeros. The
    /// eigenvalues and iteration counters are reset, and the generator of the exceptional shifts
    /// is reseeded, so that two runs on the same input take the same steps.
    ///
    /// Returns [`LinalgError::NotSquare`] if `h` is not square.
    pub fn setup(&mut self, h: MatRef<'_, E>) -> Result<(), LinalgError> {
        let (m, n) = h.shape();
        if m != n {
            return Err(LinalgError::NotSquare { nrows: m, ncols: n });
        }

        self.a.reshape(n, n);
        for j in 0..n {
            for i in 0..Ord::min(j + 2, n) {
                self.a.write(i, j, h.read(i, j));
            }
        }

        if self.accumulate_q {
            self.q.reshape(n, n);
            self.q.as_mut().set_identity();
        } else {
            self.q.reshape(0, 0);
        }

        if self.mem_len < n {
            self.mem = GlobalPodBuffer::new(StackReq::new::<E>(n));
            self.mem_len = n;
        }

        self.rng = StdRng::seed_from_u64(self.seed);
        self.eigenvalues.clear();
        self.steps_per_eigenvalue.clear();
        self.steps = 0;
        self.last_exceptional = 0;
        self.num_exceptional = 0;
        Ok(())
    }

    /// Returns the dimension of the matrix.
    #[inline]
    pub fn dim(&self) -> usize {
        self.a.nrows()
    }

    /// Returns the working matrix.
    #[inline]
    pub fn a(&self) -> MatRef<'_, E> {
        self.a.as_ref()
    }

    /// Returns the accumulated orthogonal transform, if it is being accumulated.
    #[inline]
    pub fn q(&self) -> Option<MatRef<'_, E>> {
        if self.accumulate_q {
            Some(self.q.as_ref())
        } else {
            None
        }
    }

    /// Returns the eigenvalues found so far, in the order they were found.
    #[inline]
    pub fn eigenvalues(&self) -> &[Complex<E>] {
        &self.eigenvalues
    }

    /// Returns the number of eigenvalues found so far.
    #[inline]
    pub fn number_of_eigenvalues(&self) -> usize {
        self.eigenvalues.len()
    }

    /// Returns the number of iterations that each eigenvalue took to converge.
    #[inline]
    pub fn steps_per_eigenvalue(&self) -> &[usize] {
        &self.steps_per_eigenvalue
    }

    /// Returns the number of iterations since the last eigenvalue was found.
    #[inline]
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Returns the iteration count at the last exceptional shift, or zero.
    #[inline]
    pub fn last_exceptional(&self) -> usize {
        self.last_exceptional
    }

    /// Returns the tolerance of the convergence tests.
    #[inline]
    pub fn tolerance(&self) -> Tolerance<E> {
        self.tolerance
    }

    /// Returns the number of iterations without progress after which an exceptional shift is
    /// used.
    #[inline]
    pub fn exceptional_threshold(&self) -> usize {
        self.exceptional_threshold
    }

    /// Returns the number of iterations without progress after which the iteration gives up.
    #[inline]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Returns `true` if an exceptional shift is due.
    #[inline]
    pub fn needs_exceptional_shift(&self) -> bool {
        self.steps - self.last_exceptional > self.exceptional_threshold
    }

    #[inline]
    pub fn increment_steps(&mut self) {
        self.steps += 1;
    }

    /// Returns `true` if the element at `(row, col)` is negligible compared to its neighbors
    /// above and to the right, with `col = row - 1` for a subdiagonal element.
    #[inline]
    pub fn is_zero(&self, row: usize, col: usize) -> bool {
        let target = self.a.read(row, col).abs();
        let above = self.a.read(row - 1, col).abs();
        let right = self.a.read(row, col + 1).abs();
        target <= E::from_f64(0.5) * self.tolerance.eps * (above + right)
    }

    /// Records the diagonal element at `index` as a real eigenvalue.
    pub fn add_eigen_at(&mut self, index: usize) {
        let value = self.a.read(index, index);
        self.add_eigenvalue(Complex::new(value, E::zero()));
    }

    /// Records both eigenvalues of the `2×2` block starting at `(x1, x1)`, where `x2 == x1 + 1`.
    pub fn add_computed_eigen_2x2(&mut self, x1: usize, x2: usize) {
        let (l0, l1) = self.eigenvalues_2x2(x1, x2);
        self.add_eigenvalue(l0);
        self.add_eigenvalue(l1);
    }

    /// Returns `true` if the `2×2` block starting at `(x1, x1)` has real eigenvalues.
    pub fn is_real_2x2(&self, x1: usize, x2: usize) -> bool {
        let (l0, _) = self.eigenvalues_2x2(x1, x2);
        l0.im == E::zero()
    }

    fn eigenvalues_2x2(&self, x1: usize, x2: usize) -> (Complex<E>, Complex<E>) {
        let a = &self.a;
        eigenvalues_2x2(a.read(x1, x1), a.read(x1, x2), a.read(x2, x1), a.read(x2, x2))
    }

    fn add_eigenvalue(&mut self, value: Complex<E>) {
        log::debug!(
            "eigenvalue {} = {value:?} found after {} steps",
            self.eigenvalues.len(),
            self.steps,
        );
        self.eigenvalues.push(value);
        self.steps_per_eigenvalue.push(self.steps);
        self.steps = 0;
        self.last_exceptional = 0;
    }

    /// Performs a single-shift sweep over `[x1, x2]` with a random shift of the same magnitude
    /// as the trailing diagonal element, and returns the shift.
    ///
    /// The randomization shrinks as more exceptional shifts are used, so that the shift gets
    /// closer to the diagonal element.
    pub fn exceptional_shift(&mut self, x1: usize, x2: usize) -> E {
        let mut shift = self.a.read(x2, x2).abs();
        if shift == E::zero() {
            shift = E::one();
        }

        self.num_exceptional += 1;
        let p = E::one() - E::from_f64(0.1).powi(self.num_exceptional as i32);
        let r = E::from_f64(self.rng.gen::<f64>());
        shift *= p + E::from_f64(2.0) * (E::one() - p) * (r - E::from_f64(0.5));
        if self.rng.gen::<bool>() {
            shift = -shift;
        }

        log::trace!(
            "exceptional shift {shift:?} over [{x1}, {x2}] after {} steps",
            self.steps
        );
        self.perform_implicit_single_step(x1, x2, shift);
        self.last_exceptional = self.steps;
        shift
    }

    /// Performs a double-shift sweep over `[x1, x2]`, with the eigenvalues of the trailing `2×2`
    /// block of the window as shifts.
    ///
    /// # Panics
    /// Panics if the window has fewer than three rows.
    #[track_caller]
    pub fn implicit_double_step(&mut self, x1: usize, x2: usize) {
        assert!(x2 >= x1 + 2);
        let a = &self.a;

        let mut z = [
            a.read(x1, x1),
            a.read(x1 + 1, x1),
            a.read(x1, x1 + 1),
            a.read(x1 + 1, x1 + 1),
            a.read(x1 + 2, x1 + 1),
            a.read(x2 - 1, x2 - 1),
            a.read(x2 - 1, x2),
            a.read(x2, x2 - 1),
            a.read(x2, x2),
        ];
        let max = z
            .iter()
            .fold(E::zero(), |max, &v| if v.abs() > max { v.abs() } else { max });
        if max > E::zero() {
            for v in z.iter_mut() {
                *v /= max;
            }
        }
        let [a11, a21, a12, a22, a32, z11, z12, z21, z22] = z;

        let b11 = (a11 - z11) * (a11 - z22) - z21 * z12 + a12 * a21;
        let b21 = (a11 + a22 - z11 - z22) * a21;
        let b31 = a32 * a21;

        self.double_sweep(x1, x2, b11, b21, b31);
    }

    /// Performs a double-shift sweep over `[x1, x2]` with the shifts `re ± im·i`.
    ///
    /// # Panics
    /// Panics if the window has fewer than three rows.
    #[track_caller]
    pub fn perform_implicit_double_step(&mut self, x1: usize, x2: usize, re: E, im: E) {
        assert!(x2 >= x1 + 2);
        let a = &self.a;
        let a11 = a.read(x1, x1);
        let a21 = a.read(x1 + 1, x1);
        let a12 = a.read(x1, x1 + 1);
        let a22 = a.read(x1 + 1, x1 + 1);
        let a32 = a.read(x1 + 2, x1 + 1);

        let p_plus_t = E::from_f64(2.0) * re;
        let p_times_t = re * re + im * im;

        let b11 = a11 * a11 - p_plus_t * a11 + p_times_t + a12 * a21;
        let b21 = (a11 + a22 - p_plus_t) * a21;
        let b31 = a32 * a21;

        self.double_sweep(x1, x2, b11, b21, b31);
    }

    /// Performs a single-shift sweep over `[x1, x2]` with the given shift.
    ///
    /// # Panics
    /// Panics if the window has fewer than two rows.
    #[track_caller]
    pub fn perform_implicit_single_step(&mut self, x1: usize, x2: usize, shift: E) {
        assert!(x2 >= x1 + 1);
        let b11 = self.a.read(x1, x1) - shift;
        let b21 = self.a.read(x1 + 1, x1);
        let threshold = self.a.read(x1, x1).abs() * self.tolerance.eps;

        if !self.bulge_single(x1, b11, b21, threshold, false) {
            return;
        }
        self.accumulate(x1, 2);

        for i in x1..x2 - 1 {
            if self.bulge_single_at(i) {
                self.accumulate(i + 1, 2);
            }
        }
    }

    fn double_sweep(&mut self, x1: usize, x2: usize, b11: E, b21: E, b31: E) {
        if !self.bulge_double(x1, b11, b21, b31, E::zero(), false) {
            return;
        }
        self.accumulate(x1, 3);

        for i in x1..x2 - 2 {
            if self.bulge_double_at(i) {
                self.accumulate(i + 1, 3);
            }
        }

        // the last reflector only spans two rows
        if x2 >= 2 && self.bulge_single_at(x2 - 2) {
            self.accumulate(x2 - 1, 2);
        }
    }

    fn bulge_double_at(&mut self, i: usize) -> bool {
        let a11 = self.a.read(i + 1, i);
        let a21 = self.a.read(i + 2, i);
        let a31 = self.a.read(i + 3, i);
        let threshold = self.a.read(i, i).abs() * self.tolerance.eps;
        self.bulge_double(i + 1, a11, a21, a31, threshold, true)
    }

    fn bulge_single_at(&mut self, i: usize) -> bool {
        let a11 = self.a.read(i + 1, i);
        let a21 = self.a.read(i + 2, i);
        let threshold = self.a.read(i, i).abs() * self.tolerance.eps;
        self.bulge_single(i + 1, a11, a21, threshold, true)
    }

    /// Computes the reflector mapping `(a11, a21, a31)` to a multiple of the first unit vector,
    /// and applies it to rows and columns `i..i + 3`. If `set`, the bulge in column `i - 1` is
    /// replaced by its image.
    fn bulge_double(&mut self, i: usize, a11: E, a21: E, a31: E, threshold: E, set: bool) -> bool {
        let max = a11.abs().max(a21.abs()).max(a31.abs());
        if max <= threshold {
            if set {
                self.a.write(i, i - 1, E::zero());
                self.a.write(i + 1, i - 1, E::zero());
                self.a.write(i + 2, i - 1, E::zero());
            }
            return false;
        }

        let (a11, a21, a31) = (a11 / max, a21 / max, a31 / max);
        let mut tau = (a11 * a11 + a21 * a21 + a31 * a31).sqrt();
        if a11 < E::zero() {
            tau = -tau;
        }
        let div = a11 + tau;
        self.u = [E::one(), a21 / div, a31 / div];
        self.gamma = div / tau;

        self.apply_similarity(i, 3);
        if set {
            self.a.write(i, i - 1, -max * tau);
            self.a.write(i + 1, i - 1, E::zero());
            self.a.write(i + 2, i - 1, E::zero());
        }
        true
    }

    /// Two row version of [`bulge_double`](Self::bulge_double).
    fn bulge_single(&mut self, i: usize, a11: E, a21: E, threshold: E, set: bool) -> bool {
        let max = a11.abs().max(a21.abs());
        if max <= threshold {
            if set {
                self.a.write(i, i - 1, E::zero());
                self.a.write(i + 1, i - 1, E::zero());
            }
            return false;
        }

        let (a11, a21) = (a11 / max, a21 / max);
        let mut tau = (a11 * a11 + a21 * a21).sqrt();
        if a11 < E::zero() {
            tau = -tau;
        }
        let div = a11 + tau;
        self.u = [E::one(), a21 / div, E::zero()];
        self.gamma = div / tau;

        self.apply_similarity(i, 2);
        if set {
            self.a.write(i, i - 1, -max * tau);
            self.a.write(i + 1, i - 1, E::zero());
        }
        true
    }

    /// Applies the current reflector to rows `i..i + len` from the left, then to the same
    /// columns from the right.
    fn apply_similarity(&mut self, i: usize, len: usize) {
        let n = self.a.nrows();
        let essential = &self.u[1..len];
        let mut a = self.a.as_mut();

        apply_householder_on_the_left(
            a.rb_mut().subrows_mut(i, len),
            essential,
            self.gamma,
            PodStack::new(&mut self.mem),
        );
        apply_householder_on_the_right(
            a.rb_mut().submatrix_mut(0, i, n, len),
            essential,
            self.gamma,
            PodStack::new(&mut self.mem),
        );
    }

    /// Multiplies the accumulated transform by the current reflector from the left.
    fn accumulate(&mut self, i: usize, len: usize) {
        if !self.accumulate_q {
            return;
        }
        apply_householder_on_the_left(
            self.q.as_mut().subrows_mut(i, len),
            &self.u[1..len],
            self.gamma,
            PodStack::new(&mut self.mem),
        );
    }
}
