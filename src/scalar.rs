//! Scalar types the decompositions are generic over, and the tolerance policy.

use core::fmt::Debug;

/// Real floating point scalar.
///
/// Implemented for [`f32`] and [`f64`]. All algorithms in the crate are written once against this
/// trait.
pub trait RealField:
    num_traits::Float + num_traits::NumAssign + bytemuck::Pod + Debug + Default + Send + Sync + 'static
{
    /// Machine epsilon of the type, `~1.2e-7` for `f32` and `~2.2e-16` for `f64`.
    const EPSILON: Self;

    /// Converts an `f64` constant to `Self`, rounding if needed.
    fn from_f64(value: f64) -> Self;

    /// Converts a count to `Self`.
    #[inline]
    fn from_usize(value: usize) -> Self {
        Self::from_f64(value as f64)
    }
}

impl RealField for f32 {
    const EPSILON: Self = f32::EPSILON;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl RealField for f64 {
    const EPSILON: Self = f64::EPSILON;

    #[inline]
    fn from_f64(value: f64) -> Self {
        value
    }
}

/// Tolerance policy used by the convergence and singularity tests.
///
/// The default is [`Tolerance::machine`], which uses the machine epsilon of `E`. A looser or
/// tighter policy can be passed to the solvers that accept one.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Tolerance<E: RealField> {
    /// Relative epsilon.
    pub eps: E,
}

impl<E: RealField> Default for Tolerance<E> {
    #[inline]
    fn default() -> Self {
        Self::machine()
    }
}

impl<E: RealField> Tolerance<E> {
    /// Tolerance equal to the machine epsilon of `E`.
    #[inline]
    pub fn machine() -> Self {
        Self { eps: E::EPSILON }
    }

    /// Tolerance with a custom relative epsilon.
    #[inline]
    pub fn new(eps: E) -> Self {
        Self { eps }
    }

    /// Returns `true` if `value` is negligible relative to `scale`, that is
    /// `|value| <= eps * scale`.
    #[inline]
    pub fn is_negligible(&self, value: E, scale: E) -> bool {
        value.abs() <= self.eps * scale
    }

    /// Returns `true` if `a` and `b` are equal up to `factor * eps`, relative to `scale`.
    #[inline]
    pub fn is_relatively_equal(&self, a: E, b: E, scale: E, factor: E) -> bool {
        (a - b).abs() / scale < factor * self.eps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert;

    #[test]
    fn test_epsilon() {
        assert!(<f64 as RealField>::EPSILON == f64::EPSILON);
        assert!(<f32 as RealField>::EPSILON == f32::EPSILON);
        assert!(Tolerance::<f64>::default() == Tolerance::machine());
    }

    #[test]
    fn test_negligible() {
        let tol = Tolerance::<f64>::machine();
        assert!(tol.is_negligible(1e-17, 1.0));
        assert!(!tol.is_negligible(1e-10, 1.0));
        assert!(tol.is_negligible(1e-7, 1e10));

        let loose = Tolerance::new(1e-6);
        assert!(loose.is_negligible(1e-7, 1.0));
    }

    #[test]
    fn test_relatively_equal() {
        let tol = Tolerance::<f64>::machine();
        assert!(tol.is_relatively_equal(2.0, 2.0 + 1e-15, 2.0, 100.0));
        assert!(!tol.is_relatively_equal(2.0, 2.0 + 1e-12, 2.0, 100.0));
    }
}
