use crate::RealField;
use num_complex::Complex;

/// Computes the eigenvalues of the `2×2` matrix `[[a00, a01], [a10, a11]]`.
///
/// The elements are scaled by the sum of their absolute values first, so that the discriminant
/// neither overflows nor underflows. Real eigenvalues are returned in decreasing order. Complex
/// eigenvalues are returned as a conjugate pair, the one with positive imaginary part first.
pub fn eigenvalues_2x2<E: RealField>(
    a00: E,
    a01: E,
    a10: E,
    a11: E,
) -> (Complex<E>, Complex<E>) {
    let zero = E::zero();
    let half = E::from_f64(0.5);

    let s = a00.abs() + a01.abs() + a10.abs() + a11.abs();
    if s == zero {
        return (Complex::new(zero, zero), Complex::new(zero, zero));
    }

    let (a00, a01, a10, a11) = (a00 / s, a01 / s, a10 / s, a11 / s);

    let tr = (a00 + a11) * half;
    let det = (a00 - tr) * (a00 - tr) + a01 * a10;

    if det >= zero {
        let rtdisc = det.sqrt();
        (
            Complex::new(s * (tr + rtdisc), zero),
            Complex::new(s * (tr - rtdisc), zero),
        )
    } else {
        let rtdisc = (-det).sqrt();
        let re = s * tr;
        let im = s * rtdisc;
        (Complex::new(re, im), Complex::new(re, -im))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_real() {
        let (l0, l1) = eigenvalues_2x2(2.0f64, 1.0, 1.0, 2.0);
        assert!(l0.im == 0.0);
        assert!(l1.im == 0.0);
        assert_approx_eq!(l0.re, 3.0);
        assert_approx_eq!(l1.re, 1.0);
    }

    #[test]
    fn test_complex() {
        let (l0, l1) = eigenvalues_2x2(1.0f64, -2.0, 2.0, 1.0);
        assert_approx_eq!(l0.re, 1.0);
        assert_approx_eq!(l0.im, 2.0);
        assert!(l1 == l0.conj());
    }

    #[test]
    fn test_zero_and_triangular() {
        let (l0, l1) = eigenvalues_2x2(0.0f64, 0.0, 0.0, 0.0);
        assert!(l0 == Complex::new(0.0, 0.0));
        assert!(l1 == Complex::new(0.0, 0.0));

        let (l0, l1) = eigenvalues_2x2(5.0f64, 7.0, 0.0, -1.0);
        assert_approx_eq!(l0.re, 5.0);
        assert_approx_eq!(l1.re, -1.0);
    }

    #[test]
    fn test_extreme_scales() {
        let big = 1e300f64;
        let (l0, l1) = eigenvalues_2x2(big, big, -big, big);
        assert!(l0.re.is_finite());
        assert_approx_eq!(l0.re / big, 1.0);
        assert_approx_eq!(l0.im / big, 1.0);
        assert_approx_eq!(l1.im / big, -1.0);

        let tiny = 1e-300f64;
        let (l0, _) = eigenvalues_2x2(tiny, 0.0, 0.0, tiny * 0.5);
        assert_approx_eq!(l0.re / tiny, 1.0);
    }
}
