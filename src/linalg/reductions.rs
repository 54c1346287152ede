//! Matrix reductions and cheap diagnostics.

use crate::{MatRef, RealField};

/// Returns the largest absolute value of the elements of `mat`, or zero if it is empty.
pub fn norm_max<E: RealField>(mat: MatRef<'_, E>) -> E {
    let mut max = E::zero();
    for j in 0..mat.ncols() {
        for i in 0..mat.nrows() {
            let v = unsafe { mat.read_unchecked(i, j) }.abs();
            if v > max {
                max = v;
            }
        }
    }
    max
}

/// Returns the largest absolute value of the diagonal elements of `mat`.
pub fn diag_norm_max<E: RealField>(mat: MatRef<'_, E>) -> E {
    let mut max = E::zero();
    for i in 0..Ord::min(mat.nrows(), mat.ncols()) {
        let v = unsafe { mat.read_unchecked(i, i) }.abs();
        if v > max {
            max = v;
        }
    }
    max
}

/// Returns `true` if any element of `mat` is NaN or infinite.
///
/// The decompositions do not check their inputs or results for such values. This is meant to be
/// called by the user when they need that guarantee.
pub fn has_uncountable<E: RealField>(mat: MatRef<'_, E>) -> bool {
    for j in 0..mat.ncols() {
        for i in 0..mat.nrows() {
            if !unsafe { mat.read_unchecked(i, j) }.is_finite() {
                return true;
            }
        }
    }
    false
}

/// Returns a scale invariant indicator of how close a triangular matrix is to being singular.
///
/// The value is the absolute product of the diagonal elements, each divided by the largest
/// absolute diagonal element. It is zero for a singular matrix and one for a multiple of the
/// identity. This is not a condition number, only a cheap way to compare systems.
pub fn quality_triangular<E: RealField>(triangular: MatRef<'_, E>) -> E {
    let max = diag_norm_max(triangular);
    if max == E::zero() {
        return E::zero();
    }
    let mut quality = E::one();
    for i in 0..Ord::min(triangular.nrows(), triangular.ncols()) {
        quality *= unsafe { triangular.read_unchecked(i, i) } / max;
    }
    quality.abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert, mat, Mat};

    #[test]
    fn test_norm_max() {
        let m = mat![[1.0, -7.0], [3.0, 2.0]];
        assert!(norm_max(m.as_ref()) == 7.0);
        assert!(diag_norm_max(m.as_ref()) == 2.0);
        assert!(norm_max(Mat::<f64>::new().as_ref()) == 0.0);
    }

    #[test]
    fn test_has_uncountable() {
        let mut m = mat![[1.0, 2.0], [3.0, 4.0]];
        assert!(!has_uncountable(m.as_ref()));
        m.write(1, 0, f64::NAN);
        assert!(has_uncountable(m.as_ref()));
        m.write(1, 0, f64::NEG_INFINITY);
        assert!(has_uncountable(m.as_ref()));
    }

    #[test]
    fn test_quality_triangular() {
        let a = Mat::from_diagonal(&[4.0f64, 3.0, 2.0, 1.0]);
        let b = Mat::from_diagonal(&[4.0, 3.0, 2.0, 0.1]);
        let qa = quality_triangular(a.as_ref());
        let qb = quality_triangular(b.as_ref());
        assert!(qb < qa);

        let scaled = Mat::from_diagonal(&[40.0, 30.0, 20.0, 10.0]);
        let qs = quality_triangular(scaled.as_ref());
        assert!((qa - qs).abs() < 1e-15);

        assert!(quality_triangular(Mat::<f64>::zeros(3, 3).as_ref()) == 0.0);
        assert!(quality_triangular(Mat::<f64>::identity(3, 3).as_ref()) == 1.0);
    }
}
