//! `qreig` implements Householder based dense QR decompositions and the implicit double-shift QR
//! eigenvalue algorithm.
//!
//! The crate provides:
//! - Householder reflector kernels, see [`linalg::householder`].
//! - Unblocked QR decompositions with transposed or column-major working storage, and a
//!   column-pivoting variant, see [`linalg::qr`].
//! - A blocked QR decomposition over [`block::BlockMat`] using the compact WY representation,
//!   with the trailing updates optionally dispatched over a rayon thread pool.
//! - QR based linear solvers, see [`linalg::solvers`].
//! - Hessenberg reduction and the eigenvalue/eigenvector solvers, see [`linalg::evd`].
//!
//! Low-level kernels take views ([`MatRef`], [`MatMut`]) and scratch memory from a
//! [`dyn_stack::PodStack`], and panic on shape mismatches. The decomposition objects own their
//! working storage, and report recoverable failures through [`LinalgError`].
//!
//! # Example
//! ```
//! use qreig::linalg::qr::{HouseholderTranQr, QrDecomposition};
//! use qreig::mat;
//!
//! let a = mat![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
//! let mut qr = HouseholderTranQr::new();
//! qr.decompose(a.as_ref()).unwrap();
//!
//! let q = qr.q(true);
//! let r = qr.r(true);
//! assert_eq!(q.shape(), (3, 2));
//! assert_eq!(r.shape(), (2, 2));
//! ```

#![allow(clippy::too_many_arguments)]
#![allow(non_snake_case)]
#![cfg_attr(docsrs, feature(doc_cfg))]

use core::sync::atomic::AtomicUsize;
use equator::{assert, debug_assert};

pub use dyn_stack;
pub use num_complex;
pub use reborrow;

pub mod block;
pub mod linalg;
pub mod mat;
pub mod scalar;
pub mod utils;

pub use block::BlockMat;
pub use mat::{Layout, Mat, MatMut, MatRef};
pub use scalar::{RealField, Tolerance};

/// Creates a [`Mat`] containing the arguments, given row by row.
///
/// ```
/// use qreig::mat;
///
/// let m = mat![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
///
/// assert_eq!(m.shape(), (2, 3));
/// assert_eq!(m.read(1, 0), 4.0);
/// ```
#[macro_export]
macro_rules! mat {
    () => {
        {
            compile_error!("number of columns in the matrix is ambiguous");
        }
    };

    ($([$($v:expr),* $(,)?] ),* $(,)?) => {
        {
            let rows: &[&[_]] = &[$(&[$($v),*]),*];
            $crate::mat::Mat::from_rows(rows)
        }
    };
}

#[cfg(feature = "perf-warn")]
#[macro_export]
#[doc(hidden)]
macro_rules! __perf_warn {
    ($name: ident) => {{
        #[inline(always)]
        #[allow(non_snake_case)]
        fn $name() -> &'static ::core::sync::atomic::AtomicBool {
            static $name: ::core::sync::atomic::AtomicBool =
                ::core::sync::atomic::AtomicBool::new(false);
            &$name
        }
        ::core::matches!(
            $name().compare_exchange(
                false,
                true,
                ::core::sync::atomic::Ordering::Relaxed,
                ::core::sync::atomic::Ordering::Relaxed,
            ),
            Ok(_)
        )
    }};
}

/// Errors reported by the decompositions and solvers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum LinalgError {
    /// An input or output matrix does not have the shape the operation requires.
    DimensionMismatch {
        /// Shape that was required, as `(nrows, ncols)`.
        expected: (usize, usize),
        /// Shape that was provided.
        found: (usize, usize),
    },
    /// The operation requires a square matrix.
    NotSquare {
        /// Number of rows of the input.
        nrows: usize,
        /// Number of columns of the input.
        ncols: usize,
    },
    /// The system has fewer equations than unknowns, which the solver does not support.
    Underdetermined {
        /// Number of rows of the input.
        nrows: usize,
        /// Number of columns of the input.
        ncols: usize,
    },
    /// A pivot of a triangular factor is zero to working precision.
    Singular {
        /// Index of the offending diagonal entry.
        index: usize,
    },
    /// The eigenvalue iteration ran out of iterations before deflating the whole matrix.
    NoConvergence {
        /// Number of eigenvalues that were found before giving up.
        found: usize,
        /// Number of iterations spent on the eigenvalue that failed to converge.
        steps: usize,
    },
}

impl core::fmt::Display for LinalgError {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for LinalgError {}

/// Checks that `found` matches `expected`, or reports a [`LinalgError::DimensionMismatch`].
#[inline]
pub(crate) fn check_shape(
    expected: (usize, usize),
    found: (usize, usize),
) -> Result<(), LinalgError> {
    if expected == found {
        Ok(())
    } else {
        Err(LinalgError::DimensionMismatch { expected, found })
    }
}

/// Parallelism strategy that can be passed to the routines that support it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Parallelism {
    /// No parallelism.
    ///
    /// The code is executed sequentially on the same thread that calls a function
    /// and passes this argument.
    None,
    /// Rayon parallelism. Only available with the `rayon` feature.
    ///
    /// The code is possibly executed in parallel on the current thread, as well as the currently
    /// active rayon thread pool.
    ///
    /// The contained value represents a hint about the number of threads an implementation should
    /// use, but there is no way to guarantee how many or which threads will be used.
    ///
    /// A value of `0` treated as equivalent to `rayon::current_num_threads()`.
    #[cfg(feature = "rayon")]
    #[cfg_attr(docsrs, doc(cfg(feature = "rayon")))]
    Rayon(usize),
}

/// 0: Disable
/// 1: None
/// n >= 2: Rayon(n - 2)
///
/// default: Rayon(0)
static GLOBAL_PARALLELISM: AtomicUsize = {
    #[cfg(feature = "rayon")]
    {
        AtomicUsize::new(2)
    }
    #[cfg(not(feature = "rayon"))]
    {
        AtomicUsize::new(1)
    }
};

/// Causes functions that access global parallelism settings to panic.
pub fn disable_global_parallelism() {
    GLOBAL_PARALLELISM.store(0, core::sync::atomic::Ordering::Relaxed);
}

/// Sets the global parallelism settings.
pub fn set_global_parallelism(parallelism: Parallelism) {
    let value = match parallelism {
        Parallelism::None => 1,
        #[cfg(feature = "rayon")]
        Parallelism::Rayon(n) => n.saturating_add(2),
    };
    GLOBAL_PARALLELISM.store(value, core::sync::atomic::Ordering::Relaxed);
}

/// Gets the global parallelism settings.
///
/// # Panics
/// Panics if global parallelism is disabled.
#[track_caller]
pub fn get_global_parallelism() -> Parallelism {
    let value = GLOBAL_PARALLELISM.load(core::sync::atomic::Ordering::Relaxed);
    match value {
        0 => panic!("Global parallelism is disabled."),
        1 => Parallelism::None,
        #[cfg(feature = "rayon")]
        n => Parallelism::Rayon(n - 2),
        #[cfg(not(feature = "rayon"))]
        _ => unreachable!(),
    }
}
