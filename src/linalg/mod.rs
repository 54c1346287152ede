//! Linear algebra module.
//!
//! Contains the low level kernels and the decomposition objects built on top of them.
//!
//! # Memory allocation
//! The kernels in this module defer memory allocation to the caller. When an algorithm needs
//! temporary space for intermediate computations, it takes a [`stack: PodStack`](PodStack)
//! parameter. A [`PodStack`] is a thin wrapper over a slice of memory bytes, which may come from
//! any valid source (heap allocation, fixed-size array on the stack, etc.). The functions taking a
//! [`PodStack`] parameter have a corresponding function with a similar name ending in `_req` that
//! returns the memory requirements of the algorithm. For example:
//! [`householder::apply_householder_on_the_left`] and
//! [`householder::apply_householder_on_the_left_req`].
//!
//! The memory stack may be reused in user-code to avoid repeated allocations, and it is also
//! possible to compute the sum ([`StackReq::all_of`]) or union ([`StackReq::any_of`]) of multiple
//! requirements, in order to optimally combine them into a single allocation.
//!
//! The decomposition objects ([`qr::HouseholderTranQr`], [`evd::Eigendecomposition`], ...) own
//! their working storage instead, and grow it lazily to the largest problem they have seen.

use crate::{MatMut, RealField};
use dyn_stack::{PodStack, SizeOverflow, StackReq};

pub mod evd;
pub mod householder;
pub mod matmul;
pub mod qr;
pub mod reductions;
pub mod solvers;
pub mod triangular_solve;

/// Returns the stack requirements for creating a temporary column-major matrix with the given
/// dimensions.
#[inline]
pub fn temp_mat_req<E: RealField>(nrows: usize, ncols: usize) -> Result<StackReq, SizeOverflow> {
    StackReq::try_new::<E>(nrows.checked_mul(ncols).ok_or(SizeOverflow)?)
}

/// Creates a temporary column-major matrix of zero values, from the given memory stack.
#[track_caller]
pub fn temp_mat_zeroed<E: RealField>(
    nrows: usize,
    ncols: usize,
    stack: PodStack<'_>,
) -> (MatMut<'_, E>, PodStack<'_>) {
    let (data, stack) = stack.make_raw::<E>(nrows * ncols);
    let mut mat = MatMut::from_column_major_slice(data, nrows, ncols);
    mat.fill_zero();
    (mat, stack)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assert;
    use dyn_stack::GlobalPodBuffer;

    #[test]
    fn test_temp_mat() {
        let mut mem = GlobalPodBuffer::new(
            StackReq::try_all_of([
                temp_mat_req::<f64>(3, 4).unwrap(),
                temp_mat_req::<f64>(2, 2).unwrap(),
            ])
            .unwrap(),
        );
        let stack = PodStack::new(&mut mem);
        let (a, stack) = temp_mat_zeroed::<f64>(3, 4, stack);
        let (b, _) = temp_mat_zeroed::<f64>(2, 2, stack);
        assert!(a.shape() == (3, 4));
        assert!(b.shape() == (2, 2));
        assert!(a.read(2, 3) == 0.0);

        assert!(temp_mat_req::<f64>(usize::MAX, 2).is_err());
    }
}
