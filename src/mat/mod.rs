//! Dense matrices and strided matrix views.
//!
//! [`Mat`] owns its storage, which is either row-major or column-major depending on its
//! [`Layout`]. [`MatRef`] and [`MatMut`] are the borrowed counterparts: a pointer, a shape, and a
//! row and column stride, specified in number of elements. Every algorithm in the crate is
//! written against views, so the index arithmetic is confined to this module.

use core::{marker::PhantomData, ptr::NonNull};
use reborrow::*;

mod matmut;
mod matown;
mod matref;

pub use matmut::MatMut;
pub use matown::Mat;
pub use matref::MatRef;

/// Storage order of an owned matrix.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Layout {
    /// Consecutive elements of a row are adjacent in memory.
    RowMajor,
    /// Consecutive elements of a column are adjacent in memory.
    #[default]
    ColMajor,
}

impl Layout {
    /// Returns the `(row_stride, col_stride)` of a matrix with the given number of rows and
    /// columns stored contiguously with this layout.
    #[inline]
    pub fn strides(self, nrows: usize, ncols: usize) -> (isize, isize) {
        match self {
            Layout::RowMajor => (ncols as isize, 1),
            Layout::ColMajor => (1, nrows as isize),
        }
    }
}

struct MatImpl<E> {
    ptr: NonNull<E>,
    nrows: usize,
    ncols: usize,
    row_stride: isize,
    col_stride: isize,
}

impl<E> Copy for MatImpl<E> {}
impl<E> Clone for MatImpl<E> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> MatImpl<E> {
    #[inline(always)]
    fn ptr_at(&self, row: usize, col: usize) -> *mut E {
        self.ptr
            .as_ptr()
            .wrapping_offset(row as isize * self.row_stride)
            .wrapping_offset(col as isize * self.col_stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assert, mat};

    #[test]
    fn test_views_over_both_layouts() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

        let row_major = Mat::from_row_major(2, 3, &data);
        let col_major = Mat::from_col_major(3, 2, &data);

        assert!(row_major.as_ref().row_stride() == 3);
        assert!(col_major.as_ref().col_stride() == 3);

        for i in 0..2 {
            for j in 0..3 {
                assert!(row_major.read(i, j) == col_major.read(j, i));
            }
        }
        assert!(row_major.as_ref().row_as_slice(1) == &[4.0, 5.0, 6.0]);
        assert!(col_major.as_ref().col_as_slice(1) == &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_submatrix_and_split() {
        let m = Mat::from_fn(4, 5, |i, j| (10 * i + j) as f64);
        let sub = m.as_ref().submatrix(1, 2, 2, 3);
        assert!(sub.shape() == (2, 3));
        assert!(sub.read(0, 0) == 12.0);
        assert!(sub.read(1, 2) == 24.0);

        let (top, bot) = m.as_ref().split_at_row(3);
        assert!(top.nrows() == 3);
        assert!(bot.read(0, 4) == 34.0);

        let (left, right) = m.as_ref().split_at_col(1);
        assert!(left.ncols() == 1);
        assert!(right.read(2, 0) == 21.0);

        let t = m.as_ref().transpose();
        assert!(t.shape() == (5, 4));
        assert!(t.read(4, 3) == 34.0);
    }

    fn assert_copy<T: Copy>() {}

    #[test]
    fn test_views_are_copy_for_any_element() {
        assert_copy::<MatImpl<String>>();
        assert_copy::<MatRef<'static, String>>();
        assert_copy::<MatRef<'static, Vec<f64>>>();

        let m = Mat::from_fn(2, 2, |i, j| (i + j) as f64);
        let a = m.as_ref();
        let b = a;
        assert!(a.read(1, 1) == b.read(1, 1));
    }

    #[test]
    fn test_mutable_splits_are_disjoint() {
        let mut m = Mat::<f64>::zeros(4, 4);
        {
            let (top, bot) = m.as_mut().split_at_row_mut(2);
            let (mut tl, mut tr) = top.split_at_col_mut(2);
            let (mut bl, mut br) = bot.split_at_col_mut(2);
            tl.fill(1.0);
            tr.fill(2.0);
            bl.fill(3.0);
            br.fill(4.0);
        }
        assert!(m.read(0, 0) == 1.0);
        assert!(m.read(1, 3) == 2.0);
        assert!(m.read(3, 0) == 3.0);
        assert!(m.read(2, 2) == 4.0);
    }

    #[test]
    fn test_reshape_and_resize() {
        let mut m = mat![[1.0, 2.0], [3.0, 4.0]];
        m.resize_with(3, 3, |i, j| (i + j) as f64 * 100.0);
        assert!(m.shape() == (3, 3));
        assert!(m.read(1, 1) == 4.0);
        assert!(m.read(2, 2) == 400.0);
        assert!(m.read(0, 2) == 200.0);

        m.reshape(2, 5);
        assert!(m.shape() == (2, 5));
        for i in 0..2 {
            for j in 0..5 {
                assert!(m.read(i, j) == 0.0);
            }
        }
    }

    #[test]
    fn test_copy_between_layouts() {
        let a = Mat::from_fn(3, 4, |i, j| (i * 4 + j) as f64);
        let b = a.to_layout(Layout::RowMajor);
        assert!(b.layout() == Layout::RowMajor);
        assert!(a == b);

        let mut c = Mat::<f64>::zeros_with_layout(3, 4, Layout::RowMajor);
        c.as_mut().copy_from(a.as_ref());
        assert!(c == a);
    }

    #[test]
    fn test_identity() {
        let i = Mat::<f64>::identity(3, 2);
        assert!(i.read(0, 0) == 1.0);
        assert!(i.read(1, 1) == 1.0);
        assert!(i.read(2, 1) == 0.0);
        assert!(i.read(0, 1) == 0.0);
    }

    #[test]
    fn test_reborrow() {
        let mut m = Mat::<f64>::zeros(2, 2);
        let mut view = m.as_mut();
        view.rb_mut().write(0, 1, 3.0);
        let r = view.rb();
        assert!(r.read(0, 1) == 3.0);
        let c = view.into_const();
        assert!(c.read(0, 1) == 3.0);
    }
}
