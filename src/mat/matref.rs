use super::*;
use crate::{assert, debug_assert};

/// Immutable view over a matrix, similar to an immutable reference to a 2D strided [prim@slice].
pub struct MatRef<'a, E> {
    pub(super) inner: MatImpl<E>,
    pub(super) __marker: PhantomData<&'a E>,
}

unsafe impl<E: Sync> Send for MatRef<'_, E> {}
unsafe impl<E: Sync> Sync for MatRef<'_, E> {}

impl<E> Clone for MatRef<'_, E> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for MatRef<'_, E> {}

impl<'short, E> Reborrow<'short> for MatRef<'_, E> {
    type Target = MatRef<'short, E>;

    #[inline]
    fn rb(&'short self) -> Self::Target {
        *self
    }
}

impl<'short, E> ReborrowMut<'short> for MatRef<'_, E> {
    type Target = MatRef<'short, E>;

    #[inline]
    fn rb_mut(&'short mut self) -> Self::Target {
        *self
    }
}

impl<E> IntoConst for MatRef<'_, E> {
    type Target = Self;

    #[inline]
    fn into_const(self) -> Self::Target {
        self
    }
}

impl<'a, E: Copy> MatRef<'a, E> {
    /// Creates a `MatRef` from a pointer to the matrix data, its dimensions and strides.
    ///
    /// # Safety
    /// The behavior is undefined if any of the following conditions are violated:
    /// * For each matrix unit, the entire memory region addressed by the matrix must be contained
    /// within a single allocation, accessible in its entirety by the corresponding pointer in
    /// `ptr`.
    /// * `ptr` must be non null and properly aligned for type `E`.
    /// * The values accessible by the matrix must be initialized and must not be mutated for the
    /// duration of the lifetime `'a`.
    #[inline(always)]
    pub unsafe fn from_raw_parts(
        ptr: *const E,
        nrows: usize,
        ncols: usize,
        row_stride: isize,
        col_stride: isize,
    ) -> Self {
        Self {
            inner: MatImpl {
                ptr: NonNull::new_unchecked(ptr as *mut E),
                nrows,
                ncols,
                row_stride,
                col_stride,
            },
            __marker: PhantomData,
        }
    }

    /// Creates a view over a row-major slice.
    ///
    /// # Panics
    /// Panics if `slice.len() != nrows * ncols`.
    #[track_caller]
    #[inline]
    pub fn from_row_major_slice(slice: &'a [E], nrows: usize, ncols: usize) -> Self {
        assert!(slice.len() == nrows * ncols);
        unsafe { Self::from_raw_parts(slice.as_ptr(), nrows, ncols, ncols as isize, 1) }
    }

    /// Creates a view over a column-major slice.
    ///
    /// # Panics
    /// Panics if `slice.len() != nrows * ncols`.
    #[track_caller]
    #[inline]
    pub fn from_column_major_slice(slice: &'a [E], nrows: usize, ncols: usize) -> Self {
        assert!(slice.len() == nrows * ncols);
        unsafe { Self::from_raw_parts(slice.as_ptr(), nrows, ncols, 1, nrows as isize) }
    }

    /// Returns a pointer to the matrix data.
    #[inline(always)]
    pub fn as_ptr(self) -> *const E {
        self.inner.ptr.as_ptr()
    }

    /// Returns the number of rows of the matrix.
    #[inline(always)]
    pub fn nrows(&self) -> usize {
        self.inner.nrows
    }

    /// Returns the number of columns of the matrix.
    #[inline(always)]
    pub fn ncols(&self) -> usize {
        self.inner.ncols
    }

    /// Returns the number of rows and columns of the matrix.
    #[inline(always)]
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows(), self.ncols())
    }

    /// Returns the row stride of the matrix, specified in number of elements, not in bytes.
    #[inline(always)]
    pub fn row_stride(&self) -> isize {
        self.inner.row_stride
    }

    /// Returns the column stride of the matrix, specified in number of elements, not in bytes.
    #[inline(always)]
    pub fn col_stride(&self) -> isize {
        self.inner.col_stride
    }

    /// Returns a raw pointer to the element at the given index.
    #[inline(always)]
    pub fn ptr_at(self, row: usize, col: usize) -> *const E {
        self.inner.ptr_at(row, col)
    }

    /// Reads the value of the element at the given index, without bound checks.
    ///
    /// # Safety
    /// The behavior is undefined if `row >= self.nrows()` or `col >= self.ncols()`.
    #[inline(always)]
    #[track_caller]
    pub unsafe fn read_unchecked(&self, row: usize, col: usize) -> E {
        debug_assert!(all(row < self.nrows(), col < self.ncols()));
        *self.inner.ptr_at(row, col)
    }

    /// Reads the value of the element at the given index.
    ///
    /// # Panics
    /// Panics if `row >= self.nrows()` or `col >= self.ncols()`.
    #[inline(always)]
    #[track_caller]
    pub fn read(&self, row: usize, col: usize) -> E {
        assert!(all(row < self.nrows(), col < self.ncols()));
        unsafe { self.read_unchecked(row, col) }
    }

    /// Returns the submatrix starting at `(row_start, col_start)` with the given dimensions.
    ///
    /// # Panics
    /// Panics if the submatrix is not contained in `self`.
    #[track_caller]
    #[inline]
    pub fn submatrix(self, row_start: usize, col_start: usize, nrows: usize, ncols: usize) -> Self {
        assert!(all(row_start <= self.nrows(), col_start <= self.ncols()));
        assert!(all(
            nrows <= self.nrows() - row_start,
            ncols <= self.ncols() - col_start,
        ));
        unsafe {
            Self::from_raw_parts(
                self.ptr_at(row_start, col_start),
                nrows,
                ncols,
                self.row_stride(),
                self.col_stride(),
            )
        }
    }

    /// Returns the rows in `row_start..row_start + nrows`.
    #[track_caller]
    #[inline]
    pub fn subrows(self, row_start: usize, nrows: usize) -> Self {
        let ncols = self.ncols();
        self.submatrix(row_start, 0, nrows, ncols)
    }

    /// Returns the columns in `col_start..col_start + ncols`.
    #[track_caller]
    #[inline]
    pub fn subcols(self, col_start: usize, ncols: usize) -> Self {
        let nrows = self.nrows();
        self.submatrix(0, col_start, nrows, ncols)
    }

    /// Splits the matrix horizontally at the given row, into a top and a bottom part.
    #[track_caller]
    #[inline]
    pub fn split_at_row(self, row: usize) -> (Self, Self) {
        assert!(row <= self.nrows());
        let nrows = self.nrows();
        (self.subrows(0, row), self.subrows(row, nrows - row))
    }

    /// Splits the matrix vertically at the given column, into a left and a right part.
    #[track_caller]
    #[inline]
    pub fn split_at_col(self, col: usize) -> (Self, Self) {
        assert!(col <= self.ncols());
        let ncols = self.ncols();
        (self.subcols(0, col), self.subcols(col, ncols - col))
    }

    /// Returns the `i`-th row as a `1×ncols` view.
    #[track_caller]
    #[inline]
    pub fn row(self, i: usize) -> Self {
        assert!(i < self.nrows());
        self.subrows(i, 1)
    }

    /// Returns the `j`-th column as a `nrows×1` view.
    #[track_caller]
    #[inline]
    pub fn col(self, j: usize) -> Self {
        assert!(j < self.ncols());
        self.subcols(j, 1)
    }

    /// Returns a view over the transpose of `self`.
    #[inline]
    pub fn transpose(self) -> Self {
        unsafe {
            Self::from_raw_parts(
                self.as_ptr(),
                self.ncols(),
                self.nrows(),
                self.col_stride(),
                self.row_stride(),
            )
        }
    }

    /// Returns the `j`-th column as a slice.
    ///
    /// # Panics
    /// Panics if the rows are not contiguous, i.e. `self.row_stride() != 1`.
    #[track_caller]
    #[inline]
    pub fn col_as_slice(self, j: usize) -> &'a [E] {
        assert!(j < self.ncols());
        let m = self.nrows();
        if m == 0 {
            return &[];
        }
        assert!(self.row_stride() == 1);
        unsafe { core::slice::from_raw_parts(self.ptr_at(0, j), m) }
    }

    /// Returns the `i`-th row as a slice.
    ///
    /// # Panics
    /// Panics if the columns are not contiguous, i.e. `self.col_stride() != 1`.
    #[track_caller]
    #[inline]
    pub fn row_as_slice(self, i: usize) -> &'a [E] {
        assert!(i < self.nrows());
        let n = self.ncols();
        if n == 0 {
            return &[];
        }
        assert!(self.col_stride() == 1);
        unsafe { core::slice::from_raw_parts(self.ptr_at(i, 0), n) }
    }

    /// Returns an owned copy of the matrix, stored in column-major order.
    #[inline]
    pub fn to_owned(self) -> Mat<E>
    where
        E: crate::RealField,
    {
        Mat::from_fn(self.nrows(), self.ncols(), |i, j| self.read(i, j))
    }
}

impl<E: Copy + core::fmt::Debug> core::fmt::Debug for MatRef<'_, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        struct DebugRow<'a, T: Copy + core::fmt::Debug>(MatRef<'a, T>);

        impl<T: Copy + core::fmt::Debug> core::fmt::Debug for DebugRow<'_, T> {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                let mut j = 0;
                f.debug_list()
                    .entries(core::iter::from_fn(|| {
                        let ret = if j < self.0.ncols() {
                            Some(self.0.read(0, j))
                        } else {
                            None
                        };
                        j += 1;
                        ret
                    }))
                    .finish()
            }
        }

        let mut i = 0;
        f.debug_list()
            .entries(core::iter::from_fn(|| {
                let ret = if i < self.nrows() {
                    Some(DebugRow(self.row(i)))
                } else {
                    None
                };
                i += 1;
                ret
            }))
            .finish()
    }
}
