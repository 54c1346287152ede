use super::*;
use crate::{assert, debug_assert, RealField};

/// Mutable view over a matrix, similar to a mutable reference to a 2D strided [prim@slice].
pub struct MatMut<'a, E> {
    pub(super) inner: MatImpl<E>,
    pub(super) __marker: PhantomData<&'a mut E>,
}

unsafe impl<E: Send> Send for MatMut<'_, E> {}
unsafe impl<E: Sync> Sync for MatMut<'_, E> {}

impl<'short, E> Reborrow<'short> for MatMut<'_, E> {
    type Target = MatRef<'short, E>;

    #[inline]
    fn rb(&'short self) -> Self::Target {
        MatRef {
            inner: self.inner,
            __marker: PhantomData,
        }
    }
}

impl<'short, E> ReborrowMut<'short> for MatMut<'_, E> {
    type Target = MatMut<'short, E>;

    #[inline]
    fn rb_mut(&'short mut self) -> Self::Target {
        MatMut {
            inner: self.inner,
            __marker: PhantomData,
        }
    }
}

impl<'a, E> IntoConst for MatMut<'a, E> {
    type Target = MatRef<'a, E>;

    #[inline]
    fn into_const(self) -> Self::Target {
        MatRef {
            inner: self.inner,
            __marker: PhantomData,
        }
    }
}

impl<'a, E: Copy> MatMut<'a, E> {
    /// Creates a `MatMut` from a pointer to the matrix data, its dimensions and strides.
    ///
    /// # Safety
    /// The behavior is undefined if any of the following conditions are violated:
    /// * For each matrix unit, the entire memory region addressed by the matrix must be contained
    /// within a single allocation, accessible in its entirety by the corresponding pointer in
    /// `ptr`.
    /// * `ptr` must be non null and properly aligned for type `E`.
    /// * The values accessible by the matrix must be initialized, and no two distinct indices may
    /// address the same memory.
    /// * No other view may access the addressed memory for the duration of the lifetime `'a`.
    #[inline(always)]
    pub unsafe fn from_raw_parts(
        ptr: *mut E,
        nrows: usize,
        ncols: usize,
        row_stride: isize,
        col_stride: isize,
    ) -> Self {
        Self {
            inner: MatImpl {
                ptr: NonNull::new_unchecked(ptr),
                nrows,
                ncols,
                row_stride,
                col_stride,
            },
            __marker: PhantomData,
        }
    }

    /// Creates a view over a row-major slice.
    #[track_caller]
    #[inline]
    pub fn from_row_major_slice(slice: &'a mut [E], nrows: usize, ncols: usize) -> Self {
        assert!(slice.len() == nrows * ncols);
        unsafe { Self::from_raw_parts(slice.as_mut_ptr(), nrows, ncols, ncols as isize, 1) }
    }

    /// Creates a view over a column-major slice.
    #[track_caller]
    #[inline]
    pub fn from_column_major_slice(slice: &'a mut [E], nrows: usize, ncols: usize) -> Self {
        assert!(slice.len() == nrows * ncols);
        unsafe { Self::from_raw_parts(slice.as_mut_ptr(), nrows, ncols, 1, nrows as isize) }
    }

    /// Returns a mutable pointer to the matrix data.
    #[inline(always)]
    pub fn as_ptr_mut(self) -> *mut E {
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
    pub fn ptr_at_mut(self, row: usize, col: usize) -> *mut E {
        self.inner.ptr_at(row, col)
    }

    /// Reads the value of the element at the given index.
    #[inline(always)]
    #[track_caller]
    pub fn read(&self, row: usize, col: usize) -> E {
        self.rb().read(row, col)
    }

    /// Writes the value to the element at the given index, without bound checks.
    ///
    /// # Safety
    /// The behavior is undefined if `row >= self.nrows()` or `col >= self.ncols()`.
    #[inline(always)]
    #[track_caller]
    pub unsafe fn write_unchecked(&mut self, row: usize, col: usize, value: E) {
        debug_assert!(all(row < self.nrows(), col < self.ncols()));
        *self.inner.ptr_at(row, col) = value;
    }

    /// Writes the value to the element at the given index.
    ///
    /// # Panics
    /// Panics if `row >= self.nrows()` or `col >= self.ncols()`.
    #[inline(always)]
    #[track_caller]
    pub fn write(&mut self, row: usize, col: usize, value: E) {
        assert!(all(row < self.nrows(), col < self.ncols()));
        unsafe { self.write_unchecked(row, col, value) };
    }

    /// Returns the submatrix starting at `(row_start, col_start)` with the given dimensions.
    #[track_caller]
    #[inline]
    pub fn submatrix_mut(
        self,
        row_start: usize,
        col_start: usize,
        nrows: usize,
        ncols: usize,
    ) -> Self {
        let sub = self.into_const().submatrix(row_start, col_start, nrows, ncols);
        unsafe {
            Self::from_raw_parts(
                sub.as_ptr() as *mut E,
                sub.nrows(),
                sub.ncols(),
                sub.row_stride(),
                sub.col_stride(),
            )
        }
    }

    /// Returns the rows in `row_start..row_start + nrows`.
    #[track_caller]
    #[inline]
    pub fn subrows_mut(self, row_start: usize, nrows: usize) -> Self {
        let ncols = self.ncols();
        self.submatrix_mut(row_start, 0, nrows, ncols)
    }

    /// Returns the columns in `col_start..col_start + ncols`.
    #[track_caller]
    #[inline]
    pub fn subcols_mut(self, col_start: usize, ncols: usize) -> Self {
        let nrows = self.nrows();
        self.submatrix_mut(0, col_start, nrows, ncols)
    }

    /// Splits the matrix horizontally at the given row, into a top and a bottom part.
    #[track_caller]
    #[inline]
    pub fn split_at_row_mut(self, row: usize) -> (Self, Self) {
        let (top, bot) = self.into_const().split_at_row(row);
        unsafe { (top.const_cast(), bot.const_cast()) }
    }

    /// Splits the matrix vertically at the given column, into a left and a right part.
    #[track_caller]
    #[inline]
    pub fn split_at_col_mut(self, col: usize) -> (Self, Self) {
        let (left, right) = self.into_const().split_at_col(col);
        unsafe { (left.const_cast(), right.const_cast()) }
    }

    /// Returns the `i`-th row as a `1×ncols` view.
    #[track_caller]
    #[inline]
    pub fn row_mut(self, i: usize) -> Self {
        assert!(i < self.nrows());
        self.subrows_mut(i, 1)
    }

    /// Returns the `j`-th column as a `nrows×1` view.
    #[track_caller]
    #[inline]
    pub fn col_mut(self, j: usize) -> Self {
        assert!(j < self.ncols());
        self.subcols_mut(j, 1)
    }

    /// Returns a view over the transpose of `self`.
    #[inline]
    pub fn transpose_mut(self) -> Self {
        unsafe { self.into_const().transpose().const_cast() }
    }

    /// Returns the `j`-th column as a mutable slice.
    ///
    /// # Panics
    /// Panics if the rows are not contiguous, i.e. `self.row_stride() != 1`.
    #[track_caller]
    #[inline]
    pub fn col_as_slice_mut(self, j: usize) -> &'a mut [E] {
        let col = self.into_const().col_as_slice(j);
        unsafe { core::slice::from_raw_parts_mut(col.as_ptr() as *mut E, col.len()) }
    }

    /// Returns the `i`-th row as a mutable slice.
    ///
    /// # Panics
    /// Panics if the columns are not contiguous, i.e. `self.col_stride() != 1`.
    #[track_caller]
    #[inline]
    pub fn row_as_slice_mut(self, i: usize) -> &'a mut [E] {
        let row = self.into_const().row_as_slice(i);
        unsafe { core::slice::from_raw_parts_mut(row.as_ptr() as *mut E, row.len()) }
    }

    /// Fills the elements of `self` with `value`.
    #[inline]
    pub fn fill(&mut self, value: E) {
        let (m, n) = self.shape();
        for j in 0..n {
            for i in 0..m {
                unsafe { self.write_unchecked(i, j, value) };
            }
        }
    }

    /// Copies the values from `other` into `self`.
    ///
    /// # Panics
    /// Panics if the two matrices do not have the same shape.
    #[track_caller]
    pub fn copy_from(&mut self, other: MatRef<'_, E>) {
        assert!(all(self.nrows() == other.nrows(), self.ncols() == other.ncols()));
        let (m, n) = self.shape();
        for j in 0..n {
            for i in 0..m {
                unsafe { self.write_unchecked(i, j, other.read_unchecked(i, j)) };
            }
        }
    }
}

impl<'a, E: RealField> MatMut<'a, E> {
    /// Fills the elements of `self` with zeros.
    #[inline]
    pub fn fill_zero(&mut self) {
        self.fill(E::zero());
    }

    /// Sets `self` to the identity: ones on the main diagonal, zeros elsewhere.
    pub fn set_identity(&mut self) {
        self.fill_zero();
        for i in 0..Ord::min(self.nrows(), self.ncols()) {
            unsafe { self.write_unchecked(i, i, E::one()) };
        }
    }
}

impl<'a, E: Copy> MatRef<'a, E> {
    /// # Safety
    /// The caller must hold exclusive access to the memory addressed by `self` for `'a`.
    #[inline(always)]
    pub(super) unsafe fn const_cast(self) -> MatMut<'a, E> {
        MatMut::from_raw_parts(
            self.as_ptr() as *mut E,
            self.nrows(),
            self.ncols(),
            self.row_stride(),
            self.col_stride(),
        )
    }
}

impl<E: Copy + core::fmt::Debug> core::fmt::Debug for MatMut<'_, E> {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.rb(), f)
    }
}
