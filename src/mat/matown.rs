use super::*;
use crate::{assert, RealField};

/// Heap allocated resizable matrix, similar to a 2D [`Vec`].
///
/// The storage order is chosen at construction with a [`Layout`], and kept across
/// [`Mat::reshape`] and [`Mat::resize_with`]. The backing vector always holds exactly
/// `nrows * ncols` elements; its capacity is reused when the matrix shrinks.
#[derive(Clone)]
pub struct Mat<E> {
    data: Vec<E>,
    nrows: usize,
    ncols: usize,
    layout: Layout,
}

impl<E: RealField> Default for Mat<E> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RealField> Mat<E> {
    /// Returns an empty column-major matrix of dimension `0×0`.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            nrows: 0,
            ncols: 0,
            layout: Layout::ColMajor,
        }
    }

    /// Returns a new column-major matrix with dimensions `(nrows, ncols)`, filled with zeros.
    #[inline]
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self::zeros_with_layout(nrows, ncols, Layout::ColMajor)
    }

    /// Returns a new matrix with dimensions `(nrows, ncols)` and the given layout, filled with
    /// zeros.
    #[inline]
    pub fn zeros_with_layout(nrows: usize, ncols: usize, layout: Layout) -> Self {
        Self {
            data: vec![E::zero(); nrows * ncols],
            nrows,
            ncols,
            layout,
        }
    }

    /// Returns a new column-major matrix with dimensions `(nrows, ncols)`, with ones on the main
    /// diagonal and zeros elsewhere.
    #[inline]
    pub fn identity(nrows: usize, ncols: usize) -> Self {
        let mut m = Self::zeros(nrows, ncols);
        m.as_mut().set_identity();
        m
    }

    /// Returns a new column-major matrix with dimensions `(nrows, ncols)`, filled with the
    /// provided function.
    pub fn from_fn(nrows: usize, ncols: usize, f: impl FnMut(usize, usize) -> E) -> Self {
        let mut f = f;
        let mut data = Vec::with_capacity(nrows * ncols);
        for j in 0..ncols {
            for i in 0..nrows {
                data.push(f(i, j));
            }
        }
        Self {
            data,
            nrows,
            ncols,
            layout: Layout::ColMajor,
        }
    }

    /// Returns a new row-major matrix with dimensions `(nrows, ncols)`, copying `data` which is
    /// given in row-major order.
    ///
    /// # Panics
    /// Panics if `data.len() != nrows * ncols`.
    #[track_caller]
    pub fn from_row_major(nrows: usize, ncols: usize, data: &[E]) -> Self {
        assert!(data.len() == nrows * ncols);
        Self {
            data: data.to_vec(),
            nrows,
            ncols,
            layout: Layout::RowMajor,
        }
    }

    /// Returns a new column-major matrix with dimensions `(nrows, ncols)`, copying `data` which
    /// is given in column-major order.
    ///
    /// # Panics
    /// Panics if `data.len() != nrows * ncols`.
    #[track_caller]
    pub fn from_col_major(nrows: usize, ncols: usize, data: &[E]) -> Self {
        assert!(data.len() == nrows * ncols);
        Self {
            data: data.to_vec(),
            nrows,
            ncols,
            layout: Layout::ColMajor,
        }
    }

    /// Returns a new row-major matrix from a list of rows.
    ///
    /// # Panics
    /// Panics if the rows do not all have the same length.
    #[track_caller]
    pub fn from_rows(rows: &[&[E]]) -> Self {
        let nrows = rows.len();
        let ncols = rows.first().map(|row| row.len()).unwrap_or(0);
        let mut data = Vec::with_capacity(nrows * ncols);
        for row in rows {
            assert!(row.len() == ncols);
            data.extend_from_slice(row);
        }
        Self {
            data,
            nrows,
            ncols,
            layout: Layout::RowMajor,
        }
    }

    /// Returns a diagonal matrix with the given diagonal entries.
    pub fn from_diagonal(diag: &[E]) -> Self {
        let n = diag.len();
        Self::from_fn(n, n, |i, j| if i == j { diag[i] } else { E::zero() })
    }

    /// Returns the number of rows of the matrix.
    #[inline(always)]
    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Returns the number of columns of the matrix.
    #[inline(always)]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Returns the number of rows and columns of the matrix.
    #[inline(always)]
    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    /// Returns the storage order of the matrix.
    #[inline(always)]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Returns the backing storage, in the order given by [`Mat::layout`].
    #[inline]
    pub fn as_slice(&self) -> &[E] {
        &self.data
    }

    /// Returns the backing storage, in the order given by [`Mat::layout`].
    #[inline]
    pub fn as_slice_mut(&mut self) -> &mut [E] {
        &mut self.data
    }

    /// Returns a view over the matrix.
    #[inline]
    pub fn as_ref(&self) -> MatRef<'_, E> {
        let (rs, cs) = self.layout.strides(self.nrows, self.ncols);
        unsafe { MatRef::from_raw_parts(self.data.as_ptr(), self.nrows, self.ncols, rs, cs) }
    }

    /// Returns a mutable view over the matrix.
    #[inline]
    pub fn as_mut(&mut self) -> MatMut<'_, E> {
        let (rs, cs) = self.layout.strides(self.nrows, self.ncols);
        unsafe { MatMut::from_raw_parts(self.data.as_mut_ptr(), self.nrows, self.ncols, rs, cs) }
    }

    /// Returns a view over the transpose of the matrix.
    #[inline]
    pub fn transpose(&self) -> MatRef<'_, E> {
        self.as_ref().transpose()
    }

    /// Reads the value of the element at the given index.
    #[inline(always)]
    #[track_caller]
    pub fn read(&self, row: usize, col: usize) -> E {
        self.as_ref().read(row, col)
    }

    /// Writes the value to the element at the given index.
    #[inline(always)]
    #[track_caller]
    pub fn write(&mut self, row: usize, col: usize, value: E) {
        self.as_mut().write(row, col, value)
    }

    /// Changes the dimensions of the matrix, keeping its layout. The contents are reset to
    /// zero.
    ///
    /// The allocation is reused when it is large enough, and grown otherwise.
    pub fn reshape(&mut self, nrows: usize, ncols: usize) {
        self.data.clear();
        self.data.resize(nrows * ncols, E::zero());
        self.nrows = nrows;
        self.ncols = ncols;
    }

    /// Changes the dimensions of the matrix, keeping the values in the region shared by the old
    /// and new shapes, and filling new elements with `f(i, j)`.
    pub fn resize_with(&mut self, nrows: usize, ncols: usize, f: impl FnMut(usize, usize) -> E) {
        let mut f = f;
        let (old_nrows, old_ncols) = self.shape();
        let (rs, cs) = self.layout.strides(nrows, ncols);
        let mut data = vec![E::zero(); nrows * ncols];
        for j in 0..ncols {
            for i in 0..nrows {
                let value = if i < old_nrows && j < old_ncols {
                    self.read(i, j)
                } else {
                    f(i, j)
                };
                data[i * rs as usize + j * cs as usize] = value;
            }
        }
        self.data = data;
        self.nrows = nrows;
        self.ncols = ncols;
    }

    /// Returns a copy of the matrix stored with the given layout.
    pub fn to_layout(&self, layout: Layout) -> Self {
        let mut out = Self::zeros_with_layout(self.nrows, self.ncols, layout);
        out.as_mut().copy_from(self.as_ref());
        out
    }

    /// Sets every element to zero.
    #[inline]
    pub fn fill_zero(&mut self) {
        for x in self.data.iter_mut() {
            *x = E::zero();
        }
    }
}

impl<E: RealField> PartialEq for Mat<E> {
    fn eq(&self, other: &Self) -> bool {
        if self.shape() != other.shape() {
            return false;
        }
        for j in 0..self.ncols {
            for i in 0..self.nrows {
                if self.read(i, j) != other.read(i, j) {
                    return false;
                }
            }
        }
        true
    }
}

impl<E: RealField> core::ops::Index<(usize, usize)> for Mat<E> {
    type Output = E;

    #[inline]
    #[track_caller]
    fn index(&self, (row, col): (usize, usize)) -> &E {
        assert!(all(row < self.nrows, col < self.ncols));
        let (rs, cs) = self.layout.strides(self.nrows, self.ncols);
        &self.data[row * rs as usize + col * cs as usize]
    }
}

impl<E: RealField> core::ops::IndexMut<(usize, usize)> for Mat<E> {
    #[inline]
    #[track_caller]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut E {
        assert!(all(row < self.nrows, col < self.ncols));
        let (rs, cs) = self.layout.strides(self.nrows, self.ncols);
        &mut self.data[row * rs as usize + col * cs as usize]
    }
}

impl<E: RealField> core::fmt::Debug for Mat<E> {
    #[inline]
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.as_ref(), f)
    }
}
