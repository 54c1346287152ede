//! Block-partitioned matrix storage.
//!
//! A [`BlockMat`] splits its elements into square tiles of width `block_len`. The tiles of a block
//! row are stored one after the other, and each tile is stored in row-major order. The last block
//! row and the last block column may be narrower than `block_len`.
//!
//! For a tile starting at element `(i, j)`, where `i` and `j` are multiples of `block_len`, the
//! tile has `h = min(block_len, nrows - i)` rows and `w = min(block_len, ncols - j)` columns, and
//! starts at offset `i * ncols + h * j` in the backing storage. Since the element data of each tile
//! is contiguous, every tile can be viewed as a [`MatRef`] with row stride `w` and column stride
//! `1`.
//!
//! A block column is a list of vertically adjacent tiles. It is not a strided view in general, so
//! it is exposed as [`BlockCol`]/[`BlockColMut`], which hold one view per tile.

use crate::{assert, Mat, MatMut, MatRef, RealField};
use reborrow::*;

/// Heap allocated matrix, stored as a grid of row-major square tiles.
#[derive(Clone)]
pub struct BlockMat<E> {
    data: Vec<E>,
    nrows: usize,
    ncols: usize,
    block_len: usize,
}

impl<E: RealField> BlockMat<E> {
    /// Returns a new block matrix with dimensions `(nrows, ncols)` and tiles of width
    /// `block_len`, filled with zeros.
    ///
    /// # Panics
    /// Panics if `block_len == 0`.
    #[track_caller]
    pub fn zeros(nrows: usize, ncols: usize, block_len: usize) -> Self {
        assert!(block_len > 0);
        Self {
            data: vec![E::zero(); nrows * ncols],
            nrows,
            ncols,
            block_len,
        }
    }

    /// Returns a new block matrix with ones on the main diagonal and zeros elsewhere.
    pub fn identity(nrows: usize, ncols: usize, block_len: usize) -> Self {
        let mut m = Self::zeros(nrows, ncols, block_len);
        m.set_identity();
        m
    }

    /// Copies a dense matrix into block storage.
    pub fn from_mat(src: MatRef<'_, E>, block_len: usize) -> Self {
        let mut m = Self::zeros(src.nrows(), src.ncols(), block_len);
        m.copy_from_mat(src);
        m
    }

    /// Returns a column-major dense copy of the matrix.
    pub fn to_mat(&self) -> Mat<E> {
        let mut out = Mat::zeros(self.nrows, self.ncols);
        self.copy_to_mat(out.as_mut());
        out
    }

    /// Copies the values of `src` into `self`.
    ///
    /// # Panics
    /// Panics if the two matrices do not have the same shape.
    #[track_caller]
    pub fn copy_from_mat(&mut self, src: MatRef<'_, E>) {
        assert!(all(src.nrows() == self.nrows, src.ncols() == self.ncols));
        let r = self.block_len;
        for i in (0..self.nrows).step_by(r) {
            for j in (0..self.ncols).step_by(r) {
                let mut tile = self.tile_mut(i, j);
                let (h, w) = tile.shape();
                tile.copy_from(src.submatrix(i, j, h, w));
            }
        }
    }

    /// Copies the values of `self` into `dst`.
    ///
    /// # Panics
    /// Panics if the two matrices do not have the same shape.
    #[track_caller]
    pub fn copy_to_mat(&self, dst: MatMut<'_, E>) {
        let mut dst = dst;
        assert!(all(dst.nrows() == self.nrows, dst.ncols() == self.ncols));
        let r = self.block_len;
        for i in (0..self.nrows).step_by(r) {
            for j in (0..self.ncols).step_by(r) {
                let tile = self.tile(i, j);
                let (h, w) = tile.shape();
                dst.rb_mut().submatrix_mut(i, j, h, w).copy_from(tile);
            }
        }
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

    /// Returns the width of the tiles.
    #[inline(always)]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Returns the backing storage.
    #[inline]
    pub fn as_slice(&self) -> &[E] {
        &self.data
    }

    #[inline(always)]
    fn tile_dims(&self, i: usize, j: usize) -> (usize, usize) {
        let r = self.block_len;
        (Ord::min(r, self.nrows - i), Ord::min(r, self.ncols - j))
    }

    #[inline(always)]
    fn tile_offset(&self, i: usize, j: usize) -> usize {
        let (h, _) = self.tile_dims(i, j);
        i * self.ncols + h * j
    }

    #[inline(always)]
    fn offset_of(&self, row: usize, col: usize) -> usize {
        let r = self.block_len;
        let (i, j) = (row - row % r, col - col % r);
        let (_, w) = self.tile_dims(i, j);
        self.tile_offset(i, j) + (row % r) * w + (col % r)
    }

    /// Reads the value of the element at the given index.
    #[inline]
    #[track_caller]
    pub fn read(&self, row: usize, col: usize) -> E {
        assert!(all(row < self.nrows, col < self.ncols));
        self.data[self.offset_of(row, col)]
    }

    /// Writes the value to the element at the given index.
    #[inline]
    #[track_caller]
    pub fn write(&mut self, row: usize, col: usize, value: E) {
        assert!(all(row < self.nrows, col < self.ncols));
        let offset = self.offset_of(row, col);
        self.data[offset] = value;
    }

    /// Returns a view over the tile starting at element `(i, j)`.
    ///
    /// # Panics
    /// Panics if `i` or `j` is out of bounds or not a multiple of the block length.
    #[track_caller]
    pub fn tile(&self, i: usize, j: usize) -> MatRef<'_, E> {
        let r = self.block_len;
        assert!(all(i < self.nrows, j < self.ncols, i % r == 0, j % r == 0));
        let (h, w) = self.tile_dims(i, j);
        let offset = self.tile_offset(i, j);
        MatRef::from_row_major_slice(&self.data[offset..offset + h * w], h, w)
    }

    /// Returns a mutable view over the tile starting at element `(i, j)`.
    ///
    /// # Panics
    /// Panics if `i` or `j` is out of bounds or not a multiple of the block length.
    #[track_caller]
    pub fn tile_mut(&mut self, i: usize, j: usize) -> MatMut<'_, E> {
        let r = self.block_len;
        assert!(all(i < self.nrows, j < self.ncols, i % r == 0, j % r == 0));
        let (h, w) = self.tile_dims(i, j);
        let offset = self.tile_offset(i, j);
        MatMut::from_row_major_slice(&mut self.data[offset..offset + h * w], h, w)
    }

    /// Returns the tiles of the block column starting at element `(row, col)`, going down to the
    /// last row.
    ///
    /// # Panics
    /// Panics if `row` or `col` is not a multiple of the block length, or if `col` is out of
    /// bounds.
    #[track_caller]
    pub fn block_col(&self, row: usize, col: usize) -> BlockCol<'_, E> {
        let r = self.block_len;
        assert!(all(row <= self.nrows, col < self.ncols, row % r == 0, col % r == 0));
        let tiles = (row..self.nrows)
            .step_by(r)
            .map(|i| self.tile(i, col))
            .collect();
        BlockCol {
            tiles,
            row,
            col,
            block_len: r,
            ncols: Ord::min(r, self.ncols - col),
        }
    }

    /// Returns the tiles of the block column starting at element `(row, col)`, going down to the
    /// last row.
    ///
    /// # Panics
    /// Panics if `row` or `col` is not a multiple of the block length, or if `col` is out of
    /// bounds.
    #[track_caller]
    pub fn block_col_mut(&mut self, row: usize, col: usize) -> BlockColMut<'_, E> {
        let mut cols = self.block_cols_mut(row, col);
        assert!(!cols.is_empty());
        cols.swap_remove(0)
    }

    /// Returns mutable views over every block column to the right of element column `col`
    /// (included), each starting at element row `row`.
    ///
    /// The views address disjoint memory, so they may be handed to different threads.
    ///
    /// # Panics
    /// Panics if `row` or `col` is not a multiple of the block length.
    #[track_caller]
    pub fn block_cols_mut(&mut self, row: usize, col: usize) -> Vec<BlockColMut<'_, E>> {
        let r = self.block_len;
        assert!(all(row <= self.nrows, col <= self.ncols, row % r == 0, col % r == 0));

        let ptr = self.data.as_mut_ptr();
        let mut cols = Vec::new();
        for j in (col..self.ncols).step_by(r) {
            let w = Ord::min(r, self.ncols - j);
            let mut tiles = Vec::new();
            for i in (row..self.nrows).step_by(r) {
                let h = Ord::min(r, self.nrows - i);
                let offset = self.tile_offset(i, j);
                // SAFETY: each tile occupies its own `h * w` range of `data`, and every tile is
                // handed out at most once.
                tiles.push(unsafe {
                    MatMut::from_raw_parts(ptr.add(offset), h, w, w as isize, 1)
                });
            }
            cols.push(BlockColMut {
                tiles,
                row,
                col: j,
                block_len: r,
                ncols: w,
            });
        }
        cols
    }

    /// Changes the dimensions of the matrix, keeping the block length. The contents are reset to
    /// zero.
    pub fn reshape(&mut self, nrows: usize, ncols: usize) {
        self.data.clear();
        self.data.resize(nrows * ncols, E::zero());
        self.nrows = nrows;
        self.ncols = ncols;
    }

    /// Sets every element to zero.
    pub fn fill_zero(&mut self) {
        for x in self.data.iter_mut() {
            *x = E::zero();
        }
    }

    /// Sets `self` to the identity: ones on the main diagonal, zeros elsewhere.
    pub fn set_identity(&mut self) {
        self.fill_zero();
        for i in 0..Ord::min(self.nrows, self.ncols) {
            self.write(i, i, E::one());
        }
    }
}

impl<E: RealField> PartialEq for BlockMat<E> {
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

impl<E: RealField> core::fmt::Debug for BlockMat<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.to_mat(), f)
    }
}

/// Immutable view over the tiles of a block column.
#[derive(Clone)]
pub struct BlockCol<'a, E> {
    tiles: Vec<MatRef<'a, E>>,
    row: usize,
    col: usize,
    block_len: usize,
    ncols: usize,
}

/// Mutable view over the tiles of a block column.
pub struct BlockColMut<'a, E> {
    tiles: Vec<MatMut<'a, E>>,
    row: usize,
    col: usize,
    block_len: usize,
    ncols: usize,
}

impl<'a, E: RealField> BlockCol<'a, E> {
    /// Returns the number of rows covered by the tiles.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.tiles.iter().map(|t| t.nrows()).sum()
    }

    /// Returns the width of the block column.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Returns the index, in the parent matrix, of the first element of the view.
    #[inline]
    pub fn origin(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Returns the tile views, top to bottom.
    #[inline]
    pub fn tiles(&self) -> &[MatRef<'a, E>] {
        &self.tiles
    }

    /// Reads the element at the given index, relative to the origin of the view.
    #[inline]
    #[track_caller]
    pub fn read(&self, row: usize, col: usize) -> E {
        let r = self.block_len;
        self.tiles[row / r].read(row % r, col)
    }

    /// Copies the block column into `dst`.
    ///
    /// # Panics
    /// Panics if `dst` does not have the shape of the block column.
    #[track_caller]
    pub fn copy_to(&self, dst: MatMut<'_, E>) {
        let mut dst = dst;
        assert!(all(dst.nrows() == self.nrows(), dst.ncols() == self.ncols));
        let r = self.block_len;
        for (k, tile) in self.tiles.iter().enumerate() {
            dst.rb_mut()
                .subrows_mut(k * r, tile.nrows())
                .copy_from(*tile);
        }
    }
}

impl<'a, E: RealField> BlockColMut<'a, E> {
    /// Returns the number of rows covered by the tiles.
    #[inline]
    pub fn nrows(&self) -> usize {
        self.tiles.iter().map(|t| t.nrows()).sum()
    }

    /// Returns the width of the block column.
    #[inline]
    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Returns the index, in the parent matrix, of the first element of the view.
    #[inline]
    pub fn origin(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    /// Returns the tile views, top to bottom.
    #[inline]
    pub fn tiles_mut(&mut self) -> &mut [MatMut<'a, E>] {
        &mut self.tiles
    }

    /// Returns an immutable view over the same tiles.
    pub fn as_const(&self) -> BlockCol<'_, E> {
        BlockCol {
            tiles: self.tiles.iter().map(|t| t.rb()).collect(),
            row: self.row,
            col: self.col,
            block_len: self.block_len,
            ncols: self.ncols,
        }
    }

    /// Reads the element at the given index, relative to the origin of the view.
    #[inline]
    #[track_caller]
    pub fn read(&self, row: usize, col: usize) -> E {
        let r = self.block_len;
        self.tiles[row / r].read(row % r, col)
    }

    /// Writes the element at the given index, relative to the origin of the view.
    #[inline]
    #[track_caller]
    pub fn write(&mut self, row: usize, col: usize, value: E) {
        let r = self.block_len;
        self.tiles[row / r].write(row % r, col, value)
    }

    /// Copies `src` into the block column.
    ///
    /// # Panics
    /// Panics if `src` does not have the shape of the block column.
    #[track_caller]
    pub fn copy_from(&mut self, src: MatRef<'_, E>) {
        assert!(all(src.nrows() == self.nrows(), src.ncols() == self.ncols));
        let r = self.block_len;
        for (k, tile) in self.tiles.iter_mut().enumerate() {
            let h = tile.nrows();
            tile.copy_from(src.subrows(k * r, h));
        }
    }
}
