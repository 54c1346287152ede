//! Blocked Householder QR decomposition.
//!
//! The matrix is processed one panel of `block_len` columns at a time. Each panel is factorized
//! column by column with the unblocked algorithm, applying every reflector only within the
//! panel. The reflectors of the panel are then combined in the compact WY representation
//! $$H_0 H_1 \dots H_{b-1} = I + W Y^T,$$
//! where $Y$ is unit lower trapezoidal and holds the reflector vectors, and $W$ is built with the
//! recurrence $w_0 = -\gamma_0 y_0$, $w_k = -\gamma_k (y_k + W_{:,0..k} Y_{:,0..k}^T y_k)$.
//!
//! The trailing matrix is updated with two matrix products, $A \gets A + Y (W^T A)$. Every block
//! column of the trailing matrix is updated independently of the others, so the update can be
//! dispatched over a thread pool. The panel factorization depends on the previous update and is
//! always sequential.
//!
//! Each block column is updated by a single task with the same sequence of operations, so the
//! result does not depend on the [`Parallelism`] in use.

use super::{assert_decomposed, check_apply_shape, QrDecomposition};
use crate::{
    assert,
    block::{BlockColMut, BlockMat},
    linalg::{
        householder::{apply_householder_on_the_left_col, make_householder_in_place},
        matmul::matmul,
        temp_mat_req, temp_mat_zeroed,
    },
    utils::thread::{for_each_raw, Ptr},
    LinalgError, MatMut, MatRef, Parallelism, RealField,
};
use dyn_stack::{GlobalPodBuffer, PodStack, SizeOverflow, StackReq};
use reborrow::*;

/// Tuning parameters of the blocked QR decomposition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct BlockQrParams {
    /// Width of the square tiles, and of the panels.
    pub block_len: usize,
    /// Parallelism used for the trailing matrix updates.
    pub parallelism: Parallelism,
}

impl Default for BlockQrParams {
    /// Tiles of width 60, and the global parallelism settings.
    ///
    /// # Panics
    /// Panics if global parallelism is disabled.
    #[track_caller]
    fn default() -> Self {
        Self {
            block_len: 60,
            parallelism: crate::get_global_parallelism(),
        }
    }
}

impl BlockQrParams {
    /// Returns the default parameters with the given block length.
    #[track_caller]
    pub fn with_block_len(block_len: usize) -> Self {
        Self {
            block_len,
            ..Default::default()
        }
    }
}

fn factor_panel<E: RealField>(panel: MatMut<'_, E>, gammas: &mut [E]) {
    let mut panel = panel;
    let m = panel.nrows();
    for c in 0..gammas.len() {
        let (left, right) = panel.rb_mut().split_at_col_mut(c + 1);
        let u = &mut left.col_as_slice_mut(c)[c..];

        let householder = make_householder_in_place(u);
        gammas[c] = householder.gamma;
        if householder.gamma == E::zero() {
            continue;
        }

        let essential = &u[1..];
        let mut right = right.subrows_mut(c, m - c);
        for k in 0..right.ncols() {
            let col = right.rb_mut().col_as_slice_mut(k);
            apply_householder_on_the_left_col(col, essential, householder.gamma);
        }
    }
}

/// Expands the reflectors stored below the diagonal of `panel` into the explicit unit lower
/// trapezoidal `y`.
fn build_y<E: RealField>(panel: MatRef<'_, E>, y: MatMut<'_, E>) {
    let mut y = y;
    for c in 0..y.ncols() {
        for i in 0..y.nrows() {
            let value = if i < c {
                E::zero()
            } else if i == c {
                E::one()
            } else {
                panel.read(i, c)
            };
            y.write(i, c, value);
        }
    }
}

fn build_w<E: RealField>(y: MatRef<'_, E>, gammas: &[E], w: MatMut<'_, E>) {
    let mut w = w;
    let m = y.nrows();
    for (c, &gamma) in gammas.iter().enumerate() {
        for i in 0..m {
            w.write(i, c, y.read(i, c));
        }
        for k in 0..c {
            let mut dot = E::zero();
            for i in k..m {
                dot += y.read(i, k) * y.read(i, c);
            }
            for i in 0..m {
                let v = w.read(i, c) + w.read(i, k) * dot;
                w.write(i, c, v);
            }
        }
        for i in 0..m {
            let v = -gamma * w.read(i, c);
            w.write(i, c, v);
        }
    }
}

/// Computes `col += left * (right^T * col)`, using `t` as storage for the inner product.
fn update_block_col<E: RealField>(
    col: &mut BlockColMut<'_, E>,
    left: MatRef<'_, E>,
    right: MatRef<'_, E>,
    t: MatMut<'_, E>,
) {
    let mut t = t;
    t.fill_zero();

    let mut row = 0;
    for tile in col.tiles_mut() {
        let h = tile.nrows();
        matmul(
            t.rb_mut(),
            right.subrows(row, h).transpose(),
            (*tile).rb(),
            Some(E::one()),
            E::one(),
            Parallelism::None,
        );
        row += h;
    }

    let mut row = 0;
    for tile in col.tiles_mut() {
        let h = tile.nrows();
        matmul(
            tile.rb_mut(),
            left.subrows(row, h),
            t.rb(),
            Some(E::one()),
            E::one(),
            Parallelism::None,
        );
        row += h;
    }
}

/// Updates every block column of `cols` with [`update_block_col`], one task per block column.
fn update_block_cols<E: RealField>(
    cols: Vec<BlockColMut<'_, E>>,
    left: MatRef<'_, E>,
    right: MatRef<'_, E>,
    t: MatMut<'_, E>,
    parallelism: Parallelism,
) {
    let mut cols = cols;
    let Some(first) = cols.first() else {
        return;
    };
    let col0 = first.origin().1;
    let b = left.ncols();
    let (t_rs, t_cs) = (t.row_stride(), t.col_stride());
    let t_ptr = Ptr(t.as_ptr_mut());
    let n_tasks = cols.len();
    let cols_ptr = Ptr(cols.as_mut_ptr());

    for_each_raw(
        n_tasks,
        |idx| {
            let (cols_ptr, t_ptr) = (cols_ptr, t_ptr);
            // SAFETY: task `idx` is the only one accessing block column `idx`, and the columns of
            // `t` it covers.
            let col = unsafe { &mut *cols_ptr.0.add(idx) };
            let offset = (col.origin().1 - col0) as isize;
            let t = unsafe {
                MatMut::from_raw_parts(
                    t_ptr.0.wrapping_offset(offset * t_cs),
                    b,
                    col.ncols(),
                    t_rs,
                    t_cs,
                )
            };
            update_block_col(col, left, right, t);
        },
        parallelism,
    );
}

/// Computes the size and alignment of required workspace for computing the blocked QR
/// decomposition of a matrix with the given dimensions.
pub fn qr_in_place_req<E: RealField>(
    nrows: usize,
    ncols: usize,
    block_len: usize,
) -> Result<StackReq, SizeOverflow> {
    StackReq::try_all_of([
        temp_mat_req::<E>(nrows, block_len)?,
        temp_mat_req::<E>(nrows, block_len)?,
        temp_mat_req::<E>(nrows, block_len)?,
        temp_mat_req::<E>(block_len, ncols)?,
    ])
}

/// Computes the size and alignment of required workspace for applying $Q$ or $Q^T$, from a
/// decomposition with `qr_nrows` rows, to a matrix with `rhs_ncols` columns.
pub fn apply_q_req<E: RealField>(
    qr_nrows: usize,
    block_len: usize,
    rhs_ncols: usize,
) -> Result<StackReq, SizeOverflow> {
    qr_in_place_req::<E>(qr_nrows, rhs_ncols, block_len)
}

fn workspace<E: RealField>(nrows: usize, ncols: usize, block_len: usize) -> GlobalPodBuffer {
    let panel = StackReq::new::<E>(nrows * block_len);
    GlobalPodBuffer::new(StackReq::all_of([
        panel,
        panel,
        panel,
        StackReq::new::<E>(block_len * ncols),
    ]))
}

/// Computes the QR decomposition of `matrix` in place.
///
/// On output, $R$ is stored on and above the diagonal of `matrix`, and the essential parts of the
/// reflectors below it. `gammas` receives the reflector scale factors.
///
/// # Panics
/// Panics if `gammas.len() != min(matrix.nrows(), matrix.ncols())`.
#[track_caller]
pub fn qr_in_place<E: RealField>(
    matrix: &mut BlockMat<E>,
    gammas: &mut [E],
    parallelism: Parallelism,
    stack: PodStack<'_>,
) {
    let (m, n) = matrix.shape();
    let r = matrix.block_len();
    let size = Ord::min(m, n);
    assert!(gammas.len() == size);

    let (mut panel, stack) = temp_mat_zeroed::<E>(m, r, stack);
    let (mut y, stack) = temp_mat_zeroed::<E>(m, r, stack);
    let (mut w, stack) = temp_mat_zeroed::<E>(m, r, stack);
    let (mut t, _) = temp_mat_zeroed::<E>(r, n, stack);

    for j in (0..size).step_by(r) {
        let width = Ord::min(r, n - j);
        let height = m - j;
        let bs = Ord::min(width, height);

        let mut panel = panel.rb_mut().submatrix_mut(0, 0, height, width);
        matrix.block_col(j, j).copy_to(panel.rb_mut());
        factor_panel(panel.rb_mut(), &mut gammas[j..j + bs]);
        matrix.block_col_mut(j, j).copy_from(panel.rb());

        if j + width < n {
            let mut y = y.rb_mut().submatrix_mut(0, 0, height, bs);
            let mut w = w.rb_mut().submatrix_mut(0, 0, height, bs);
            build_y(panel.rb(), y.rb_mut());
            build_w(y.rb(), &gammas[j..j + bs], w.rb_mut());
            update_block_cols(
                matrix.block_cols_mut(j, j + width),
                y.rb(),
                w.rb(),
                t.rb_mut(),
                parallelism,
            );
        }
    }
}

fn apply_q_impl<E: RealField>(
    qr: &BlockMat<E>,
    gammas: &[E],
    rhs: &mut BlockMat<E>,
    transpose: bool,
    identity: bool,
    parallelism: Parallelism,
    stack: PodStack<'_>,
) {
    let (m, n) = qr.shape();
    let r = qr.block_len();
    let size = gammas.len();
    assert!(all(
        size == Ord::min(m, n),
        rhs.nrows() == m,
        rhs.block_len() == r,
    ));

    let (mut panel, stack) = temp_mat_zeroed::<E>(m, r, stack);
    let (mut y, stack) = temp_mat_zeroed::<E>(m, r, stack);
    let (mut w, stack) = temp_mat_zeroed::<E>(m, r, stack);
    let (mut t, _) = temp_mat_zeroed::<E>(r, rhs.ncols(), stack);

    let n_panels = (size + r - 1) / r;
    for idx in 0..n_panels {
        let p = if transpose { idx } else { n_panels - 1 - idx };
        let j = p * r;
        let width = Ord::min(r, n - j);
        let height = m - j;
        let bs = Ord::min(width, height);

        let first_col = if identity { j } else { 0 };
        if first_col >= rhs.ncols() {
            continue;
        }

        let mut panel = panel.rb_mut().submatrix_mut(0, 0, height, width);
        qr.block_col(j, j).copy_to(panel.rb_mut());
        let mut y = y.rb_mut().submatrix_mut(0, 0, height, bs);
        let mut w = w.rb_mut().submatrix_mut(0, 0, height, bs);
        build_y(panel.rb(), y.rb_mut());
        build_w(y.rb(), &gammas[j..j + bs], w.rb_mut());

        let cols = rhs.block_cols_mut(j, first_col);
        if transpose {
            update_block_cols(cols, y.rb(), w.rb(), t.rb_mut(), parallelism);
        } else {
            update_block_cols(cols, w.rb(), y.rb(), t.rb_mut(), parallelism);
        }
    }
}

/// Computes $B \gets QB$, where $Q$ is given by the result of [`qr_in_place`].
///
/// # Panics
/// Panics if `rhs` does not have as many rows as `qr`, or a different block length.
#[track_caller]
pub fn apply_q<E: RealField>(
    qr: &BlockMat<E>,
    gammas: &[E],
    rhs: &mut BlockMat<E>,
    parallelism: Parallelism,
    stack: PodStack<'_>,
) {
    apply_q_impl(qr, gammas, rhs, false, false, parallelism, stack)
}

/// Computes $B \gets Q^T B$, where $Q$ is given by the result of [`qr_in_place`].
///
/// # Panics
/// Panics if `rhs` does not have as many rows as `qr`, or a different block length.
#[track_caller]
pub fn apply_transpose_q<E: RealField>(
    qr: &BlockMat<E>,
    gammas: &[E],
    rhs: &mut BlockMat<E>,
    parallelism: Parallelism,
    stack: PodStack<'_>,
) {
    apply_q_impl(qr, gammas, rhs, true, false, parallelism, stack)
}

/// Overwrites `q` with the orthogonal factor given by the result of [`qr_in_place`]. `q` must
/// have as many rows as `qr`, and either `min(nrows, ncols)` or `nrows` columns.
///
/// Since `q` starts as the identity, the block columns on the left of each panel are known to be
/// unaffected by it and are skipped.
///
/// # Panics
/// Panics if `q` does not have one of the expected shapes.
#[track_caller]
pub fn q_in_place<E: RealField>(
    qr: &BlockMat<E>,
    gammas: &[E],
    q: &mut BlockMat<E>,
    parallelism: Parallelism,
    stack: PodStack<'_>,
) {
    assert!(any(q.ncols() == gammas.len(), q.ncols() == qr.nrows()));
    q.set_identity();
    apply_q_impl(qr, gammas, q, false, true, parallelism, stack)
}

/// Blocked Householder QR decomposition.
///
/// Dense inputs are copied into a [`BlockMat`] owned by the decomposition, so
/// [`decompose`](QrDecomposition::decompose) leaves them untouched. A matrix that is already in
/// block storage can be decomposed without a copy with
/// [`decompose_block`](BlockHouseholderQr::decompose_block).
#[derive(Clone, Debug)]
pub struct BlockHouseholderQr<E: RealField> {
    qr: BlockMat<E>,
    gammas: Vec<E>,
    params: BlockQrParams,
    decomposed: bool,
}

impl<E: RealField> Default for BlockHouseholderQr<E> {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RealField> BlockHouseholderQr<E> {
    /// Creates a decomposition object with the default parameters.
    #[track_caller]
    pub fn new() -> Self {
        Self::with_params(BlockQrParams::default())
    }

    /// Creates a decomposition object with the given parameters.
    ///
    /// # Panics
    /// Panics if `params.block_len == 0`.
    #[track_caller]
    pub fn with_params(params: BlockQrParams) -> Self {
        Self {
            qr: BlockMat::zeros(0, 0, params.block_len),
            gammas: Vec::new(),
            params,
            decomposed: false,
        }
    }

    /// Returns the parameters of the decomposition.
    #[inline]
    pub fn params(&self) -> BlockQrParams {
        self.params
    }

    /// Preallocates the working storage for matrices of up to `nrows×ncols` elements.
    pub fn set_expected_max_size(&mut self, nrows: usize, ncols: usize) {
        self.qr.reshape(nrows, ncols);
        self.gammas.reserve(Ord::min(nrows, ncols));
        self.decomposed = false;
    }

    /// Decomposes a matrix given in block storage, which becomes the working storage of the
    /// decomposition. Its block length is used instead of the one in the parameters.
    pub fn decompose_block(&mut self, matrix: BlockMat<E>) {
        let (m, n) = matrix.shape();
        self.qr = matrix;
        self.gammas.clear();
        self.gammas.resize(Ord::min(m, n), E::zero());

        let mut mem = workspace::<E>(m, n, self.qr.block_len());
        qr_in_place(
            &mut self.qr,
            &mut self.gammas,
            self.params.parallelism,
            PodStack::new(&mut mem),
        );
        self.decomposed = true;
    }

    /// Returns the packed result of the decomposition in block storage.
    ///
    /// # Panics
    /// Panics if no matrix has been decomposed.
    #[track_caller]
    pub fn qr_block(&self) -> &BlockMat<E> {
        assert_decomposed(self.decomposed);
        &self.qr
    }

    /// Returns $Q$ in block storage.
    ///
    /// # Panics
    /// Panics if no matrix has been decomposed.
    #[track_caller]
    pub fn q_block(&self, compact: bool) -> BlockMat<E> {
        let (m, n) = self.q_shape(compact);
        let mut q = BlockMat::zeros(m, n, self.qr.block_len());
        let mut mem = workspace::<E>(m, n, self.qr.block_len());
        q_in_place(
            &self.qr,
            &self.gammas,
            &mut q,
            self.params.parallelism,
            PodStack::new(&mut mem),
        );
        q
    }

    /// Computes $B \gets QB$ for a matrix in block storage.
    ///
    /// Returns [`LinalgError::DimensionMismatch`] if `b` does not have as many rows as the
    /// decomposed matrix.
    ///
    /// # Panics
    /// Panics if `b` does not have the same block length as the working storage.
    #[track_caller]
    pub fn apply_q_block(&self, b: &mut BlockMat<E>) -> Result<(), LinalgError> {
        self.apply_block(b, false)
    }

    /// Computes $B \gets Q^T B$ for a matrix in block storage.
    ///
    /// Returns [`LinalgError::DimensionMismatch`] if `b` does not have as many rows as the
    /// decomposed matrix.
    ///
    /// # Panics
    /// Panics if `b` does not have the same block length as the working storage.
    #[track_caller]
    pub fn apply_transpose_q_block(&self, b: &mut BlockMat<E>) -> Result<(), LinalgError> {
        self.apply_block(b, true)
    }

    #[track_caller]
    fn apply_block(&self, b: &mut BlockMat<E>, transpose: bool) -> Result<(), LinalgError> {
        check_apply_shape(self.nrows(), b.shape())?;
        let mut mem = workspace::<E>(self.qr.nrows(), b.ncols(), self.qr.block_len());
        apply_q_impl(
            &self.qr,
            &self.gammas,
            b,
            transpose,
            false,
            self.params.parallelism,
            PodStack::new(&mut mem),
        );
        Ok(())
    }
}

impl<E: RealField> QrDecomposition<E> for BlockHouseholderQr<E> {
    fn decompose(&mut self, matrix: MatRef<'_, E>) -> Result<(), LinalgError> {
        let (m, n) = matrix.shape();
        let mut qr = core::mem::replace(&mut self.qr, BlockMat::zeros(0, 0, 1));
        if qr.block_len() != self.params.block_len {
            qr = BlockMat::zeros(m, n, self.params.block_len);
        } else {
            qr.reshape(m, n);
        }
        qr.copy_from_mat(matrix);
        self.decompose_block(qr);
        Ok(())
    }

    #[inline]
    fn input_modified(&self) -> bool {
        false
    }

    #[track_caller]
    fn nrows(&self) -> usize {
        assert_decomposed(self.decomposed);
        self.qr.nrows()
    }

    #[track_caller]
    fn ncols(&self) -> usize {
        assert_decomposed(self.decomposed);
        self.qr.ncols()
    }

    #[track_caller]
    fn gammas(&self) -> &[E] {
        assert_decomposed(self.decomposed);
        &self.gammas
    }

    #[track_caller]
    fn write_q(&self, q: MatMut<'_, E>, compact: bool) {
        assert!(q.shape() == self.q_shape(compact));
        self.q_block(compact).copy_to_mat(q);
    }

    #[track_caller]
    fn write_r(&self, r: MatMut<'_, E>, compact: bool) {
        let mut r = r;
        assert!(r.shape() == self.r_shape(compact));
        r.fill_zero();
        for i in 0..r.nrows() {
            for j in i..r.ncols() {
                r.write(i, j, self.qr.read(i, j));
            }
        }
    }

    fn apply_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError> {
        check_apply_shape(self.nrows(), b.shape())?;
        let mut block = BlockMat::from_mat(b.rb(), self.qr.block_len());
        self.apply_block(&mut block, false)?;
        block.copy_to_mat(b);
        Ok(())
    }

    fn apply_transpose_q(&self, b: MatMut<'_, E>) -> Result<(), LinalgError> {
        check_apply_shape(self.nrows(), b.shape())?;
        let mut block = BlockMat::from_mat(b.rb(), self.qr.block_len());
        self.apply_block(&mut block, true)?;
        block.copy_to_mat(b);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assert,
        linalg::qr::{
            tests_common::{
                assert_mat_approx_eq, check_apply, check_buffers, check_reconstruction,
                random_mat,
            },
            HouseholderTranQr,
        },
        Mat,
    };

    macro_rules! make_stack {
        ($req: expr $(,)?) => {
            ::dyn_stack::PodStack::new(&mut ::dyn_stack::GlobalPodBuffer::new($req.unwrap()))
        };
    }

    fn parallelisms() -> Vec<Parallelism> {
        vec![
            Parallelism::None,
            #[cfg(feature = "rayon")]
            Parallelism::Rayon(0),
            #[cfg(feature = "rayon")]
            Parallelism::Rayon(3),
        ]
    }

    fn shapes_around(r: usize) -> Vec<(usize, usize)> {
        let sizes = [1, r - 1, r, r + 1, 2 * r, 2 * r + 1, 3 * r + 2];
        let mut shapes = Vec::new();
        for &m in &sizes {
            for &n in &sizes {
                if m > 0 && n > 0 {
                    shapes.push((m, n));
                }
            }
        }
        shapes
    }

    #[test]
    fn test_matches_unblocked() {
        let r = 3;
        let mut unblocked = HouseholderTranQr::new();
        for (m, n) in shapes_around(r) {
            let a = random_mat(m, n);
            unblocked.decompose(a.as_ref()).unwrap();

            let mut block = BlockHouseholderQr::with_params(BlockQrParams {
                block_len: r,
                parallelism: Parallelism::None,
            });
            block.decompose(a.as_ref()).unwrap();

            for (g0, g1) in block.gammas().iter().zip(unblocked.gammas()) {
                assert!((g0 - g1).abs() < 1e-10);
            }
            for compact in [true, false] {
                assert_mat_approx_eq(block.q(compact).as_ref(), unblocked.q(compact).as_ref());
                assert_mat_approx_eq(block.r(compact).as_ref(), unblocked.r(compact).as_ref());
            }
        }
    }

    #[test]
    fn test_reconstruction() {
        for r in [1, 2, 3, 5] {
            let mut qr = BlockHouseholderQr::with_params(BlockQrParams {
                block_len: r,
                parallelism: Parallelism::None,
            });
            for (m, n) in [(7, 7), (10, 4), (4, 10), (11, 9)] {
                let a = random_mat(m, n);
                check_reconstruction(&mut qr, &a);
                check_buffers(&qr);
                check_apply(&qr);
            }
        }
    }

    #[test]
    fn test_parallel_is_bit_identical() {
        let r = 4;
        for (m, n) in [(17, 17), (30, 9), (9, 30), (41, 40)] {
            let a = random_mat(m, n);

            let mut reference = BlockMat::from_mat(a.as_ref(), r);
            let mut reference_gammas = vec![0.0; Ord::min(m, n)];
            qr_in_place(
                &mut reference,
                &mut reference_gammas,
                Parallelism::None,
                make_stack!(qr_in_place_req::<f64>(m, n, r)),
            );

            for parallelism in parallelisms() {
                let mut block = BlockMat::from_mat(a.as_ref(), r);
                let mut gammas = vec![0.0; Ord::min(m, n)];
                qr_in_place(
                    &mut block,
                    &mut gammas,
                    parallelism,
                    make_stack!(qr_in_place_req::<f64>(m, n, r)),
                );
                assert!(gammas == reference_gammas);
                assert!(block == reference);

                let mut q = BlockMat::zeros(m, m, r);
                q_in_place(
                    &block,
                    &gammas,
                    &mut q,
                    parallelism,
                    make_stack!(apply_q_req::<f64>(m, r, m)),
                );
                let mut q_ref = BlockMat::zeros(m, m, r);
                q_in_place(
                    &reference,
                    &reference_gammas,
                    &mut q_ref,
                    Parallelism::None,
                    make_stack!(apply_q_req::<f64>(m, r, m)),
                );
                assert!(q == q_ref);
            }
        }
    }

    #[test]
    fn test_block_apply() {
        let r = 3;
        let (m, n) = (10, 7);
        let a = random_mat(m, n);
        let mut qr = BlockHouseholderQr::with_params(BlockQrParams {
            block_len: r,
            parallelism: Parallelism::None,
        });
        qr.decompose_block(BlockMat::from_mat(a.as_ref(), r));

        // Qᵗ·A == R
        let mut b = BlockMat::from_mat(a.as_ref(), r);
        qr.apply_transpose_q_block(&mut b).unwrap();
        assert_mat_approx_eq(b.to_mat().as_ref(), qr.r(false).as_ref());

        // Q·R == A
        qr.apply_q_block(&mut b).unwrap();
        assert_mat_approx_eq(b.to_mat().as_ref(), a.as_ref());

        let mut wrong = BlockMat::zeros(m + 1, 2, r);
        assert!(qr.apply_q_block(&mut wrong).is_err());
    }

    #[test]
    fn test_zero_columns_are_tolerated() {
        let r = 2;
        let a = Mat::from_fn(6, 5, |i, j| if j == 1 || j == 2 { 0.0 } else { (i + j) as f64 });
        let mut qr = BlockHouseholderQr::with_params(BlockQrParams {
            block_len: r,
            parallelism: Parallelism::None,
        });
        check_reconstruction(&mut qr, &a);
    }
}
