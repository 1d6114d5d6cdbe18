//! Blocked CSR matrix with compile-time tile shape

use nalgebra::{SMatrix, SVector};

use crate::containers::{ArrayHandle, CloneMode, DenseVectorBlocked, LinOp, VectorOps};
use crate::error::{check_sizes, FemError, FemResult};
use crate::scalar::{DataType, IndexType};

/// COO-style builder for blocked matrices; duplicate tiles accumulate.
pub struct BcsrBuilder<DT: DataType, const M: usize, const N: usize> {
    rows: usize,
    columns: usize,
    entries: Vec<(usize, usize, SMatrix<DT, M, N>)>,
}

impl<DT: DataType, const M: usize, const N: usize> BcsrBuilder<DT, M, N> {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn add(&mut self, row: usize, col: usize, tile: SMatrix<DT, M, N>) {
        debug_assert!(row < self.rows && col < self.columns);
        self.entries.push((row, col, tile));
    }

    pub fn build<IT: IndexType>(mut self) -> SparseMatrixBcsr<DT, IT, M, N> {
        self.entries.sort_by_key(|&(r, c, _)| (r, c));

        let mut row_counts = vec![0usize; self.rows];
        let mut col_idx: Vec<IT> = Vec::new();
        let mut tiles: Vec<SMatrix<DT, M, N>> = Vec::new();
        let mut last: Option<(usize, usize)> = None;

        for &(r, c, t) in &self.entries {
            if last == Some((r, c)) {
                let p = tiles.len() - 1;
                tiles[p] += t;
            } else {
                col_idx.push(IT::from_usize(c));
                tiles.push(t);
                row_counts[r] += 1;
                last = Some((r, c));
            }
        }

        let mut row_ptr = vec![IT::from_usize(0); self.rows + 1];
        let mut offset = 0;
        for (i, &n) in row_counts.iter().enumerate() {
            offset += n;
            row_ptr[i + 1] = IT::from_usize(offset);
        }

        let mut val = Vec::with_capacity(tiles.len() * M * N);
        for t in &tiles {
            for i in 0..M {
                for j in 0..N {
                    val.push(t[(i, j)]);
                }
            }
        }

        SparseMatrixBcsr {
            rows: self.rows,
            columns: self.columns,
            row_ptr: ArrayHandle::new(row_ptr),
            col_idx: ArrayHandle::new(col_idx),
            val: ArrayHandle::new(val),
        }
    }
}

/// Blocked CSR: every logical entry stores an `M x N` dense tile in
/// row-major order.
#[derive(Debug, Clone)]
pub struct SparseMatrixBcsr<DT: DataType = f64, IT: IndexType = u64, const M: usize = 2, const N: usize = 2>
{
    rows: usize,
    columns: usize,
    row_ptr: ArrayHandle<IT>,
    col_idx: ArrayHandle<IT>,
    val: ArrayHandle<DT>,
}

impl<DT: DataType, IT: IndexType, const M: usize, const N: usize> SparseMatrixBcsr<DT, IT, M, N> {
    /// Number of block rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of block columns.
    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Number of stored tiles.
    pub fn used_elements(&self) -> usize {
        self.col_idx.len()
    }

    /// Raw scalar rows, `rows * M`.
    pub fn raw_rows(&self) -> usize {
        self.rows * M
    }

    pub fn clone_mode(&self, mode: CloneMode) -> Self {
        let (row_ptr, col_idx, val) = match mode {
            CloneMode::Shallow => (self.row_ptr.share(), self.col_idx.share(), self.val.share()),
            CloneMode::Layout => (
                self.row_ptr.share(),
                self.col_idx.share(),
                self.val.fresh_zeros(),
            ),
            CloneMode::Weak => (
                self.row_ptr.share(),
                self.col_idx.share(),
                self.val.duplicate(),
            ),
            CloneMode::Deep => (
                self.row_ptr.duplicate(),
                self.col_idx.duplicate(),
                self.val.duplicate(),
            ),
        };
        Self {
            rows: self.rows,
            columns: self.columns,
            row_ptr,
            col_idx,
            val,
        }
    }

    #[inline]
    fn tile(&self, p: usize) -> SMatrix<DT, M, N> {
        let base = p * M * N;
        let val = self.val.as_slice();
        SMatrix::from_fn(|i, j| val[base + i * N + j])
    }

    pub fn get(&self, row: usize, col: usize) -> SMatrix<DT, M, N> {
        let a = self.row_ptr.as_slice()[row].as_usize();
        let b = self.row_ptr.as_slice()[row + 1].as_usize();
        let cols = &self.col_idx.as_slice()[a..b];
        match cols.binary_search(&IT::from_usize(col)) {
            Ok(p) => self.tile(a + p),
            Err(_) => SMatrix::zeros(),
        }
    }

    /// Unrolls into a scalar CSR matrix of shape `(rows*M, columns*N)`.
    pub fn unblock(&self) -> crate::containers::SparseMatrixCsr<DT, IT> {
        let mut b = crate::containers::csr::CsrBuilder::new(self.rows * M, self.columns * N);
        for row in 0..self.rows {
            let ra = self.row_ptr.as_slice()[row].as_usize();
            let rb = self.row_ptr.as_slice()[row + 1].as_usize();
            for p in ra..rb {
                let col = self.col_idx.as_slice()[p].as_usize();
                let t = self.tile(p);
                for i in 0..M {
                    for j in 0..N {
                        b.add(row * M + i, col * N + j, t[(i, j)]);
                    }
                }
            }
        }
        b.build()
    }

    pub fn create_vector_l(&self) -> DenseVectorBlocked<DT, M> {
        DenseVectorBlocked::new(self.rows)
    }

    pub fn create_vector_r(&self) -> DenseVectorBlocked<DT, N> {
        DenseVectorBlocked::new(self.columns)
    }

    fn apply_impl(
        &self,
        r: &mut DenseVectorBlocked<DT, M>,
        x: &DenseVectorBlocked<DT, N>,
        y: Option<(&DenseVectorBlocked<DT, M>, DT)>,
    ) -> FemResult<()> {
        check_sizes(self.columns, x.size())?;
        check_sizes(self.rows, r.size())?;
        if let Some((y, _)) = y {
            check_sizes(self.rows, y.size())?;
        }
        let neg_one = DT::of(-1.0);
        for row in 0..self.rows {
            let a = self.row_ptr.as_slice()[row].as_usize();
            let b = self.row_ptr.as_slice()[row + 1].as_usize();
            let mut sum: SVector<DT, M> = SVector::zeros();
            for p in a..b {
                let col = self.col_idx.as_slice()[p].as_usize();
                sum += self.tile(p) * x.at(col);
            }
            let out = match y {
                None => sum,
                Some((y, alpha)) if alpha == neg_one => y.at(row) - sum,
                Some((y, alpha)) => sum * alpha + y.at(row),
            };
            r.set(row, out);
        }
        Ok(())
    }
}

impl<DT: DataType, IT: IndexType, const M: usize, const N: usize>
    LinOp<DenseVectorBlocked<DT, N>, DenseVectorBlocked<DT, M>> for SparseMatrixBcsr<DT, IT, M, N>
{
    fn apply(
        &self,
        r: &mut DenseVectorBlocked<DT, M>,
        x: &DenseVectorBlocked<DT, N>,
    ) -> FemResult<()> {
        self.apply_impl(r, x, None)
    }

    fn apply_scaled_sum(
        &self,
        r: &mut DenseVectorBlocked<DT, M>,
        x: &DenseVectorBlocked<DT, N>,
        y: &DenseVectorBlocked<DT, M>,
        alpha: DT,
    ) -> FemResult<()> {
        // Guard against r aliasing y through a shallow handle: read y first.
        let y_copy = y.clone_mode(CloneMode::Weak);
        self.apply_impl(r, x, Some((&y_copy, alpha)))
    }
}

impl<DT: DataType, IT: IndexType, const M: usize, const N: usize> SparseMatrixBcsr<DT, IT, M, N> {
    /// Builds from raw arrays; tile data is row-major per entry.
    pub fn from_raw(
        rows: usize,
        columns: usize,
        row_ptr: Vec<IT>,
        col_idx: Vec<IT>,
        val: Vec<DT>,
    ) -> FemResult<Self> {
        if row_ptr.len() != rows + 1 {
            return Err(FemError::InvalidArgument(format!(
                "row pointer length {} does not match {} rows",
                row_ptr.len(),
                rows
            )));
        }
        check_sizes(col_idx.len() * M * N, val.len())?;
        Ok(Self {
            rows,
            columns,
            row_ptr: ArrayHandle::new(row_ptr),
            col_idx: ArrayHandle::new(col_idx),
            val: ArrayHandle::new(val),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Matrix2, Vector2};

    #[test]
    fn test_blocked_spmv_matches_unblocked() {
        let mut b = BcsrBuilder::<f64, 2, 2>::new(2, 2);
        b.add(0, 0, Matrix2::new(1.0, 2.0, 3.0, 4.0));
        b.add(0, 1, Matrix2::new(0.5, 0.0, 0.0, 0.5));
        b.add(1, 1, Matrix2::identity());
        let m: SparseMatrixBcsr<f64, u64, 2, 2> = b.build();

        let mut x = m.create_vector_r();
        x.set(0, Vector2::new(1.0, -1.0));
        x.set(1, Vector2::new(2.0, 3.0));
        let mut r = m.create_vector_l();
        m.apply(&mut r, &x).unwrap();

        let scalar = m.unblock();
        let xf = x.unblock();
        let mut rf = scalar.create_vector_l();
        use crate::containers::LinOp;
        scalar.apply(&mut rf, &xf).unwrap();

        for i in 0..rf.size() {
            assert_relative_eq!(r.unblock().at(i), rf.at(i), epsilon = 1e-14);
        }
    }

    #[test]
    fn test_tile_accumulation() {
        let mut b = BcsrBuilder::<f64, 2, 2>::new(1, 1);
        b.add(0, 0, Matrix2::identity());
        b.add(0, 0, Matrix2::identity());
        let m: SparseMatrixBcsr<f64, u32, 2, 2> = b.build();
        assert_eq!(m.used_elements(), 1);
        assert_relative_eq!(m.get(0, 0)[(0, 0)], 2.0);
    }
}
