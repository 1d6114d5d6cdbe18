//! Banded sparse matrix

use nalgebra::DMatrix;

use crate::containers::{ArrayHandle, CloneMode, DenseVector, LinOp, VectorOps};
use crate::error::{check_sizes, FemError, FemResult};
use crate::scalar::{DataType, IndexType};

/// Sparse matrix storing full diagonals.
///
/// A diagonal with offset `o` holds the entries `(i, j)` with
/// `j = i + o + 1 - rows`; the main diagonal has offset `rows - 1`. Every
/// diagonal is stored over all `rows` positions, so the value array has
/// `rows * num_offsets` entries and out-of-matrix positions are simply
/// never referenced.
#[derive(Debug, Clone)]
pub struct SparseMatrixBanded<DT: DataType = f64, IT: IndexType = u64> {
    rows: usize,
    columns: usize,
    offsets: ArrayHandle<IT>,
    val: ArrayHandle<DT>,
}

impl<DT: DataType, IT: IndexType> SparseMatrixBanded<DT, IT> {
    /// Creates a banded matrix from its offsets and per-diagonal values.
    ///
    /// Offsets must be strictly increasing and inside
    /// `[0, rows + columns - 1)`; anything else is rejected before any
    /// state is built.
    pub fn new(
        rows: usize,
        columns: usize,
        offsets: Vec<IT>,
        val: Vec<DT>,
    ) -> FemResult<Self> {
        for (k, o) in offsets.iter().enumerate() {
            let o = o.as_usize();
            if o >= rows + columns - 1 {
                return Err(FemError::InvalidOffset {
                    offset: o as i64,
                    rows,
                    columns,
                });
            }
            if k > 0 && offsets[k - 1].as_usize() >= o {
                return Err(FemError::InvalidArgument(
                    "band offsets must be strictly increasing".to_string(),
                ));
            }
        }
        check_sizes(rows * offsets.len(), val.len())?;
        Ok(Self {
            rows,
            columns,
            offsets: ArrayHandle::new(offsets),
            val: ArrayHandle::new(val),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn num_offsets(&self) -> usize {
        self.offsets.len()
    }

    pub fn offsets(&self) -> &[IT] {
        self.offsets.as_slice()
    }

    pub fn values(&self) -> &[DT] {
        self.val.as_slice()
    }

    pub fn values_mut(&mut self) -> &mut [DT] {
        self.val.as_mut_slice()
    }

    pub fn clone_mode(&self, mode: CloneMode) -> Self {
        let (offsets, val) = match mode {
            CloneMode::Shallow => (self.offsets.share(), self.val.share()),
            CloneMode::Layout => (self.offsets.share(), self.val.fresh_zeros()),
            CloneMode::Weak => (self.offsets.share(), self.val.duplicate()),
            CloneMode::Deep => (self.offsets.duplicate(), self.val.duplicate()),
        };
        Self {
            rows: self.rows,
            columns: self.columns,
            offsets,
            val,
        }
    }

    /// Column hit by diagonal `o` in row `i`, if inside the matrix.
    #[inline]
    fn column_of(&self, i: usize, o: usize) -> Option<usize> {
        let j = (i + o + 1).checked_sub(self.rows)?;
        (j < self.columns).then_some(j)
    }

    pub fn get(&self, row: usize, col: usize) -> DT {
        for (d, o) in self.offsets.as_slice().iter().enumerate() {
            if self.column_of(row, o.as_usize()) == Some(col) {
                return self.val.as_slice()[d * self.rows + row];
            }
        }
        DT::zero()
    }

    pub fn to_dense(&self) -> DMatrix<DT> {
        let mut m = DMatrix::zeros(self.rows, self.columns);
        for (d, o) in self.offsets.as_slice().iter().enumerate() {
            for i in 0..self.rows {
                if let Some(j) = self.column_of(i, o.as_usize()) {
                    m[(i, j)] = self.val.as_slice()[d * self.rows + i];
                }
            }
        }
        m
    }

    pub fn create_vector_l(&self) -> DenseVector<DT> {
        DenseVector::new(self.rows)
    }

    pub fn create_vector_r(&self) -> DenseVector<DT> {
        DenseVector::new(self.columns)
    }
}

impl<DT: DataType, IT: IndexType> LinOp<DenseVector<DT>> for SparseMatrixBanded<DT, IT> {
    fn apply(&self, r: &mut DenseVector<DT>, x: &DenseVector<DT>) -> FemResult<()> {
        check_sizes(self.columns, x.size())?;
        check_sizes(self.rows, r.size())?;
        let offsets = self.offsets.as_slice();
        let val = self.val.as_slice();
        let xs = x.elements().to_vec();
        let rs = r.elements_mut();
        for i in 0..self.rows {
            let mut sum = DT::zero();
            for (d, o) in offsets.iter().enumerate() {
                if let Some(j) = {
                    let j = (i + o.as_usize() + 1).checked_sub(self.rows);
                    j.filter(|&j| j < self.columns)
                } {
                    sum += val[d * self.rows + i] * xs[j];
                }
            }
            rs[i] = sum;
        }
        Ok(())
    }

    fn apply_scaled_sum(
        &self,
        r: &mut DenseVector<DT>,
        x: &DenseVector<DT>,
        y: &DenseVector<DT>,
        alpha: DT,
    ) -> FemResult<()> {
        check_sizes(self.rows, y.size())?;
        let ys = y.elements().to_vec();
        self.apply(r, x)?;
        let neg_one = DT::of(-1.0);
        let rs = r.elements_mut();
        if alpha == neg_one {
            for (v, &b) in rs.iter_mut().zip(&ys) {
                *v = b - *v;
            }
        } else {
            for (v, &b) in rs.iter_mut().zip(&ys) {
                *v = alpha * *v + b;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Tridiagonal 1-D Laplace stencil on 4 dofs.
    fn laplace_banded() -> SparseMatrixBanded<f64, u64> {
        let n = 4;
        let offsets = vec![(n - 2) as u64, (n - 1) as u64, n as u64];
        let mut val = vec![0.0; 3 * n];
        for i in 0..n {
            val[i] = -1.0; // sub-diagonal
            val[n + i] = 2.0; // main
            val[2 * n + i] = -1.0; // super-diagonal
        }
        SparseMatrixBanded::new(n, n, offsets, val).unwrap()
    }

    #[test]
    fn test_rejects_bad_offset() {
        let r = SparseMatrixBanded::<f64, u64>::new(3, 3, vec![7], vec![0.0; 3]);
        assert!(r.is_err());
    }

    #[test]
    fn test_spmv_matches_dense() {
        let m = laplace_banded();
        let x = DenseVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let mut r = m.create_vector_l();
        m.apply(&mut r, &x).unwrap();

        let dense = m.to_dense();
        let xd = nalgebra::DVector::from_vec(x.elements().to_vec());
        let rd = &dense * &xd;
        for i in 0..4 {
            assert_relative_eq!(r.at(i), rd[i], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_defect() {
        let m = laplace_banded();
        let x = DenseVector::from_vec(vec![1.0, 1.0, 1.0, 1.0]);
        let b = DenseVector::from_vec(vec![1.0, 0.0, 0.0, 1.0]);
        let mut d = m.create_vector_l();
        m.apply_defect(&mut d, &b, &x).unwrap();
        for i in 0..4 {
            assert_relative_eq!(d.at(i), 0.0, epsilon = 1e-14);
        }
    }
}
