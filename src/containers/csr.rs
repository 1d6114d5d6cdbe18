//! Compressed sparse row matrix

use nalgebra::DMatrix;

use crate::containers::{ArrayHandle, CloneMode, DenseVector, LinOp, VectorOps};
use crate::error::{check_sizes, FemError, FemResult};
use crate::scalar::{DataType, IndexType};

/// Incremental COO-style builder; duplicate entries accumulate.
///
/// More efficient for element-wise assembly than inserting into the
/// compressed format directly.
pub struct CsrBuilder<DT: DataType = f64> {
    rows: usize,
    columns: usize,
    entries: Vec<(usize, usize, DT)>,
}

impl<DT: DataType> CsrBuilder<DT> {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            rows,
            columns,
            entries: Vec::new(),
        }
    }

    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: DT) {
        debug_assert!(row < self.rows && col < self.columns);
        self.entries.push((row, col, value));
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn build<IT: IndexType>(mut self) -> SparseMatrixCsr<DT, IT> {
        self.entries.sort_by_key(|&(r, c, _)| (r, c));

        let mut row_counts = vec![0usize; self.rows];
        let mut col_idx: Vec<IT> = Vec::with_capacity(self.entries.len());
        let mut val: Vec<DT> = Vec::with_capacity(self.entries.len());
        let mut last: Option<(usize, usize)> = None;

        for &(r, c, v) in &self.entries {
            if last == Some((r, c)) {
                let p = val.len() - 1;
                val[p] += v;
            } else {
                col_idx.push(IT::from_usize(c));
                val.push(v);
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

        SparseMatrixCsr {
            rows: self.rows,
            columns: self.columns,
            row_ptr: ArrayHandle::new(row_ptr),
            col_idx: ArrayHandle::new(col_idx),
            val: ArrayHandle::new(val),
        }
    }
}

/// Sparse matrix in CSR format: `(row_ptr[rows+1], col_ind[nnz], val[nnz])`.
///
/// The three arrays are independently reference-counted handles; layout
/// clones share the structure arrays and allocate fresh values, which is
/// how symbolic assembly hands a zero matrix to numerical assembly.
#[derive(Debug, Clone)]
pub struct SparseMatrixCsr<DT: DataType = f64, IT: IndexType = u64> {
    rows: usize,
    columns: usize,
    row_ptr: ArrayHandle<IT>,
    col_idx: ArrayHandle<IT>,
    val: ArrayHandle<DT>,
}

impl<DT: DataType, IT: IndexType> SparseMatrixCsr<DT, IT> {
    /// Builds from raw CSR arrays, validating the row pointer invariant
    /// `row_ptr[i] <= row_ptr[i+1] <= nnz`.
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
        check_sizes(col_idx.len(), val.len())?;
        let nnz = col_idx.len();
        for i in 0..rows {
            if row_ptr[i] > row_ptr[i + 1] || row_ptr[i + 1].as_usize() > nnz {
                return Err(FemError::InvalidArgument(format!(
                    "row pointer not monotone at row {i}"
                )));
            }
        }
        Ok(Self {
            rows,
            columns,
            row_ptr: ArrayHandle::new(row_ptr),
            col_idx: ArrayHandle::new(col_idx),
            val: ArrayHandle::new(val),
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn used_elements(&self) -> usize {
        self.val.len()
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

    pub fn row_ptr(&self) -> &[IT] {
        self.row_ptr.as_slice()
    }

    pub fn col_idx(&self) -> &[IT] {
        self.col_idx.as_slice()
    }

    pub fn values(&self) -> &[DT] {
        self.val.as_slice()
    }

    pub fn values_mut(&mut self) -> &mut [DT] {
        self.val.as_mut_slice()
    }

    /// Column indices of row `i`.
    pub fn row_indices(&self, i: usize) -> &[IT] {
        let a = self.row_ptr.as_slice()[i].as_usize();
        let b = self.row_ptr.as_slice()[i + 1].as_usize();
        &self.col_idx.as_slice()[a..b]
    }

    /// Entry lookup; absent entries read as zero.
    pub fn get(&self, row: usize, col: usize) -> DT {
        let a = self.row_ptr.as_slice()[row].as_usize();
        let b = self.row_ptr.as_slice()[row + 1].as_usize();
        let cols = &self.col_idx.as_slice()[a..b];
        match cols.binary_search(&IT::from_usize(col)) {
            Ok(p) => self.val.as_slice()[a + p],
            Err(_) => DT::zero(),
        }
    }

    /// Writes an existing entry; structure is fixed after symbolic assembly.
    pub fn set(&mut self, row: usize, col: usize, value: DT) -> FemResult<()> {
        let a = self.row_ptr.as_slice()[row].as_usize();
        let b = self.row_ptr.as_slice()[row + 1].as_usize();
        let pos = {
            let cols = &self.col_idx.as_slice()[a..b];
            cols.binary_search(&IT::from_usize(col)).map_err(|_| {
                FemError::InvalidArgument(format!("entry ({row},{col}) not in matrix structure"))
            })?
        };
        self.val.as_mut_slice()[a + pos] = value;
        Ok(())
    }

    /// Sets every stored value to `alpha`.
    pub fn format(&mut self, alpha: DT) {
        for v in self.val.as_mut_slice() {
            *v = alpha;
        }
    }

    /// Extracts the main diagonal.
    pub fn extract_diag(&self) -> DenseVector<DT> {
        let mut d = DenseVector::new(self.rows);
        for i in 0..self.rows {
            d.set(i, self.get(i, i));
        }
        d
    }

    /// Rescales row `i` by `factors[i]`.
    pub fn scale_rows(&mut self, factors: &DenseVector<DT>) -> FemResult<()> {
        check_sizes(self.rows, factors.size())?;
        let row_ptr = self.row_ptr.share();
        let val = self.val.as_mut_slice();
        for i in 0..self.rows {
            let a = row_ptr.as_slice()[i].as_usize();
            let b = row_ptr.as_slice()[i + 1].as_usize();
            let f = factors.at(i);
            for v in &mut val[a..b] {
                *v *= f;
            }
        }
        Ok(())
    }

    /// Physical transpose (values and structure).
    pub fn transpose(&self) -> Self {
        let mut counts = vec![0usize; self.columns + 1];
        for c in self.col_idx.as_slice() {
            counts[c.as_usize() + 1] += 1;
        }
        for i in 0..self.columns {
            counts[i + 1] += counts[i];
        }
        let nnz = self.used_elements();
        let mut row_ptr: Vec<IT> = counts.iter().map(|&c| IT::from_usize(c)).collect();
        let mut col_idx = vec![IT::from_usize(0); nnz];
        let mut val = vec![DT::zero(); nnz];
        let mut cursor = counts;
        for i in 0..self.rows {
            let a = self.row_ptr.as_slice()[i].as_usize();
            let b = self.row_ptr.as_slice()[i + 1].as_usize();
            for p in a..b {
                let c = self.col_idx.as_slice()[p].as_usize();
                let dst = cursor[c];
                cursor[c] += 1;
                col_idx[dst] = IT::from_usize(i);
                val[dst] = self.val.as_slice()[p];
            }
        }
        row_ptr[self.columns] = IT::from_usize(nnz);
        Self {
            rows: self.columns,
            columns: self.rows,
            row_ptr: ArrayHandle::new(row_ptr),
            col_idx: ArrayHandle::new(col_idx),
            val: ArrayHandle::new(val),
        }
    }

    /// Dense copy for comparison and debugging.
    pub fn to_dense(&self) -> DMatrix<DT> {
        let mut m = DMatrix::zeros(self.rows, self.columns);
        for i in 0..self.rows {
            let a = self.row_ptr.as_slice()[i].as_usize();
            let b = self.row_ptr.as_slice()[i + 1].as_usize();
            for p in a..b {
                m[(i, self.col_idx.as_slice()[p].as_usize())] = self.val.as_slice()[p];
            }
        }
        m
    }

    /// Row-sum maximum norm.
    pub fn norm_inf(&self) -> DT {
        let mut max = DT::zero();
        for i in 0..self.rows {
            let a = self.row_ptr.as_slice()[i].as_usize();
            let b = self.row_ptr.as_slice()[i + 1].as_usize();
            let mut sum = DT::zero();
            for p in a..b {
                sum += self.val.as_slice()[p].abs();
            }
            if sum > max {
                max = sum;
            }
        }
        max
    }

    /// Fresh right-hand-side sized vector.
    pub fn create_vector_l(&self) -> DenseVector<DT> {
        DenseVector::new(self.rows)
    }

    /// Fresh solution sized vector.
    pub fn create_vector_r(&self) -> DenseVector<DT> {
        DenseVector::new(self.columns)
    }

    /// Replaces row `i` by the unit row `e_i`; entries off the diagonal are
    /// zeroed, the diagonal entry (which must be present) is set to one.
    pub fn set_unit_row(&mut self, i: usize) -> FemResult<()> {
        let a = self.row_ptr.as_slice()[i].as_usize();
        let b = self.row_ptr.as_slice()[i + 1].as_usize();
        let diag = {
            let cols = &self.col_idx.as_slice()[a..b];
            cols.binary_search(&IT::from_usize(i)).map_err(|_| {
                FemError::InvalidArgument(format!("row {i} has no diagonal entry"))
            })?
        };
        let val = self.val.as_mut_slice();
        for v in &mut val[a..b] {
            *v = DT::zero();
        }
        val[a + diag] = DT::of(1.0);
        Ok(())
    }
}

impl<DT: DataType, IT: IndexType> LinOp<DenseVector<DT>> for SparseMatrixCsr<DT, IT> {
    fn apply(&self, r: &mut DenseVector<DT>, x: &DenseVector<DT>) -> FemResult<()> {
        check_sizes(self.columns, x.size())?;
        check_sizes(self.rows, r.size())?;
        let row_ptr = self.row_ptr.as_slice();
        let col_idx = self.col_idx.as_slice();
        let val = self.val.as_slice();
        let xs = x.elements();
        let rs = r.elements_mut();
        for i in 0..self.rows {
            let a = row_ptr[i].as_usize();
            let b = row_ptr[i + 1].as_usize();
            if a == b {
                rs[i] = DT::zero();
                continue;
            }
            let mut sum = DT::zero();
            for p in a..b {
                sum += val[p] * xs[col_idx[p].as_usize()];
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
        check_sizes(self.columns, x.size())?;
        check_sizes(self.rows, r.size())?;
        check_sizes(self.rows, y.size())?;
        let row_ptr = self.row_ptr.as_slice();
        let col_idx = self.col_idx.as_slice();
        let val = self.val.as_slice();
        let xs = x.elements().to_vec();
        let ys: Vec<DT> = y.elements().to_vec();
        let rs = r.elements_mut();
        let neg_one = DT::of(-1.0);
        for i in 0..self.rows {
            let a = row_ptr[i].as_usize();
            let b = row_ptr[i + 1].as_usize();
            let mut sum = DT::zero();
            for p in a..b {
                sum += val[p] * xs[col_idx[p].as_usize()];
            }
            rs[i] = if alpha == neg_one {
                ys[i] - sum
            } else {
                alpha * sum + ys[i]
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn laplace_3() -> SparseMatrixCsr<f64, u64> {
        let mut b = CsrBuilder::new(3, 3);
        b.add(0, 0, 2.0);
        b.add(0, 1, -1.0);
        b.add(1, 0, -1.0);
        b.add(1, 1, 2.0);
        b.add(1, 2, -1.0);
        b.add(2, 1, -1.0);
        b.add(2, 2, 2.0);
        b.build()
    }

    #[test]
    fn test_builder_accumulates() {
        let mut b = CsrBuilder::new(2, 2);
        b.add(0, 0, 1.0);
        b.add(0, 0, 2.5);
        b.add(1, 1, 1.0);
        let m: SparseMatrixCsr<f64, u32> = b.build();
        assert_eq!(m.used_elements(), 2);
        assert_relative_eq!(m.get(0, 0), 3.5);
    }

    #[test]
    fn test_spmv_against_dense() {
        let m = laplace_3();
        let x = DenseVector::from_vec(vec![1.0, 2.0, 3.0]);
        let mut r = m.create_vector_l();
        m.apply(&mut r, &x).unwrap();

        let dense = m.to_dense();
        let xd = nalgebra::DVector::from_vec(x.elements().to_vec());
        let rd = &dense * &xd;
        for i in 0..3 {
            assert_relative_eq!(r.at(i), rd[i], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_defect_dispatch() {
        let m = laplace_3();
        let x = DenseVector::from_vec(vec![1.0, 1.0, 1.0]);
        let b = DenseVector::from_vec(vec![1.0, 0.0, 1.0]);
        let mut d = m.create_vector_l();
        m.apply_defect(&mut d, &b, &x).unwrap();
        assert_relative_eq!(d.at(0), 0.0);
        assert_relative_eq!(d.at(1), 0.0);
        assert_relative_eq!(d.at(2), 0.0);
    }

    #[test]
    fn test_transpose_involution() {
        let mut b = CsrBuilder::new(2, 3);
        b.add(0, 1, 2.0);
        b.add(0, 2, 3.0);
        b.add(1, 0, 4.0);
        let m: SparseMatrixCsr<f64, u64> = b.build();
        let mtt = m.transpose().transpose();
        assert_eq!(m.rows(), mtt.rows());
        assert_eq!(m.columns(), mtt.columns());
        assert_eq!(m.row_ptr(), mtt.row_ptr());
        assert_eq!(m.col_idx(), mtt.col_idx());
        for (a, b) in m.values().iter().zip(mtt.values()) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn test_unit_row() {
        let mut m = laplace_3();
        m.set_unit_row(1).unwrap();
        assert_relative_eq!(m.get(1, 0), 0.0);
        assert_relative_eq!(m.get(1, 1), 1.0);
        assert_relative_eq!(m.get(1, 2), 0.0);
    }
}
