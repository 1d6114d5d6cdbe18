//! SOR / Gauss-Seidel sweeps

use std::sync::Arc;

use crate::containers::{DenseVector, SparseMatrixCsr, VectorOps};
use crate::error::{FemError, FemResult};
use crate::scalar::{DataType, IndexType};
use crate::solver::{Solver, SolverStatus};

/// Successive over-relaxation: `n` forward Gauss-Seidel sweeps with
/// relaxation factor `omega`.
pub struct SorPrecon<DT: DataType = f64, IT: IndexType = u64> {
    matrix: Arc<SparseMatrixCsr<DT, IT>>,
    omega: DT,
    sweeps: usize,
}

impl<DT: DataType, IT: IndexType> SorPrecon<DT, IT> {
    pub fn new(matrix: Arc<SparseMatrixCsr<DT, IT>>, omega: DT, sweeps: usize) -> Self {
        Self {
            matrix,
            omega,
            sweeps,
        }
    }

    /// One in-place forward sweep on `A x = b`.
    pub fn sweep(&self, x: &mut DenseVector<DT>, b: &DenseVector<DT>) -> FemResult<()> {
        let m = self.matrix.as_ref();
        crate::error::check_sizes(m.rows(), x.size())?;
        crate::error::check_sizes(m.rows(), b.size())?;
        let row_ptr = m.row_ptr();
        let col_idx = m.col_idx();
        let val = m.values();
        let bs = b.elements().to_vec();
        let xs = x.elements_mut();
        for i in 0..m.rows() {
            let a = row_ptr[i].as_usize();
            let e = row_ptr[i + 1].as_usize();
            let mut sum = bs[i];
            let mut diag = DT::zero();
            for p in a..e {
                let j = col_idx[p].as_usize();
                if j == i {
                    diag = val[p];
                } else {
                    sum -= val[p] * xs[j];
                }
            }
            if diag == DT::zero() {
                return Err(FemError::InvalidArgument(format!(
                    "zero diagonal in row {i}"
                )));
            }
            let one = DT::of(1.0);
            xs[i] = (one - self.omega) * xs[i] + self.omega * sum / diag;
        }
        Ok(())
    }
}

impl<DT: DataType, IT: IndexType> Solver<DenseVector<DT>> for SorPrecon<DT, IT> {
    fn name(&self) -> &str {
        "SOR"
    }

    fn apply(&mut self, cor: &mut DenseVector<DT>, def: &DenseVector<DT>) -> FemResult<SolverStatus> {
        for _ in 0..self.sweeps {
            self.sweep(cor, def)?;
        }
        Ok(SolverStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{csr::CsrBuilder, LinOp};

    fn spd_5() -> SparseMatrixCsr<f64, u64> {
        let n = 5;
        let mut b = CsrBuilder::new(n, n);
        for i in 0..n {
            b.add(i, i, 2.0);
            if i > 0 {
                b.add(i, i - 1, -1.0);
            }
            if i + 1 < n {
                b.add(i, i + 1, -1.0);
            }
        }
        b.build()
    }

    /// On an SPD system the residual is monotone for omega in (0, 2).
    #[test]
    fn test_monotone_residual_spd() {
        for &omega in &[0.5, 1.0, 1.5] {
            let m = Arc::new(spd_5());
            let sor = SorPrecon::new(m.clone(), omega, 1);
            let b = DenseVector::from_vec(vec![1.0, 2.0, 0.0, -1.0, 1.0]);
            let mut x = DenseVector::new(5);
            let mut d = DenseVector::new(5);

            m.apply_defect(&mut d, &b, &x).unwrap();
            let mut prev = d.norm2();
            for _ in 0..10 {
                sor.sweep(&mut x, &b).unwrap();
                m.apply_defect(&mut d, &b, &x).unwrap();
                let cur = d.norm2();
                assert!(
                    cur <= prev + 1e-13,
                    "residual grew from {prev} to {cur} at omega {omega}"
                );
                prev = cur;
            }
        }
    }
}
