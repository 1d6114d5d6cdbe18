//! Incomplete LU factorisation preconditioner

use std::sync::Arc;

use crate::containers::{CloneMode, DenseVector, SparseMatrixCsr, VectorOps};
use crate::error::{FemError, FemResult};
use crate::scalar::{DataType, IndexType};
use crate::solver::{Solver, SolverStatus};

/// ILU(0): incomplete LU on the unmodified sparsity pattern.
///
/// The factors overwrite a weak clone of the matrix values, so the
/// original operator stays untouched.
pub struct IluPrecon<DT: DataType = f64, IT: IndexType = u64> {
    matrix: Arc<SparseMatrixCsr<DT, IT>>,
    factors: Option<SparseMatrixCsr<DT, IT>>,
}

impl<DT: DataType, IT: IndexType> IluPrecon<DT, IT> {
    pub fn new(matrix: Arc<SparseMatrixCsr<DT, IT>>) -> Self {
        Self {
            matrix,
            factors: None,
        }
    }

    fn factorise(&self) -> FemResult<SparseMatrixCsr<DT, IT>> {
        let mut lu = self.matrix.clone_mode(CloneMode::Weak);
        let n = lu.rows();
        let row_ptr: Vec<usize> = lu.row_ptr().iter().map(|p| p.as_usize()).collect();
        let col_idx: Vec<usize> = lu.col_idx().iter().map(|c| c.as_usize()).collect();
        let val = lu.values_mut();

        for i in 0..n {
            let (ra, rb) = (row_ptr[i], row_ptr[i + 1]);
            for p in ra..rb {
                let k = col_idx[p];
                if k >= i {
                    break;
                }
                // Diagonal of the pivot row.
                let (ka, kb) = (row_ptr[k], row_ptr[k + 1]);
                let kd = col_idx[ka..kb]
                    .binary_search(&k)
                    .map_err(|_| FemError::InvalidArgument(format!("row {k} has no diagonal")))?;
                let pivot = val[ka + kd];
                if pivot == DT::zero() {
                    return Err(FemError::Internal(format!(
                        "zero pivot in ILU factorisation at row {k}"
                    )));
                }
                let lik = val[p] / pivot;
                val[p] = lik;
                // Eliminate within the existing pattern only.
                for q in (p + 1)..rb {
                    let j = col_idx[q];
                    if let Ok(kj) = col_idx[ka..kb].binary_search(&j) {
                        if j > k {
                            let ukj = val[ka + kj];
                            val[q] -= lik * ukj;
                        }
                    }
                }
            }
        }
        Ok(lu)
    }
}

impl<DT: DataType, IT: IndexType> Solver<DenseVector<DT>> for IluPrecon<DT, IT> {
    fn name(&self) -> &str {
        "ILU"
    }

    fn init(&mut self) -> FemResult<()> {
        self.factors = Some(self.factorise()?);
        Ok(())
    }

    fn apply(&mut self, cor: &mut DenseVector<DT>, def: &DenseVector<DT>) -> FemResult<SolverStatus> {
        if self.factors.is_none() {
            self.init()?;
        }
        let lu = self.factors.as_ref().expect("factors present after init");
        crate::error::check_sizes(lu.rows(), cor.size())?;
        crate::error::check_sizes(lu.rows(), def.size())?;

        let n = lu.rows();
        let row_ptr = lu.row_ptr();
        let col_idx = lu.col_idx();
        let val = lu.values();

        cor.copy_from(def)?;
        let xs = cor.elements_mut();

        // Forward solve with unit lower factor.
        for i in 0..n {
            let (ra, rb) = (row_ptr[i].as_usize(), row_ptr[i + 1].as_usize());
            let mut sum = xs[i];
            for p in ra..rb {
                let j = col_idx[p].as_usize();
                if j >= i {
                    break;
                }
                sum -= val[p] * xs[j];
            }
            xs[i] = sum;
        }
        // Backward solve with upper factor.
        for i in (0..n).rev() {
            let (ra, rb) = (row_ptr[i].as_usize(), row_ptr[i + 1].as_usize());
            let mut sum = xs[i];
            let mut diag = DT::zero();
            for p in ra..rb {
                let j = col_idx[p].as_usize();
                if j == i {
                    diag = val[p];
                } else if j > i {
                    sum -= val[p] * xs[j];
                }
            }
            xs[i] = sum / diag;
        }
        Ok(SolverStatus::Success)
    }

    fn done(&mut self) {
        self.factors = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::csr::CsrBuilder;
    use approx::assert_relative_eq;

    /// On a tridiagonal matrix ILU(0) is the exact LU factorisation, so
    /// one application solves the system.
    #[test]
    fn test_exact_on_tridiagonal() {
        let n = 6;
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
        let m: Arc<SparseMatrixCsr<f64, u64>> = Arc::new(b.build());
        let mut ilu = IluPrecon::new(m.clone());
        ilu.init().unwrap();

        let rhs = DenseVector::constant(n, 1.0);
        let mut x = DenseVector::new(n);
        ilu.apply(&mut x, &rhs).unwrap();

        use crate::containers::LinOp;
        let mut check = DenseVector::new(n);
        m.apply(&mut check, &x).unwrap();
        for i in 0..n {
            assert_relative_eq!(check.at(i), 1.0, epsilon = 1e-12);
        }
    }
}
