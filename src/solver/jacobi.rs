//! Jacobi preconditioner

use std::sync::Arc;

use crate::containers::{DenseVector, SparseMatrixCsr, VectorOps};
use crate::error::FemResult;
use crate::scalar::{DataType, IndexType};
use crate::solver::{Solver, SolverStatus};

/// Damped diagonal preconditioner, `cor = omega * D^-1 * def`.
pub struct JacobiPrecon<DT: DataType = f64, IT: IndexType = u64> {
    matrix: Arc<SparseMatrixCsr<DT, IT>>,
    omega: DT,
    inv_diag: DenseVector<DT>,
}

impl<DT: DataType, IT: IndexType> JacobiPrecon<DT, IT> {
    pub fn new(matrix: Arc<SparseMatrixCsr<DT, IT>>, omega: DT) -> Self {
        let inv_diag = Self::invert_diag(&matrix);
        Self {
            matrix,
            omega,
            inv_diag,
        }
    }

    fn invert_diag(matrix: &SparseMatrixCsr<DT, IT>) -> DenseVector<DT> {
        let diag = matrix.extract_diag();
        let mut inv = diag.clone_layout();
        // Zero diagonals fall back to the identity.
        for (r, &d) in inv.elements_mut().iter_mut().zip(diag.elements()) {
            *r = if d == DT::zero() {
                DT::of(1.0)
            } else {
                DT::of(1.0) / d
            };
        }
        inv
    }
}

impl<DT: DataType, IT: IndexType> Solver<DenseVector<DT>> for JacobiPrecon<DT, IT> {
    fn name(&self) -> &str {
        "Jacobi"
    }

    fn init(&mut self) -> FemResult<()> {
        self.inv_diag = Self::invert_diag(&self.matrix);
        Ok(())
    }

    fn apply(&mut self, cor: &mut DenseVector<DT>, def: &DenseVector<DT>) -> FemResult<SolverStatus> {
        cor.component_product(&self.inv_diag, def)?;
        if self.omega != DT::of(1.0) {
            let tmp = cor.clone();
            cor.scale(&tmp, self.omega)?;
        }
        Ok(SolverStatus::Success)
    }
}
