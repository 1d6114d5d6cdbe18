//! Richardson iteration

use std::sync::Arc;

use crate::containers::{LinOp, VectorOps};
use crate::error::FemResult;
use crate::filter::Filter;
use crate::solver::{apply_precon, IterParams, Solver, SolverBox, SolverStatus};

/// Damped preconditioned Richardson iteration,
/// `x <- x + omega * M^-1 * (b - A*x)`.
///
/// Also the outer driver for Schwarz-type block smoothers in the
/// two-layer solver stacks.
pub struct Richardson<V: VectorOps> {
    matrix: Arc<dyn LinOp<V>>,
    filter: Arc<dyn Filter<V>>,
    precon: Option<SolverBox<V>>,
    omega: V::Scalar,
    pub params: IterParams<V::Scalar>,
}

impl<V: VectorOps> Richardson<V> {
    pub fn new(
        matrix: Arc<dyn LinOp<V>>,
        filter: Arc<dyn Filter<V>>,
        precon: Option<SolverBox<V>>,
        omega: V::Scalar,
    ) -> Self {
        Self {
            matrix,
            filter,
            precon,
            omega,
            params: IterParams::default(),
        }
    }
}

impl<V: VectorOps + Send + Sync> Solver<V> for Richardson<V> {
    fn name(&self) -> &str {
        "Richardson"
    }

    fn init(&mut self) -> FemResult<()> {
        if let Some(p) = &mut self.precon {
            p.init()?;
        }
        Ok(())
    }

    fn apply(&mut self, x: &mut V, b: &V) -> FemResult<SolverStatus> {
        let mut def = x.clone_layout();
        let mut cor = x.clone_layout();

        self.matrix.apply_defect(&mut def, b, x)?;
        self.filter.filter_def(&mut def)?;
        let norm0 = def.norm2();
        self.params.plot_iter(self.name(), 0, norm0);
        if let Some(status) = self.params.check(0, norm0, norm0) {
            if status != SolverStatus::MaxIter {
                return Ok(status);
            }
        }

        for iter in 1..=self.params.max_iter {
            apply_precon(&mut self.precon, self.filter.as_ref(), &mut cor, &def)?;
            let old = x.clone();
            x.axpy(&cor, &old, self.omega)?;

            self.matrix.apply_defect(&mut def, b, x)?;
            self.filter.filter_def(&mut def)?;
            let norm = def.norm2();
            self.params.plot_iter(self.name(), iter, norm);
            if let Some(status) = self.params.check(iter, norm0, norm) {
                return Ok(status);
            }
        }
        Ok(SolverStatus::MaxIter)
    }

    fn done(&mut self) {
        if let Some(p) = &mut self.precon {
            p.done();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{csr::CsrBuilder, DenseVector, SparseMatrixCsr};
    use crate::filter::NoneFilter;
    use approx::assert_relative_eq;

    #[test]
    fn test_converges_on_diagonally_dominant() {
        let mut b = CsrBuilder::new(2, 2);
        b.add(0, 0, 4.0);
        b.add(0, 1, 1.0);
        b.add(1, 0, 1.0);
        b.add(1, 1, 4.0);
        let m: Arc<SparseMatrixCsr<f64, u64>> = Arc::new(b.build());

        let mut solver = Richardson::new(m, Arc::new(NoneFilter), None, 0.2);
        solver.params.set_max_iter(200).set_tol_rel(1e-12);

        let rhs = DenseVector::from_vec(vec![5.0, 5.0]);
        let mut x = DenseVector::new(2);
        let status = solver.apply(&mut x, &rhs).unwrap();
        assert_eq!(status, SolverStatus::Success);
        assert_relative_eq!(x.at(0), 1.0, epsilon = 1e-10);
        assert_relative_eq!(x.at(1), 1.0, epsilon = 1e-10);
    }
}
