//! Preconditioned conjugate gradients

use std::sync::Arc;

use crate::scalar::DataType;
use crate::containers::{LinOp, VectorOps};
use crate::error::FemResult;
use crate::filter::Filter;
use crate::solver::{apply_precon, IterParams, Solver, SolverBox, SolverStatus};

/// Standard preconditioned CG for symmetric positive definite systems.
///
/// Breaks with `Aborted` on a non-positive `p^T A p`.
pub struct Pcg<V: VectorOps> {
    matrix: Arc<dyn LinOp<V>>,
    filter: Arc<dyn Filter<V>>,
    precon: Option<SolverBox<V>>,
    pub params: IterParams<V::Scalar>,
}

impl<V: VectorOps> Pcg<V> {
    pub fn new(
        matrix: Arc<dyn LinOp<V>>,
        filter: Arc<dyn Filter<V>>,
        precon: Option<SolverBox<V>>,
    ) -> Self {
        Self {
            matrix,
            filter,
            precon,
            params: IterParams::default(),
        }
    }
}

impl<V: VectorOps + Send + Sync> Solver<V> for Pcg<V> {
    fn name(&self) -> &str {
        "PCG"
    }

    fn init(&mut self) -> FemResult<()> {
        if let Some(p) = &mut self.precon {
            p.init()?;
        }
        Ok(())
    }

    fn apply(&mut self, x: &mut V, b: &V) -> FemResult<SolverStatus> {
        let mut r = x.clone_layout();
        let mut z = x.clone_layout();
        let mut q = x.clone_layout();

        self.matrix.apply_defect(&mut r, b, x)?;
        self.filter.filter_def(&mut r)?;
        let norm0 = r.norm2();
        self.params.plot_iter(self.name(), 0, norm0);
        if self.params.converged(norm0, norm0) {
            return Ok(SolverStatus::Success);
        }

        apply_precon(&mut self.precon, self.filter.as_ref(), &mut z, &r)?;
        let mut p = z.clone();
        let mut rho = r.dot(&z)?;

        for iter in 1..=self.params.max_iter {
            self.matrix.apply(&mut q, &p)?;
            self.filter.filter_def(&mut q)?;

            let pq = p.dot(&q)?;
            if pq <= V::Scalar::of(0.0) {
                return Ok(SolverStatus::Aborted);
            }
            let alpha = rho / pq;

            let old_x = x.clone();
            x.axpy(&p, &old_x, alpha)?;
            let old_r = r.clone();
            r.axpy(&q, &old_r, -alpha)?;

            let norm = r.norm2();
            self.params.plot_iter(self.name(), iter, norm);
            if let Some(status) = self.params.check(iter, norm0, norm) {
                return Ok(status);
            }

            apply_precon(&mut self.precon, self.filter.as_ref(), &mut z, &r)?;
            let rho_new = r.dot(&z)?;
            let beta = rho_new / rho;
            rho = rho_new;

            let old_p = p.clone();
            p.axpy(&old_p, &z, beta)?;
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

    fn spd_5() -> SparseMatrixCsr<f64, u64> {
        // 1-D Laplace stencil, SPD.
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

    #[test]
    fn test_pcg_converges() {
        let m = Arc::new(spd_5());
        let mut solver = Pcg::new(m.clone(), Arc::new(NoneFilter), None);
        solver.params.set_tol_rel(1e-14).set_max_iter(50);

        let rhs = DenseVector::constant(5, 1.0);
        let mut x = DenseVector::new(5);
        let status = solver.apply(&mut x, &rhs).unwrap();
        assert_eq!(status, SolverStatus::Success);

        use crate::containers::LinOp;
        let mut check = DenseVector::new(5);
        m.apply(&mut check, &x).unwrap();
        for i in 0..5 {
            assert_relative_eq!(check.at(i), 1.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_pcg_with_jacobi() {
        let m = Arc::new(spd_5());
        let precon: SolverBox<DenseVector<f64>> =
            Box::new(crate::solver::JacobiPrecon::new(m.clone(), 1.0));
        let mut solver = Pcg::new(m, Arc::new(NoneFilter), Some(precon));
        solver.params.set_tol_rel(1e-12);

        let rhs = DenseVector::from_vec(vec![1.0, 0.0, 2.0, 0.0, 1.0]);
        let mut x = DenseVector::new(5);
        let status = solver.apply(&mut x, &rhs).unwrap();
        assert_eq!(status, SolverStatus::Success);
    }
}
