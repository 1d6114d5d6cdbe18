//! BiCGStab solver

use std::sync::Arc;

use crate::scalar::DataType;
use crate::containers::{LinOp, VectorOps};
use crate::error::FemResult;
use crate::filter::Filter;
use crate::solver::{apply_precon, IterParams, Solver, SolverBox, SolverStatus};

/// Stabilised bi-conjugate gradients for nonsymmetric systems, in the
/// standard right-preconditioned formulation.
pub struct BiCgStab<V: VectorOps> {
    matrix: Arc<dyn LinOp<V>>,
    filter: Arc<dyn Filter<V>>,
    precon: Option<SolverBox<V>>,
    pub params: IterParams<V::Scalar>,
}

impl<V: VectorOps> BiCgStab<V> {
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

impl<V: VectorOps + Send + Sync> Solver<V> for BiCgStab<V> {
    fn name(&self) -> &str {
        "BiCGStab"
    }

    fn init(&mut self) -> FemResult<()> {
        if let Some(p) = &mut self.precon {
            p.init()?;
        }
        Ok(())
    }

    fn apply(&mut self, x: &mut V, b: &V) -> FemResult<SolverStatus> {
        let mut r = x.clone_layout();
        self.matrix.apply_defect(&mut r, b, x)?;
        self.filter.filter_def(&mut r)?;
        let norm0 = r.norm2();
        self.params.plot_iter(self.name(), 0, norm0);
        if self.params.converged(norm0, norm0) {
            return Ok(SolverStatus::Success);
        }

        let r_tilde = r.clone();
        let mut p = r.clone();
        let mut v = x.clone_layout();
        let mut s = x.clone_layout();
        let mut t = x.clone_layout();
        let mut p_hat = x.clone_layout();
        let mut s_hat = x.clone_layout();

        let mut rho = r_tilde.dot(&r)?;

        for iter in 1..=self.params.max_iter {
            apply_precon(&mut self.precon, self.filter.as_ref(), &mut p_hat, &p)?;
            self.matrix.apply(&mut v, &p_hat)?;
            self.filter.filter_def(&mut v)?;

            let rtv = r_tilde.dot(&v)?;
            if rtv == V::Scalar::of(0.0) {
                return Ok(SolverStatus::Aborted);
            }
            let alpha = rho / rtv;

            s.axpy(&v, &r, -alpha)?;
            let norm_s = s.norm2();
            if self.params.converged(norm0, norm_s) {
                let old = x.clone();
                x.axpy(&p_hat, &old, alpha)?;
                self.params.plot_iter(self.name(), iter, norm_s);
                return Ok(SolverStatus::Success);
            }

            apply_precon(&mut self.precon, self.filter.as_ref(), &mut s_hat, &s)?;
            self.matrix.apply(&mut t, &s_hat)?;
            self.filter.filter_def(&mut t)?;

            let tt = t.dot(&t)?;
            if tt == V::Scalar::of(0.0) {
                return Ok(SolverStatus::Aborted);
            }
            let omega = t.dot(&s)? / tt;

            let old = x.clone();
            x.axpy(&p_hat, &old, alpha)?;
            let old = x.clone();
            x.axpy(&s_hat, &old, omega)?;

            r.axpy(&t, &s, -omega)?;
            let norm = r.norm2();
            self.params.plot_iter(self.name(), iter, norm);
            if let Some(status) = self.params.check(iter, norm0, norm) {
                return Ok(status);
            }

            let rho_new = r_tilde.dot(&r)?;
            if rho_new == V::Scalar::of(0.0) || omega == V::Scalar::of(0.0) {
                return Ok(SolverStatus::Aborted);
            }
            let beta = (rho_new / rho) * (alpha / omega);
            rho = rho_new;

            // p = r + beta * (p - omega * v)
            let mut pv = p.clone_layout();
            pv.axpy(&v, &p, -omega)?;
            p.axpy(&pv, &r, beta)?;
        }
        Ok(SolverStatus::MaxIter)
    }

    fn done(&mut self) {
        if let Some(p) = &mut self.precon {
            p.done();
        }
    }
}
