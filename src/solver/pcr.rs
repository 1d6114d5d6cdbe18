//! Preconditioned conjugate residuals

use std::sync::Arc;

use crate::scalar::DataType;
use crate::containers::{LinOp, VectorOps};
use crate::error::FemResult;
use crate::filter::Filter;
use crate::solver::{apply_precon, IterParams, Solver, SolverBox, SolverStatus};

/// Conjugate residual iteration for symmetric (possibly indefinite)
/// systems, with left preconditioning.
pub struct Pcr<V: VectorOps> {
    matrix: Arc<dyn LinOp<V>>,
    filter: Arc<dyn Filter<V>>,
    precon: Option<SolverBox<V>>,
    pub params: IterParams<V::Scalar>,
}

impl<V: VectorOps> Pcr<V> {
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

impl<V: VectorOps + Send + Sync> Solver<V> for Pcr<V> {
    fn name(&self) -> &str {
        "PCR"
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

        // z = M^-1 r, p = z, and the two operator images.
        let mut z = x.clone_layout();
        apply_precon(&mut self.precon, self.filter.as_ref(), &mut z, &r)?;
        let mut p = z.clone();
        let mut az = x.clone_layout();
        self.matrix.apply(&mut az, &z)?;
        self.filter.filter_def(&mut az)?;
        let mut ap = az.clone();
        let mut zaz = z.dot(&az)?;

        for iter in 1..=self.params.max_iter {
            let mut map = x.clone_layout();
            apply_precon(&mut self.precon, self.filter.as_ref(), &mut map, &ap)?;
            let denom = ap.dot(&map)?;
            if denom == V::Scalar::of(0.0) {
                return Ok(SolverStatus::Aborted);
            }
            let alpha = zaz / denom;

            let old = x.clone();
            x.axpy(&p, &old, alpha)?;
            let old = r.clone();
            r.axpy(&ap, &old, -alpha)?;
            let old = z.clone();
            z.axpy(&map, &old, -alpha)?;

            let norm = r.norm2();
            self.params.plot_iter(self.name(), iter, norm);
            if let Some(status) = self.params.check(iter, norm0, norm) {
                return Ok(status);
            }

            self.matrix.apply(&mut az, &z)?;
            self.filter.filter_def(&mut az)?;
            let zaz_new = z.dot(&az)?;
            if zaz == V::Scalar::of(0.0) {
                return Ok(SolverStatus::Aborted);
            }
            let beta = zaz_new / zaz;
            zaz = zaz_new;

            let old_p = p.clone();
            p.axpy(&old_p, &z, beta)?;
            let old_ap = ap.clone();
            ap.axpy(&old_ap, &az, beta)?;
        }
        Ok(SolverStatus::MaxIter)
    }

    fn done(&mut self) {
        if let Some(p) = &mut self.precon {
            p.done();
        }
    }
}
