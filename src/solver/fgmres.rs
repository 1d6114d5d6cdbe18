//! Flexible GMRES with restarts

use std::sync::Arc;

use nalgebra::ComplexField;

use crate::scalar::DataType;
use crate::containers::{LinOp, VectorOps};
use crate::error::FemResult;
use crate::filter::Filter;
use crate::solver::{apply_precon, IterParams, Solver, SolverBox, SolverStatus};

/// Flexible restarted GMRES.
///
/// The preconditioner may change between iterations (it is a solver
/// handle, possibly an inner iteration), hence the flexible variant that
/// stores the preconditioned basis alongside the Krylov basis.
pub struct FGmres<V: VectorOps> {
    matrix: Arc<dyn LinOp<V>>,
    filter: Arc<dyn Filter<V>>,
    precon: Option<SolverBox<V>>,
    krylov_dim: usize,
    pub params: IterParams<V::Scalar>,
}

impl<V: VectorOps> FGmres<V> {
    pub fn new(
        matrix: Arc<dyn LinOp<V>>,
        filter: Arc<dyn Filter<V>>,
        precon: Option<SolverBox<V>>,
        krylov_dim: usize,
    ) -> Self {
        Self {
            matrix,
            filter,
            precon,
            krylov_dim: krylov_dim.max(1),
            params: IterParams::default(),
        }
    }
}

impl<V: VectorOps + Send + Sync> Solver<V> for FGmres<V> {
    fn name(&self) -> &str {
        "FGMRES"
    }

    fn init(&mut self) -> FemResult<()> {
        if let Some(p) = &mut self.precon {
            p.init()?;
        }
        Ok(())
    }

    fn apply(&mut self, x: &mut V, b: &V) -> FemResult<SolverStatus> {
        let m = self.krylov_dim;
        let zero = V::Scalar::of(0.0);

        let mut r = x.clone_layout();
        self.matrix.apply_defect(&mut r, b, x)?;
        self.filter.filter_def(&mut r)?;
        let norm0 = r.norm2();
        self.params.plot_iter(self.name(), 0, norm0);
        if self.params.converged(norm0, norm0) {
            return Ok(SolverStatus::Success);
        }

        let mut total_iter = 0usize;
        loop {
            let beta = r.norm2();
            if self.params.converged(norm0, beta) {
                return Ok(SolverStatus::Success);
            }

            // Arnoldi with the preconditioned basis kept for the update.
            let mut basis: Vec<V> = Vec::with_capacity(m + 1);
            let mut precond: Vec<V> = Vec::with_capacity(m);
            let mut hess: Vec<Vec<V::Scalar>> = Vec::with_capacity(m);
            let mut cos: Vec<V::Scalar> = Vec::with_capacity(m);
            let mut sin: Vec<V::Scalar> = Vec::with_capacity(m);
            let mut g = vec![zero; m + 1];
            g[0] = beta;

            let mut v0 = r.clone_layout();
            v0.scale(&r, V::Scalar::of(1.0) / beta)?;
            basis.push(v0);

            let mut converged_at: Option<usize> = None;
            for j in 0..m {
                let mut z = x.clone_layout();
                apply_precon(&mut self.precon, self.filter.as_ref(), &mut z, &basis[j])?;
                let mut w = x.clone_layout();
                self.matrix.apply(&mut w, &z)?;
                self.filter.filter_def(&mut w)?;
                precond.push(z);

                let mut col = vec![zero; j + 2];
                for (i, vi) in basis.iter().enumerate() {
                    let h = w.dot(vi)?;
                    col[i] = h;
                    let old = w.clone();
                    w.axpy(vi, &old, -h)?;
                }
                let h_next = w.norm2();
                col[j + 1] = h_next;

                // Previous Givens rotations on the new column.
                for i in 0..j {
                    let t = cos[i] * col[i] + sin[i] * col[i + 1];
                    col[i + 1] = -sin[i] * col[i] + cos[i] * col[i + 1];
                    col[i] = t;
                }
                // New rotation annihilating the sub-diagonal entry.
                let denom = (col[j] * col[j] + col[j + 1] * col[j + 1]).sqrt();
                let (c, s) = if denom == zero {
                    (V::Scalar::of(1.0), zero)
                } else {
                    (col[j] / denom, col[j + 1] / denom)
                };
                cos.push(c);
                sin.push(s);
                col[j] = c * col[j] + s * col[j + 1];
                col[j + 1] = zero;
                let gj = g[j];
                g[j] = c * gj;
                g[j + 1] = -s * gj;
                hess.push(col);

                total_iter += 1;
                let res = g[j + 1].abs();
                self.params.plot_iter(self.name(), total_iter, res);
                if self.params.converged(norm0, res) || h_next == zero {
                    converged_at = Some(j + 1);
                    break;
                }

                let mut vnext = w.clone_layout();
                vnext.scale(&w, V::Scalar::of(1.0) / h_next)?;
                basis.push(vnext);
            }

            // Back substitution on the triangularised Hessenberg system.
            let k = converged_at.unwrap_or(m);
            let mut y = vec![zero; k];
            for i in (0..k).rev() {
                let mut sum = g[i];
                for j in (i + 1)..k {
                    sum -= hess[j][i] * y[j];
                }
                y[i] = sum / hess[i][i];
            }
            for (j, yj) in y.iter().enumerate() {
                let old = x.clone();
                x.axpy(&precond[j], &old, *yj)?;
            }

            self.matrix.apply_defect(&mut r, b, x)?;
            self.filter.filter_def(&mut r)?;
            let norm = r.norm2();
            if let Some(status) = self.params.check(total_iter, norm0, norm) {
                return Ok(status);
            }
            if total_iter >= self.params.max_iter {
                return Ok(SolverStatus::MaxIter);
            }
        }
    }

    fn done(&mut self) {
        if let Some(p) = &mut self.precon {
            p.done();
        }
    }
}
