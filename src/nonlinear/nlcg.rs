//! Nonlinear conjugate gradients

use std::sync::Arc;

use nalgebra::RealField;

use crate::scalar::DataType;
use crate::containers::VectorOps;
use crate::error::{FemError, FemResult};
use crate::filter::Filter;
use crate::nonlinear::{Linesearch, LinesearchStatus, NonlinearFunctional};
use crate::solver::{IterParams, Solver, SolverBox, SolverStatus};

/// Search-direction update formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionUpdate {
    FletcherReeves,
    PolakRibiere,
    HestenesStiefel,
    DaiYuan,
    /// Polak-Ribiere bounded into `[0, beta_DY]`.
    DyHsHybrid,
}

impl std::str::FromStr for DirectionUpdate {
    type Err = FemError;

    fn from_str(s: &str) -> FemResult<Self> {
        match s {
            "FR" => Ok(DirectionUpdate::FletcherReeves),
            "PR" => Ok(DirectionUpdate::PolakRibiere),
            "HS" => Ok(DirectionUpdate::HestenesStiefel),
            "DY" => Ok(DirectionUpdate::DaiYuan),
            "DYHSHybrid" => Ok(DirectionUpdate::DyHsHybrid),
            other => Err(FemError::InvalidArgument(format!(
                "unknown direction update '{other}'"
            ))),
        }
    }
}

/// Preconditioned nonlinear CG minimising a [`NonlinearFunctional`].
///
/// The state machine walks line search, direction update and convergence
/// check; a failed descent test or the periodic restart falls back to
/// steepest descent.
pub struct Nlcg<V, F>
where
    V: VectorOps,
    F: NonlinearFunctional<V>,
{
    functional: F,
    filter: Arc<dyn Filter<V>>,
    linesearch: Linesearch<V::Scalar>,
    direction: DirectionUpdate,
    precon: Option<SolverBox<V>>,
    /// Restart period; 0 restarts only on failed descent.
    pub restart_every: usize,
    pub params: IterParams<V::Scalar>,
    /// Functional value at the last accepted iterate.
    last_value: Option<V::Scalar>,
}

impl<V, F> Nlcg<V, F>
where
    V: VectorOps,
    F: NonlinearFunctional<V>,
{
    pub fn new(
        functional: F,
        filter: Arc<dyn Filter<V>>,
        linesearch: Linesearch<V::Scalar>,
        direction: DirectionUpdate,
        precon: Option<SolverBox<V>>,
    ) -> Self {
        Self {
            functional,
            filter,
            linesearch,
            direction,
            precon,
            restart_every: 0,
            params: IterParams::default(),
            last_value: None,
        }
    }

    pub fn functional(&self) -> &F {
        &self.functional
    }

    pub fn functional_mut(&mut self) -> &mut F {
        &mut self.functional
    }

    pub fn into_functional(self) -> F {
        self.functional
    }

    pub fn last_value(&self) -> Option<V::Scalar> {
        self.last_value
    }

    fn precondition(&mut self, z: &mut V, grad: &V) -> FemResult<()> {
        match &mut self.precon {
            Some(p) => {
                z.format(V::Scalar::of(0.0));
                p.apply(z, grad)?;
            }
            None => z.copy_from(grad)?,
        }
        self.filter.filter_cor(z)?;
        Ok(())
    }

    /// Minimises the functional starting from `x`, which carries the
    /// initial iterate in and the optimised one out.
    pub fn optimise(&mut self, x: &mut V) -> FemResult<SolverStatus> {
        let zero = V::Scalar::of(0.0);
        let one = V::Scalar::of(1.0);

        self.functional.prepare(x)?;
        let mut f = self.functional.value(x)?;
        let mut grad = x.clone_layout();
        self.functional.gradient(&mut grad, x)?;
        self.filter.filter_def(&mut grad)?;

        let norm0 = grad.norm2();
        self.params.plot_iter("NLCG", 0, norm0);
        self.last_value = Some(f);
        if self.params.converged(norm0, norm0) {
            return Ok(SolverStatus::Success);
        }

        let mut z = x.clone_layout();
        self.precondition(&mut z, &grad)?;
        let mut dir = x.clone_layout();
        dir.scale(&z, -one)?;
        let mut gz = grad.dot(&z)?;

        let mut grad_prev = grad.clone();
        let mut z_prev = z.clone();

        for iter in 1..=self.params.max_iter {
            // Descent test; steepest descent on failure.
            let mut slope = grad.dot(&dir)?;
            if slope >= zero {
                dir.scale(&z, -one)?;
                slope = -gz;
                if slope >= zero {
                    return Ok(SolverStatus::Stagnated);
                }
            }

            let x0 = x.clone();
            let result = self.linesearch.search(
                &mut self.functional,
                self.filter.as_ref(),
                x,
                &mut grad,
                &x0,
                &dir,
                f,
                slope,
            )?;
            if result.status == LinesearchStatus::IntervalTooSmall && result.value >= f {
                return Ok(SolverStatus::Stagnated);
            }
            f = result.value;
            self.last_value = Some(f);

            let norm = grad.norm2();
            self.params.plot_iter("NLCG", iter, norm);
            if let Some(status) = self.params.check(iter, norm0, norm) {
                return Ok(status);
            }

            self.precondition(&mut z, &grad)?;
            let gz_new = grad.dot(&z)?;

            let restart = self.restart_every > 0 && iter % self.restart_every == 0;
            let beta = if restart {
                zero
            } else {
                self.compute_beta(&grad, &grad_prev, &z, &z_prev, &dir, gz, gz_new)?
            };

            // dir = -z + beta*dir
            let mut minus_z = z.clone_layout();
            minus_z.scale(&z, -one)?;
            let old_dir = dir.clone();
            dir.axpy(&old_dir, &minus_z, beta)?;

            grad_prev.copy_from(&grad)?;
            z_prev.copy_from(&z)?;
            gz = gz_new;
        }
        Ok(SolverStatus::MaxIter)
    }

    #[allow(clippy::too_many_arguments)]
    fn compute_beta(
        &self,
        grad: &V,
        grad_prev: &V,
        z: &V,
        z_prev: &V,
        dir: &V,
        gz_prev: V::Scalar,
        gz: V::Scalar,
    ) -> FemResult<V::Scalar> {
        let zero = V::Scalar::of(0.0);

        // y = g_new - g_old appears in the HS/DY denominators.
        let mut y = grad.clone_layout();
        y.axpy(grad_prev, grad, -V::Scalar::of(1.0))?;
        let dy = dir.dot(&y)?;

        // z_diff = z_new - z_old for the PR/HS numerators.
        let mut z_diff = z.clone_layout();
        z_diff.axpy(z_prev, z, -V::Scalar::of(1.0))?;
        let g_zdiff = grad.dot(&z_diff)?;

        let beta = match self.direction {
            DirectionUpdate::FletcherReeves => {
                if gz_prev == zero {
                    zero
                } else {
                    gz / gz_prev
                }
            }
            DirectionUpdate::PolakRibiere => {
                if gz_prev == zero {
                    zero
                } else {
                    g_zdiff / gz_prev
                }
            }
            DirectionUpdate::HestenesStiefel => {
                if dy == zero {
                    zero
                } else {
                    g_zdiff / dy
                }
            }
            DirectionUpdate::DaiYuan => {
                if dy == zero {
                    zero
                } else {
                    gz / dy
                }
            }
            DirectionUpdate::DyHsHybrid => {
                if gz_prev == zero || dy == zero {
                    zero
                } else {
                    let pr = g_zdiff / gz_prev;
                    let dy_beta = gz / dy;
                    pr.max(zero).min(dy_beta)
                }
            }
        };
        Ok(beta)
    }
}

/// NLCG also fits the uniform solver interface: the defect argument is
/// ignored and the correction vector carries the iterate.
impl<V, F> Solver<V> for Nlcg<V, F>
where
    V: VectorOps + Send + Sync,
    F: NonlinearFunctional<V> + Send,
{
    fn name(&self) -> &str {
        "NLCG"
    }

    fn init(&mut self) -> FemResult<()> {
        if let Some(p) = &mut self.precon {
            p.init()?;
        }
        Ok(())
    }

    fn apply(&mut self, cor: &mut V, _def: &V) -> FemResult<SolverStatus> {
        self.optimise(cor)
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
    use crate::containers::DenseVector;
    use crate::filter::NoneFilter;
    use crate::nonlinear::StrongWolfeLinesearch;
    use approx::assert_relative_eq;

    /// Rosenbrock-like convex quadratic with distinct curvatures.
    struct Quadratic;

    impl NonlinearFunctional<DenseVector<f64>> for Quadratic {
        fn prepare(&mut self, _x: &DenseVector<f64>) -> FemResult<()> {
            Ok(())
        }

        fn value(&mut self, x: &DenseVector<f64>) -> FemResult<f64> {
            let a = x.at(0) - 1.0;
            let b = x.at(1) + 2.0;
            Ok(2.0 * a * a + 0.5 * b * b)
        }

        fn gradient(&mut self, grad: &mut DenseVector<f64>, x: &DenseVector<f64>) -> FemResult<()> {
            grad.set(0, 4.0 * (x.at(0) - 1.0));
            grad.set(1, x.at(1) + 2.0);
            Ok(())
        }
    }

    #[test]
    fn test_nlcg_minimises_quadratic() {
        for update in [
            DirectionUpdate::FletcherReeves,
            DirectionUpdate::PolakRibiere,
            DirectionUpdate::HestenesStiefel,
            DirectionUpdate::DaiYuan,
            DirectionUpdate::DyHsHybrid,
        ] {
            let mut solver = Nlcg::new(
                Quadratic,
                Arc::new(NoneFilter),
                Linesearch::StrongWolfe(StrongWolfeLinesearch::default()),
                update,
                None,
            );
            solver.params.set_tol_rel(1e-10).set_max_iter(100);

            let mut x = DenseVector::new(2);
            let status = solver.optimise(&mut x).unwrap();
            assert_eq!(status, SolverStatus::Success, "update {update:?}");
            assert_relative_eq!(x.at(0), 1.0, epsilon = 1e-6);
            assert_relative_eq!(x.at(1), -2.0, epsilon = 1e-6);
        }
    }

    /// The functional value decreases monotonically until convergence.
    #[test]
    fn test_descent_property() {
        let mut solver = Nlcg::new(
            Quadratic,
            Arc::new(NoneFilter),
            Linesearch::StrongWolfe(StrongWolfeLinesearch::default()),
            DirectionUpdate::PolakRibiere,
            None,
        );
        solver.params.set_tol_rel(1e-8).set_max_iter(1);

        let mut x = DenseVector::new(2);
        let f0 = solver.functional_mut().value(&x).unwrap();
        let _ = solver.optimise(&mut x).unwrap();
        let f1 = solver.last_value().unwrap();
        assert!(f1 < f0);
    }
}
