//! Line searches for the nonlinear solvers
//!
//! Both searches look for a step satisfying the strong Wolfe conditions
//! `phi(a) <= phi(0) + c1*a*phi'(0)` and `|phi'(a)| <= c2*|phi'(0)|`.

use serde::{Deserialize, Serialize};

use crate::containers::VectorOps;
use crate::error::FemResult;
use crate::filter::Filter;
use crate::nonlinear::NonlinearFunctional;
use crate::scalar::DataType;

/// Outcome of a line search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinesearchStatus {
    Success,
    MaxIter,
    IntervalTooSmall,
}

/// Shared line-search parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinesearchParams<DT: DataType> {
    /// Sufficient-decrease constant `c1`.
    pub tol_decrease: DT,
    /// Curvature constant `c2`.
    pub tol_curvature: DT,
    pub max_iter: usize,
    pub plot: bool,
}

impl<DT: DataType> Default for LinesearchParams<DT> {
    fn default() -> Self {
        Self {
            tol_decrease: DT::of(1e-3),
            tol_curvature: DT::of(0.3),
            max_iter: 20,
            plot: false,
        }
    }
}

/// Result carried back to the driver: accepted step and new value.
pub struct LinesearchResult<DT> {
    pub alpha: DT,
    pub value: DT,
    pub status: LinesearchStatus,
}

/// Evaluates `phi(alpha)` and `phi'(alpha)` along `x0 + alpha*dir`,
/// leaving iterate and gradient at the trial point.
fn eval_phi<V, F>(
    func: &mut F,
    filter: &dyn Filter<V>,
    x: &mut V,
    grad: &mut V,
    x0: &V,
    dir: &V,
    alpha: V::Scalar,
) -> FemResult<(V::Scalar, V::Scalar)>
where
    V: VectorOps,
    F: NonlinearFunctional<V>,
{
    x.axpy(dir, x0, alpha)?;
    func.prepare(x)?;
    let f = func.value(x)?;
    func.gradient(grad, x)?;
    filter.filter_def(grad)?;
    let slope = grad.dot(dir)?;
    Ok((f, slope))
}

/// Strong-Wolfe line search with bracketing and zoom phases.
#[derive(Debug, Clone, Default)]
pub struct StrongWolfeLinesearch<DT: DataType> {
    pub params: LinesearchParams<DT>,
}

impl<DT: DataType> StrongWolfeLinesearch<DT> {
    pub fn new(params: LinesearchParams<DT>) -> Self {
        Self { params }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn search<V, F>(
        &self,
        func: &mut F,
        filter: &dyn Filter<V>,
        x: &mut V,
        grad: &mut V,
        x0: &V,
        dir: &V,
        f0: DT,
        slope0: DT,
    ) -> FemResult<LinesearchResult<DT>>
    where
        V: VectorOps<Scalar = DT>,
        F: NonlinearFunctional<V>,
    {
        let c1 = self.params.tol_decrease;
        let c2 = self.params.tol_curvature;
        let two = DT::of(2.0);

        let mut alpha_lo = DT::zero();
        let mut f_lo = f0;
        let mut slope_lo = slope0;
        let mut alpha = DT::of(1.0);
        let mut f_prev = f0;

        for iter in 0..self.params.max_iter {
            let (f, slope) = eval_phi(func, filter, x, grad, x0, dir, alpha)?;
            if self.params.plot {
                log::debug!("StrongWolfe: trial {:.3e} -> {:.6e}", alpha.to_f64(), f.to_f64());
            }

            let armijo_failed = f > f0 + c1 * alpha * slope0 || (iter > 0 && f >= f_prev);
            if armijo_failed {
                return self.zoom(
                    func, filter, x, grad, x0, dir, f0, slope0, alpha_lo, f_lo, slope_lo, alpha, f,
                );
            }
            if slope.abs() <= c2 * slope0.abs() {
                return Ok(LinesearchResult {
                    alpha,
                    value: f,
                    status: LinesearchStatus::Success,
                });
            }
            if slope >= DT::zero() {
                return self.zoom(
                    func, filter, x, grad, x0, dir, f0, slope0, alpha, f, slope, alpha_lo, f_lo,
                );
            }
            alpha_lo = alpha;
            f_lo = f;
            slope_lo = slope;
            f_prev = f;
            alpha *= two;
        }
        // Iteration bound hit: settle on the best sufficient-decrease step.
        let (f, _) = eval_phi(func, filter, x, grad, x0, dir, alpha_lo)?;
        Ok(LinesearchResult {
            alpha: alpha_lo,
            value: f,
            status: LinesearchStatus::MaxIter,
        })
    }

    /// Shrinks a bracket `[lo, hi]` known to contain a Wolfe point.
    #[allow(clippy::too_many_arguments)]
    fn zoom<V, F>(
        &self,
        func: &mut F,
        filter: &dyn Filter<V>,
        x: &mut V,
        grad: &mut V,
        x0: &V,
        dir: &V,
        f0: DT,
        slope0: DT,
        mut alpha_lo: DT,
        mut f_lo: DT,
        mut slope_lo: DT,
        mut alpha_hi: DT,
        mut f_hi: DT,
    ) -> FemResult<LinesearchResult<DT>>
    where
        V: VectorOps<Scalar = DT>,
        F: NonlinearFunctional<V>,
    {
        let c1 = self.params.tol_decrease;
        let c2 = self.params.tol_curvature;
        let interval_floor = DT::of(1e-14);

        for _ in 0..self.params.max_iter {
            if (alpha_hi - alpha_lo).abs() < interval_floor {
                // Leave the iterate at the best known point.
                let (f, _) = eval_phi(func, filter, x, grad, x0, dir, alpha_lo)?;
                return Ok(LinesearchResult {
                    alpha: alpha_lo,
                    value: f,
                    status: LinesearchStatus::IntervalTooSmall,
                });
            }
            // Quadratic interpolation with bisection safeguard.
            let mut alpha = interpolate_quadratic(alpha_lo, f_lo, slope_lo, alpha_hi, f_hi);
            let lo = alpha_lo.min(alpha_hi);
            let hi = alpha_lo.max(alpha_hi);
            let margin = DT::of(0.1) * (hi - lo);
            if !(alpha > lo + margin && alpha < hi - margin) {
                alpha = (alpha_lo + alpha_hi) / DT::of(2.0);
            }

            let (f, slope) = eval_phi(func, filter, x, grad, x0, dir, alpha)?;
            if f > f0 + c1 * alpha * slope0 || f >= f_lo {
                alpha_hi = alpha;
                f_hi = f;
            } else {
                if slope.abs() <= c2 * slope0.abs() {
                    return Ok(LinesearchResult {
                        alpha,
                        value: f,
                        status: LinesearchStatus::Success,
                    });
                }
                if slope * (alpha_hi - alpha_lo) >= DT::zero() {
                    alpha_hi = alpha_lo;
                    f_hi = f_lo;
                }
                alpha_lo = alpha;
                f_lo = f;
                slope_lo = slope;
            }
        }
        let (f, _) = eval_phi(func, filter, x, grad, x0, dir, alpha_lo)?;
        Ok(LinesearchResult {
            alpha: alpha_lo,
            value: f,
            status: LinesearchStatus::MaxIter,
        })
    }
}

/// Monotone quadratic-cubic interpolating line search with safeguarded
/// shrinkage.
#[derive(Debug, Clone, Default)]
pub struct MqcLinesearch<DT: DataType> {
    pub params: LinesearchParams<DT>,
}

impl<DT: DataType> MqcLinesearch<DT> {
    pub fn new(params: LinesearchParams<DT>) -> Self {
        Self { params }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn search<V, F>(
        &self,
        func: &mut F,
        filter: &dyn Filter<V>,
        x: &mut V,
        grad: &mut V,
        x0: &V,
        dir: &V,
        f0: DT,
        slope0: DT,
    ) -> FemResult<LinesearchResult<DT>>
    where
        V: VectorOps<Scalar = DT>,
        F: NonlinearFunctional<V>,
    {
        let c1 = self.params.tol_decrease;
        let c2 = self.params.tol_curvature;
        let shrink = DT::of(0.5);
        let interval_floor = DT::of(1e-14);

        let mut alpha = DT::of(1.0);
        let mut alpha_prev = DT::zero();
        let mut f_prev = f0;
        let mut best = (DT::zero(), f0);

        for _ in 0..self.params.max_iter {
            let (f, slope) = eval_phi(func, filter, x, grad, x0, dir, alpha)?;
            if f < best.1 {
                best = (alpha, f);
            }

            let armijo = f <= f0 + c1 * alpha * slope0;
            if armijo && slope.abs() <= c2 * slope0.abs() {
                return Ok(LinesearchResult {
                    alpha,
                    value: f,
                    status: LinesearchStatus::Success,
                });
            }

            let next = if !armijo {
                // Quadratic model through (0, f0, slope0) and (alpha, f),
                // with cubic refinement once a second trial exists.
                let quad = quadratic_min(f0, slope0, alpha, f);
                let cand = if alpha_prev > DT::zero() {
                    cubic_min(f0, slope0, alpha, f, alpha_prev, f_prev).unwrap_or(quad)
                } else {
                    quad
                };
                // Safeguarded shrinkage keeps the step strictly inside.
                let lo = shrink * shrink * alpha;
                let hi = shrink * alpha;
                cand.max(lo).min(hi)
            } else {
                // Decrease holds but curvature does not: widen.
                alpha * DT::of(2.0)
            };

            if (next - alpha).abs() < interval_floor || next < interval_floor {
                let (f, _) = eval_phi(func, filter, x, grad, x0, dir, best.0)?;
                return Ok(LinesearchResult {
                    alpha: best.0,
                    value: f,
                    status: LinesearchStatus::IntervalTooSmall,
                });
            }
            alpha_prev = alpha;
            f_prev = f;
            alpha = next;
        }

        let (f, _) = eval_phi(func, filter, x, grad, x0, dir, best.0)?;
        Ok(LinesearchResult {
            alpha: best.0,
            value: f,
            status: LinesearchStatus::MaxIter,
        })
    }
}

/// Minimiser of the quadratic through `(0,f0)` with slope `g0` and
/// `(a, fa)`.
fn quadratic_min<DT: DataType>(f0: DT, g0: DT, a: DT, fa: DT) -> DT {
    let denom = DT::of(2.0) * (fa - f0 - g0 * a);
    if denom == DT::zero() {
        a / DT::of(2.0)
    } else {
        -g0 * a * a / denom
    }
}

/// Minimiser of the cubic through `(0,f0)` with slope `g0` and two trial
/// points; `None` when the model degenerates.
fn cubic_min<DT: DataType>(f0: DT, g0: DT, a1: DT, f1: DT, a2: DT, f2: DT) -> Option<DT> {
    if a1 == a2 {
        return None;
    }
    let d1 = f1 - f0 - g0 * a1;
    let d2 = f2 - f0 - g0 * a2;
    let denom = a1 * a1 * a2 * a2 * (a1 - a2);
    if denom == DT::zero() {
        return None;
    }
    let c3 = (a2 * a2 * d1 - a1 * a1 * d2) / denom;
    let c2 = (-a2 * a2 * a2 * d1 + a1 * a1 * a1 * d2) / denom;
    if c3 == DT::zero() {
        return None;
    }
    let disc = c2 * c2 - DT::of(3.0) * c3 * g0;
    if disc < DT::zero() {
        return None;
    }
    Some((-c2 + disc.sqrt()) / (DT::of(3.0) * c3))
}

/// Quadratic step inside a zoom bracket.
fn interpolate_quadratic<DT: DataType>(a_lo: DT, f_lo: DT, g_lo: DT, a_hi: DT, f_hi: DT) -> DT {
    let h = a_hi - a_lo;
    let denom = DT::of(2.0) * (f_hi - f_lo - g_lo * h);
    if denom == DT::zero() {
        a_lo + h / DT::of(2.0)
    } else {
        a_lo - g_lo * h * h / denom
    }
}

/// The line search chosen by configuration.
pub enum Linesearch<DT: DataType> {
    StrongWolfe(StrongWolfeLinesearch<DT>),
    Mqc(MqcLinesearch<DT>),
}

impl<DT: DataType> Linesearch<DT> {
    #[allow(clippy::too_many_arguments)]
    pub fn search<V, F>(
        &self,
        func: &mut F,
        filter: &dyn Filter<V>,
        x: &mut V,
        grad: &mut V,
        x0: &V,
        dir: &V,
        f0: DT,
        slope0: DT,
    ) -> FemResult<LinesearchResult<DT>>
    where
        V: VectorOps<Scalar = DT>,
        F: NonlinearFunctional<V>,
    {
        match self {
            Linesearch::StrongWolfe(ls) => {
                ls.search(func, filter, x, grad, x0, dir, f0, slope0)
            }
            Linesearch::Mqc(ls) => ls.search(func, filter, x, grad, x0, dir, f0, slope0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::DenseVector;
    use crate::filter::NoneFilter;

    /// Quadratic bowl `F(x) = 0.5*|x - c|^2`.
    struct Bowl {
        c: DenseVector<f64>,
    }

    impl NonlinearFunctional<DenseVector<f64>> for Bowl {
        fn prepare(&mut self, _x: &DenseVector<f64>) -> FemResult<()> {
            Ok(())
        }

        fn value(&mut self, x: &DenseVector<f64>) -> FemResult<f64> {
            let mut d = x.clone_layout();
            d.axpy(&self.c, x, -1.0)?;
            Ok(0.5 * d.norm2sqr())
        }

        fn gradient(&mut self, grad: &mut DenseVector<f64>, x: &DenseVector<f64>) -> FemResult<()> {
            grad.axpy(&self.c, x, -1.0)
        }
    }

    fn run_search(ls: &Linesearch<f64>) {
        let mut func = Bowl {
            c: DenseVector::from_vec(vec![1.0, 1.0]),
        };
        let x0 = DenseVector::new(2);
        let mut grad = x0.clone_layout();
        func.gradient(&mut grad, &x0).unwrap();
        let f0 = func.value(&x0).unwrap();

        let mut dir = grad.clone_layout();
        dir.scale(&grad, -1.0).unwrap();
        let slope0 = grad.dot(&dir).unwrap();

        let mut x = x0.clone_layout();
        let res = ls
            .search(
                &mut func,
                &NoneFilter,
                &mut x,
                &mut grad,
                &x0,
                &dir,
                f0,
                slope0,
            )
            .unwrap();
        assert_eq!(res.status, LinesearchStatus::Success);
        assert!(res.value < f0);
        // Wolfe conditions hold at the accepted step.
        let slope = grad.dot(&dir).unwrap();
        assert!(res.value <= f0 + 1e-3 * res.alpha * slope0);
        assert!(slope.abs() <= 0.3 * slope0.abs());
    }

    #[test]
    fn test_strong_wolfe_on_quadratic() {
        run_search(&Linesearch::StrongWolfe(StrongWolfeLinesearch::default()));
    }

    #[test]
    fn test_mqc_on_quadratic() {
        run_search(&Linesearch::Mqc(MqcLinesearch::default()));
    }
}
