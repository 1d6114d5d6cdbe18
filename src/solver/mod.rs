//! Linear solvers and preconditioners
//!
//! All solvers share one interface: `init`, `apply(correction, defect)`
//! returning a [`SolverStatus`], `done`. The initial guess is passed
//! in-place through the correction vector. Stopping:
//! `|r_k| <= max(tol_abs, tol_rel * |r_0|)` or the iteration bound;
//! divergence is detected at `|r_k| > 1e6 * |r_0|`.
//!
//! Preconditioners are solvers; composition is plug-and-play through
//! [`SolverBox`] handles, which is what the configuration-driven factory
//! builds its trees out of.

pub mod bicgstab;
pub mod fgmres;
pub mod ilu;
pub mod jacobi;
pub mod multigrid;
pub mod pcg;
pub mod pcr;
pub mod richardson;
pub mod scale;
pub mod schur;
pub mod schwarz;
pub mod sor;

pub use bicgstab::BiCgStab;
pub use fgmres::FGmres;
pub use ilu::IluPrecon;
pub use jacobi::JacobiPrecon;
pub use multigrid::{CycleType, MgLevel, MultiGrid};
pub use pcg::Pcg;
pub use pcr::Pcr;
pub use richardson::Richardson;
pub use scale::ScalePrecon;
pub use schur::{SchurPrecon, SchurVariant};
pub use schwarz::SchwarzPrecon;
pub use sor::SorPrecon;

use serde::{Deserialize, Serialize};

use crate::containers::VectorOps;
use crate::error::FemResult;
use crate::filter::Filter;
use crate::scalar::DataType;

/// Outcome of a solver application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    /// No application has run yet.
    Undefined,
    /// Stopping criterion reached.
    Success,
    /// Iteration bound reached without convergence.
    MaxIter,
    /// Defect stopped improving.
    Stagnated,
    /// Defect blew up beyond the divergence bound.
    Diverged,
    /// Breakdown, e.g. an indefinite system in PCG.
    Aborted,
}

impl SolverStatus {
    pub fn is_success(self) -> bool {
        matches!(self, SolverStatus::Success)
    }
}

/// The uniform solver interface.
pub trait Solver<V: VectorOps>: Send {
    fn name(&self) -> &str;

    /// Performs symbolic/numeric setup, e.g. factorisations.
    fn init(&mut self) -> FemResult<()> {
        Ok(())
    }

    /// Solves `A * cor = def`; `cor` carries the initial guess in-place.
    fn apply(&mut self, cor: &mut V, def: &V) -> FemResult<SolverStatus>;

    /// Releases solver-internal state.
    fn done(&mut self) {}
}

/// Boxed solver handle for plug-and-play composition.
pub type SolverBox<V> = Box<dyn Solver<V>>;

/// Iteration control shared by all iterative solvers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterParams<DT: DataType> {
    pub max_iter: usize,
    pub min_iter: usize,
    pub tol_rel: DT,
    pub tol_abs: DT,
    /// Relative divergence bound.
    pub div_rel: DT,
    /// Stagnation: minimum defect reduction per iteration; zero disables
    /// the check.
    pub stag_rate: DT,
    pub plot: bool,
}

impl<DT: DataType> Default for IterParams<DT> {
    fn default() -> Self {
        Self {
            max_iter: 100,
            min_iter: 0,
            tol_rel: DT::of(1e-8),
            tol_abs: DT::zero(),
            div_rel: DT::of(1e6),
            stag_rate: DT::zero(),
            plot: false,
        }
    }
}

impl<DT: DataType> IterParams<DT> {
    pub fn set_max_iter(&mut self, max_iter: usize) -> &mut Self {
        self.max_iter = max_iter;
        self
    }

    pub fn set_tol_rel(&mut self, tol_rel: DT) -> &mut Self {
        self.tol_rel = tol_rel;
        self
    }

    pub fn set_tol_abs(&mut self, tol_abs: DT) -> &mut Self {
        self.tol_abs = tol_abs;
        self
    }

    pub fn set_plot(&mut self, plot: bool) -> &mut Self {
        self.plot = plot;
        self
    }

    /// True once the defect satisfies the mixed stopping criterion.
    pub fn converged(&self, norm0: DT, norm: DT) -> bool {
        let bound = if self.tol_abs > self.tol_rel * norm0 {
            self.tol_abs
        } else {
            self.tol_rel * norm0
        };
        norm <= bound
    }

    pub fn diverged(&self, norm0: DT, norm: DT) -> bool {
        norm > self.div_rel * norm0
    }

    pub fn plot_iter(&self, name: &str, iter: usize, norm: DT) {
        if self.plot {
            log::info!("{name}: {iter:4} : {:.6e}", norm.to_f64());
        }
    }

    /// Evaluates the defect norm against all bounds; `None` keeps
    /// iterating.
    pub fn check(&self, iter: usize, norm0: DT, norm: DT) -> Option<SolverStatus> {
        if iter >= self.min_iter && self.converged(norm0, norm) {
            return Some(SolverStatus::Success);
        }
        if self.diverged(norm0, norm) {
            return Some(SolverStatus::Diverged);
        }
        if iter >= self.max_iter {
            return Some(SolverStatus::MaxIter);
        }
        None
    }
}

/// Applies an optional preconditioner: `cor = M^-1 * def`, falling back
/// to the identity, and filters the correction.
pub(crate) fn apply_precon<V: VectorOps>(
    precon: &mut Option<SolverBox<V>>,
    filter: &dyn Filter<V>,
    cor: &mut V,
    def: &V,
) -> FemResult<SolverStatus> {
    let status = match precon {
        Some(p) => {
            cor.format(V::Scalar::of(0.0));
            p.apply(cor, def)?
        }
        None => {
            cor.copy_from(def)?;
            SolverStatus::Success
        }
    };
    filter.filter_cor(cor)?;
    Ok(status)
}
