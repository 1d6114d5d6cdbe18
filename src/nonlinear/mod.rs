//! Nonlinear optimisation: NLCG and line searches

pub mod linesearch;
pub mod nlcg;

pub use linesearch::{
    Linesearch, LinesearchParams, LinesearchResult, LinesearchStatus, MqcLinesearch,
    StrongWolfeLinesearch,
};
pub use nlcg::{DirectionUpdate, Nlcg};

use crate::containers::VectorOps;
use crate::error::FemResult;

/// A differentiable functional driving the nonlinear solver.
///
/// `prepare` is called whenever the iterate moved, before values or
/// gradients are requested; functionals with state depending on the
/// current iterate (adaptive scales, re-projected boundaries) hook in
/// there.
pub trait NonlinearFunctional<V: VectorOps> {
    fn prepare(&mut self, x: &V) -> FemResult<()>;

    fn value(&mut self, x: &V) -> FemResult<V::Scalar>;

    fn gradient(&mut self, grad: &mut V, x: &V) -> FemResult<()>;
}
