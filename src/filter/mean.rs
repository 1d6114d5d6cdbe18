//! Mean filter: integral-mean compatibility condition

use crate::containers::VectorOps;
use crate::error::FemResult;
use crate::filter::Filter;

/// Rank-1 projection enforcing a zero weighted mean, the usual pressure
/// compatibility condition for pure-Dirichlet saddle-point systems.
///
/// With primal vector `p` (ones for a nodal basis), dual weight vector
/// `w` (lumped mass) and volume `w . p`, filtering subtracts
/// `((w . v)/volume) * p`.
#[derive(Debug, Clone)]
pub struct MeanFilter<V: VectorOps> {
    primal: V,
    dual: V,
    volume: V::Scalar,
}

impl<V: VectorOps> MeanFilter<V> {
    pub fn new(primal: V, dual: V) -> FemResult<Self> {
        let volume = dual.dot(&primal)?;
        Ok(Self {
            primal,
            dual,
            volume,
        })
    }

    fn project(&self, v: &mut V) -> FemResult<()> {
        let mean = self.dual.dot(v)? / self.volume;
        let old = v.clone();
        v.axpy(&self.primal, &old, -mean)
    }
}

impl<V: VectorOps + Send + Sync> Filter<V> for MeanFilter<V> {
    fn filter_sol(&self, v: &mut V) -> FemResult<()> {
        self.project(v)
    }

    fn filter_rhs(&self, v: &mut V) -> FemResult<()> {
        self.project(v)
    }

    fn filter_def(&self, v: &mut V) -> FemResult<()> {
        self.project(v)
    }

    fn filter_cor(&self, v: &mut V) -> FemResult<()> {
        self.project(v)
    }
}
