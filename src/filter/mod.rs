//! Boundary-condition and compatibility filters
//!
//! All filters are idempotent. On a linear system the matrix must be
//! filtered before the right-hand side and solution, otherwise the
//! rewritten rows and the imposed values disagree.

pub mod chain;
pub mod mean;
pub mod slip;
pub mod unit;

pub use chain::FilterChain;
pub use mean::MeanFilter;
pub use slip::SlipFilter;
pub use unit::{UnitFilter, UnitFilterBlocked};

use crate::error::FemResult;

/// The four filtering entry points of a boundary-condition filter.
pub trait Filter<V>: Send + Sync {
    /// Imposes boundary values on a solution vector.
    fn filter_sol(&self, v: &mut V) -> FemResult<()>;

    /// Imposes boundary values on a right-hand side.
    fn filter_rhs(&self, v: &mut V) -> FemResult<()>;

    /// Clears constrained components of a defect.
    fn filter_def(&self, v: &mut V) -> FemResult<()>;

    /// Clears constrained components of a correction.
    fn filter_cor(&self, v: &mut V) -> FemResult<()>;
}

/// The do-nothing filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneFilter;

impl<V> Filter<V> for NoneFilter {
    fn filter_sol(&self, _v: &mut V) -> FemResult<()> {
        Ok(())
    }

    fn filter_rhs(&self, _v: &mut V) -> FemResult<()> {
        Ok(())
    }

    fn filter_def(&self, _v: &mut V) -> FemResult<()> {
        Ok(())
    }

    fn filter_cor(&self, _v: &mut V) -> FemResult<()> {
        Ok(())
    }
}

/// Per-block filter pair for tuple vectors.
pub struct TupleFilter<FA, FB> {
    pub first: FA,
    pub second: FB,
}

impl<FA, FB> TupleFilter<FA, FB> {
    pub fn new(first: FA, second: FB) -> Self {
        Self { first, second }
    }
}

impl<A, B, FA, FB> Filter<crate::meta::TupleVector<A, B>> for TupleFilter<FA, FB>
where
    A: crate::containers::VectorOps + Send + Sync,
    B: crate::containers::VectorOps<Scalar = A::Scalar> + Send + Sync,
    FA: Filter<A>,
    FB: Filter<B>,
{
    fn filter_sol(&self, v: &mut crate::meta::TupleVector<A, B>) -> FemResult<()> {
        self.first.filter_sol(&mut v.first)?;
        self.second.filter_sol(&mut v.second)
    }

    fn filter_rhs(&self, v: &mut crate::meta::TupleVector<A, B>) -> FemResult<()> {
        self.first.filter_rhs(&mut v.first)?;
        self.second.filter_rhs(&mut v.second)
    }

    fn filter_def(&self, v: &mut crate::meta::TupleVector<A, B>) -> FemResult<()> {
        self.first.filter_def(&mut v.first)?;
        self.second.filter_def(&mut v.second)
    }

    fn filter_cor(&self, v: &mut crate::meta::TupleVector<A, B>) -> FemResult<()> {
        self.first.filter_cor(&mut v.first)?;
        self.second.filter_cor(&mut v.second)
    }
}

/// Per-block filters for a power vector.
pub struct PowerFilter<F, const N: usize> {
    blocks: [F; N],
}

impl<F, const N: usize> PowerFilter<F, N> {
    pub fn from_blocks(blocks: [F; N]) -> Self {
        Self { blocks }
    }
}

impl<V, F, const N: usize> Filter<crate::meta::PowerVector<V, N>> for PowerFilter<F, N>
where
    V: crate::containers::VectorOps + Send + Sync,
    F: Filter<V>,
{
    fn filter_sol(&self, v: &mut crate::meta::PowerVector<V, N>) -> FemResult<()> {
        for (i, f) in self.blocks.iter().enumerate() {
            f.filter_sol(v.block_mut(i))?;
        }
        Ok(())
    }

    fn filter_rhs(&self, v: &mut crate::meta::PowerVector<V, N>) -> FemResult<()> {
        for (i, f) in self.blocks.iter().enumerate() {
            f.filter_rhs(v.block_mut(i))?;
        }
        Ok(())
    }

    fn filter_def(&self, v: &mut crate::meta::PowerVector<V, N>) -> FemResult<()> {
        for (i, f) in self.blocks.iter().enumerate() {
            f.filter_def(v.block_mut(i))?;
        }
        Ok(())
    }

    fn filter_cor(&self, v: &mut crate::meta::PowerVector<V, N>) -> FemResult<()> {
        for (i, f) in self.blocks.iter().enumerate() {
            f.filter_cor(v.block_mut(i))?;
        }
        Ok(())
    }
}
