//! Globally distributed matrix

use std::sync::Arc;

use crate::comm::Comm;
use crate::containers::LinOp;
use crate::error::FemResult;
use crate::global::{Gate, GlobalVector, Syncable};

/// A locally assembled (type-0) operator lifted to the distributed level.
///
/// Applying it to a consistent vector produces per-rank partial sums on
/// the interface dofs, which the gate folds back into a consistent
/// result.
pub struct GlobalMatrix<M, V: Syncable, C: Comm> {
    local: M,
    gate: Arc<Gate<C>>,
    _marker: std::marker::PhantomData<fn() -> V>,
}

impl<M, V, C> GlobalMatrix<M, V, C>
where
    M: LinOp<V>,
    V: Syncable,
    C: Comm,
{
    pub fn new(local: M, gate: Arc<Gate<C>>) -> Self {
        Self {
            local,
            gate,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn local(&self) -> &M {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut M {
        &mut self.local
    }

    pub fn gate(&self) -> &Arc<Gate<C>> {
        &self.gate
    }
}

impl<M, V, C> LinOp<GlobalVector<V, C>> for GlobalMatrix<M, V, C>
where
    M: LinOp<V>,
    V: Syncable + Send + Sync,
    C: Comm,
{
    fn apply(&self, r: &mut GlobalVector<V, C>, x: &GlobalVector<V, C>) -> FemResult<()> {
        self.local.apply(r.local_mut(), x.local())?;
        r.sync_0()
    }

    fn apply_scaled_sum(
        &self,
        r: &mut GlobalVector<V, C>,
        x: &GlobalVector<V, C>,
        y: &GlobalVector<V, C>,
        alpha: V::Scalar,
    ) -> FemResult<()> {
        // Synchronise the raw product first, then blend with the
        // consistent vector y.
        let mut t = y.local().clone_layout();
        self.local.apply(&mut t, x.local())?;
        self.gate.sync_0(&mut t)?;
        r.local_mut().axpy(&t, y.local(), alpha)
    }
}
