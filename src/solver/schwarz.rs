//! Schwarz block preconditioner (two-layer solver stacks)

use crate::comm::Comm;
use crate::containers::VectorOps;
use crate::error::FemResult;
use crate::global::{GlobalVector, Syncable};
use crate::scalar::DataType;
use crate::solver::{Solver, SolverBox, SolverStatus};

/// Additive Schwarz step: every rank solves its local patch system with
/// the wrapped layer-0 solver, the overlapping corrections are averaged
/// through the gate.
///
/// A typical stack drives this from a global (layer-1) Richardson or
/// PCG, with the local solver itself being a Richardson-Jacobi or PCG
/// iteration on the patch matrix.
pub struct SchwarzPrecon<V: Syncable, C: Comm> {
    local_solver: SolverBox<V>,
    _marker: std::marker::PhantomData<fn() -> C>,
}

impl<V: Syncable, C: Comm> SchwarzPrecon<V, C> {
    pub fn new(local_solver: SolverBox<V>) -> Self {
        Self {
            local_solver,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<V, C> Solver<GlobalVector<V, C>> for SchwarzPrecon<V, C>
where
    V: Syncable + Send + Sync,
    C: Comm,
{
    fn name(&self) -> &str {
        "Schwarz"
    }

    fn init(&mut self) -> FemResult<()> {
        self.local_solver.init()
    }

    fn apply(
        &mut self,
        cor: &mut GlobalVector<V, C>,
        def: &GlobalVector<V, C>,
    ) -> FemResult<SolverStatus> {
        cor.format(V::Scalar::of(0.0));
        let status = self.local_solver.apply(cor.local_mut(), def.local())?;
        // Overlapping patch corrections are averaged, not summed.
        cor.sync_1()?;
        Ok(match status {
            SolverStatus::Diverged | SolverStatus::Aborted => status,
            _ => SolverStatus::Success,
        })
    }

    fn done(&mut self) {
        self.local_solver.done();
    }
}
