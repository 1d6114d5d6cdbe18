//! Globally distributed vector

use std::sync::Arc;

use crate::comm::Comm;
use crate::containers::VectorOps;
use crate::error::FemResult;
use crate::global::{collective_abort, Gate, Syncable};
use crate::scalar::DataType;

/// A local vector together with its gate; reductions are global, all
/// element-wise operations stay local.
///
/// The stored local vector is kept consistent (type-1): every rank holds
/// the true value on its interface dofs.
pub struct GlobalVector<V: Syncable, C: Comm> {
    local: V,
    gate: Arc<Gate<C>>,
}

impl<V: Syncable, C: Comm> Clone for GlobalVector<V, C> {
    fn clone(&self) -> Self {
        Self {
            local: self.local.clone(),
            gate: Arc::clone(&self.gate),
        }
    }
}

impl<V: Syncable, C: Comm> GlobalVector<V, C> {
    pub fn new(local: V, gate: Arc<Gate<C>>) -> Self {
        Self { local, gate }
    }

    pub fn local(&self) -> &V {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut V {
        &mut self.local
    }

    pub fn into_local(self) -> V {
        self.local
    }

    pub fn gate(&self) -> &Arc<Gate<C>> {
        &self.gate
    }

    /// Sums the distributed contributions on the interface dofs.
    pub fn sync_0(&mut self) -> FemResult<()> {
        self.gate.sync_0(&mut self.local)
    }

    /// Averages the interface dofs.
    pub fn sync_1(&mut self) -> FemResult<()> {
        self.gate.sync_1(&mut self.local)
    }
}

impl<V: Syncable, C: Comm> VectorOps for GlobalVector<V, C> {
    type Scalar = V::Scalar;

    fn size(&self) -> usize {
        self.local.size()
    }

    fn clone_layout(&self) -> Self {
        Self {
            local: self.local.clone_layout(),
            gate: Arc::clone(&self.gate),
        }
    }

    fn format(&mut self, alpha: Self::Scalar) {
        self.local.format(alpha);
    }

    fn copy_from(&mut self, x: &Self) -> FemResult<()> {
        self.local.copy_from(&x.local)
    }

    fn axpy(&mut self, x: &Self, y: &Self, alpha: Self::Scalar) -> FemResult<()> {
        self.local.axpy(&x.local, &y.local, alpha)
    }

    fn scale(&mut self, x: &Self, alpha: Self::Scalar) -> FemResult<()> {
        self.local.scale(&x.local, alpha)
    }

    fn component_product(&mut self, x: &Self, y: &Self) -> FemResult<()> {
        self.local.component_product(&x.local, &y.local)
    }

    fn component_invert(&mut self, x: &Self, alpha: Self::Scalar) -> FemResult<()> {
        self.local.component_invert(&x.local, alpha)
    }

    fn dot(&self, x: &Self) -> FemResult<Self::Scalar> {
        Ok(Self::Scalar::of(self.gate.dot(&self.local, &x.local)?))
    }

    fn triple_dot(&self, x: &Self, y: &Self) -> FemResult<Self::Scalar> {
        // No frequency weighting for the diagonal factor itself: the
        // weight enters once, through the dot reduction.
        let mut tmp = self.local.clone_layout();
        tmp.component_product(&self.local, &x.local)?;
        Ok(Self::Scalar::of(self.gate.dot(&tmp, &y.local)?))
    }

    fn norm2sqr(&self) -> Self::Scalar {
        match self.gate.dot(&self.local, &self.local) {
            Ok(v) => Self::Scalar::of(v),
            Err(e) => collective_abort(e),
        }
    }

    fn max_abs_element(&self) -> Self::Scalar {
        let local = self.local.max_abs_element().to_f64();
        match self.gate.max(local) {
            Ok(v) => Self::Scalar::of(v),
            Err(e) => collective_abort(e),
        }
    }
}
