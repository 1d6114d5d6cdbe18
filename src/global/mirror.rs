//! Interface dof mirror

use crate::error::FemResult;
use crate::global::Syncable;

/// Projects a local vector onto the interface dofs shared with one
/// neighbour: gather feeds the send buffer, scatter-add folds the
/// received contributions back in.
#[derive(Debug, Clone)]
pub struct VectorMirror {
    indices: Vec<usize>,
}

impl VectorMirror {
    pub fn new(indices: Vec<usize>) -> Self {
        Self { indices }
    }

    /// Identity mirror over `n` dofs, used by trivial agglomerations.
    pub fn identity(n: usize) -> Self {
        Self {
            indices: (0..n).collect(),
        }
    }

    /// Number of mirrored dofs.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn is_identity(&self, n: usize) -> bool {
        self.indices.len() == n && self.indices.iter().enumerate().all(|(k, &i)| k == i)
    }

    /// Wire buffer length for a vector type.
    pub fn buffer_len<V: Syncable>(&self) -> usize {
        self.indices.len() * V::COMPONENTS
    }

    pub fn gather<V: Syncable>(&self, v: &V) -> Vec<f64> {
        let mut buf = Vec::with_capacity(self.buffer_len::<V>());
        v.gather(&self.indices, &mut buf);
        buf
    }

    pub fn scatter_add<V: Syncable>(&self, v: &mut V, buf: &[f64]) -> FemResult<()> {
        crate::error::check_sizes(self.buffer_len::<V>(), buf.len())?;
        v.scatter_add(&self.indices, buf);
        Ok(())
    }

    pub fn scatter_write<V: Syncable>(&self, v: &mut V, buf: &[f64]) -> FemResult<()> {
        crate::error::check_sizes(self.buffer_len::<V>(), buf.len())?;
        v.scatter_write(&self.indices, buf);
        Ok(())
    }
}
