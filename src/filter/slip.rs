//! Slip filter: tangential-only boundary conditions

use crate::containers::{DenseVectorBlocked, SparseVectorBlocked};
use crate::error::FemResult;
use crate::filter::Filter;
use crate::scalar::{DataType, IndexType};

/// Removes the normal component of a vector field on a boundary,
/// `v[i] -= (v[i] . nu[i]) nu[i]`, leaving the tangential space free.
///
/// The normal field is a sparse blocked vector; after assembly the raw
/// (volume-weighted) normals are synchronised across ranks and then
/// normalised, so interface dofs carry a globally consistent unit normal.
#[derive(Debug, Clone)]
pub struct SlipFilter<DT: DataType = f64, IT: IndexType = u64, const B: usize = 2> {
    normals: SparseVectorBlocked<DT, IT, B>,
}

impl<DT: DataType, IT: IndexType, const B: usize> SlipFilter<DT, IT, B> {
    pub fn new(size: usize) -> Self {
        Self {
            normals: SparseVectorBlocked::new(size),
        }
    }

    /// Takes ownership of an assembled (already normalised) normal field.
    pub fn from_normals(mut normals: SparseVectorBlocked<DT, IT, B>) -> Self {
        normals.sort();
        Self { normals }
    }

    pub fn size(&self) -> usize {
        self.normals.size()
    }

    /// Number of constrained dofs.
    pub fn used_elements(&mut self) -> usize {
        self.normals.used_elements()
    }

    /// The assembled normal field.
    pub fn normals(&mut self) -> &mut SparseVectorBlocked<DT, IT, B> {
        &mut self.normals
    }

    fn project(&self, v: &mut DenseVectorBlocked<DT, B>) -> FemResult<()> {
        let mut normals = self.normals.clone();
        for (i, nu) in normals.iter() {
            let x = v.at(i);
            let coef = x.dot(&nu);
            v.set(i, x - nu * coef);
        }
        Ok(())
    }
}

impl<DT: DataType, IT: IndexType, const B: usize> Filter<DenseVectorBlocked<DT, B>>
    for SlipFilter<DT, IT, B>
{
    fn filter_sol(&self, v: &mut DenseVectorBlocked<DT, B>) -> FemResult<()> {
        self.project(v)
    }

    fn filter_rhs(&self, v: &mut DenseVectorBlocked<DT, B>) -> FemResult<()> {
        self.project(v)
    }

    fn filter_def(&self, v: &mut DenseVectorBlocked<DT, B>) -> FemResult<()> {
        self.project(v)
    }

    fn filter_cor(&self, v: &mut DenseVectorBlocked<DT, B>) -> FemResult<()> {
        self.project(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;
    use crate::containers::VectorOps;

    #[test]
    fn test_removes_normal_component() {
        let mut normals = SparseVectorBlocked::<f64, u64, 2>::new(3);
        normals.add(1, Vector2::new(1.0, 0.0)).unwrap();
        let f = SlipFilter::from_normals(normals);

        let mut v = DenseVectorBlocked::<f64, 2>::new(3);
        v.set(1, Vector2::new(3.0, 4.0));
        f.filter_sol(&mut v).unwrap();
        assert_relative_eq!(v.at(1)[0], 0.0);
        assert_relative_eq!(v.at(1)[1], 4.0);
    }

    #[test]
    fn test_idempotent_and_orthogonal() {
        let nu = Vector2::new(0.6, 0.8);
        let mut normals = SparseVectorBlocked::<f64, u64, 2>::new(2);
        normals.add(0, nu).unwrap();
        let f = SlipFilter::from_normals(normals);

        let mut v = DenseVectorBlocked::<f64, 2>::new(2);
        v.set(0, Vector2::new(1.0, 2.0));
        f.filter_sol(&mut v).unwrap();
        let once = v.clone();
        f.filter_sol(&mut v).unwrap();

        assert_relative_eq!(v.at(0)[0], once.at(0)[0], epsilon = 1e-15);
        assert!(v.at(0).dot(&nu).abs() < 1e-12 * v.at(0).norm().max(1.0));
        assert_relative_eq!(v.norm2(), once.norm2(), epsilon = 1e-15);
    }
}
