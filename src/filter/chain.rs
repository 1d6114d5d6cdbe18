//! Sequential filter composition

use crate::error::FemResult;
use crate::filter::Filter;

/// Applies child filters in insertion order.
///
/// Order matters: a slip filter applied after a unit filter would
/// re-enable dofs the unit filter removed, so unit filters go last.
#[derive(Default)]
pub struct FilterChain<V> {
    filters: Vec<Box<dyn Filter<V>>>,
}

impl<V> FilterChain<V> {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn push(&mut self, filter: Box<dyn Filter<V>>) {
        self.filters.push(filter);
    }

    pub fn with(mut self, filter: Box<dyn Filter<V>>) -> Self {
        self.push(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl<V: Send + Sync> Filter<V> for FilterChain<V> {
    fn filter_sol(&self, v: &mut V) -> FemResult<()> {
        for f in &self.filters {
            f.filter_sol(v)?;
        }
        Ok(())
    }

    fn filter_rhs(&self, v: &mut V) -> FemResult<()> {
        for f in &self.filters {
            f.filter_rhs(v)?;
        }
        Ok(())
    }

    fn filter_def(&self, v: &mut V) -> FemResult<()> {
        for f in &self.filters {
            f.filter_def(v)?;
        }
        Ok(())
    }

    fn filter_cor(&self, v: &mut V) -> FemResult<()> {
        for f in &self.filters {
            f.filter_cor(v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{DenseVectorBlocked, SparseVectorBlocked};
    use crate::filter::{SlipFilter, UnitFilterBlocked};
    use nalgebra::Vector2;

    #[test]
    fn test_chain_order_unit_then_slip() {
        // Unit constraint on dof 0, slip constraint on dof 1.
        let mut unit = UnitFilterBlocked::<f64, 2>::new();
        unit.add(0, Vector2::new(1.0, 1.0));
        let mut normals = SparseVectorBlocked::<f64, u64, 2>::new(2);
        normals.add(1, Vector2::new(0.0, 1.0)).unwrap();
        let slip = SlipFilter::from_normals(normals);

        let chain = FilterChain::new()
            .with(Box::new(unit))
            .with(Box::new(slip));

        let mut v = DenseVectorBlocked::<f64, 2>::new(2);
        v.set(1, Vector2::new(2.0, 3.0));
        chain.filter_sol(&mut v).unwrap();

        assert_eq!(v.at(0), Vector2::new(1.0, 1.0));
        assert_eq!(v.at(1), Vector2::new(2.0, 0.0));

        // Idempotence of the whole chain.
        let once = v.clone();
        chain.filter_sol(&mut v).unwrap();
        assert_eq!(v.at(0), once.at(0));
        assert_eq!(v.at(1), once.at(1));
    }
}
