//! Unit filter: essential (Dirichlet) boundary conditions

use nalgebra::SVector;

use crate::containers::{DenseVector, DenseVectorBlocked, SparseMatrixCsr};
use crate::error::FemResult;
use crate::filter::Filter;
use crate::scalar::{DataType, IndexType};

/// Index/value pairs defining `x[i] = v[i]` constraints.
///
/// Solution and right-hand side entries are replaced by the stored
/// values, defect and correction entries are zeroed, and matrix rows are
/// rewritten to unit rows.
#[derive(Debug, Clone, Default)]
pub struct UnitFilter<DT: DataType = f64> {
    entries: Vec<(usize, DT)>,
}

impl<DT: DataType> UnitFilter<DT> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn from_entries(mut entries: Vec<(usize, DT)>) -> Self {
        entries.sort_by_key(|&(i, _)| i);
        entries.dedup_by_key(|&mut (i, _)| i);
        Self { entries }
    }

    /// Adds a constraint; a later entry for the same index wins.
    pub fn add(&mut self, index: usize, value: DT) {
        match self.entries.binary_search_by_key(&index, |&(i, _)| i) {
            Ok(pos) => self.entries[pos].1 = value,
            Err(pos) => self.entries.insert(pos, (index, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(usize, DT)] {
        &self.entries
    }

    /// Rewrites each constrained row of the matrix to the unit row.
    pub fn filter_mat<IT: IndexType>(&self, m: &mut SparseMatrixCsr<DT, IT>) -> FemResult<()> {
        for &(i, _) in &self.entries {
            m.set_unit_row(i)?;
        }
        Ok(())
    }
}

impl<DT: DataType> Filter<DenseVector<DT>> for UnitFilter<DT> {
    fn filter_sol(&self, v: &mut DenseVector<DT>) -> FemResult<()> {
        for &(i, val) in &self.entries {
            v.set(i, val);
        }
        Ok(())
    }

    fn filter_rhs(&self, v: &mut DenseVector<DT>) -> FemResult<()> {
        self.filter_sol(v)
    }

    fn filter_def(&self, v: &mut DenseVector<DT>) -> FemResult<()> {
        for &(i, _) in &self.entries {
            v.set(i, DT::zero());
        }
        Ok(())
    }

    fn filter_cor(&self, v: &mut DenseVector<DT>) -> FemResult<()> {
        self.filter_def(v)
    }
}

/// Blocked unit filter constraining whole value tiles, e.g. fixed vertex
/// coordinates of Dirichlet boundaries in the mesh optimiser.
#[derive(Debug, Clone)]
pub struct UnitFilterBlocked<DT: DataType = f64, const B: usize = 2> {
    entries: Vec<(usize, SVector<DT, B>)>,
}

impl<DT: DataType, const B: usize> Default for UnitFilterBlocked<DT, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<DT: DataType, const B: usize> UnitFilterBlocked<DT, B> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, index: usize, value: SVector<DT, B>) {
        match self.entries.binary_search_by_key(&index, |&(i, _)| i) {
            Ok(pos) => self.entries[pos].1 = value,
            Err(pos) => self.entries.insert(pos, (index, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.entries.iter().map(|&(i, _)| i)
    }

    /// Re-reads the constrained values from a vector, keeping the index
    /// set. Used when the boundary itself moved.
    pub fn refresh_values(&mut self, v: &DenseVectorBlocked<DT, B>) {
        for (i, val) in &mut self.entries {
            *val = v.at(*i);
        }
    }
}

impl<DT: DataType, const B: usize> Filter<DenseVectorBlocked<DT, B>> for UnitFilterBlocked<DT, B> {
    fn filter_sol(&self, v: &mut DenseVectorBlocked<DT, B>) -> FemResult<()> {
        for &(i, val) in &self.entries {
            v.set(i, val);
        }
        Ok(())
    }

    fn filter_rhs(&self, v: &mut DenseVectorBlocked<DT, B>) -> FemResult<()> {
        self.filter_sol(v)
    }

    fn filter_def(&self, v: &mut DenseVectorBlocked<DT, B>) -> FemResult<()> {
        for &(i, _) in &self.entries {
            v.set(i, SVector::zeros());
        }
        Ok(())
    }

    fn filter_cor(&self, v: &mut DenseVectorBlocked<DT, B>) -> FemResult<()> {
        self.filter_def(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::csr::CsrBuilder;
    use approx::assert_relative_eq;

    #[test]
    fn test_filter_vectors() {
        let mut f = UnitFilter::new();
        f.add(1, 5.0);
        let mut v = DenseVector::from_vec(vec![1.0, 2.0, 3.0]);
        f.filter_sol(&mut v).unwrap();
        assert_relative_eq!(v.at(1), 5.0);
        f.filter_def(&mut v).unwrap();
        assert_relative_eq!(v.at(1), 0.0);
        assert_relative_eq!(v.at(0), 1.0);
    }

    #[test]
    fn test_idempotent() {
        let mut f = UnitFilter::new();
        f.add(0, 2.0);
        let mut v = DenseVector::from_vec(vec![0.0, 1.0]);
        f.filter_sol(&mut v).unwrap();
        let once = v.clone_mode(crate::containers::CloneMode::Deep);
        f.filter_sol(&mut v).unwrap();
        assert!(v.bitwise_eq(&once));
    }

    #[test]
    fn test_filter_mat() {
        let mut b = CsrBuilder::new(2, 2);
        b.add(0, 0, 4.0);
        b.add(0, 1, 1.0);
        b.add(1, 0, 1.0);
        b.add(1, 1, 4.0);
        let mut m: SparseMatrixCsr<f64, u64> = b.build();
        let mut f = UnitFilter::new();
        f.add(0, 7.0);
        f.filter_mat(&mut m).unwrap();
        assert_relative_eq!(m.get(0, 0), 1.0);
        assert_relative_eq!(m.get(0, 1), 0.0);
        assert_relative_eq!(m.get(1, 0), 1.0);
    }
}
