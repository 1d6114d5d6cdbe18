//! Matrix stock: per-level assembled operators

use std::sync::Arc;

use crate::assembly::{
    assemble_laplace, assemble_unit_filter, cubature::CubatureRule,
    grid_transfer::assemble_grid_transfer,
};
use crate::comm::Comm;
use crate::containers::{DenseVector, SparseMatrixCsr};
use crate::control::DomainControl;
use crate::error::FemResult;
use crate::filter::UnitFilter;
use crate::transfer::TransferOperator;

/// One level's share of the stock.
pub struct StockLevel {
    pub matrix: Arc<SparseMatrixCsr<f64, u64>>,
    pub filter: Arc<UnitFilter<f64>>,
    /// Transfer towards the next coarser stock level.
    pub transfer: Option<Arc<TransferOperator<f64, u64>>>,
    pub template: DenseVector<f64>,
}

/// Owns the per-level matrices, filters and transfer operators the
/// solver factory resolves against. Levels run finest first.
pub struct MatrixStock {
    pub levels: Vec<StockLevel>,
}

impl MatrixStock {
    /// Assembles the Poisson system on every level of a hierarchy:
    /// Laplace matrix, homogeneous unit filter on the `"bnd"` part, and
    /// weight-rescaled grid transfers between consecutive levels.
    pub fn assemble_poisson<C: Comm>(domain: &DomainControl<C>) -> FemResult<Self> {
        let mut levels = Vec::new();
        let dom_levels = domain.levels();

        for (k, level) in dom_levels.iter().enumerate() {
            let mesh = level.node.mesh();
            let rule = CubatureRule::default_rule(mesh.shape());

            // Symbolic structure first, numeric values in place, then
            // the boundary rows are rewritten.
            let mut matrix = assemble_laplace(mesh, &rule)?;
            let part = level.node.find_part("bnd")?;
            let filter = assemble_unit_filter(part, mesh, |_| 0.0);
            filter.filter_mat(&mut matrix)?;

            // Transfer towards the coarser neighbour, weight vector
            // synchronised through the fine-level gate.
            let transfer = if k + 1 < dom_levels.len() {
                let coarse_mesh = dom_levels[k + 1].node.mesh();
                let (mut t, mut weights) = assemble_grid_transfer(coarse_mesh, mesh, &rule)?;
                level.gate.sync_0(&mut weights)?;
                t.rescale_rows(&weights)?;
                Some(Arc::new(t))
            } else {
                None
            };

            levels.push(StockLevel {
                template: matrix.create_vector_l(),
                matrix: Arc::new(matrix),
                filter: Arc::new(filter),
                transfer,
            });
        }
        Ok(Self { levels })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn finest(&self) -> &StockLevel {
        &self.levels[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;
    use crate::geometry::ShapeType;

    #[test]
    fn test_poisson_stock() {
        let comm = Arc::new(SerialComm::new());
        let domain =
            DomainControl::new_unit_square(comm, ShapeType::Simplex2, 1, 3).unwrap();
        let stock = MatrixStock::assemble_poisson(&domain).unwrap();
        assert_eq!(stock.num_levels(), 3);
        assert!(stock.levels[0].transfer.is_some());
        assert!(stock.levels[2].transfer.is_none());
        // Filtered boundary rows are unit rows.
        let filter = &stock.levels[0].filter;
        let m = &stock.levels[0].matrix;
        let (i, _) = filter.entries()[0];
        assert_eq!(m.get(i, i), 1.0);
    }
}
