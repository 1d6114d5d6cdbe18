//! Two-level grid transfer operators

use std::sync::Arc;

use crate::comm::Comm;
use crate::containers::{DenseVector, LinOp, SparseMatrixCsr, VectorOps};
use crate::error::FemResult;
use crate::global::{Gate, GlobalVector};
use crate::scalar::{DataType, IndexType};

/// Prolongation/restriction between two consecutive levels.
///
/// Object safe so a solver tree can hold transfers behind `dyn`.
pub trait TransferOps<V>: Send + Sync {
    /// `fine = P * coarse`
    fn prolong(&self, fine: &mut V, coarse: &V) -> FemResult<()>;

    /// `coarse = R * fine`
    fn restrict(&self, coarse: &mut V, fine: &V) -> FemResult<()>;
}

/// Matrix pair `(P, R = P^T)`; the restriction is a physical transpose,
/// not a logical view.
pub struct TransferOperator<DT: DataType = f64, IT: IndexType = u64> {
    prolongation: SparseMatrixCsr<DT, IT>,
    restriction: SparseMatrixCsr<DT, IT>,
}

impl<DT: DataType, IT: IndexType> TransferOperator<DT, IT> {
    /// Builds the pair from an assembled prolongation matrix.
    pub fn from_prolongation(prolongation: SparseMatrixCsr<DT, IT>) -> Self {
        let restriction = prolongation.transpose();
        Self {
            prolongation,
            restriction,
        }
    }

    /// Rescales the prolongation rows with the inverse of the (already
    /// synchronised) weight vector and rebuilds the restriction.
    pub fn rescale_rows(&mut self, weights: &DenseVector<DT>) -> FemResult<()> {
        let mut inv = weights.clone_layout();
        inv.component_invert(weights, DT::of(1.0))?;
        self.prolongation.scale_rows(&inv)?;
        self.restriction = self.prolongation.transpose();
        Ok(())
    }

    pub fn prolongation(&self) -> &SparseMatrixCsr<DT, IT> {
        &self.prolongation
    }

    pub fn restriction(&self) -> &SparseMatrixCsr<DT, IT> {
        &self.restriction
    }
}

impl<DT: DataType, IT: IndexType> TransferOps<DenseVector<DT>> for TransferOperator<DT, IT> {
    fn prolong(&self, fine: &mut DenseVector<DT>, coarse: &DenseVector<DT>) -> FemResult<()> {
        self.prolongation.apply(fine, coarse)
    }

    fn restrict(&self, coarse: &mut DenseVector<DT>, fine: &DenseVector<DT>) -> FemResult<()> {
        self.restriction.apply(coarse, fine)
    }
}

/// Distributed two-level transfer: the local operator runs rank-wise,
/// the restricted defect is re-summed through the coarse gate.
///
/// `restrict` expects an accumulated (type-0) fine vector, i.e. each
/// rank carries its share of the interface dofs; the coarse-gate sum
/// then yields the consistent restricted result.
pub struct GlobalTransfer<DT: DataType, IT: IndexType, C: Comm> {
    local: TransferOperator<DT, IT>,
    coarse_gate: Arc<Gate<C>>,
}

impl<DT: DataType, IT: IndexType, C: Comm> GlobalTransfer<DT, IT, C> {
    pub fn new(local: TransferOperator<DT, IT>, coarse_gate: Arc<Gate<C>>) -> Self {
        Self { local, coarse_gate }
    }

    pub fn local(&self) -> &TransferOperator<DT, IT> {
        &self.local
    }

    pub fn coarse_gate(&self) -> &Arc<Gate<C>> {
        &self.coarse_gate
    }
}

impl<DT: DataType, IT: IndexType, C: Comm> TransferOps<GlobalVector<DenseVector<DT>, C>>
    for GlobalTransfer<DT, IT, C>
{
    fn prolong(
        &self,
        fine: &mut GlobalVector<DenseVector<DT>, C>,
        coarse: &GlobalVector<DenseVector<DT>, C>,
    ) -> FemResult<()> {
        self.local.prolong(fine.local_mut(), coarse.local())
    }

    fn restrict(
        &self,
        coarse: &mut GlobalVector<DenseVector<DT>, C>,
        fine: &GlobalVector<DenseVector<DT>, C>,
    ) -> FemResult<()> {
        self.local.restrict(coarse.local_mut(), fine.local())?;
        self.coarse_gate.sync_0(coarse.local_mut())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::csr::CsrBuilder;
    use approx::assert_relative_eq;

    /// Linear interpolation from 3 coarse dofs to 5 fine dofs on a 1-D
    /// grid.
    fn interp_1d() -> TransferOperator<f64, u64> {
        let mut b = CsrBuilder::new(5, 3);
        b.add(0, 0, 1.0);
        b.add(1, 0, 0.5);
        b.add(1, 1, 0.5);
        b.add(2, 1, 1.0);
        b.add(3, 1, 0.5);
        b.add(3, 2, 0.5);
        b.add(4, 2, 1.0);
        TransferOperator::from_prolongation(b.build())
    }

    #[test]
    fn test_transpose_identity() {
        let t = interp_1d();
        let ptt = t.restriction().transpose();
        assert_eq!(ptt.row_ptr(), t.prolongation().row_ptr());
        assert_eq!(ptt.col_idx(), t.prolongation().col_idx());
        for (a, b) in ptt.values().iter().zip(t.prolongation().values()) {
            assert_relative_eq!(a, b);
        }
    }

    #[test]
    fn test_constant_preservation() {
        let t = interp_1d();
        let coarse = DenseVector::constant(3, 2.5);
        let mut fine = DenseVector::new(5);
        t.prolong(&mut fine, &coarse).unwrap();
        for i in 0..5 {
            assert_relative_eq!(fine.at(i), 2.5, epsilon = 1e-14);
        }
    }

    #[test]
    fn test_weight_rescaling_restores_constants() {
        // A raw projection whose rows sum to the weight vector; after
        // rescaling, prolongation preserves constants.
        let mut b = CsrBuilder::new(3, 2);
        b.add(0, 0, 2.0);
        b.add(1, 0, 1.0);
        b.add(1, 1, 3.0);
        b.add(2, 1, 0.5);
        let mut t = TransferOperator::from_prolongation(b.build());
        let weights = DenseVector::from_vec(vec![2.0, 4.0, 0.5]);
        t.rescale_rows(&weights).unwrap();

        let coarse = DenseVector::constant(2, 1.0);
        let mut fine = DenseVector::new(3);
        t.prolong(&mut fine, &coarse).unwrap();
        for i in 0..3 {
            assert_relative_eq!(fine.at(i), 1.0, epsilon = 1e-14);
        }
    }
}
