//! Saddle-point block matrix

use crate::containers::{LinOp, VectorOps};
use crate::error::FemResult;
use crate::meta::TupleVector;
use crate::scalar::DataType;

/// Logical block layout `[A B; D 0]`.
///
/// A reference composition of the three sub-matrices, not a physical
/// concatenation; applying it dispatches block-wise:
/// `r_u = A*u + B*p`, `r_p = D*u`.
#[derive(Debug, Clone)]
pub struct SaddlePointMatrix<MA, MB, MD> {
    pub block_a: MA,
    pub block_b: MB,
    pub block_d: MD,
}

impl<MA, MB, MD> SaddlePointMatrix<MA, MB, MD> {
    pub fn new(block_a: MA, block_b: MB, block_d: MD) -> Self {
        Self {
            block_a,
            block_b,
            block_d,
        }
    }
}

impl<U, P, MA, MB, MD> LinOp<TupleVector<U, P>> for SaddlePointMatrix<MA, MB, MD>
where
    U: VectorOps + Send + Sync,
    P: VectorOps<Scalar = U::Scalar> + Send + Sync,
    MA: LinOp<U>,
    MB: LinOp<P, U>,
    MD: LinOp<U, P>,
{
    fn apply(&self, r: &mut TupleVector<U, P>, x: &TupleVector<U, P>) -> FemResult<()> {
        // r_u = A*u, then add B*p through a scratch vector.
        self.block_a.apply(&mut r.first, &x.first)?;
        let mut bp = r.first.clone_layout();
        self.block_b.apply(&mut bp, &x.second)?;
        let ru = r.first.clone();
        r.first.axpy(&bp, &ru, U::Scalar::of(1.0))?;
        // r_p = D*u
        self.block_d.apply(&mut r.second, &x.first)
    }

    fn apply_scaled_sum(
        &self,
        r: &mut TupleVector<U, P>,
        x: &TupleVector<U, P>,
        y: &TupleVector<U, P>,
        alpha: U::Scalar,
    ) -> FemResult<()> {
        let mut ax = r.clone_layout();
        self.apply(&mut ax, x)?;
        r.axpy(&ax, y, alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{csr::CsrBuilder, DenseVector, SparseMatrixCsr};
    use approx::assert_relative_eq;

    /// A = 2I (2x2), B = [1; 1], D = [1 1].
    fn small_saddle() -> SaddlePointMatrix<
        SparseMatrixCsr<f64, u64>,
        SparseMatrixCsr<f64, u64>,
        SparseMatrixCsr<f64, u64>,
    > {
        let mut a = CsrBuilder::new(2, 2);
        a.add(0, 0, 2.0);
        a.add(1, 1, 2.0);
        let mut b = CsrBuilder::new(2, 1);
        b.add(0, 0, 1.0);
        b.add(1, 0, 1.0);
        let mut d = CsrBuilder::new(1, 2);
        d.add(0, 0, 1.0);
        d.add(0, 1, 1.0);
        SaddlePointMatrix::new(a.build(), b.build(), d.build())
    }

    #[test]
    fn test_block_apply() {
        let m = small_saddle();
        let x = TupleVector::new(
            DenseVector::from_vec(vec![1.0, 2.0]),
            DenseVector::from_vec(vec![3.0]),
        );
        let mut r = x.clone_layout();
        m.apply(&mut r, &x).unwrap();
        assert_relative_eq!(r.first.at(0), 2.0 + 3.0);
        assert_relative_eq!(r.first.at(1), 4.0 + 3.0);
        assert_relative_eq!(r.second.at(0), 3.0);
    }
}
