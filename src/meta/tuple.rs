//! Heterogeneous tuple vector and block-diagonal tuple matrix

use crate::containers::{LinOp, VectorOps};
use crate::error::{check_sizes, FemResult};

/// Two differently-typed sub-vectors over the same scalar, e.g. the
/// velocity/pressure pair of a saddle-point system.
#[derive(Debug, Clone)]
pub struct TupleVector<A, B>
where
    A: VectorOps,
    B: VectorOps<Scalar = A::Scalar>,
{
    pub first: A,
    pub second: B,
}

impl<A, B> TupleVector<A, B>
where
    A: VectorOps,
    B: VectorOps<Scalar = A::Scalar>,
{
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    /// Routes a flat index into the first or second block.
    pub fn route(&self, index: usize) -> Option<(usize, usize)> {
        if index < self.first.size() {
            Some((0, index))
        } else if index < self.size() {
            Some((1, index - self.first.size()))
        } else {
            None
        }
    }
}

impl<A, B> VectorOps for TupleVector<A, B>
where
    A: VectorOps,
    B: VectorOps<Scalar = A::Scalar>,
{
    type Scalar = A::Scalar;

    fn size(&self) -> usize {
        self.first.size() + self.second.size()
    }

    fn clone_layout(&self) -> Self {
        Self {
            first: self.first.clone_layout(),
            second: self.second.clone_layout(),
        }
    }

    fn format(&mut self, alpha: Self::Scalar) {
        self.first.format(alpha);
        self.second.format(alpha);
    }

    fn copy_from(&mut self, x: &Self) -> FemResult<()> {
        check_sizes(self.size(), x.size())?;
        self.first.copy_from(&x.first)?;
        self.second.copy_from(&x.second)
    }

    fn axpy(&mut self, x: &Self, y: &Self, alpha: Self::Scalar) -> FemResult<()> {
        self.first.axpy(&x.first, &y.first, alpha)?;
        self.second.axpy(&x.second, &y.second, alpha)
    }

    fn scale(&mut self, x: &Self, alpha: Self::Scalar) -> FemResult<()> {
        self.first.scale(&x.first, alpha)?;
        self.second.scale(&x.second, alpha)
    }

    fn component_product(&mut self, x: &Self, y: &Self) -> FemResult<()> {
        self.first.component_product(&x.first, &y.first)?;
        self.second.component_product(&x.second, &y.second)
    }

    fn component_invert(&mut self, x: &Self, alpha: Self::Scalar) -> FemResult<()> {
        self.first.component_invert(&x.first, alpha)?;
        self.second.component_invert(&x.second, alpha)
    }

    fn dot(&self, x: &Self) -> FemResult<Self::Scalar> {
        Ok(self.first.dot(&x.first)? + self.second.dot(&x.second)?)
    }

    fn triple_dot(&self, x: &Self, y: &Self) -> FemResult<Self::Scalar> {
        Ok(self.first.triple_dot(&x.first, &y.first)?
            + self.second.triple_dot(&x.second, &y.second)?)
    }

    fn norm2sqr(&self) -> Self::Scalar {
        self.first.norm2sqr() + self.second.norm2sqr()
    }

    fn max_abs_element(&self) -> Self::Scalar {
        let a = self.first.max_abs_element();
        let b = self.second.max_abs_element();
        if a > b {
            a
        } else {
            b
        }
    }
}

/// Direct sum of two operators, the block-diagonal tuple matrix.
#[derive(Debug, Clone)]
pub struct TupleDiagMatrix<MA, MB> {
    pub first: MA,
    pub second: MB,
}

impl<MA, MB> TupleDiagMatrix<MA, MB> {
    pub fn new(first: MA, second: MB) -> Self {
        Self { first, second }
    }
}

impl<A, B, MA, MB> LinOp<TupleVector<A, B>> for TupleDiagMatrix<MA, MB>
where
    A: VectorOps + Send + Sync,
    B: VectorOps<Scalar = A::Scalar> + Send + Sync,
    MA: LinOp<A>,
    MB: LinOp<B>,
{
    fn apply(&self, r: &mut TupleVector<A, B>, x: &TupleVector<A, B>) -> FemResult<()> {
        self.first.apply(&mut r.first, &x.first)?;
        self.second.apply(&mut r.second, &x.second)
    }

    fn apply_scaled_sum(
        &self,
        r: &mut TupleVector<A, B>,
        x: &TupleVector<A, B>,
        y: &TupleVector<A, B>,
        alpha: A::Scalar,
    ) -> FemResult<()> {
        self.first
            .apply_scaled_sum(&mut r.first, &x.first, &y.first, alpha)?;
        self.second
            .apply_scaled_sum(&mut r.second, &x.second, &y.second, alpha)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{csr::CsrBuilder, DenseVector, SparseMatrixCsr};
    use approx::assert_relative_eq;

    #[test]
    fn test_tuple_ops() {
        let t = TupleVector::new(
            DenseVector::from_vec(vec![3.0, 4.0]),
            DenseVector::from_vec(vec![12.0]),
        );
        assert_eq!(t.size(), 3);
        assert_relative_eq!(t.norm2(), 13.0);
        assert_eq!(t.route(2), Some((1, 0)));
    }

    #[test]
    fn test_diag_matrix_direct_sum() {
        let mut ba = CsrBuilder::new(1, 1);
        ba.add(0, 0, 2.0);
        let a: SparseMatrixCsr<f64, u64> = ba.build();
        let mut bb = CsrBuilder::new(1, 1);
        bb.add(0, 0, 3.0);
        let b: SparseMatrixCsr<f64, u64> = bb.build();

        let m = TupleDiagMatrix::new(a, b);
        let x = TupleVector::new(
            DenseVector::from_vec(vec![1.0]),
            DenseVector::from_vec(vec![1.0]),
        );
        let mut r = x.clone_layout();
        m.apply(&mut r, &x).unwrap();
        assert_relative_eq!(r.first.at(0), 2.0);
        assert_relative_eq!(r.second.at(0), 3.0);
    }
}
