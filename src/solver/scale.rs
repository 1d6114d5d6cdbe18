//! Scaling preconditioners

use crate::containers::{DenseVector, VectorOps};
use crate::error::FemResult;
use crate::scalar::DataType;
use crate::solver::{Solver, SolverStatus};

/// Constant scaling, `cor = omega * def`.
pub struct ScalePrecon<V: VectorOps> {
    omega: V::Scalar,
}

impl<V: VectorOps> ScalePrecon<V> {
    pub fn new(omega: V::Scalar) -> Self {
        Self { omega }
    }
}

impl<V: VectorOps + Send> Solver<V> for ScalePrecon<V> {
    fn name(&self) -> &str {
        "Scale"
    }

    fn apply(&mut self, cor: &mut V, def: &V) -> FemResult<SolverStatus> {
        cor.scale(def, self.omega)?;
        Ok(SolverStatus::Success)
    }
}

/// Diagonal scaling with an externally supplied vector,
/// `cor[i] = omega * d[i] * def[i]`.
///
/// Covers lumped-mass and other user-defined diagonal approximations
/// where the plain Jacobi diagonal is not the right weight.
pub struct ScaleDiagPrecon<DT: DataType> {
    diag: DenseVector<DT>,
    omega: DT,
}

impl<DT: DataType> ScaleDiagPrecon<DT> {
    pub fn new(diag: DenseVector<DT>, omega: DT) -> Self {
        Self { diag, omega }
    }
}

impl<DT: DataType> Solver<DenseVector<DT>> for ScaleDiagPrecon<DT> {
    fn name(&self) -> &str {
        "ScaleDiag"
    }

    fn apply(&mut self, cor: &mut DenseVector<DT>, def: &DenseVector<DT>) -> FemResult<SolverStatus> {
        cor.component_product(&self.diag, def)?;
        if self.omega != DT::of(1.0) {
            let tmp = cor.clone();
            cor.scale(&tmp, self.omega)?;
        }
        Ok(SolverStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_scale() {
        let mut p = ScalePrecon::<DenseVector<f64>>::new(0.5);
        let def = DenseVector::from_vec(vec![2.0, 4.0]);
        let mut cor = DenseVector::new(2);
        p.apply(&mut cor, &def).unwrap();
        assert_relative_eq!(cor.at(1), 2.0);
    }

    #[test]
    fn test_scale_diag() {
        let diag = DenseVector::from_vec(vec![1.0, 0.5]);
        let mut p = ScaleDiagPrecon::new(diag, 2.0);
        let def = DenseVector::from_vec(vec![3.0, 4.0]);
        let mut cor = DenseVector::new(2);
        p.apply(&mut cor, &def).unwrap();
        assert_relative_eq!(cor.at(0), 6.0);
        assert_relative_eq!(cor.at(1), 4.0);
    }
}
