//! Schur-complement block preconditioner

use std::sync::Arc;

use crate::containers::{LinOp, VectorOps};
use crate::error::{FemError, FemResult};
use crate::meta::TupleVector;
use crate::scalar::DataType;
use crate::solver::{Solver, SolverBox, SolverStatus};

/// Which triangular couplings of the block factorisation are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchurVariant {
    Diagonal,
    Lower,
    Upper,
    Full,
}

impl std::str::FromStr for SchurVariant {
    type Err = FemError;

    fn from_str(s: &str) -> FemResult<Self> {
        match s {
            "diagonal" | "diag" => Ok(SchurVariant::Diagonal),
            "lower" => Ok(SchurVariant::Lower),
            "upper" => Ok(SchurVariant::Upper),
            "full" => Ok(SchurVariant::Full),
            other => Err(FemError::InvalidArgument(format!(
                "unknown schur variant '{other}'"
            ))),
        }
    }
}

/// Block preconditioner for the saddle-point layout `[A B; D 0]`.
///
/// The inner `A` and Schur-approximation solves are solver handles, so
/// either can be an inner Krylov or multigrid iteration.
pub struct SchurPrecon<U, P>
where
    U: VectorOps,
    P: VectorOps<Scalar = U::Scalar>,
{
    block_b: Arc<dyn LinOp<P, U>>,
    block_d: Arc<dyn LinOp<U, P>>,
    solver_a: SolverBox<U>,
    solver_s: SolverBox<P>,
    variant: SchurVariant,
}

impl<U, P> SchurPrecon<U, P>
where
    U: VectorOps + Send + Sync,
    P: VectorOps<Scalar = U::Scalar> + Send + Sync,
{
    pub fn new(
        block_b: Arc<dyn LinOp<P, U>>,
        block_d: Arc<dyn LinOp<U, P>>,
        solver_a: SolverBox<U>,
        solver_s: SolverBox<P>,
        variant: SchurVariant,
    ) -> Self {
        Self {
            block_b,
            block_d,
            solver_a,
            solver_s,
            variant,
        }
    }

    fn solve_a(&mut self, u: &mut U, rhs: &U) -> FemResult<()> {
        u.format(U::Scalar::of(0.0));
        self.solver_a.apply(u, rhs)?;
        Ok(())
    }

    fn solve_s(&mut self, p: &mut P, rhs: &P) -> FemResult<()> {
        p.format(P::Scalar::of(0.0));
        self.solver_s.apply(p, rhs)?;
        Ok(())
    }
}

impl<U, P> Solver<TupleVector<U, P>> for SchurPrecon<U, P>
where
    U: VectorOps + Send + Sync,
    P: VectorOps<Scalar = U::Scalar> + Send + Sync,
{
    fn name(&self) -> &str {
        "SchurPrecon"
    }

    fn init(&mut self) -> FemResult<()> {
        self.solver_a.init()?;
        self.solver_s.init()
    }

    fn apply(
        &mut self,
        cor: &mut TupleVector<U, P>,
        def: &TupleVector<U, P>,
    ) -> FemResult<SolverStatus> {
        match self.variant {
            SchurVariant::Diagonal => {
                self.solve_a(&mut cor.first, &def.first)?;
                self.solve_s(&mut cor.second, &def.second)?;
            }
            SchurVariant::Lower => {
                self.solve_a(&mut cor.first, &def.first)?;
                // r_p - D*u
                let mut rp = def.second.clone_layout();
                self.block_d
                    .apply_scaled_sum(&mut rp, &cor.first, &def.second, U::Scalar::of(-1.0))?;
                self.solve_s(&mut cor.second, &rp)?;
            }
            SchurVariant::Upper => {
                self.solve_s(&mut cor.second, &def.second)?;
                // r_u - B*p
                let mut ru = def.first.clone_layout();
                self.block_b
                    .apply_scaled_sum(&mut ru, &cor.second, &def.first, U::Scalar::of(-1.0))?;
                self.solve_a(&mut cor.first, &ru)?;
            }
            SchurVariant::Full => {
                self.solve_a(&mut cor.first, &def.first)?;
                let mut rp = def.second.clone_layout();
                self.block_d
                    .apply_scaled_sum(&mut rp, &cor.first, &def.second, U::Scalar::of(-1.0))?;
                self.solve_s(&mut cor.second, &rp)?;
                // u <- u + A^-1 * (-B*p)
                let mut bp = def.first.clone_layout();
                self.block_b.apply(&mut bp, &cor.second)?;
                let mut minus_bp = bp.clone_layout();
                minus_bp.scale(&bp, U::Scalar::of(-1.0))?;
                let mut du = def.first.clone_layout();
                self.solve_a(&mut du, &minus_bp)?;
                let old = cor.first.clone();
                cor.first.axpy(&du, &old, U::Scalar::of(1.0))?;
            }
        }
        Ok(SolverStatus::Success)
    }

    fn done(&mut self) {
        self.solver_a.done();
        self.solver_s.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{csr::CsrBuilder, DenseVector, SparseMatrixCsr};
    use crate::filter::NoneFilter;
    use crate::meta::SaddlePointMatrix;
    use crate::solver::{Pcg, Pcr};

    type Csr = SparseMatrixCsr<f64, u64>;
    type Tv = TupleVector<DenseVector<f64>, DenseVector<f64>>;

    fn blocks() -> (Csr, Csr, Csr, Csr) {
        // A = diag(2, 3), B = [1; 1], D = B^T, S_hat = -D A^-1 B exactly.
        let mut a = CsrBuilder::new(2, 2);
        a.add(0, 0, 2.0);
        a.add(1, 1, 3.0);
        let mut b = CsrBuilder::new(2, 1);
        b.add(0, 0, 1.0);
        b.add(1, 0, 1.0);
        let mut d = CsrBuilder::new(1, 2);
        d.add(0, 0, 1.0);
        d.add(0, 1, 1.0);
        // S = -(1/2 + 1/3)
        let mut s = CsrBuilder::new(1, 1);
        s.add(0, 0, -(0.5 + 1.0 / 3.0));
        (a.build(), b.build(), d.build(), s.build())
    }

    fn exact_solver(m: Arc<Csr>) -> SolverBox<DenseVector<f64>> {
        let mut pcg = Pcg::new(m, Arc::new(NoneFilter), None);
        pcg.params.set_tol_rel(1e-14).set_max_iter(50);
        Box::new(pcg)
    }

    /// With exact inner solves the preconditioned saddle-point system is
    /// solved by PCR in at most 2 iterations.
    #[test]
    fn test_full_schur_two_pcr_iterations() {
        let (a, b, d, s) = blocks();
        let (a, b, d, s) = (Arc::new(a), Arc::new(b), Arc::new(d), Arc::new(s));
        let system = Arc::new(SaddlePointMatrix::new(
            a.as_ref().clone(),
            b.as_ref().clone(),
            d.as_ref().clone(),
        ));

        // PCG would reject the indefinite Schur block, so the inner
        // pressure solve uses PCR as well.
        let mut s_solver = Pcr::new(s, Arc::new(NoneFilter), None);
        s_solver.params.set_tol_rel(1e-14).set_max_iter(50);

        let precon = SchurPrecon::new(
            b,
            d,
            exact_solver(a),
            Box::new(s_solver),
            SchurVariant::Full,
        );

        let mut outer: Pcr<Tv> = Pcr::new(system, Arc::new(NoneFilter), Some(Box::new(precon)));
        outer.params.set_tol_rel(1e-10).set_max_iter(2);

        let rhs = TupleVector::new(
            DenseVector::from_vec(vec![1.0, 2.0]),
            DenseVector::from_vec(vec![0.5]),
        );
        let mut x = rhs.clone_layout();
        let status = outer.apply(&mut x, &rhs).unwrap();
        assert_eq!(status, SolverStatus::Success);
    }
}
