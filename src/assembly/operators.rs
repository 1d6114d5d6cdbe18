//! Operator assembly

use crate::assembly::cubature::CubatureRule;
use crate::assembly::space::{cell_jacobian, eval_basis};
use crate::containers::{csr::CsrBuilder, DenseVector, SparseMatrixCsr};
use crate::error::{FemError, FemResult};
use crate::geometry::ConformalMesh;

/// Assembles the Lagrange-1 stiffness matrix of the Laplace operator.
pub fn assemble_laplace(
    mesh: &ConformalMesh,
    rule: &CubatureRule,
) -> FemResult<SparseMatrixCsr<f64, u64>> {
    let n = mesh.num_vertices();
    let mut builder = CsrBuilder::new(n, n);

    for c in 0..mesh.num_cells() {
        let dofs = mesh.cell(c);
        for (p, &w) in rule.points.iter().zip(&rule.weights) {
            let basis = eval_basis(mesh.shape(), *p);
            let jac = cell_jacobian(mesh, c, *p);
            let det = jac.determinant();
            if det <= 0.0 {
                return Err(FemError::InvalidArgument(format!(
                    "cell {c} has non-positive Jacobian"
                )));
            }
            let inv_t = jac
                .try_inverse()
                .ok_or_else(|| FemError::Internal(format!("singular Jacobian in cell {c}")))?
                .transpose();
            // Physical gradients.
            let grads: Vec<nalgebra::Vector2<f64>> = (0..basis.count)
                .map(|a| inv_t * basis.ref_grads[a])
                .collect();
            for i in 0..basis.count {
                for j in 0..basis.count {
                    builder.add(dofs[i], dofs[j], w * det * grads[i].dot(&grads[j]));
                }
            }
        }
    }
    Ok(builder.build())
}

/// Assembles the lumped Lagrange-1 mass vector, `m_i = int phi_i`.
pub fn assemble_lumped_mass(
    mesh: &ConformalMesh,
    rule: &CubatureRule,
) -> FemResult<DenseVector<f64>> {
    let mut mass = DenseVector::new(mesh.num_vertices());
    for c in 0..mesh.num_cells() {
        let dofs = mesh.cell(c);
        for (p, &w) in rule.points.iter().zip(&rule.weights) {
            let basis = eval_basis(mesh.shape(), *p);
            let det = cell_jacobian(mesh, c, *p).determinant();
            for i in 0..basis.count {
                let v = mass.at(dofs[i]) + w * det * basis.values[i];
                mass.set(dofs[i], v);
            }
        }
    }
    Ok(mass)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::{LinOp, VectorOps};
    use crate::geometry::ShapeType;
    use approx::assert_relative_eq;

    #[test]
    fn test_laplace_annihilates_constants() {
        for mesh in [
            ConformalMesh::unit_square_tri().refine(),
            ConformalMesh::unit_square_quad().refine(),
        ] {
            let rule = CubatureRule::default_rule(mesh.shape());
            let a = assemble_laplace(&mesh, &rule).unwrap();
            let ones = DenseVector::constant(mesh.num_vertices(), 1.0);
            let mut r = a.create_vector_l();
            a.apply(&mut r, &ones).unwrap();
            assert!(r.norm2() < 1e-13, "norm {}", r.norm2());
        }
    }

    #[test]
    fn test_lumped_mass_sums_to_area() {
        let mesh = ConformalMesh::unit_square_tri().refine().refine();
        let rule = CubatureRule::default_rule(ShapeType::Simplex2);
        let mass = assemble_lumped_mass(&mesh, &rule).unwrap();
        let total: f64 = mass.elements().iter().sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-13);
    }
}
