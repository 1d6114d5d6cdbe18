//! Two-level grid-transfer assembly

use nalgebra::Vector2;

use crate::assembly::cubature::CubatureRule;
use crate::assembly::space::{cell_jacobian, eval_basis};
use crate::containers::{csr::CsrBuilder, DenseVector};
use crate::error::{FemError, FemResult};
use crate::geometry::{ConformalMesh, ShapeType};
use crate::transfer::TransferOperator;

/// Maps a fine-cell reference point into the parent coarse cell's
/// reference coordinates; `child` is the fine cell index modulo four
/// under uniform refinement.
fn child_to_parent_ref(shape: ShapeType, child: usize, p: Vector2<f64>) -> Vector2<f64> {
    match shape {
        ShapeType::Simplex2 => match child {
            0 => Vector2::new(0.5 * p.x, 0.5 * p.y),
            1 => Vector2::new(0.5 + 0.5 * p.x, 0.5 * p.y),
            2 => Vector2::new(0.5 * p.x, 0.5 + 0.5 * p.y),
            // Interior child spans the three edge midpoints.
            _ => Vector2::new(0.5 - 0.5 * p.y, 0.5 * p.x + 0.5 * p.y),
        },
        ShapeType::Hypercube2 => {
            let shift = Vector2::new((child & 1) as f64, ((child >> 1) & 1) as f64);
            (p + shift) * 0.5
        }
    }
}

/// Assembles the two-level prolongation by integrating products of fine
/// and parent coarse basis functions, returning the raw operator and the
/// fine-dof weight vector.
///
/// The weight vector must be gate-synchronised before
/// [`TransferOperator::rescale_rows`] in a distributed run; the serial
/// caller can feed it back unchanged.
pub fn assemble_grid_transfer(
    coarse: &ConformalMesh,
    fine: &ConformalMesh,
    rule: &CubatureRule,
) -> FemResult<(TransferOperator<f64, u64>, DenseVector<f64>)> {
    if fine.num_cells() != 4 * coarse.num_cells() {
        return Err(FemError::InvalidArgument(
            "fine mesh is not the uniform refinement of the coarse mesh".to_string(),
        ));
    }
    let shape = coarse.shape();
    let mut builder = CsrBuilder::new(fine.num_vertices(), coarse.num_vertices());
    let mut weights = DenseVector::new(fine.num_vertices());

    for fc in 0..fine.num_cells() {
        let parent = fc / 4;
        let child = fc % 4;
        let fine_dofs = fine.cell(fc);
        let coarse_dofs = coarse.cell(parent);

        for (p, &w) in rule.points.iter().zip(&rule.weights) {
            let fine_basis = eval_basis(shape, *p);
            let det = cell_jacobian(fine, fc, *p).determinant();
            let coarse_p = child_to_parent_ref(shape, child, *p);
            let coarse_basis = eval_basis(shape, coarse_p);

            for i in 0..fine_basis.count {
                let wi = w * det * fine_basis.values[i];
                weights.set(fine_dofs[i], weights.at(fine_dofs[i]) + wi);
                for j in 0..coarse_basis.count {
                    builder.add(fine_dofs[i], coarse_dofs[j], wi * coarse_basis.values[j]);
                }
            }
        }
    }
    Ok((TransferOperator::from_prolongation(builder.build()), weights))
}

/// Serial convenience: assembles and immediately weight-rescales.
pub fn assemble_transfer_rescaled(
    coarse: &ConformalMesh,
    fine: &ConformalMesh,
    rule: &CubatureRule,
) -> FemResult<TransferOperator<f64, u64>> {
    let (mut transfer, weights) = assemble_grid_transfer(coarse, fine, rule)?;
    transfer.rescale_rows(&weights)?;
    Ok(transfer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::VectorOps;
    use crate::transfer::TransferOps;
    use approx::assert_relative_eq;

    #[test]
    fn test_constant_preservation_after_rescale() {
        for coarse in [
            ConformalMesh::unit_square_tri().refine(),
            ConformalMesh::unit_square_quad().refine(),
        ] {
            let fine = coarse.refine();
            let rule = CubatureRule::default_rule(coarse.shape());
            let transfer = assemble_transfer_rescaled(&coarse, &fine, &rule).unwrap();

            let c = DenseVector::constant(coarse.num_vertices(), 3.25);
            let mut f = DenseVector::new(fine.num_vertices());
            transfer.prolong(&mut f, &c).unwrap();
            for i in 0..f.size() {
                assert_relative_eq!(f.at(i), 3.25, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_restriction_is_transpose() {
        let coarse = ConformalMesh::unit_square_tri();
        let fine = coarse.refine();
        let rule = CubatureRule::default_rule(coarse.shape());
        let transfer = assemble_transfer_rescaled(&coarse, &fine, &rule).unwrap();

        // <P c, f> == <c, R f> for random-ish vectors.
        let c = DenseVector::from_fn(coarse.num_vertices(), |i| (i as f64 * 0.7).sin());
        let f = DenseVector::from_fn(fine.num_vertices(), |i| (i as f64 * 0.3).cos());
        let mut pc = DenseVector::new(fine.num_vertices());
        transfer.prolong(&mut pc, &c).unwrap();
        let mut rf = DenseVector::new(coarse.num_vertices());
        transfer.restrict(&mut rf, &f).unwrap();
        assert_relative_eq!(
            pc.dot(&f).unwrap(),
            c.dot(&rf).unwrap(),
            epsilon = 1e-12
        );
    }
}
