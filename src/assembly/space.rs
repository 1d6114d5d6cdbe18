//! Lagrange-1 basis evaluation
//!
//! P1 on triangles and Q1 on quadrilaterals, with vertex dofs. This is
//! the toolkit-side half of the assembly contract; richer spaces live
//! with the external assembly collaborators.

use nalgebra::{Matrix2, Vector2};

use crate::geometry::{ConformalMesh, ShapeType};

/// Basis values and reference gradients at one reference point, for up
/// to four local dofs.
pub struct BasisEval {
    pub count: usize,
    pub values: [f64; 4],
    pub ref_grads: [Vector2<f64>; 4],
}

/// Evaluates the Lagrange-1 basis on the reference cell.
pub fn eval_basis(shape: ShapeType, p: Vector2<f64>) -> BasisEval {
    match shape {
        ShapeType::Simplex2 => BasisEval {
            count: 3,
            values: [1.0 - p.x - p.y, p.x, p.y, 0.0],
            ref_grads: [
                Vector2::new(-1.0, -1.0),
                Vector2::new(1.0, 0.0),
                Vector2::new(0.0, 1.0),
                Vector2::zeros(),
            ],
        },
        ShapeType::Hypercube2 => {
            let (x, y) = (p.x, p.y);
            BasisEval {
                count: 4,
                values: [
                    (1.0 - x) * (1.0 - y),
                    x * (1.0 - y),
                    (1.0 - x) * y,
                    x * y,
                ],
                ref_grads: [
                    Vector2::new(-(1.0 - y), -(1.0 - x)),
                    Vector2::new(1.0 - y, -x),
                    Vector2::new(-y, 1.0 - x),
                    Vector2::new(y, x),
                ],
            }
        }
    }
}

/// Jacobian of the cell mapping at a reference point.
pub fn cell_jacobian(mesh: &ConformalMesh, cell: usize, p: Vector2<f64>) -> Matrix2<f64> {
    let basis = eval_basis(mesh.shape(), p);
    let verts = mesh.cell(cell);
    let mut jac = Matrix2::zeros();
    for (a, &v) in verts.iter().enumerate().take(basis.count) {
        let x = mesh.vertex(v);
        let g = basis.ref_grads[a];
        jac[(0, 0)] += x.x * g.x;
        jac[(0, 1)] += x.x * g.y;
        jac[(1, 0)] += x.y * g.x;
        jac[(1, 1)] += x.y * g.y;
    }
    jac
}

/// Physical position of a reference point in a cell.
pub fn cell_map(mesh: &ConformalMesh, cell: usize, p: Vector2<f64>) -> Vector2<f64> {
    let basis = eval_basis(mesh.shape(), p);
    let verts = mesh.cell(cell);
    let mut x = Vector2::zeros();
    for (a, &v) in verts.iter().enumerate().take(basis.count) {
        x += mesh.vertex(v) * basis.values[a];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_partition_of_unity() {
        for shape in [ShapeType::Simplex2, ShapeType::Hypercube2] {
            let b = eval_basis(shape, Vector2::new(0.3, 0.2));
            let sum: f64 = b.values[..b.count].iter().sum();
            assert_relative_eq!(sum, 1.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn test_jacobian_of_unit_cells() {
        let tri = ConformalMesh::unit_square_tri();
        let j = cell_jacobian(&tri, 0, Vector2::new(0.25, 0.25));
        assert_relative_eq!(j.determinant(), 1.0, epsilon = 1e-14);

        let quad = ConformalMesh::unit_square_quad();
        let j = cell_jacobian(&quad, 0, Vector2::new(0.5, 0.5));
        assert_relative_eq!(j.determinant(), 1.0, epsilon = 1e-14);
    }
}
