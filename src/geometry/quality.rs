//! Mesh quality heuristics

use serde::{Deserialize, Serialize};

use crate::geometry::{ConformalMesh, ShapeType};

/// Aggregate quality measures of a mesh.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityStats {
    /// Smallest interior angle over all cells, in degrees.
    pub min_angle: f64,
    /// Worst shape quality in `[0, 1]`; 1 is the regular cell.
    pub min_quality: f64,
    /// `sum_K |vol(K)/vol_total - lambda_K|` against the uniform
    /// distribution.
    pub cell_size_defect: f64,
}

/// Smallest interior angle of the mesh in degrees.
pub fn min_angle(mesh: &ConformalMesh) -> f64 {
    let mut min = 180.0_f64;
    for c in 0..mesh.num_cells() {
        min = min.min(cell_min_angle(mesh, c));
    }
    min
}

fn cell_min_angle(mesh: &ConformalMesh, c: usize) -> f64 {
    let v = mesh.cell(c);
    let corners: Vec<nalgebra::Vector2<f64>> = v.iter().map(|&i| mesh.vertex(i)).collect();
    // Corner neighbour table; quads use the lexicographic ordering.
    let pairs: &[(usize, usize, usize)] = match mesh.shape() {
        ShapeType::Simplex2 => &[(0, 1, 2), (1, 2, 0), (2, 0, 1)],
        ShapeType::Hypercube2 => &[(0, 1, 2), (1, 3, 0), (3, 2, 1), (2, 0, 3)],
    };
    let mut min = 180.0_f64;
    for &(at, a, b) in pairs {
        let u = corners[a] - corners[at];
        let w = corners[b] - corners[at];
        let nu = u.norm();
        let nw = w.norm();
        if nu == 0.0 || nw == 0.0 {
            return 0.0;
        }
        let cos = (u.dot(&w) / (nu * nw)).clamp(-1.0, 1.0);
        min = min.min(cos.acos().to_degrees());
    }
    min
}

/// Shape quality of one cell in `[0, 1]`.
///
/// Triangles use the normalised radius ratio `4*sqrt(3)*A / sum(l^2)`,
/// quadrilaterals the worst of their four corner triangles.
pub fn cell_quality(mesh: &ConformalMesh, c: usize) -> f64 {
    let v = mesh.cell(c);
    match mesh.shape() {
        ShapeType::Simplex2 => {
            tri_quality(mesh.vertex(v[0]), mesh.vertex(v[1]), mesh.vertex(v[2]))
        }
        ShapeType::Hypercube2 => {
            let p = [
                mesh.vertex(v[0]),
                mesh.vertex(v[1]),
                mesh.vertex(v[3]),
                mesh.vertex(v[2]),
            ];
            let mut q: f64 = 1.0;
            for k in 0..4 {
                q = q.min(tri_quality(p[k], p[(k + 1) % 4], p[(k + 3) % 4]));
            }
            // Rescale so the unit square scores one.
            (q * 2.0 / (4.0 * 3.0_f64.sqrt() / (1.0 + 1.0 + 2.0))).min(1.0)
        }
    }
}

fn tri_quality(
    a: nalgebra::Vector2<f64>,
    b: nalgebra::Vector2<f64>,
    c: nalgebra::Vector2<f64>,
) -> f64 {
    let area = super::mesh::tri_area(a, b, c);
    let l2 = (b - a).norm_squared() + (c - b).norm_squared() + (a - c).norm_squared();
    if l2 == 0.0 {
        return 0.0;
    }
    (4.0 * 3.0_f64.sqrt() * area / l2).max(0.0)
}

/// Worst shape quality over all cells.
pub fn min_quality(mesh: &ConformalMesh) -> f64 {
    (0..mesh.num_cells())
        .map(|c| cell_quality(mesh, c))
        .fold(1.0, f64::min)
}

/// Cell-size defect against a target distribution; `lambda` must sum to
/// one, `None` means uniform.
pub fn cell_size_defect(mesh: &ConformalMesh, lambda: Option<&[f64]>) -> f64 {
    let total = mesh.total_area();
    let n = mesh.num_cells();
    let uniform = 1.0 / n as f64;
    (0..n)
        .map(|c| {
            let target = lambda.map_or(uniform, |l| l[c]);
            (mesh.cell_area(c) / total - target).abs()
        })
        .sum()
}

/// Collects all quality measures in one sweep.
pub fn stats(mesh: &ConformalMesh, lambda: Option<&[f64]>) -> QualityStats {
    QualityStats {
        min_angle: min_angle(mesh),
        min_quality: min_quality(mesh),
        cell_size_defect: cell_size_defect(mesh, lambda),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_right_triangle_mesh_angles() {
        let mesh = ConformalMesh::unit_square_tri();
        assert_relative_eq!(min_angle(&mesh), 45.0, epsilon = 1e-12);
    }

    #[test]
    fn test_unit_square_quality() {
        let mesh = ConformalMesh::unit_square_quad();
        assert_relative_eq!(cell_quality(&mesh, 0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(min_angle(&mesh), 90.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_mesh_size_defect() {
        let mesh = ConformalMesh::unit_square_tri().refine();
        assert_relative_eq!(cell_size_defect(&mesh, None), 0.0, epsilon = 1e-14);
    }
}
