//! Optimal-scale computation
//!
//! Every cell carries an optimal size `h` the Rumpf energy measures
//! against. The scale computation turns a target cell-size distribution
//! `lambda` into per-cell `h` values, and for adaptive distributions
//! also supplies the `dh/dx` table consumed by the gradient chain rule.

use nalgebra::Vector2;

use crate::error::{FemError, FemResult};
use crate::geometry::{Chart, ConformalMesh, ShapeType};

/// When and how the optimal scales are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleComputation {
    /// Uniform distribution, computed once on the initial mesh.
    OnceUniform,
    /// Uniform distribution, recomputed for the current mesh.
    CurrentUniform,
    /// Concentration-function distribution, recomputed every iteration.
    IterConcentration,
}

impl std::str::FromStr for ScaleComputation {
    type Err = FemError;

    fn from_str(s: &str) -> FemResult<Self> {
        match s {
            "once_uniform" => Ok(ScaleComputation::OnceUniform),
            "current_uniform" => Ok(ScaleComputation::CurrentUniform),
            "iter_concentration" => Ok(ScaleComputation::IterConcentration),
            other => Err(FemError::InvalidArgument(format!(
                "unknown scale computation '{other}'"
            ))),
        }
    }
}

/// Distance-based concentration weight `c(d) = minval + d^exponent`;
/// cells close to the chart get smaller target sizes.
#[derive(Debug, Clone, Copy)]
pub struct ConcFunction {
    pub minval: f64,
    pub exponent: f64,
}

impl Default for ConcFunction {
    fn default() -> Self {
        Self {
            minval: 1e-3,
            exponent: 1.0,
        }
    }
}

impl ConcFunction {
    fn weight(&self, d: f64) -> f64 {
        self.minval + d.abs().powf(self.exponent)
    }

    fn weight_deriv(&self, d: f64) -> f64 {
        if d == 0.0 {
            0.0
        } else {
            self.exponent * d.abs().powf(self.exponent - 1.0)
        }
    }
}

/// Per-cell scales plus the optional gradient table.
#[derive(Debug, Clone)]
pub struct ScaleData {
    /// Optimal size per cell, one component for the shape term and one
    /// for the determinant term.
    pub h: Vec<Vector2<f64>>,
    /// Target size distribution, summing to one.
    pub lambda: Vec<f64>,
    /// `dh/dx` per cell and local vertex; `None` when the scales do not
    /// depend on the coordinates.
    pub grad_h: Option<Vec<Vec<Vector2<f64>>>>,
}

/// Size of the reference cell with scale `h = 1`.
fn reference_area(shape: ShapeType) -> f64 {
    match shape {
        // Equilateral triangle of edge length one.
        ShapeType::Simplex2 => 3.0_f64.sqrt() / 4.0,
        ShapeType::Hypercube2 => 1.0,
    }
}

fn h_of_area(shape: ShapeType, area: f64) -> f64 {
    (area / reference_area(shape)).max(0.0).sqrt()
}

/// Derivative of `h` with respect to the target area.
fn dh_darea(shape: ShapeType, h: f64) -> f64 {
    if h == 0.0 {
        0.0
    } else {
        1.0 / (2.0 * reference_area(shape) * h)
    }
}

/// Computes scales for a uniform target distribution.
pub fn compute_uniform(mesh: &ConformalMesh) -> ScaleData {
    let n = mesh.num_cells();
    let lambda = vec![1.0 / n as f64; n];
    let area = mesh.total_area() / n as f64;
    let h = h_of_area(mesh.shape(), area);
    ScaleData {
        h: vec![Vector2::new(h, h); n],
        lambda,
        grad_h: None,
    }
}

/// Computes scales concentrated towards a chart: cells near the chart
/// get proportionally smaller target sizes, and the local `dh/dx`
/// contribution through the distance function is tabulated for the
/// gradient chain rule.
pub fn compute_concentrated(
    mesh: &ConformalMesh,
    chart: &Chart,
    conc: &ConcFunction,
) -> ScaleData {
    let n = mesh.num_cells();
    let total_area = mesh.total_area();
    let shape = mesh.shape();

    let mut dist = vec![0.0; n];
    let mut weight = vec![0.0; n];
    let mut midpoints = Vec::with_capacity(n);
    for c in 0..n {
        let verts = mesh.cell(c);
        let mut mid = Vector2::zeros();
        for &v in verts {
            mid += mesh.vertex(v);
        }
        mid /= verts.len() as f64;
        midpoints.push(mid);
        dist[c] = chart.distance(mid);
        weight[c] = conc.weight(dist[c]);
    }
    let weight_sum: f64 = weight.iter().sum();

    let mut h = Vec::with_capacity(n);
    let mut lambda = Vec::with_capacity(n);
    let mut grad_h = Vec::with_capacity(n);
    for c in 0..n {
        let lam = weight[c] / weight_sum;
        let hc = h_of_area(shape, lam * total_area);
        lambda.push(lam);
        h.push(Vector2::new(hc, hc));

        // Local chain: dh/dx_i = dh/dA * A_tot/sum_c * c'(d) * dd/dx_i,
        // with dd/dx_i the outward unit direction split over the cell's
        // vertices. The coupling through the normalisation sum is
        // dropped; it is one order smaller in the cell count.
        let verts = mesh.cell(c);
        let nv = verts.len() as f64;
        let proj = chart.project(midpoints[c]);
        let dir = midpoints[c] - proj;
        let dn = dir.norm();
        let unit = if dn == 0.0 { Vector2::zeros() } else { dir / dn };
        let fac = dh_darea(shape, hc) * total_area / weight_sum
            * conc.weight_deriv(dist[c])
            / nv;
        grad_h.push(verts.iter().map(|_| unit * fac).collect());
    }

    ScaleData {
        h,
        lambda,
        grad_h: Some(grad_h),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_scales_recover_area() {
        let mesh = ConformalMesh::unit_square_tri().refine();
        let scales = compute_uniform(&mesh);
        assert_eq!(scales.h.len(), mesh.num_cells());
        let area_sum: f64 = scales
            .h
            .iter()
            .map(|h| reference_area(ShapeType::Simplex2) * h.x * h.x)
            .sum();
        assert_relative_eq!(area_sum, 1.0, epsilon = 1e-13);
        assert!(scales.grad_h.is_none());
    }

    #[test]
    fn test_concentration_shrinks_near_chart() {
        let mesh = ConformalMesh::unit_square_tri().refine().refine();
        let chart = Chart::circle(nalgebra::Vector2::new(0.25, 0.25), 0.1);
        let scales = compute_concentrated(&mesh, &chart, &ConcFunction::default());

        // The cell closest to the chart gets a smaller target than the
        // farthest one.
        let (near, far) = {
            let mut near = (f64::INFINITY, 0);
            let mut far = (0.0, 0);
            for c in 0..mesh.num_cells() {
                let verts = mesh.cell(c);
                let mut mid = nalgebra::Vector2::zeros();
                for &v in verts {
                    mid += mesh.vertex(v);
                }
                mid /= verts.len() as f64;
                let d = chart.distance(mid);
                if d < near.0 {
                    near = (d, c);
                }
                if d > far.0 {
                    far = (d, c);
                }
            }
            (near.1, far.1)
        };
        assert!(scales.h[near].x < scales.h[far].x);
        let lambda_sum: f64 = scales.lambda.iter().sum();
        assert_relative_eq!(lambda_sum, 1.0, epsilon = 1e-13);
    }
}
