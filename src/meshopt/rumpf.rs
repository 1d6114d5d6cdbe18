//! Rumpf cell functionals
//!
//! Hyperelastic mesh-quality energies per cell: a Frobenius shape term,
//! a determinant volume term and a regularised barrier against cell
//! inversion, all evaluated on the cell Jacobian scaled by the optimal
//! size `h`. Triangles measure against the equilateral reference cell,
//! quadrilaterals against the square.

use nalgebra::Vector2;

use crate::error::{FemError, FemResult};
use crate::geometry::ShapeType;

/// Weights of the three energy contributions.
#[derive(Debug, Clone, Copy)]
pub struct RumpfParams {
    pub fac_norm: f64,
    pub fac_det: f64,
    pub fac_rec_det: f64,
    pub fac_reg: f64,
    /// Determinant exponent: 1 or 2.
    pub exponent_det: i32,
}

impl RumpfParams {
    /// Derives the barrier weight so the energy of the reference cell is
    /// scale-invariant and the barrier stays finite for degenerate cells.
    pub fn new(fac_norm: f64, fac_det: f64, fac_reg: f64, exponent_det: i32) -> FemResult<Self> {
        if !(exponent_det == 1 || exponent_det == 2) {
            return Err(FemError::InvalidArgument(format!(
                "determinant exponent must be 1 or 2, got {exponent_det}"
            )));
        }
        let r2 = fac_reg * fac_reg;
        let s = (r2 + 1.0).sqrt();
        let fac_rec_det = fac_det * (2.0 * s + 2.0 * r2 + 2.0 + s * r2);
        Ok(Self {
            fac_norm,
            fac_det,
            fac_rec_det,
            fac_reg,
            exponent_det,
        })
    }
}

/// Which local functional a hypercube cell uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RumpfVariant {
    /// P1 on triangles; corner-Jacobian Q1 on quadrilaterals.
    Standard,
    /// Quadrilaterals split into their four corner triangles and
    /// evaluated with the P1 functional.
    Q1Split,
}

/// Local value, gradient and `h`-derivative of the Rumpf energy.
#[derive(Debug, Clone)]
pub struct RumpfFunctional {
    pub params: RumpfParams,
    pub variant: RumpfVariant,
}

/// Scalar pieces of one P1 evaluation, shared between value and
/// gradient paths.
struct TriEval {
    frob: f64,
    v: f64,
    /// `sqrt(fac_reg^2 + v^2)`
    s: f64,
}

impl RumpfFunctional {
    pub fn new(params: RumpfParams, variant: RumpfVariant) -> Self {
        Self { params, variant }
    }

    fn tri_eval(&self, x: &[Vector2<f64>; 3], h: Vector2<f64>) -> TriEval {
        let edge_sum = (x[1] - x[0]).norm_squared()
            + (x[2] - x[0]).norm_squared()
            + (x[2] - x[1]).norm_squared();
        let frob = 2.0 / 3.0 * edge_sum / (h.x * h.x);
        let d = (x[1].x - x[0].x) * (x[2].y - x[0].y) - (x[1].y - x[0].y) * (x[2].x - x[0].x);
        let v = 2.0 / 3.0_f64.sqrt() * d / (h.y * h.y);
        let s = (self.params.fac_reg * self.params.fac_reg + v * v).sqrt();
        TriEval { frob, v, s }
    }

    fn powi(base: f64, e: i32) -> f64 {
        base.powi(e)
    }

    fn tri_value(&self, x: &[Vector2<f64>; 3], h: Vector2<f64>) -> f64 {
        let e = self.tri_eval(x, h);
        let p = &self.params;
        let shape = e.frob - 2.0;
        p.fac_norm * shape * shape
            + p.fac_det * Self::powi(e.v, p.exponent_det)
            + p.fac_rec_det * Self::powi(e.v + e.s, -p.exponent_det)
    }

    /// Gradient of the P1 energy with respect to the three vertices.
    fn tri_gradient(&self, x: &[Vector2<f64>; 3], h: Vector2<f64>, grad: &mut [Vector2<f64>; 3]) {
        let e = self.tri_eval(x, h);
        let p = &self.params;
        let ed = p.exponent_det as f64;

        // d(frob)/dx_i = (4/3)/h0^2 * (2 x_i - x_j - x_k)
        let frob_fac = 2.0 * p.fac_norm * (e.frob - 2.0) * (4.0 / 3.0) / (h.x * h.x);
        // d(v)/dx_i via the cross-product derivative.
        let v_fac = 2.0 / 3.0_f64.sqrt() / (h.y * h.y);
        let dv = [
            Vector2::new(x[1].y - x[2].y, x[2].x - x[1].x) * v_fac,
            Vector2::new(x[2].y - x[0].y, x[0].x - x[2].x) * v_fac,
            Vector2::new(x[0].y - x[1].y, x[1].x - x[0].x) * v_fac,
        ];
        let det_fac = p.fac_det * ed * Self::powi(e.v, p.exponent_det - 1);
        let w = e.v + e.s;
        let barrier_fac = -p.fac_rec_det * ed * Self::powi(w, -p.exponent_det - 1) * (1.0 + e.v / e.s);

        let sum: Vector2<f64> = x[0] + x[1] + x[2];
        for i in 0..3 {
            let dfrob = (x[i] * 3.0 - sum) * frob_fac;
            grad[i] = dfrob + dv[i] * (det_fac + barrier_fac);
        }
    }

    /// Derivative of the P1 energy with respect to the scale components
    /// `(h0, h1)`.
    fn tri_grad_h(&self, x: &[Vector2<f64>; 3], h: Vector2<f64>) -> Vector2<f64> {
        let e = self.tri_eval(x, h);
        let p = &self.params;
        let ed = p.exponent_det as f64;

        // frob ~ h0^-2, v ~ h1^-2.
        let dfrob_dh = -2.0 * e.frob / h.x;
        let dv_dh = -2.0 * e.v / h.y;
        let w = e.v + e.s;

        let norm_part = 2.0 * p.fac_norm * (e.frob - 2.0) * dfrob_dh;
        let det_part = p.fac_det * ed * Self::powi(e.v, p.exponent_det - 1) * dv_dh;
        let barrier_part =
            -p.fac_rec_det * ed * Self::powi(w, -p.exponent_det - 1) * (1.0 + e.v / e.s) * dv_dh;
        Vector2::new(norm_part, det_part + barrier_part)
    }

    /// The four corner triangles of a lexicographically ordered quad, in
    /// counter-clockwise orientation.
    fn quad_corner_tris(x: &[Vector2<f64>; 4]) -> [[Vector2<f64>; 3]; 4] {
        // ccw order: bl, br, tr, tl
        let p = [x[0], x[1], x[3], x[2]];
        [
            [p[0], p[1], p[3]],
            [p[1], p[2], p[0]],
            [p[2], p[3], p[1]],
            [p[3], p[0], p[2]],
        ]
    }

    /// Maps corner-triangle gradients back to lexicographic quad
    /// corners.
    const QUAD_CCW: [usize; 4] = [0, 1, 3, 2];

    /// Scale for the sub-triangles of a quad with optimal size `h`: each
    /// corner triangle of the optimal square has legs `h`, so the
    /// equilateral reference is approached with `h * sqrt(2/sqrt(3))`.
    fn split_h(h: Vector2<f64>) -> Vector2<f64> {
        let f = (2.0 / 3.0_f64.sqrt()).sqrt();
        h * f
    }

    /// Square-reference evaluation of one quad corner: `e1`, `e2` are
    /// the two edges leaving the corner in ccw order.
    fn sq_eval(&self, e1: Vector2<f64>, e2: Vector2<f64>, h: Vector2<f64>) -> TriEval {
        let frob = (e1.norm_squared() + e2.norm_squared()) / (h.x * h.x);
        let v = (e1.x * e2.y - e1.y * e2.x) / (h.y * h.y);
        let s = (self.params.fac_reg * self.params.fac_reg + v * v).sqrt();
        TriEval { frob, v, s }
    }

    fn eval_energy(&self, e: &TriEval) -> f64 {
        let p = &self.params;
        let shape = e.frob - 2.0;
        p.fac_norm * shape * shape
            + p.fac_det * Self::powi(e.v, p.exponent_det)
            + p.fac_rec_det * Self::powi(e.v + e.s, -p.exponent_det)
    }

    pub fn cell_value(&self, shape: ShapeType, x: &[Vector2<f64>], h: Vector2<f64>) -> f64 {
        match (shape, self.variant) {
            (ShapeType::Simplex2, _) => self.tri_value(&[x[0], x[1], x[2]], h),
            (ShapeType::Hypercube2, RumpfVariant::Q1Split) => {
                let hs = Self::split_h(h);
                Self::quad_corner_tris(&[x[0], x[1], x[2], x[3]])
                    .iter()
                    .map(|tri| self.tri_value(tri, hs))
                    .sum::<f64>()
                    * 0.25
            }
            (ShapeType::Hypercube2, RumpfVariant::Standard) => {
                let p = [x[0], x[1], x[3], x[2]];
                (0..4)
                    .map(|k| {
                        let e1 = p[(k + 1) % 4] - p[k];
                        let e2 = p[(k + 3) % 4] - p[k];
                        self.eval_energy(&self.sq_eval(e1, e2, h))
                    })
                    .sum::<f64>()
                    * 0.25
            }
        }
    }

    pub fn cell_gradient(
        &self,
        shape: ShapeType,
        x: &[Vector2<f64>],
        h: Vector2<f64>,
        grad: &mut [Vector2<f64>; 4],
    ) {
        for g in grad.iter_mut() {
            *g = Vector2::zeros();
        }
        match shape {
            ShapeType::Simplex2 => {
                let mut g = [Vector2::zeros(); 3];
                self.tri_gradient(&[x[0], x[1], x[2]], h, &mut g);
                grad[..3].copy_from_slice(&g);
            }
            ShapeType::Hypercube2 if self.variant == RumpfVariant::Q1Split => {
                let hs = Self::split_h(h);
                let tris = Self::quad_corner_tris(&[x[0], x[1], x[2], x[3]]);
                for (k, tri) in tris.iter().enumerate() {
                    let mut g = [Vector2::zeros(); 3];
                    self.tri_gradient(tri, hs, &mut g);
                    // Corner k owns local 0, its ccw successor local 1,
                    // its ccw predecessor local 2.
                    let at = Self::QUAD_CCW[k];
                    let succ = Self::QUAD_CCW[(k + 1) % 4];
                    let pred = Self::QUAD_CCW[(k + 3) % 4];
                    grad[at] += g[0] * 0.25;
                    grad[succ] += g[1] * 0.25;
                    grad[pred] += g[2] * 0.25;
                }
            }
            ShapeType::Hypercube2 => {
                let p = [x[0], x[1], x[3], x[2]];
                let prm = &self.params;
                let ed = prm.exponent_det as f64;
                for k in 0..4 {
                    let e1 = p[(k + 1) % 4] - p[k];
                    let e2 = p[(k + 3) % 4] - p[k];
                    let e = self.sq_eval(e1, e2, h);

                    let frob_fac = 2.0 * prm.fac_norm * (e.frob - 2.0) * 2.0 / (h.x * h.x);
                    let det_fac = prm.fac_det * ed * Self::powi(e.v, prm.exponent_det - 1);
                    let w = e.v + e.s;
                    let barrier_fac = -prm.fac_rec_det
                        * ed
                        * Self::powi(w, -prm.exponent_det - 1)
                        * (1.0 + e.v / e.s);
                    let v_fac = (det_fac + barrier_fac) / (h.y * h.y);

                    let at = Self::QUAD_CCW[k];
                    let succ = Self::QUAD_CCW[(k + 1) % 4];
                    let pred = Self::QUAD_CCW[(k + 3) % 4];
                    // d(frob): edges enter quadratically.
                    grad[at] += (-e1 - e2) * frob_fac * 0.25;
                    grad[succ] += e1 * frob_fac * 0.25;
                    grad[pred] += e2 * frob_fac * 0.25;
                    // d(v): cross-product derivative.
                    grad[at] +=
                        Vector2::new(e1.y - e2.y, e2.x - e1.x) * v_fac * 0.25;
                    grad[succ] += Vector2::new(e2.y, -e2.x) * v_fac * 0.25;
                    grad[pred] += Vector2::new(-e1.y, e1.x) * v_fac * 0.25;
                }
            }
        }
    }

    /// `dF/dh`, combined over both scale components.
    pub fn cell_grad_h(&self, shape: ShapeType, x: &[Vector2<f64>], h: Vector2<f64>) -> f64 {
        match shape {
            ShapeType::Simplex2 => {
                let g = self.tri_grad_h(&[x[0], x[1], x[2]], h);
                g.x + g.y
            }
            ShapeType::Hypercube2 if self.variant == RumpfVariant::Q1Split => {
                let hs = Self::split_h(h);
                let f = (2.0 / 3.0_f64.sqrt()).sqrt();
                Self::quad_corner_tris(&[x[0], x[1], x[2], x[3]])
                    .iter()
                    .map(|tri| {
                        let g = self.tri_grad_h(tri, hs);
                        (g.x + g.y) * f
                    })
                    .sum::<f64>()
                    * 0.25
            }
            ShapeType::Hypercube2 => {
                let p = [x[0], x[1], x[3], x[2]];
                let prm = &self.params;
                let ed = prm.exponent_det as f64;
                (0..4)
                    .map(|k| {
                        let e1 = p[(k + 1) % 4] - p[k];
                        let e2 = p[(k + 3) % 4] - p[k];
                        let e = self.sq_eval(e1, e2, h);
                        let w = e.v + e.s;
                        let norm_part =
                            2.0 * prm.fac_norm * (e.frob - 2.0) * (-2.0 * e.frob / h.x);
                        let det_part = prm.fac_det
                            * ed
                            * Self::powi(e.v, prm.exponent_det - 1)
                            * (-2.0 * e.v / h.y);
                        let barrier_part = -prm.fac_rec_det
                            * ed
                            * Self::powi(w, -prm.exponent_det - 1)
                            * (1.0 + e.v / e.s)
                            * (-2.0 * e.v / h.y);
                        norm_part + det_part + barrier_part
                    })
                    .sum::<f64>()
                    * 0.25
            }
        }
    }

    /// Adds the `h`-chain-rule part to the cell gradient:
    /// `grad[i] += dF/dh * dh/dx_i`.
    pub fn add_grad_h_part(
        &self,
        shape: ShapeType,
        x: &[Vector2<f64>],
        h: Vector2<f64>,
        grad_h_table: &[Vector2<f64>],
        grad: &mut [Vector2<f64>; 4],
    ) {
        let der_h = self.cell_grad_h(shape, x, h);
        for (g, dh) in grad.iter_mut().zip(grad_h_table) {
            *g += dh * der_h;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn functional(exp: i32) -> RumpfFunctional {
        RumpfFunctional::new(
            RumpfParams::new(1.0, 1.0, 1e-8, exp).unwrap(),
            RumpfVariant::Standard,
        )
    }

    /// The equilateral triangle of edge length h is the energy minimum
    /// of the shape term.
    #[test]
    fn test_equilateral_is_reference() {
        let f = functional(2);
        let h = Vector2::new(1.0, 1.0);
        let x = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.5, 3.0_f64.sqrt() / 2.0),
        ];
        let e = f.tri_eval(&x, h);
        // Frobenius part hits its target and the scaled determinant is 1.
        assert_relative_eq!(e.frob, 2.0, epsilon = 1e-14);
        assert_relative_eq!(e.v, 1.0, epsilon = 1e-14);
    }

    /// Closed-form gradient matches central finite differences.
    #[test]
    fn test_gradient_matches_finite_differences() {
        for exp in [1, 2] {
            let f = functional(exp);
            let h = Vector2::new(0.8, 0.8);
            let x = [
                Vector2::new(0.1, 0.0),
                Vector2::new(1.1, 0.2),
                Vector2::new(0.4, 0.9),
            ];
            let mut grad = [Vector2::zeros(); 3];
            f.tri_gradient(&x, h, &mut grad);

            let eps = 1e-6;
            for i in 0..3 {
                for d in 0..2 {
                    let mut xp = x;
                    let mut xm = x;
                    xp[i][d] += eps;
                    xm[i][d] -= eps;
                    let fd = (f.tri_value(&xp, h) - f.tri_value(&xm, h)) / (2.0 * eps);
                    assert_relative_eq!(grad[i][d], fd, epsilon = 1e-5, max_relative = 1e-5);
                }
            }
        }
    }

    /// h-derivative matches finite differences.
    #[test]
    fn test_grad_h_matches_finite_differences() {
        let f = functional(2);
        let x = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.1),
            Vector2::new(0.3, 0.8),
        ];
        let h = Vector2::new(0.9, 0.9);
        let eps = 1e-6;
        let analytic = f.cell_grad_h(ShapeType::Simplex2, &x, h);
        let fp = f.tri_value(&x, Vector2::new(h.x + eps, h.y + eps));
        let fm = f.tri_value(&x, Vector2::new(h.x - eps, h.y - eps));
        let fd = (fp - fm) / (2.0 * eps);
        assert_relative_eq!(analytic, fd, epsilon = 1e-4, max_relative = 1e-5);
    }

    /// Degenerate cells keep a finite barrier.
    #[test]
    fn test_barrier_finite_for_degenerate_cell() {
        let f = functional(2);
        let h = Vector2::new(1.0, 1.0);
        let x = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.5, 0.0),
        ];
        let val = f.tri_value(&x, h);
        assert!(val.is_finite());
        assert!(val > 0.0);
    }

    /// Quad gradient matches finite differences for both variants.
    #[test]
    fn test_quad_gradient_matches_finite_differences() {
        for variant in [RumpfVariant::Q1Split, RumpfVariant::Standard] {
            quad_fd_check(variant);
        }
    }

    fn quad_fd_check(variant: RumpfVariant) {
        let f = RumpfFunctional::new(RumpfParams::new(1.0, 1.0, 1e-8, 2).unwrap(), variant);
        let h = Vector2::new(1.0, 1.0);
        let x = [
            Vector2::new(0.0, 0.0),
            Vector2::new(1.1, 0.1),
            Vector2::new(-0.1, 0.9),
            Vector2::new(1.0, 1.2),
        ];
        let mut grad = [Vector2::zeros(); 4];
        f.cell_gradient(ShapeType::Hypercube2, &x, h, &mut grad);

        let eps = 1e-6;
        for i in 0..4 {
            for d in 0..2 {
                let mut xp = x;
                let mut xm = x;
                xp[i][d] += eps;
                xm[i][d] -= eps;
                let fd = (f.cell_value(ShapeType::Hypercube2, &xp, h)
                    - f.cell_value(ShapeType::Hypercube2, &xm, h))
                    / (2.0 * eps);
                assert_relative_eq!(grad[i][d], fd, epsilon = 1e-5, max_relative = 1e-5);
            }
        }
    }
}
