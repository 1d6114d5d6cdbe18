//! Cubature rules on reference cells

use nalgebra::Vector2;

use crate::error::{FemError, FemResult};
use crate::geometry::ShapeType;

/// Quadrature points and weights on the reference triangle
/// `{x,y >= 0, x+y <= 1}` or the reference square `[0,1]^2`.
#[derive(Debug, Clone)]
pub struct CubatureRule {
    pub points: Vec<Vector2<f64>>,
    pub weights: Vec<f64>,
}

impl CubatureRule {
    /// Barycentre rule, exact for linears.
    pub fn barycentre(shape: ShapeType) -> Self {
        match shape {
            ShapeType::Simplex2 => Self {
                points: vec![Vector2::new(1.0 / 3.0, 1.0 / 3.0)],
                weights: vec![0.5],
            },
            ShapeType::Hypercube2 => Self {
                points: vec![Vector2::new(0.5, 0.5)],
                weights: vec![1.0],
            },
        }
    }

    /// Edge-midpoint rule on the triangle (degree 2) and tensor 2x2
    /// Gauss on the square (degree 3).
    pub fn default_rule(shape: ShapeType) -> Self {
        match shape {
            ShapeType::Simplex2 => Self {
                points: vec![
                    Vector2::new(0.5, 0.0),
                    Vector2::new(0.5, 0.5),
                    Vector2::new(0.0, 0.5),
                ],
                weights: vec![1.0 / 6.0; 3],
            },
            ShapeType::Hypercube2 => {
                let a = 0.5 - 0.5 / 3.0_f64.sqrt();
                let b = 0.5 + 0.5 / 3.0_f64.sqrt();
                Self {
                    points: vec![
                        Vector2::new(a, a),
                        Vector2::new(b, a),
                        Vector2::new(a, b),
                        Vector2::new(b, b),
                    ],
                    weights: vec![0.25; 4],
                }
            }
        }
    }

    /// Rule lookup by configuration name.
    pub fn from_name(name: &str, shape: ShapeType) -> FemResult<Self> {
        match name {
            "barycentre" => Ok(Self::barycentre(shape)),
            "gauss-legendre:2" | "midpoint" | "default" => Ok(Self::default_rule(shape)),
            other => Err(FemError::InvalidArgument(format!(
                "unknown cubature rule '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weights_sum_to_cell_volume() {
        let tri = CubatureRule::default_rule(ShapeType::Simplex2);
        assert_relative_eq!(tri.weights.iter().sum::<f64>(), 0.5, epsilon = 1e-15);
        let quad = CubatureRule::default_rule(ShapeType::Hypercube2);
        assert_relative_eq!(quad.weights.iter().sum::<f64>(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn test_quad_rule_integrates_cubics() {
        // 2x2 Gauss integrates x^3 exactly on [0,1]: integral is 1/4.
        let rule = CubatureRule::default_rule(ShapeType::Hypercube2);
        let val: f64 = rule
            .points
            .iter()
            .zip(&rule.weights)
            .map(|(p, w)| w * p.x.powi(3))
            .sum();
        assert_relative_eq!(val, 0.25, epsilon = 1e-14);
    }
}
