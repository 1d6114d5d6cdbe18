//! Geometric charts

use nalgebra::{Rotation2, Vector2};

/// Analytic or discrete description of a boundary curve; mesh parts can
/// be attached to a chart so refinement and slip boundaries stay on the
/// true geometry.
#[derive(Debug, Clone)]
pub enum Chart {
    Circle {
        centre: Vector2<f64>,
        radius: f64,
    },
    /// Closed polygonal chain.
    Polyline {
        points: Vec<Vector2<f64>>,
    },
}

impl Chart {
    pub fn circle(centre: Vector2<f64>, radius: f64) -> Self {
        Chart::Circle { centre, radius }
    }

    pub fn polyline(points: Vec<Vector2<f64>>) -> Self {
        Chart::Polyline { points }
    }

    /// Closest point on the chart.
    pub fn project(&self, p: Vector2<f64>) -> Vector2<f64> {
        match self {
            Chart::Circle { centre, radius } => {
                let d = p - centre;
                let n = d.norm();
                if n == 0.0 {
                    centre + Vector2::new(*radius, 0.0)
                } else {
                    centre + d * (radius / n)
                }
            }
            Chart::Polyline { points } => {
                let mut best = points[0];
                let mut best_d = f64::INFINITY;
                for k in 0..points.len() {
                    let a = points[k];
                    let b = points[(k + 1) % points.len()];
                    let q = project_segment(p, a, b);
                    let d = (p - q).norm_squared();
                    if d < best_d {
                        best_d = d;
                        best = q;
                    }
                }
                best
            }
        }
    }

    /// Distance from a point to the chart.
    pub fn distance(&self, p: Vector2<f64>) -> f64 {
        match self {
            Chart::Circle { centre, radius } => ((p - centre).norm() - radius).abs(),
            Chart::Polyline { .. } => (p - self.project(p)).norm(),
        }
    }

    /// Outward unit normal at the projection of `p`.
    pub fn normal_at(&self, p: Vector2<f64>) -> Vector2<f64> {
        match self {
            Chart::Circle { centre, .. } => {
                let d = p - centre;
                let n = d.norm();
                if n == 0.0 {
                    Vector2::new(1.0, 0.0)
                } else {
                    d / n
                }
            }
            Chart::Polyline { points } => {
                // Normal of the nearest segment.
                let mut best = Vector2::new(1.0, 0.0);
                let mut best_d = f64::INFINITY;
                for k in 0..points.len() {
                    let a = points[k];
                    let b = points[(k + 1) % points.len()];
                    let q = project_segment(p, a, b);
                    let d = (p - q).norm_squared();
                    if d < best_d {
                        best_d = d;
                        let t = b - a;
                        best = Vector2::new(t.y, -t.x).normalize();
                    }
                }
                best
            }
        }
    }

    /// Moves the chart by a fixed displacement.
    pub fn translate(&mut self, dir: Vector2<f64>) {
        match self {
            Chart::Circle { centre, .. } => *centre += dir,
            Chart::Polyline { points } => {
                for p in points {
                    *p += dir;
                }
            }
        }
    }

    /// Rotates the chart around its own centre.
    pub fn rotate(&mut self, angle: f64) {
        match self {
            Chart::Circle { .. } => {}
            Chart::Polyline { points } => {
                let n = points.len() as f64;
                let centroid = points.iter().sum::<Vector2<f64>>() / n;
                let rot = Rotation2::new(angle);
                for p in points.iter_mut() {
                    *p = centroid + rot * (*p - centroid);
                }
            }
        }
    }
}

fn project_segment(p: Vector2<f64>, a: Vector2<f64>, b: Vector2<f64>) -> Vector2<f64> {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 == 0.0 {
        return a;
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}
