//! Control layer: level hierarchies, matrix stocks and solver factories
//!
//! Builds the full per-space infrastructure (levels, gates, muxers,
//! transfers), owns the assembled matrices, and instantiates solver
//! trees from property-map configurations.

pub mod domain;
pub mod matrix_stock;
pub mod meshopt_ctrl;
pub mod presets;
pub mod solver_factory;

pub use domain::{DomainControl, DomainLevel};
pub use matrix_stock::{MatrixStock, StockLevel};
pub use meshopt_ctrl::{MeshoptControl, StepStats};
pub use solver_factory::build_solver;
