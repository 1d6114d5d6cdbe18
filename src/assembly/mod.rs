//! Assembly contract: operators, transfers and boundary data
//!
//! Element-local evaluation is deliberately small here (Lagrange-1
//! only); the structure of symbolic-then-numeric assembly and the
//! filter/transfer assemblers are what the core consumes.

pub mod cubature;
pub mod grid_transfer;
pub mod operators;
pub mod slip_normals;
pub mod space;

pub use cubature::CubatureRule;
pub use grid_transfer::assemble_grid_transfer;
pub use operators::{assemble_laplace, assemble_lumped_mass};
pub use slip_normals::assemble_slip_normals;

use nalgebra::Vector2;

use crate::filter::{UnitFilter, UnitFilterBlocked};
use crate::geometry::{ConformalMesh, MeshPart};

/// Unit filter fixing a scalar field on a mesh part.
pub fn assemble_unit_filter(
    part: &MeshPart,
    mesh: &ConformalMesh,
    value: impl Fn(Vector2<f64>) -> f64,
) -> UnitFilter<f64> {
    let mut filter = UnitFilter::new();
    for &v in part.vertices() {
        filter.add(v, value(mesh.vertex(v)));
    }
    filter
}

/// Blocked unit filter pinning the coordinates of a mesh part, the
/// Dirichlet boundary condition of the mesh optimiser.
pub fn assemble_coordinate_filter(part: &MeshPart, mesh: &ConformalMesh) -> UnitFilterBlocked<f64, 2> {
    let mut filter = UnitFilterBlocked::new();
    for &v in part.vertices() {
        filter.add(v, mesh.vertex(v));
    }
    filter
}
