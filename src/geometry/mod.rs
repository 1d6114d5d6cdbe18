//! Geometry: conformal meshes, mesh parts, charts and quality heuristics
//!
//! Only the pieces the core consumes: vertex sets, index sets, uniform
//! refinement, boundary parts and chart projection. Mesh file I/O lives
//! outside the toolkit.

pub mod chart;
pub mod mesh;
pub mod mesh_node;
pub mod mesh_part;
pub mod quality;

pub use chart::Chart;
pub use mesh::{ConformalMesh, ShapeType};
pub use mesh_node::{AdaptMode, RootMeshNode};
pub use mesh_part::MeshPart;
pub use quality::QualityStats;
