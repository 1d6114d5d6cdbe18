//! Slip-boundary normal assembly

use nalgebra::Vector2;

use crate::containers::SparseVectorBlocked;
use crate::error::FemResult;
use crate::geometry::{ConformalMesh, MeshPart};

/// Assembles raw per-dof outward normals on a slip mesh part by summing
/// facet-normal times facet-volume contributions over the part's edges.
///
/// The result is *not* normalised: in a distributed run the raw field is
/// `sync_0`'d across ranks first so interface dofs carry a globally
/// consistent normal, then normalised (see
/// [`SparseVectorBlocked::normalise`]).
pub fn assemble_slip_normals(
    mesh: &ConformalMesh,
    part: &MeshPart,
) -> FemResult<SparseVectorBlocked<f64, u64, 2>> {
    let mut normals = SparseVectorBlocked::new(mesh.num_vertices());

    for &e in part.edges() {
        let [a, b] = mesh.edge(e);
        let pa = mesh.vertex(a);
        let pb = mesh.vertex(b);
        let t = pb - pa;
        let len = t.norm();
        if len == 0.0 {
            continue;
        }
        let mut n = Vector2::new(t.y, -t.x) / len;
        if let Some(c) = adjacent_cell(mesh, e) {
            // Point away from the owning cell.
            let centroid = cell_centroid(mesh, c);
            let mid = (pa + pb) * 0.5;
            if n.dot(&(mid - centroid)) < 0.0 {
                n = -n;
            }
        }
        // Facet volume weights the contribution of each endpoint.
        let contrib = n * (0.5 * len);
        normals.add(a, contrib)?;
        normals.add(b, contrib)?;
    }
    Ok(normals)
}

fn adjacent_cell(mesh: &ConformalMesh, edge: usize) -> Option<usize> {
    let [a, b] = mesh.edge(edge);
    (0..mesh.num_cells()).find(|&c| {
        let v = mesh.cell(c);
        v.contains(&a) && v.contains(&b)
    })
}

fn cell_centroid(mesh: &ConformalMesh, c: usize) -> Vector2<f64> {
    let v = mesh.cell(c);
    let mut p = Vector2::zeros();
    for &i in v {
        p += mesh.vertex(i);
    }
    p / v.len() as f64
}
