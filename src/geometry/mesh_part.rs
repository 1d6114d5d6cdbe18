//! Mesh parts: boundary and patch subsets

use crate::geometry::ConformalMesh;

/// Subset of a mesh sharing the parent's connectivity: vertex and edge
/// index sets, typically a boundary segment or an internal patch.
#[derive(Debug, Clone, Default)]
pub struct MeshPart {
    vertices: Vec<usize>,
    edges: Vec<usize>,
}

impl MeshPart {
    pub fn new(mut vertices: Vec<usize>, mut edges: Vec<usize>) -> Self {
        vertices.sort_unstable();
        vertices.dedup();
        edges.sort_unstable();
        edges.dedup();
        Self { vertices, edges }
    }

    /// All boundary edges (and their vertices) of the mesh.
    pub fn whole_boundary(mesh: &ConformalMesh) -> Self {
        let edges: Vec<usize> = (0..mesh.num_edges())
            .filter(|&e| mesh.is_boundary_edge(e))
            .collect();
        Self::from_edges(mesh, edges)
    }

    /// Boundary edges whose endpoints satisfy a coordinate predicate.
    pub fn boundary_where(
        mesh: &ConformalMesh,
        pred: impl Fn(nalgebra::Vector2<f64>) -> bool,
    ) -> Self {
        let edges: Vec<usize> = (0..mesh.num_edges())
            .filter(|&e| {
                if !mesh.is_boundary_edge(e) {
                    return false;
                }
                let [a, b] = mesh.edge(e);
                pred(mesh.vertex(a)) && pred(mesh.vertex(b))
            })
            .collect();
        Self::from_edges(mesh, edges)
    }

    fn from_edges(mesh: &ConformalMesh, edges: Vec<usize>) -> Self {
        let mut vertices = Vec::new();
        for &e in &edges {
            let [a, b] = mesh.edge(e);
            vertices.push(a);
            vertices.push(b);
        }
        Self::new(vertices, edges)
    }

    pub fn vertices(&self) -> &[usize] {
        &self.vertices
    }

    pub fn edges(&self) -> &[usize] {
        &self.edges
    }

    pub fn contains_vertex(&self, v: usize) -> bool {
        self.vertices.binary_search(&v).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// The matching part on the uniformly refined mesh: old vertices
    /// keep their indices, part edges contribute their midpoints, and
    /// each part edge splits into two child edges.
    pub fn refine(&self, coarse: &ConformalMesh, fine: &ConformalMesh) -> Self {
        let nv = coarse.num_vertices();
        let mut vertices = self.vertices.clone();
        for &e in &self.edges {
            vertices.push(nv + e);
        }
        let mut edges = Vec::new();
        for &e in &self.edges {
            let [a, b] = coarse.edge(e);
            let mid = nv + e;
            if let Some(f) = fine.find_edge(a, mid) {
                edges.push(f);
            }
            if let Some(f) = fine.find_edge(mid, b) {
                edges.push(f);
            }
        }
        Self::new(vertices, edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_boundary() {
        let mesh = ConformalMesh::unit_square_tri();
        let part = MeshPart::whole_boundary(&mesh);
        assert_eq!(part.edges().len(), 4);
        assert_eq!(part.vertices().len(), 4);
    }

    #[test]
    fn test_boundary_predicate() {
        let mesh = ConformalMesh::unit_square_tri().refine();
        let left = MeshPart::boundary_where(&mesh, |p| p.x.abs() < 1e-12);
        assert_eq!(left.edges().len(), 2);
        assert_eq!(left.vertices().len(), 3);
    }

    #[test]
    fn test_part_refinement_tracks_boundary() {
        let coarse = ConformalMesh::unit_square_tri();
        let fine = coarse.refine();
        let part = MeshPart::whole_boundary(&coarse).refine(&coarse, &fine);
        let whole = MeshPart::whole_boundary(&fine);
        assert_eq!(part.vertices(), whole.vertices());
        assert_eq!(part.edges(), whole.edges());
    }
}
