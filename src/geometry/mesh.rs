//! 2-D conformal mesh

use nalgebra::Vector2;

use crate::containers::{DenseVectorBlocked, VectorOps};
use crate::error::{check_sizes, FemError, FemResult};

/// Cell shape of a conformal mesh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeType {
    /// Triangles.
    Simplex2,
    /// Quadrilaterals; vertex order per cell is (bl, br, tl, tr), i.e.
    /// lexicographic in the reference square.
    Hypercube2,
}

impl ShapeType {
    pub fn verts_per_cell(self) -> usize {
        match self {
            ShapeType::Simplex2 => 3,
            ShapeType::Hypercube2 => 4,
        }
    }
}

/// Conformal 2-D mesh with explicit vertex, edge and cell index sets.
#[derive(Debug, Clone)]
pub struct ConformalMesh {
    shape: ShapeType,
    vertices: Vec<Vector2<f64>>,
    /// Flattened vertex-at-cell table.
    cells: Vec<usize>,
    /// Unique edges, each as an ascending vertex pair.
    edges: Vec<[usize; 2]>,
    /// Number of cells adjacent to each edge; boundary edges have one.
    edge_cell_count: Vec<usize>,
}

impl ConformalMesh {
    pub fn new(shape: ShapeType, vertices: Vec<Vector2<f64>>, cells: Vec<usize>) -> FemResult<Self> {
        let vpc = shape.verts_per_cell();
        if cells.len() % vpc != 0 {
            return Err(FemError::InvalidArgument(format!(
                "cell table length {} is not a multiple of {}",
                cells.len(),
                vpc
            )));
        }
        if let Some(&v) = cells.iter().find(|&&v| v >= vertices.len()) {
            return Err(FemError::InvalidArgument(format!(
                "cell references vertex {v} beyond vertex set"
            )));
        }
        let mut mesh = Self {
            shape,
            vertices,
            cells,
            edges: Vec::new(),
            edge_cell_count: Vec::new(),
        };
        mesh.build_edges();
        Ok(mesh)
    }

    /// Level-0 unit square split into two right triangles.
    pub fn unit_square_tri() -> Self {
        let vertices = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(1.0, 1.0),
        ];
        let cells = vec![0, 1, 2, 1, 3, 2];
        Self::new(ShapeType::Simplex2, vertices, cells).expect("static connectivity")
    }

    /// Unit square split into four triangles meeting in the centre
    /// vertex; the crossed variant keeps interior vertices next to the
    /// corners under refinement.
    pub fn unit_square_tri_cross() -> Self {
        let vertices = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(0.5, 0.5),
        ];
        let cells = vec![0, 1, 4, 1, 3, 4, 3, 2, 4, 2, 0, 4];
        Self::new(ShapeType::Simplex2, vertices, cells).expect("static connectivity")
    }

    /// Level-0 unit square as a single quadrilateral.
    pub fn unit_square_quad() -> Self {
        let vertices = vec![
            Vector2::new(0.0, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(1.0, 1.0),
        ];
        let cells = vec![0, 1, 2, 3];
        Self::new(ShapeType::Hypercube2, vertices, cells).expect("static connectivity")
    }

    pub fn shape(&self) -> ShapeType {
        self.shape
    }

    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn num_cells(&self) -> usize {
        self.cells.len() / self.shape.verts_per_cell()
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex(&self, i: usize) -> Vector2<f64> {
        self.vertices[i]
    }

    pub fn vertices(&self) -> &[Vector2<f64>] {
        &self.vertices
    }

    pub fn set_vertex(&mut self, i: usize, p: Vector2<f64>) {
        self.vertices[i] = p;
    }

    /// Vertex indices of cell `c`.
    pub fn cell(&self, c: usize) -> &[usize] {
        let vpc = self.shape.verts_per_cell();
        &self.cells[c * vpc..(c + 1) * vpc]
    }

    pub fn edge(&self, e: usize) -> [usize; 2] {
        self.edges[e]
    }

    pub fn edges(&self) -> &[[usize; 2]] {
        &self.edges
    }

    /// True if edge `e` lies on the mesh boundary.
    pub fn is_boundary_edge(&self, e: usize) -> bool {
        self.edge_cell_count[e] == 1
    }

    /// Copies the vertex coordinates into a blocked vector.
    pub fn coords_buffer(&self) -> DenseVectorBlocked<f64, 2> {
        let mut buf = DenseVectorBlocked::new(self.num_vertices());
        for (i, v) in self.vertices.iter().enumerate() {
            buf.set(i, *v);
        }
        buf
    }

    /// Writes vertex coordinates back from a blocked vector.
    pub fn set_coords(&mut self, buf: &DenseVectorBlocked<f64, 2>) -> FemResult<()> {
        check_sizes(self.num_vertices(), buf.size())?;
        for i in 0..self.vertices.len() {
            self.vertices[i] = buf.at(i);
        }
        Ok(())
    }

    /// Local edges of a cell as vertex index pairs.
    fn cell_edge_pairs(&self, c: usize) -> Vec<[usize; 2]> {
        let v = self.cell(c);
        match self.shape {
            ShapeType::Simplex2 => vec![[v[0], v[1]], [v[0], v[2]], [v[1], v[2]]],
            // Lexicographic quad: bottom, top, left, right.
            ShapeType::Hypercube2 => vec![[v[0], v[1]], [v[2], v[3]], [v[0], v[2]], [v[1], v[3]]],
        }
    }

    fn build_edges(&mut self) {
        use std::collections::BTreeMap;
        let mut index: BTreeMap<[usize; 2], usize> = BTreeMap::new();
        let mut edges = Vec::new();
        let mut counts = Vec::new();
        for c in 0..self.num_cells() {
            for pair in self.cell_edge_pairs(c) {
                let key = if pair[0] < pair[1] {
                    pair
                } else {
                    [pair[1], pair[0]]
                };
                match index.get(&key) {
                    Some(&e) => counts[e] += 1,
                    None => {
                        index.insert(key, edges.len());
                        edges.push(key);
                        counts.push(1);
                    }
                }
            }
        }
        self.edges = edges;
        self.edge_cell_count = counts;
    }

    /// Edge index lookup by ascending vertex pair.
    pub fn find_edge(&self, a: usize, b: usize) -> Option<usize> {
        let key = if a < b { [a, b] } else { [b, a] };
        self.edges.iter().position(|&e| e == key)
    }

    /// Uniform refinement: every edge gains a midpoint; triangles split
    /// into four, quadrilaterals into four through the cell centre. Old
    /// vertices keep their indices, edge midpoints follow in edge order,
    /// quad centres last.
    pub fn refine(&self) -> Self {
        let nv = self.num_vertices();
        let mut vertices = self.vertices.clone();
        for &[a, b] in &self.edges {
            vertices.push((self.vertices[a] + self.vertices[b]) * 0.5);
        }
        let edge_mid = |mesh: &Self, a: usize, b: usize| -> usize {
            nv + mesh.find_edge(a, b).expect("edge exists in conformal mesh")
        };

        let mut cells = Vec::new();
        match self.shape {
            ShapeType::Simplex2 => {
                for c in 0..self.num_cells() {
                    let v = self.cell(c);
                    let m01 = edge_mid(self, v[0], v[1]);
                    let m02 = edge_mid(self, v[0], v[2]);
                    let m12 = edge_mid(self, v[1], v[2]);
                    cells.extend_from_slice(&[v[0], m01, m02]);
                    cells.extend_from_slice(&[m01, v[1], m12]);
                    cells.extend_from_slice(&[m02, m12, v[2]]);
                    cells.extend_from_slice(&[m01, m12, m02]);
                }
            }
            ShapeType::Hypercube2 => {
                let ne = self.edges.len();
                for c in 0..self.num_cells() {
                    let v = self.cell(c);
                    let centre = nv + ne + c;
                    let mb = edge_mid(self, v[0], v[1]);
                    let mt = edge_mid(self, v[2], v[3]);
                    let ml = edge_mid(self, v[0], v[2]);
                    let mr = edge_mid(self, v[1], v[3]);
                    cells.extend_from_slice(&[v[0], mb, ml, centre]);
                    cells.extend_from_slice(&[mb, v[1], centre, mr]);
                    cells.extend_from_slice(&[ml, centre, v[2], mt]);
                    cells.extend_from_slice(&[centre, mr, mt, v[3]]);
                }
            }
        }
        if self.shape == ShapeType::Hypercube2 {
            for c in 0..self.num_cells() {
                let v = self.cell(c);
                let centre = (self.vertices[v[0]]
                    + self.vertices[v[1]]
                    + self.vertices[v[2]]
                    + self.vertices[v[3]])
                    * 0.25;
                vertices.push(centre);
            }
        }
        Self::new(self.shape, vertices, cells).expect("refinement preserves conformity")
    }

    /// Signed area of cell `c` (sum of corner triangles for quads).
    pub fn cell_area(&self, c: usize) -> f64 {
        let v = self.cell(c);
        match self.shape {
            ShapeType::Simplex2 => {
                tri_area(self.vertices[v[0]], self.vertices[v[1]], self.vertices[v[2]])
            }
            ShapeType::Hypercube2 => {
                tri_area(self.vertices[v[0]], self.vertices[v[1]], self.vertices[v[2]])
                    + tri_area(self.vertices[v[1]], self.vertices[v[3]], self.vertices[v[2]])
            }
        }
    }

    /// Total mesh area.
    pub fn total_area(&self) -> f64 {
        (0..self.num_cells()).map(|c| self.cell_area(c)).sum()
    }
}

/// Signed area of a triangle.
pub fn tri_area(a: Vector2<f64>, b: Vector2<f64>, c: Vector2<f64>) -> f64 {
    0.5 * ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unit_square_tri() {
        let m = ConformalMesh::unit_square_tri();
        assert_eq!(m.num_vertices(), 4);
        assert_eq!(m.num_cells(), 2);
        assert_eq!(m.num_edges(), 5);
        assert_relative_eq!(m.total_area(), 1.0);
    }

    #[test]
    fn test_refine_tri_counts() {
        let m = ConformalMesh::unit_square_tri().refine();
        assert_eq!(m.num_cells(), 8);
        assert_eq!(m.num_vertices(), 9);
        assert_relative_eq!(m.total_area(), 1.0, epsilon = 1e-14);

        let m2 = m.refine();
        assert_eq!(m2.num_cells(), 32);
        assert_relative_eq!(m2.total_area(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_refine_quad_counts() {
        let m = ConformalMesh::unit_square_quad().refine();
        assert_eq!(m.num_cells(), 4);
        assert_eq!(m.num_vertices(), 9);
        assert_relative_eq!(m.total_area(), 1.0, epsilon = 1e-14);
    }

    #[test]
    fn test_boundary_edges() {
        let m = ConformalMesh::unit_square_tri();
        let boundary: usize = (0..m.num_edges())
            .filter(|&e| m.is_boundary_edge(e))
            .count();
        assert_eq!(boundary, 4);
    }
}
