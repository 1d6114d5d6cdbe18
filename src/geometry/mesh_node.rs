//! Mesh node tree

use std::collections::BTreeMap;

use crate::error::{FemError, FemResult};
use crate::geometry::{Chart, ConformalMesh, MeshPart};

/// How refinement treats chart-attached parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdaptMode {
    /// Midpoints stay where uniform refinement puts them.
    None,
    /// Part vertices are re-projected onto their chart after refinement.
    Chart,
}

impl std::str::FromStr for AdaptMode {
    type Err = FemError;

    fn from_str(s: &str) -> FemResult<Self> {
        match s {
            "none" => Ok(AdaptMode::None),
            "chart" => Ok(AdaptMode::Chart),
            other => Err(FemError::InvalidArgument(format!(
                "unknown adapt mode '{other}'"
            ))),
        }
    }
}

/// Root node owning a mesh plus its named parts and charts.
///
/// Refinement produces a new tree of the same shape; part nodes track
/// their index sets through refinement and chart nodes carry the
/// geometry across levels.
#[derive(Debug, Clone)]
pub struct RootMeshNode {
    mesh: ConformalMesh,
    parts: BTreeMap<String, MeshPart>,
    charts: BTreeMap<String, Chart>,
    /// Which chart (if any) a part is attached to.
    part_charts: BTreeMap<String, String>,
}

impl RootMeshNode {
    pub fn new(mesh: ConformalMesh) -> Self {
        Self {
            mesh,
            parts: BTreeMap::new(),
            charts: BTreeMap::new(),
            part_charts: BTreeMap::new(),
        }
    }

    pub fn mesh(&self) -> &ConformalMesh {
        &self.mesh
    }

    pub fn mesh_mut(&mut self) -> &mut ConformalMesh {
        &mut self.mesh
    }

    pub fn add_part(&mut self, name: impl Into<String>, part: MeshPart) {
        self.parts.insert(name.into(), part);
    }

    pub fn add_chart(&mut self, name: impl Into<String>, chart: Chart) {
        self.charts.insert(name.into(), chart);
    }

    /// Attaches an existing part to an existing chart.
    pub fn attach_chart(&mut self, part: &str, chart: &str) -> FemResult<()> {
        if !self.parts.contains_key(part) {
            return Err(FemError::MeshPartNotFound(part.to_string()));
        }
        if !self.charts.contains_key(chart) {
            return Err(FemError::ChartNotFound(chart.to_string()));
        }
        self.part_charts.insert(part.to_string(), chart.to_string());
        Ok(())
    }

    pub fn find_part(&self, name: &str) -> FemResult<&MeshPart> {
        self.parts
            .get(name)
            .ok_or_else(|| FemError::MeshPartNotFound(name.to_string()))
    }

    pub fn find_chart(&self, name: &str) -> FemResult<&Chart> {
        self.charts
            .get(name)
            .ok_or_else(|| FemError::ChartNotFound(name.to_string()))
    }

    pub fn find_chart_mut(&mut self, name: &str) -> FemResult<&mut Chart> {
        self.charts
            .get_mut(name)
            .ok_or_else(|| FemError::ChartNotFound(name.to_string()))
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(|s| s.as_str())
    }

    pub fn chart_names(&self) -> impl Iterator<Item = &str> {
        self.charts.keys().map(|s| s.as_str())
    }

    /// Chart attached to a part, if any.
    pub fn chart_of_part(&self, part: &str) -> Option<&Chart> {
        self.part_charts
            .get(part)
            .and_then(|name| self.charts.get(name))
    }

    /// Uniform refinement of the whole tree.
    pub fn refine(&self, adapt: AdaptMode) -> Self {
        let fine_mesh = self.mesh.refine();
        let mut node = Self {
            mesh: fine_mesh,
            parts: BTreeMap::new(),
            charts: self.charts.clone(),
            part_charts: self.part_charts.clone(),
        };
        for (name, part) in &self.parts {
            node.parts
                .insert(name.clone(), part.refine(&self.mesh, &node.mesh));
        }
        if adapt == AdaptMode::Chart {
            node.adapt_to_charts();
        }
        node
    }

    /// Re-projects all chart-attached part vertices onto their charts.
    pub fn adapt_to_charts(&mut self) {
        for (part_name, chart_name) in &self.part_charts {
            let (Some(part), Some(chart)) =
                (self.parts.get(part_name), self.charts.get(chart_name))
            else {
                continue;
            };
            for &v in part.vertices() {
                let p = self.mesh.vertex(v);
                self.mesh.set_vertex(v, chart.project(p));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector2;

    #[test]
    fn test_part_tracking_through_refinement() {
        let mesh = ConformalMesh::unit_square_tri();
        let mut node = RootMeshNode::new(mesh);
        let boundary = MeshPart::whole_boundary(node.mesh());
        node.add_part("outer", boundary);

        let fine = node.refine(AdaptMode::None);
        let part = fine.find_part("outer").unwrap();
        // 4 old corners + 4 edge midpoints on the boundary.
        assert_eq!(part.vertices().len(), 8);
    }

    #[test]
    fn test_chart_adaption_projects_midpoints() {
        // Square mesh with the whole boundary attached to a circle of
        // radius 1 around the square's centre.
        let mesh = ConformalMesh::unit_square_quad();
        let mut node = RootMeshNode::new(mesh);
        node.add_part("outer", MeshPart::whole_boundary(node.mesh()));
        node.add_chart(
            "circle",
            Chart::circle(Vector2::new(0.5, 0.5), 0.5_f64.sqrt()),
        );
        node.attach_chart("outer", "circle").unwrap();

        let fine = node.refine(AdaptMode::Chart);
        let chart = fine.find_chart("circle").unwrap();
        for &v in fine.find_part("outer").unwrap().vertices() {
            assert!(chart.distance(fine.mesh().vertex(v)) < 1e-12);
        }
    }
}
