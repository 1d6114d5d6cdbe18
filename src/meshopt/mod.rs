//! Mesh-quality optimisation
//!
//! The hyperelasticity functional measures mesh quality through the
//! Rumpf cell energies and drives the nonlinear solver stack to move
//! vertex coordinates, honouring Dirichlet and slip boundaries.

pub mod rumpf;
pub mod scale;

pub use rumpf::{RumpfFunctional, RumpfParams, RumpfVariant};
pub use scale::{ConcFunction, ScaleComputation, ScaleData};

use nalgebra::Vector2;

use crate::containers::{DenseVectorBlocked, VectorOps};
use crate::error::{FemError, FemResult};
use crate::filter::{FilterChain, SlipFilter};
use crate::geometry::{quality, AdaptMode, QualityStats, RootMeshNode};
use crate::nonlinear::NonlinearFunctional;

/// The global mesh-quality functional: sums the Rumpf cell energies over
/// the mesh and exposes the gradient with respect to all vertex
/// coordinates.
///
/// Boundary handling: Dirichlet parts are fixed through a blocked unit
/// filter on the coordinate vector; slip parts slide on their chart and
/// are re-projected whenever the iterate moves.
pub struct HyperelasticityFunctional {
    node: RootMeshNode,
    functional: RumpfFunctional,
    scale_mode: ScaleComputation,
    conc_chart: Option<(String, ConcFunction)>,
    scales: ScaleData,
    dirichlet_parts: Vec<String>,
    slip_parts: Vec<String>,
}

impl HyperelasticityFunctional {
    pub fn new(
        node: RootMeshNode,
        functional: RumpfFunctional,
        scale_mode: ScaleComputation,
        conc_chart: Option<(String, ConcFunction)>,
        dirichlet_parts: Vec<String>,
        slip_parts: Vec<String>,
    ) -> FemResult<Self> {
        for p in dirichlet_parts.iter().chain(&slip_parts) {
            node.find_part(p)?;
        }
        if scale_mode == ScaleComputation::IterConcentration && conc_chart.is_none() {
            return Err(FemError::InvalidArgument(
                "iter_concentration needs a concentration chart".to_string(),
            ));
        }
        let scales = Self::compute_scales_for(&node, scale_mode, conc_chart.as_ref())?;
        Ok(Self {
            node,
            functional,
            scale_mode,
            conc_chart,
            scales,
            dirichlet_parts,
            slip_parts,
        })
    }

    pub fn node(&self) -> &RootMeshNode {
        &self.node
    }

    pub fn node_mut(&mut self) -> &mut RootMeshNode {
        &mut self.node
    }

    pub fn scales(&self) -> &ScaleData {
        &self.scales
    }

    fn compute_scales_for(
        node: &RootMeshNode,
        mode: ScaleComputation,
        conc: Option<&(String, ConcFunction)>,
    ) -> FemResult<ScaleData> {
        match mode {
            ScaleComputation::OnceUniform | ScaleComputation::CurrentUniform => {
                Ok(scale::compute_uniform(node.mesh()))
            }
            ScaleComputation::IterConcentration => {
                let (chart_name, conc_fn) = conc.ok_or_else(|| {
                    FemError::InvalidArgument("missing concentration chart".to_string())
                })?;
                let chart = node.find_chart(chart_name)?;
                Ok(scale::compute_concentrated(node.mesh(), chart, conc_fn))
            }
        }
    }

    /// Recomputes scales for the current mesh; called by the outer
    /// driver before each optimisation, and from `prepare` for the
    /// per-iteration mode.
    pub fn init_scales(&mut self) -> FemResult<()> {
        if self.scale_mode != ScaleComputation::OnceUniform {
            self.scales =
                Self::compute_scales_for(&self.node, self.scale_mode, self.conc_chart.as_ref())?;
        }
        Ok(())
    }

    /// Current vertex coordinates as the optimisation vector.
    pub fn coords(&self) -> DenseVectorBlocked<f64, 2> {
        self.node.mesh().coords_buffer()
    }

    /// Assembles the boundary-condition filter chain for the current
    /// boundary positions: slip filters first, unit filters last so
    /// fixed dofs always win.
    pub fn assemble_filter(&self) -> FemResult<FilterChain<DenseVectorBlocked<f64, 2>>> {
        let mut chain = FilterChain::new();
        for name in &self.slip_parts {
            let part = self.node.find_part(name)?;
            let mut normals =
                crate::assembly::assemble_slip_normals(self.node.mesh(), part)?;
            normals.normalise();
            chain.push(Box::new(SlipFilter::from_normals(normals)));
        }
        for name in &self.dirichlet_parts {
            let part = self.node.find_part(name)?;
            let filter = crate::assembly::assemble_coordinate_filter(part, self.node.mesh());
            chain.push(Box::new(filter));
        }
        Ok(chain)
    }

    /// Quality statistics of the current mesh against the target
    /// distribution.
    pub fn quality(&self) -> QualityStats {
        quality::stats(self.node.mesh(), Some(&self.scales.lambda))
    }

    /// Aborts when the minimum angle crossed the floor.
    pub fn check_deterioration(&self, floor_degrees: f64) -> FemResult<()> {
        let angle = quality::min_angle(self.node.mesh());
        if angle < floor_degrees {
            return Err(FemError::MeshDeteriorated {
                angle,
                floor: floor_degrees,
            });
        }
        Ok(())
    }

    fn project_slip_vertices(&mut self) {
        for name in self.slip_parts.clone() {
            let Ok(part) = self.node.find_part(&name) else {
                continue;
            };
            let verts: Vec<usize> = part.vertices().to_vec();
            if let Some(chart) = self.node.chart_of_part(&name).cloned() {
                for v in verts {
                    let p = self.node.mesh().vertex(v);
                    self.node.mesh_mut().set_vertex(v, chart.project(p));
                }
            }
        }
    }

    fn cell_coords(&self, c: usize) -> ([Vector2<f64>; 4], usize) {
        let verts = self.node.mesh().cell(c);
        let mut x = [Vector2::zeros(); 4];
        for (k, &v) in verts.iter().enumerate() {
            x[k] = self.node.mesh().vertex(v);
        }
        (x, verts.len())
    }
}

impl NonlinearFunctional<DenseVectorBlocked<f64, 2>> for HyperelasticityFunctional {
    fn prepare(&mut self, x: &DenseVectorBlocked<f64, 2>) -> FemResult<()> {
        self.node.mesh_mut().set_coords(x)?;
        self.project_slip_vertices();
        if self.scale_mode == ScaleComputation::IterConcentration {
            self.init_scales()?;
        }
        Ok(())
    }

    fn value(&mut self, _x: &DenseVectorBlocked<f64, 2>) -> FemResult<f64> {
        let mesh = self.node.mesh();
        let shape = mesh.shape();
        let mut sum = 0.0;
        for c in 0..mesh.num_cells() {
            let (x, n) = self.cell_coords(c);
            sum += self.functional.cell_value(shape, &x[..n], self.scales.h[c]);
        }
        Ok(sum)
    }

    fn gradient(
        &mut self,
        grad: &mut DenseVectorBlocked<f64, 2>,
        _x: &DenseVectorBlocked<f64, 2>,
    ) -> FemResult<()> {
        grad.format(0.0);
        let shape = self.node.mesh().shape();
        for c in 0..self.node.mesh().num_cells() {
            let (x, n) = self.cell_coords(c);
            let h = self.scales.h[c];
            let mut local = [Vector2::zeros(); 4];
            self.functional.cell_gradient(shape, &x[..n], h, &mut local);
            if let Some(table) = &self.scales.grad_h {
                self.functional
                    .add_grad_h_part(shape, &x[..n], h, &table[c], &mut local);
            }
            let verts: Vec<usize> = self.node.mesh().cell(c).to_vec();
            for (k, &v) in verts.iter().enumerate() {
                grad.add_at(v, local[k]);
            }
        }
        Ok(())
    }
}

/// Refines a node tree to a target level with the given adapt mode.
pub fn refine_to_level(mut node: RootMeshNode, levels: usize, adapt: AdaptMode) -> RootMeshNode {
    for _ in 0..levels {
        node = node.refine(adapt);
    }
    node
}
