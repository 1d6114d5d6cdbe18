//! Mesh-optimiser control
//!
//! Wires a hyperelasticity functional and its NLCG stack from
//! property-map configuration, and runs the r-adaptation time loop:
//! move the named charts, re-equilibrate the interior, watch the
//! minimum angle.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::PropertyMap;
use crate::containers::VectorOps;
use crate::error::{FemError, FemResult};
use crate::geometry::{QualityStats, RootMeshNode};
use crate::meshopt::{
    ConcFunction, HyperelasticityFunctional, RumpfFunctional, RumpfParams, RumpfVariant,
    ScaleComputation,
};
use crate::nonlinear::{
    DirectionUpdate, Linesearch, LinesearchParams, MqcLinesearch, Nlcg, NonlinearFunctional,
    StrongWolfeLinesearch,
};
use crate::solver::SolverStatus;

/// Per-step report of the time loop.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StepStats {
    pub time: f64,
    pub quality: QualityStats,
    /// Max-norm of the mesh velocity `(coords_new - coords_old)/dt`.
    pub max_mesh_velocity: f64,
    pub solver_status: SolverStatus,
}

impl StepStats {
    /// JSON line for external post-processing.
    pub fn to_json(&self) -> FemResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Configuration-driven mesh optimiser for one mesh tree.
pub struct MeshoptControl {
    functional: Option<HyperelasticityFunctional>,
    linesearch_kind: LinesearchKind,
    linesearch_params: LinesearchParams<f64>,
    direction: DirectionUpdate,
    tol_rel: f64,
    max_iter: usize,
    plot: bool,
    /// Minimum-angle floor; crossing it aborts the time loop.
    pub angle_floor: f64,
    time: f64,
}

#[derive(Debug, Clone, Copy)]
enum LinesearchKind {
    StrongWolfe,
    Mqc,
}

impl MeshoptControl {
    /// Builds the optimiser from the meshopt and solver configuration
    /// trees, rooted at the named meshopt section.
    pub fn from_config(
        node: RootMeshNode,
        meshopt_config: &PropertyMap,
        meshopt_section: &str,
        solver_config: &PropertyMap,
    ) -> FemResult<Self> {
        let root = meshopt_config.require_section(meshopt_section)?;
        let kind = root.require(meshopt_section, "type")?;
        if kind != "Hyperelasticity" {
            return Err(FemError::UnknownSolverType(kind.to_string()));
        }
        let params_section_name = root.require(meshopt_section, "config_section")?;
        let params_section = meshopt_config.require_section(params_section_name)?;

        let dirichlet: Vec<String> = root
            .query("dirichlet_boundaries")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        let slip: Vec<String> = root
            .query("slip_boundaries")
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let fac_norm = params_section.parse_or("fac_norm", 1.0)?;
        let fac_det = params_section.parse_or("fac_det", 1.0)?;
        let fac_reg = params_section.parse_or("fac_reg", 1e-8)?;
        let exponent_det = params_section.parse_or("exponent_det", 1)?;
        let variant = match params_section.query("local_functional") {
            Some("RumpfFunctionalQ1Split") => RumpfVariant::Q1Split,
            _ => RumpfVariant::Standard,
        };
        let scale_mode: ScaleComputation = params_section
            .parse_or("scale_computation", "once_uniform".to_string())?
            .parse()?;
        let conc_chart = match params_section.query("conc_function_chart") {
            Some(chart) => {
                let conc = ConcFunction {
                    minval: params_section.parse_or("conc_minval", 1e-3)?,
                    exponent: params_section.parse_or("conc_exponent", 1.0)?,
                };
                Some((chart.to_string(), conc))
            }
            None => None,
        };

        let rumpf = RumpfFunctional::new(
            RumpfParams::new(fac_norm, fac_det, fac_reg, exponent_det)?,
            variant,
        );
        let functional = HyperelasticityFunctional::new(
            node, rumpf, scale_mode, conc_chart, dirichlet, slip,
        )?;

        // Solver tree: [<solver_config key>] type=NLCG with a linked
        // linesearch section.
        let solver_section_name = params_section
            .query("solver_config")
            .unwrap_or("NLCG")
            .to_string();
        let solver_section = solver_config.require_section(&solver_section_name)?;
        if solver_section.require(&solver_section_name, "type")? != "NLCG" {
            return Err(FemError::UnknownSolverType(
                "mesh optimiser expects an NLCG solver section".to_string(),
            ));
        }
        let direction: DirectionUpdate = solver_section
            .parse_or("direction_update", "DYHSHybrid".to_string())?
            .parse()?;
        let tol_rel = solver_section.parse_or("tol_rel", 1e-8)?;
        let max_iter = solver_section.parse_or("max_iter", 100)?;
        let plot = solver_section.parse_or("plot", false)?;

        let ls_section_name = solver_section.parse_or("linesearch", "MQCLinesearch".to_string())?;
        let ls_section = solver_config.require_section(&ls_section_name)?;
        let linesearch_kind = match ls_section.require(&ls_section_name, "type")? {
            "StrongWolfeLinesearch" => LinesearchKind::StrongWolfe,
            "MQCLinesearch" => LinesearchKind::Mqc,
            other => return Err(FemError::UnknownSolverType(other.to_string())),
        };
        let linesearch_params = LinesearchParams {
            tol_decrease: ls_section.parse_or("tol_decrease", 1e-3)?,
            tol_curvature: ls_section.parse_or("tol_curvature", 0.3)?,
            max_iter: ls_section.parse_or("max_iter", 20)?,
            plot: ls_section.parse_or("plot", false)?,
        };

        Ok(Self {
            functional: Some(functional),
            linesearch_kind,
            linesearch_params,
            direction,
            tol_rel,
            max_iter,
            plot,
            angle_floor: 1.0,
            time: 0.0,
        })
    }

    pub fn node(&self) -> &RootMeshNode {
        self.functional.as_ref().expect("functional present").node()
    }

    pub fn node_mut(&mut self) -> &mut RootMeshNode {
        self.functional
            .as_mut()
            .expect("functional present")
            .node_mut()
    }

    pub fn quality(&self) -> QualityStats {
        self.functional
            .as_ref()
            .expect("functional present")
            .quality()
    }

    fn make_linesearch(&self) -> Linesearch<f64> {
        match self.linesearch_kind {
            LinesearchKind::StrongWolfe => Linesearch::StrongWolfe(StrongWolfeLinesearch::new(
                self.linesearch_params.clone(),
            )),
            LinesearchKind::Mqc => {
                Linesearch::Mqc(MqcLinesearch::new(self.linesearch_params.clone()))
            }
        }
    }

    /// One full optimisation of the current mesh.
    pub fn optimise(&mut self) -> FemResult<SolverStatus> {
        // The functional moves through the solver and back, error or not.
        let functional = self.functional.take().expect("functional present");
        let (functional, result) = self.run_nlcg(functional);
        self.functional = Some(functional);
        result
    }

    fn run_nlcg(
        &self,
        mut functional: HyperelasticityFunctional,
    ) -> (HyperelasticityFunctional, FemResult<SolverStatus>) {
        if let Err(e) = functional.init_scales() {
            return (functional, Err(e));
        }
        let filter = match functional.assemble_filter() {
            Ok(f) => Arc::new(f),
            Err(e) => return (functional, Err(e)),
        };
        let mut x = functional.coords();

        let mut solver = Nlcg::new(
            functional,
            filter,
            self.make_linesearch(),
            self.direction,
            None,
        );
        solver
            .params
            .set_tol_rel(self.tol_rel)
            .set_max_iter(self.max_iter)
            .set_plot(self.plot);
        let status = solver.optimise(&mut x);

        let mut functional = solver.into_functional();
        let result = status.and_then(|s| functional.prepare(&x).map(|_| s));
        (functional, result)
    }

    /// Advances the time loop by one step: moves the named charts by
    /// their per-step displacement, re-equilibrates the interior with
    /// the moved boundary as Dirichlet data, and reports quality plus
    /// mesh velocity. Crossing the angle floor aborts with
    /// `MeshDeteriorated`; the caller still owns the mesh for export.
    pub fn time_step(&mut self, delta_t: f64, rotation_speed: f64) -> FemResult<StepStats> {
        if delta_t <= 0.0 {
            return Err(FemError::InvalidArgument(
                "timestep must be positive".to_string(),
            ));
        }
        let old_coords = self.node().mesh().coords_buffer();
        self.time += delta_t;

        // Per-step chart displacement, applied with opposite signs to
        // the merging pairs.
        let dir = Vector2::new(delta_t / 2.0, delta_t / 2.0);
        let angle = rotation_speed * delta_t;
        let chart_names: Vec<String> =
            self.node().chart_names().map(str::to_string).collect();
        for name in &chart_names {
            let node = self.node_mut();
            let chart = node.find_chart_mut(name)?;
            if name.starts_with("moving_") || name.starts_with("pos_merging_") {
                chart.translate(dir);
            } else if name.starts_with("neg_merging_") {
                chart.translate(-dir);
            }
            if name.starts_with("rotating_") {
                chart.rotate(angle);
            }
        }
        // Boundary vertices follow their charts before the interior is
        // re-equilibrated.
        self.node_mut().adapt_to_charts();

        let status = self.optimise()?;

        let new_coords = self.node().mesh().coords_buffer();
        let mut velocity = new_coords.clone_layout();
        velocity.axpy(&old_coords, &new_coords, -1.0)?;
        let mut scaled = velocity.clone_layout();
        scaled.scale(&velocity, 1.0 / delta_t)?;

        let quality = self.quality();
        log::info!(
            "t = {:.4}: min angle {:.2}, quality {:.3}, size defect {:.3}",
            self.time,
            quality.min_angle,
            quality.min_quality,
            quality.cell_size_defect
        );
        self.functional
            .as_ref()
            .expect("functional present")
            .check_deterioration(self.angle_floor)?;
        Ok(StepStats {
            time: self.time,
            quality,
            max_mesh_velocity: scaled.max_abs_element(),
            solver_status: status,
        })
    }
}
