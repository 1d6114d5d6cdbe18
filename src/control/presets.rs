//! Hard-coded test-mode configurations
//!
//! The regression drivers run against fixed configuration trees instead
//! of files on disk; this module returns them pre-parsed.

use crate::config::PropertyMap;
use crate::error::FemResult;

/// Test-mode configurations for the mesh-optimisation drivers.
pub mod tests {
    use super::*;

    /// Application settings of the refinement regression: unit square,
    /// level 3, one optimisation pass.
    pub fn application_config() -> FemResult<PropertyMap> {
        PropertyMap::parse(
            r#"
[ApplicationSettings]
mesh_optimiser = HyperelasticityDefault
lvl_min = 0
lvl_max = 3
delta_t = 1e-2
t_end = 2e-2

[DomainControlSettings]
parti-type = fallback
parti-rank-elems = 4
adapt_mode = chart
"#,
        )
    }

    /// Mesh-optimiser sections of the regressions.
    pub fn meshopt_config() -> FemResult<PropertyMap> {
        PropertyMap::parse(
            r#"
[HyperelasticityDefault]
type = Hyperelasticity
config_section = HyperelasticityDefaultParameters
dirichlet_boundaries = bnd

[HyperelasticityDefaultParameters]
global_functional = HyperelasticityFunctional
local_functional = RumpfFunctional
solver_config = NLCG
fac_norm = 1.0
fac_det = 1.0
fac_cof = 0.0
fac_reg = 1e-8
exponent_det = 2
scale_computation = once_uniform
"#,
        )
    }

    /// Solver sections of the regressions.
    pub fn solver_config() -> FemResult<PropertyMap> {
        PropertyMap::parse(
            r#"
[NLCG]
type = NLCG
precon = none
plot = false
tol_rel = 1e-8
max_iter = 500
linesearch = MQCLinesearch
direction_update = DYHSHybrid
keep_iterates = 0

[MQCLinesearch]
type = MQCLinesearch
plot = false
max_iter = 20
tol_decrease = 1e-3
tol_curvature = 0.3
keep_iterates = 0

[StrongWolfeLinesearch]
type = StrongWolfeLinesearch
plot = false
max_iter = 20
tol_decrease = 1e-3
tol_curvature = 0.3
keep_iterates = 0
"#,
        )
    }

    /// Meshopt sections of the r-adaptation regression: a moving circle
    /// chart concentrates the cell sizes.
    pub fn r_adapt_meshopt_config() -> FemResult<PropertyMap> {
        PropertyMap::parse(
            r#"
[HyperelasticityRAdapt]
type = Hyperelasticity
config_section = HyperelasticityRAdaptParameters
dirichlet_boundaries = bnd

[HyperelasticityRAdaptParameters]
global_functional = HyperelasticityFunctional
local_functional = RumpfFunctional
solver_config = NLCG
fac_norm = 1.0
fac_det = 1.0
fac_cof = 0.0
fac_reg = 1e-8
exponent_det = 2
scale_computation = iter_concentration
conc_function_chart = moving_circle
conc_minval = 1e-1
conc_exponent = 1.0
"#,
        )
    }
}

#[cfg(test)]
mod preset_tests {
    use super::tests;

    #[test]
    fn test_presets_parse() {
        let app = tests::application_config().unwrap();
        assert!(app.query_section("ApplicationSettings").is_some());
        let meshopt = tests::meshopt_config().unwrap();
        assert_eq!(
            meshopt
                .query_section("HyperelasticityDefault")
                .unwrap()
                .query("type"),
            Some("Hyperelasticity")
        );
        let solver = tests::solver_config().unwrap();
        assert!(solver.query_section("MQCLinesearch").is_some());
        assert!(tests::r_adapt_meshopt_config().is_ok());
    }
}
