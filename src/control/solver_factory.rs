//! Configuration-driven solver factory
//!
//! Resolves the DAG of solver sections (`precon = <section>`,
//! `smoother = <section>`, `coarse = <section>`) against a
//! [`MatrixStock`] and instantiates a fully wired solver tree. A
//! reference cycle in the configuration is reported as an error instead
//! of looping.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::PropertyMap;
use crate::containers::DenseVector;
use crate::control::MatrixStock;
use crate::error::{FemError, FemResult};
use crate::solver::{
    BiCgStab, CycleType, FGmres, IluPrecon, JacobiPrecon, MgLevel, MultiGrid, Pcg, Pcr,
    Richardson, ScalePrecon, SolverBox, SorPrecon,
};

/// Builds the solver tree rooted at `section` for the stock's finest
/// level.
pub fn build_solver(
    config: &PropertyMap,
    section: &str,
    stock: &MatrixStock,
) -> FemResult<SolverBox<DenseVector<f64>>> {
    let mut visiting = BTreeSet::new();
    build_at_level(config, section, stock, 0, &mut visiting)
}

fn build_at_level(
    config: &PropertyMap,
    section_name: &str,
    stock: &MatrixStock,
    level: usize,
    visiting: &mut BTreeSet<String>,
) -> FemResult<SolverBox<DenseVector<f64>>> {
    if !visiting.insert(section_name.to_string()) {
        return Err(FemError::ConfigCycle(section_name.to_string()));
    }
    let result = build_inner(config, section_name, stock, level, visiting);
    visiting.remove(section_name);
    result
}

fn build_inner(
    config: &PropertyMap,
    section_name: &str,
    stock: &MatrixStock,
    level: usize,
    visiting: &mut BTreeSet<String>,
) -> FemResult<SolverBox<DenseVector<f64>>> {
    let section = config.require_section(section_name)?;
    let kind = section.require(section_name, "type")?;
    let stock_level = &stock.levels[level];
    let matrix = Arc::clone(&stock_level.matrix);
    let filter = Arc::clone(&stock_level.filter);

    let precon = match section.query("precon") {
        Some("none") | None => None,
        Some(name) => Some(build_at_level(config, name, stock, level, visiting)?),
    };

    let mut solver: SolverBox<DenseVector<f64>> = match kind {
        "richardson" => {
            let omega = section.parse_or("omega", 1.0)?;
            let mut s = Richardson::new(matrix, filter, precon, omega);
            apply_iter_params(&mut s.params, section)?;
            Box::new(s)
        }
        "pcg" => {
            let mut s = Pcg::new(matrix, filter, precon);
            apply_iter_params(&mut s.params, section)?;
            Box::new(s)
        }
        "bicgstab" => {
            let mut s = BiCgStab::new(matrix, filter, precon);
            apply_iter_params(&mut s.params, section)?;
            Box::new(s)
        }
        "fgmres" => {
            let dim = section.parse_or("krylov_dim", 16usize)?;
            let mut s = FGmres::new(matrix, filter, precon, dim);
            apply_iter_params(&mut s.params, section)?;
            Box::new(s)
        }
        "pcr" => {
            let mut s = Pcr::new(matrix, filter, precon);
            apply_iter_params(&mut s.params, section)?;
            Box::new(s)
        }
        "jacobi" => {
            let omega = section.parse_or("omega", 1.0)?;
            Box::new(JacobiPrecon::new(matrix, omega))
        }
        "sor" => {
            let omega = section.parse_or("omega", 1.0)?;
            let sweeps = section.parse_or("sweeps", 1usize)?;
            Box::new(SorPrecon::new(matrix, omega, sweeps))
        }
        "ilu" => Box::new(IluPrecon::new(matrix)),
        "scale" => {
            let omega = section.parse_or("omega", 1.0)?;
            Box::new(ScalePrecon::new(omega))
        }
        "mg" => build_multigrid(config, section_name, stock, level, visiting)?,
        other => return Err(FemError::UnknownSolverType(other.to_string())),
    };
    solver.init()?;
    Ok(solver)
}

fn build_multigrid(
    config: &PropertyMap,
    section_name: &str,
    stock: &MatrixStock,
    level: usize,
    visiting: &mut BTreeSet<String>,
) -> FemResult<SolverBox<DenseVector<f64>>> {
    let section = config.require_section(section_name)?;
    let cycle = CycleType::from_str(section.parse_or("cycle", "v".to_string())?.as_str())?;
    let smoother_section = section.require(section_name, "smoother")?;
    let coarse_section = section.require(section_name, "coarse")?;

    let num_levels = stock.num_levels();
    let mut levels = Vec::new();
    for lvl in level..num_levels {
        let stock_level = &stock.levels[lvl];
        let mut mg_level = MgLevel::new(
            Arc::clone(&stock_level.matrix) as Arc<dyn crate::containers::LinOp<_>>,
            Arc::clone(&stock_level.filter) as Arc<dyn crate::filter::Filter<_>>,
            stock_level.template.clone(),
        );
        if lvl + 1 < num_levels {
            let transfer = stock_level
                .transfer
                .as_ref()
                .ok_or_else(|| FemError::Internal(format!("level {lvl} misses a transfer")))?;
            mg_level = mg_level.with_transfer(transfer.clone() as Arc<dyn crate::transfer::TransferOps<_>>);
            let pre = build_at_level(config, smoother_section, stock, lvl, visiting)?;
            let post = build_at_level(config, smoother_section, stock, lvl, visiting)?;
            mg_level = mg_level.with_smoothers(Some(pre), Some(post));
        }
        levels.push(mg_level);
    }
    let coarse = build_at_level(config, coarse_section, stock, num_levels - 1, visiting)?;

    let mut mg = MultiGrid::new(levels, coarse, cycle)?;
    apply_iter_params(&mut mg.params, section)?;
    Ok(Box::new(mg))
}

fn apply_iter_params(
    params: &mut crate::solver::IterParams<f64>,
    section: &crate::config::Section,
) -> FemResult<()> {
    params.max_iter = section.parse_or("max_iter", params.max_iter)?;
    params.min_iter = section.parse_or("min_iter", params.min_iter)?;
    params.tol_rel = section.parse_or("tol_rel", params.tol_rel)?;
    params.tol_abs = section.parse_or("tol_abs", params.tol_abs)?;
    params.plot = section.parse_or("plot", params.plot)?;
    Ok(())
}
