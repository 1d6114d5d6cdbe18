//! Geometric multigrid

use std::sync::Arc;

use crate::scalar::DataType;
use crate::containers::{LinOp, VectorOps};
use crate::error::{FemError, FemResult};
use crate::filter::Filter;
use crate::solver::{IterParams, Solver, SolverBox, SolverStatus};
use crate::transfer::TransferOps;

/// Multigrid cycle shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleType {
    V,
    W,
    F,
}

impl std::str::FromStr for CycleType {
    type Err = FemError;

    fn from_str(s: &str) -> FemResult<Self> {
        match s {
            "v" | "V" => Ok(CycleType::V),
            "w" | "W" => Ok(CycleType::W),
            "f" | "F" => Ok(CycleType::F),
            other => Err(FemError::InvalidArgument(format!(
                "unknown cycle type '{other}'"
            ))),
        }
    }
}

/// Redistribution hook at an agglomerated layer boundary.
///
/// Implemented by [`crate::global::Muxer`]; the restricted defect is
/// joined onto the parent before the coarse solve and the correction is
/// split back afterwards.
pub trait LayerMux<V>: Send + Sync {
    fn join(&self, fine: &V, coarse: &mut V) -> FemResult<()>;

    fn split(&self, coarse: &V, fine: &mut V) -> FemResult<()>;
}

impl<C, V> LayerMux<V> for crate::global::Muxer<C>
where
    C: crate::comm::Comm,
    V: crate::global::Syncable + Send + Sync,
{
    fn join(&self, fine: &V, coarse: &mut V) -> FemResult<()> {
        crate::global::Muxer::join(self, fine, coarse)
    }

    fn split(&self, coarse: &V, fine: &mut V) -> FemResult<()> {
        crate::global::Muxer::split(self, coarse, fine)
    }
}

/// One grid level of the hierarchy, finest first.
pub struct MgLevel<V: VectorOps> {
    pub matrix: Arc<dyn LinOp<V>>,
    pub filter: Arc<dyn Filter<V>>,
    /// Pre- and post-smoothers; `None` skips the pass.
    pub smoother_pre: Option<SolverBox<V>>,
    pub smoother_post: Option<SolverBox<V>>,
    /// Transfer to the next coarser level; `None` on the coarsest.
    pub transfer: Option<Arc<dyn TransferOps<V>>>,
    /// Optional agglomeration boundary below this level.
    pub muxer: Option<Arc<dyn LayerMux<V>>>,
    /// Zero vector of this level's layout.
    pub template: V,
}

impl<V: VectorOps> MgLevel<V> {
    pub fn new(matrix: Arc<dyn LinOp<V>>, filter: Arc<dyn Filter<V>>, template: V) -> Self {
        Self {
            matrix,
            filter,
            smoother_pre: None,
            smoother_post: None,
            transfer: None,
            muxer: None,
            template,
        }
    }

    pub fn with_smoothers(
        mut self,
        pre: Option<SolverBox<V>>,
        post: Option<SolverBox<V>>,
    ) -> Self {
        self.smoother_pre = pre;
        self.smoother_post = post;
        self
    }

    pub fn with_transfer(mut self, transfer: Arc<dyn TransferOps<V>>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    pub fn with_muxer(mut self, muxer: Arc<dyn LayerMux<V>>) -> Self {
        self.muxer = Some(muxer);
        self
    }
}

/// Geometric multigrid over an externally assembled level hierarchy.
///
/// Acts as a preconditioner with `max_iter = 1`, or as a standalone
/// solver with the usual stopping parameters.
pub struct MultiGrid<V: VectorOps> {
    levels: Vec<MgLevel<V>>,
    coarse: SolverBox<V>,
    cycle: CycleType,
    pub params: IterParams<V::Scalar>,
}

impl<V: VectorOps + Send + Sync> MultiGrid<V> {
    /// `levels` runs finest to coarsest; the coarse solver acts on the
    /// last entry's layout.
    pub fn new(levels: Vec<MgLevel<V>>, coarse: SolverBox<V>, cycle: CycleType) -> FemResult<Self> {
        if levels.is_empty() {
            return Err(FemError::InvalidArgument(
                "multigrid needs at least one level".to_string(),
            ));
        }
        for (k, lvl) in levels.iter().enumerate() {
            if k + 1 < levels.len() && lvl.transfer.is_none() {
                return Err(FemError::InvalidArgument(format!(
                    "level {k} is not the coarsest but has no transfer"
                )));
            }
        }
        Ok(Self {
            levels,
            coarse,
            cycle,
            params: IterParams::default(),
        })
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    fn smooth(
        smoother: &mut Option<SolverBox<V>>,
        filter: &dyn Filter<V>,
        x: &mut V,
        b: &V,
    ) -> FemResult<()> {
        if let Some(s) = smoother {
            s.apply(x, b)?;
            filter.filter_sol(x)?;
        }
        Ok(())
    }

    /// One multigrid cycle on level `lvl`, solving `A_lvl * x = b`.
    fn cycle_level(&mut self, lvl: usize, x: &mut V, b: &V, cycle: CycleType) -> FemResult<()> {
        if lvl + 1 == self.levels.len() {
            x.format(V::Scalar::of(0.0));
            self.coarse.apply(x, b)?;
            self.levels[lvl].filter.filter_sol(x)?;
            return Ok(());
        }

        // Pre-smoothing.
        {
            let level = &mut self.levels[lvl];
            let filter = Arc::clone(&level.filter);
            Self::smooth(&mut level.smoother_pre, filter.as_ref(), x, b)?;
        }

        // Restrict the defect.
        let (mut coarse_rhs, mut coarse_x) = {
            let below = &self.levels[lvl + 1];
            (below.template.clone_layout(), below.template.clone_layout())
        };
        {
            let level = &self.levels[lvl];
            let mut def = level.template.clone_layout();
            level.matrix.apply_defect(&mut def, b, x)?;
            level.filter.filter_def(&mut def)?;
            let transfer = level.transfer.as_ref().expect("checked in constructor");
            transfer.restrict(&mut coarse_rhs, &def)?;
            self.levels[lvl + 1].filter.filter_def(&mut coarse_rhs)?;
            if let Some(muxer) = &level.muxer {
                let mut joined = coarse_rhs.clone_layout();
                muxer.join(&coarse_rhs, &mut joined)?;
                coarse_rhs = joined;
            }
        }

        // Coarse visits: one for V, two for W, F-then-V for F.
        match cycle {
            CycleType::V => {
                self.cycle_level(lvl + 1, &mut coarse_x, &coarse_rhs, CycleType::V)?;
            }
            CycleType::W => {
                self.cycle_level(lvl + 1, &mut coarse_x, &coarse_rhs, CycleType::W)?;
                self.cycle_level(lvl + 1, &mut coarse_x, &coarse_rhs, CycleType::W)?;
            }
            CycleType::F => {
                self.cycle_level(lvl + 1, &mut coarse_x, &coarse_rhs, CycleType::F)?;
                self.cycle_level(lvl + 1, &mut coarse_x, &coarse_rhs, CycleType::V)?;
            }
        }

        // Prolongate and correct.
        {
            let level = &self.levels[lvl];
            if let Some(muxer) = &level.muxer {
                let mut split_x = coarse_x.clone_layout();
                muxer.split(&coarse_x, &mut split_x)?;
                coarse_x = split_x;
            }
            let mut cor = level.template.clone_layout();
            let transfer = level.transfer.as_ref().expect("checked in constructor");
            transfer.prolong(&mut cor, &coarse_x)?;
            level.filter.filter_cor(&mut cor)?;
            let old = x.clone();
            x.axpy(&cor, &old, V::Scalar::of(1.0))?;
        }

        // Post-smoothing.
        {
            let level = &mut self.levels[lvl];
            let filter = Arc::clone(&level.filter);
            Self::smooth(&mut level.smoother_post, filter.as_ref(), x, b)?;
        }
        Ok(())
    }
}

impl<V: VectorOps + Send + Sync> Solver<V> for MultiGrid<V> {
    fn name(&self) -> &str {
        "MultiGrid"
    }

    fn init(&mut self) -> FemResult<()> {
        for level in &mut self.levels {
            if let Some(s) = &mut level.smoother_pre {
                s.init()?;
            }
            if let Some(s) = &mut level.smoother_post {
                s.init()?;
            }
        }
        self.coarse.init()
    }

    fn apply(&mut self, x: &mut V, b: &V) -> FemResult<SolverStatus> {
        let mut def = self.levels[0].template.clone_layout();
        self.levels[0].matrix.apply_defect(&mut def, b, x)?;
        self.levels[0].filter.filter_def(&mut def)?;
        let norm0 = def.norm2();
        self.params.plot_iter(self.name(), 0, norm0);
        if self.params.converged(norm0, norm0) {
            return Ok(SolverStatus::Success);
        }

        for iter in 1..=self.params.max_iter {
            let cycle = self.cycle;
            self.cycle_level(0, x, b, cycle)?;

            self.levels[0].matrix.apply_defect(&mut def, b, x)?;
            self.levels[0].filter.filter_def(&mut def)?;
            let norm = def.norm2();
            self.params.plot_iter(self.name(), iter, norm);
            if let Some(status) = self.params.check(iter, norm0, norm) {
                return Ok(status);
            }
        }
        Ok(SolverStatus::MaxIter)
    }

    fn done(&mut self) {
        for level in &mut self.levels {
            if let Some(s) = &mut level.smoother_pre {
                s.done();
            }
            if let Some(s) = &mut level.smoother_post {
                s.done();
            }
        }
        self.coarse.done();
    }
}
