//! Domain control: level hierarchy construction

use std::sync::Arc;

use crate::comm::Comm;
use crate::error::{FemError, FemResult};
use crate::geometry::{AdaptMode, ConformalMesh, MeshPart, RootMeshNode, ShapeType};
use crate::global::{Gate, Muxer, VectorMirror};

/// One level of the hierarchy: mesh tree, gate and the muxer towards
/// the next coarser layer.
pub struct DomainLevel<C: Comm> {
    pub level_index: usize,
    pub node: RootMeshNode,
    pub gate: Arc<Gate<C>>,
    /// Redistribution towards the coarser level; trivial outside
    /// agglomerated layer boundaries.
    pub muxer_to_coarser: Option<Arc<Muxer<C>>>,
}

/// Builds and owns the level hierarchy for one space, together with the
/// MPI neighbour topology. Levels run finest first, matching the solver
/// stack. Levels are dropped top-down (finest first) by construction
/// order.
pub struct DomainControl<C: Comm> {
    comm: Arc<C>,
    levels: Vec<DomainLevel<C>>,
}

impl<C: Comm> DomainControl<C> {
    /// Refines a base tree through `lvl_max` levels and keeps
    /// `lvl_min..=lvl_max`, finest first.
    pub fn from_base(
        comm: Arc<C>,
        base: RootMeshNode,
        lvl_min: usize,
        lvl_max: usize,
        adapt: AdaptMode,
    ) -> FemResult<Self> {
        if lvl_min > lvl_max {
            return Err(FemError::InvalidArgument(format!(
                "lvl_min {lvl_min} exceeds lvl_max {lvl_max}"
            )));
        }
        let mut nodes = vec![base];
        for _ in 0..lvl_max {
            let next = nodes.last().expect("non-empty").refine(adapt);
            nodes.push(next);
        }

        let mut levels = Vec::new();
        for (idx, node) in nodes.into_iter().enumerate().rev() {
            if idx < lvl_min {
                break;
            }
            let n_dofs = node.mesh().num_vertices();
            let gate = Arc::new(Gate::new(Arc::clone(&comm), idx as u64 + 1, n_dofs));
            // Single-process layers: the muxer is the identity
            // agglomeration and degenerates to a copy.
            let muxer = if idx > lvl_min {
                let mut m = Muxer::new(Arc::clone(&comm), 1000 + idx as u64);
                let coarse_dofs = n_dofs;
                m.push_child(comm.rank(), VectorMirror::identity(coarse_dofs));
                m.set_parent(comm.rank(), VectorMirror::identity(coarse_dofs));
                Some(Arc::new(m))
            } else {
                None
            };
            levels.push(DomainLevel {
                level_index: idx,
                node,
                gate,
                muxer_to_coarser: muxer,
            });
        }
        Ok(Self { comm, levels })
    }

    /// Unit-square hierarchy with the whole boundary registered as the
    /// part `"bnd"`.
    pub fn new_unit_square(
        comm: Arc<C>,
        shape: ShapeType,
        lvl_min: usize,
        lvl_max: usize,
    ) -> FemResult<Self> {
        let mesh = match shape {
            ShapeType::Simplex2 => ConformalMesh::unit_square_tri(),
            ShapeType::Hypercube2 => ConformalMesh::unit_square_quad(),
        };
        let mut node = RootMeshNode::new(mesh);
        let boundary = MeshPart::whole_boundary(node.mesh());
        node.add_part("bnd", boundary);
        Self::from_base(comm, node, lvl_min, lvl_max, AdaptMode::None)
    }

    pub fn comm(&self) -> &Arc<C> {
        &self.comm
    }

    /// Levels, finest first.
    pub fn levels(&self) -> &[DomainLevel<C>] {
        &self.levels
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn finest(&self) -> &DomainLevel<C> {
        &self.levels[0]
    }

    pub fn coarsest(&self) -> &DomainLevel<C> {
        self.levels.last().expect("hierarchy is non-empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;

    #[test]
    fn test_hierarchy_levels() {
        let comm = Arc::new(SerialComm::new());
        let dc = DomainControl::new_unit_square(comm, ShapeType::Simplex2, 1, 3).unwrap();
        assert_eq!(dc.num_levels(), 3);
        assert_eq!(dc.finest().level_index, 3);
        assert_eq!(dc.coarsest().level_index, 1);
        // Finest level of the tri hierarchy: 2*4^3 cells.
        assert_eq!(dc.finest().node.mesh().num_cells(), 128);
        // Boundary part tracked through refinement.
        assert!(!dc.finest().node.find_part("bnd").unwrap().is_empty());
    }
}
