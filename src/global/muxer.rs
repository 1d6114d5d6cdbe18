//! Coarse-layer redistribution muxer

use std::sync::Arc;

use crate::comm::{waitall_send, Comm};
use crate::error::FemResult;
use crate::global::{Syncable, VectorMirror};
use crate::scalar::DataType;

/// Bi-directional redistribution between a fine-layer process set and a
/// coarse-layer parent process.
///
/// The parent side holds one child-mirror per child rank; every child
/// holds one parent-mirror describing where its owned dofs land in the
/// parent's coarse vector. A rank may play both roles at once (the
/// parent is usually one of its own children). The trivial agglomeration
/// of a single local child through an identity mirror degenerates to a
/// plain copy without touching the transport.
pub struct Muxer<C: Comm> {
    comm: Arc<C>,
    tag: u64,
    /// Parent side: (child rank, mirror into the coarse vector).
    children: Vec<(usize, VectorMirror)>,
    /// Child side: (parent rank, mirror over the fine vector's owned dofs).
    parent: Option<(usize, VectorMirror)>,
}

impl<C: Comm> Muxer<C> {
    pub fn new(comm: Arc<C>, tag: u64) -> Self {
        Self {
            comm,
            tag,
            children: Vec::new(),
            parent: None,
        }
    }

    /// Registers a child on the parent side.
    pub fn push_child(&mut self, rank: usize, mirror: VectorMirror) {
        self.children.push((rank, mirror));
    }

    /// Sets the parent on the child side.
    pub fn set_parent(&mut self, rank: usize, mirror: VectorMirror) {
        self.parent = Some((rank, mirror));
    }

    pub fn is_parent(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_child(&self) -> bool {
        self.parent.is_some()
    }

    /// True for the degenerate single-local-child identity setup.
    fn is_trivial(&self, fine_dofs: usize) -> bool {
        self.children.len() == 1
            && self.children[0].0 == self.comm.rank()
            && matches!(&self.parent, Some((rank, mirror))
                if *rank == self.comm.rank() && mirror.is_identity(fine_dofs))
    }

    /// Joins the fine-layer contributions onto the parent's coarse vector.
    ///
    /// Children send their owned dofs through the parent-mirror; on the
    /// parent the child-mirrors scatter-add into `coarse`.
    pub fn join<V: Syncable>(&self, fine: &V, coarse: &mut V) -> FemResult<()> {
        if self.is_trivial(fine.size()) {
            return coarse.copy_from(fine);
        }
        let mut recvs = Vec::with_capacity(self.children.len());
        for (rank, _) in &self.children {
            recvs.push(self.comm.irecv(*rank, self.tag)?);
        }
        let mut sends = Vec::new();
        if let Some((rank, mirror)) = &self.parent {
            sends.push(self.comm.isend(mirror.gather(fine), *rank, self.tag)?);
        }
        if self.is_parent() {
            coarse.format(V::Scalar::of(0.0));
            for ((_, mirror), req) in self.children.iter().zip(recvs) {
                let buf = self.comm.wait_recv(req)?;
                mirror.scatter_add(coarse, &buf)?;
            }
        }
        waitall_send(self.comm.as_ref(), sends)
    }

    /// Splits the parent's coarse vector back to the fine layer; the
    /// transpose of [`Self::join`].
    pub fn split<V: Syncable>(&self, coarse: &V, fine: &mut V) -> FemResult<()> {
        if self.is_trivial(fine.size()) {
            return fine.copy_from(coarse);
        }
        let mut recv = None;
        if let Some((rank, _)) = &self.parent {
            recv = Some(self.comm.irecv(*rank, self.tag)?);
        }
        let mut sends = Vec::with_capacity(self.children.len());
        for (rank, mirror) in &self.children {
            sends.push(self.comm.isend(mirror.gather(coarse), *rank, self.tag)?);
        }
        if let (Some(req), Some((_, mirror))) = (recv, &self.parent) {
            let buf = self.comm.wait_recv(req)?;
            mirror.scatter_write(fine, &buf)?;
        }
        waitall_send(self.comm.as_ref(), sends)
    }
}
