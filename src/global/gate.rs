//! Overlap-sum synchronisation gate

use std::sync::Arc;

use crate::comm::{waitall_send, Comm, ReduceOp};
use crate::error::FemResult;
use crate::global::{Syncable, VectorMirror};

/// Per-rank interface synchronisation object.
///
/// Associates each neighbour rank with a mirror onto the shared
/// interface dofs and keeps the per-dof multiplicity (frequency) vector
/// used for sum-to-average conversion and global reductions.
///
/// A gate instance serialises its synchronisations; a cancelled sync
/// leaves unspecified state.
pub struct Gate<C: Comm> {
    comm: Arc<C>,
    tag: u64,
    neighbours: Vec<(usize, VectorMirror)>,
    freq: Vec<f64>,
}

impl<C: Comm> Gate<C> {
    /// Creates an empty gate over `local_dofs` dofs; without neighbours
    /// every dof has multiplicity one and synchronisation is a no-op.
    pub fn new(comm: Arc<C>, tag: u64, local_dofs: usize) -> Self {
        Self {
            comm,
            tag,
            neighbours: Vec::new(),
            freq: vec![1.0; local_dofs],
        }
    }

    /// Registers a neighbour rank with its interface mirror and updates
    /// the frequency vector.
    pub fn push(&mut self, rank: usize, mirror: VectorMirror) {
        for &i in mirror.indices() {
            self.freq[i] += 1.0;
        }
        self.neighbours.push((rank, mirror));
    }

    pub fn comm(&self) -> &Arc<C> {
        &self.comm
    }

    pub fn local_dofs(&self) -> usize {
        self.freq.len()
    }

    /// Per-dof multiplicities across all owning ranks.
    pub fn freq(&self) -> &[f64] {
        &self.freq
    }

    pub fn neighbour_ranks(&self) -> impl Iterator<Item = usize> + '_ {
        self.neighbours.iter().map(|&(r, _)| r)
    }

    /// Sum-of-distributed-contributions synchronisation.
    ///
    /// Receives are posted before any send to keep unexpected messages
    /// out of the transport buffers; after one round trip every
    /// interface dof holds the global sum.
    pub fn sync_0<V: Syncable>(&self, v: &mut V) -> FemResult<()> {
        if self.neighbours.is_empty() {
            return Ok(());
        }
        let mut recvs = Vec::with_capacity(self.neighbours.len());
        for (rank, _) in &self.neighbours {
            recvs.push(self.comm.irecv(*rank, self.tag)?);
        }
        let mut sends = Vec::with_capacity(self.neighbours.len());
        for (rank, mirror) in &self.neighbours {
            sends.push(self.comm.isend(mirror.gather(v), *rank, self.tag)?);
        }
        for ((_, mirror), req) in self.neighbours.iter().zip(recvs) {
            let buf = self.comm.wait_recv(req)?;
            mirror.scatter_add(v, &buf)?;
        }
        waitall_send(self.comm.as_ref(), sends)
    }

    /// Sum followed by division with the frequencies: the element-wise
    /// average, converting an accumulated (type-0) vector into a
    /// consistent (type-1) one.
    pub fn sync_1<V: Syncable>(&self, v: &mut V) -> FemResult<()> {
        self.sync_0(v)?;
        v.component_divide_by(&self.freq);
        Ok(())
    }

    /// Global dot product of two consistent vectors.
    pub fn dot<V: Syncable>(&self, x: &V, y: &V) -> FemResult<f64> {
        let local = x.weighted_dot(y, &self.freq);
        self.sum(local)
    }

    /// Global Euclidean norm of a consistent vector.
    pub fn norm2<V: Syncable>(&self, x: &V) -> FemResult<f64> {
        Ok(self.dot(x, x)?.sqrt())
    }

    /// Global sum of per-rank scalars.
    pub fn sum(&self, local: f64) -> FemResult<f64> {
        let mut buf = [local];
        self.comm.allreduce(&mut buf, ReduceOp::Sum)?;
        Ok(buf[0])
    }

    /// Global minimum of per-rank scalars.
    pub fn min(&self, local: f64) -> FemResult<f64> {
        let mut buf = [local];
        self.comm.allreduce(&mut buf, ReduceOp::Min)?;
        Ok(buf[0])
    }

    /// Global maximum of per-rank scalars.
    pub fn max(&self, local: f64) -> FemResult<f64> {
        let mut buf = [local];
        self.comm.allreduce(&mut buf, ReduceOp::Max)?;
        Ok(buf[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalComm;
    use crate::containers::{DenseVector, VectorOps};
    use approx::assert_relative_eq;

    /// Two ranks sharing one interface dof: rank 0 owns dofs {0,1}, rank 1
    /// owns dofs {1,2} in global numbering; local dof 1 on rank 0 is local
    /// dof 0 on rank 1.
    #[test]
    fn test_sync0_sums_interface() {
        let comms = LocalComm::create(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let rank = comm.rank();
                    let comm = Arc::new(comm);
                    let mut gate = Gate::new(comm, 1, 2);
                    if rank == 0 {
                        gate.push(1, VectorMirror::new(vec![1]));
                    } else {
                        gate.push(0, VectorMirror::new(vec![0]));
                    }

                    let mut v = if rank == 0 {
                        DenseVector::from_vec(vec![1.0, 2.0])
                    } else {
                        DenseVector::from_vec(vec![3.0, 4.0])
                    };
                    gate.sync_0(&mut v).unwrap();
                    if rank == 0 {
                        assert_relative_eq!(v.at(0), 1.0);
                        assert_relative_eq!(v.at(1), 5.0);
                    } else {
                        assert_relative_eq!(v.at(0), 5.0);
                        assert_relative_eq!(v.at(1), 4.0);
                    }

                    // Average conversion divides the shared dof by 2.
                    gate.sync_1(&mut v).unwrap();
                    let shared = if rank == 0 { v.at(1) } else { v.at(0) };
                    assert_relative_eq!(shared, 5.0);

                    // Global dot of the consistent vector counts the
                    // shared dof once.
                    let d = gate.dot(&v, &v).unwrap();
                    assert_relative_eq!(d, 1.0 + 25.0 + 16.0);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
