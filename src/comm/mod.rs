//! Rank-to-rank communication abstraction
//!
//! The core only ever talks to an opaque [`Comm`]: rank/size queries,
//! byte broadcast, element-wise allreduce and tagged point-to-point
//! messages of `f64` payloads (the fixed wire format). One operating
//! system thread per rank; no user-level threading inside the core.
//!
//! [`SerialComm`] is the single-rank implementation. [`LocalComm`] runs a
//! communicator over in-process channels so multi-rank behaviour is
//! testable inside one process, one thread per rank.

use std::sync::Mutex;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{FemError, FemResult};

/// Reduction operation for [`Comm::allreduce`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    #[inline]
    fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            ReduceOp::Sum => a + b,
            ReduceOp::Min => a.min(b),
            ReduceOp::Max => a.max(b),
        }
    }
}

/// Pending non-blocking receive.
#[derive(Debug)]
#[must_use = "a posted receive must be completed with wait_recv"]
pub struct RecvRequest {
    src: usize,
    tag: u64,
}

/// Pending non-blocking send.
#[derive(Debug)]
#[must_use = "a posted send must be completed with wait_send"]
pub struct SendRequest {
    dest: usize,
}

/// The communication primitives the core uses.
pub trait Comm: Send + Sync + 'static {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Broadcast payload shape: `(length u64, bytes...)`; the root's buffer
    /// is sent, every other rank's buffer is replaced.
    fn bcast_bytes(&self, buf: &mut Vec<u8>, root: usize) -> FemResult<()>;

    /// Element-wise reduction over all ranks; every rank receives the
    /// result.
    fn allreduce(&self, vals: &mut [f64], op: ReduceOp) -> FemResult<()>;

    fn isend(&self, data: Vec<f64>, dest: usize, tag: u64) -> FemResult<SendRequest>;

    fn irecv(&self, src: usize, tag: u64) -> FemResult<RecvRequest>;

    fn wait_send(&self, req: SendRequest) -> FemResult<()>;

    fn wait_recv(&self, req: RecvRequest) -> FemResult<Vec<f64>>;

    /// Paired exchange with one partner.
    fn sendrecv(&self, data: Vec<f64>, partner: usize, tag: u64) -> FemResult<Vec<f64>> {
        let recv = self.irecv(partner, tag)?;
        let send = self.isend(data, partner, tag)?;
        let result = self.wait_recv(recv)?;
        self.wait_send(send)?;
        Ok(result)
    }
}

/// Completes a set of posted receives in order.
pub fn waitall_recv<C: Comm + ?Sized>(
    comm: &C,
    reqs: Vec<RecvRequest>,
) -> FemResult<Vec<Vec<f64>>> {
    reqs.into_iter().map(|r| comm.wait_recv(r)).collect()
}

/// Completes a set of posted sends.
pub fn waitall_send<C: Comm + ?Sized>(comm: &C, reqs: Vec<SendRequest>) -> FemResult<()> {
    for r in reqs {
        comm.wait_send(r)?;
    }
    Ok(())
}

/// Single-rank communicator; point-to-point self-messages go through an
/// internal queue so single-child muxers can run unchanged.
#[derive(Debug, Default)]
pub struct SerialComm {
    queue: Mutex<Vec<(u64, Vec<f64>)>>,
}

impl SerialComm {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Comm for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn bcast_bytes(&self, _buf: &mut Vec<u8>, _root: usize) -> FemResult<()> {
        Ok(())
    }

    fn allreduce(&self, _vals: &mut [f64], _op: ReduceOp) -> FemResult<()> {
        Ok(())
    }

    fn isend(&self, data: Vec<f64>, dest: usize, tag: u64) -> FemResult<SendRequest> {
        if dest != 0 {
            return Err(FemError::CollectiveFailure(format!(
                "serial communicator has no rank {dest}"
            )));
        }
        self.queue.lock().unwrap().push((tag, data));
        Ok(SendRequest { dest })
    }

    fn irecv(&self, src: usize, tag: u64) -> FemResult<RecvRequest> {
        if src != 0 {
            return Err(FemError::CollectiveFailure(format!(
                "serial communicator has no rank {src}"
            )));
        }
        Ok(RecvRequest { src, tag })
    }

    fn wait_send(&self, _req: SendRequest) -> FemResult<()> {
        Ok(())
    }

    fn wait_recv(&self, req: RecvRequest) -> FemResult<Vec<f64>> {
        let mut queue = self.queue.lock().unwrap();
        let pos = queue
            .iter()
            .position(|(tag, _)| *tag == req.tag)
            .ok_or_else(|| {
                FemError::CollectiveFailure(format!(
                    "no matching self-message for tag {}",
                    req.tag
                ))
            })?;
        Ok(queue.remove(pos).1)
    }
}

type Message = (u64, Vec<f64>);

/// In-process communicator: `create(n)` yields one communicator per rank,
/// wired pairwise with FIFO channels. Move each into its own thread.
pub struct LocalComm {
    rank: usize,
    size: usize,
    /// Senders to every rank, indexed by destination.
    senders: Vec<Sender<Message>>,
    /// Receivers from every rank, indexed by source.
    receivers: Vec<Receiver<Message>>,
    /// Byte channels for broadcast, same indexing.
    byte_senders: Vec<Sender<Vec<u8>>>,
    byte_receivers: Vec<Receiver<Vec<u8>>>,
}

impl LocalComm {
    pub fn create(size: usize) -> Vec<LocalComm> {
        let mut senders: Vec<Vec<Sender<Message>>> = vec![Vec::new(); size];
        let mut receivers: Vec<Vec<Receiver<Message>>> = vec![Vec::new(); size];
        let mut byte_senders: Vec<Vec<Sender<Vec<u8>>>> = vec![Vec::new(); size];
        let mut byte_receivers: Vec<Vec<Receiver<Vec<u8>>>> = vec![Vec::new(); size];

        // One FIFO channel per directed pair; senders indexed by
        // destination, receivers indexed by source.
        for src in 0..size {
            for dst in 0..size {
                let (tx, rx) = unbounded();
                let (btx, brx) = unbounded();
                senders[src].push(tx);
                receivers[dst].push(rx);
                byte_senders[src].push(btx);
                byte_receivers[dst].push(brx);
            }
        }
        let mut comms = Vec::with_capacity(size);
        for rank in 0..size {
            comms.push(LocalComm {
                rank,
                size,
                senders: senders[rank].clone(),
                receivers: receivers[rank].clone(),
                byte_senders: byte_senders[rank].clone(),
                byte_receivers: byte_receivers[rank].clone(),
            });
        }
        comms
    }
}

impl Comm for LocalComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn bcast_bytes(&self, buf: &mut Vec<u8>, root: usize) -> FemResult<()> {
        if self.rank == root {
            for dst in 0..self.size {
                if dst != root {
                    self.byte_senders[dst]
                        .send(buf.clone())
                        .map_err(|e| FemError::CollectiveFailure(e.to_string()))?;
                }
            }
        } else {
            *buf = self.byte_receivers[root]
                .recv()
                .map_err(|e| FemError::CollectiveFailure(e.to_string()))?;
        }
        Ok(())
    }

    fn allreduce(&self, vals: &mut [f64], op: ReduceOp) -> FemResult<()> {
        // Reduce onto rank 0, then fan the result back out.
        const COLL_TAG: u64 = u64::MAX;
        if self.rank == 0 {
            for src in 1..self.size {
                let (tag, data) = self.receivers[src]
                    .recv()
                    .map_err(|e| FemError::CollectiveFailure(e.to_string()))?;
                if tag != COLL_TAG || data.len() != vals.len() {
                    return Err(FemError::CollectiveFailure(
                        "mismatched allreduce contribution".to_string(),
                    ));
                }
                for (v, c) in vals.iter_mut().zip(data) {
                    *v = op.combine(*v, c);
                }
            }
            for dst in 1..self.size {
                self.senders[dst]
                    .send((COLL_TAG, vals.to_vec()))
                    .map_err(|e| FemError::CollectiveFailure(e.to_string()))?;
            }
        } else {
            self.senders[0]
                .send((COLL_TAG, vals.to_vec()))
                .map_err(|e| FemError::CollectiveFailure(e.to_string()))?;
            let (tag, data) = self.receivers[0]
                .recv()
                .map_err(|e| FemError::CollectiveFailure(e.to_string()))?;
            if tag != COLL_TAG {
                return Err(FemError::CollectiveFailure(
                    "mismatched allreduce result".to_string(),
                ));
            }
            vals.copy_from_slice(&data);
        }
        Ok(())
    }

    fn isend(&self, data: Vec<f64>, dest: usize, tag: u64) -> FemResult<SendRequest> {
        self.senders
            .get(dest)
            .ok_or_else(|| FemError::CollectiveFailure(format!("no rank {dest}")))?
            .send((tag, data))
            .map_err(|e| FemError::CollectiveFailure(e.to_string()))?;
        Ok(SendRequest { dest })
    }

    fn irecv(&self, src: usize, tag: u64) -> FemResult<RecvRequest> {
        if src >= self.size {
            return Err(FemError::CollectiveFailure(format!("no rank {src}")));
        }
        Ok(RecvRequest { src, tag })
    }

    fn wait_send(&self, _req: SendRequest) -> FemResult<()> {
        Ok(())
    }

    fn wait_recv(&self, req: RecvRequest) -> FemResult<Vec<f64>> {
        let (tag, data) = self.receivers[req.src]
            .recv()
            .map_err(|e| FemError::CollectiveFailure(e.to_string()))?;
        if tag != req.tag {
            return Err(FemError::CollectiveFailure(format!(
                "message tag {tag} does not match posted receive tag {}",
                req.tag
            )));
        }
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_self_message() {
        let comm = SerialComm::new();
        let send = comm.isend(vec![1.0, 2.0], 0, 7).unwrap();
        let recv = comm.irecv(0, 7).unwrap();
        assert_eq!(comm.wait_recv(recv).unwrap(), vec![1.0, 2.0]);
        comm.wait_send(send).unwrap();
    }

    #[test]
    fn test_local_exchange_and_allreduce() {
        let comms = LocalComm::create(2);
        let handles: Vec<_> = comms
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let partner = 1 - comm.rank();
                    let mine = vec![comm.rank() as f64 + 1.0];
                    let theirs = comm.sendrecv(mine, partner, 3).unwrap();
                    assert_eq!(theirs, vec![partner as f64 + 1.0]);

                    let mut v = [comm.rank() as f64 + 1.0];
                    comm.allreduce(&mut v, ReduceOp::Sum).unwrap();
                    assert_eq!(v[0], 3.0);

                    let mut buf = if comm.rank() == 0 {
                        b"payload".to_vec()
                    } else {
                        Vec::new()
                    };
                    comm.bcast_bytes(&mut buf, 0).unwrap();
                    assert_eq!(buf, b"payload");
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    }
}
