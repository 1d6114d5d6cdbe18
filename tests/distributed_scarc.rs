//! Distributed-layer end-to-end tests: gate partition of unity and the
//! two-rank ScaRC solve of the 1-D Laplace toy problem.

use std::sync::Arc;

use nalgebra::ComplexField;
use parafem::prelude::*;

/// Property: summing mirror contributions over all owning ranks
/// reproduces the duplicated global vector.
#[test]
fn gate_partition_of_unity() {
    let comms = LocalComm::create(2);
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            std::thread::spawn(move || {
                let rank = comm.rank();
                let comm = Arc::new(comm);
                // Global dofs 0..3; rank 0 owns {0,1,2}, rank 1 owns
                // {2,3}; dof 2 is shared.
                let local_dofs = if rank == 0 { 3 } else { 2 };
                let mut gate = Gate::new(comm, 1, local_dofs);
                if rank == 0 {
                    gate.push(1, VectorMirror::new(vec![2]));
                } else {
                    gate.push(0, VectorMirror::new(vec![0]));
                }

                // The consistent global vector duplicated on each rank.
                let global = [1.0, 2.0, 3.0, 4.0];
                let v = if rank == 0 {
                    DenseVector::from_vec(vec![global[0], global[1], global[2]])
                } else {
                    DenseVector::from_vec(vec![global[2], global[3]])
                };

                // Type-1 -> type-0 split: divide shared dofs by their
                // multiplicity, then sync back and compare.
                let mut split = v.clone_mode(CloneMode::Deep);
                {
                    use parafem::global::Syncable;
                    split.component_divide_by(gate.freq());
                }
                gate.sync_0(&mut split).unwrap();
                for i in 0..v.size() {
                    assert!((split.at(i) - v.at(i)).abs() < 1e-14);
                }

                // Global reductions see each dof exactly once.
                let dot = gate.dot(&v, &v).unwrap();
                let expected: f64 = global.iter().map(|g| g * g).sum();
                assert!((dot - expected).abs() < 1e-13);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

/// Two-rank ScaRC on the 2-dof-per-rank Laplace toy system: each rank
/// holds one element with stiffness [[1,-1],[-1,1]] and load 0.25 per
/// dof; the outer dofs are fixed to zero. Expected solution: (0, 0.25)
/// on rank 0 and (0.25, 0) on rank 1.
#[test]
fn scarc_two_rank_laplace() {
    let comms = LocalComm::create(2);
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            std::thread::spawn(move || {
                let rank = comm.rank();
                let comm = Arc::new(comm);

                // Local element matrix.
                let mut b = CsrBuilder::new(2, 2);
                b.add(0, 0, 1.0);
                b.add(0, 1, -1.0);
                b.add(1, 0, -1.0);
                b.add(1, 1, 1.0);
                let mut matrix: SparseMatrixCsr<f64, u64> = b.build();

                // Rank 0 owns the left boundary dof, rank 1 the right;
                // the interface dof is local 1 on rank 0 and local 0 on
                // rank 1.
                let bnd_dof = if rank == 0 { 0 } else { 1 };
                let mut filter = UnitFilter::new();
                filter.add(bnd_dof, 0.0);
                filter.filter_mat(&mut matrix).unwrap();

                let mut gate = Gate::new(Arc::clone(&comm), 1, 2);
                let interface = if rank == 0 { 1 } else { 0 };
                gate.push(1 - rank, VectorMirror::new(vec![interface]));
                let gate = Arc::new(gate);

                // Type-0 load vector, summed to the consistent rhs.
                let mut rhs_local = DenseVector::from_vec(vec![0.25, 0.25]);
                filter.filter_rhs(&mut rhs_local).unwrap();
                gate.sync_0(&mut rhs_local).unwrap();

                let global_matrix = Arc::new(GlobalMatrix::new(
                    matrix.clone_mode(CloneMode::Shallow),
                    Arc::clone(&gate),
                ));
                let rhs = GlobalVector::new(rhs_local, Arc::clone(&gate));
                let filter = Arc::new(GlobalUnitFilter(filter));

                // Layer-1 Richardson driving a Schwarz block smoother
                // whose layer-0 solver is an exact local ILU solve. The
                // averaged overlap doubles the interface response, hence
                // the 1/2 damping.
                let local_solver: SolverBox<DenseVector<f64>> =
                    Box::new(IluPrecon::new(Arc::new(matrix)));
                let schwarz = SchwarzPrecon::new(local_solver);
                let mut outer = Richardson::new(
                    global_matrix,
                    filter,
                    Some(Box::new(schwarz)),
                    0.5,
                );
                outer.params.set_tol_rel(1e-12).set_max_iter(100);
                outer.init().unwrap();

                let mut x = rhs.clone_layout();
                let status = outer.apply(&mut x, &rhs).unwrap();
                assert_eq!(status, SolverStatus::Success);

                let expected = if rank == 0 { [0.0, 0.25] } else { [0.25, 0.0] };
                for i in 0..2 {
                    assert!(
                        (x.local().at(i) - expected[i]).abs() < 1e-10,
                        "rank {rank} dof {i}: {} vs {}",
                        x.local().at(i),
                        expected[i]
                    );
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

/// Distributed restriction: each rank restricts its accumulated share
/// of the fine vector, the coarse gate sums the interface dof.
#[test]
fn global_transfer_restriction_sums_interface() {
    use parafem::transfer::{GlobalTransfer, TransferOperator};

    let comms = LocalComm::create(2);
    let handles: Vec<_> = comms
        .into_iter()
        .map(|comm| {
            std::thread::spawn(move || {
                let rank = comm.rank();
                let comm = Arc::new(comm);

                // Local linear interpolation from 2 coarse to 3 fine dofs.
                let mut b = CsrBuilder::new(3, 2);
                b.add(0, 0, 1.0);
                b.add(1, 0, 0.5);
                b.add(1, 1, 0.5);
                b.add(2, 1, 1.0);
                let local: TransferOperator<f64, u64> =
                    TransferOperator::from_prolongation(b.build());

                // Coarse layer: global dofs {0,1,2}; dof 1 is shared.
                let mut coarse_gate = Gate::new(Arc::clone(&comm), 7, 2);
                let interface = if rank == 0 { 1 } else { 0 };
                coarse_gate.push(1 - rank, VectorMirror::new(vec![interface]));
                let transfer = GlobalTransfer::new(local, Arc::new(coarse_gate));

                // Accumulated fine vector: the shared fine dof carries
                // one half on each rank.
                let fine_local = if rank == 0 {
                    DenseVector::from_vec(vec![1.0, 1.0, 0.5])
                } else {
                    DenseVector::from_vec(vec![0.5, 1.0, 1.0])
                };
                let fine_gate = Arc::new(Gate::new(Arc::clone(&comm), 8, 3));
                let fine = GlobalVector::new(fine_local, fine_gate);

                let mut coarse = GlobalVector::new(
                    DenseVector::new(2),
                    Arc::clone(transfer.coarse_gate()),
                );
                transfer.restrict(&mut coarse, &fine).unwrap();

                // Global restriction of the all-ones fine function:
                // (1.5, 2.0, 1.5) over the three coarse dofs.
                let expected = if rank == 0 { [1.5, 2.0] } else { [2.0, 1.5] };
                for i in 0..2 {
                    assert!(
                        (coarse.local().at(i) - expected[i]).abs() < 1e-13,
                        "rank {rank} dof {i}: {}",
                        coarse.local().at(i)
                    );
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

/// Lifts a local unit filter to the global vector type.
struct GlobalUnitFilter(UnitFilter<f64>);

impl Filter<GlobalVector<DenseVector<f64>, LocalComm>> for GlobalUnitFilter {
    fn filter_sol(
        &self,
        v: &mut GlobalVector<DenseVector<f64>, LocalComm>,
    ) -> parafem::error::FemResult<()> {
        self.0.filter_sol(v.local_mut())
    }

    fn filter_rhs(
        &self,
        v: &mut GlobalVector<DenseVector<f64>, LocalComm>,
    ) -> parafem::error::FemResult<()> {
        self.0.filter_rhs(v.local_mut())
    }

    fn filter_def(
        &self,
        v: &mut GlobalVector<DenseVector<f64>, LocalComm>,
    ) -> parafem::error::FemResult<()> {
        self.0.filter_def(v.local_mut())
    }

    fn filter_cor(
        &self,
        v: &mut GlobalVector<DenseVector<f64>, LocalComm>,
    ) -> parafem::error::FemResult<()> {
        self.0.filter_cor(v.local_mut())
    }
}
