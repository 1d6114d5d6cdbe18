//! parafem - A parallel finite element toolkit core
//!
//! This library provides the distributed linear-algebra and multilevel
//! solver backbone of a finite element toolkit:
//! - Typed vector and sparse matrix containers (CSR, blocked CSR,
//!   banded) with explicit clone modes and bit-exact serialisation
//! - Meta containers composing blocked operators (power/tuple vectors,
//!   saddle-point matrices)
//! - Gates and muxers for overlap synchronisation and coarse-layer
//!   redistribution across ranks
//! - Krylov, multigrid and Schwarz solvers with plug-and-play
//!   preconditioner composition
//! - Nonlinear CG with strong-Wolfe and quadratic-cubic line searches
//! - Rumpf hyperelasticity functionals for mesh-quality optimisation
//!
//! ## Example
//! ```rust
//! use parafem::prelude::*;
//! use std::sync::Arc;
//!
//! // A small SPD system solved by PCG with a Jacobi preconditioner.
//! let mut builder = CsrBuilder::new(3, 3);
//! for i in 0..3 {
//!     builder.add(i, i, 2.0);
//!     if i > 0 {
//!         builder.add(i, i - 1, -1.0);
//!         builder.add(i - 1, i, -1.0);
//!     }
//! }
//! let matrix: Arc<SparseMatrixCsr<f64, u64>> = Arc::new(builder.build());
//!
//! let precon: SolverBox<DenseVector<f64>> =
//!     Box::new(JacobiPrecon::new(matrix.clone(), 1.0));
//! let mut solver = Pcg::new(matrix, Arc::new(NoneFilter), Some(precon));
//! solver.params.set_tol_rel(1e-12);
//!
//! let rhs = DenseVector::constant(3, 1.0);
//! let mut x = DenseVector::new(3);
//! let status = solver.apply(&mut x, &rhs).unwrap();
//! assert!(status.is_success());
//! ```

pub mod assembly;
pub mod comm;
pub mod config;
pub mod containers;
pub mod control;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod global;
pub mod meshopt;
pub mod meta;
pub mod nonlinear;
pub mod scalar;
pub mod solver;
pub mod transfer;

// Re-export common types
pub mod prelude {
    pub use crate::comm::{Comm, LocalComm, ReduceOp, SerialComm};
    pub use crate::config::PropertyMap;
    pub use crate::containers::{
        csr::CsrBuilder, CloneMode, DenseVector, DenseVectorBlocked, LinOp, SparseMatrixBanded,
        SparseMatrixBcsr, SparseMatrixCsr, SparseVector, VectorOps,
    };
    pub use crate::control::{build_solver, DomainControl, MatrixStock, MeshoptControl};
    pub use crate::error::{FemError, FemResult};
    pub use crate::filter::{
        Filter, FilterChain, MeanFilter, NoneFilter, SlipFilter, UnitFilter, UnitFilterBlocked,
    };
    pub use crate::geometry::{
        AdaptMode, Chart, ConformalMesh, MeshPart, RootMeshNode, ShapeType,
    };
    pub use crate::global::{Gate, GlobalMatrix, GlobalVector, Muxer, VectorMirror};
    pub use crate::meshopt::{
        HyperelasticityFunctional, RumpfFunctional, RumpfParams, RumpfVariant, ScaleComputation,
    };
    pub use crate::meta::{PowerVector, SaddlePointMatrix, TupleDiagMatrix, TupleVector};
    pub use crate::nonlinear::{DirectionUpdate, Linesearch, Nlcg, NonlinearFunctional};
    pub use crate::scalar::{DataType, IndexType};
    pub use crate::solver::{
        BiCgStab, CycleType, FGmres, IluPrecon, JacobiPrecon, MgLevel, MultiGrid, Pcg, Pcr,
        Richardson, SchurPrecon, SchurVariant, SchwarzPrecon, Solver, SolverBox, SolverStatus,
        SorPrecon,
    };
    pub use crate::transfer::{TransferOperator, TransferOps};
}
