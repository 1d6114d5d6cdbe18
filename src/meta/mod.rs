//! Meta containers: recursive composition of vectors and matrices
//!
//! Every operation forwards to the sub-components; reductions sum over
//! blocks and flat element access is routed to the first block that
//! covers the index.

pub mod power;
pub mod saddle;
pub mod tuple;

pub use power::PowerVector;
pub use saddle::SaddlePointMatrix;
pub use tuple::{TupleDiagMatrix, TupleVector};
