//! Container layer: typed buffers, vectors and sparse matrix formats
//!
//! Every container owns its element and index arrays through independently
//! reference-counted handles, so clones can share or replace each array
//! separately (see [`CloneMode`]).

pub mod banded;
pub mod bcsr;
pub mod blocked;
pub mod csr;
pub mod dense;
pub mod io;
pub mod sparse_vector;

pub use banded::SparseMatrixBanded;
pub use bcsr::SparseMatrixBcsr;
pub use blocked::DenseVectorBlocked;
pub use csr::SparseMatrixCsr;
pub use dense::DenseVector;
pub use sparse_vector::{SparseVector, SparseVectorBlocked};

use std::sync::Arc;

use nalgebra::ComplexField;

use crate::error::FemResult;
use crate::scalar::DataType;

/// How a container clone relates to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneMode {
    /// All arrays aliased, no allocation.
    Shallow,
    /// Index arrays aliased, value array freshly allocated and zero-filled.
    /// Used for symbolic assembly.
    Layout,
    /// Index arrays aliased, value array freshly allocated and copied.
    Weak,
    /// Everything freshly allocated and copied.
    Deep,
}

/// Reference-counted array handle.
///
/// A container is the sole owner of an array, or one of several aliases.
/// Aliased arrays are single-writer by contract: mutation goes through
/// freshly allocated arrays obtained from a layout/weak/deep clone. If a
/// shared handle is written anyway, the write copies first instead of
/// racing.
#[derive(Debug, Clone)]
pub struct ArrayHandle<T>(Arc<Vec<T>>);

impl<T: Clone + Default> ArrayHandle<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self(Arc::new(data))
    }

    pub fn zeros(len: usize) -> Self {
        Self(Arc::new(vec![T::default(); len]))
    }

    /// Shallow alias; bumps the reference count only.
    pub fn share(&self) -> Self {
        Self(Arc::clone(&self.0))
    }

    /// Fresh allocation holding a copy of the data.
    pub fn duplicate(&self) -> Self {
        Self(Arc::new(self.0.as_ref().clone()))
    }

    /// Fresh zero-filled allocation of the same length.
    pub fn fresh_zeros(&self) -> Self {
        Self::zeros(self.0.len())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True if this handle is the sole owner of the array.
    pub fn is_unique(&self) -> bool {
        Arc::strong_count(&self.0) == 1
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.0
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        Arc::make_mut(&mut self.0).as_mut_slice()
    }
}

/// BLAS-1 style operations shared by every vector container, including the
/// recursive meta containers and the globally synchronised wrappers.
///
/// All operations are value-preserving in-place updates of `self`; size
/// mismatch fails with `FemError::SizeMismatch` before any state change.
pub trait VectorOps: Clone {
    type Scalar: DataType;

    /// Logical size (dof count, not raw element count for blocked vectors).
    fn size(&self) -> usize;

    /// Fresh vector of the same structure with zero-filled values.
    fn clone_layout(&self) -> Self;

    /// Sets every element to `alpha`.
    fn format(&mut self, alpha: Self::Scalar);

    fn copy_from(&mut self, x: &Self) -> FemResult<()>;

    /// `self = alpha * x + y`
    ///
    /// `alpha` in {1, -1, 0} dispatches to the specialised sum, difference
    /// and copy kernels.
    fn axpy(&mut self, x: &Self, y: &Self, alpha: Self::Scalar) -> FemResult<()>;

    /// `self = alpha * x`
    fn scale(&mut self, x: &Self, alpha: Self::Scalar) -> FemResult<()>;

    /// `self[i] = x[i] * y[i]`
    fn component_product(&mut self, x: &Self, y: &Self) -> FemResult<()>;

    /// `self[i] = alpha / x[i]`; undefined for `x[i] = 0`.
    fn component_invert(&mut self, x: &Self, alpha: Self::Scalar) -> FemResult<()>;

    fn dot(&self, x: &Self) -> FemResult<Self::Scalar>;

    /// `x^T diag(self) y`
    fn triple_dot(&self, x: &Self, y: &Self) -> FemResult<Self::Scalar>;

    fn norm2sqr(&self) -> Self::Scalar;

    fn norm2(&self) -> Self::Scalar {
        self.norm2sqr().sqrt()
    }

    /// Largest absolute component.
    fn max_abs_element(&self) -> Self::Scalar;
}

/// A linear operator applicable to vectors of type `X`, producing vectors
/// of type `R` (equal to `X` for square operators).
///
/// Object safe so solver trees can compose operators behind `dyn`.
pub trait LinOp<X: VectorOps, R: VectorOps<Scalar = X::Scalar> = X>: Send + Sync {
    /// `r = A * x`
    fn apply(&self, r: &mut R, x: &X) -> FemResult<()>;

    /// `r = alpha * A * x + y`
    ///
    /// `alpha = -1` dispatches to the defect kernel `r = y - A * x`.
    fn apply_scaled_sum(&self, r: &mut R, x: &X, y: &R, alpha: X::Scalar) -> FemResult<()>;

    /// `d = b - A * x`
    fn apply_defect(&self, d: &mut R, b: &R, x: &X) -> FemResult<()> {
        self.apply_scaled_sum(d, x, b, X::Scalar::of(-1.0))
    }
}
