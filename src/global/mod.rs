//! Distributed layer: overlap synchronisation and layer redistribution
//!
//! Local containers compose into globally distributed operators through
//! [`Gate`]s (overlap-sum synchronisation between neighbour patches) and
//! [`Muxer`]s (parent/child redistribution between coarse-grid layers).
//!
//! Vector nomenclature follows the overlapping-decomposition convention:
//! a *type-0* vector holds each rank's partial contribution on interface
//! dofs, a *type-1* vector holds the consistent global value everywhere.
//! `sync_0` turns type-0 into type-1 by summation.

pub mod gate;
pub mod matrix;
pub mod mirror;
pub mod muxer;
pub mod vector;

pub use gate::Gate;
pub use matrix::GlobalMatrix;
pub use mirror::VectorMirror;
pub use muxer::Muxer;
pub use vector::GlobalVector;

use crate::containers::{DenseVector, DenseVectorBlocked, VectorOps};
use crate::error::FemError;
use crate::scalar::DataType;

/// Local vector types that can pass through gates and muxers.
///
/// The wire format is `f64` per raw component; a blocked vector ships
/// `B` components per dof.
pub trait Syncable: VectorOps {
    /// Raw wire components per dof.
    const COMPONENTS: usize;

    /// Appends the wire representation of the listed dofs to `buf`.
    fn gather(&self, indices: &[usize], buf: &mut Vec<f64>);

    /// Adds wire values onto the listed dofs.
    fn scatter_add(&mut self, indices: &[usize], buf: &[f64]);

    /// Overwrites the listed dofs with wire values.
    fn scatter_write(&mut self, indices: &[usize], buf: &[f64]);

    /// Divides each dof by its multiplicity.
    fn component_divide_by(&mut self, freq: &[f64]);

    /// Weighted local dot `sum_i x_i . y_i / freq_i`, the building block
    /// of global reductions over overlapping decompositions.
    fn weighted_dot(&self, other: &Self, freq: &[f64]) -> f64;
}

impl<DT: DataType> Syncable for DenseVector<DT> {
    const COMPONENTS: usize = 1;

    fn gather(&self, indices: &[usize], buf: &mut Vec<f64>) {
        let elems = self.elements();
        buf.extend(indices.iter().map(|&i| elems[i].to_f64()));
    }

    fn scatter_add(&mut self, indices: &[usize], buf: &[f64]) {
        let elems = self.elements_mut();
        for (&i, &v) in indices.iter().zip(buf) {
            elems[i] += DT::of(v);
        }
    }

    fn scatter_write(&mut self, indices: &[usize], buf: &[f64]) {
        let elems = self.elements_mut();
        for (&i, &v) in indices.iter().zip(buf) {
            elems[i] = DT::of(v);
        }
    }

    fn component_divide_by(&mut self, freq: &[f64]) {
        for (v, &f) in self.elements_mut().iter_mut().zip(freq) {
            *v /= DT::of(f);
        }
    }

    fn weighted_dot(&self, other: &Self, freq: &[f64]) -> f64 {
        self.elements()
            .iter()
            .zip(other.elements())
            .zip(freq)
            .map(|((&a, &b), &f)| a.to_f64() * b.to_f64() / f)
            .sum()
    }
}

impl<DT: DataType, const B: usize> Syncable for DenseVectorBlocked<DT, B> {
    const COMPONENTS: usize = B;

    fn gather(&self, indices: &[usize], buf: &mut Vec<f64>) {
        let raw = self.raw();
        for &i in indices {
            for k in 0..B {
                buf.push(raw[i * B + k].to_f64());
            }
        }
    }

    fn scatter_add(&mut self, indices: &[usize], buf: &[f64]) {
        let raw = self.raw_mut();
        for (p, &i) in indices.iter().enumerate() {
            for k in 0..B {
                raw[i * B + k] += DT::of(buf[p * B + k]);
            }
        }
    }

    fn scatter_write(&mut self, indices: &[usize], buf: &[f64]) {
        let raw = self.raw_mut();
        for (p, &i) in indices.iter().enumerate() {
            for k in 0..B {
                raw[i * B + k] = DT::of(buf[p * B + k]);
            }
        }
    }

    fn component_divide_by(&mut self, freq: &[f64]) {
        let raw = self.raw_mut();
        for (i, &f) in freq.iter().enumerate() {
            for k in 0..B {
                raw[i * B + k] /= DT::of(f);
            }
        }
    }

    fn weighted_dot(&self, other: &Self, freq: &[f64]) -> f64 {
        let a = self.raw();
        let b = other.raw();
        let mut sum = 0.0;
        for (i, &f) in freq.iter().enumerate() {
            for k in 0..B {
                sum += a[i * B + k].to_f64() * b[i * B + k].to_f64() / f;
            }
        }
        sum
    }
}

/// A failed collective leaves the transport in an undefined state; there
/// is no recovery path, so the process stops after a diagnostic.
pub(crate) fn collective_abort(err: FemError) -> ! {
    log::error!("collective communication failed: {err}");
    panic!("collective communication failed: {err}");
}
