//! Scalar and index type abstractions
//!
//! The container layer is generic over its floating point type and its
//! integer index type. The wire and file formats are fixed to `f64`/`u64`
//! regardless of the in-memory types.

use nalgebra::RealField;

/// Floating point type usable as container element type.
pub trait DataType:
    RealField + Copy + Default + PartialOrd + Send + Sync + 'static + serde::Serialize
{
    /// Converts an `f64` constant into this type.
    fn of(v: f64) -> Self;

    /// Widens to `f64` for reductions, wire transport and file output.
    fn to_f64(self) -> f64;

    /// Machine epsilon of this type.
    fn eps() -> Self;
}

impl DataType for f32 {
    #[inline]
    fn of(v: f64) -> Self {
        v as f32
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn eps() -> Self {
        f32::EPSILON
    }
}

impl DataType for f64 {
    #[inline]
    fn of(v: f64) -> Self {
        v
    }

    #[inline]
    fn to_f64(self) -> f64 {
        self
    }

    #[inline]
    fn eps() -> Self {
        f64::EPSILON
    }
}

/// Unsigned integer type usable as container index type.
pub trait IndexType:
    Copy + Clone + Eq + Ord + Default + std::fmt::Debug + std::fmt::Display + Send + Sync + 'static
{
    /// The maximum representable value, used as the duplicate sentinel in
    /// sparse vector sorting.
    const MAX: Self;

    fn as_usize(self) -> usize;

    /// Narrows a `usize`; the caller guarantees the value fits.
    fn from_usize(v: usize) -> Self;

    fn to_u64(self) -> u64;

    fn from_u64(v: u64) -> Self;
}

impl IndexType for u32 {
    const MAX: Self = u32::MAX;

    #[inline]
    fn as_usize(self) -> usize {
        self as usize
    }

    #[inline]
    fn from_usize(v: usize) -> Self {
        v as u32
    }

    #[inline]
    fn to_u64(self) -> u64 {
        self as u64
    }

    #[inline]
    fn from_u64(v: u64) -> Self {
        v as u32
    }
}

impl IndexType for u64 {
    const MAX: Self = u64::MAX;

    #[inline]
    fn as_usize(self) -> usize {
        self as usize
    }

    #[inline]
    fn from_usize(v: usize) -> Self {
        v as u64
    }

    #[inline]
    fn to_u64(self) -> u64 {
        self
    }

    #[inline]
    fn from_u64(v: u64) -> Self {
        v
    }
}
