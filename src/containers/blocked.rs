//! Blocked dense vector container

use nalgebra::SVector;

use crate::containers::{ArrayHandle, CloneMode, DenseVector, VectorOps};
use crate::error::{check_sizes, FemResult};
use crate::scalar::DataType;

/// Dense vector of fixed-size value tiles.
///
/// A zero-copy reinterpretation of a flat buffer: `raw_size = size * B`.
/// The logical size counts blocks; raw element access goes through
/// [`Self::raw`] / [`Self::raw_mut`].
#[derive(Debug, Clone)]
pub struct DenseVectorBlocked<DT: DataType = f64, const B: usize = 2> {
    elements: ArrayHandle<DT>,
}

impl<DT: DataType, const B: usize> DenseVectorBlocked<DT, B> {
    pub fn new(size: usize) -> Self {
        Self {
            elements: ArrayHandle::zeros(size * B),
        }
    }

    pub fn from_raw(data: Vec<DT>) -> FemResult<Self> {
        if data.len() % B != 0 {
            return Err(crate::error::FemError::InvalidArgument(format!(
                "raw length {} is not a multiple of block size {}",
                data.len(),
                B
            )));
        }
        Ok(Self {
            elements: ArrayHandle::new(data),
        })
    }

    /// Reinterprets a flat dense vector; the inverse of [`Self::unblock`].
    pub fn from_dense(v: &DenseVector<DT>) -> FemResult<Self> {
        Self::from_raw(v.elements().to_vec())
    }

    /// Flat view as a dense vector of `size * B` scalars.
    pub fn unblock(&self) -> DenseVector<DT> {
        DenseVector::from_vec(self.raw().to_vec())
    }

    pub fn clone_mode(&self, mode: CloneMode) -> Self {
        let elements = match mode {
            CloneMode::Shallow => self.elements.share(),
            CloneMode::Layout => self.elements.fresh_zeros(),
            CloneMode::Weak | CloneMode::Deep => self.elements.duplicate(),
        };
        Self { elements }
    }

    pub fn raw_size(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn raw(&self) -> &[DT] {
        self.elements.as_slice()
    }

    #[inline]
    pub fn raw_mut(&mut self) -> &mut [DT] {
        self.elements.as_mut_slice()
    }

    #[inline]
    pub fn at(&self, i: usize) -> SVector<DT, B> {
        SVector::from_fn(|k, _| self.raw()[i * B + k])
    }

    #[inline]
    pub fn set(&mut self, i: usize, v: SVector<DT, B>) {
        let raw = self.raw_mut();
        for k in 0..B {
            raw[i * B + k] = v[k];
        }
    }

    #[inline]
    pub fn add_at(&mut self, i: usize, v: SVector<DT, B>) {
        let raw = self.raw_mut();
        for k in 0..B {
            raw[i * B + k] += v[k];
        }
    }
}

impl<DT: DataType, const B: usize> VectorOps for DenseVectorBlocked<DT, B> {
    type Scalar = DT;

    fn size(&self) -> usize {
        self.elements.len() / B
    }

    fn clone_layout(&self) -> Self {
        self.clone_mode(CloneMode::Layout)
    }

    fn format(&mut self, alpha: DT) {
        for v in self.raw_mut() {
            *v = alpha;
        }
    }

    fn copy_from(&mut self, x: &Self) -> FemResult<()> {
        check_sizes(self.raw_size(), x.raw_size())?;
        self.raw_mut().copy_from_slice(x.raw());
        Ok(())
    }

    fn axpy(&mut self, x: &Self, y: &Self, alpha: DT) -> FemResult<()> {
        check_sizes(self.raw_size(), x.raw_size())?;
        check_sizes(self.raw_size(), y.raw_size())?;
        let one = DT::of(1.0);
        if alpha == DT::zero() {
            self.raw_mut().copy_from_slice(y.raw());
        } else if alpha == one {
            for ((r, &a), &b) in self.raw_mut().iter_mut().zip(x.raw()).zip(y.raw()) {
                *r = a + b;
            }
        } else if alpha == -one {
            for ((r, &a), &b) in self.raw_mut().iter_mut().zip(x.raw()).zip(y.raw()) {
                *r = b - a;
            }
        } else {
            for ((r, &a), &b) in self.raw_mut().iter_mut().zip(x.raw()).zip(y.raw()) {
                *r = alpha * a + b;
            }
        }
        Ok(())
    }

    fn scale(&mut self, x: &Self, alpha: DT) -> FemResult<()> {
        check_sizes(self.raw_size(), x.raw_size())?;
        for (r, &a) in self.raw_mut().iter_mut().zip(x.raw()) {
            *r = alpha * a;
        }
        Ok(())
    }

    fn component_product(&mut self, x: &Self, y: &Self) -> FemResult<()> {
        check_sizes(self.raw_size(), x.raw_size())?;
        check_sizes(self.raw_size(), y.raw_size())?;
        for ((r, &a), &b) in self.raw_mut().iter_mut().zip(x.raw()).zip(y.raw()) {
            *r = a * b;
        }
        Ok(())
    }

    fn component_invert(&mut self, x: &Self, alpha: DT) -> FemResult<()> {
        check_sizes(self.raw_size(), x.raw_size())?;
        for (r, &a) in self.raw_mut().iter_mut().zip(x.raw()) {
            *r = alpha / a;
        }
        Ok(())
    }

    fn dot(&self, x: &Self) -> FemResult<DT> {
        check_sizes(self.raw_size(), x.raw_size())?;
        let mut sum = DT::zero();
        for (&a, &b) in self.raw().iter().zip(x.raw()) {
            sum += a * b;
        }
        Ok(sum)
    }

    fn triple_dot(&self, x: &Self, y: &Self) -> FemResult<DT> {
        check_sizes(self.raw_size(), x.raw_size())?;
        check_sizes(self.raw_size(), y.raw_size())?;
        let mut sum = DT::zero();
        for ((&d, &a), &b) in self.raw().iter().zip(x.raw()).zip(y.raw()) {
            sum += d * a * b;
        }
        Ok(sum)
    }

    fn norm2sqr(&self) -> DT {
        let mut sum = DT::zero();
        for &a in self.raw() {
            sum += a * a;
        }
        sum
    }

    fn max_abs_element(&self) -> DT {
        let mut max = DT::zero();
        for &a in self.raw() {
            if a.abs() > max {
                max = a.abs();
            }
        }
        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    #[test]
    fn test_block_view() {
        let v = DenseVectorBlocked::<f64, 2>::from_raw(vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(v.size(), 2);
        assert_eq!(v.raw_size(), 4);
        assert_relative_eq!(v.at(1)[0], 3.0);
    }

    #[test]
    fn test_roundtrip_dense() {
        let d = DenseVector::from_vec(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = DenseVectorBlocked::<f64, 3>::from_dense(&d).unwrap();
        assert_eq!(b.size(), 2);
        assert!(b.unblock().bitwise_eq(&d));
    }

    #[test]
    fn test_set_add() {
        let mut v = DenseVectorBlocked::<f64, 2>::new(3);
        v.set(1, Vector2::new(1.0, 2.0));
        v.add_at(1, Vector2::new(0.5, 0.5));
        assert_relative_eq!(v.at(1)[1], 2.5);
    }
}
