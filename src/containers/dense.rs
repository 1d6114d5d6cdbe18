//! Dense vector container

use crate::containers::{ArrayHandle, CloneMode, VectorOps};
use crate::error::{check_sizes, FemError, FemResult};
use crate::scalar::DataType;

/// Contiguous 1-D buffer of scalar values.
///
/// The element array is a reference-counted handle; see [`CloneMode`] for
/// the sharing relations between clones.
#[derive(Debug, Clone)]
pub struct DenseVector<DT: DataType = f64> {
    elements: ArrayHandle<DT>,
}

impl<DT: DataType> DenseVector<DT> {
    /// Creates a zero-filled vector of the given size.
    pub fn new(size: usize) -> Self {
        Self {
            elements: ArrayHandle::zeros(size),
        }
    }

    pub fn from_vec(data: Vec<DT>) -> Self {
        Self {
            elements: ArrayHandle::new(data),
        }
    }

    pub fn from_fn(size: usize, f: impl FnMut(usize) -> DT) -> Self {
        Self {
            elements: ArrayHandle::new((0..size).map(f).collect()),
        }
    }

    /// Constant vector `alpha * 1`.
    pub fn constant(size: usize, alpha: DT) -> Self {
        Self {
            elements: ArrayHandle::new(vec![alpha; size]),
        }
    }

    pub fn clone_mode(&self, mode: CloneMode) -> Self {
        let elements = match mode {
            CloneMode::Shallow => self.elements.share(),
            CloneMode::Layout => self.elements.fresh_zeros(),
            CloneMode::Weak | CloneMode::Deep => self.elements.duplicate(),
        };
        Self { elements }
    }

    #[inline]
    pub fn elements(&self) -> &[DT] {
        self.elements.as_slice()
    }

    #[inline]
    pub fn elements_mut(&mut self) -> &mut [DT] {
        self.elements.as_mut_slice()
    }

    #[inline]
    pub fn at(&self, i: usize) -> DT {
        self.elements.as_slice()[i]
    }

    #[inline]
    pub fn set(&mut self, i: usize, v: DT) {
        self.elements.as_mut_slice()[i] = v;
    }

    /// Converts element-wise into another data type.
    pub fn convert<DT2: DataType>(&self) -> DenseVector<DT2> {
        DenseVector::from_vec(
            self.elements()
                .iter()
                .map(|&v| DT2::of(v.to_f64()))
                .collect(),
        )
    }

    /// Exact element-wise equality, used by the round-trip tests.
    pub fn bitwise_eq(&self, other: &Self) -> bool {
        self.size() == other.size()
            && self
                .elements()
                .iter()
                .zip(other.elements())
                .all(|(a, b)| a.to_f64().to_bits() == b.to_f64().to_bits())
    }
}

impl<DT: DataType> VectorOps for DenseVector<DT> {
    type Scalar = DT;

    fn size(&self) -> usize {
        self.elements.len()
    }

    fn clone_layout(&self) -> Self {
        self.clone_mode(CloneMode::Layout)
    }

    fn format(&mut self, alpha: DT) {
        for v in self.elements_mut() {
            *v = alpha;
        }
    }

    fn copy_from(&mut self, x: &Self) -> FemResult<()> {
        check_sizes(self.size(), x.size())?;
        self.elements_mut().copy_from_slice(x.elements());
        Ok(())
    }

    fn axpy(&mut self, x: &Self, y: &Self, alpha: DT) -> FemResult<()> {
        check_sizes(self.size(), x.size())?;
        check_sizes(self.size(), y.size())?;
        let one = DT::of(1.0);
        if alpha == DT::zero() {
            self.elements_mut().copy_from_slice(y.elements());
        } else if alpha == one {
            for ((r, &a), &b) in self
                .elements_mut()
                .iter_mut()
                .zip(x.elements())
                .zip(y.elements())
            {
                *r = a + b;
            }
        } else if alpha == -one {
            for ((r, &a), &b) in self
                .elements_mut()
                .iter_mut()
                .zip(x.elements())
                .zip(y.elements())
            {
                *r = b - a;
            }
        } else {
            for ((r, &a), &b) in self
                .elements_mut()
                .iter_mut()
                .zip(x.elements())
                .zip(y.elements())
            {
                *r = alpha * a + b;
            }
        }
        Ok(())
    }

    fn scale(&mut self, x: &Self, alpha: DT) -> FemResult<()> {
        check_sizes(self.size(), x.size())?;
        for (r, &a) in self.elements_mut().iter_mut().zip(x.elements()) {
            *r = alpha * a;
        }
        Ok(())
    }

    fn component_product(&mut self, x: &Self, y: &Self) -> FemResult<()> {
        check_sizes(self.size(), x.size())?;
        check_sizes(self.size(), y.size())?;
        for ((r, &a), &b) in self
            .elements_mut()
            .iter_mut()
            .zip(x.elements())
            .zip(y.elements())
        {
            *r = a * b;
        }
        Ok(())
    }

    fn component_invert(&mut self, x: &Self, alpha: DT) -> FemResult<()> {
        check_sizes(self.size(), x.size())?;
        for (r, &a) in self.elements_mut().iter_mut().zip(x.elements()) {
            *r = alpha / a;
        }
        Ok(())
    }

    fn dot(&self, x: &Self) -> FemResult<DT> {
        check_sizes(self.size(), x.size())?;
        let mut sum = DT::zero();
        for (&a, &b) in self.elements().iter().zip(x.elements()) {
            sum += a * b;
        }
        Ok(sum)
    }

    fn triple_dot(&self, x: &Self, y: &Self) -> FemResult<DT> {
        check_sizes(self.size(), x.size())?;
        check_sizes(self.size(), y.size())?;
        let mut sum = DT::zero();
        for ((&d, &a), &b) in self.elements().iter().zip(x.elements()).zip(y.elements()) {
            sum += d * a * b;
        }
        Ok(sum)
    }

    fn norm2sqr(&self) -> DT {
        let mut sum = DT::zero();
        for &a in self.elements() {
            sum += a * a;
        }
        sum
    }

    fn max_abs_element(&self) -> DT {
        let mut max = DT::zero();
        for &a in self.elements() {
            if a.abs() > max {
                max = a.abs();
            }
        }
        max
    }
}

impl<DT: DataType> DenseVector<DT> {
    /// Component-wise divide in place, `self[i] /= x[i]`.
    pub fn component_divide(&mut self, x: &Self) -> FemResult<()> {
        check_sizes(self.size(), x.size())?;
        for (r, &a) in self.elements_mut().iter_mut().zip(x.elements()) {
            *r /= a;
        }
        Ok(())
    }

    /// Gathers elements at `indices` into `buf`.
    pub fn gather_indexed(&self, indices: &[usize], buf: &mut [DT]) -> FemResult<()> {
        check_sizes(indices.len(), buf.len())?;
        let elems = self.elements();
        for (b, &i) in buf.iter_mut().zip(indices) {
            *b = *elems
                .get(i)
                .ok_or(FemError::SizeMismatch {
                    expected: elems.len(),
                    got: i,
                })?;
        }
        Ok(())
    }

    /// Adds `buf` into the elements at `indices`.
    pub fn scatter_add_indexed(&mut self, indices: &[usize], buf: &[DT]) -> FemResult<()> {
        check_sizes(indices.len(), buf.len())?;
        let elems = self.elements_mut();
        for (&b, &i) in buf.iter().zip(indices) {
            elems[i] += b;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_axpy_dispatch() {
        let x = DenseVector::from_vec(vec![1.0, 2.0, 3.0]);
        let y = DenseVector::from_vec(vec![10.0, 20.0, 30.0]);
        let mut r = DenseVector::new(3);

        r.axpy(&x, &y, 1.0).unwrap();
        assert_relative_eq!(r.at(1), 22.0);

        r.axpy(&x, &y, -1.0).unwrap();
        assert_relative_eq!(r.at(2), 27.0);

        r.axpy(&x, &y, 0.0).unwrap();
        assert_relative_eq!(r.at(0), 10.0);

        r.axpy(&x, &y, 2.5).unwrap();
        assert_relative_eq!(r.at(0), 12.5);
    }

    #[test]
    fn test_size_mismatch() {
        let x = DenseVector::<f64>::new(3);
        let y = DenseVector::<f64>::new(4);
        let mut r = DenseVector::<f64>::new(3);
        assert!(r.axpy(&x, &y, 1.0).is_err());
    }

    #[test]
    fn test_clone_modes() {
        let mut v = DenseVector::from_vec(vec![1.0, 2.0]);

        let deep = v.clone_mode(CloneMode::Deep);
        v.set(0, 5.0);
        assert_relative_eq!(deep.at(0), 1.0);

        let layout = v.clone_mode(CloneMode::Layout);
        assert_relative_eq!(layout.at(0), 0.0);
        assert_eq!(layout.size(), 2);

        let weak = v.clone_mode(CloneMode::Weak);
        assert_relative_eq!(weak.at(0), 5.0);
    }

    #[test]
    fn test_triple_dot() {
        let d = DenseVector::from_vec(vec![2.0, 3.0]);
        let x = DenseVector::from_vec(vec![1.0, 1.0]);
        let y = DenseVector::from_vec(vec![4.0, 5.0]);
        assert_relative_eq!(d.triple_dot(&x, &y).unwrap(), 8.0 + 15.0);
    }

    #[test]
    fn test_component_invert() {
        let x = DenseVector::from_vec(vec![2.0, 4.0]);
        let mut r = DenseVector::new(2);
        r.component_invert(&x, 1.0).unwrap();
        assert_relative_eq!(r.at(0), 0.5);
        assert_relative_eq!(r.at(1), 0.25);
    }
}
