//! Homogeneous power vector

use crate::containers::VectorOps;
use crate::error::{check_sizes, FemResult};
use crate::scalar::DataType;

/// `N` equally-typed sub-vectors treated as one long vector.
#[derive(Debug, Clone)]
pub struct PowerVector<V: VectorOps, const N: usize> {
    blocks: [V; N],
}

impl<V: VectorOps, const N: usize> PowerVector<V, N> {
    pub fn from_blocks(blocks: [V; N]) -> Self {
        Self { blocks }
    }

    /// Builds all blocks as layout clones of a template.
    pub fn from_template(template: &V) -> Self {
        Self {
            blocks: std::array::from_fn(|_| template.clone_layout()),
        }
    }

    pub fn block(&self, i: usize) -> &V {
        &self.blocks[i]
    }

    pub fn block_mut(&mut self, i: usize) -> &mut V {
        &mut self.blocks[i]
    }

    pub fn blocks(&self) -> &[V; N] {
        &self.blocks
    }

    /// Routes a flat index to `(block, local_index)`.
    pub fn route(&self, index: usize) -> Option<(usize, usize)> {
        let mut offset = 0;
        for (b, block) in self.blocks.iter().enumerate() {
            if index < offset + block.size() {
                return Some((b, index - offset));
            }
            offset += block.size();
        }
        None
    }
}

impl<V: VectorOps, const N: usize> VectorOps for PowerVector<V, N> {
    type Scalar = V::Scalar;

    fn size(&self) -> usize {
        self.blocks.iter().map(|b| b.size()).sum()
    }

    fn clone_layout(&self) -> Self {
        Self {
            blocks: std::array::from_fn(|i| self.blocks[i].clone_layout()),
        }
    }

    fn format(&mut self, alpha: Self::Scalar) {
        for b in &mut self.blocks {
            b.format(alpha);
        }
    }

    fn copy_from(&mut self, x: &Self) -> FemResult<()> {
        check_sizes(self.size(), x.size())?;
        for (b, xb) in self.blocks.iter_mut().zip(&x.blocks) {
            b.copy_from(xb)?;
        }
        Ok(())
    }

    fn axpy(&mut self, x: &Self, y: &Self, alpha: Self::Scalar) -> FemResult<()> {
        for ((b, xb), yb) in self.blocks.iter_mut().zip(&x.blocks).zip(&y.blocks) {
            b.axpy(xb, yb, alpha)?;
        }
        Ok(())
    }

    fn scale(&mut self, x: &Self, alpha: Self::Scalar) -> FemResult<()> {
        for (b, xb) in self.blocks.iter_mut().zip(&x.blocks) {
            b.scale(xb, alpha)?;
        }
        Ok(())
    }

    fn component_product(&mut self, x: &Self, y: &Self) -> FemResult<()> {
        for ((b, xb), yb) in self.blocks.iter_mut().zip(&x.blocks).zip(&y.blocks) {
            b.component_product(xb, yb)?;
        }
        Ok(())
    }

    fn component_invert(&mut self, x: &Self, alpha: Self::Scalar) -> FemResult<()> {
        for (b, xb) in self.blocks.iter_mut().zip(&x.blocks) {
            b.component_invert(xb, alpha)?;
        }
        Ok(())
    }

    fn dot(&self, x: &Self) -> FemResult<Self::Scalar> {
        let mut sum = Self::Scalar::of(0.0);
        for (b, xb) in self.blocks.iter().zip(&x.blocks) {
            sum += b.dot(xb)?;
        }
        Ok(sum)
    }

    fn triple_dot(&self, x: &Self, y: &Self) -> FemResult<Self::Scalar> {
        let mut sum = Self::Scalar::of(0.0);
        for ((b, xb), yb) in self.blocks.iter().zip(&x.blocks).zip(&y.blocks) {
            sum += b.triple_dot(xb, yb)?;
        }
        Ok(sum)
    }

    fn norm2sqr(&self) -> Self::Scalar {
        let mut sum = Self::Scalar::of(0.0);
        for b in &self.blocks {
            sum += b.norm2sqr();
        }
        sum
    }

    fn max_abs_element(&self) -> Self::Scalar {
        let mut max = Self::Scalar::of(0.0);
        for b in &self.blocks {
            let m = b.max_abs_element();
            if m > max {
                max = m;
            }
        }
        max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::containers::DenseVector;
    use approx::assert_relative_eq;

    #[test]
    fn test_forwarding() {
        let a = DenseVector::from_vec(vec![1.0, 2.0]);
        let b = DenseVector::from_vec(vec![3.0]);
        let p = PowerVector::from_blocks([a, b]);
        assert_eq!(p.size(), 3);
        assert_relative_eq!(p.norm2sqr(), 14.0);
        assert_relative_eq!(p.dot(&p).unwrap(), 14.0);
    }

    #[test]
    fn test_flat_routing() {
        let a = DenseVector::from_vec(vec![1.0, 2.0]);
        let b = DenseVector::from_vec(vec![3.0]);
        let p = PowerVector::from_blocks([a, b]);
        assert_eq!(p.route(1), Some((0, 1)));
        assert_eq!(p.route(2), Some((1, 0)));
        assert_eq!(p.route(3), None);
    }

    #[test]
    fn test_axpy_recurses() {
        let x = PowerVector::from_blocks([
            DenseVector::from_vec(vec![1.0]),
            DenseVector::from_vec(vec![2.0]),
        ]);
        let y = x.clone();
        let mut r = x.clone_layout();
        r.axpy(&x, &y, 2.0).unwrap();
        assert_relative_eq!(r.block(1).at(0), 6.0);
    }
}
