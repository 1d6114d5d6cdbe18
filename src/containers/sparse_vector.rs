//! Sparse vector containers
//!
//! Entries are appended unsorted; the first read access triggers an
//! in-place sort in which duplicate indices collapse to the last written
//! value. Reads therefore take `&mut self`, which also makes the
//! sequential-only access contract a compile-time fact.

use nalgebra::SVector;

use crate::containers::{ArrayHandle, CloneMode};
use crate::error::{FemError, FemResult};
use crate::scalar::{DataType, IndexType};

/// Default allocation increment for sparse vector growth.
pub const ALLOC_INCREMENT: usize = 1000;

/// Unordered (index, value) tuples with lazy sort-on-read.
#[derive(Debug, Clone)]
pub struct SparseVector<DT: DataType = f64, IT: IndexType = u64> {
    size: usize,
    used: usize,
    sorted: bool,
    alloc_increment: usize,
    indices: ArrayHandle<IT>,
    values: ArrayHandle<DT>,
}

impl<DT: DataType, IT: IndexType> SparseVector<DT, IT> {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            used: 0,
            sorted: true,
            alloc_increment: ALLOC_INCREMENT,
            indices: ArrayHandle::new(Vec::new()),
            values: ArrayHandle::new(Vec::new()),
        }
    }

    /// Logical size of the vector (not the number of stored entries).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of stored entries; only meaningful after a sort collapsed
    /// duplicates.
    pub fn used_elements(&self) -> usize {
        self.used
    }

    pub fn clone_mode(&self, mode: CloneMode) -> Self {
        let (indices, values) = match mode {
            CloneMode::Shallow => (self.indices.share(), self.values.share()),
            CloneMode::Layout => (self.indices.share(), self.values.fresh_zeros()),
            CloneMode::Weak => (self.indices.share(), self.values.duplicate()),
            CloneMode::Deep => (self.indices.duplicate(), self.values.duplicate()),
        };
        Self {
            size: self.size,
            used: self.used,
            sorted: self.sorted,
            alloc_increment: self.alloc_increment,
            indices,
            values,
        }
    }

    /// Appends or overwrites the entry at `index`.
    pub fn set(&mut self, index: usize, value: DT) -> FemResult<()> {
        if index >= self.size {
            return Err(FemError::SizeMismatch {
                expected: self.size,
                got: index,
            });
        }
        // Overwrite in place if the entry already exists in sorted storage.
        if self.sorted {
            let idx = IT::from_usize(index);
            let ind = self.indices.as_slice();
            if let Ok(pos) = ind[..self.used].binary_search(&idx) {
                self.values.as_mut_slice()[pos] = value;
                return Ok(());
            }
        }
        self.reserve_one();
        self.indices.as_mut_slice()[self.used] = IT::from_usize(index);
        self.values.as_mut_slice()[self.used] = value;
        self.used += 1;
        self.sorted = false;
        Ok(())
    }

    fn reserve_one(&mut self) {
        if self.used < self.indices.len() {
            return;
        }
        // Grow by the current increment, then double it.
        let new_cap = self.indices.len() + self.alloc_increment;
        self.alloc_increment *= 2;
        let mut ind = self.indices.as_slice().to_vec();
        let mut val = self.values.as_slice().to_vec();
        ind.resize(new_cap, IT::from_usize(0));
        val.resize(new_cap, DT::zero());
        self.indices = ArrayHandle::new(ind);
        self.values = ArrayHandle::new(val);
    }

    /// Sorts the stored entries by index, collapsing duplicates to the last
    /// written value. Earlier duplicates are marked with the `MAX` sentinel
    /// and buried by a second sort, then the used count is reduced.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        let used = self.used;
        let ind = self.indices.as_mut_slice();
        let val_handle = &mut self.values;
        let val = val_handle.as_mut_slice();

        let mut perm: Vec<usize> = (0..used).collect();
        perm.sort_by_key(|&p| (ind[p], p));

        let mut sorted_ind: Vec<IT> = perm.iter().map(|&p| ind[p]).collect();
        let mut sorted_val: Vec<DT> = perm.iter().map(|&p| val[p]).collect();

        // Last writer wins within each run of equal indices.
        for k in 0..used.saturating_sub(1) {
            if sorted_ind[k] == sorted_ind[k + 1] {
                sorted_ind[k] = IT::MAX;
            }
        }

        let mut pairs: Vec<(IT, DT)> = sorted_ind.into_iter().zip(sorted_val.drain(..)).collect();
        pairs.sort_by_key(|&(i, _)| i);
        let keep = pairs.iter().take_while(|&&(i, _)| i != IT::MAX).count();

        for (k, &(i, v)) in pairs.iter().enumerate().take(used) {
            ind[k] = i;
            val[k] = v;
        }
        self.used = keep;
        self.sorted = true;
    }

    /// Reads the entry at `index`; absent entries read as zero.
    pub fn get(&mut self, index: usize) -> DT {
        self.sort();
        let idx = IT::from_usize(index);
        match self.indices.as_slice()[..self.used].binary_search(&idx) {
            Ok(pos) => self.values.as_slice()[pos],
            Err(_) => DT::zero(),
        }
    }

    /// Sorted (index, value) pairs.
    pub fn iter(&mut self) -> impl Iterator<Item = (usize, DT)> + '_ {
        self.sort();
        let used = self.used;
        self.indices.as_slice()[..used]
            .iter()
            .map(|i| i.as_usize())
            .zip(self.values.as_slice()[..used].iter().copied())
    }
}

/// Sparse vector of fixed-size value tiles, e.g. per-dof normal vectors.
#[derive(Debug, Clone)]
pub struct SparseVectorBlocked<DT: DataType = f64, IT: IndexType = u64, const B: usize = 2> {
    size: usize,
    used: usize,
    sorted: bool,
    indices: ArrayHandle<IT>,
    values: ArrayHandle<DT>,
}

impl<DT: DataType, IT: IndexType, const B: usize> SparseVectorBlocked<DT, IT, B> {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            used: 0,
            sorted: true,
            indices: ArrayHandle::new(Vec::new()),
            values: ArrayHandle::new(Vec::new()),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn used_elements(&self) -> usize {
        self.used
    }

    /// Appends a block entry; duplicate indices are summed on sort, which
    /// is what the distributed normal-vector assembly relies on.
    pub fn add(&mut self, index: usize, value: SVector<DT, B>) -> FemResult<()> {
        if index >= self.size {
            return Err(FemError::SizeMismatch {
                expected: self.size,
                got: index,
            });
        }
        let mut ind = self.indices.as_slice()[..self.used].to_vec();
        let mut val = self.values.as_slice()[..self.used * B].to_vec();
        ind.push(IT::from_usize(index));
        for k in 0..B {
            val.push(value[k]);
        }
        self.indices = ArrayHandle::new(ind);
        self.values = ArrayHandle::new(val);
        self.used += 1;
        self.sorted = false;
        Ok(())
    }

    /// Sorts by index, *summing* blocks with equal indices.
    pub fn sort(&mut self) {
        if self.sorted {
            return;
        }
        let used = self.used;
        let ind = self.indices.as_slice();
        let val = self.values.as_slice();

        let mut perm: Vec<usize> = (0..used).collect();
        perm.sort_by_key(|&p| (ind[p], p));

        let mut out_ind: Vec<IT> = Vec::with_capacity(used);
        let mut out_val: Vec<DT> = Vec::with_capacity(used * B);
        for &p in &perm {
            if out_ind.last() == Some(&ind[p]) {
                let base = (out_ind.len() - 1) * B;
                for k in 0..B {
                    out_val[base + k] += val[p * B + k];
                }
            } else {
                out_ind.push(ind[p]);
                out_val.extend_from_slice(&val[p * B..(p + 1) * B]);
            }
        }
        self.used = out_ind.len();
        self.indices = ArrayHandle::new(out_ind);
        self.values = ArrayHandle::new(out_val);
        self.sorted = true;
    }

    pub fn get(&mut self, index: usize) -> SVector<DT, B> {
        self.sort();
        let idx = IT::from_usize(index);
        match self.indices.as_slice()[..self.used].binary_search(&idx) {
            Ok(pos) => SVector::from_fn(|k, _| self.values.as_slice()[pos * B + k]),
            Err(_) => SVector::zeros(),
        }
    }

    pub fn iter(&mut self) -> impl Iterator<Item = (usize, SVector<DT, B>)> + '_ {
        self.sort();
        let used = self.used;
        let values = self.values.as_slice();
        self.indices.as_slice()[..used]
            .iter()
            .enumerate()
            .map(move |(p, i)| {
                (
                    i.as_usize(),
                    SVector::from_fn(|k, _| values[p * B + k]),
                )
            })
    }

    /// Normalises every stored block to unit length.
    pub fn normalise(&mut self) {
        self.sort();
        let used = self.used;
        let values = self.values.as_mut_slice();
        for p in 0..used {
            let mut nrm = DT::zero();
            for k in 0..B {
                nrm += values[p * B + k] * values[p * B + k];
            }
            let nrm = nrm.sqrt();
            if nrm > DT::zero() {
                for k in 0..B {
                    values[p * B + k] /= nrm;
                }
            }
        }
    }
}
