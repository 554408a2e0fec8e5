//! Layout: shape, strides, and offset of a view into its storage

use smallvec::SmallVec;
use std::fmt;

/// Inline capacity for dimensions; deeper views spill to the heap
const STACK_DIMS: usize = 6;

/// Extent of each dimension
pub type Shape = SmallVec<[usize; STACK_DIMS]>;

/// Element (not byte) step per dimension
///
/// Negative steps walk backwards; 0 repeats one element along a broadcast
/// dimension.
pub type Strides = SmallVec<[isize; STACK_DIMS]>;

/// Geometry of a view over its storage
///
/// Element `[i0, .., in]` lives at storage element
/// `offset + sum(ik * strides[k])`.
#[derive(Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Strides,
    offset: usize,
}

impl Layout {
    /// Row-major layout of `shape` starting at element 0
    ///
    /// # Example
    /// ```
    /// use devcopy::tensor::Layout;
    /// let layout = Layout::contiguous(&[2, 3, 4]);
    /// assert_eq!(layout.strides(), &[12, 4, 1]);
    /// ```
    pub fn contiguous(shape: &[usize]) -> Self {
        let mut strides: Strides = SmallVec::from_elem(0, shape.len());
        let mut step = 1isize;
        for (stride, &size) in strides.iter_mut().zip(shape).rev() {
            *stride = step;
            step *= size.max(1) as isize;
        }
        Self {
            shape: shape.iter().copied().collect(),
            strides,
            offset: 0,
        }
    }

    /// Layout with explicit geometry; `shape` and `strides` have equal rank
    pub fn new(shape: Shape, strides: Strides, offset: usize) -> Self {
        debug_assert_eq!(shape.len(), strides.len());
        Self {
            shape,
            strides,
            offset,
        }
    }

    /// Extent of each dimension
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Element step of each dimension
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Storage element of the first logical element
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Rank
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of logical elements (1 for rank 0)
    #[inline]
    pub fn elem_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check if memory is densely packed in row-major order
    ///
    /// Strides of size-1 dimensions are ignored and the offset does not
    /// matter; empty layouts are contiguous.
    pub fn is_contiguous(&self) -> bool {
        if self.elem_count() == 0 {
            return true;
        }

        let mut expected = 1isize;
        for (&size, &stride) in self.shape.iter().zip(self.strides.iter()).rev() {
            if size == 1 {
                continue;
            }
            if stride != expected {
                return false;
            }
            expected *= size as isize;
        }
        true
    }

    /// Check if the layout covers a dense block in some dimension order
    ///
    /// True for any permutation of a contiguous layout (e.g. a transpose).
    pub fn is_non_overlapping_and_dense(&self) -> bool {
        if self.elem_count() == 0 {
            return true;
        }

        let mut dims: SmallVec<[usize; STACK_DIMS]> =
            (0..self.ndim()).filter(|&d| self.shape[d] != 1).collect();
        dims.sort_by_key(|&d| (self.strides[d], self.shape[d]));

        let mut expected = 1isize;
        for d in dims {
            if self.strides[d] != expected {
                return false;
            }
            expected *= self.shape[d] as isize;
        }
        true
    }

    /// Dense layout with the same shape and the same dimension order
    ///
    /// Used to preserve a permuted memory format when materialising a copy.
    /// Falls back to row-major when the order cannot be inferred.
    pub fn dense_like(&self) -> Self {
        if !self.is_non_overlapping_and_dense() {
            return Self::contiguous(&self.shape);
        }

        let mut order: SmallVec<[usize; STACK_DIMS]> = (0..self.ndim()).collect();
        // Innermost first; ties keep the row-major order.
        order.sort_by(|&a, &b| {
            self.strides[a]
                .cmp(&self.strides[b])
                .then_with(|| b.cmp(&a))
        });

        let mut strides: Strides = SmallVec::from_elem(0, self.ndim());
        let mut stride = 1isize;
        for d in order {
            strides[d] = stride;
            stride *= self.shape[d].max(1) as isize;
        }
        Self::new(self.shape.clone(), strides, 0)
    }

    /// True if two different indices map to one storage element
    ///
    /// Only the cheap, certain case is detected: a zero stride on a
    /// dimension of size > 1.
    pub fn has_internal_overlap(&self) -> bool {
        self.shape
            .iter()
            .zip(self.strides.iter())
            .any(|(&size, &stride)| size > 1 && stride == 0)
    }

    /// Inclusive range of storage element indices the layout touches
    ///
    /// `None` for empty layouts and for layouts reaching below element 0.
    pub fn storage_span(&self) -> Option<(usize, usize)> {
        if self.elem_count() == 0 {
            return None;
        }

        let mut lo = self.offset as isize;
        let mut hi = self.offset as isize;
        for (&size, &stride) in self.shape.iter().zip(self.strides.iter()) {
            let reach = (size as isize - 1) * stride;
            if reach < 0 {
                lo += reach;
            } else {
                hi += reach;
            }
        }
        if lo < 0 {
            return None;
        }
        Some((lo as usize, hi as usize))
    }

    /// Same storage walk with dimensions `dim0` and `dim1` swapped
    ///
    /// Negative dimensions count from the end; `None` if either is out of
    /// range.
    pub fn transpose(&self, dim0: isize, dim1: isize) -> Option<Self> {
        let (d0, d1) = (self.wrap_dim(dim0)?, self.wrap_dim(dim1)?);
        let mut swapped = self.clone();
        swapped.shape.swap(d0, d1);
        swapped.strides.swap(d0, d1);
        Some(swapped)
    }

    /// Broadcast to `target` by prepending dimensions and zeroing the
    /// stride of every expanded size-1 dimension
    ///
    /// `None` if a non-unit dimension differs from its target.
    pub fn broadcast_to(&self, target: &[usize]) -> Option<Self> {
        let pad = target.len().checked_sub(self.ndim())?;
        let mut strides: Strides = SmallVec::from_elem(0, target.len());

        for (k, (&size, &stride)) in self.shape.iter().zip(&self.strides).enumerate() {
            let want = target[pad + k];
            if size == want {
                strides[pad + k] = stride;
            } else if size != 1 {
                return None;
            }
        }
        Some(Self::new(target.iter().copied().collect(), strides, self.offset))
    }

    fn wrap_dim(&self, d: isize) -> Option<usize> {
        let ndim = self.ndim() as isize;
        let wrapped = if d < 0 { d + ndim } else { d };
        (0..ndim).contains(&wrapped).then_some(wrapped as usize)
    }
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Layout {{ shape: {:?}, strides: {:?}, offset: {} }}",
            self.shape.as_slice(),
            self.strides.as_slice(),
            self.offset
        )
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.shape.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_contiguous_layout() {
        let layout = Layout::contiguous(&[2, 3, 4]);
        assert_eq!(layout.shape(), &[2, 3, 4]);
        assert_eq!(layout.strides(), &[12, 4, 1]);
        assert_eq!(layout.elem_count(), 24);
        assert!(layout.is_contiguous());
        assert_eq!(Layout::contiguous(&[2, 0, 3]).strides(), &[3, 3, 1]);
    }

    #[test]
    fn test_rank_zero_layout() {
        let layout = Layout::contiguous(&[]);
        assert_eq!(layout.ndim(), 0);
        assert_eq!(layout.elem_count(), 1);
        assert!(layout.is_contiguous());
        assert_eq!(layout.storage_span(), Some((0, 0)));
    }

    #[test]
    fn test_contiguity_ignores_unit_dims_and_offset() {
        let layout = Layout::new(smallvec![1, 3], smallvec![99, 1], 5);
        assert!(layout.is_contiguous());
        let padded = Layout::new(smallvec![2, 3], smallvec![4, 1], 0);
        assert!(!padded.is_contiguous());
        assert!(!padded.is_non_overlapping_and_dense());
    }

    #[test]
    fn test_transpose() {
        let layout = Layout::contiguous(&[2, 3, 4]);
        let transposed = layout.transpose(-1, -2).unwrap();
        assert_eq!(transposed.shape(), &[2, 4, 3]);
        assert_eq!(transposed.strides(), &[12, 1, 4]);
        assert!(!transposed.is_contiguous());
        assert!(transposed.is_non_overlapping_and_dense());
        assert_eq!(transposed.dense_like(), transposed);
        assert!(layout.transpose(0, 3).is_none());
    }

    #[test]
    fn test_broadcast_to() {
        let layout = Layout::contiguous(&[1, 3]);
        let expanded = layout.broadcast_to(&[4, 2, 3]).unwrap();
        assert_eq!(expanded.shape(), &[4, 2, 3]);
        assert_eq!(expanded.strides(), &[0, 0, 1]);
        assert!(expanded.has_internal_overlap());
        assert!(layout.broadcast_to(&[2, 2]).is_none());
        assert!(layout.broadcast_to(&[3]).is_none());
    }

    #[test]
    fn test_storage_span() {
        let layout = Layout::new(smallvec![2, 3], smallvec![8, 2], 1);
        assert_eq!(layout.storage_span(), Some((1, 13)));
        let flipped = Layout::new(smallvec![3], smallvec![-1], 2);
        assert_eq!(flipped.storage_span(), Some((0, 2)));
        let empty = Layout::contiguous(&[0, 4]);
        assert_eq!(empty.storage_span(), None);
    }
}
