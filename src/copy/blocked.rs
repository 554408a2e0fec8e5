//! Blocked-dense layout compatibility
//!
//! A reorder service describes memory with a blocked descriptor: per
//! dimension sizes, padded sizes and strides, plus optional inner blocks for
//! tiled formats. A strided view can be handed to such a service only if its
//! strides describe a valid, non-aliasing blocked layout.

use crate::tensor::View;
use smallvec::SmallVec;

/// Maximum rank a blocked descriptor can express
pub const MAX_BLOCKED_DIMS: usize = 6;

/// Stride sentinel for a dimension whose stride is only known at run time
pub const RUNTIME_STRIDE: i64 = i64::MIN;

type Dims = SmallVec<[i64; MAX_BLOCKED_DIMS]>;

/// Blocked-dense memory descriptor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockedDesc {
    dims: Dims,
    padded_dims: Dims,
    strides: Option<Dims>,
    /// (dimension index, block factor) pairs, outermost first
    inner_blocks: SmallVec<[(usize, i64); 2]>,
}

impl BlockedDesc {
    /// Plain descriptor for `dims` with explicit `strides`
    ///
    /// Padded dims equal dims and there are no inner blocks. `None` strides
    /// means the format is left to the service.
    pub fn new(dims: &[i64], strides: Option<&[i64]>) -> Self {
        Self {
            dims: dims.iter().copied().collect(),
            padded_dims: dims.iter().copied().collect(),
            strides: strides.map(|s| s.iter().copied().collect()),
            inner_blocks: SmallVec::new(),
        }
    }

    /// Descriptor of a strided view
    pub fn from_view(view: &View) -> Self {
        let dims: Dims = view.shape().iter().map(|&d| d as i64).collect();
        let strides: Dims = view.strides().iter().map(|&s| s as i64).collect();
        Self {
            padded_dims: dims.clone(),
            dims,
            strides: Some(strides),
            inner_blocks: SmallVec::new(),
        }
    }

    /// Tile dimension `dim` by `factor`, rounding its padded size up
    ///
    /// Out-of-range dims and factors below 1 leave the descriptor unchanged.
    pub fn with_inner_block(mut self, dim: usize, factor: i64) -> Self {
        if factor < 1 {
            return self;
        }
        if let Some(padded) = self.padded_dims.get_mut(dim) {
            *padded = (*padded + factor - 1) / factor * factor;
            self.inner_blocks.push((dim, factor));
        }
        self
    }

    /// Rank of the descriptor
    pub fn ndims(&self) -> usize {
        self.dims.len()
    }

    /// Logical dims
    pub fn dims(&self) -> &[i64] {
        &self.dims
    }

    /// Padded dims
    pub fn padded_dims(&self) -> &[i64] {
        &self.padded_dims
    }

    /// Whether the strides describe a valid blocked layout
    ///
    /// Dimensions are visited innermost first (ascending stride, then padded
    /// size, then index). Each non-zero stride must be at least the extent
    /// already covered by the dimensions inside it; zero strides broadcast
    /// and are skipped.
    pub fn is_compatible(&self) -> bool {
        let ndims = self.ndims();
        if ndims > MAX_BLOCKED_DIMS {
            return false;
        }
        let strides = match &self.strides {
            Some(s) if ndims > 0 => s,
            _ => return true,
        };

        let mut blocks: Dims = SmallVec::from_elem(1, ndims);
        for d in 0..ndims {
            if self.padded_dims[d] == 0 || strides[d] == RUNTIME_STRIDE {
                return true;
            }
        }

        let mut block_size = 1i64;
        for &(d, factor) in &self.inner_blocks {
            blocks[d] *= factor;
            block_size *= factor;
        }

        let mut perm: SmallVec<[usize; MAX_BLOCKED_DIMS]> = (0..ndims).collect();
        perm.sort_by_key(|&d| (strides[d], self.padded_dims[d], d));

        let mut min_stride = block_size;
        for d in perm {
            if strides[d] == 0 {
                continue;
            }
            if strides[d] < min_stride {
                return false;
            }
            min_stride = block_size * strides[d] * (self.padded_dims[d] / blocks[d]);
        }
        true
    }
}

/// Whether `view` can be expressed as a blocked-dense descriptor
pub fn is_blocked_compatible(view: &View) -> bool {
    BlockedDesc::from_view(view).is_compatible()
}
