//! Iteration descriptor pairing a destination with its source

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::runtime::Device;
use crate::tensor::{DataPtr, Shape, Strides, View};
use smallvec::SmallVec;

/// Validated pairing of two views for one copy
///
/// Operand 0 is the destination, operand 1 the source already broadcast to
/// the destination's shape. The descriptor also carries the dimensions
/// after reordering (innermost by destination stride) and coalescing, which
/// is what kernels iterate over and what decides joint contiguity.
#[derive(Clone, Debug)]
pub struct IterationDescriptor {
    operands: [View; 2],
    shape: Shape,
    strides: [Strides; 2],
    numel: usize,
}

impl IterationDescriptor {
    /// Pair `dst` with `src`
    ///
    /// Fails if `src` does not broadcast to `dst`, if `dst` maps several
    /// elements to one location, or if the two partially share memory.
    /// Never dereferences either storage.
    pub fn build(dst: &View, src: &View) -> Result<Self> {
        if dst.layout().has_internal_overlap() {
            return Err(Error::InternalOverlap);
        }
        let src = src.expand(dst.shape())?;
        check_partial_overlap(dst, &src)?;

        let numel = dst.numel();
        let (shape, strides) = coalesce(dst.shape(), [dst.strides(), src.strides()]);

        Ok(Self {
            operands: [dst.clone(), src],
            shape,
            strides,
            numel,
        })
    }

    /// Number of operands (always 2)
    #[inline]
    pub fn ntensors(&self) -> usize {
        2
    }

    /// Operand `i` (0 = destination, 1 = broadcast source)
    #[inline]
    pub fn view(&self, i: usize) -> &View {
        &self.operands[i]
    }

    /// Device of operand `i`
    #[inline]
    pub fn device(&self, i: usize) -> Device {
        self.operands[i].device()
    }

    /// Dtype of operand `i`
    #[inline]
    pub fn dtype(&self, i: usize) -> DType {
        self.operands[i].dtype()
    }

    /// Element size of operand `i`
    #[inline]
    pub fn element_size(&self, i: usize) -> usize {
        self.operands[i].element_size()
    }

    /// Address of operand `i`'s first element
    #[inline]
    pub fn data_ptr(&self, i: usize) -> DataPtr {
        self.operands[i].data_ptr()
    }

    /// Logical element count
    #[inline]
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Coalesced iteration shape, outermost first
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Coalesced element strides of operand `i`
    #[inline]
    pub fn strides(&self, i: usize) -> &[isize] {
        &self.strides[i]
    }

    /// True if both operands are dense and in the same element order, so a
    /// single linear byte range copy reproduces the logical ordering
    pub fn is_contiguous(&self) -> bool {
        match self.shape.len() {
            0 => true,
            1 => self.strides[0][0] == 1 && self.strides[1][0] == 1,
            _ => false,
        }
    }

    /// Whether the numeric-interpretation flags agree on both sides
    pub fn same_flags(&self) -> bool {
        let (dst, src) = (&self.operands[0], &self.operands[1]);
        dst.is_conj() == src.is_conj() && dst.is_neg() == src.is_neg()
    }
}

/// Drop unit dimensions, order the rest innermost-first by destination
/// stride, and merge neighbours that are contiguous in both operands.
fn coalesce(shape: &[usize], strides: [&[isize]; 2]) -> (Shape, [Strides; 2]) {
    let mut dims: SmallVec<[usize; 6]> = (0..shape.len()).filter(|&d| shape[d] != 1).collect();
    dims.sort_by_key(|&d| {
        (
            strides[0][d].unsigned_abs(),
            strides[1][d].unsigned_abs(),
            std::cmp::Reverse(d),
        )
    });

    let mut out_shape = Shape::new();
    let mut out_strides: [Strides; 2] = [Strides::new(), Strides::new()];
    for d in dims {
        if let Some(last) = out_shape.len().checked_sub(1) {
            let extent = out_shape[last] as isize;
            let mergeable = (0..2).all(|k| strides[k][d] == out_strides[k][last] * extent);
            if mergeable {
                out_shape[last] *= shape[d];
                continue;
            }
        }
        out_shape.push(shape[d]);
        for k in 0..2 {
            out_strides[k].push(strides[k][d]);
        }
    }

    out_shape.reverse();
    for s in &mut out_strides {
        s.reverse();
    }
    (out_shape, out_strides)
}

fn check_partial_overlap(dst: &View, src: &View) -> Result<()> {
    if !dst.storage().is_same(src.storage()) {
        return Ok(());
    }
    // Same element mapping on both sides is an in-place elementwise update.
    if dst.layout() == src.layout() && dst.dtype() == src.dtype() {
        return Ok(());
    }

    let byte_span = |v: &View| {
        v.layout()
            .storage_span()
            .map(|(lo, hi)| (lo * v.element_size(), (hi + 1) * v.element_size()))
    };
    if let (Some((a_lo, a_hi)), Some((b_lo, b_hi))) = (byte_span(dst), byte_span(src)) {
        if a_lo < b_hi && b_lo < a_hi {
            return Err(Error::PartialOverlap);
        }
    }
    Ok(())
}
