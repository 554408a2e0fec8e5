//! Native reorder service

use super::blocked::{MAX_BLOCKED_DIMS, is_blocked_compatible};
use super::kernel::{CopyOp, ElementwiseKernel};
use super::IterationDescriptor;
use crate::dtype::{DType, DTypeSet};
use crate::error::{Error, Result};
use crate::runtime::Queue;
use crate::tensor::View;

/// Format-conversion service able to copy between blocked-dense layouts
///
/// The engine prefers it for same-device copies whose layouts and dtypes
/// it accepts.
pub trait ReorderService: Send + Sync {
    /// Dtypes the service can read and write
    fn supported_dtypes(&self) -> DTypeSet;

    /// Whether `dtype` is supported
    fn supports(&self, dtype: DType) -> bool {
        self.supported_dtypes().contains(dtype)
    }

    /// Enqueue a reorder of `src` into `dst` on `queue`
    ///
    /// Both views have the same shape and pass the blocked layout check.
    fn reorder(&self, queue: &Queue, dst: &View, src: &View) -> Result<()>;
}

/// Reorder over blocked-dense layouts, run as one queue task
#[derive(Copy, Clone, Debug, Default)]
pub struct BlockedReorder;

impl BlockedReorder {
    const DTYPES: DTypeSet = DTypeSet::of(&[
        DType::F32,
        DType::F16,
        DType::BF16,
        DType::I32,
        DType::I8,
        DType::U8,
    ]);
}

impl ReorderService for BlockedReorder {
    fn supported_dtypes(&self) -> DTypeSet {
        Self::DTYPES
    }

    fn reorder(&self, queue: &Queue, dst: &View, src: &View) -> Result<()> {
        for view in [dst, src] {
            if !self.supports(view.dtype()) {
                return Err(Error::unsupported_dtype(view.dtype(), "reorder"));
            }
            if view.ndim() > MAX_BLOCKED_DIMS || !is_blocked_compatible(view) {
                return Err(Error::InvalidArgument {
                    arg: "layout",
                    reason: format!("{:?} is not a blocked-dense layout", view.layout()),
                });
            }
        }
        if dst.shape() != src.shape() {
            return Err(Error::shape_mismatch(dst.shape(), src.shape()));
        }

        let iter = IterationDescriptor::build(dst, src)?;
        let kernel = ElementwiseKernel::new(&iter, CopyOp::Identity)?;
        queue.submit(move || kernel.run())
    }
}
