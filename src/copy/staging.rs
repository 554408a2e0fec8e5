//! Copies routed through dense temporaries
//!
//! When no direct path can honour a cross-device copy (a dtype change, a
//! non-dense layout, differing flags or a broadcast), the engine splits it
//! into copies that each have a direct path:
//!
//! 1. conversion happens on the destination's device if it is an
//!    accelerator, otherwise on the source's device
//! 2. the destination itself serves as the output buffer when it is dense,
//!    otherwise a dense temporary carrying the destination's flags is
//!    allocated
//! 3. the source is expanded to the destination's shape and made dense; if
//!    it must change device it is moved unconverted with a byte copy and
//!    keeps its own flags
//! 4. the dense source is copied into the output buffer, converting dtype
//! 5. the output buffer is copied into the destination if they differ
//!
//! Flags are only resolved by the copy that also changes dtype, so a staged
//! copy produces the same values as a direct one on a single device.

use super::kernel::ElementwiseLauncher;
use super::reorder::ReorderService;
use super::CopyEngine;
use crate::dtype::DType;
use crate::error::Result;
use crate::runtime::Device;
use crate::tensor::{Layout, View};

impl<L: ElementwiseLauncher, R: ReorderService> CopyEngine<L, R> {
    /// Copy `src` into `dst` through temporaries
    ///
    /// Every copy issued here runs at `depth`, where staging is refused.
    pub(super) fn copy_with_temporaries(
        &self,
        dst: &View,
        src: &View,
        non_blocking: bool,
        depth: usize,
    ) -> Result<()> {
        let conversion_device = if dst.device().is_accel() {
            dst.device()
        } else {
            src.device()
        };
        log::debug!(
            "staging {} <- {} through {}",
            dst.device(),
            src.device(),
            conversion_device
        );

        let dst_tmp = if dst.is_contiguous() {
            dst.clone()
        } else {
            self.dense_temporary(dst.shape(), dst.dtype(), dst.device(), dst)?
        };

        let expanded = src.expand_as(dst)?;
        let src_tmp = if conversion_device == src.device() {
            self.materialize(&expanded, dst.dtype(), src.device(), dst, non_blocking, depth)?
        } else {
            let raw = self.materialize(&expanded, src.dtype(), src.device(), src, non_blocking, depth)?;
            self.materialize(&raw, src.dtype(), conversion_device, src, non_blocking, depth)?
        };

        let writes_dst = dst_tmp.is_same(dst);
        // A host output buffer is read back on this thread below.
        let step_non_blocking = non_blocking && (writes_dst || dst.device().is_accel());
        self.copy_at_depth(&dst_tmp, &src_tmp, step_non_blocking, depth)?;

        if !writes_dst {
            self.copy_at_depth(dst, &dst_tmp, non_blocking, depth)?;
        }
        Ok(())
    }

    /// `view` as a dense view of `dtype` on `device` with the flags of `like`
    ///
    /// Returns `view` itself when it already qualifies.
    fn materialize(
        &self,
        view: &View,
        dtype: DType,
        device: Device,
        like: &View,
        non_blocking: bool,
        depth: usize,
    ) -> Result<View> {
        if view.device() == device
            && view.dtype() == dtype
            && view.is_contiguous()
            && same_flags(view, like)
        {
            return Ok(view.clone());
        }
        let tmp = self.dense_temporary(view.shape(), dtype, device, like)?;
        self.copy_at_depth(&tmp, view, non_blocking, depth)?;
        Ok(tmp)
    }

    /// Row-major temporary taking `like`'s flags and, for quantized dtypes,
    /// its quantizer
    fn dense_temporary(&self, shape: &[usize], dtype: DType, device: Device, like: &View) -> Result<View> {
        let mut tmp =
            View::empty_with_layout(self.runtime(), Layout::contiguous(shape), dtype, device, false)?;
        tmp.set_flags_like(like);
        if dtype.is_quantized() {
            tmp.set_quantizer(like.quantizer());
        }
        Ok(tmp)
    }
}

fn same_flags(a: &View, b: &View) -> bool {
    a.is_conj() == b.is_conj() && a.is_neg() == b.is_neg()
}
