//! Copy strategy selection

use super::blocked::is_blocked_compatible;
use super::reorder::ReorderService;
use super::{CopyConfig, IterationDescriptor};
use crate::runtime::{Device, MemcpyKind};
use crate::tensor::View;

/// How a copy is carried out
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CopyStrategy {
    /// Nothing to do
    Noop,
    /// Native reorder on the shared device
    Reorder,
    /// Both sides on accelerators, run on the source queue
    DeviceToDevice {
        /// Raw byte copy instead of the elementwise kernel
        memcpy: bool,
    },
    /// Byte transfer between host and one accelerator
    HostDevice(MemcpyKind),
    /// Both sides on the host, elementwise kernel run inline
    Host,
    /// Route through dense temporaries
    Staged,
}

/// Choose the strategy for copying `src` into `iter`'s destination
///
/// `src` is the caller's source before broadcasting. `peer_access` tells
/// whether the two devices can address each other's memory. Staging is
/// chosen whenever the direct paths cannot honour dtype, layout or flags
/// across devices.
pub fn select_strategy(
    iter: &IterationDescriptor,
    src: &View,
    config: &CopyConfig,
    peer_access: bool,
    reorder: &dyn ReorderService,
) -> CopyStrategy {
    if iter.numel() == 0 {
        return CopyStrategy::Noop;
    }

    if reorder_eligible(iter.view(0), src, iter, config, reorder) {
        return CopyStrategy::Reorder;
    }

    if requires_temporaries(iter, peer_access) {
        return CopyStrategy::Staged;
    }

    match (iter.device(0), iter.device(1)) {
        (Device::Accel(_), Device::Accel(_)) => CopyStrategy::DeviceToDevice {
            memcpy: memcpy_eligible(iter),
        },
        (Device::Accel(_), Device::Host) => CopyStrategy::HostDevice(MemcpyKind::HostToDevice),
        (Device::Host, Device::Accel(_)) => CopyStrategy::HostDevice(MemcpyKind::DeviceToHost),
        (Device::Host, Device::Host) => CopyStrategy::Host,
    }
}

/// True if a direct path cannot perform this copy
///
/// Same-device copies never need temporaries. Across devices, a byte-exact
/// copy (same dtype, same flags, jointly contiguous) can go direct; anything
/// else needs a device that sees both buffers, which only peer access gives.
pub fn requires_temporaries(iter: &IterationDescriptor, peer_access: bool) -> bool {
    let (dst, src) = (iter.device(0), iter.device(1));
    if dst == src {
        return false;
    }

    let same_dtype = iter.dtype(0) == iter.dtype(1);
    if same_dtype && iter.same_flags() && iter.is_contiguous() {
        return false;
    }
    if dst.is_accel() && src.is_accel() {
        return !peer_access;
    }
    true
}

/// True if a raw byte copy reproduces the logical values
pub fn memcpy_eligible(iter: &IterationDescriptor) -> bool {
    iter.dtype(0) == iter.dtype(1) && iter.same_flags() && iter.is_contiguous()
}

/// True if the native reorder service should handle this copy
///
/// `src` must be the unbroadcast source: the service only maps equal shapes.
pub fn reorder_eligible(
    dst: &View,
    src: &View,
    iter: &IterationDescriptor,
    config: &CopyConfig,
    reorder: &dyn ReorderService,
) -> bool {
    config.native_reorder
        && dst.device() == src.device()
        && dst.device().is_accel()
        && dst.ndim() > 0
        && dst.ndim() <= config.max_reorder_dims
        && dst.shape() == src.shape()
        && iter.same_flags()
        && reorder.supports(dst.dtype())
        && reorder.supports(src.dtype())
        && is_blocked_compatible(dst)
        && is_blocked_compatible(src)
}
