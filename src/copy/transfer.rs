//! Host/device byte transfers

use super::IterationDescriptor;
use crate::error::{Error, Result};
use crate::runtime::{DeviceGuard, MemcpyKind, Runtime, memcpy, memcpy_async};

/// Transfer the bytes of `iter` between the host and one accelerator
///
/// The operands must be byte-identical in dtype and layout; any conversion
/// has already been done by staging. The transfer runs on the accelerator
/// side's queue with that device bound as current. Blocking transfers
/// return after the bytes have landed. Only pinned host memory is
/// transferred asynchronously; with pageable memory a non-blocking request
/// still waits, since the host buffer may be reused as soon as we return.
pub fn copy_host_device(
    runtime: &Runtime,
    iter: &IterationDescriptor,
    kind: MemcpyKind,
    non_blocking: bool,
) -> Result<()> {
    let device = match kind {
        MemcpyKind::HostToDevice => iter.device(0),
        MemcpyKind::DeviceToHost => iter.device(1),
        MemcpyKind::DeviceToDevice => {
            return Err(Error::internal("device-to-device copy on the host transfer path"));
        }
    };
    if iter.dtype(0) != iter.dtype(1) || !iter.is_contiguous() {
        return Err(Error::internal("host transfer needs byte-identical operands"));
    }

    let host_pinned = match kind {
        MemcpyKind::HostToDevice => iter.view(1).storage().is_pinned(),
        _ => iter.view(0).storage().is_pinned(),
    };
    let non_blocking = non_blocking && host_pinned;

    let _guard = DeviceGuard::new(device);
    let queue = runtime.current_queue(device)?;
    let nbytes = iter.numel() * iter.element_size(0);
    log::debug!(
        "{:?} of {} bytes on {} (non_blocking={})",
        kind,
        nbytes,
        device,
        non_blocking
    );

    let (dst, src) = (iter.data_ptr(0), iter.data_ptr(1));
    if non_blocking {
        memcpy_async(queue, dst, src, nbytes, kind)
    } else {
        memcpy(queue, dst, src, nbytes, kind)
    }
}
