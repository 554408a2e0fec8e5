//! Byte-range transfers submitted to device queues

use super::Queue;
use crate::error::{Error, Result};
use crate::tensor::DataPtr;

/// Direction of a byte transfer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MemcpyKind {
    /// Host memory into accelerator memory
    HostToDevice,
    /// Accelerator memory into host memory
    DeviceToHost,
    /// Between accelerator allocations (same or different device)
    DeviceToDevice,
}

impl MemcpyKind {
    fn check(self, dst: &DataPtr, src: &DataPtr) -> Result<()> {
        let (d, s) = (dst.device(), src.device());
        let ok = match self {
            Self::HostToDevice => s.is_host() && d.is_accel(),
            Self::DeviceToHost => s.is_accel() && d.is_host(),
            Self::DeviceToDevice => s.is_accel() && d.is_accel(),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::UnsupportedDevices { dst: d, src: s })
        }
    }
}

/// Enqueue a copy of `nbytes` from `src` to `dst` on `queue`
///
/// Returns once the transfer is queued; the buffers stay alive until it has
/// run because the task holds both storages.
pub fn memcpy_async(
    queue: &Queue,
    dst: DataPtr,
    src: DataPtr,
    nbytes: usize,
    kind: MemcpyKind,
) -> Result<()> {
    kind.check(&dst, &src)?;
    if nbytes == 0 {
        return Ok(());
    }
    dst.check_range(nbytes)?;
    src.check_range(nbytes)?;

    log::trace!(
        "memcpy {:?} {} bytes on {} ({} <- {})",
        kind,
        nbytes,
        queue.device(),
        dst.device(),
        src.device()
    );
    queue.submit(move || {
        // Regions may overlap when both sides alias one storage.
        unsafe {
            std::ptr::copy(src.addr() as *const u8, dst.addr() as *mut u8, nbytes);
        }
    })
}

/// Copy `nbytes` from `src` to `dst` on `queue` and wait for completion
pub fn memcpy(
    queue: &Queue,
    dst: DataPtr,
    src: DataPtr,
    nbytes: usize,
    kind: MemcpyKind,
) -> Result<()> {
    memcpy_async(queue, dst, src, nbytes, kind)?;
    queue.synchronize()
}
