//! Scoped binding of the calling thread's active device

use super::Device;
use std::cell::Cell;

thread_local! {
    static CURRENT_DEVICE: Cell<Option<Device>> = const { Cell::new(None) };
}

/// Active accelerator bound to the calling thread, if any
pub fn current_device() -> Option<Device> {
    CURRENT_DEVICE.with(Cell::get)
}

/// RAII guard making `device` the active device until dropped
///
/// Guards nest: dropping one restores whatever was active before it.
#[derive(Debug)]
pub struct DeviceGuard {
    previous: Option<Device>,
}

impl DeviceGuard {
    /// Bind `device` for the lifetime of the guard
    pub fn new(device: Device) -> Self {
        let previous = CURRENT_DEVICE.with(|current| current.replace(Some(device)));
        Self { previous }
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        CURRENT_DEVICE.with(|current| current.set(self.previous));
    }
}
