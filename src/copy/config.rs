//! Copy engine configuration and `to_copy` options

use super::blocked::MAX_BLOCKED_DIMS;
use crate::dtype::DType;
use crate::runtime::Device;

/// Engine-wide copy behaviour
///
/// Passed once when the engine is built; there is no process-global state.
#[derive(Clone, Debug)]
pub struct CopyConfig {
    /// Allow direct copies between accelerators that are peers
    ///
    /// Takes effect only for device pairs the runtime reports as peers.
    pub peer_access: bool,
    /// Prefer the native reorder service for eligible same-device copies
    pub native_reorder: bool,
    /// Highest rank handed to the reorder service
    pub max_reorder_dims: usize,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            peer_access: false,
            native_reorder: true,
            max_reorder_dims: MAX_BLOCKED_DIMS,
        }
    }
}

impl CopyConfig {
    /// Enable or disable peer copies between accelerators
    pub fn with_peer_access(mut self, enabled: bool) -> Self {
        self.peer_access = enabled;
        self
    }

    /// Enable or disable the native reorder path
    pub fn with_native_reorder(mut self, enabled: bool) -> Self {
        self.native_reorder = enabled;
        self
    }

    /// Cap the rank of reordered views (never above the blocked limit)
    pub fn with_max_reorder_dims(mut self, dims: usize) -> Self {
        self.max_reorder_dims = dims.min(MAX_BLOCKED_DIMS);
        self
    }
}

/// Memory layout of a `to_copy` result
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum MemoryFormat {
    /// Dense, keeping the source's dimension order when it is dense itself
    #[default]
    Preserve,
    /// Dense row-major
    Contiguous,
}

/// Target of [`CopyEngine::to_copy`](super::CopyEngine::to_copy)
///
/// Unset fields keep the source's value.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ToOptions {
    /// Element type of the result
    pub dtype: Option<DType>,
    /// Device of the result
    pub device: Option<Device>,
    /// Layout of the result
    pub memory_format: MemoryFormat,
    /// Allocate the result in pinned host memory
    pub pin_memory: bool,
}

impl ToOptions {
    /// Convert to `dtype`
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Move to `device`
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Lay the result out as `format`
    pub fn with_memory_format(mut self, format: MemoryFormat) -> Self {
        self.memory_format = format;
        self
    }

    /// Request pinned host memory
    pub fn with_pin_memory(mut self, pinned: bool) -> Self {
        self.pin_memory = pinned;
        self
    }
}
