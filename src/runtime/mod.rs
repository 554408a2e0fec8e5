//! Simulated device runtime
//!
//! This module provides the queue/event/memory primitives the copy engine
//! consumes. Accelerator memory is host memory tagged with a device index,
//! and each accelerator owns one FIFO worker queue, which is enough to
//! exercise real cross-queue ordering.
//!
//! # Architecture
//!
//! ```text
//! Runtime (one per process or test)
//! ├── Host allocator (no queue)
//! └── Accel(i) for i in 0..accelerators
//!     ├── Queue (ordered worker)
//!     └── TrackingAllocator
//! ```

mod allocator;
mod device;
mod event;
mod guard;
mod memcpy;
mod queue;

pub use allocator::{Allocator, TrackingAllocator};
pub use device::Device;
pub use event::Event;
pub use guard::{DeviceGuard, current_device};
pub use memcpy::{MemcpyKind, memcpy, memcpy_async};
pub use queue::Queue;

use crate::error::{Error, Result};
use std::sync::Arc;

/// Construction parameters for a [`Runtime`]
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Number of accelerators to expose
    pub accelerators: usize,
    /// Alignment of every allocation, in bytes
    pub alignment: usize,
    /// Per-accelerator cap on live bytes; `None` means unlimited
    pub device_memory_limit: Option<usize>,
    /// Whether accelerators may address each other's memory directly
    pub peer_access: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            accelerators: 2,
            alignment: 64, // AVX-512 alignment
            device_memory_limit: None,
            peer_access: false,
        }
    }
}

impl RuntimeConfig {
    /// Set the number of accelerators
    pub fn with_accelerators(mut self, accelerators: usize) -> Self {
        self.accelerators = accelerators;
        self
    }

    /// Cap live bytes on each accelerator
    pub fn with_device_memory_limit(mut self, limit: usize) -> Self {
        self.device_memory_limit = Some(limit);
        self
    }

    /// Let every pair of distinct accelerators access each other
    pub fn with_peer_access(mut self, enabled: bool) -> Self {
        self.peer_access = enabled;
        self
    }
}

/// Handle to the set of devices, their queues and allocators
///
/// Cloning is cheap. Queues shut down when the last handle (including the
/// ones held by storages) is dropped.
#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    config: RuntimeConfig,
    host: TrackingAllocator,
    accels: Vec<AccelSlot>,
}

struct AccelSlot {
    queue: Queue,
    allocator: TrackingAllocator,
}

impl Runtime {
    /// Start a runtime with the given configuration
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        if config.accelerators > u16::MAX as usize {
            return Err(Error::InvalidArgument {
                arg: "accelerators",
                reason: format!("at most {} supported", u16::MAX),
            });
        }

        let host = TrackingAllocator::new(Device::Host, config.alignment, None);
        let accels = (0..config.accelerators)
            .map(|i| {
                let device = Device::Accel(i as u16);
                Ok(AccelSlot {
                    queue: Queue::new(device)?,
                    allocator: TrackingAllocator::new(
                        device,
                        config.alignment,
                        config.device_memory_limit,
                    ),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        log::debug!("runtime started with {} accelerator(s)", accels.len());
        Ok(Self {
            inner: Arc::new(RuntimeInner {
                config,
                host,
                accels,
            }),
        })
    }

    /// Configuration the runtime was built with
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Number of accelerators
    pub fn device_count(&self) -> usize {
        self.inner.accels.len()
    }

    /// Validate that `device` exists in this runtime
    pub fn check_device(&self, device: Device) -> Result<()> {
        self.slot(device).map(|_| ())
    }

    /// Current queue of an accelerator
    pub fn current_queue(&self, device: Device) -> Result<&Queue> {
        match self.slot(device)? {
            Some(slot) => Ok(&slot.queue),
            None => Err(Error::InvalidArgument {
                arg: "device",
                reason: "the host has no execution queue".to_string(),
            }),
        }
    }

    /// Allocator serving `device`
    pub fn allocator(&self, device: Device) -> Result<&TrackingAllocator> {
        Ok(match self.slot(device)? {
            Some(slot) => &slot.allocator,
            None => &self.inner.host,
        })
    }

    /// Whether `dst` can directly address memory of `src`
    ///
    /// Only distinct accelerators can be peers, and only when the runtime
    /// was configured with peer access.
    pub fn can_access_peer(&self, dst: Device, src: Device) -> bool {
        self.inner.config.peer_access
            && dst != src
            && dst.is_accel()
            && src.is_accel()
            && self.check_device(dst).is_ok()
            && self.check_device(src).is_ok()
    }

    /// Wait for every accelerator queue to drain
    pub fn synchronize(&self) -> Result<()> {
        for slot in &self.inner.accels {
            slot.queue.synchronize()?;
        }
        Ok(())
    }

    fn slot(&self, device: Device) -> Result<Option<&AccelSlot>> {
        match device.index() {
            None => Ok(None),
            Some(i) => self
                .inner
                .accels
                .get(i)
                .map(Some)
                .ok_or(Error::InvalidDevice {
                    device,
                    available: self.inner.accels.len(),
                }),
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("accelerators", &self.inner.accels.len())
            .finish()
    }
}
