//! Memory allocator trait and the tracking allocator used by every device
//!
//! Allocations are host memory regardless of the device they are tagged
//! with; the tracking counters let callers observe whether an operation
//! allocated transient buffers.

use super::Device;
use crate::error::{Error, Result};
use std::alloc::{Layout as AllocLayout, alloc_zeroed, dealloc};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Memory allocator trait for runtime devices
pub trait Allocator: Clone + Send + Sync {
    /// Allocate memory of given size
    ///
    /// Returns an address (u64); zero-sized requests return the null address.
    fn allocate(&self, size_bytes: usize) -> Result<u64>;

    /// Deallocate memory
    fn deallocate(&self, ptr: u64, size_bytes: usize);

    /// Bytes currently allocated
    fn allocated_bytes(&self) -> usize {
        0 // Default: tracking not supported
    }

    /// Number of successful non-empty allocations since creation
    fn allocation_count(&self) -> u64 {
        0
    }
}

/// Aligned, zero-initialised allocator with usage accounting
#[derive(Clone, Debug)]
pub struct TrackingAllocator {
    inner: Arc<TrackingInner>,
}

#[derive(Debug)]
struct TrackingInner {
    device: Device,
    alignment: usize,
    limit: Option<usize>,
    allocated: AtomicUsize,
    allocations: AtomicU64,
}

impl TrackingAllocator {
    /// Create an allocator for `device`
    ///
    /// `limit` caps the bytes that may be live at once; requests beyond it
    /// fail with [`Error::OutOfMemory`].
    pub fn new(device: Device, alignment: usize, limit: Option<usize>) -> Self {
        Self {
            inner: Arc::new(TrackingInner {
                device,
                alignment,
                limit,
                allocated: AtomicUsize::new(0),
                allocations: AtomicU64::new(0),
            }),
        }
    }

    /// Device this allocator serves
    pub fn device(&self) -> Device {
        self.inner.device
    }

    fn layout(&self, size_bytes: usize) -> Result<AllocLayout> {
        AllocLayout::from_size_align(size_bytes, self.inner.alignment).map_err(|_| {
            Error::OutOfMemory {
                device: self.inner.device,
                size: size_bytes,
            }
        })
    }
}

impl Allocator for TrackingAllocator {
    fn allocate(&self, size_bytes: usize) -> Result<u64> {
        if size_bytes == 0 {
            return Ok(0);
        }

        let oom = || Error::OutOfMemory {
            device: self.inner.device,
            size: size_bytes,
        };

        if let Some(limit) = self.inner.limit {
            let reserved = self
                .inner
                .allocated
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                    current.checked_add(size_bytes).filter(|&total| total <= limit)
                });
            if reserved.is_err() {
                return Err(oom());
            }
        } else {
            self.inner.allocated.fetch_add(size_bytes, Ordering::AcqRel);
        }

        let layout = match self.layout(size_bytes) {
            Ok(layout) => layout,
            Err(e) => {
                self.inner.allocated.fetch_sub(size_bytes, Ordering::AcqRel);
                return Err(e);
            }
        };
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            self.inner.allocated.fetch_sub(size_bytes, Ordering::AcqRel);
            return Err(oom());
        }

        self.inner.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(ptr as u64)
    }

    fn deallocate(&self, ptr: u64, size_bytes: usize) {
        if ptr == 0 || size_bytes == 0 {
            return;
        }
        let Ok(layout) = self.layout(size_bytes) else {
            return;
        };
        unsafe {
            dealloc(ptr as *mut u8, layout);
        }
        self.inner.allocated.fetch_sub(size_bytes, Ordering::AcqRel);
    }

    fn allocated_bytes(&self) -> usize {
        self.inner.allocated.load(Ordering::Acquire)
    }

    fn allocation_count(&self) -> u64 {
        self.inner.allocations.load(Ordering::Relaxed)
    }
}
