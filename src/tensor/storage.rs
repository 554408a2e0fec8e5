//! Storage: device memory management with Arc-based sharing

use crate::error::{Error, Result};
use crate::runtime::{Allocator, Device, Queue, Runtime, TrackingAllocator};
use std::sync::Arc;

/// Byte buffer living on exactly one device
///
/// Storage wraps device memory with reference counting, enabling zero-copy
/// views (transpose, expand, as_strided) that share the underlying buffer.
/// Accelerator storage keeps a handle to its device queue so host reads can
/// wait for pending work.
///
/// Memory is automatically deallocated when the last reference is dropped.
pub struct Storage {
    inner: Arc<StorageInner>,
}

struct StorageInner {
    /// Raw address (host memory cast to u64); 0 for empty storage
    ptr: u64,
    /// Size in bytes
    size_bytes: usize,
    /// Device where memory is allocated
    device: Device,
    /// Queue of the owning accelerator; `None` on the host
    queue: Option<Queue>,
    /// Allocator to return memory to; `None` if we do not own it
    allocator: Option<TrackingAllocator>,
    /// Page-locked host memory
    pinned: bool,
}

impl Storage {
    /// Allocate `size_bytes` zeroed bytes on `device`
    pub fn new(runtime: &Runtime, size_bytes: usize, device: Device) -> Result<Self> {
        Self::allocate(runtime, size_bytes, device, false)
    }

    /// Allocate pinned host memory
    pub fn new_pinned(runtime: &Runtime, size_bytes: usize) -> Result<Self> {
        Self::allocate(runtime, size_bytes, Device::Host, true)
    }

    fn allocate(runtime: &Runtime, size_bytes: usize, device: Device, pinned: bool) -> Result<Self> {
        let allocator = runtime.allocator(device)?.clone();
        let queue = match device {
            Device::Host => None,
            Device::Accel(_) => Some(runtime.current_queue(device)?.clone()),
        };
        let ptr = allocator.allocate(size_bytes)?;

        Ok(Self {
            inner: Arc::new(StorageInner {
                ptr,
                size_bytes,
                device,
                queue,
                allocator: Some(allocator),
                pinned,
            }),
        })
    }

    /// Wrap existing memory without taking ownership
    ///
    /// # Safety
    /// - `ptr` must be valid for `size_bytes` bytes, unless `size_bytes` is 0,
    ///   in which case it is never dereferenced
    /// - The memory must remain valid for the lifetime of this Storage
    /// - Caller is responsible for eventual deallocation
    pub unsafe fn from_ptr(ptr: u64, size_bytes: usize, device: Device, queue: Option<Queue>) -> Self {
        Self {
            inner: Arc::new(StorageInner {
                ptr,
                size_bytes,
                device,
                queue,
                allocator: None,
                pinned: false,
            }),
        }
    }

    /// Get the raw address
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.inner.ptr
    }

    /// Get size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.inner.size_bytes
    }

    /// Check if storage is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.size_bytes == 0
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> Device {
        self.inner.device
    }

    /// Queue of the owning accelerator
    #[inline]
    pub fn queue(&self) -> Option<&Queue> {
        self.inner.queue.as_ref()
    }

    /// Whether this is pinned host memory
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.inner.pinned
    }

    /// Get the reference count
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Check whether two handles share one buffer
    #[inline]
    pub fn is_same(&self, other: &Storage) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Wait for all work queued on the owning device
    pub fn synchronize(&self) -> Result<()> {
        match &self.inner.queue {
            Some(queue) => queue.synchronize(),
            None => Ok(()),
        }
    }
}

impl Clone for Storage {
    /// Clone increments the reference count (zero-copy)
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for StorageInner {
    fn drop(&mut self) {
        if let Some(allocator) = &self.allocator {
            allocator.deallocate(self.ptr, self.size_bytes);
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("ptr", &format!("0x{:x}", self.inner.ptr))
            .field("size_bytes", &self.inner.size_bytes)
            .field("device", &self.inner.device)
            .field("owned", &self.inner.allocator.is_some())
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}

/// Address inside a storage, kept alive for as long as the pointer exists
///
/// This is what queued tasks capture: holding the `Storage` guarantees the
/// buffer outlives any asynchronous work reading or writing it.
#[derive(Clone, Debug)]
pub struct DataPtr {
    storage: Storage,
    byte_offset: usize,
}

impl DataPtr {
    /// Pointer `byte_offset` bytes into `storage`
    pub fn new(storage: Storage, byte_offset: usize) -> Self {
        Self {
            storage,
            byte_offset,
        }
    }

    /// Absolute address
    #[inline]
    pub fn addr(&self) -> u64 {
        self.storage.ptr() + self.byte_offset as u64
    }

    /// Offset from the start of the storage
    #[inline]
    pub fn byte_offset(&self) -> usize {
        self.byte_offset
    }

    /// Device of the underlying storage
    #[inline]
    pub fn device(&self) -> Device {
        self.storage.device()
    }

    /// Underlying storage
    #[inline]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Check that `nbytes` starting here stay inside the storage
    pub fn check_range(&self, nbytes: usize) -> Result<()> {
        let required = self.byte_offset.saturating_add(nbytes);
        if required > self.storage.size_in_bytes() {
            return Err(Error::OutOfBounds {
                required,
                available: self.storage.size_in_bytes(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RuntimeConfig;

    #[test]
    fn test_storage_sharing_and_release() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        let alloc = rt.allocator(Device::Accel(0)).unwrap().clone();
        {
            let storage = Storage::new(&rt, 256, Device::Accel(0)).unwrap();
            let alias = storage.clone();
            assert!(storage.is_same(&alias));
            assert_eq!(storage.ref_count(), 2);
            assert!(storage.queue().is_some());
            assert_eq!(alloc.allocated_bytes(), 256);
        }
        assert_eq!(alloc.allocated_bytes(), 0);
    }

    #[test]
    fn test_empty_storage_has_null_address() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        let storage = Storage::new(&rt, 0, Device::Host).unwrap();
        assert!(storage.is_empty());
        assert_eq!(storage.ptr(), 0);
        assert!(storage.queue().is_none());
    }

    #[test]
    fn test_data_ptr_range_check() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        let storage = Storage::new(&rt, 16, Device::Host).unwrap();
        let ptr = DataPtr::new(storage, 8);
        assert!(ptr.check_range(8).is_ok());
        assert!(matches!(
            ptr.check_range(9),
            Err(Error::OutOfBounds {
                required: 17,
                available: 16
            })
        ));
    }
}
