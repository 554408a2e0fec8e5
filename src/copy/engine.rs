//! Copy engine entry points

use super::barrier::with_cross_queue_barrier;
use super::kernel::{ElementwiseKernel, ElementwiseLauncher, QueueLauncher, check_dtype_pair};
use super::reorder::{BlockedReorder, ReorderService};
use super::strategy::{CopyStrategy, select_strategy};
use super::transfer::copy_host_device;
use super::{CopyConfig, IterationDescriptor, MemoryFormat, ToOptions};
use crate::error::{Error, Result};
use crate::runtime::{DeviceGuard, MemcpyKind, Runtime, memcpy_async};
use crate::tensor::{Layout, View};
use std::sync::atomic::{AtomicU64, Ordering};

/// Copies data between views on any pair of devices
///
/// The engine picks a strategy per call (raw transfer, native reorder,
/// elementwise kernel or staging through temporaries) and places the event
/// fences that keep cross-device copies ordered against both queues. The
/// elementwise launcher and the reorder service are pluggable.
///
/// # Example
///
/// ```ignore
/// let rt = Runtime::new(RuntimeConfig::default())?;
/// let engine = CopyEngine::new(rt.clone(), CopyConfig::default());
/// let src = View::from_slice(&rt, &[1.0f32, 2.0, 3.0], &[3], Device::Accel(0))?;
/// let mut dst = View::empty(&rt, &[3], DType::F64, Device::Host)?;
/// engine.copy_(&mut dst, &src, false)?;
/// ```
pub struct CopyEngine<L = QueueLauncher, R = BlockedReorder> {
    runtime: Runtime,
    config: CopyConfig,
    launcher: L,
    reorder: R,
    stats: CopyStats,
}

impl CopyEngine {
    /// Engine using the queue launcher and the blocked reorder service
    pub fn new(runtime: Runtime, config: CopyConfig) -> Self {
        Self::with_services(runtime, config, QueueLauncher, BlockedReorder)
    }
}

impl<L: ElementwiseLauncher, R: ReorderService> CopyEngine<L, R> {
    /// Engine using custom capability implementations
    pub fn with_services(runtime: Runtime, config: CopyConfig, launcher: L, reorder: R) -> Self {
        Self {
            runtime,
            config,
            launcher,
            reorder,
            stats: CopyStats::default(),
        }
    }

    /// Runtime the engine allocates temporaries from
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Configuration the engine was built with
    pub fn config(&self) -> &CopyConfig {
        &self.config
    }

    /// Elementwise launcher
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Reorder service
    pub fn reorder_service(&self) -> &R {
        &self.reorder
    }

    /// Counters of the work issued so far
    pub fn stats(&self) -> CopyStatsSnapshot {
        self.stats.snapshot()
    }

    /// Copy `src` into `dst`, broadcasting and converting as needed
    ///
    /// After a blocking call `dst` holds the logical values of `src`. A
    /// non-blocking call may return while the copy is still queued; queue
    /// ordering still guarantees later work on the destination's device
    /// sees the result. Copying a quantized view into a quantized view
    /// adopts the source's quantizer.
    pub fn copy_<'a>(&self, dst: &'a mut View, src: &View, non_blocking: bool) -> Result<&'a mut View> {
        if dst.is_same(src) {
            self.stats.noops.fetch_add(1, Ordering::Relaxed);
            return Ok(dst);
        }
        check_dtype_pair(dst.dtype(), src.dtype())?;
        if dst.is_quantized() && src.is_quantized() {
            dst.set_quantizer(src.quantizer());
        }
        self.copy_at_depth(dst, src, non_blocking, 0)?;
        Ok(dst)
    }

    /// Copy `src` into a newly allocated view described by `options`
    pub fn to_copy(&self, src: &View, options: &ToOptions, non_blocking: bool) -> Result<View> {
        let dtype = options.dtype.unwrap_or(src.dtype());
        let device = options.device.unwrap_or(src.device());
        self.runtime.check_device(device)?;
        if options.pin_memory && !device.is_host() {
            return Err(Error::InvalidArgument {
                arg: "pin_memory",
                reason: format!("only host memory can be pinned, target is {device}"),
            });
        }
        check_dtype_pair(dtype, src.dtype())?;

        let layout = match options.memory_format {
            MemoryFormat::Preserve => src.layout().dense_like(),
            MemoryFormat::Contiguous => Layout::contiguous(src.shape()),
        };
        let mut out = View::empty_with_layout(&self.runtime, layout, dtype, device, options.pin_memory)?;
        self.copy_(&mut out, src, non_blocking)?;
        Ok(out)
    }

    /// Row-major dense version of `src`, sharing storage when it already is
    pub fn contiguous(&self, src: &View) -> Result<View> {
        if src.is_contiguous() {
            return Ok(src.clone());
        }
        let options = ToOptions::default().with_memory_format(MemoryFormat::Contiguous);
        self.to_copy(src, &options, false)
    }

    /// One copy at staging recursion level `depth`
    pub(super) fn copy_at_depth(&self, dst: &View, src: &View, non_blocking: bool, depth: usize) -> Result<()> {
        if dst.is_same(src) {
            self.stats.noops.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }
        check_dtype_pair(dst.dtype(), src.dtype())?;

        let iter = IterationDescriptor::build(dst, src)?;
        let peer_access =
            self.config.peer_access && self.runtime.can_access_peer(dst.device(), src.device());
        let strategy = select_strategy(&iter, src, &self.config, peer_access, &self.reorder);
        log::debug!(
            "copy {} {} <- {} {} ({} elements, depth {}): {:?}",
            dst.device(),
            dst.dtype(),
            src.device(),
            src.dtype(),
            iter.numel(),
            depth,
            strategy
        );

        match strategy {
            CopyStrategy::Noop => {
                self.stats.noops.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            CopyStrategy::Reorder => self.copy_reorder(dst, src, non_blocking),
            CopyStrategy::DeviceToDevice { memcpy } => {
                self.copy_device_to_device(&iter, memcpy, non_blocking)
            }
            CopyStrategy::HostDevice(kind) => {
                copy_host_device(&self.runtime, &iter, kind, non_blocking)?;
                self.stats.transfers.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            CopyStrategy::Host => {
                self.launcher.launch(None, ElementwiseKernel::for_copy(&iter)?)?;
                self.stats.kernels.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            CopyStrategy::Staged => {
                if depth >= MAX_STAGING_DEPTH {
                    return Err(Error::internal(format!(
                        "copy {} <- {} needs staging inside a staged copy",
                        dst.device(),
                        src.device()
                    )));
                }
                self.stats.staged.fetch_add(1, Ordering::Relaxed);
                self.copy_with_temporaries(dst, src, non_blocking, depth + 1)
            }
        }
    }

    fn copy_reorder(&self, dst: &View, src: &View, non_blocking: bool) -> Result<()> {
        let device = dst.device();
        let _guard = DeviceGuard::new(device);
        let queue = self.runtime.current_queue(device)?;
        self.reorder.reorder(queue, dst, src)?;
        self.stats.reorders.fetch_add(1, Ordering::Relaxed);
        if !non_blocking {
            queue.synchronize()?;
        }
        Ok(())
    }

    fn copy_device_to_device(
        &self,
        iter: &IterationDescriptor,
        memcpy: bool,
        non_blocking: bool,
    ) -> Result<()> {
        let (dst_device, src_device) = (iter.device(0), iter.device(1));
        // The copy runs on the source device's queue.
        let _guard = DeviceGuard::new(src_device);
        let copy_queue = self.runtime.current_queue(src_device)?;
        let dst_queue = self.runtime.current_queue(dst_device)?;

        with_cross_queue_barrier(dst_queue, copy_queue, |queue| {
            if memcpy {
                let nbytes = iter.numel() * iter.element_size(0);
                memcpy_async(
                    queue,
                    iter.data_ptr(0),
                    iter.data_ptr(1),
                    nbytes,
                    MemcpyKind::DeviceToDevice,
                )?;
                self.stats.memcpys.fetch_add(1, Ordering::Relaxed);
            } else {
                self.launcher.launch(Some(queue), ElementwiseKernel::for_copy(iter)?)?;
                self.stats.kernels.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        })?;

        if !non_blocking {
            dst_queue.synchronize()?;
        }
        Ok(())
    }
}

impl<L, R> std::fmt::Debug for CopyEngine<L, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyEngine")
            .field("runtime", &self.runtime)
            .field("config", &self.config)
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}

/// Staging may only be entered from a top-level copy
const MAX_STAGING_DEPTH: usize = 1;

#[derive(Debug, Default)]
struct CopyStats {
    noops: AtomicU64,
    memcpys: AtomicU64,
    kernels: AtomicU64,
    reorders: AtomicU64,
    transfers: AtomicU64,
    staged: AtomicU64,
}

impl CopyStats {
    fn snapshot(&self) -> CopyStatsSnapshot {
        CopyStatsSnapshot {
            noops: self.noops.load(Ordering::Relaxed),
            memcpys: self.memcpys.load(Ordering::Relaxed),
            kernel_launches: self.kernels.load(Ordering::Relaxed),
            reorders: self.reorders.load(Ordering::Relaxed),
            host_device_transfers: self.transfers.load(Ordering::Relaxed),
            staged: self.staged.load(Ordering::Relaxed),
        }
    }
}

/// Work counters of a [`CopyEngine`]
///
/// Every copy, including the nested ones issued while staging, lands in
/// exactly one counter.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyStatsSnapshot {
    /// Copies that returned without touching memory
    pub noops: u64,
    /// Device-to-device byte copies
    pub memcpys: u64,
    /// Elementwise kernel launches
    pub kernel_launches: u64,
    /// Native reorders
    pub reorders: u64,
    /// Host/device byte transfers
    pub host_device_transfers: u64,
    /// Copies routed through temporaries
    pub staged: u64,
}

impl CopyStatsSnapshot {
    /// Operations that moved data
    pub fn work(&self) -> u64 {
        self.memcpys + self.kernel_launches + self.reorders + self.host_device_transfers
    }
}
