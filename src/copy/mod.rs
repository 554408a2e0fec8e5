//! Cross-device copy engine
//!
//! [`CopyEngine::copy_`] moves the logical values of one view into another,
//! whatever their devices, dtypes, layouts and conj/neg flags.
//!
//! # Strategy
//!
//! ```text
//! copy_(dst, src)
//! ├── same view or no elements ──────────────► no-op
//! ├── same accelerator, blocked layouts ─────► native reorder
//! ├── needs temporaries ─────────────────────► staging (recurses once)
//! ├── accel ← accel ─────────────────────────► memcpy or kernel on src queue,
//! │                                            fenced against the dst queue
//! ├── host ↔ accel (byte-identical) ─────────► memcpy on the device queue
//! └── host ← host ───────────────────────────► kernel inline
//! ```

mod barrier;
pub mod blocked;
mod config;
mod engine;
mod iter;
pub mod kernel;
mod reorder;
mod staging;
pub mod strategy;
mod transfer;

pub use barrier::with_cross_queue_barrier;
pub use blocked::{BlockedDesc, MAX_BLOCKED_DIMS, is_blocked_compatible};
pub use config::{CopyConfig, MemoryFormat, ToOptions};
pub use engine::{CopyEngine, CopyStatsSnapshot};
pub use iter::IterationDescriptor;
pub use kernel::{CopyOp, ElementwiseKernel, ElementwiseLauncher, QueueLauncher};
pub use reorder::{BlockedReorder, ReorderService};
pub use strategy::{CopyStrategy, select_strategy};
pub use transfer::copy_host_device;
