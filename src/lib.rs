//! # devcopy
//!
//! **Cross-device tensor copy engine with queue-ordered transfers.**
//!
//! devcopy copies the contents of one strided n-dimensional view into
//! another, where the two may live on different devices and differ in
//! dtype, layout and numeric convention (lazily conjugated or negated
//! storage). It chooses the cheapest correct strategy per call and keeps
//! copies between devices ordered against the work already queued on both.
//!
//! ## Features
//!
//! - **Strategies**: raw byte copies, a native reorder service, an
//!   elementwise conversion kernel, and staging through dense temporaries
//! - **Ordering**: event fences on both queues for cross-device copies
//! - **Dtypes**: f64, f32, f16, bf16, integers, bool, complex, quantized
//! - **Runtime**: a simulated multi-accelerator runtime with one FIFO queue
//!   per device, allocation accounting and pinned host memory
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use devcopy::prelude::*;
//!
//! let rt = Runtime::new(RuntimeConfig::default())?;
//! let engine = CopyEngine::new(rt.clone(), CopyConfig::default());
//!
//! let src = View::from_slice(&rt, &[1.0f32, 2.0, 3.0, 4.0], &[2, 2], Device::Accel(0))?;
//! let mut dst = View::empty(&rt, &[2, 2], DType::F64, Device::Accel(1))?;
//! engine.copy_(&mut dst, &src.transpose(0, 1)?, false)?;
//!
//! let on_host = engine.to_copy(&dst, &ToOptions::default().with_device(Device::Host), false)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod copy;
pub mod dtype;
pub mod error;
pub mod runtime;
pub mod tensor;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::copy::{CopyConfig, CopyEngine, MemoryFormat, ToOptions};
    pub use crate::dtype::DType;
    pub use crate::error::{Error, Result};
    pub use crate::runtime::{Device, Runtime, RuntimeConfig};
    pub use crate::tensor::{Layout, View};
}
