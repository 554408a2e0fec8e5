//! Error types for devcopy

use crate::dtype::DType;
use crate::runtime::Device;
use thiserror::Error;

/// Result type alias using devcopy's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while planning or executing a copy
#[derive(Error, Debug)]
pub enum Error {
    /// Shape mismatch between two views that must agree
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// Source shape cannot be broadcast to the destination shape
    #[error("Cannot broadcast shape {src:?} to {dst:?}")]
    BroadcastError {
        /// Destination (target) shape
        dst: Vec<usize>,
        /// Source shape
        src: Vec<usize>,
    },

    /// Invalid dimension index
    #[error("Invalid dimension {dim} for view with {ndim} dimensions")]
    InvalidDimension {
        /// The invalid dimension
        dim: isize,
        /// Number of dimensions
        ndim: usize,
    },

    /// Unsupported dtype for an operation
    #[error("Unsupported dtype {dtype:?} for operation '{op}'")]
    UnsupportedDType {
        /// The unsupported dtype
        dtype: DType,
        /// The operation name
        op: &'static str,
    },

    /// The elementwise kernel has no conversion between these dtypes
    #[error("Unsupported copy from {src:?} to {dst:?}: {reason}")]
    UnsupportedCopy {
        /// Destination dtype
        dst: DType,
        /// Source dtype
        src: DType,
        /// Why the pair is rejected
        reason: &'static str,
    },

    /// The device pairing has no copy path
    #[error("Unsupported devices in copy: {dst} <- {src}")]
    UnsupportedDevices {
        /// Destination device
        dst: Device,
        /// Source device
        src: Device,
    },

    /// Device index outside the runtime's device range
    #[error("Invalid device {device}: runtime has {available} accelerator(s)")]
    InvalidDevice {
        /// The requested device
        device: Device,
        /// Number of accelerators the runtime exposes
        available: usize,
    },

    /// Out of memory
    #[error("Out of memory on {device}: failed to allocate {size} bytes")]
    OutOfMemory {
        /// Device the allocation targeted
        device: Device,
        /// Requested size in bytes
        size: usize,
    },

    /// The destination has several elements mapped to one memory location
    #[error(
        "Unsupported operation: more than one element of the written-to view refers to a single memory location"
    )]
    InternalOverlap,

    /// Destination and source partially share memory
    #[error("Unsupported operation: destination and source views partially overlap")]
    PartialOverlap,

    /// View geometry reaches outside its storage
    #[error("View out of bounds: needs {required} bytes, storage has {available}")]
    OutOfBounds {
        /// Bytes addressed by the view
        required: usize,
        /// Bytes held by the storage
        available: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// A task failed on a device queue; reported at the next synchronization
    #[error("Queue error on {device}: {reason}")]
    Queue {
        /// Device owning the queue
        device: Device,
        /// Failure message captured from the task
        reason: String,
    },

    /// Violated internal invariant
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create a broadcast error
    pub fn broadcast(dst: &[usize], src: &[usize]) -> Self {
        Self::BroadcastError {
            dst: dst.to_vec(),
            src: src.to_vec(),
        }
    }

    /// Create an unsupported dtype error
    pub fn unsupported_dtype(dtype: DType, op: &'static str) -> Self {
        Self::UnsupportedDType { dtype, op }
    }

    /// Create an unsupported dtype-pair error
    pub fn unsupported_copy(dst: DType, src: DType, reason: &'static str) -> Self {
        Self::UnsupportedCopy { dst, src, reason }
    }

    /// Create an internal invariant error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
