//! Views, storage and layout
//!
//! A [`View`] is a logical n-dimensional array over a reference-counted
//! [`Storage`] buffer that lives on one device.

mod layout;
mod storage;
mod view;

pub use layout::{Layout, Shape, Strides};
pub use storage::{DataPtr, Storage};
pub use view::{Quantizer, View};
