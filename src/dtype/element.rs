//! Element trait for mapping Rust types to DType

use super::{Complex64, Complex128, DType};
use bytemuck::Pod;

/// Trait for Rust types that can back the elements of a view
///
/// This connects Rust's type system to the runtime dtype system so host data
/// can be uploaded with `View::from_slice` and read back with `View::to_vec`.
///
/// `bool` is not an `Element` (it is not `Pod`); boolean views are read and
/// written as `u8` via [`View::to_vec_bytes`](crate::tensor::View::to_vec_bytes).
pub trait Element: Copy + Send + Sync + Pod + 'static {
    /// The corresponding DType for this Rust type
    const DTYPE: DType;
}

macro_rules! impl_element {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$dtype;
            }
        )*
    };
}

impl_element!(
    f64 => F64,
    f32 => F32,
    half::f16 => F16,
    half::bf16 => BF16,
    i64 => I64,
    i32 => I32,
    i16 => I16,
    i8 => I8,
    u64 => U64,
    u32 => U32,
    u16 => U16,
    u8 => U8,
    Complex64 => Complex64,
    Complex128 => Complex128,
);
