//! Runtime conversion table between dtypes
//!
//! Every dtype gets a load function (raw bytes to [`Scalar`]) and a store
//! function ([`Scalar`] to raw bytes). The elementwise copy kernel resolves
//! the pair once per launch and then runs a tight loop over fn pointers, so
//! any (dst, src) combination is covered without a macro-expanded matrix.
//!
//! Cast rules:
//! - float to integer saturates (`as` semantics), NaN becomes 0
//! - complex to real keeps the real part
//! - real to complex sets the imaginary part to zero
//! - anything to bool is `value != 0`
//! - quantized payloads load and store as their underlying integers
//!
//! Negation and conjugation act on a value already cast to the destination
//! dtype, so an unsigned destination wraps at its own width.

use super::DType;
use half::{bf16, f16};

/// A single element widened to a common representation
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Scalar {
    /// Boolean value
    Bool(bool),
    /// Signed integer (also quantized payloads)
    Int(i64),
    /// Unsigned integer
    UInt(u64),
    /// Real floating point
    Float(f64),
    /// Complex value as (re, im)
    Complex(f64, f64),
}

impl Scalar {
    /// Arithmetic negation
    ///
    /// Integers wrap at 64 bits; storing the result narrows it to the
    /// element width. Negating a bool leaves it unchanged (any nonzero
    /// value stays nonzero).
    #[inline]
    pub fn neg(self) -> Self {
        match self {
            Self::Bool(b) => Self::Bool(b),
            Self::Int(v) => Self::Int(v.wrapping_neg()),
            Self::UInt(v) => Self::UInt(v.wrapping_neg()),
            Self::Float(v) => Self::Float(-v),
            Self::Complex(re, im) => Self::Complex(-re, -im),
        }
    }

    /// The value `dtype` would hold after storing `self`
    pub fn cast(self, dtype: DType) -> Self {
        cast_through(storer(dtype), loader(dtype), self)
    }

    /// Complex conjugate; identity on real values
    #[inline]
    pub fn conj(self) -> Self {
        match self {
            Self::Complex(re, im) => Self::Complex(re, -im),
            other => other,
        }
    }

    /// Real part as f64
    #[inline]
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Bool(b) => b as u8 as f64,
            Self::Int(v) => v as f64,
            Self::UInt(v) => v as f64,
            Self::Float(v) => v,
            Self::Complex(re, _) => re,
        }
    }

    /// Value as (re, im)
    #[inline]
    pub fn to_complex(self) -> (f64, f64) {
        match self {
            Self::Complex(re, im) => (re, im),
            other => (other.to_f64(), 0.0),
        }
    }

    /// Truthiness: nonzero is true
    #[inline]
    pub fn to_bool(self) -> bool {
        match self {
            Self::Bool(b) => b,
            Self::Int(v) => v != 0,
            Self::UInt(v) => v != 0,
            Self::Float(v) => v != 0.0,
            Self::Complex(re, im) => re != 0.0 || im != 0.0,
        }
    }
}

/// Reads one element at `ptr` (unaligned access is allowed)
pub type LoadFn = unsafe fn(*const u8) -> Scalar;

/// Writes one element at `ptr` (unaligned access is allowed)
pub type StoreFn = unsafe fn(*mut u8, Scalar);

macro_rules! int_codec {
    ($load:ident, $store:ident, $ty:ty, $variant:ident, $wide:ty) => {
        unsafe fn $load(ptr: *const u8) -> Scalar {
            let v = unsafe { (ptr as *const $ty).read_unaligned() };
            Scalar::$variant(v as $wide)
        }

        unsafe fn $store(ptr: *mut u8, value: Scalar) {
            let v: $ty = match value {
                Scalar::Bool(b) => b as $ty,
                Scalar::Int(v) => v as $ty,
                Scalar::UInt(v) => v as $ty,
                Scalar::Float(v) => v as $ty,
                Scalar::Complex(re, _) => re as $ty,
            };
            unsafe { (ptr as *mut $ty).write_unaligned(v) }
        }
    };
}

int_codec!(load_i64, store_i64, i64, Int, i64);
int_codec!(load_i32, store_i32, i32, Int, i64);
int_codec!(load_i16, store_i16, i16, Int, i64);
int_codec!(load_i8, store_i8, i8, Int, i64);
int_codec!(load_u64, store_u64, u64, UInt, u64);
int_codec!(load_u32, store_u32, u32, UInt, u64);
int_codec!(load_u16, store_u16, u16, UInt, u64);
int_codec!(load_u8, store_u8, u8, UInt, u64);

macro_rules! float_codec {
    ($load:ident, $store:ident, $ty:ty, $to_f64:expr, $from_f64:expr) => {
        unsafe fn $load(ptr: *const u8) -> Scalar {
            let v = unsafe { (ptr as *const $ty).read_unaligned() };
            Scalar::Float($to_f64(v))
        }

        unsafe fn $store(ptr: *mut u8, value: Scalar) {
            let v: $ty = $from_f64(value.to_f64());
            unsafe { (ptr as *mut $ty).write_unaligned(v) }
        }
    };
}

float_codec!(load_f64, store_f64, f64, |v: f64| v, |v: f64| v);
float_codec!(load_f32, store_f32, f32, |v: f32| v as f64, |v: f64| v as f32);
float_codec!(load_f16, store_f16, f16, f16::to_f64, f16::from_f64);
float_codec!(load_bf16, store_bf16, bf16, bf16::to_f64, bf16::from_f64);

macro_rules! complex_codec {
    ($load:ident, $store:ident, $float:ty) => {
        unsafe fn $load(ptr: *const u8) -> Scalar {
            let parts = ptr as *const $float;
            let (re, im) = unsafe { (parts.read_unaligned(), parts.add(1).read_unaligned()) };
            Scalar::Complex(re as f64, im as f64)
        }

        unsafe fn $store(ptr: *mut u8, value: Scalar) {
            let (re, im) = value.to_complex();
            let parts = ptr as *mut $float;
            unsafe {
                parts.write_unaligned(re as $float);
                parts.add(1).write_unaligned(im as $float);
            }
        }
    };
}

complex_codec!(load_c64, store_c64, f32);
complex_codec!(load_c128, store_c128, f64);

unsafe fn load_bool(ptr: *const u8) -> Scalar {
    Scalar::Bool(unsafe { ptr.read() } != 0)
}

unsafe fn store_bool(ptr: *mut u8, value: Scalar) {
    unsafe { ptr.write(value.to_bool() as u8) }
}

/// Widest element, in bytes
const MAX_ELEMENT_SIZE: usize = 16;

/// Store `value` with `store` and read it back with the matching `load`
#[inline]
pub fn cast_through(store: StoreFn, load: LoadFn, value: Scalar) -> Scalar {
    let mut slot = [0u8; MAX_ELEMENT_SIZE];
    unsafe {
        store(slot.as_mut_ptr(), value);
        load(slot.as_ptr())
    }
}

/// Load function for `dtype`
pub fn loader(dtype: DType) -> LoadFn {
    match dtype {
        DType::F64 => load_f64,
        DType::F32 => load_f32,
        DType::F16 => load_f16,
        DType::BF16 => load_bf16,
        DType::I64 => load_i64,
        DType::I32 | DType::QInt32 => load_i32,
        DType::I16 => load_i16,
        DType::I8 | DType::QInt8 => load_i8,
        DType::U64 => load_u64,
        DType::U32 => load_u32,
        DType::U16 => load_u16,
        DType::U8 | DType::QUInt8 => load_u8,
        DType::Bool => load_bool,
        DType::Complex64 => load_c64,
        DType::Complex128 => load_c128,
    }
}

/// Store function for `dtype`
pub fn storer(dtype: DType) -> StoreFn {
    match dtype {
        DType::F64 => store_f64,
        DType::F32 => store_f32,
        DType::F16 => store_f16,
        DType::BF16 => store_bf16,
        DType::I64 => store_i64,
        DType::I32 | DType::QInt32 => store_i32,
        DType::I16 => store_i16,
        DType::I8 | DType::QInt8 => store_i8,
        DType::U64 => store_u64,
        DType::U32 => store_u32,
        DType::U16 => store_u16,
        DType::U8 | DType::QUInt8 => store_u8,
        DType::Bool => store_bool,
        DType::Complex64 => store_c64,
        DType::Complex128 => store_c128,
    }
}
