//! Element types a view can carry
//!
//! The copy engine pairs any two dtypes at runtime. [`DType::category`] is
//! the coarse key a kernel launch is dispatched on, and [`scalar`] holds the
//! per-dtype load/store functions the elementwise kernel is built from.

pub mod complex;
mod element;
pub mod scalar;

pub use complex::{Complex64, Complex128};
pub use element::Element;
pub use scalar::Scalar;

use std::fmt;

/// Runtime element type of a view
///
/// Discriminants are grouped by family (floats from 0, signed ints from 10,
/// unsigned from 20, bool 30, complex from 40, quantized from 50) and are
/// also the bit positions used by [`DTypeSet`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u8)]
pub enum DType {
    /// 64-bit float
    F64 = 0,
    /// 32-bit float
    F32 = 1,
    /// IEEE 754 half precision
    F16 = 2,
    /// bfloat16
    BF16 = 3,

    /// 64-bit signed integer
    I64 = 10,
    /// 32-bit signed integer
    I32 = 11,
    /// 16-bit signed integer
    I16 = 12,
    /// 8-bit signed integer
    I8 = 13,

    /// 64-bit unsigned integer
    U64 = 20,
    /// 32-bit unsigned integer
    U32 = 21,
    /// 16-bit unsigned integer
    U16 = 22,
    /// 8-bit unsigned integer
    U8 = 23,

    /// One byte per element, 0 or 1
    Bool = 30,

    /// Two f32 (re, im)
    Complex64 = 40,
    /// Two f64 (re, im)
    Complex128 = 41,

    /// i8 payload interpreted through the view's quantizer
    QInt8 = 50,
    /// u8 payload interpreted through the view's quantizer
    QUInt8 = 51,
    /// i32 payload interpreted through the view's quantizer
    QInt32 = 52,
}

/// Coarse grouping of dtypes used as the kernel dispatch key
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DTypeCategory {
    /// `Bool`
    Bool,
    /// Signed integers
    SignedInt,
    /// Unsigned integers
    UnsignedInt,
    /// Real floating point, including the 16-bit formats
    Float,
    /// Complex floating point
    Complex,
    /// Quantized integers
    Quantized,
}

impl DType {
    /// Bytes per element
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Complex128 => 16,
            Self::F64 | Self::I64 | Self::U64 | Self::Complex64 => 8,
            Self::F32 | Self::I32 | Self::U32 | Self::QInt32 => 4,
            Self::F16 | Self::BF16 | Self::I16 | Self::U16 => 2,
            Self::I8 | Self::U8 | Self::Bool | Self::QInt8 | Self::QUInt8 => 1,
        }
    }

    /// Dispatch category of this dtype
    #[inline]
    pub const fn category(self) -> DTypeCategory {
        match self {
            Self::Bool => DTypeCategory::Bool,
            Self::I64 | Self::I32 | Self::I16 | Self::I8 => DTypeCategory::SignedInt,
            Self::U64 | Self::U32 | Self::U16 | Self::U8 => DTypeCategory::UnsignedInt,
            Self::F64 | Self::F32 | Self::F16 | Self::BF16 => DTypeCategory::Float,
            Self::Complex64 | Self::Complex128 => DTypeCategory::Complex,
            Self::QInt8 | Self::QUInt8 | Self::QInt32 => DTypeCategory::Quantized,
        }
    }

    /// True for the complex dtypes, the only ones a conj flag affects
    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self.category(), DTypeCategory::Complex)
    }

    /// True if values need a quantizer to be interpreted
    #[inline]
    pub const fn is_quantized(self) -> bool {
        matches!(self.category(), DTypeCategory::Quantized)
    }

    /// Short lowercase name, e.g. `f32` or `qint8`
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::I16 => "i16",
            Self::I8 => "i8",
            Self::U64 => "u64",
            Self::U32 => "u32",
            Self::U16 => "u16",
            Self::U8 => "u8",
            Self::Bool => "bool",
            Self::Complex64 => "c64",
            Self::Complex128 => "c128",
            Self::QInt8 => "qint8",
            Self::QUInt8 => "quint8",
            Self::QInt32 => "qint32",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.short_name())
    }
}

/// Bitset of dtypes, used for capability queries
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DTypeSet {
    bits: u64,
}

impl DTypeSet {
    /// Set containing every dtype in `dtypes`
    pub const fn of(dtypes: &[DType]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < dtypes.len() {
            bits |= 1 << dtypes[i] as u8;
            i += 1;
        }
        Self { bits }
    }

    /// Whether `dtype` is in the set
    #[inline]
    pub const fn contains(self, dtype: DType) -> bool {
        self.bits & (1 << dtype as u8) != 0
    }

    /// Union of two sets
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }
}
