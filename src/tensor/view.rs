//! Core View type

use super::{DataPtr, Layout, Storage};
use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime};
use smallvec::SmallVec;
use std::fmt;

/// Per-tensor affine quantization parameters
///
/// `real = scale * (stored - zero_point)`. The copy engine never rescales;
/// it only moves the quantizer along with the integer payload.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Quantizer {
    /// Step between adjacent quantized values
    pub scale: f64,
    /// Stored value representing real zero
    pub zero_point: i64,
}

impl Quantizer {
    /// Create a per-tensor affine quantizer
    pub fn new(scale: f64, zero_point: i64) -> Self {
        Self { scale, zero_point }
    }
}

/// Logical n-dimensional array over a [`Storage`]
///
/// A `View` consists of:
/// - **Storage**: reference-counted device memory
/// - **Layout**: shape, strides, and offset into the storage
/// - **DType**: element type (determined at runtime)
/// - **Flags**: `conj` and `neg` change how stored values are interpreted;
///   the logical value is `conj?(neg?(stored))`
/// - **Quantizer**: present exactly for quantized dtypes
///
/// Cloning is zero-copy: the clone shares the storage.
#[derive(Clone)]
pub struct View {
    storage: Storage,
    layout: Layout,
    dtype: DType,
    conj: bool,
    neg: bool,
    quantizer: Option<Quantizer>,
}

impl View {
    /// Create a view from storage and layout
    ///
    /// Fails if the layout addresses bytes outside the storage.
    pub fn from_parts(storage: Storage, layout: Layout, dtype: DType) -> Result<Self> {
        check_bounds(&storage, &layout, dtype)?;
        Ok(Self {
            storage,
            layout,
            dtype,
            conj: false,
            neg: false,
            quantizer: None,
        })
    }

    /// Allocate a zero-filled, row-major view
    pub fn empty(runtime: &Runtime, shape: &[usize], dtype: DType, device: Device) -> Result<Self> {
        Self::empty_with_layout(runtime, Layout::contiguous(shape), dtype, device, false)
    }

    /// Allocate a zero-filled view with a dense `layout` (any dimension order)
    pub(crate) fn empty_with_layout(
        runtime: &Runtime,
        layout: Layout,
        dtype: DType,
        device: Device,
        pinned: bool,
    ) -> Result<Self> {
        let size_bytes = layout.elem_count() * dtype.size_in_bytes();
        let storage = if pinned {
            Storage::new_pinned(runtime, size_bytes)?
        } else {
            Storage::new(runtime, size_bytes, device)?
        };
        Self::from_parts(storage, layout, dtype)
    }

    /// Create a row-major view holding `data`
    ///
    /// # Example
    ///
    /// ```ignore
    /// let v = View::from_slice(&rt, &[1.0f32, 2.0, 3.0, 4.0], &[2, 2], Device::Accel(0))?;
    /// ```
    pub fn from_slice<T: Element>(
        runtime: &Runtime,
        data: &[T],
        shape: &[usize],
        device: Device,
    ) -> Result<Self> {
        Self::from_bytes(runtime, bytemuck::cast_slice(data), shape, T::DTYPE, device)
    }

    /// Create a row-major view from raw element bytes
    ///
    /// The freshly allocated storage has no pending work, so the bytes are
    /// written directly instead of through the device queue.
    pub fn from_bytes(
        runtime: &Runtime,
        bytes: &[u8],
        shape: &[usize],
        dtype: DType,
        device: Device,
    ) -> Result<Self> {
        let expected: usize = shape.iter().product::<usize>() * dtype.size_in_bytes();
        if bytes.len() != expected {
            return Err(Error::InvalidArgument {
                arg: "bytes",
                reason: format!(
                    "{} bytes do not fill shape {:?} of {}",
                    bytes.len(),
                    shape,
                    dtype
                ),
            });
        }

        let view = Self::empty(runtime, shape, dtype, device)?;
        if !bytes.is_empty() {
            unsafe {
                std::ptr::copy_nonoverlapping(
                    bytes.as_ptr(),
                    view.storage.ptr() as *mut u8,
                    bytes.len(),
                );
            }
        }
        Ok(view)
    }

    /// Attach a quantizer; only valid for quantized dtypes
    pub fn with_quantizer(mut self, quantizer: Quantizer) -> Result<Self> {
        if !self.dtype.is_quantized() {
            return Err(Error::unsupported_dtype(self.dtype, "with_quantizer"));
        }
        self.quantizer = Some(quantizer);
        Ok(self)
    }

    /// Replace the quantizer in place
    pub(crate) fn set_quantizer(&mut self, quantizer: Option<Quantizer>) {
        self.quantizer = quantizer;
    }

    /// Take over `other`'s conj and neg flags
    ///
    /// The conj flag only sticks on complex dtypes.
    pub(crate) fn set_flags_like(&mut self, other: &View) {
        self.conj = other.conj && self.dtype.is_complex();
        self.neg = other.neg;
    }

    // ===== Accessors =====

    /// Get the storage
    #[inline]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Get the layout
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Get the dtype
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Get the device
    #[inline]
    pub fn device(&self) -> Device {
        self.storage.device()
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Get the strides (in elements)
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// Storage offset in elements
    #[inline]
    pub fn offset(&self) -> usize {
        self.layout.offset()
    }

    /// Number of dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Total number of elements
    #[inline]
    pub fn numel(&self) -> usize {
        self.layout.elem_count()
    }

    /// Size of one element in bytes
    #[inline]
    pub fn element_size(&self) -> usize {
        self.dtype.size_in_bytes()
    }

    /// Whether the view is densely packed in row-major order
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.layout.is_contiguous()
    }

    /// Conjugate-view flag
    #[inline]
    pub fn is_conj(&self) -> bool {
        self.conj
    }

    /// Negative-view flag
    #[inline]
    pub fn is_neg(&self) -> bool {
        self.neg
    }

    /// Whether the dtype is quantized
    #[inline]
    pub fn is_quantized(&self) -> bool {
        self.dtype.is_quantized()
    }

    /// Quantization parameters of a quantized view
    #[inline]
    pub fn quantizer(&self) -> Option<Quantizer> {
        self.quantizer
    }

    /// Address of the first element
    pub fn data_ptr(&self) -> DataPtr {
        DataPtr::new(
            self.storage.clone(),
            self.layout.offset() * self.dtype.size_in_bytes(),
        )
    }

    /// True if both views are the same view of the same storage
    pub fn is_same(&self, other: &View) -> bool {
        self.storage.is_same(&other.storage)
            && self.layout == other.layout
            && self.dtype == other.dtype
            && self.conj == other.conj
            && self.neg == other.neg
    }

    // ===== Zero-copy views =====

    /// View the same storage with explicit geometry
    pub fn as_strided(&self, shape: &[usize], strides: &[isize], offset: usize) -> Result<Self> {
        if shape.len() != strides.len() {
            return Err(Error::InvalidArgument {
                arg: "strides",
                reason: format!("{} strides for {} dimensions", strides.len(), shape.len()),
            });
        }
        let layout = Layout::new(
            shape.iter().copied().collect(),
            strides.iter().copied().collect(),
            offset,
        );
        check_bounds(&self.storage, &layout, self.dtype)?;
        Ok(self.with_layout(layout))
    }

    /// Swap two dimensions
    pub fn transpose(&self, dim0: isize, dim1: isize) -> Result<Self> {
        let layout = self.layout.transpose(dim0, dim1).ok_or(Error::InvalidDimension {
            dim: dim0,
            ndim: self.ndim(),
        })?;
        Ok(self.with_layout(layout))
    }

    /// Broadcast to `shape` without copying (stride 0 on expanded dims)
    ///
    /// The quantizer, if any, is kept.
    pub fn expand(&self, shape: &[usize]) -> Result<Self> {
        let layout = self
            .layout
            .broadcast_to(shape)
            .ok_or_else(|| Error::broadcast(shape, self.shape()))?;
        Ok(self.with_layout(layout))
    }

    /// Broadcast to the shape of `other`
    pub fn expand_as(&self, other: &View) -> Result<Self> {
        self.expand(other.shape())
    }

    /// Lazily conjugated view; a no-op for non-complex dtypes
    pub fn conj(&self) -> Self {
        let mut view = self.clone();
        if self.dtype.is_complex() {
            view.conj = !self.conj;
        }
        view
    }

    /// Lazily negated view
    pub fn neg_view(&self) -> Self {
        let mut view = self.clone();
        view.neg = !self.neg;
        view
    }

    fn with_layout(&self, layout: Layout) -> Self {
        Self {
            storage: self.storage.clone(),
            layout,
            dtype: self.dtype,
            conj: self.conj,
            neg: self.neg,
            quantizer: self.quantizer,
        }
    }

    // ===== Host readback =====

    /// Read the stored elements in logical (row-major) order
    ///
    /// Waits for pending work on the owning device first. The `conj`/`neg`
    /// flags are not applied: this returns what is physically stored.
    pub fn to_vec<T: Element>(&self) -> Result<Vec<T>> {
        if T::DTYPE != self.dtype {
            return Err(Error::InvalidArgument {
                arg: "T",
                reason: format!("view holds {}, requested {}", self.dtype, T::DTYPE),
            });
        }
        let bytes = self.to_vec_bytes()?;
        // Allocate with T's alignment, then fill through a byte view.
        let mut result = vec![T::zeroed(); self.numel()];
        bytemuck::cast_slice_mut::<T, u8>(&mut result).copy_from_slice(&bytes);
        Ok(result)
    }

    /// Read the raw bytes of every element in logical (row-major) order
    pub fn to_vec_bytes(&self) -> Result<Vec<u8>> {
        let numel = self.numel();
        let elem = self.element_size();
        let mut out = Vec::with_capacity(numel * elem);
        if numel == 0 {
            return Ok(out);
        }
        self.storage.synchronize()?;

        let base = self.storage.ptr() as *const u8;
        let shape = self.shape();
        let strides = self.strides();
        let mut index: SmallVec<[usize; 6]> = SmallVec::from_elem(0, shape.len());
        let mut linear = self.offset() as isize;

        for _ in 0..numel {
            let start = unsafe { base.offset(linear * elem as isize) };
            out.extend_from_slice(unsafe { std::slice::from_raw_parts(start, elem) });

            // Increment indices (row-major order)
            for dim in (0..shape.len()).rev() {
                index[dim] += 1;
                linear += strides[dim];
                if index[dim] < shape[dim] {
                    break;
                }
                linear -= strides[dim] * shape[dim] as isize;
                index[dim] = 0;
            }
        }
        Ok(out)
    }
}

fn check_bounds(storage: &Storage, layout: &Layout, dtype: DType) -> Result<()> {
    if layout.elem_count() == 0 {
        return Ok(());
    }
    let elem = dtype.size_in_bytes();
    let required = match layout.storage_span() {
        Some((_, hi)) => (hi + 1) * elem,
        None => usize::MAX,
    };
    if required > storage.size_in_bytes() {
        return Err(Error::OutOfBounds {
            required,
            available: storage.size_in_bytes(),
        });
    }
    Ok(())
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("device", &self.device())
            .field("dtype", &self.dtype)
            .field("layout", &self.layout)
            .field("conj", &self.conj)
            .field("neg", &self.neg)
            .field("quantizer", &self.quantizer)
            .finish()
    }
}
