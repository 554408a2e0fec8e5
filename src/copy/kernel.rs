//! Elementwise copy, conjugate and negate kernel

use super::IterationDescriptor;
use crate::dtype::scalar::{self, LoadFn, Scalar, StoreFn};
use crate::dtype::{DType, DTypeCategory};
use crate::error::{Error, Result};
use crate::runtime::Queue;
use crate::tensor::{DataPtr, Shape, Strides};
use smallvec::SmallVec;

/// Per-element mapping applied while copying
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CopyOp {
    /// Value is copied (and cast) unchanged
    Identity,
    /// Complex conjugate
    Conj,
    /// Arithmetic negation
    Neg,
    /// Conjugate of the negation
    ConjNeg,
}

impl CopyOp {
    /// Pick the mapping that makes `dst`'s logical values equal `src`'s
    ///
    /// The flags are resolved here: a differing neg flag negates, and a
    /// differing conj flag conjugates when both sides share a dtype.
    /// Quantized payloads are only ever copied verbatim.
    pub fn select(dst: DTypeFlags, src: DTypeFlags) -> Result<Self> {
        check_dtype_pair(dst.dtype, src.dtype)?;
        if dst.dtype.is_quantized() {
            return Ok(Self::Identity);
        }

        let same_neg = dst.neg == src.neg;
        let conj = dst.conj != src.conj && dst.dtype == src.dtype;
        if conj && !dst.dtype.is_complex() {
            return Err(Error::unsupported_dtype(dst.dtype, "copy_conj"));
        }

        Ok(match (same_neg, conj) {
            (true, false) => Self::Identity,
            (true, true) => Self::Conj,
            (false, false) => Self::Neg,
            (false, true) => Self::ConjNeg,
        })
    }

    /// Apply the mapping to one value
    #[inline]
    pub fn apply(self, value: Scalar) -> Scalar {
        match self {
            Self::Identity => value,
            Self::Conj => value.conj(),
            Self::Neg => value.neg(),
            Self::ConjNeg => value.neg().conj(),
        }
    }
}

/// Dtype and numeric flags of one kernel operand
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DTypeFlags {
    /// Element type
    pub dtype: DType,
    /// Conjugate-view flag
    pub conj: bool,
    /// Negative-view flag
    pub neg: bool,
}

/// Reject dtype pairs the kernel has no conversion for
///
/// Quantized payloads cannot be converted to or from anything but the same
/// quantized dtype.
pub fn check_dtype_pair(dst: DType, src: DType) -> Result<()> {
    if (dst.is_quantized() || src.is_quantized()) && dst != src {
        return Err(Error::unsupported_copy(
            dst,
            src,
            "quantized views only copy to the same quantized dtype",
        ));
    }
    Ok(())
}

/// Category pair a launch was dispatched on
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    /// Destination category
    pub dst: DTypeCategory,
    /// Source category
    pub src: DTypeCategory,
}

/// Fully resolved elementwise copy, ready to run on any thread
///
/// Holds both storages, so a queued kernel keeps its buffers alive.
pub struct ElementwiseKernel {
    op: CopyOp,
    key: DispatchKey,
    load: LoadFn,
    store: StoreFn,
    load_dst: LoadFn,
    dst: DataPtr,
    src: DataPtr,
    dst_elem: isize,
    src_elem: isize,
    shape: Shape,
    strides: [Strides; 2],
    numel: usize,
}

impl ElementwiseKernel {
    /// Kernel copying `iter`'s source into its destination, resolving flags
    pub fn for_copy(iter: &IterationDescriptor) -> Result<Self> {
        let flags = |i: usize| DTypeFlags {
            dtype: iter.dtype(i),
            conj: iter.view(i).is_conj(),
            neg: iter.view(i).is_neg(),
        };
        let op = CopyOp::select(flags(0), flags(1))?;
        Self::new(iter, op)
    }

    /// Kernel applying `op` to every element of `iter`
    pub fn new(iter: &IterationDescriptor, op: CopyOp) -> Result<Self> {
        let (dst_dtype, src_dtype) = (iter.dtype(0), iter.dtype(1));
        check_dtype_pair(dst_dtype, src_dtype)?;
        if matches!(op, CopyOp::Conj | CopyOp::ConjNeg) && !src_dtype.is_complex() {
            return Err(Error::unsupported_dtype(src_dtype, "copy_conj"));
        }

        Ok(Self {
            op,
            key: DispatchKey {
                dst: dst_dtype.category(),
                src: src_dtype.category(),
            },
            load: scalar::loader(src_dtype),
            store: scalar::storer(dst_dtype),
            load_dst: scalar::loader(dst_dtype),
            dst: iter.data_ptr(0),
            src: iter.data_ptr(1),
            dst_elem: iter.element_size(0) as isize,
            src_elem: iter.element_size(1) as isize,
            shape: iter.shape().iter().copied().collect(),
            strides: [
                iter.strides(0).iter().copied().collect(),
                iter.strides(1).iter().copied().collect(),
            ],
            numel: iter.numel(),
        })
    }

    /// Mapping applied per element
    #[inline]
    pub fn op(&self) -> CopyOp {
        self.op
    }

    /// Category pair the kernel was resolved for
    #[inline]
    pub fn key(&self) -> DispatchKey {
        self.key
    }

    /// Elements processed per run
    #[inline]
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Run the copy on the calling thread
    ///
    /// Each value is cast to the destination dtype before `op` applies.
    /// Both operands were bounds-checked when their views were built, and
    /// the kernel owns their storages, so every address it touches is live.
    pub fn run(&self) {
        if self.numel == 0 {
            return;
        }

        let dst_base = self.dst.addr() as *mut u8;
        let src_base = self.src.addr() as *const u8;
        let ndim = self.shape.len();
        let mut index: SmallVec<[usize; 6]> = SmallVec::from_elem(0, ndim);
        let (mut dst_off, mut src_off) = (0isize, 0isize);

        for _ in 0..self.numel {
            unsafe {
                let value = (self.load)(src_base.offset(src_off * self.src_elem));
                let value = match self.op {
                    CopyOp::Identity => value,
                    op => op.apply(scalar::cast_through(self.store, self.load_dst, value)),
                };
                (self.store)(dst_base.offset(dst_off * self.dst_elem), value);
            }

            // Increment indices (row-major order)
            for dim in (0..ndim).rev() {
                index[dim] += 1;
                dst_off += self.strides[0][dim];
                src_off += self.strides[1][dim];
                if index[dim] < self.shape[dim] {
                    break;
                }
                let extent = self.shape[dim] as isize;
                dst_off -= self.strides[0][dim] * extent;
                src_off -= self.strides[1][dim] * extent;
                index[dim] = 0;
            }
        }
    }
}

impl std::fmt::Debug for ElementwiseKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementwiseKernel")
            .field("op", &self.op)
            .field("key", &self.key)
            .field("shape", &self.shape.as_slice())
            .field("numel", &self.numel)
            .finish()
    }
}

/// Launches elementwise kernels
///
/// `queue` is `None` when both operands live on the host, in which case the
/// kernel must have completed when `launch` returns.
pub trait ElementwiseLauncher: Send + Sync {
    /// Run `kernel` on `queue`, or inline when there is no queue
    fn launch(&self, queue: Option<&Queue>, kernel: ElementwiseKernel) -> Result<()>;
}

/// Launcher submitting kernels to the device queue as a single task
#[derive(Copy, Clone, Debug, Default)]
pub struct QueueLauncher;

impl ElementwiseLauncher for QueueLauncher {
    fn launch(&self, queue: Option<&Queue>, kernel: ElementwiseKernel) -> Result<()> {
        log::trace!("launch {:?}", kernel);
        match queue {
            Some(queue) => queue.submit(move || kernel.run()),
            None => {
                kernel.run();
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Complex64;
    use crate::runtime::{Device, Runtime, RuntimeConfig};
    use crate::tensor::View;

    fn flags(dtype: DType, conj: bool, neg: bool) -> DTypeFlags {
        DTypeFlags { dtype, conj, neg }
    }

    #[test]
    fn test_op_selection_table() {
        let c = DType::Complex64;
        assert_eq!(CopyOp::select(flags(c, false, false), flags(c, false, false)).unwrap(), CopyOp::Identity);
        assert_eq!(CopyOp::select(flags(c, false, false), flags(c, true, false)).unwrap(), CopyOp::Conj);
        assert_eq!(CopyOp::select(flags(c, false, true), flags(c, false, false)).unwrap(), CopyOp::Neg);
        assert_eq!(CopyOp::select(flags(c, true, false), flags(c, false, true)).unwrap(), CopyOp::ConjNeg);
        // Differing dtypes never conjugate.
        let c128 = DType::Complex128;
        assert_eq!(CopyOp::select(flags(c128, false, false), flags(c, true, false)).unwrap(), CopyOp::Identity);
        assert_eq!(CopyOp::select(flags(c128, false, false), flags(c, true, true)).unwrap(), CopyOp::Neg);
    }

    #[test]
    fn test_quantized_selection() {
        let q = DType::QInt8;
        assert_eq!(CopyOp::select(flags(q, false, false), flags(q, false, true)).unwrap(), CopyOp::Identity);
        assert!(matches!(
            CopyOp::select(flags(DType::F32, false, false), flags(q, false, false)),
            Err(Error::UnsupportedCopy { .. })
        ));
        assert!(matches!(
            CopyOp::select(flags(q, false, false), flags(DType::I8, false, false)),
            Err(Error::UnsupportedCopy { .. })
        ));
    }

    #[test]
    fn test_conj_requires_complex() {
        let f = DType::F32;
        assert!(matches!(
            CopyOp::select(flags(f, true, false), flags(f, false, false)),
            Err(Error::UnsupportedDType { op: "copy_conj", .. })
        ));
    }

    #[test]
    fn test_run_casts_and_negates_strided() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        let src = View::from_slice(&rt, &[1i32, 2, 3, 4, 5, 6], &[2, 3], Device::Host)
            .unwrap()
            .transpose(0, 1)
            .unwrap()
            .neg_view();
        let dst = View::empty(&rt, &[3, 2], DType::F64, Device::Host).unwrap();
        let iter = IterationDescriptor::build(&dst, &src).unwrap();
        let kernel = ElementwiseKernel::for_copy(&iter).unwrap();
        assert_eq!(kernel.op(), CopyOp::Neg);
        assert_eq!(
            kernel.key(),
            DispatchKey {
                dst: DTypeCategory::Float,
                src: DTypeCategory::SignedInt
            }
        );
        QueueLauncher.launch(None, kernel).unwrap();
        assert_eq!(dst.to_vec::<f64>().unwrap(), vec![-1.0, -4.0, -2.0, -5.0, -3.0, -6.0]);
    }

    #[test]
    fn test_run_conjugates_on_queue() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        let data = [Complex64::new(1.0, 2.0), Complex64::new(-3.0, 0.5)];
        let src = View::from_slice(&rt, &data, &[2], Device::Accel(0)).unwrap().conj();
        let dst = View::empty(&rt, &[2], DType::Complex64, Device::Accel(0)).unwrap();
        let iter = IterationDescriptor::build(&dst, &src).unwrap();
        let kernel = ElementwiseKernel::for_copy(&iter).unwrap();
        QueueLauncher
            .launch(Some(rt.current_queue(Device::Accel(0)).unwrap()), kernel)
            .unwrap();
        assert_eq!(
            dst.to_vec::<Complex64>().unwrap(),
            vec![Complex64::new(1.0, -2.0), Complex64::new(-3.0, -0.5)]
        );
    }

    #[test]
    fn test_negated_unsigned_into_float_on_queue() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        let src = View::from_slice(&rt, &[5u8, 0, 200], &[3], Device::Accel(0))
            .unwrap()
            .neg_view();
        let dst = View::empty(&rt, &[3], DType::F32, Device::Accel(0)).unwrap();
        let iter = IterationDescriptor::build(&dst, &src).unwrap();
        let kernel = ElementwiseKernel::for_copy(&iter).unwrap();
        QueueLauncher
            .launch(Some(rt.current_queue(Device::Accel(0)).unwrap()), kernel)
            .unwrap();
        assert_eq!(dst.to_vec::<f32>().unwrap(), vec![-5.0, 0.0, -200.0]);
    }

    #[test]
    fn test_negation_wraps_at_destination_width() {
        let rt = Runtime::new(RuntimeConfig::default()).unwrap();
        let src = View::from_slice(&rt, &[5u8, 0, 200], &[3], Device::Host).unwrap().neg_view();
        let narrow = View::empty(&rt, &[3], DType::U8, Device::Host).unwrap();
        let wide = View::empty(&rt, &[3], DType::U16, Device::Host).unwrap();
        for dst in [&narrow, &wide] {
            let kernel = ElementwiseKernel::for_copy(&IterationDescriptor::build(dst, &src).unwrap()).unwrap();
            QueueLauncher.launch(None, kernel).unwrap();
        }
        assert_eq!(narrow.to_vec::<u8>().unwrap(), vec![251, 0, 56]);
        assert_eq!(wide.to_vec::<u16>().unwrap(), vec![65531, 0, 65336]);
    }
}
