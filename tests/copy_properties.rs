//! Property tests for copy correctness across dtypes, layouts and devices

mod common;

use common::{allocation_snapshot, assert_allclose_f64, create_engine};
use devcopy::dtype::DType;
use devcopy::runtime::Device;
use devcopy::tensor::View;
use proptest::prelude::*;

const DTYPES: [DType; 9] = [
    DType::F64,
    DType::F32,
    DType::F16,
    DType::BF16,
    DType::I64,
    DType::I32,
    DType::I8,
    DType::U8,
    DType::Complex64,
];

const DEVICES: [Device; 3] = [Device::Host, Device::Accel(0), Device::Accel(1)];

/// Dtypes mixed with conj/neg flags: both complex widths plus signed,
/// unsigned and float reals
const FLAGGED_DTYPES: [DType; 6] = [
    DType::Complex64,
    DType::Complex128,
    DType::F64,
    DType::F32,
    DType::I32,
    DType::U8,
];

/// Encode small integers as `dtype` so every conversion is exact
fn encode(dtype: DType, values: &[i8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * dtype.size_in_bytes());
    for &v in values {
        match dtype {
            DType::F64 => out.extend_from_slice(&(v as f64).to_ne_bytes()),
            DType::F32 => out.extend_from_slice(&(v as f32).to_ne_bytes()),
            DType::F16 => out.extend_from_slice(&half::f16::from_f32(v as f32).to_ne_bytes()),
            DType::BF16 => out.extend_from_slice(&half::bf16::from_f32(v as f32).to_ne_bytes()),
            DType::I64 => out.extend_from_slice(&(v as i64).to_ne_bytes()),
            DType::I32 => out.extend_from_slice(&(v as i32).to_ne_bytes()),
            DType::I8 => out.push(v as u8),
            DType::U8 => out.push(v.unsigned_abs()),
            DType::Complex64 => {
                out.extend_from_slice(&(v as f32).to_ne_bytes());
                out.extend_from_slice(&0f32.to_ne_bytes());
            }
            other => unreachable!("no encoding for {other}"),
        }
    }
    out
}

/// Like [`encode`], with `imag` as the imaginary parts of complex dtypes
fn encode_complex(dtype: DType, values: &[i8], imag: &[i8]) -> Vec<u8> {
    match dtype {
        DType::Complex64 => values
            .iter()
            .zip(imag)
            .flat_map(|(&re, &im)| [re as f32, im as f32])
            .flat_map(f32::to_ne_bytes)
            .collect(),
        DType::Complex128 => values
            .iter()
            .zip(imag)
            .flat_map(|(&re, &im)| [re as f64, im as f64])
            .flat_map(f64::to_ne_bytes)
            .collect(),
        other => encode(other, values),
    }
}

fn with_flags(view: View, conj: bool, neg: bool) -> View {
    let view = if conj { view.conj() } else { view };
    if neg { view.neg_view() } else { view }
}

fn unsigned(values: &[i8]) -> Vec<i8> {
    values.iter().map(|v| v.unsigned_abs().min(127) as i8).collect()
}

fn shape_and_values() -> impl Strategy<Value = (Vec<usize>, Vec<i8>)> {
    prop::collection::vec(1usize..=4, 1..=3).prop_flat_map(|shape| {
        let n: usize = shape.iter().product();
        (Just(shape), prop::collection::vec(-100i8..=100, n))
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_same_device_copy_is_byte_exact(
        (shape, values) in shape_and_values(),
        dtype_idx in 0..DTYPES.len(),
        device_idx in 0..DEVICES.len(),
    ) {
        let (rt, engine) = create_engine();
        let (dtype, device) = (DTYPES[dtype_idx], DEVICES[device_idx]);
        let src = View::from_bytes(&rt, &encode(dtype, &values), &shape, dtype, device).unwrap();
        let mut dst = View::empty(&rt, &shape, dtype, device).unwrap();

        let before = allocation_snapshot(&rt);
        engine.copy_(&mut dst, &src, false).unwrap();
        prop_assert_eq!(allocation_snapshot(&rt), before);
        prop_assert_eq!(dst.to_vec_bytes().unwrap(), src.to_vec_bytes().unwrap());
    }

    #[test]
    fn prop_any_pair_preserves_values(
        (shape, values) in shape_and_values(),
        src_dtype in 0..DTYPES.len(),
        dst_dtype in 0..DTYPES.len(),
        src_device in 0..DEVICES.len(),
        dst_device in 0..DEVICES.len(),
        transpose in any::<bool>(),
        non_blocking in any::<bool>(),
    ) {
        let (rt, engine) = create_engine();
        let (src_dtype, dst_dtype) = (DTYPES[src_dtype], DTYPES[dst_dtype]);
        let values = if src_dtype == DType::U8 || dst_dtype == DType::U8 {
            unsigned(&values)
        } else {
            values
        };

        let mut src = View::from_bytes(&rt, &encode(src_dtype, &values), &shape, src_dtype, DEVICES[src_device]).unwrap();
        let mut logical = values.clone();
        if transpose && shape.len() >= 2 {
            let last = shape.len() as isize - 1;
            src = src.transpose(0, last).unwrap();
            let reference = View::from_slice(&rt, &values, &shape, Device::Host)
                .unwrap()
                .transpose(0, last)
                .unwrap();
            logical = reference.to_vec::<i8>().unwrap();
        }

        let mut dst = View::empty(&rt, src.shape(), dst_dtype, DEVICES[dst_device]).unwrap();
        engine.copy_(&mut dst, &src, non_blocking).unwrap();
        rt.synchronize().unwrap();

        prop_assert_eq!(dst.to_vec_bytes().unwrap(), encode(dst_dtype, &logical));
    }

    #[test]
    fn prop_flagged_copy_matches_host_reference(
        (shape, values) in shape_and_values(),
        imag in prop::collection::vec(-100i8..=100, 64),
        src_dtype in 0..FLAGGED_DTYPES.len(),
        dst_dtype in 0..FLAGGED_DTYPES.len(),
        src_device in 0..DEVICES.len(),
        dst_device in 0..DEVICES.len(),
        src_flags in any::<(bool, bool)>(),
        dst_flags in any::<(bool, bool)>(),
        transpose in any::<bool>(),
    ) {
        let (rt, engine) = create_engine();
        let (src_dtype, dst_dtype) = (FLAGGED_DTYPES[src_dtype], FLAGGED_DTYPES[dst_dtype]);
        let bytes = encode_complex(src_dtype, &values, &imag[..values.len()]);
        let last = shape.len() as isize - 1;
        let source = |device: Device| {
            let view = View::from_bytes(&rt, &bytes, &shape, src_dtype, device).unwrap();
            let view = if transpose { view.transpose(0, last).unwrap() } else { view };
            with_flags(view, src_flags.0, src_flags.1)
        };
        let target = |device: Device| {
            let view = View::empty(&rt, &source(Device::Host).shape().to_vec(), dst_dtype, device).unwrap();
            with_flags(view, dst_flags.0, dst_flags.1)
        };

        let mut reference = target(Device::Host);
        engine.copy_(&mut reference, &source(Device::Host), false).unwrap();

        let mut dst = target(DEVICES[dst_device]);
        engine.copy_(&mut dst, &source(DEVICES[src_device]), false).unwrap();
        prop_assert_eq!(dst.to_vec_bytes().unwrap(), reference.to_vec_bytes().unwrap());
    }

    #[test]
    fn prop_negated_source_is_negated(
        (shape, values) in shape_and_values(),
        device_idx in 0..DEVICES.len(),
    ) {
        let (rt, engine) = create_engine();
        let data: Vec<f64> = values.iter().map(|&v| v as f64 * 0.25).collect();
        let src = View::from_slice(&rt, &data, &shape, DEVICES[device_idx]).unwrap().neg_view();
        let mut dst = View::empty(&rt, &shape, DType::F64, Device::Accel(0)).unwrap();

        engine.copy_(&mut dst, &src, false).unwrap();
        let expected: Vec<f64> = data.iter().map(|v| -v).collect();
        assert_allclose_f64(&dst.to_vec::<f64>().unwrap(), &expected, 0.0, 0.0, "negated copy");
    }

    #[test]
    fn prop_broadcast_rows(
        cols in 1usize..=5,
        rows in 1usize..=4,
        src_device in 0..DEVICES.len(),
        dst_device in 0..DEVICES.len(),
    ) {
        let (rt, engine) = create_engine();
        let row: Vec<i32> = (0..cols as i32).map(|c| c * 11 - 7).collect();
        let src = View::from_slice(&rt, &row, &[1, cols], DEVICES[src_device]).unwrap();
        let mut dst = View::empty(&rt, &[rows, cols], DType::I64, DEVICES[dst_device]).unwrap();

        engine.copy_(&mut dst, &src, false).unwrap();
        let expected: Vec<i64> = (0..rows).flat_map(|_| row.iter().map(|&v| v as i64)).collect();
        prop_assert_eq!(dst.to_vec::<i64>().unwrap(), expected);
    }
}
