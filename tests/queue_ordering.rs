//! Integration tests for cross-queue ordering of copies

mod common;

use common::create_engine;
use devcopy::dtype::DType;
use devcopy::error::Error;
use devcopy::runtime::Device;
use devcopy::tensor::View;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_copy_waits_for_pending_destination_work() {
    let (rt, engine) = create_engine();
    let mut dst = View::empty(&rt, &[64], DType::F32, Device::Accel(0)).unwrap();
    let src = View::from_slice(&rt, &[1.0f32; 64], &[64], Device::Accel(1)).unwrap();

    // Slow writer already queued on the destination's device.
    let target = dst.clone();
    rt.current_queue(Device::Accel(0))
        .unwrap()
        .submit(move || {
            std::thread::sleep(Duration::from_millis(50));
            let ptr = target.storage().ptr() as *mut f32;
            for i in 0..64 {
                unsafe { ptr.add(i).write(7.0) };
            }
        })
        .unwrap();

    engine.copy_(&mut dst, &src, true).unwrap();
    assert_eq!(dst.to_vec::<f32>().unwrap(), vec![1.0; 64]);
}

#[test]
fn test_later_destination_work_sees_copy() {
    let (rt, engine) = create_engine();
    let mut dst = View::empty(&rt, &[4], DType::I64, Device::Accel(1)).unwrap();
    let src = View::from_slice(&rt, &[10i64, 20, 30, 40], &[4], Device::Accel(0)).unwrap();

    // Keep the source queue busy so the copy itself is late.
    rt.current_queue(Device::Accel(0))
        .unwrap()
        .submit(|| std::thread::sleep(Duration::from_millis(50)))
        .unwrap();
    engine.copy_(&mut dst, &src, true).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (reader, sink) = (dst.clone(), Arc::clone(&seen));
    let dst_queue = rt.current_queue(Device::Accel(1)).unwrap();
    dst_queue
        .submit(move || {
            let ptr = reader.storage().ptr() as *const i64;
            let values: Vec<i64> = (0..4).map(|i| unsafe { ptr.add(i).read() }).collect();
            *sink.lock() = values;
        })
        .unwrap();
    dst_queue.synchronize().unwrap();

    assert_eq!(*seen.lock(), vec![10, 20, 30, 40]);
}

#[test]
fn test_non_blocking_chain_across_three_hops() {
    let (rt, engine) = create_engine();
    let data: Vec<u16> = (0..100).collect();
    let a = View::from_slice(&rt, &data, &[10, 10], Device::Accel(0)).unwrap();
    let mut b = View::empty(&rt, &[10, 10], DType::U16, Device::Accel(1)).unwrap();
    let mut c = View::empty(&rt, &[10, 10], DType::U16, Device::Accel(0)).unwrap();
    let mut host = View::empty(&rt, &[10, 10], DType::U16, Device::Host).unwrap();

    engine.copy_(&mut b, &a, true).unwrap();
    engine.copy_(&mut c, &b, true).unwrap();
    engine.copy_(&mut host, &c, true).unwrap();
    assert_eq!(host.to_vec::<u16>().unwrap(), data);
}

#[test]
fn test_queue_failure_surfaces_on_blocking_copy() {
    let (rt, engine) = create_engine();
    let queue = rt.current_queue(Device::Accel(0)).unwrap();
    queue.submit(|| panic!("injected device fault")).unwrap();

    let src = View::from_slice(&rt, &[1.0f32, 2.0], &[2], Device::Accel(0)).unwrap();
    let mut dst = View::empty(&rt, &[2], DType::F32, Device::Accel(0)).unwrap();
    let err = engine.copy_(&mut dst, &src, false).unwrap_err();
    match err {
        Error::Queue { device, reason } => {
            assert_eq!(device, Device::Accel(0));
            assert!(reason.contains("injected device fault"));
        }
        other => panic!("unexpected error: {other}"),
    }

    // The failure is reported once; the queue keeps working.
    engine.copy_(&mut dst, &src, false).unwrap();
    assert_eq!(dst.to_vec::<f32>().unwrap(), vec![1.0, 2.0]);
}
