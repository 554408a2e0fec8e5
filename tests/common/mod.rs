//! Common test utilities
#![allow(dead_code)]

use devcopy::copy::{CopyConfig, CopyEngine};
use devcopy::runtime::{Allocator, Device, Runtime, RuntimeConfig};

/// Runtime with two accelerators and an engine over it
pub fn create_engine() -> (Runtime, CopyEngine) {
    create_engine_with(RuntimeConfig::default(), CopyConfig::default())
}

/// Runtime and engine built from explicit configurations
pub fn create_engine_with(runtime: RuntimeConfig, config: CopyConfig) -> (Runtime, CopyEngine) {
    let rt = Runtime::new(runtime).expect("runtime");
    let engine = CopyEngine::new(rt.clone(), config);
    (rt, engine)
}

/// Number of allocations made on `device` so far
pub fn allocations(rt: &Runtime, device: Device) -> u64 {
    rt.allocator(device).expect("device").allocation_count()
}

/// Allocation counts of the host and both accelerators
pub fn allocation_snapshot(rt: &Runtime) -> [u64; 3] {
    [
        allocations(rt, Device::Host),
        allocations(rt, Device::Accel(0)),
        allocations(rt, Device::Accel(1)),
    ]
}

/// Assert two f64 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f64(a: &[f64], b: &[f64], rtol: f64, atol: f64, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}

/// Row-major reference values 0, 1, 2, ... as f32
pub fn iota_f32(n: usize) -> Vec<f32> {
    (0..n).map(|i| i as f32).collect()
}
