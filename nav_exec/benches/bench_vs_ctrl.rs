//! # Visual Servoing Control Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use nav_lib::vs_ctrl::{compute_angular_velocity, CameraModel, CameraParams, PoseError};

fn vs_ctrl_benchmark(c: &mut Criterion) {
    let cam = CameraModel::from_params(&CameraParams::default()).unwrap();

    let desired = PoseError::new(0.0, 160.0, 0.0);
    let observed = PoseError::new(12.5, 143.0, 0.12);

    c.bench_function("vs_ctrl::compute_angular_velocity", |b| {
        b.iter(|| compute_angular_velocity(
            black_box(&cam), 
            black_box(&desired), 
            black_box(&observed), 
            black_box(0.3)
        ).unwrap())
    });
}

criterion_group!(benches, vs_ctrl_benchmark);
criterion_main!(benches);
