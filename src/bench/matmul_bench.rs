//! Criterion comparison of the multiplication strategies.
//!
//! The process strategy runs the `parmatmul` binary built alongside this
//! bench as its worker.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use parmatmul::{
    EngineConfig, Kernel, Matrix, ProcessEngine, ThreadEngine, WorkerCommand, multiply_standard,
    multiply_transposed,
};

const SIZES: [usize; 3] = [64, 128, 256];

fn bench_sequential(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential");
    group.sample_size(10);

    for &n in &SIZES {
        let a = Matrix::random(n, 1).unwrap();
        let b = Matrix::random(n, 2).unwrap();

        group.bench_with_input(BenchmarkId::new("standard", n), &n, |bench, _| {
            bench.iter(|| black_box(multiply_standard(black_box(&a), black_box(&b)).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("transposed", n), &n, |bench, _| {
            bench.iter(|| black_box(multiply_transposed(black_box(&a), black_box(&b)).unwrap()));
        });
    }

    group.finish();
}

fn bench_threaded(c: &mut Criterion) {
    let mut group = c.benchmark_group("threaded");
    group.sample_size(10);

    for &n in &SIZES {
        let a = Matrix::random(n, 1).unwrap();
        let b = Matrix::random(n, 2).unwrap();

        for kernel in [Kernel::Standard, Kernel::Transposed] {
            let engine = ThreadEngine::new(EngineConfig::default().with_kernel(kernel));
            group.bench_with_input(BenchmarkId::new(kernel.as_str(), n), &n, |bench, _| {
                bench.iter(|| black_box(engine.multiply(black_box(&a), black_box(&b)).unwrap()));
            });
        }
    }

    group.finish();
}

fn bench_processes(c: &mut Criterion) {
    let mut group = c.benchmark_group("processes");
    group.sample_size(10);
    let command = WorkerCommand::new(env!("CARGO_BIN_EXE_parmatmul")).arg("worker");
    let engine = ProcessEngine::new(command, EngineConfig::default());

    for &n in &SIZES {
        let a = Matrix::random(n, 1).unwrap();
        let b = Matrix::random(n, 2).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, _| {
            bench.iter(|| black_box(engine.multiply(black_box(&a), black_box(&b)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sequential, bench_threaded, bench_processes);
criterion_main!(benches);
