//! # Pooled Operation Benchmarks
//!
//! Wall time of the partitioned FFT and MSM against pool size.
//!
//! | Group | Input | Pool sizes |
//! |-------|-------|------------|
//! | pooled-fft | 2^12 coefficients | 1, 2, 4 |
//! | pooled-msm | 2^12 points | 1, 2, 4 |
//! | fft-2^14 | 2^14 coefficients | single context, pooled 4 |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use zk_engine::reference::fft::EvaluationDomain;
use zk_engine::reference::field::decode_elements;
use zk_engine::{EngineImage, FieldElement, ReferenceImage};
use zk_pool::{PoolConfig, PooledFft, PooledPippenger, WorkerPool};

const LOG_SIZE: u32 = 12;
const LARGE_LOG_SIZE: u32 = 14;
const POOL_SIZES: [usize; 3] = [1, 2, 4];

fn packed_elements(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .flat_map(|_| FieldElement::new(rng.next_u64()).to_le_bytes())
        .collect()
}

fn pool(rt: &Runtime, size: usize) -> Arc<WorkerPool> {
    let image: EngineImage = Arc::new(ReferenceImage);
    Arc::new(
        rt.block_on(WorkerPool::create(image, PoolConfig::default().with_size(size)))
            .expect("pool"),
    )
}

fn bench_pooled_fft(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let n = 1usize << LOG_SIZE;
    let coeffs = packed_elements(n, 1);

    let mut group = c.benchmark_group("pooled-fft");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(n as u64));

    for size in POOL_SIZES {
        let pool = pool(&rt, size);
        let fft = PooledFft::new(pool.clone());
        rt.block_on(fft.init(n)).expect("fft init");

        group.bench_with_input(BenchmarkId::from_parameter(size), &coeffs, |b, coeffs| {
            b.iter(|| rt.block_on(fft.fft(black_box(coeffs))).expect("fft"))
        });
        rt.block_on(pool.destroy());
    }
    group.finish();
}

fn bench_pooled_msm(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let n = 1usize << LOG_SIZE;
    let points = packed_elements(n, 2);
    let scalars = packed_elements(n, 3);

    let mut group = c.benchmark_group("pooled-msm");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(n as u64));

    for size in POOL_SIZES {
        let pool = pool(&rt, size);
        let msm = PooledPippenger::new(pool.clone());
        rt.block_on(msm.init(&points)).expect("msm init");

        group.bench_with_input(BenchmarkId::from_parameter(size), &scalars, |b, scalars| {
            b.iter(|| rt.block_on(msm.msm(black_box(scalars))).expect("msm"))
        });
        rt.block_on(pool.destroy());
    }
    group.finish();
}

fn bench_large_fft(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let n = 1usize << LARGE_LOG_SIZE;
    let packed = packed_elements(n, 4);
    let coeffs = decode_elements(&packed).expect("canonical coefficients");
    let domain = EvaluationDomain::new(n as u64).expect("domain");

    let mut group = c.benchmark_group("fft-2^14");
    group.measurement_time(Duration::from_secs(10));
    group.throughput(Throughput::Elements(n as u64));

    group.bench_with_input("single-context", &coeffs, |b, coeffs| {
        b.iter(|| domain.fft(black_box(coeffs)).expect("fft"))
    });

    let pool = pool(&rt, 4);
    let fft = PooledFft::new(pool.clone());
    rt.block_on(fft.init(n)).expect("fft init");
    group.bench_with_input("pooled-4", &packed, |b, packed| {
        b.iter(|| rt.block_on(fft.fft(black_box(packed))).expect("fft"))
    });
    rt.block_on(pool.destroy());
    group.finish();
}

criterion_group!(benches, bench_pooled_fft, bench_pooled_msm, bench_large_fft);
criterion_main!(benches);
