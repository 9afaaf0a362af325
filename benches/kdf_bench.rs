use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sealstream::{derive_key, KdfParams};

fn bench_derive_key(c: &mut Criterion) {
    let salt = [0x42u8; 32];
    let mut group = c.benchmark_group("derive_key");
    group.sample_size(10);

    for cost in [10u32, 12, 14] {
        let params = KdfParams::new(cost, 8, 1, 8, 1).unwrap();
        group.bench_with_input(BenchmarkId::new("cost", cost), &params, |b, params| {
            b.iter(|| derive_key(b"benchmark password", &salt, params, 32).unwrap());
        });
    }

    for threads in [1u32, 2, 4] {
        let params = KdfParams::new(12, 8, 4, 8, threads).unwrap();
        group.bench_with_input(
            BenchmarkId::new("threads", threads),
            &params,
            |b, params| {
                b.iter(|| derive_key(b"benchmark password", &salt, params, 32).unwrap());
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_derive_key);
criterion_main!(benches);
