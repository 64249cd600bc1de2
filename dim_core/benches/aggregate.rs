use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use dim_core::aggregate;
use dim_traits::DimensionEstimate;

// Noisy samples around one true size, tiny xorshift PRNG
fn synth_samples(n: usize, jitter: i32, seed: u32) -> Vec<DimensionEstimate> {
    let mut state = seed.max(1);
    let mut next = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x % (2 * jitter as u32 + 1)) as i32 - jitter
    };
    (0..n)
        .map(|_| DimensionEstimate::new(400 + next(), 300 + next(), 200 + next()))
        .collect()
}

pub fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    for (n, jitter) in [(5usize, 2), (25, 3), (100, 5)] {
        group.bench_function(format!("n{n}_jitter{jitter}"), |b| {
            b.iter_batched(
                || synth_samples(n, jitter, 0xC0FFEE),
                |s| black_box(aggregate(black_box(&s))),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_aggregate);
criterion_main!(benches);
