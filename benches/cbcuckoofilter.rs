use cbcf::filters::cbcuckoofilter::{CbCuckooFilter, Config, Mode};
use cbcf::rand::SeedableRng;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use rand_chacha::ChaChaRng;

fn setup(mode: Mode) -> CbCuckooFilter<ChaChaRng> {
    let false_positive_rate = 0.02; // = 2%
    let expected_elements = 1_000_000;
    let config = Config::with_properties(mode, 4, false_positive_rate, expected_elements).unwrap();
    CbCuckooFilter::new(config, ChaChaRng::from_seed([0; 32])).unwrap()
}

fn filled(mode: Mode, n: u64) -> CbCuckooFilter<ChaChaRng> {
    let mut filter = setup(mode);
    for key in 0..n {
        let _ = filter.insert(key);
    }
    filter
}

fn cbcuckoofilter_insert_many(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert_many");
    for (name, mode) in [("standard", Mode::Standard), ("adaptive", Mode::Adaptive)] {
        group.bench_function(name, |b| {
            b.iter_batched(
                || setup(mode),
                |mut filter| {
                    for key in 0..10_000u64 {
                        let _ = filter.insert(key);
                    }
                    filter
                },
                BatchSize::LargeInput,
            )
        });
    }
    group.finish();
}

fn cbcuckoofilter_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    for (name, mode) in [("standard", Mode::Standard), ("adaptive", Mode::Adaptive)] {
        let filter = filled(mode, 900_000);
        let mut key: u64 = 0;
        group.bench_function(name, |b| {
            b.iter(|| {
                key = key.wrapping_add(7_919);
                filter.query(key)
            })
        });
    }
    group.finish();
}

fn cbcuckoofilter_scrub(c: &mut Criterion) {
    c.bench_function("scrub", |b| {
        b.iter_batched(
            || filled(Mode::Adaptive, 900_000),
            |mut filter| filter.scrub(),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    cbcuckoofilter_insert_many,
    cbcuckoofilter_query,
    cbcuckoofilter_scrub,
);
criterion_main!(benches);
