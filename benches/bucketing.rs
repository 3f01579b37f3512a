use criterion::{criterion_group, criterion_main, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};
use stcs::compaction::{get_buckets, CompactionStrategy, SizeTiered, SizeTieredOptions};
use stcs::{ReadMeter, Table, Thresholds};

fn tables(count: u64) -> Vec<Table> {
    let mut rng = StdRng::seed_from_u64(count);

    let mut tables = (0..count)
        .map(|id| {
            // Sizes spread over a few tiers, 1 MiB to 1 GiB
            let size = 1_024 * 1_024 * (1 << rng.random_range(0..10)) + rng.random_range(0..4_096);
            let rate = if rng.random_bool(0.1) { 100.0 } else { 0.0 };
            Table::with_read_meter(id, size, ReadMeter::restored(rate, rate))
        })
        .collect::<Vec<_>>();

    tables.sort_by_key(|t| (t.size_on_disk(), t.id()));
    tables
}

fn bucketing(c: &mut Criterion) {
    let mut group = c.benchmark_group("get_buckets");
    let options = SizeTieredOptions::default();

    for count in [100, 1_000, 10_000] {
        let tables = tables(count);

        group.bench_function(format!("{count} tables"), |b| {
            b.iter(|| {
                get_buckets(
                    tables.iter().map(|t| (t.id(), t.size_on_disk())),
                    &options,
                )
            });
        });
    }
}

fn choose(c: &mut Criterion) {
    let mut group = c.benchmark_group("choose");
    let strategy = SizeTiered::default();
    let thresholds = Thresholds::default();

    for count in [100, 1_000, 10_000] {
        let tables = tables(count);

        group.bench_function(format!("{count} tables"), |b| {
            b.iter(|| strategy.choose(&tables, &thresholds));
        });

        group.bench_function(format!("{count} tables, pending estimate"), |b| {
            b.iter(|| strategy.estimated_pending(&tables, &thresholds));
        });
    }
}

criterion_group!(benches, bucketing, choose);
criterion_main!(benches);
