// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Ranks buckets by how often their tables are read

use super::bucket::Bucket;
use crate::Table;
use std::cmp::Ordering;

/// Bucket that qualifies for compaction, with its hotness
#[derive(Clone, Debug, PartialEq)]
pub struct HotBucket {
    /// Tables to compact, hottest first
    pub tables: Vec<Table>,

    /// Sum of the short-window read rates of `tables`
    pub hotness: f64,

    /// Average on-disk size of `tables`
    pub average_size: u64,
}

/// Keeps the hottest `max_threshold` tables of a bucket.
///
/// Returns the kept tables (hottest first) and their summed hotness.
///
/// Every table's read rate is sampled exactly once, so the result stays
/// consistent even if a meter is restored concurrently.
#[must_use]
pub fn trim_to_threshold_with_hotness(
    bucket: Bucket<Table>,
    max_threshold: usize,
) -> (Vec<Table>, f64) {
    let mut rated = bucket
        .into_items()
        .into_iter()
        .map(|table| {
            let hotness = table.hotness();
            (table, hotness)
        })
        .collect::<Vec<_>>();

    // NOTE: Stable sort, ties keep their bucket order
    rated.sort_by(|(_, a), (_, b)| b.total_cmp(a));
    rated.truncate(max_threshold);

    let hotness = rated.iter().map(|(_, hotness)| hotness).sum();
    let tables = rated.into_iter().map(|(table, _)| table).collect();

    (tables, hotness)
}

/// Drops buckets with fewer than `min_threshold` tables, trims buckets with more
/// than `max_threshold` tables to their hottest tables, and ranks the remaining buckets.
///
/// The result is sorted by hotness (descending), then table count (descending),
/// then average table size (ascending).
#[must_use]
pub fn pruned_buckets_and_hotness(
    buckets: Vec<Bucket<Table>>,
    min_threshold: usize,
    max_threshold: usize,
) -> Vec<HotBucket> {
    let mut hot_buckets = buckets
        .into_iter()
        .filter(|bucket| bucket.len() >= min_threshold)
        .map(|bucket| {
            let (tables, hotness) = trim_to_threshold_with_hotness(bucket, max_threshold);

            let total_size = tables.iter().map(Table::size_on_disk).sum::<u64>();
            let average_size = total_size / (tables.len() as u64).max(1);

            HotBucket {
                tables,
                hotness,
                average_size,
            }
        })
        .collect::<Vec<_>>();

    hot_buckets.sort_by(compare_buckets);

    hot_buckets
}

fn compare_buckets(a: &HotBucket, b: &HotBucket) -> Ordering {
    b.hotness
        .total_cmp(&a.hotness)
        .then_with(|| b.tables.len().cmp(&a.tables.len()))
        .then_with(|| a.average_size.cmp(&b.average_size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        compaction::{bucket::get_buckets, SizeTieredOptions},
        read_meter::ReadMeter,
    };
    use test_log::test;

    fn table(id: u64, size: u64, rate: f64) -> Table {
        Table::with_read_meter(id, size, ReadMeter::restored(rate, rate))
    }

    fn bucket_of(tables: Vec<Table>) -> Bucket<Table> {
        let options = SizeTieredOptions::new(0.5, 1.5, u64::MAX).expect("valid options");
        let mut buckets = get_buckets(tables.into_iter().map(|t| {
            let size = t.size_on_disk();
            (t, size)
        }), &options);

        assert_eq!(1, buckets.len());
        buckets.remove(0)
    }

    #[test]
    fn hotness_trim_keeps_hottest() {
        let bucket = bucket_of(vec![
            table(1, 10, 0.0),
            table(2, 10, 5.0),
            table(3, 10, 1.0),
            table(4, 10, 3.0),
        ]);

        let (tables, hotness) = trim_to_threshold_with_hotness(bucket, 2);
        assert_eq!(
            vec![2, 4],
            tables.iter().map(Table::id).collect::<Vec<_>>()
        );
        assert!((hotness - 8.0).abs() < 1e-9);
    }

    #[test]
    fn hotness_forty_tables_trimmed_to_max() {
        let bucket = bucket_of((0..40).map(|id| table(id, 100, 1.0)).collect());

        let buckets = pruned_buckets_and_hotness(vec![bucket], 4, 32);
        assert_eq!(1, buckets.len());

        let top = buckets.first().expect("should exist");
        assert_eq!(32, top.tables.len());
        assert!((top.hotness - 32.0).abs() < 1e-9);
    }

    #[test]
    fn hotness_below_min_threshold_dropped() {
        let small = bucket_of((0..3).map(|id| table(id, 100, 50.0)).collect());
        assert!(pruned_buckets_and_hotness(vec![small], 4, 32).is_empty());
    }

    #[test]
    fn hotness_cold_tables_contribute_zero() {
        let bucket = bucket_of((0..4).map(|id| Table::new(id, 100)).collect());

        let buckets = pruned_buckets_and_hotness(vec![bucket], 4, 32);
        let top = buckets.first().expect("should exist");
        assert!(top.hotness.abs() < f64::EPSILON);
    }

    #[test]
    fn hotness_ranking() {
        let cold_large = bucket_of((0..4).map(|id| table(id, 1_000, 0.0)).collect());
        let cold_small = bucket_of((10..14).map(|id| table(id, 10, 0.0)).collect());
        let cold_many = bucket_of((20..26).map(|id| table(id, 5_000, 0.0)).collect());
        let hot = bucket_of((30..34).map(|id| table(id, 100_000, 2.0)).collect());

        let ranked = pruned_buckets_and_hotness(vec![cold_large, cold_small, cold_many, hot], 4, 32);

        let first_ids = ranked
            .iter()
            .map(|b| b.tables.first().map(Table::id).unwrap_or_default())
            .collect::<Vec<_>>();

        // hotness, then table count, then smaller average size
        assert_eq!(vec![30, 20, 10, 0], first_ids);
    }

    #[test]
    fn hotness_is_linear_in_read_rate() {
        let tables = (0..12)
            .map(|id| table(id, 100, f64::from(u32::try_from(id).unwrap_or_default()) * 0.37))
            .collect::<Vec<_>>();

        let before = pruned_buckets_and_hotness(vec![bucket_of(tables.clone())], 4, 8)
            .iter()
            .map(|b| b.hotness)
            .sum::<f64>();

        for t in &tables {
            let rate = t.hotness();
            t.read_meter().restore(rate * 2.0, rate * 2.0);
        }

        let after = pruned_buckets_and_hotness(vec![bucket_of(tables)], 4, 8)
            .iter()
            .map(|b| b.hotness)
            .sum::<f64>();

        assert!(before > 0.0);
        assert_eq!(before * 2.0, after);
    }
}
