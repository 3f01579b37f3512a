// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Groups tables of similar size

use super::SizeTieredOptions;

/// Group of similarly-sized items, the unit of compaction candidacy
///
/// A bucket is never empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket<T> {
    members: Vec<(T, u64)>,
    total_size: u64,
}

impl<T> Bucket<T> {
    fn new(item: T, size: u64) -> Self {
        Self {
            members: vec![(item, size)],
            total_size: size,
        }
    }

    fn push(&mut self, item: T, size: u64) {
        self.members.push((item, size));
        self.total_size = self.total_size.saturating_add(size);
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always `false`; buckets are never materialized without a member.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Sum of all member sizes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Running average of the member sizes.
    #[must_use]
    pub fn average_size(&self) -> u64 {
        self.total_size / (self.members.len() as u64).max(1)
    }

    /// Iterates over the members in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.members.iter().map(|(item, _)| item)
    }

    /// Iterates over the members in insertion order, with their sizes.
    pub fn iter_with_size(&self) -> impl Iterator<Item = (&T, u64)> + '_ {
        self.members.iter().map(|(item, size)| (item, *size))
    }

    /// Consumes the bucket, returning its members.
    #[must_use]
    pub fn into_items(self) -> Vec<T> {
        self.members.into_iter().map(|(item, _)| item).collect()
    }

    fn accepts(&self, size: u64, options: &SizeTieredOptions) -> bool {
        let avg = self.average_size();

        #[expect(clippy::cast_precision_loss, reason = "ratios are approximate")]
        let (size_f, avg_f) = (size as f64, avg as f64);

        let similar = size_f >= avg_f * options.bucket_low && size_f <= avg_f * options.bucket_high;
        let both_small = size < options.min_sstable_size && avg < options.min_sstable_size;

        similar || both_small
    }
}

/// Groups items into buckets of similar size.
///
/// Items are scanned once, left to right. Each item joins the first bucket
/// (in creation order) whose running average accepts it, or else starts a new bucket.
/// The result therefore depends on the input order, but is deterministic for a
/// given order.
///
/// Zero-byte items are skipped.
pub fn get_buckets<T, I: IntoIterator<Item = (T, u64)>>(
    items: I,
    options: &SizeTieredOptions,
) -> Vec<Bucket<T>> {
    let mut buckets: Vec<Bucket<T>> = Vec::new();

    for (item, size) in items {
        if size == 0 {
            continue;
        }

        if let Some(bucket) = buckets.iter_mut().find(|b| b.accepts(size, options)) {
            bucket.push(item, size);
        } else {
            buckets.push(Bucket::new(item, size));
        }
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn sizes(buckets: &[Bucket<u64>]) -> Vec<Vec<u64>> {
        buckets
            .iter()
            .map(|b| b.iter_with_size().map(|(_, size)| size).collect())
            .collect()
    }

    fn pairs(input: &[u64]) -> Vec<(u64, u64)> {
        input.iter().copied().enumerate().map(|(i, s)| (i as u64, s)).collect()
    }

    #[test]
    fn bucket_outlier_is_isolated() -> crate::Result<()> {
        let options = SizeTieredOptions::new(0.5, 1.5, 0)?;
        let buckets = get_buckets(pairs(&[10, 12, 11, 1_000]), &options);

        assert_eq!(vec![vec![10, 12, 11], vec![1_000]], sizes(&buckets));
        assert_eq!(11, buckets.first().map(Bucket::average_size).unwrap_or_default());

        Ok(())
    }

    #[test]
    fn bucket_empty_input() {
        let buckets = get_buckets(Vec::<(u64, u64)>::new(), &SizeTieredOptions::default());
        assert!(buckets.is_empty());
    }

    #[test]
    fn bucket_singleton() -> crate::Result<()> {
        let options = SizeTieredOptions::new(0.5, 1.5, 0)?;
        let buckets = get_buckets(pairs(&[u64::MAX]), &options);
        assert_eq!(vec![vec![u64::MAX]], sizes(&buckets));
        Ok(())
    }

    #[test]
    fn bucket_small_tables_lumped() {
        let options = SizeTieredOptions::default();
        let mib = 1_024 * 1_024;

        // NOTE: Ratios are wildly off, but every table is below 50 MiB
        let buckets = get_buckets(pairs(&[1, mib, 40 * mib, 100, 7 * mib]), &options);
        assert_eq!(1, buckets.len());
        assert_eq!(5, buckets.first().map(Bucket::len).unwrap_or_default());
    }

    #[test]
    fn bucket_zero_byte_skipped() -> crate::Result<()> {
        let options = SizeTieredOptions::new(0.5, 1.5, 0)?;
        let buckets = get_buckets(pairs(&[0, 10, 0, 10]), &options);
        assert_eq!(vec![vec![10, 10]], sizes(&buckets));
        Ok(())
    }

    #[test]
    fn bucket_first_match_wins() -> crate::Result<()> {
        let options = SizeTieredOptions::new(0.5, 1.5, 0)?;

        // 15 fits both [5, 15] (avg 10) and [15, 45] (avg 30)
        let buckets = get_buckets(pairs(&[10, 40, 20, 15]), &options);
        assert_eq!(vec![vec![10, 15], vec![40, 20]], sizes(&buckets));

        Ok(())
    }

    #[test]
    fn bucket_range_is_inclusive() -> crate::Result<()> {
        let options = SizeTieredOptions::new(0.5, 1.5, 0)?;

        let buckets = get_buckets(pairs(&[100, 150]), &options);
        assert_eq!(1, buckets.len());

        let buckets = get_buckets(pairs(&[100, 50]), &options);
        assert_eq!(1, buckets.len());

        let buckets = get_buckets(pairs(&[100, 151]), &options);
        assert_eq!(2, buckets.len());

        Ok(())
    }

    #[test]
    fn bucket_order_sensitive_but_deterministic() -> crate::Result<()> {
        let options = SizeTieredOptions::new(0.5, 1.5, 0)?;
        let input = pairs(&[100, 140, 190, 60, 260, 35]);

        let a = get_buckets(input.clone(), &options);
        let b = get_buckets(input, &options);
        assert_eq!(a, b);

        Ok(())
    }
}
