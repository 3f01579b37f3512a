// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{
    bucket::{get_buckets, Bucket},
    hotness::pruned_buckets_and_hotness,
    Choice, CompactionStrategy, Input as CompactionInput, SizeTieredOptions,
};
use crate::{config::Thresholds, Table};
use std::collections::HashMap;

#[doc(hidden)]
pub const NAME: &str = "SizeTieredCompactionStrategy";

#[doc(hidden)]
pub const ID: &str = "STCS";

/// Size-tiered compaction strategy (STCS)
///
/// Tables of similar size are grouped into buckets. Once a bucket holds
/// `min_threshold` tables, up to `max_threshold` of them are merged into a larger table.
/// If multiple buckets qualify, the one whose tables are read most often is compacted first.
///
/// STCS suffers from high read and temporary doubled space amplification, but has good write amplification.
#[derive(Clone, Debug, Default)]
pub struct Strategy {
    options: SizeTieredOptions,
}

impl Strategy {
    /// Creates a new STCS strategy
    #[must_use]
    pub fn new(options: SizeTieredOptions) -> Self {
        Self { options }
    }

    /// Creates a new STCS strategy from string options,
    /// see [`SizeTieredOptions::from_options`].
    ///
    /// # Errors
    ///
    /// Returns error if the options are invalid.
    pub fn from_options<S: std::hash::BuildHasher>(
        options: &HashMap<String, String, S>,
    ) -> crate::Result<Self> {
        Ok(Self::new(SizeTieredOptions::from_options(options)?))
    }

    /// Bucketing options.
    #[must_use]
    pub fn options(&self) -> &SizeTieredOptions {
        &self.options
    }
}

impl CompactionStrategy for Strategy {
    fn get_name(&self) -> &'static str {
        NAME
    }

    fn get_id(&self) -> &'static str {
        ID
    }

    fn get_config(&self) -> Vec<(&'static str, String)> {
        self.options.to_options()
    }

    fn buckets(&self, tables: &[Table]) -> Vec<Bucket<Table>> {
        get_buckets(
            tables.iter().map(|t| (t.clone(), t.size_on_disk())),
            &self.options,
        )
    }

    fn choose(&self, tables: &[Table], thresholds: &Thresholds) -> Choice {
        let buckets = self.buckets(tables);

        log::trace!(
            "tiered: {} tables in {} buckets",
            tables.len(),
            buckets.len(),
        );

        let mut ranked =
            pruned_buckets_and_hotness(buckets, thresholds.min_threshold(), thresholds.max_threshold());

        if ranked.is_empty() {
            return Choice::DoNothing;
        }

        // NOTE: Only compact the hottest bucket per pass, the next
        // table set change will pick up the next bucket
        let top = ranked.swap_remove(0);

        Choice::Merge(CompactionInput {
            tables: top.tables,
            hotness: top.hotness,
        })
    }

    fn estimated_pending(&self, tables: &[Table], thresholds: &Thresholds) -> usize {
        let max = thresholds.max_threshold().max(1);

        self.buckets(tables)
            .iter()
            .filter(|bucket| bucket.len() >= thresholds.min_threshold())
            .map(|bucket| bucket.len().div_ceil(max))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::Strategy;
    use crate::{
        compaction::{Choice, CompactionStrategy, SizeTieredOptions},
        config::Thresholds,
        read_meter::ReadMeter,
        Table, TableId,
    };
    use std::collections::HashMap;
    use test_log::test;

    const MIB: u64 = 1_024 * 1_024;

    fn fixture_table(id: TableId, size_mib: u64) -> Table {
        Table::new(id, size_mib * MIB)
    }

    fn fixture_hot_table(id: TableId, size_mib: u64, rate: f64) -> Table {
        Table::with_read_meter(id, size_mib * MIB, ReadMeter::restored(rate, rate))
    }

    fn chosen_ids(choice: &Choice) -> Vec<TableId> {
        match choice {
            Choice::Merge(input) => {
                let mut ids = input.tables.iter().map(Table::id).collect::<Vec<_>>();
                ids.sort_unstable();
                ids
            }
            Choice::DoNothing => vec![],
        }
    }

    #[test]
    fn tiered_empty() {
        let compactor = Strategy::default();
        assert_eq!(
            Choice::DoNothing,
            compactor.choose(&[], &Thresholds::default())
        );
        assert_eq!(0, compactor.estimated_pending(&[], &Thresholds::default()));
    }

    #[test]
    fn tiered_below_min_threshold() {
        let compactor = Strategy::default();
        let tables = (0..3).map(|id| fixture_table(id, 8)).collect::<Vec<_>>();

        assert_eq!(
            Choice::DoNothing,
            compactor.choose(&tables, &Thresholds::default())
        );
    }

    #[test]
    fn tiered_reached_min_threshold() {
        let compactor = Strategy::default();
        let tables = (0..4).map(|id| fixture_table(id, 8)).collect::<Vec<_>>();

        let choice = compactor.choose(&tables, &Thresholds::default());
        assert_eq!(vec![0, 1, 2, 3], chosen_ids(&choice));
    }

    #[test]
    fn tiered_prefers_hot_bucket() -> crate::Result<()> {
        let compactor = Strategy::new(SizeTieredOptions::new(0.5, 1.5, 0)?);

        let mut tables = (0..6).map(|id| fixture_table(id, 8)).collect::<Vec<_>>();
        tables.extend((10..14).map(|id| fixture_hot_table(id, 512, 1.5)));

        let choice = compactor.choose(&tables, &Thresholds::default());
        assert_eq!(vec![10, 11, 12, 13], chosen_ids(&choice));

        assert_eq!(2, compactor.estimated_pending(&tables, &Thresholds::default()));

        Ok(())
    }

    #[test]
    fn tiered_trims_to_max_threshold() -> crate::Result<()> {
        let compactor = Strategy::default();
        let thresholds = Thresholds::new(2, 4)?;

        let mut tables = (0..8).map(|id| fixture_table(id, 1)).collect::<Vec<_>>();
        tables.push(fixture_hot_table(100, 1, 9.0));

        let Choice::Merge(input) = compactor.choose(&tables, &thresholds) else {
            panic!("should compact");
        };

        assert_eq!(4, input.tables.len());
        assert_eq!(Some(100), input.tables.first().map(Table::id));
        assert!((input.hotness - 9.0).abs() < 1e-6);

        // 9 tables in one bucket, 4 per compaction
        assert_eq!(3, compactor.estimated_pending(&tables, &thresholds));

        Ok(())
    }

    #[test]
    fn tiered_from_options() -> crate::Result<()> {
        let mut options = HashMap::new();
        options.insert("bucket_high".to_string(), "2.0".to_string());

        let compactor = Strategy::from_options(&options)?;
        assert!((compactor.options().bucket_high() - 2.0).abs() < f64::EPSILON);
        assert_eq!("STCS", compactor.get_id());

        options.insert("bucket_width".to_string(), "2.0".to_string());
        assert!(matches!(
            Strategy::from_options(&options),
            Err(crate::Error::Config(_))
        ));

        Ok(())
    }
}
