// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Contains compaction strategies

pub mod bucket;
pub mod hotness;
pub(crate) mod options;
pub(crate) mod state;
pub(crate) mod tiered;
pub(crate) mod worker;

pub use bucket::{get_buckets, Bucket};
pub use hotness::{pruned_buckets_and_hotness, trim_to_threshold_with_hotness, HotBucket};
pub use options::{
    SizeTieredOptions, BUCKET_HIGH_KEY, BUCKET_LOW_KEY, DEFAULT_BUCKET_HIGH, DEFAULT_BUCKET_LOW,
    DEFAULT_MIN_SSTABLE_SIZE, MIN_SSTABLE_SIZE_KEY,
};
pub use tiered::Strategy as SizeTiered;
pub use worker::{JobQueue, MergeTask, Merger, WorkerPool};

use crate::{config::Thresholds, Table};
use enum_dispatch::enum_dispatch;

/// Input for compactor.
///
/// The compaction strategy chooses which tables to compact.
/// That information is given to the compactor.
#[derive(Clone, Debug, PartialEq)]
pub struct Input {
    /// Tables to compact
    pub tables: Vec<Table>,

    /// Summed short-window read rate of `tables`
    pub hotness: f64,
}

/// Describes what to do (compact or not)
#[derive(Clone, Debug, PartialEq)]
pub enum Choice {
    /// Just do nothing.
    DoNothing,

    /// Compacts some tables into fewer, larger tables.
    Merge(Input),
}

/// Trait for a compaction strategy
///
/// The strategy receives the tables that are free to be compacted
/// and emits a choice on what to do.
#[enum_dispatch]
#[allow(clippy::module_name_repetitions)]
pub trait CompactionStrategy {
    /// Gets the compaction strategy name.
    fn get_name(&self) -> &'static str;

    /// Gets the short strategy identifier used in compaction events.
    fn get_id(&self) -> &'static str;

    /// Gets the strategy options as key-value pairs.
    fn get_config(&self) -> Vec<(&'static str, String)>;

    /// Groups the given tables into buckets of compaction candidates.
    fn buckets(&self, tables: &[Table]) -> Vec<Bucket<Table>>;

    /// Decides on what to do based on the given tables.
    fn choose(&self, tables: &[Table], thresholds: &Thresholds) -> Choice;

    /// Estimates how many compactions it would take to work through the given tables.
    fn estimated_pending(&self, tables: &[Table], thresholds: &Thresholds) -> usize;
}

/// May be any of the supported compaction strategies
#[derive(Clone, Debug)]
#[enum_dispatch(CompactionStrategy)]
#[non_exhaustive]
pub enum AnyStrategy {
    /// Size-tiered compaction, see [`SizeTiered`]
    SizeTiered(SizeTiered),
}

impl Default for AnyStrategy {
    fn default() -> Self {
        Self::SizeTiered(SizeTiered::default())
    }
}
