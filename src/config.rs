// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    compaction::{AnyStrategy, JobQueue},
    controller::Controller,
    error::ConfigError,
    event::{EventSink, NoopSink},
    metrics::{CompactionMetrics, MetricsRegistry},
    GenerationCounter,
};
use serde::Serialize;
use std::sync::Arc;

/// Default minimum number of tables in a compaction
pub const DEFAULT_MIN_THRESHOLD: usize = 4;

/// Default maximum number of tables in a compaction
pub const DEFAULT_MAX_THRESHOLD: usize = 32;

/// Bounds on the number of tables merged by a single compaction
///
/// A bucket needs at least `min_threshold` tables to be compacted;
/// larger buckets are trimmed to `max_threshold` tables.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Thresholds {
    min_threshold: usize,
    max_threshold: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_threshold: DEFAULT_MIN_THRESHOLD,
            max_threshold: DEFAULT_MAX_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// Creates validated thresholds.
    ///
    /// # Errors
    ///
    /// Returns error unless `2 <= min_threshold <= max_threshold`.
    pub fn new(min_threshold: usize, max_threshold: usize) -> crate::Result<Self> {
        if min_threshold < 2 || max_threshold < min_threshold {
            return Err(ConfigError::InvalidThresholds {
                min: min_threshold,
                max: max_threshold,
            }
            .into());
        }

        Ok(Self {
            min_threshold,
            max_threshold,
        })
    }

    /// Minimum number of tables in a compaction.
    #[must_use]
    pub fn min_threshold(&self) -> usize {
        self.min_threshold
    }

    /// Maximum number of tables in a compaction.
    #[must_use]
    pub fn max_threshold(&self) -> usize {
        self.max_threshold
    }
}

/// Identity of the store (keyspace + table) a controller manages
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct StoreId {
    /// Keyspace name
    pub keyspace: String,

    /// Table name
    pub table: String,
}

impl StoreId {
    /// Creates a store identity.
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            keyspace: keyspace.into(),
            table: table.into(),
        }
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.keyspace, self.table)
    }
}

/// Compaction controller configuration builder
pub struct Config {
    /// Store the controller is responsible for
    pub(crate) store_id: StoreId,

    /// Compaction strategy
    pub(crate) strategy: AnyStrategy,

    /// Table count bounds of a single compaction
    pub(crate) thresholds: Thresholds,

    /// Where lifecycle, flush, compaction and pending events go
    pub(crate) event_sink: Arc<dyn EventSink>,

    /// Counters of this store
    pub(crate) metrics: Arc<CompactionMetrics>,

    /// The table generation generator
    ///
    /// Should be shared with whatever creates flushed tables
    pub(crate) generation: GenerationCounter,
}

impl Config {
    /// Initializes a new config
    pub fn new(keyspace: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            store_id: StoreId::new(keyspace, table),
            strategy: AnyStrategy::default(),
            thresholds: Thresholds::default(),
            event_sink: Arc::new(NoopSink),
            metrics: Arc::default(),
            generation: GenerationCounter::default(),
        }
    }

    /// Sets the compaction strategy.
    ///
    /// Defaults to size-tiered compaction with default options.
    #[must_use]
    pub fn strategy(mut self, strategy: impl Into<AnyStrategy>) -> Self {
        self.strategy = strategy.into();
        self
    }

    /// Sets the compaction thresholds.
    ///
    /// Default = 4 / 32
    #[must_use]
    pub fn thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Sets the event sink, e.g. a [`crate::CompactionLog`].
    ///
    /// Defaults to [`NoopSink`].
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Registers the store's counters in a shared registry.
    ///
    /// Without a registry, the counters are only reachable through [`Controller::metrics`].
    #[must_use]
    pub fn metrics(mut self, registry: &MetricsRegistry) -> Self {
        self.metrics = registry.get_or_insert(&self.store_id);
        self
    }

    /// Sets the table generation generator.
    ///
    /// Can be shared with the flush path so flushed and compacted tables draw unique IDs.
    #[must_use]
    pub fn generation(mut self, generation: GenerationCounter) -> Self {
        self.generation = generation;
        self
    }

    /// Opens a disabled controller that submits its merge jobs to `job_queue`.
    #[must_use]
    pub fn open(self, job_queue: Arc<dyn JobQueue>) -> Controller {
        Controller::create(self, job_queue)
    }
}
