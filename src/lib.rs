// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Size-tiered compaction selection for LSM-tree table sets.
//!
//! ##### NOTE
//!
//! > This crate does not read or write tables.
//! > It decides *which* tables to merge, the physical merge is plugged in
//! > through [`compaction::Merger`] or a custom [`compaction::JobQueue`].
//!
//! ##### About
//!
//! An LSM-tree flushes its write buffer into immutable, sorted tables.
//! Amassing many tables degrades read performance and wastes disk space, so tables
//! are periodically merged into larger tables in a process called `Compaction`.
//!
//! Size-tiered compaction groups tables of similar size into buckets. Once a bucket
//! holds enough tables, they are merged into one larger table, which eventually
//! joins a bucket of larger tables, and so on. Buckets whose tables are read often
//! are compacted first.
//!
//! A [`Controller`] tracks the live tables of one store, evaluates the strategy
//! whenever the table set changes and submits at most one merge job per evaluation.
//! Tables that are being merged are never selected twice.
//!
//! ```
//! use stcs::{compaction::WorkerPool, Config, Table, Thresholds};
//! # use std::sync::Arc;
//! # struct Merger;
//! # impl stcs::compaction::Merger for Merger {
//! #     fn merge(&self, task: &stcs::compaction::MergeTask) -> stcs::Result<Vec<Table>> {
//! #         Ok(vec![Table::new(task.next_table_id(), task.input_size())])
//! #     }
//! # }
//!
//! let pool = WorkerPool::new(1, Arc::new(Merger))?;
//! let controller = Config::new("keyspace", "table")
//!     .thresholds(Thresholds::new(4, 32)?)
//!     .open(Arc::new(pool));
//!
//! controller.enable();
//!
//! for _ in 0..4 {
//!     let table = Table::new(controller.next_table_id(), /* 1 MiB */ 1_024 * 1_024);
//!     controller.on_flush(vec![table]);
//! }
//! #
//! # Ok::<(), stcs::Error>(())
//! ```

#![deny(clippy::all, missing_docs, clippy::cargo)]
#![allow(clippy::cargo_common_metadata)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]
#![warn(clippy::redundant_feature_names)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

#[doc(hidden)]
pub type HashMap<K, V> = std::collections::HashMap<K, V, rustc_hash::FxBuildHasher>;

pub(crate) type HashSet<K> = std::collections::HashSet<K, rustc_hash::FxBuildHasher>;

pub mod compaction;

mod config;
mod controller;
mod error;

pub mod event;

mod generation;
mod metrics;

pub mod read_meter;

mod table;
mod time;

pub use {
    config::{Config, StoreId, Thresholds, DEFAULT_MAX_THRESHOLD, DEFAULT_MIN_THRESHOLD},
    controller::Controller,
    error::{ConfigError, Error, Result},
    event::{CompactionLog, EventSink},
    generation::GenerationCounter,
    metrics::{CompactionMetrics, MetricsRegistry},
    read_meter::{ReadMeter, Window},
    table::{Table, TableDescriptor, TableId},
    time::Timestamp,
};
