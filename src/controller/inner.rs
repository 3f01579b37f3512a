// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    compaction::{state::TableSet, AnyStrategy, JobQueue},
    config::{StoreId, Thresholds},
    event::EventSink,
    metrics::CompactionMetrics,
    GenerationCounter,
};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, AtomicUsize},
    Arc, Mutex, RwLock,
};

pub struct ControllerInner {
    /// Store this controller is responsible for
    pub(crate) store_id: StoreId,

    /// Compaction strategy
    pub(crate) strategy: AnyStrategy,

    /// Table count bounds, can be changed at runtime
    pub(crate) thresholds: RwLock<Thresholds>,

    /// Live and in-flight tables
    ///
    /// Selection and marking tables as in-flight happen under the same lock,
    /// so two evaluations can never pick the same table.
    pub(crate) tables: Mutex<TableSet>,

    /// Whether table set changes trigger evaluation
    pub(crate) enabled: AtomicBool,

    /// Last reported pending compaction estimate
    pub(crate) last_pending: AtomicUsize,

    /// Hands out merge task IDs
    pub(crate) task_counter: AtomicU64,

    pub(crate) job_queue: Arc<dyn JobQueue>,

    pub(crate) event_sink: Arc<dyn EventSink>,

    pub(crate) metrics: Arc<CompactionMetrics>,

    /// Table generation generator, shared with merge tasks
    pub(crate) generation: GenerationCounter,
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        log::debug!("Dropping compaction controller of {}", self.store_id);
    }
}
