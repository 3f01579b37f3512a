// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::config::StoreId;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering::Relaxed},
    Arc, Mutex,
};

/// Compaction counters of a single store
#[derive(Debug, Default)]
pub struct CompactionMetrics {
    /// Number of flush notifications
    pub(crate) flushes: AtomicUsize,

    /// Number of tables admitted through flushes
    pub(crate) tables_flushed: AtomicUsize,

    /// Number of merge jobs handed to the job queue
    pub(crate) submitted: AtomicUsize,

    /// Number of merge jobs that completed
    pub(crate) completed: AtomicUsize,

    /// Number of merge jobs that failed or were cancelled
    pub(crate) failed: AtomicUsize,

    /// Bytes read by completed merges
    pub(crate) bytes_in: AtomicU64,

    /// Bytes written by completed merges
    pub(crate) bytes_out: AtomicU64,

    /// Last pending compaction estimate
    pub(crate) pending: AtomicUsize,
}

impl CompactionMetrics {
    /// Number of flush notifications.
    pub fn flushes(&self) -> usize {
        self.flushes.load(Relaxed)
    }

    /// Number of tables admitted through flushes.
    pub fn tables_flushed(&self) -> usize {
        self.tables_flushed.load(Relaxed)
    }

    /// Number of merge jobs that were submitted.
    pub fn submitted(&self) -> usize {
        self.submitted.load(Relaxed)
    }

    /// Number of merge jobs that completed.
    pub fn completed(&self) -> usize {
        self.completed.load(Relaxed)
    }

    /// Number of merge jobs that failed.
    pub fn failed(&self) -> usize {
        self.failed.load(Relaxed)
    }

    /// Number of merge jobs that are neither completed nor failed.
    pub fn running(&self) -> usize {
        self.submitted()
            .saturating_sub(self.completed())
            .saturating_sub(self.failed())
    }

    /// Bytes read by completed merges.
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in.load(Relaxed)
    }

    /// Bytes written by completed merges.
    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.load(Relaxed)
    }

    /// Last pending compaction estimate.
    pub fn pending(&self) -> usize {
        self.pending.load(Relaxed)
    }

    /// Write amplification of compactions so far (bytes written per byte read).
    #[allow(clippy::cast_precision_loss)]
    pub fn write_amplification(&self) -> f64 {
        let bytes_in = self.bytes_in();

        if bytes_in == 0 {
            return 0.0;
        }

        self.bytes_out() as f64 / bytes_in as f64
    }
}

/// Holds the counters of many stores
///
/// Cloning the registry is cheap; clones share the same counters.
#[derive(Clone, Debug, Default)]
pub struct MetricsRegistry(Arc<Mutex<crate::HashMap<StoreId, Arc<CompactionMetrics>>>>);

impl MetricsRegistry {
    /// Returns the counters of a store, registering them if absent.
    #[must_use]
    pub fn get_or_insert(&self, store_id: &StoreId) -> Arc<CompactionMetrics> {
        let mut map = self.0.lock().expect("lock is poisoned");

        map.entry(store_id.clone()).or_default().clone()
    }

    /// Returns the counters of a store, if registered.
    #[must_use]
    pub fn get(&self, store_id: &StoreId) -> Option<Arc<CompactionMetrics>> {
        self.0.lock().expect("lock is poisoned").get(store_id).cloned()
    }

    /// Every registered store, sorted by identity.
    #[must_use]
    pub fn stores(&self) -> Vec<StoreId> {
        let mut stores = self
            .0
            .lock()
            .expect("lock is poisoned")
            .keys()
            .cloned()
            .collect::<Vec<_>>();

        stores.sort_by(|a, b| (&a.keyspace, &a.table).cmp(&(&b.keyspace, &b.table)));
        stores
    }
}
