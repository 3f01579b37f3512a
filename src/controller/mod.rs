// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub(crate) mod inner;

use crate::{
    compaction::{
        state::TableSet, AnyStrategy, Bucket, Choice, CompactionStrategy, JobQueue, MergeTask,
    },
    config::{Config, StoreId, Thresholds},
    event::{Event, EventKind, StrategyRef, StrategyState, TableEntry},
    metrics::CompactionMetrics,
    time::Timestamp,
    GenerationCounter, Table, TableId,
};
use inner::ControllerInner;
use std::sync::{
    atomic::{
        AtomicBool, AtomicU64, AtomicUsize,
        Ordering::{AcqRel, Acquire, Relaxed},
    },
    Arc, Mutex, RwLock,
};

/// Decides which tables of a store get compacted, and when
///
/// The controller tracks the store's live tables. While enabled, every change
/// to the table set (flush, merge completion) triggers an evaluation pass
/// which submits at most one merge job to the job queue.
///
/// Tables of a submitted job are in-flight until the job completes or fails,
/// and are never selected again in the meantime.
///
/// Cloning a controller is cheap and yields a handle to the same controller.
#[derive(Clone)]
pub struct Controller(Arc<ControllerInner>);

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Controller({})", self.0.store_id)
    }
}

impl Controller {
    pub(crate) fn create(config: Config, job_queue: Arc<dyn JobQueue>) -> Self {
        log::debug!(
            "Opening compaction controller of {} using {}",
            config.store_id,
            config.strategy.get_name(),
        );

        Self(Arc::new(ControllerInner {
            store_id: config.store_id,
            strategy: config.strategy,
            thresholds: RwLock::new(config.thresholds),
            tables: Mutex::new(TableSet::default()),
            enabled: AtomicBool::default(),
            last_pending: AtomicUsize::default(),
            task_counter: AtomicU64::default(),
            job_queue,
            event_sink: config.event_sink,
            metrics: config.metrics,
            generation: config.generation,
        }))
    }

    pub(crate) fn from_inner(inner: Arc<ControllerInner>) -> Self {
        Self(inner)
    }

    /// Store this controller is responsible for.
    #[must_use]
    pub fn store_id(&self) -> &StoreId {
        &self.0.store_id
    }

    /// Compaction strategy.
    #[must_use]
    pub fn strategy(&self) -> &AnyStrategy {
        &self.0.strategy
    }

    /// Counters of this store.
    #[must_use]
    pub fn metrics(&self) -> &Arc<CompactionMetrics> {
        &self.0.metrics
    }

    /// Table generation generator of this store.
    #[must_use]
    pub fn generation(&self) -> &GenerationCounter {
        &self.0.generation
    }

    /// Draws a new table ID.
    #[must_use]
    pub fn next_table_id(&self) -> TableId {
        self.0.generation.next()
    }

    /// Returns `true` if automatic compaction is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.0.enabled.load(Acquire)
    }

    /// Enables automatic compaction and runs an evaluation pass.
    ///
    /// Returns `false` if compaction was already enabled, in which case
    /// nothing happens.
    pub fn enable(&self) -> bool {
        if self
            .0
            .enabled
            .compare_exchange(false, true, AcqRel, Acquire)
            .is_err()
        {
            return false;
        }

        log::debug!("compactor: enabled compaction of {}", self.0.store_id);

        self.record(EventKind::Enable {
            strategies: vec![self.strategy_state()],
        });

        self.maybe_compact();

        true
    }

    /// Disables automatic compaction.
    ///
    /// Running merge jobs are not cancelled, and table set changes are still tracked.
    ///
    /// Returns `false` if compaction was already disabled.
    pub fn disable(&self) -> bool {
        if self
            .0
            .enabled
            .compare_exchange(true, false, AcqRel, Acquire)
            .is_err()
        {
            return false;
        }

        log::debug!("compactor: disabled compaction of {}", self.0.store_id);

        self.record(EventKind::Disable {
            strategies: vec![StrategyRef {
                id: self.0.strategy.get_id(),
            }],
        });

        true
    }

    /// Current compaction thresholds.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        *self.0.thresholds.read().expect("lock is poisoned")
    }

    /// Changes the compaction thresholds; they apply to the next evaluation pass.
    pub fn set_thresholds(&self, thresholds: Thresholds) {
        log::debug!(
            "compactor: thresholds of {} are now {}/{}",
            self.0.store_id,
            thresholds.min_threshold(),
            thresholds.max_threshold(),
        );
        *self.0.thresholds.write().expect("lock is poisoned") = thresholds;
    }

    /// Number of live tables, including in-flight ones.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.0.tables.lock().expect("lock is poisoned").len()
    }

    /// Number of tables that are part of a running merge job.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.0
            .tables
            .lock()
            .expect("lock is poisoned")
            .in_flight_count()
    }

    /// Live tables, ordered by ID.
    #[must_use]
    pub fn live_tables(&self) -> Vec<Table> {
        self.0.tables.lock().expect("lock is poisoned").snapshot()
    }

    /// Current bucket composition of the tables that are not in-flight.
    #[must_use]
    pub fn buckets(&self) -> Vec<Bucket<Table>> {
        let candidates = self.candidates();
        self.0.strategy.buckets(&candidates)
    }

    /// Estimated number of compactions needed to work through the tables
    /// that are not in-flight.
    #[must_use]
    pub fn estimate_pending_compactions(&self) -> usize {
        let thresholds = self.thresholds();
        let candidates = self.candidates();
        self.0.strategy.estimated_pending(&candidates, &thresholds)
    }

    /// Admits freshly flushed tables.
    ///
    /// Zero-byte tables are ignored. If enabled, emits a flush event and
    /// runs an evaluation pass.
    pub fn on_flush(&self, tables: Vec<Table>) {
        let mut admitted = Vec::with_capacity(tables.len());

        {
            let mut set = self.0.tables.lock().expect("lock is poisoned");

            for table in tables {
                if table.size_on_disk() == 0 {
                    log::debug!("compactor: ignoring empty flushed table {table:?}");
                    continue;
                }

                if set.admit(table.clone()) {
                    admitted.push(table);
                } else {
                    log::warn!("compactor: table {table:?} is already live");
                }
            }
        }

        if admitted.is_empty() {
            return;
        }

        self.0.metrics.flushes.fetch_add(1, Relaxed);
        self.0
            .metrics
            .tables_flushed
            .fetch_add(admitted.len(), Relaxed);

        log::trace!(
            "compactor: {} flushed {} tables",
            self.0.store_id,
            admitted.len(),
        );

        if self.is_enabled() {
            self.record(EventKind::Flush {
                tables: self.entries(&admitted),
            });

            self.maybe_compact();
        }
    }

    /// Replaces the inputs of a finished merge job with its outputs.
    ///
    /// Normally called through [`MergeTask::complete`]. If enabled, emits a
    /// compaction event and runs an evaluation pass.
    pub fn on_compaction_complete(
        &self,
        started_at: Timestamp,
        inputs: &[Table],
        ended_at: Timestamp,
        outputs: Vec<Table>,
    ) {
        let outputs = outputs
            .into_iter()
            .filter(|table| {
                let keep = table.size_on_disk() > 0;
                if !keep {
                    log::debug!("compactor: ignoring empty merge output {table:?}");
                }
                keep
            })
            .collect::<Vec<_>>();

        let retired = {
            let mut set = self.0.tables.lock().expect("lock is poisoned");
            let retired = set.retire(inputs);

            for table in &outputs {
                if !set.admit(table.clone()) {
                    log::warn!("compactor: merge output {table:?} is already live");
                }
            }

            retired
        };

        let bytes_in = inputs.iter().map(Table::size_on_disk).sum::<u64>();
        let bytes_out = outputs.iter().map(Table::size_on_disk).sum::<u64>();

        let metrics = &self.0.metrics;
        metrics.completed.fetch_add(1, Relaxed);
        metrics.bytes_in.fetch_add(bytes_in, Relaxed);
        metrics.bytes_out.fetch_add(bytes_out, Relaxed);

        log::debug!(
            "compactor: {} merged {retired} tables ({bytes_in}B) into {} tables ({bytes_out}B) in {}ms",
            self.0.store_id,
            outputs.len(),
            ended_at.as_millis().saturating_sub(started_at.as_millis()),
        );

        if self.is_enabled() {
            self.record(EventKind::Compaction {
                start: started_at,
                end: ended_at,
                input: self.entries(inputs),
                output: self.entries(&outputs),
            });

            self.maybe_compact();
        }
    }

    /// Returns the inputs of a failed merge job to the candidate pool.
    ///
    /// Normally called through [`MergeTask::fail`]. Failed jobs are not
    /// retried; the next table set change triggers a new evaluation.
    pub fn on_compaction_failed(&self, inputs: &[Table], error: &crate::Error) {
        self.0
            .tables
            .lock()
            .expect("lock is poisoned")
            .show(inputs);

        self.0.metrics.failed.fetch_add(1, Relaxed);

        log::error!(
            "compactor: compaction of {} tables of {} failed: {error}",
            inputs.len(),
            self.0.store_id,
        );
    }

    /// Runs an evaluation pass, submitting at most one merge job.
    ///
    /// Returns `true` if a job was submitted. Does nothing if disabled.
    pub fn maybe_compact(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let thresholds = self.thresholds();

        log::trace!("compactor: acquiring table set lock");
        let mut set = self.0.tables.lock().expect("lock is poisoned");

        log::trace!("compactor: consulting compaction strategy");
        let choice = self.0.strategy.choose(&set.candidates(), &thresholds);

        let input = match choice {
            Choice::Merge(input) => {
                if set.hide(&input.tables) {
                    // NOTE: Counted under the lock, so hidden tables always show up as running
                    self.0.metrics.submitted.fetch_add(1, Relaxed);
                    Some(input)
                } else {
                    log::warn!("compactor: strategy chose in-flight tables {:?}", input.tables);
                    None
                }
            }
            Choice::DoNothing => None,
        };

        let pending = self
            .0
            .strategy
            .estimated_pending(&set.candidates(), &thresholds);

        // Swapped under the lock, so the last report always matches the last pass
        self.0.metrics.pending.store(pending, Relaxed);
        let previous = self.0.last_pending.swap(pending, AcqRel);

        drop(set);

        self.report_pending(pending, previous);

        let Some(input) = input else {
            log::trace!("compactor: chose to do nothing");
            return false;
        };

        let task = MergeTask::new(
            self.0.task_counter.fetch_add(1, Relaxed),
            input.tables,
            input.hotness,
            self.0.generation.clone(),
            Arc::downgrade(&self.0),
        );

        log::debug!("compactor: submitting {task:?}");

        self.0.job_queue.submit(task);

        true
    }

    fn report_pending(&self, pending: usize, previous: usize) {
        if pending > 0 || previous > 0 {
            self.record(EventKind::Pending {
                strategy: self.0.strategy.get_id(),
                pending,
            });
        }
    }

    fn candidates(&self) -> Vec<Table> {
        self.0.tables.lock().expect("lock is poisoned").candidates()
    }

    fn strategy_state(&self) -> StrategyState {
        let strategy = &self.0.strategy;

        StrategyState {
            id: strategy.get_id(),
            name: strategy.get_name(),
            tables: self.live_tables().iter().map(Table::descriptor).collect(),
            buckets: self
                .buckets()
                .iter()
                .map(|bucket| bucket.iter().map(Table::id).collect())
                .collect(),
            options: strategy.get_config().into_iter().collect(),
        }
    }

    fn entries(&self, tables: &[Table]) -> Vec<TableEntry> {
        let id = self.0.strategy.get_id();

        tables
            .iter()
            .map(|table| TableEntry {
                id,
                table: table.descriptor(),
            })
            .collect()
    }

    fn record(&self, kind: EventKind) {
        self.0.event_sink.record(Event {
            store: self.0.store_id.clone(),
            kind,
        });
    }
}
