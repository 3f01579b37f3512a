// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    controller::{inner::ControllerInner, Controller},
    time::Timestamp,
    GenerationCounter, Table, TableId,
};
use std::{
    sync::{Arc, Weak},
    thread::JoinHandle,
};

/// A merge job, handed to a [`JobQueue`] by the controller
///
/// The task must be resolved exactly once, using [`MergeTask::complete`] or
/// [`MergeTask::fail`]. A task that is dropped without being resolved
/// fails with [`crate::Error::Cancelled`], returning its input tables
/// to the candidate pool.
pub struct MergeTask {
    id: u64,
    tables: Vec<Table>,
    hotness: f64,
    started_at: Timestamp,
    generation: GenerationCounter,
    controller: Option<Weak<ControllerInner>>,
}

impl std::fmt::Debug for MergeTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MergeTask#{}({:?}, hotness={:.3})",
            self.id, self.tables, self.hotness,
        )
    }
}

impl MergeTask {
    pub(crate) fn new(
        id: u64,
        tables: Vec<Table>,
        hotness: f64,
        generation: GenerationCounter,
        controller: Weak<ControllerInner>,
    ) -> Self {
        Self {
            id,
            tables,
            hotness,
            started_at: Timestamp::now(),
            generation,
            controller: Some(controller),
        }
    }

    /// Task ID, unique per controller.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Tables to merge.
    #[must_use]
    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Summed short-window read rate of the input tables at selection time.
    #[must_use]
    pub fn hotness(&self) -> f64 {
        self.hotness
    }

    /// Total on-disk size of the input tables.
    #[must_use]
    pub fn input_size(&self) -> u64 {
        self.tables.iter().map(Table::size_on_disk).sum()
    }

    /// When the task was submitted.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Draws a new table ID for an output table.
    #[must_use]
    pub fn next_table_id(&self) -> TableId {
        self.generation.next()
    }

    fn take_controller(&mut self) -> Option<Controller> {
        self.controller
            .take()
            .and_then(|weak| weak.upgrade())
            .map(Controller::from_inner)
    }

    /// Reports a successful merge; `outputs` replace the input tables.
    pub fn complete(mut self, outputs: Vec<Table>) {
        let tables = std::mem::take(&mut self.tables);

        let Some(controller) = self.take_controller() else {
            log::debug!("compactor: task #{} completed after controller was dropped", self.id);
            return;
        };

        controller.on_compaction_complete(self.started_at, &tables, Timestamp::now(), outputs);
    }

    /// Reports a failed merge; the input tables become candidates again.
    pub fn fail(mut self, error: crate::Error) {
        let tables = std::mem::take(&mut self.tables);

        let Some(controller) = self.take_controller() else {
            log::debug!("compactor: task #{} failed after controller was dropped", self.id);
            return;
        };

        controller.on_compaction_failed(&tables, &error);
    }
}

impl Drop for MergeTask {
    fn drop(&mut self) {
        let Some(controller) = self.take_controller() else {
            return;
        };

        log::warn!("compactor: task #{} was dropped without being resolved", self.id);

        let tables = std::mem::take(&mut self.tables);
        controller.on_compaction_failed(&tables, &crate::Error::Cancelled);
    }
}

/// Receives merge jobs from a controller
///
/// Submission must not block.
pub trait JobQueue: Send + Sync {
    /// Hands a merge job to the executor.
    fn submit(&self, task: MergeTask);
}

/// Performs the physical merge of a [`MergeTask`]
pub trait Merger: Send + Sync {
    /// Merges the task's tables, returning the output tables.
    ///
    /// Output tables should draw their IDs from [`MergeTask::next_table_id`].
    ///
    /// # Errors
    ///
    /// Returns error if the merge failed.
    fn merge(&self, task: &MergeTask) -> crate::Result<Vec<Table>>;
}

/// Runs merge jobs on a fixed number of threads
///
/// Jobs are queued in an unbounded channel, so submitting never blocks.
/// Dropping the pool waits for queued jobs to finish.
pub struct WorkerPool {
    sender: Option<flume::Sender<MergeTask>>,
    threads: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `thread_count` (at least 1) worker threads running `merger`.
    ///
    /// # Errors
    ///
    /// Returns error if a thread could not be spawned.
    pub fn new(thread_count: usize, merger: Arc<dyn Merger>) -> crate::Result<Self> {
        let (sender, receiver) = flume::unbounded::<MergeTask>();

        let threads = (0..thread_count.max(1))
            .map(|idx| {
                let receiver = receiver.clone();
                let merger = merger.clone();

                std::thread::Builder::new()
                    .name(format!("compaction-{idx}"))
                    .spawn(move || {
                        while let Ok(task) = receiver.recv() {
                            log::trace!("compactor: worker {idx} picked up {task:?}");

                            match merger.merge(&task) {
                                Ok(outputs) => task.complete(outputs),
                                Err(e) => task.fail(e),
                            }
                        }
                    })
            })
            .collect::<std::io::Result<Vec<_>>>()?;

        Ok(Self {
            sender: Some(sender),
            threads,
        })
    }

    /// Number of queued, not yet started jobs.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, flume::Sender::len)
    }
}

impl JobQueue for WorkerPool {
    fn submit(&self, task: MergeTask) {
        let Some(sender) = &self.sender else {
            return;
        };

        // NOTE: If all workers are gone, dropping the task cancels it
        if let Err(e) = sender.send(task) {
            log::error!("compactor: worker pool is shut down, cancelling {:?}", e.0);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.sender.take();

        let current = std::thread::current().id();

        for thread in self.threads.drain(..) {
            // NOTE: The pool may be dropped by one of its own workers
            // (when that worker holds the last controller handle)
            if thread.thread().id() == current {
                continue;
            }

            if thread.join().is_err() {
                log::error!("compactor: worker thread panicked");
            }
        }
    }
}
