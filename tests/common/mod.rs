#![allow(dead_code)]

use stcs::{
    compaction::{JobQueue, MergeTask},
    event::{Event, EventKind, EventSink},
    ReadMeter, Table, TableId,
};
use std::sync::Mutex;

/// Job queue that just keeps submitted tasks around
#[derive(Default)]
pub struct CollectingQueue(Mutex<Vec<MergeTask>>);

impl JobQueue for CollectingQueue {
    fn submit(&self, task: MergeTask) {
        self.0.lock().expect("lock is poisoned").push(task);
    }
}

impl CollectingQueue {
    pub fn pop(&self) -> Option<MergeTask> {
        let mut tasks = self.0.lock().expect("lock is poisoned");
        if tasks.is_empty() {
            None
        } else {
            Some(tasks.remove(0))
        }
    }

    pub fn len(&self) -> usize {
        self.0.lock().expect("lock is poisoned").len()
    }

    /// Completes every queued task (including ones submitted while draining)
    /// with a single output table of the combined input size.
    pub fn drain_merging(&self) -> usize {
        let mut count = 0;

        while let Some(task) = self.pop() {
            let output = Table::new(task.next_table_id(), task.input_size());
            task.complete(vec![output]);
            count += 1;
        }

        count
    }
}

/// Event sink that keeps all events in memory
#[derive(Default)]
pub struct MemorySink(Mutex<Vec<Event>>);

impl EventSink for MemorySink {
    fn record(&self, event: Event) {
        self.0.lock().expect("lock is poisoned").push(event);
    }
}

impl MemorySink {
    pub fn events(&self) -> Vec<Event> {
        self.0.lock().expect("lock is poisoned").clone()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(|e| e.kind.name()).collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }

    pub fn pending(&self) -> Vec<usize> {
        self.events()
            .into_iter()
            .filter_map(|e| match e.kind {
                EventKind::Pending { pending, .. } => Some(pending),
                _ => None,
            })
            .collect()
    }
}

pub fn table_with_rate(id: TableId, size: u64, rate: f64) -> Table {
    Table::with_read_meter(id, size, ReadMeter::restored(rate, rate))
}
