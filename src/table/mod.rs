// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod inner;

use crate::{
    read_meter::{ReadMeter, Window},
    time::unix_timestamp,
};
use inner::Inner;
use serde::Serialize;
use std::sync::{atomic::AtomicBool, Arc};

/// Unique table ID (generation number)
///
/// Table IDs are monotonically increasing integers.
pub type TableId = u64;

/// Read-only view of an on-disk table (a.k.a. `SSTable`, `sorted string table`)
///
/// A table is an immutable sorted file; only its identity, size and
/// read activity matter for compaction selection.
///
/// Cloning a table is cheap and yields a handle to the same table.
#[doc(alias("sstable", "sst", "sorted string table"))]
#[derive(Clone)]
pub struct Table(Arc<Inner>);

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Table:{}({}B)", self.id(), self.size_on_disk())
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Table {}

impl std::hash::Hash for Table {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl Table {
    /// Creates a table view with a fresh read meter.
    #[must_use]
    pub fn new(id: TableId, size_on_disk: u64) -> Self {
        Self::with_read_meter(id, size_on_disk, ReadMeter::new())
    }

    /// Creates a table view with a given (e.g. restored) read meter.
    #[must_use]
    pub fn with_read_meter(id: TableId, size_on_disk: u64, read_meter: ReadMeter) -> Self {
        Self(Arc::new(Inner {
            id,
            size_on_disk,
            created_at: unix_timestamp().as_nanos(),
            read_meter,
            is_retired: AtomicBool::default(),
        }))
    }

    /// Table generation.
    #[must_use]
    pub fn id(&self) -> TableId {
        self.0.id
    }

    /// On-disk size in bytes.
    #[must_use]
    pub fn size_on_disk(&self) -> u64 {
        self.0.size_on_disk
    }

    /// Unix timestamp (nanoseconds) of when this view was created.
    #[must_use]
    pub fn created_at(&self) -> u128 {
        self.0.created_at
    }

    /// Read-rate meter of this table.
    #[must_use]
    pub fn read_meter(&self) -> &ReadMeter {
        &self.0.read_meter
    }

    /// Records a read of this table.
    pub fn mark_read(&self) {
        self.0.read_meter.mark();
    }

    /// Short-window read rate, which is what compaction uses as hotness.
    #[must_use]
    pub fn hotness(&self) -> f64 {
        self.0.read_meter.rate(Window::Short)
    }

    /// Returns `true` once the table was compacted away.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.0.is_retired.load(std::sync::atomic::Ordering::Acquire)
    }

    pub(crate) fn mark_as_retired(&self) {
        self.0
            .is_retired
            .store(true, std::sync::atomic::Ordering::Release);
    }

    /// Descriptor used in compaction events.
    #[must_use]
    pub fn descriptor(&self) -> TableDescriptor {
        TableDescriptor {
            generation: self.id(),
            size: self.size_on_disk(),
        }
    }
}

/// Serializable identity of a table
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    /// Table generation
    pub generation: TableId,

    /// On-disk size in bytes
    pub size: u64,
}
