// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Structured compaction events and where they go

mod file;

pub use file::{CompactionLog, LOG_FILE_NAME};

use crate::{config::StoreId, time::Timestamp, TableDescriptor, TableId};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Something that happened to a store's compaction state
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    /// Store the event belongs to
    #[serde(flatten)]
    pub store: StoreId,

    /// What happened
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Event payload
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    /// Compaction was enabled
    Enable {
        /// Current state of every strategy
        strategies: Vec<StrategyState>,
    },

    /// Compaction was disabled
    Disable {
        /// Strategies that were active
        strategies: Vec<StrategyRef>,
    },

    /// Tables were flushed
    Flush {
        /// Flushed tables
        tables: Vec<TableEntry>,
    },

    /// A compaction finished
    Compaction {
        /// When the merge job was submitted
        #[serde(serialize_with = "rfc3339")]
        start: Timestamp,

        /// When the merge job completed
        #[serde(serialize_with = "rfc3339")]
        end: Timestamp,

        /// Merged tables
        input: Vec<TableEntry>,

        /// Tables written by the merge
        output: Vec<TableEntry>,
    },

    /// Estimated number of compactions that are still needed
    Pending {
        /// Strategy ID
        strategy: &'static str,

        /// Estimated remaining compactions
        pending: usize,
    },
}

impl EventKind {
    /// Event type as it appears in the log.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Enable { .. } => "enable",
            Self::Disable { .. } => "disable",
            Self::Flush { .. } => "flush",
            Self::Compaction { .. } => "compaction",
            Self::Pending { .. } => "pending",
        }
    }
}

/// Strategy description carried by the enable event
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StrategyState {
    /// Short strategy ID, e.g. `STCS`
    pub id: &'static str,

    /// Strategy name
    #[serde(rename = "type")]
    pub name: &'static str,

    /// Live tables
    pub tables: Vec<TableDescriptor>,

    /// Current bucket composition (table generations)
    pub buckets: Vec<Vec<TableId>>,

    /// Strategy options
    pub options: BTreeMap<&'static str, String>,
}

/// Strategy reference carried by the disable event
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StrategyRef {
    /// Short strategy ID
    pub id: &'static str,
}

/// Table, tagged with the strategy that is responsible for it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TableEntry {
    /// Short strategy ID
    pub id: &'static str,

    /// The table
    pub table: TableDescriptor,
}

#[expect(clippy::trivially_copy_pass_by_ref, reason = "serde signature")]
fn rfc3339<S: Serializer>(ts: &Timestamp, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339())
}

/// Receives compaction events
///
/// `record` is called from the compaction path, so it must not block.
pub trait EventSink: Send + Sync {
    /// Records an event.
    fn record(&self, event: Event);
}

/// Discards all events
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _: Event) {}
}
