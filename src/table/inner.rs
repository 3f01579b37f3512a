// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{read_meter::ReadMeter, TableId};
use std::sync::atomic::AtomicBool;

pub struct Inner {
    /// Table generation
    pub(crate) id: TableId,

    /// On-disk size in bytes, measured when the table was opened
    pub(crate) size_on_disk: u64,

    /// Unix timestamp (nanoseconds) of table creation
    pub(crate) created_at: u128,

    /// Read activity of this table
    pub(crate) read_meter: ReadMeter,

    /// True when the table was compacted away or dropped
    ///
    /// May be kept alive until all handles to the table have been dropped
    pub(crate) is_retired: AtomicBool,
}
