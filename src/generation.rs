// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::TableId;
use std::sync::{
    atomic::{
        AtomicU64,
        Ordering::{AcqRel, Acquire},
    },
    Arc,
};

/// Thread-safe table generation generator
///
/// Flushes and merge outputs of the same store should draw their
/// table IDs from the same counter, so IDs stay unique and increase
/// monotonically.
///
/// # Examples
///
/// ```
/// # use stcs::GenerationCounter;
/// let generation = GenerationCounter::default();
///
/// assert_eq!(0, generation.next());
/// assert_eq!(1, generation.next());
/// assert_eq!(2, generation.get());
/// ```
#[derive(Clone, Default, Debug)]
pub struct GenerationCounter(Arc<AtomicU64>);

impl GenerationCounter {
    /// Creates a new counter, setting it to some previous value
    #[must_use]
    pub fn new(prev: TableId) -> Self {
        Self(Arc::new(AtomicU64::new(prev)))
    }

    /// Gets the would-be-next generation, without incrementing the counter.
    #[must_use]
    pub fn get(&self) -> TableId {
        self.0.load(Acquire)
    }

    /// Gets the next generation.
    #[must_use]
    pub fn next(&self) -> TableId {
        self.0.fetch_add(1, AcqRel)
    }

    /// Maximizes the generation.
    ///
    /// Used after recovering tables whose IDs were handed out by a previous process.
    pub fn fetch_max(&self, generation: TableId) {
        self.0.fetch_max(generation, AcqRel);
    }
}
