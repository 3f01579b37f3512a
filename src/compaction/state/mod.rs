// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

pub mod hidden_set;

use crate::{Table, TableId};
use hidden_set::HiddenSet;

/// Live tables of a store, plus the ones that are currently being compacted
#[derive(Debug, Default)]
pub struct TableSet {
    /// Every live table, including in-flight ones.
    live: crate::HashMap<TableId, Table>,

    /// Set of table IDs that are masked.
    ///
    /// While consuming tables (because of compaction) they will not appear in the list of
    /// candidates as to not cause conflicts between compactions (compacting the same tables).
    hidden_set: HiddenSet,
}

impl TableSet {
    /// Adds a table; returns `false` if a table with that ID is already live.
    pub fn admit(&mut self, table: Table) -> bool {
        if self.live.contains_key(&table.id()) {
            return false;
        }
        self.live.insert(table.id(), table);
        true
    }

    /// Removes tables from the live set (and the hidden set), marking them retired.
    pub fn retire<'a, T: IntoIterator<Item = &'a Table>>(&mut self, tables: T) -> usize {
        let mut removed = 0;

        for table in tables {
            self.hidden_set.show([table.id()]);

            if let Some(table) = self.live.remove(&table.id()) {
                table.mark_as_retired();
                removed += 1;
            }
        }

        removed
    }

    /// Compaction candidates: live, non-hidden, non-empty tables, ordered by (size, ID).
    pub fn candidates(&self) -> Vec<Table> {
        let mut tables = self
            .live
            .values()
            .filter(|t| t.size_on_disk() > 0)
            .filter(|t| !self.hidden_set.is_hidden(t.id()))
            .cloned()
            .collect::<Vec<_>>();

        tables.sort_by_key(|t| (t.size_on_disk(), t.id()));
        tables
    }

    /// Marks tables as in-flight.
    ///
    /// Returns `false` (and hides nothing) if any of them is already hidden.
    pub fn hide(&mut self, tables: &[Table]) -> bool {
        if self.hidden_set.is_blocked(tables.iter().map(Table::id)) {
            return false;
        }
        self.hidden_set.hide(tables.iter().map(Table::id));
        true
    }

    /// Returns in-flight tables to the candidate pool.
    pub fn show(&mut self, tables: &[Table]) {
        self.hidden_set.show(tables.iter().map(Table::id));
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.hidden_set.len()
    }

    /// All live tables, ordered by ID.
    pub fn snapshot(&self) -> Vec<Table> {
        let mut tables = self.live.values().cloned().collect::<Vec<_>>();
        tables.sort_by_key(Table::id);
        tables
    }
}
