// 📦 Committed Registry - files already handed to the record store
// Append-only for the lifetime of the session

use crate::category::Category;
use crate::error::file_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What the record store reports for one recorded file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub rows_recorded: usize,
    pub duplicates_skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommittedEntry {
    pub path: PathBuf,
    pub category: Category,
    pub summary: RecordSummary,
    pub committed_at: DateTime<Utc>,
}

impl CommittedEntry {
    pub fn display_name(&self) -> String {
        file_name(&self.path)
    }
}

#[derive(Debug, Default)]
pub struct CommittedRegistry {
    entries: Vec<CommittedEntry>,
}

impl CommittedRegistry {
    pub fn new() -> Self {
        CommittedRegistry::default()
    }

    /// Only the commit orchestrator appends
    pub(crate) fn push(&mut self, path: PathBuf, category: Category, summary: RecordSummary) -> &CommittedEntry {
        self.entries.push(CommittedEntry {
            path,
            category,
            summary,
            committed_at: Utc::now(),
        });
        &self.entries[self.entries.len() - 1]
    }

    pub fn list(&self) -> &[CommittedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total rows recorded across every committed file
    pub fn rows_recorded(&self) -> usize {
        self.entries.iter().map(|e| e.summary.rows_recorded).sum()
    }
}
