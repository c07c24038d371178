// 🔁 Commit Pipeline - staging → validation → record store → committed
//
// Per entry: Staged → {Validated | Rejected} → {Committed | Discarded}
//
// The session owns both registries and the store. Every operator action is
// one `&mut self` call that runs to completion before the next one starts.

use crate::category::Category;
use crate::committed::{CommittedEntry, CommittedRegistry};
use crate::error::{CategoryMismatch, IngestError, Mismatches, Result};
use crate::staging::{StagingEntry, StagingRegistry};
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

// ============================================================================
// POLICY & REPORTS
// ============================================================================

/// What happens to rejected entries when at least one sibling commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RejectionPolicy {
    /// Clear the whole staging list after a batch that committed anything
    #[default]
    DiscardRejected,
    /// Keep rejected entries staged so the operator can fix the category
    RetainRejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Validated,
    Rejected,
}

/// Outcome of a commit that recorded at least one file
#[derive(Debug, Clone, PartialEq)]
pub struct CommitReport {
    pub committed: Vec<CommittedEntry>,
    pub mismatches: Vec<CategoryMismatch>,
    /// Rejected entries dropped from staging by `DiscardRejected`
    pub discarded: usize,
}

impl CommitReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Read-only view for a display to re-render from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub revision: u64,
    pub staged: Vec<StagingEntry>,
    pub committed: Vec<CommittedEntry>,
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session<S> {
    staging: StagingRegistry,
    committed: CommittedRegistry,
    store: S,
    policy: RejectionPolicy,
    revision: u64,
}

impl<S: RecordStore> Session<S> {
    pub fn new(store: S) -> Self {
        Session {
            staging: StagingRegistry::new(),
            committed: CommittedRegistry::new(),
            store,
            policy: RejectionPolicy::default(),
            revision: 0,
        }
    }

    pub fn with_policy(mut self, policy: RejectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RejectionPolicy {
        self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn staged(&self) -> &[StagingEntry] {
        self.staging.list()
    }

    pub fn committed(&self) -> &[CommittedEntry] {
        self.committed.list()
    }

    /// Bumped after every mutation of either registry
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            revision: self.revision,
            staged: self.staging.list().to_vec(),
            committed: self.committed.list().to_vec(),
        }
    }

    // ------------------------------------------------------------------------
    // Staging commands
    // ------------------------------------------------------------------------

    pub fn add_file(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.staging.add(path)?;
        self.revision += 1;
        Ok(())
    }

    pub fn remove_file(&mut self, index: usize) -> Result<StagingEntry> {
        let entry = self.staging.remove(index)?;
        self.revision += 1;
        Ok(entry)
    }

    pub fn set_category(&mut self, index: usize, category: Category) -> Result<()> {
        self.staging.set_category(index, category)?;
        self.revision += 1;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------------

    /// Validate every staged file, record the ones that pass, reset staging
    ///
    /// Fails with `NoFilesStaged` on an empty list and with
    /// `NothingValidated` when every file is rejected; both leave staging
    /// untouched. A record-store failure aborts the rest of the batch:
    /// files recorded before it stay committed and leave staging, the
    /// failing file and everything after it stay staged. The `Record`
    /// error still lists the batch's mismatches.
    pub fn commit_all(&mut self) -> Result<CommitReport> {
        if self.staging.is_empty() {
            return Err(IngestError::NoFilesStaged);
        }

        let verdicts = self.validate_staged();

        let mismatches: Vec<CategoryMismatch> = self
            .staging
            .list()
            .iter()
            .zip(&verdicts)
            .filter(|(_, v)| **v == Verdict::Rejected)
            .map(|(entry, _)| CategoryMismatch {
                path: entry.path.clone(),
                category: entry.declared_category,
            })
            .collect();

        for m in &mismatches {
            warn!(file = %m.path.display(), category = %m.category, "Category mismatch");
        }

        if !verdicts.contains(&Verdict::Validated) {
            warn!(rejected = mismatches.len(), "No staged file validated, staging kept");
            return Err(IngestError::NothingValidated {
                mismatches: Mismatches(mismatches),
            });
        }

        let first_new = self.committed.len();
        let mut processed = vec![false; verdicts.len()];

        for (position, verdict) in verdicts.iter().enumerate() {
            if *verdict != Verdict::Validated {
                continue;
            }

            let (path, category) = match self.staging.get(position) {
                Some(entry) => (entry.path.clone(), entry.declared_category),
                None => continue,
            };

            match self.store.record(&path, category) {
                Ok(summary) => {
                    info!(
                        file = %path.display(),
                        category = %category,
                        rows = summary.rows_recorded,
                        duplicates = summary.duplicates_skipped,
                        "Committed file"
                    );
                    self.committed.push(path, category, summary);
                    processed[position] = true;
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    error!(file = %path.display(), error = %message, "Record store failed, batch aborted");
                    self.staging.retain_positions(|i| !processed[i]);
                    self.revision += 1;
                    return Err(IngestError::Record {
                        path,
                        message,
                        mismatches: Mismatches(mismatches),
                    });
                }
            }
        }

        let staged_before = self.staging.len();
        match self.policy {
            RejectionPolicy::DiscardRejected => self.staging.clear(),
            RejectionPolicy::RetainRejected => self.staging.retain_positions(|i| !processed[i]),
        }
        self.revision += 1;

        let committed = self.committed.list()[first_new..].to_vec();
        let discarded = staged_before - committed.len() - self.staging.len();

        info!(
            committed = committed.len(),
            rejected = mismatches.len(),
            discarded,
            "Commit finished"
        );

        Ok(CommitReport {
            committed,
            mismatches,
            discarded,
        })
    }

    /// One verdict per staged entry, in registry order
    fn validate_staged(&self) -> Vec<Verdict> {
        let validator = self.store.validator();

        self.staging
            .list()
            .iter()
            .map(|entry| match validator {
                Some(v) if !v.validate(&entry.path, entry.declared_category) => Verdict::Rejected,
                _ => Verdict::Validated,
            })
            .collect()
    }

    // ------------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------------

    /// Write the store's whole dataset to `destination`
    ///
    /// Requires at least one committed file in this session.
    pub fn export(&self, destination: &Path) -> Result<()> {
        if self.committed.is_empty() {
            return Err(IngestError::NothingToExport);
        }

        self.store
            .export(destination)
            .map_err(|e| IngestError::Export {
                path: destination.to_path_buf(),
                message: format!("{:#}", e),
            })?;

        info!(destination = %destination.display(), "Export finished");
        Ok(())
    }
}
