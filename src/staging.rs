// 📥 Staging Registry - files waiting to be committed
// Entries are addressed by position; callers re-read `list()` after every mutation

use crate::category::Category;
use crate::error::{file_name, IngestError, Result};
use crate::reader::read_table;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

// ============================================================================
// STAGING ENTRY
// ============================================================================

/// One file awaiting commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagingEntry {
    pub path: PathBuf,

    /// Operator's label for the file, checked against content at commit time
    pub declared_category: Category,

    /// Data rows seen when the file was staged
    pub rows: usize,

    pub staged_at: DateTime<Utc>,
}

impl StagingEntry {
    pub fn new(path: PathBuf, rows: usize) -> Self {
        StagingEntry {
            path,
            declared_category: Category::default(),
            rows,
            staged_at: Utc::now(),
        }
    }

    /// File name shown to the operator
    pub fn display_name(&self) -> String {
        file_name(&self.path)
    }
}

// ============================================================================
// STAGING REGISTRY
// ============================================================================

#[derive(Debug, Default)]
pub struct StagingRegistry {
    entries: Vec<StagingEntry>,
}

impl StagingRegistry {
    pub fn new() -> Self {
        StagingRegistry::default()
    }

    /// Parse `path` and stage it under the default category
    ///
    /// The same path may be staged more than once.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> Result<&StagingEntry> {
        let path = path.into();
        let table = read_table(&path)?;

        info!(
            file = %path.display(),
            rows = table.row_count(),
            position = self.entries.len(),
            "Staged file"
        );

        self.entries.push(StagingEntry::new(path, table.row_count()));
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Remove the entry at `index`, shifting later entries down by one
    pub fn remove(&mut self, index: usize) -> Result<StagingEntry> {
        self.check_index(index)?;
        let entry = self.entries.remove(index);
        info!(file = %entry.path.display(), position = index, "Removed staged file");
        Ok(entry)
    }

    /// Change the declared category; content is not checked until commit
    pub fn set_category(&mut self, index: usize, category: Category) -> Result<()> {
        self.check_index(index)?;
        let entry = &mut self.entries[index];
        debug!(
            file = %entry.path.display(),
            from = %entry.declared_category,
            to = %category,
            "Category changed"
        );
        entry.declared_category = category;
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<&StagingEntry> {
        self.entries.get(index)
    }

    pub fn list(&self) -> &[StagingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keep only the entries whose position satisfies `keep`, in order
    pub(crate) fn retain_positions(&mut self, mut keep: impl FnMut(usize) -> bool) {
        let mut position = 0;
        self.entries.retain(|_| {
            let kept = keep(position);
            position += 1;
            kept
        });
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.entries.len() {
            Ok(())
        } else {
            Err(IngestError::IndexOutOfBounds {
                index,
                len: self.entries.len(),
            })
        }
    }
}

/// Clean up a path delivered by a drop event or typed by the operator
///
/// Drop targets wrap paths containing spaces in braces (`{/my dir/a.csv}`).
/// Returns `None` when nothing is left.
pub fn normalize_dropped_path(raw: &str) -> Option<PathBuf> {
    let cleaned = raw
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim();

    if cleaned.is_empty() {
        None
    } else {
        Some(Path::new(cleaned).to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_csv(dir: &TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, "Company,Website\nAcme,acme.io\n").unwrap();
        path
    }

    fn staged_names(registry: &StagingRegistry) -> Vec<String> {
        registry.list().iter().map(|e| e.display_name()).collect()
    }

    #[test]
    fn test_add_keeps_call_order() {
        let dir = TempDir::new().unwrap();
        let mut registry = StagingRegistry::new();

        for name in ["a.csv", "b.csv", "c.csv"] {
            registry.add(write_csv(&dir, name)).unwrap();
        }

        assert_eq!(registry.len(), 3);
        assert_eq!(staged_names(&registry), vec!["a.csv", "b.csv", "c.csv"]);
        assert!(registry
            .list()
            .iter()
            .all(|e| e.declared_category == Category::Tsun && e.rows == 1));
    }

    #[test]
    fn test_duplicate_paths_are_allowed() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(&dir, "a.csv");
        let mut registry = StagingRegistry::new();

        registry.add(&path).unwrap();
        registry.add(&path).unwrap();

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_failed_add_leaves_registry_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut registry = StagingRegistry::new();
        registry.add(write_csv(&dir, "a.csv")).unwrap();

        let txt = dir.path().join("notes.txt");
        fs::write(&txt, "x").unwrap();
        assert!(matches!(
            registry.add(&txt),
            Err(IngestError::UnsupportedFormat { .. })
        ));

        let broken = dir.path().join("broken.csv");
        fs::write(&broken, "a,b\n1,2,3\n").unwrap();
        assert!(matches!(
            registry.add(&broken),
            Err(IngestError::ReadFailure { .. })
        ));

        assert_eq!(staged_names(&registry), vec!["a.csv"]);
    }

    #[test]
    fn test_remove_shifts_later_entries() {
        let dir = TempDir::new().unwrap();
        let mut registry = StagingRegistry::new();
        for name in ["a.csv", "b.csv", "c.csv", "d.csv"] {
            registry.add(write_csv(&dir, name)).unwrap();
        }

        let removed = registry.remove(1).unwrap();

        assert_eq!(removed.display_name(), "b.csv");
        assert_eq!(staged_names(&registry), vec!["a.csv", "c.csv", "d.csv"]);
    }

    #[test]
    fn test_remove_out_of_bounds() {
        let dir = TempDir::new().unwrap();
        let mut registry = StagingRegistry::new();
        registry.add(write_csv(&dir, "a.csv")).unwrap();

        let err = registry.remove(1).unwrap_err();
        assert!(matches!(err, IngestError::IndexOutOfBounds { index: 1, len: 1 }));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_category_accepts_any_label() {
        let dir = TempDir::new().unwrap();
        let mut registry = StagingRegistry::new();
        registry.add(write_csv(&dir, "a.csv")).unwrap();

        registry.set_category(0, Category::Pb).unwrap();
        assert_eq!(registry.get(0).unwrap().declared_category, Category::Pb);

        assert!(registry.set_category(3, Category::Cb).is_err());
    }

    #[test]
    fn test_retain_positions() {
        let dir = TempDir::new().unwrap();
        let mut registry = StagingRegistry::new();
        for name in ["a.csv", "b.csv", "c.csv"] {
            registry.add(write_csv(&dir, name)).unwrap();
        }

        registry.retain_positions(|i| i != 0);
        assert_eq!(staged_names(&registry), vec!["b.csv", "c.csv"]);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_normalize_dropped_path() {
        assert_eq!(
            normalize_dropped_path("{/home/op/My Files/a.csv}"),
            Some(PathBuf::from("/home/op/My Files/a.csv"))
        );
        assert_eq!(
            normalize_dropped_path("  /tmp/b.xlsx\n"),
            Some(PathBuf::from("/tmp/b.xlsx"))
        );
        assert_eq!(normalize_dropped_path("{}"), None);
        assert_eq!(normalize_dropped_path("   "), None);
    }
}
