// ⚠️ Error taxonomy for staging, commit and export
// Every variant is resolved at the boundary of the operator action that raised it

use crate::category::Category;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Final path component, falling back to the whole path
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

/// One staged file whose content does not match its declared category
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("File '{}' does not match the specified type '{category}'", file_name(.path))]
pub struct CategoryMismatch {
    pub path: PathBuf,
    pub category: Category,
}

/// Wrapper so a list of mismatches can be printed one per line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatches(pub Vec<CategoryMismatch>);

impl fmt::Display for Mismatches {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, m) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", m)?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported file format: {} (expected .csv or .xlsx)", file_name(.path))]
    UnsupportedFormat { path: PathBuf },

    #[error("Failed to read file {}: {message}", file_name(.path))]
    ReadFailure { path: PathBuf, message: String },

    #[error("No staged file at position {index} (staged: {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("No files to upload")]
    NoFilesStaged,

    #[error("No staged file matched its category:\n{mismatches}")]
    NothingValidated { mismatches: Mismatches },

    #[error("No files to export")]
    NothingToExport,

    /// Store failure mid-batch; carries the batch's rejections so they are
    /// still reported
    #[error("Failed to record {}: {message}", file_name(.path))]
    Record {
        path: PathBuf,
        message: String,
        mismatches: Mismatches,
    },

    #[error("Failed to export to {}: {message}", .path.display())]
    Export { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, IngestError>;

impl IngestError {
    /// Process exit code for the non-interactive front end
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedFormat { .. } | Self::ReadFailure { .. } => 2,
            Self::NoFilesStaged | Self::NothingToExport => 3,
            Self::NothingValidated { .. } => 4,
            Self::Record { .. } | Self::Export { .. } => 5,
            Self::IndexOutOfBounds { .. } => 1,
        }
    }
}
