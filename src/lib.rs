// Tabular Ingest - Core Library
// Staging, category validation, commit and export of tabular source files

pub mod category;
pub mod committed;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod reader;
pub mod staging;
pub mod store;
pub mod validator;

// Re-export commonly used types
pub use category::{Category, UnknownCategory};
pub use committed::{CommittedEntry, CommittedRegistry, RecordSummary};
pub use error::{CategoryMismatch, IngestError, Mismatches, Result};
pub use export::write_spreadsheet;
pub use pipeline::{CommitReport, RejectionPolicy, Session, SessionSnapshot, Verdict};
pub use reader::{read_table, Table, TabularFormat};
pub use staging::{normalize_dropped_path, StagingEntry, StagingRegistry};
pub use store::{Event, RecordStore, SqliteRecordStore, ValidatingStore};
pub use validator::{CategorySignatures, CategoryValidator, SignatureValidator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
