// 🗄️ Record Store - consolidated dataset behind the commit pipeline
// SQLite + WAL, idempotent row inserts, event log for every recorded file

use crate::category::Category;
use crate::committed::RecordSummary;
use crate::export::write_spreadsheet;
use crate::reader::read_table;
use crate::validator::{CategorySignatures, CategoryValidator, SignatureValidator};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// RECORD STORE CAPABILITIES
// ============================================================================

/// RecordStore - what the commit pipeline needs from a consolidated dataset
pub trait RecordStore {
    /// Ingest one file's rows under `category`
    ///
    /// Recording the same file again under the same category must not
    /// duplicate its rows; identical rows at different lines are distinct.
    fn record(&mut self, path: &Path, category: Category) -> Result<RecordSummary>;

    /// Write the whole consolidated dataset to one spreadsheet, overwriting it
    fn export(&self, destination: &Path) -> Result<()>;

    /// Optional capability: stores without a validator run the pipeline in
    /// non-validating mode
    fn validator(&self) -> Option<&dyn CategoryValidator> {
        None
    }
}

/// Pairs any store with a category validator
pub struct ValidatingStore<S> {
    inner: S,
    validator: SignatureValidator,
}

impl<S: RecordStore> ValidatingStore<S> {
    pub fn new(inner: S, signatures: CategorySignatures) -> Self {
        ValidatingStore {
            inner,
            validator: SignatureValidator::new(signatures),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: RecordStore> RecordStore for ValidatingStore<S> {
    fn record(&mut self, path: &Path, category: Category) -> Result<RecordSummary> {
        self.inner.record(path, category)
    }

    fn export(&self, destination: &Path) -> Result<()> {
        self.inner.export(destination)
    }

    fn validator(&self) -> Option<&dyn CategoryValidator> {
        Some(&self.validator)
    }
}

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for the audit trail
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub source_file: String,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event_type: &str, source_file: &str, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            source_file: source_file.to_string(),
            data,
        }
    }
}

// ============================================================================
// SQLITE STORE
// ============================================================================

pub struct SqliteRecordStore {
    conn: Connection,
}

impl SqliteRecordStore {
    /// Open (or create) the database file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .with_context(|| format!("Failed to open database: {}", path.as_ref().display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(SqliteRecordStore { conn })
    }

    pub fn record_count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn events_for_file(&self, source_file: &str) -> Result<Vec<Event>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_id, timestamp, event_type, source_file, data
             FROM events WHERE source_file = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map(params![source_file], |row| {
            let timestamp: String = row.get(1)?;
            let data: String = row.get(4)?;
            Ok((row.get::<_, String>(0)?, timestamp, row.get::<_, String>(2)?, row.get::<_, String>(3)?, data))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (event_id, timestamp, event_type, source_file, data) = row?;
            events.push(Event {
                event_id,
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .context("Invalid event timestamp")?
                    .with_timezone(&Utc),
                event_type,
                source_file,
                data: serde_json::from_str(&data).context("Invalid event payload")?,
            });
        }
        Ok(events)
    }

    /// Every stored row as export columns: category, source file, line, then
    /// the union of data headers in first-seen order
    fn consolidated_rows(&self) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let mut stmt = self.conn.prepare(
            "SELECT category, source_file, line_number, headers, row_values
             FROM records ORDER BY id",
        )?;

        let stored = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut data_headers: Vec<String> = Vec::new();
        let mut decoded = Vec::with_capacity(stored.len());
        for (category, source_file, line_number, headers_json, values_json) in stored {
            let headers: Vec<String> = serde_json::from_str(&headers_json)?;
            let values: Vec<String> = serde_json::from_str(&values_json)?;
            for h in &headers {
                if !data_headers.contains(h) {
                    data_headers.push(h.clone());
                }
            }
            decoded.push((category, source_file, line_number, headers, values));
        }

        let mut columns = vec![
            "category".to_string(),
            "source_file".to_string(),
            "line_number".to_string(),
        ];
        columns.extend(data_headers.iter().cloned());

        let rows = decoded
            .into_iter()
            .map(|(category, source_file, line_number, headers, values)| {
                let mut out = vec![category, source_file, line_number.to_string()];
                out.extend(data_headers.iter().map(|wanted| {
                    headers
                        .iter()
                        .position(|h| h == wanted)
                        .and_then(|i| values.get(i).cloned())
                        .unwrap_or_default()
                }));
                out
            })
            .collect();

        Ok((columns, rows))
    }
}

impl RecordStore for SqliteRecordStore {
    fn record(&mut self, path: &Path, category: Category) -> Result<RecordSummary> {
        let table = read_table(path)?;
        let source_file = path.display().to_string();
        let headers_json = serde_json::to_string(&table.headers)?;

        let tx = self.conn.transaction()?;
        let mut summary = RecordSummary::default();

        for (i, values) in table.rows.iter().enumerate() {
            // Blank spreadsheet rows carry nothing to consolidate
            if values.iter().all(|v| v.trim().is_empty()) {
                continue;
            }

            let values_json = serde_json::to_string(values)?;
            let line_number = (i + 2) as i64; // 1-indexed + header row
            let hash =
                idempotency_hash(category, &source_file, line_number, &headers_json, &values_json);

            let result = tx.execute(
                "INSERT INTO records (
                    idempotency_hash, record_uuid, category, source_file,
                    line_number, headers, row_values
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    hash,
                    uuid::Uuid::new_v4().to_string(),
                    category.as_str(),
                    source_file,
                    line_number,
                    headers_json,
                    values_json,
                ],
            );

            match result {
                Ok(_) => summary.rows_recorded += 1,
                Err(rusqlite::Error::SqliteFailure(err, _))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    summary.duplicates_skipped += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to insert line {}", i + 2));
                }
            }
        }

        let event = Event::new(
            "file_recorded",
            &source_file,
            serde_json::json!({
                "category": category.as_str(),
                "rows_recorded": summary.rows_recorded,
                "duplicates_skipped": summary.duplicates_skipped,
            }),
        );
        insert_event(&tx, &event)?;
        tx.commit()?;

        debug!(
            file = %source_file,
            inserted = summary.rows_recorded,
            duplicates = summary.duplicates_skipped,
            "Recorded rows"
        );

        Ok(summary)
    }

    fn export(&self, destination: &Path) -> Result<()> {
        let (headers, rows) = self.consolidated_rows()?;
        write_spreadsheet(destination, &headers, &rows)?;
        info!(destination = %destination.display(), rows = rows.len(), "Exported records");
        Ok(())
    }
}

/// Identity of one source row: where it came from plus what it holds
fn idempotency_hash(
    category: Category,
    source_file: &str,
    line_number: i64,
    headers_json: &str,
    values_json: &str,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(category.as_str());
    hasher.update([0u8]);
    hasher.update(source_file);
    hasher.update([0u8]);
    hasher.update(line_number.to_le_bytes());
    hasher.update([0u8]);
    hasher.update(headers_json);
    hasher.update([0u8]);
    hasher.update(values_json);
    format!("{:x}", hasher.finalize())
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            idempotency_hash TEXT UNIQUE NOT NULL,
            record_uuid TEXT UNIQUE NOT NULL,
            category TEXT NOT NULL,
            source_file TEXT NOT NULL,
            line_number INTEGER NOT NULL,
            headers TEXT NOT NULL,
            row_values TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            source_file TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_records_category ON records(category)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_source ON events(source_file)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (event_id, timestamp, event_type, source_file, data)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.source_file,
            data_json,
        ],
    )?;

    Ok(())
}
