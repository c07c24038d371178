// 📂 Tabular Reader - CSV and XLSX files into header + rows
// Used at add time (format check) and again by the validator and the store

use crate::error::{IngestError, Result};
use anyhow::{anyhow, Context};
use calamine::{open_workbook, Data, Reader, Xlsx};
use std::fs::File;
use std::path::Path;

// ============================================================================
// FORMAT DETECTION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabularFormat {
    Csv,
    Xlsx,
}

impl TabularFormat {
    /// Recognize a format from the file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" => Some(TabularFormat::Csv),
            "xlsx" => Some(TabularFormat::Xlsx),
            _ => None,
        }
    }
}

// ============================================================================
// TABLE
// ============================================================================

/// Parsed content of one tabular file, every cell as text
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Case-insensitive header lookup, ignoring surrounding whitespace
    pub fn has_column(&self, name: &str) -> bool {
        let wanted = name.trim().to_lowercase();
        self.headers.iter().any(|h| h.trim().to_lowercase() == wanted)
    }
}

/// Parse `path` as a table
///
/// Fails with `UnsupportedFormat` when the extension is not recognized and
/// with `ReadFailure` when a recognized file cannot be parsed.
pub fn read_table(path: &Path) -> Result<Table> {
    let format = TabularFormat::from_path(path).ok_or_else(|| IngestError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let parsed = match format {
        TabularFormat::Csv => read_csv(path),
        TabularFormat::Xlsx => read_xlsx(path),
    };

    parsed.map_err(|e| IngestError::ReadFailure {
        path: path.to_path_buf(),
        message: format!("{:#}", e),
    })
}

fn read_csv(path: &Path) -> anyhow::Result<Table> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(anyhow!("No columns to parse from file"));
    }

    let mut rows = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let record = result.with_context(|| {
            format!("Failed to parse CSV line {}", line_num + 2)
        })?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(Table { headers, rows })
}

fn read_xlsx(path: &Path) -> anyhow::Result<Table> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("Workbook has no worksheets"))?
        .context("Failed to read first worksheet")?;

    let mut lines = range.rows().map(|row| row.iter().map(cell_text).collect::<Vec<_>>());

    let headers = match lines.next() {
        Some(h) if !h.iter().all(|c| c.trim().is_empty()) => h,
        _ => return Err(anyhow!("No columns to parse from file")),
    };

    Ok(Table {
        headers,
        rows: lines.collect(),
    })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(TabularFormat::from_path(Path::new("a.csv")), Some(TabularFormat::Csv));
        assert_eq!(TabularFormat::from_path(Path::new("B.XLSX")), Some(TabularFormat::Xlsx));
        assert_eq!(TabularFormat::from_path(Path::new("c.xls")), None);
        assert_eq!(TabularFormat::from_path(Path::new("noext")), None);
    }

    #[test]
    fn test_read_csv() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "companies.csv", "Company,Website\nAcme,acme.io\nNeuro,neuro.ai\n");

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers, vec!["Company", "Website"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1], vec!["Neuro", "neuro.ai"]);
        assert!(table.has_column(" company "));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "notes.txt", "hello");

        let err = read_table(&path).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_ragged_csv_is_read_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "broken.csv", "a,b\n1,2,3\n");

        let err = read_table(&path).unwrap_err();
        match err {
            IngestError::ReadFailure { message, .. } => assert!(message.contains("line 2")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_csv_is_read_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "empty.csv", "");

        assert!(matches!(read_table(&path), Err(IngestError::ReadFailure { .. })));
    }

    #[test]
    fn test_garbage_xlsx_is_read_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "fake.xlsx", "definitely not a zip archive");

        assert!(matches!(read_table(&path), Err(IngestError::ReadFailure { .. })));
    }

    #[test]
    fn test_missing_file_is_read_failure() {
        let err = read_table(Path::new("/nonexistent/dir/missing.csv")).unwrap_err();
        assert!(matches!(err, IngestError::ReadFailure { .. }));
    }

    #[test]
    fn test_read_xlsx_written_by_xlsxwriter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("book.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Organization Name").unwrap();
        sheet.write_string(0, 1, "Founded").unwrap();
        sheet.write_string(1, 0, "Acme").unwrap();
        sheet.write_string(1, 1, "2019").unwrap();
        workbook.save(&path).unwrap();

        let table = read_table(&path).unwrap();
        assert_eq!(table.headers, vec!["Organization Name", "Founded"]);
        assert_eq!(table.rows, vec![vec!["Acme".to_string(), "2019".to_string()]]);
    }
}
