// 📤 Spreadsheet export - one sheet, overwritten on every export

use crate::reader::TabularFormat;
use anyhow::{anyhow, Context, Result};
use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::Path;

pub const SHEET_NAME: &str = "Records";

/// Write `headers` + `rows` to `destination`, format picked by extension
///
/// Existing files are replaced; missing parent directories are created.
pub fn write_spreadsheet(destination: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    let format = TabularFormat::from_path(destination).ok_or_else(|| {
        anyhow!(
            "Unsupported export format: {} (expected .xlsx or .csv)",
            destination.display()
        )
    })?;

    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    match format {
        TabularFormat::Xlsx => write_xlsx(destination, headers, rows),
        TabularFormat::Csv => write_csv(destination, headers, rows),
    }
}

fn write_xlsx(destination: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as u16, header)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let row_num = (i + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(row_num, col as u16, value)?;
            }
        }
    }

    workbook
        .save(destination)
        .with_context(|| format!("Failed to save workbook: {}", destination.display()))?;
    Ok(())
}

fn write_csv(destination: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(destination)
        .with_context(|| format!("Failed to create CSV file: {}", destination.display()))?;

    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_table;
    use tempfile::TempDir;

    fn sample() -> (Vec<String>, Vec<Vec<String>>) {
        let headers = vec!["category".to_string(), "Company".to_string()];
        let rows = vec![
            vec!["tsun".to_string(), "Acme".to_string()],
            vec!["cb".to_string(), String::new()],
        ];
        (headers, rows)
    }

    #[test]
    fn test_xlsx_export_reads_back() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out").join("new_companies.xlsx");
        let (headers, rows) = sample();

        write_spreadsheet(&dest, &headers, &rows).unwrap();

        let table = read_table(&dest).unwrap();
        assert_eq!(table.headers, headers);
        assert_eq!(table.rows[0], rows[0]);
    }

    #[test]
    fn test_csv_export_overwrites() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("export.csv");
        fs::write(&dest, "stale,content\n1,2\n3,4\n5,6\n").unwrap();
        let (headers, rows) = sample();

        write_spreadsheet(&dest, &headers, &rows).unwrap();

        let table = read_table(&dest).unwrap();
        assert_eq!(table.headers, headers);
        assert_eq!(table.rows, rows);
    }

    #[test]
    fn test_unknown_extension_is_rejected() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("export.ods");
        let (headers, rows) = sample();

        assert!(write_spreadsheet(&dest, &headers, &rows).is_err());
        assert!(!dest.exists());
    }
}
