// ============================================================
// Data Ingestion
// ============================================================
// Normalizes heterogeneous raw input into Vec<Record>.
//
// A source is either a list of in-memory records, or a path.
// Paths are dispatched on their DECLARED content type (what the
// filename claims to be), not on sniffed bytes:
//
//   application/vnd...spreadsheetml.sheet │
//   application/vnd.ms-excel             ─┤→ SheetSource
//   text/csv                              →  CsvSource
//   application/json (.json / .jsonl)     →  JsonLinesSource
//   anything else                         →  UnsupportedFormat
//
// The type-dispatched read is FINAL: the selected reader's
// output is the ingested dataset, with no second pass through
// another parser.
//
// All readers are read-only; ingestion has no side effects.

use calamine::{open_workbook_auto, Data, Reader};
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::domain::record::Record;
use crate::domain::traits::RecordSource;
use crate::error::{Result, TaskError};

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
const XLS_MIME: &str = "application/vnd.ms-excel";
const CSV_MIME: &str = "text/csv";
const JSON_MIME: &str = "application/json";

/// A raw dataset reference: already-materialized records, or a
/// filesystem path to be dispatched by content type.
#[derive(Debug, Clone)]
pub enum DataSource {
    Records(Vec<Record>),
    Path(PathBuf),
}

impl From<Vec<Record>> for DataSource {
    fn from(records: Vec<Record>) -> Self {
        DataSource::Records(records)
    }
}

impl From<PathBuf> for DataSource {
    fn from(path: PathBuf) -> Self {
        DataSource::Path(path)
    }
}

impl From<&Path> for DataSource {
    fn from(path: &Path) -> Self {
        DataSource::Path(path.to_path_buf())
    }
}

/// The three supported on-disk formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Spreadsheet,
    Csv,
    JsonLines,
}

impl SourceFormat {
    /// Dispatch on the declared content type of a path.
    ///
    /// `.jsonl` has no registered MIME type, so that one
    /// extension is matched literally before giving up.
    pub fn detect(path: &Path) -> Result<Self> {
        let declared = mime_guess::from_path(path).first();

        if let Some(mime) = declared {
            return match mime.essence_str() {
                XLSX_MIME | XLS_MIME => Ok(SourceFormat::Spreadsheet),
                CSV_MIME => Ok(SourceFormat::Csv),
                JSON_MIME => Ok(SourceFormat::JsonLines),
                other => Err(TaskError::unsupported(
                    path,
                    format!("content type '{other}' is not a spreadsheet, CSV, or JSON source"),
                )),
            };
        }

        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") => Ok(SourceFormat::JsonLines),
            _ => Err(TaskError::unsupported(
                path,
                "no recognized content type; expected .xlsx, .xls, .csv, .json, or .jsonl",
            )),
        }
    }
}

/// Materialize any data source into records.
pub fn load(source: DataSource) -> Result<Vec<Record>> {
    match source {
        DataSource::Records(records) => Ok(records),
        DataSource::Path(path) => read_path(&path),
    }
}

/// Read a path with the reader its content type selects.
pub fn read_path(path: &Path) -> Result<Vec<Record>> {
    let format = SourceFormat::detect(path)?;
    tracing::debug!("Ingesting '{}' as {:?}", path.display(), format);

    let records = match format {
        SourceFormat::Spreadsheet => SheetSource::new(path).load_all()?,
        SourceFormat::Csv => CsvSource::new(path).load_all()?,
        SourceFormat::JsonLines => JsonLinesSource::new(path).load_all()?,
    };

    tracing::info!("Ingested {} records from '{}'", records.len(), path.display());
    Ok(records)
}

// ─── SheetSource ──────────────────────────────────────────────────────────────
/// Reads the first worksheet of an .xlsx/.xls workbook.
/// Row 1 is the header row; every following row becomes one
/// Record keyed by those headers.
pub struct SheetSource {
    path: PathBuf,
}

impl SheetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for SheetSource {
    fn load_all(&self) -> Result<Vec<Record>> {
        let mut workbook = open_workbook_auto(&self.path)
            .map_err(|e| TaskError::unsupported(&self.path, format!("workbook open failed: {e}")))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| TaskError::unsupported(&self.path, "workbook has no sheets"))?
            .map_err(|e| TaskError::unsupported(&self.path, format!("sheet read failed: {e}")))?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.iter().map(cell_to_header).collect(),
            None => return Ok(Vec::new()),
        };

        let mut records = Vec::new();
        for row in rows {
            let mut record = Record::new();
            for (header, cell) in headers.iter().zip(row.iter()) {
                if let Some(value) = cell_to_value(cell) {
                    record.insert(header.clone(), value);
                }
            }
            records.push(record);
        }
        Ok(records)
    }
}

fn cell_to_header(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Map a spreadsheet cell to a JSON value. Empty cells produce
/// no field at all, so `Record::has` reflects real data.
fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(Value::from(s.as_str())),
        Data::Float(f) => Some(Value::from(*f)),
        Data::Int(i) => Some(Value::from(*i)),
        Data::Bool(b) => Some(Value::from(*b)),
        other => Some(Value::from(other.to_string())),
    }
}

// ─── CsvSource ────────────────────────────────────────────────────────────────
/// Reads a delimited-text file with a header row.
pub struct CsvSource {
    path: PathBuf,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for CsvSource {
    fn load_all(&self) -> Result<Vec<Record>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(&self.path)
            .map_err(|e| TaskError::unsupported(&self.path, format!("CSV open failed: {e}")))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| TaskError::unsupported(&self.path, format!("CSV header read failed: {e}")))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records = Vec::new();
        for (line, row) in reader.records().enumerate() {
            let row = row.map_err(|e| {
                TaskError::unsupported(&self.path, format!("CSV row {} unreadable: {e}", line + 2))
            })?;
            let mut record = Record::new();
            for (header, cell) in headers.iter().zip(row.iter()) {
                record.insert(header.clone(), Value::from(cell));
            }
            records.push(record);
        }
        Ok(records)
    }
}

// ─── JsonLinesSource ──────────────────────────────────────────────────────────
/// Reads line-delimited JSON: one object per line, blank lines
/// skipped. Each object's top-level keys become record fields.
pub struct JsonLinesSource {
    path: PathBuf,
}

impl JsonLinesSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecordSource for JsonLinesSource {
    fn load_all(&self) -> Result<Vec<Record>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(&line).map_err(|e| {
                TaskError::unsupported(
                    &self.path,
                    format!("line {} is not valid JSON: {e}", line_num + 1),
                )
            })?;

            match value {
                Value::Object(map) => {
                    let mut record = Record::new();
                    for (k, v) in map {
                        record.insert(k, v);
                    }
                    records.push(record);
                }
                _ => {
                    return Err(TaskError::unsupported(
                        &self.path,
                        format!("line {} is not a JSON object", line_num + 1),
                    ))
                }
            }
        }
        Ok(records)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_dispatch_routes_by_content_type() {
        assert_eq!(
            SourceFormat::detect(Path::new("data.xlsx")).unwrap(),
            SourceFormat::Spreadsheet
        );
        assert_eq!(
            SourceFormat::detect(Path::new("data.xls")).unwrap(),
            SourceFormat::Spreadsheet
        );
        assert_eq!(SourceFormat::detect(Path::new("data.csv")).unwrap(), SourceFormat::Csv);
        assert_eq!(
            SourceFormat::detect(Path::new("data.json")).unwrap(),
            SourceFormat::JsonLines
        );
        assert_eq!(
            SourceFormat::detect(Path::new("data.jsonl")).unwrap(),
            SourceFormat::JsonLines
        );
    }

    #[test]
    fn test_dispatch_rejects_unknown_content_type() {
        let err = SourceFormat::detect(Path::new("data.txt")).unwrap_err();
        assert!(matches!(err, TaskError::UnsupportedFormat { .. }));
        let err = SourceFormat::detect(Path::new("data")).unwrap_err();
        assert!(matches!(err, TaskError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_csv_reader_produces_named_fields() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "text,summary").unwrap();
        writeln!(file, "a long article,a short summary").unwrap();
        writeln!(file, "another article,another summary").unwrap();

        let records = read_path(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("text").as_deref(), Some("a long article"));
        assert_eq!(records[1].text("summary").as_deref(), Some("another summary"));
    }

    #[test]
    fn test_jsonl_reader_skips_blank_lines() {
        let mut file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        writeln!(file, r#"{{"text": "one", "is_valid": false}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, r#"{{"text": "two", "is_valid": true}}"#).unwrap();

        let records = read_path(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].text("text").as_deref(), Some("one"));
        assert_eq!(records[1].flag("is_valid"), Some(true));
    }

    #[test]
    fn test_jsonl_rejects_non_object_lines() {
        let mut file = tempfile::Builder::new().suffix(".jsonl").tempfile().unwrap();
        writeln!(file, r#"["not", "an", "object"]"#).unwrap();

        let err = read_path(file.path()).unwrap_err();
        assert!(matches!(err, TaskError::UnsupportedFormat { .. }));
    }
}
