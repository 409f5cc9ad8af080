// ============================================================
// Core Traits (Abstractions)
// ============================================================
// By programming against traits instead of concrete readers,
// the ingestion dispatch can route a source to any reader that
// produces records:
//   - SheetSource     → spreadsheet workbooks
//   - CsvSource       → delimited text
//   - JsonLinesSource → line-delimited JSON
// A future reader only needs to implement RecordSource.

use crate::domain::record::Record;
use crate::error::Result;

/// Any component that can load raw records from a source.
pub trait RecordSource {
    /// Load every record this source provides.
    fn load_all(&self) -> Result<Vec<Record>>;
}
