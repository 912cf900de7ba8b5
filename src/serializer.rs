//! Line-delimited JSON encoding of fetched records.

use crate::error::Result;
use crate::source::Record;
use serde_json::Value;

/// One JSON object per line, joined by `\n`, no trailing newline.
/// An empty slice yields an empty string.
pub fn to_json_lines(records: &[Record]) -> String {
    records
        .iter()
        .map(|record| Value::Object(record.fields().clone()).to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse a line-delimited payload back into records. Blank lines are ignored.
pub fn from_json_lines(payload: &str) -> Result<Vec<Record>> {
    payload
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str::<Record>(line).map_err(Into::into))
        .collect()
}
