//! Cell and row value types yielded by the sheet streamer.

use std::collections::BTreeMap;
use std::fmt;

use crate::excel_date::CivilDateTime;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single cell's resolved value.
///
/// Exactly one variant is active per the data model; `Raw` holds a string
/// whose typed interpretation failed and was recovered by keeping the wire
/// text verbatim (`ValueParseFailure`, recovered locally rather than surfaced as an error).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    DateTime(CivilDateTime),
    Bytes(Vec<u8>),
    Raw(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Render the cell for display purposes (not format-aware).
    pub fn as_display_string(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Number(n) => n.to_string(),
            CellValue::Text(s) => s.clone(),
            CellValue::DateTime(dt) => format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
            ),
            CellValue::Bytes(b) => format!("<{} bytes>", b.len()),
            CellValue::Raw(s) => s.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) | CellValue::Raw(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display_string())
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(f: f64) -> Self {
        CellValue::Number(f)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

/// One worksheet row: an ordered mapping from column label (`"A"`, `"B"`, ...,
/// or a header name) to its resolved value. Keys densely cover
/// `[startCol, maxCol]` even when the underlying XML omitted most cells.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Row {
    /// 0-based row index in the worksheet (not the 1-based `r` attribute).
    pub index: u32,
    pub cells: BTreeMap<String, CellValue>,
    /// Column order, for consumers that want a stable, positional view.
    pub columns: Vec<String>,
}

impl Row {
    pub fn new(index: u32, columns: Vec<String>) -> Self {
        let cells = columns
            .iter()
            .map(|c| (c.clone(), CellValue::Null))
            .collect();
        Row {
            index,
            cells,
            columns,
        }
    }

    pub fn set(&mut self, column: &str, value: CellValue) {
        self.cells.insert(column.to_string(), value);
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(CellValue::is_null)
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| {
                self.cells
                    .get(c)
                    .map(CellValue::as_display_string)
                    .unwrap_or_default()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_seeds_all_columns_as_null() {
        let row = Row::new(0, vec!["A".into(), "B".into(), "C".into()]);
        assert!(row.is_empty());
        assert_eq!(row.get("B"), Some(&CellValue::Null));
    }

    #[test]
    fn row_to_strings_follows_column_order() {
        let mut row = Row::new(0, vec!["A".into(), "B".into()]);
        row.set("B", CellValue::Number(30.0));
        row.set("A", CellValue::Text("Alice".into()));
        assert_eq!(row.to_strings(), vec!["Alice".to_string(), "30".to_string()]);
    }

    #[test]
    fn cell_value_display() {
        assert_eq!(CellValue::Null.as_display_string(), "");
        assert_eq!(CellValue::Bool(true).as_display_string(), "true");
        assert_eq!(CellValue::Number(1.5).as_display_string(), "1.5");
    }
}
