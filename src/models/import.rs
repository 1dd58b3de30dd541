use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

/// A single decoded cell, before any field-level interpretation
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    /// Raw spreadsheet number; in date columns this is a day serial
    Number(f64),
    Date(NaiveDate),
}

impl CellValue {
    pub fn text<S: Into<String>>(value: S) -> Self {
        Self::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(text) => text.trim().is_empty(),
            Self::Number(_) | Self::Date(_) => false,
        }
    }
}

static EMPTY_CELL: CellValue = CellValue::Empty;

/// One source row keyed by canonical field key
///
/// `row_number` is the 1-based position in the source file, so the first
/// data row under a header on line 1 is row 2.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    row_number: usize,
    cells: BTreeMap<String, CellValue>,
}

impl RawRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            cells: BTreeMap::new(),
        }
    }

    pub fn with<K: Into<String>>(mut self, key: K, value: CellValue) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a cell; a blank value never replaces a non-blank one for the same key
    pub fn insert<K: Into<String>>(&mut self, key: K, value: CellValue) {
        let key = key.into();
        match self.cells.get(&key) {
            Some(existing) if !existing.is_blank() => {}
            _ => {
                self.cells.insert(key, value);
            }
        }
    }

    pub fn row_number(&self) -> usize {
        self.row_number
    }

    pub fn cell(&self, key: &str) -> &CellValue {
        self.cells.get(key).unwrap_or(&EMPTY_CELL)
    }

    /// Trimmed, non-empty text for `key`; numbers and dates are rendered
    pub fn text(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.cells.get(key)? {
            CellValue::Empty => None,
            CellValue::Text(text) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then_some(Cow::Borrowed(trimmed))
            }
            CellValue::Number(number) => Some(Cow::Owned(number.to_string())),
            CellValue::Date(date) => Some(Cow::Owned(date.format("%Y-%m-%d").to_string())),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        !self.cell(key).is_blank()
    }

    pub fn is_blank(&self) -> bool {
        self.cells.values().all(CellValue::is_blank)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }
}

/// A row-scoped failure reported back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(rename = "row")]
    pub row_number: usize,
    #[serde(rename = "error")]
    pub message: String,
}

impl ValidationError {
    pub fn new<S: Into<String>>(row_number: usize, message: S) -> Self {
        Self {
            row_number,
            message: message.into(),
        }
    }
}

/// Every reason a single row was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowRejection {
    pub row_number: usize,
    pub messages: Vec<String>,
}

impl RowRejection {
    pub fn into_validation_error(self) -> ValidationError {
        ValidationError::new(self.row_number, self.messages.join("; "))
    }
}

/// Outcome of a completed import job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportJobResult {
    pub created_count: usize,
    pub errors: Vec<ValidationError>,
}
