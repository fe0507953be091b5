//! Computed cell values.

use std::fmt;

use super::format::format_number;

/// Discriminant of a [`CellValue`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Number,
    Text,
}

/// The result of evaluating a cell.
///
/// Accessors are lenient: asking a text value for its number yields `0.0`,
/// and asking a number for its text yields the empty string.
#[derive(Clone, Debug, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

impl CellValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            CellValue::Number(_) => ValueKind::Number,
            CellValue::Text(_) => ValueKind::Text,
        }
    }

    pub fn as_number(&self) -> f64 {
        match self {
            CellValue::Number(n) => *n,
            CellValue::Text(_) => 0.0,
        }
    }

    pub fn as_text(&self) -> &str {
        match self {
            CellValue::Number(_) => "",
            CellValue::Text(s) => s,
        }
    }

    /// Text shown for this value in a grid or an export.
    pub fn display_string(&self) -> String {
        match self {
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Text(String::new())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}
