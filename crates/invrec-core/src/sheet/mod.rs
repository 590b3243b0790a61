//! Spreadsheet ingestion (CSV, XLSX, XLS, ODS).
//!
//! The first sheet is decoded into a grid, the first non-blank row is taken
//! as the header, columns are assigned to semantic fields by keyword, and
//! every non-blank data row becomes one line item.

pub mod decode;
pub mod extract;
pub mod mapper;

pub use decode::Sheet;
pub use extract::SpreadsheetDocument;
pub use mapper::{ColumnMapping, SheetField};

use serde::{Deserialize, Serialize};

use crate::error::ImportError;

type Result<T> = std::result::Result<T, ImportError>;

/// Tabular container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetKind {
    Csv,
    Xlsx,
    Xls,
    Ods,
}

impl SheetKind {
    /// Detect by file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" | "txt" | "tsv" => Some(SheetKind::Csv),
            "xlsx" | "xlsm" => Some(SheetKind::Xlsx),
            "xls" => Some(SheetKind::Xls),
            "ods" => Some(SheetKind::Ods),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SheetKind::Csv => "CSV",
            SheetKind::Xlsx => "XLSX",
            SheetKind::Xls => "XLS",
            SheetKind::Ods => "ODS",
        }
    }
}
