//! Error types for the invrec-core library.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the invrec library.
#[derive(Error, Debug)]
pub enum InvrecError {
    /// Fatal import error (unreadable or malformed source document).
    #[error("import error: {0}")]
    Import(#[from] ImportError),

    /// Supplier code-mapping source error.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors that abort an import before any line item is produced.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The file is neither a known spreadsheet format nor XML.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// The file bytes could not be read or decoded.
    #[error("unreadable file: {0}")]
    Unreadable(String),

    /// The XML document is not well-formed.
    #[error("malformed XML: {reason}")]
    MalformedXml { reason: String },

    /// The spreadsheet could not be parsed.
    #[error("malformed spreadsheet: {reason}")]
    MalformedSheet { reason: String },

    /// The XML document has no root element.
    #[error("document has no root element")]
    EmptyDocument,

    /// The spreadsheet has no data rows beyond the header.
    #[error("spreadsheet needs a header row and at least one data row, found {found} non-empty row(s)")]
    TooFewRows { found: usize },

    /// An operator column override points outside the sheet.
    #[error("column {column} for {field} is out of range (sheet has {width} columns)")]
    InvalidColumn {
        field: String,
        column: usize,
        width: usize,
    },

    /// An operator line override references a line that does not exist.
    #[error("line {0} does not exist")]
    UnknownLine(u32),

    /// An operator line override names a product missing from the catalog.
    #[error("product {0} is not in the catalog")]
    UnknownProduct(String),

    /// A spreadsheet import was started without selecting a supplier.
    #[error("a supplier must be selected before importing spreadsheet {0}")]
    MissingSupplier(String),

    /// A shared expense amount is negative or out of range.
    #[error("{name} expense {amount} must be between 0 and 10^18")]
    InvalidExpense { name: String, amount: Decimal },

    /// A match pass was interrupted and its results are only a preview.
    #[error("matching was interrupted after {matched} of {total} lines")]
    Incomplete { matched: usize, total: usize },
}

/// Errors raised while loading a supplier's code-mapping table.
#[derive(Error, Debug)]
pub enum MappingError {
    /// The mapping table could not be fetched.
    #[error("failed to load mappings for supplier {supplier}: {reason}")]
    Load { supplier: String, reason: String },

    /// The mapping table was fetched but could not be decoded.
    #[error("invalid mapping data for supplier {supplier}: {reason}")]
    Invalid { supplier: String, reason: String },
}

/// Result type for the invrec library.
pub type Result<T> = std::result::Result<T, InvrecError>;
