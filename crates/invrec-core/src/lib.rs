//! Core library for purchase-invoice ingestion and reconciliation.
//!
//! This crate provides:
//! - Spreadsheet decoding (CSV, XLSX, XLS, ODS) with keyword column mapping
//! - XML e-invoice parsing with dialect detection (UBL, UBL-TR, XRechnung,
//!   ZUGFeRD, ebInterface, eSLOG) and generic field extraction
//! - Product matching against a catalog and per-supplier code mappings
//! - Price drift detection and pro-rata allocation of shared costs
//! - Assembly of a normalized invoice record with recomputed totals

pub mod allocation;
pub mod assembler;
pub mod error;
pub mod matching;
pub mod models;
pub mod selector;
pub mod session;
pub mod sheet;
pub mod values;
pub mod xml;

pub use allocation::ExpenseAllocator;
pub use error::{ImportError, InvrecError, MappingError, Result};
pub use matching::{
    CancelToken, CodeMappingSource, MatchPass, ProductMatcher, StaticMappingSource, SupplierCodeCache,
    SupplierSuggestion,
};
pub use models::catalog::{Product, ProductCatalog, ProductId, Supplier, SupplierCodeMapping, SupplierId};
pub use models::config::{EngineConfig, ImportOptions};
pub use models::invoice::{InvoiceHeader, InvoiceTotals, MatchSummary, NormalizedInvoice, SharedExpenses, SourceFormat};
pub use models::line::{
    AllocatedLineItem, DriftDirection, ManualMatch, MatchSource, MatchStatus, MatchedLineItem, ProductMatch,
    RawLineItem,
};
pub use session::{ImportSession, Inspection, SourceKind, inspect};
pub use sheet::{SheetField, SheetKind};
pub use xml::XmlDialect;
