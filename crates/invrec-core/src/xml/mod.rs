//! XML e-invoice ingestion.

pub mod dialect;
pub mod document;
pub mod extract;

pub use dialect::{XmlDialect, detect};
pub use document::{XmlDocument, XmlElement};
