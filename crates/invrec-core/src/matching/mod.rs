//! Product matching: supplier code cache, match cascade, price drift and
//! supplier suggestion.

pub mod cache;
pub mod matcher;
pub mod price;
pub mod supplier;

pub use cache::{CodeMappingSource, StaticMappingSource, SupplierCodeCache};
pub use matcher::ProductMatcher;
pub use supplier::{SupplierSuggestion, suggest_supplier};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::models::line::MatchedLineItem;

/// Cooperative cancellation flag shared between a match pass and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the running pass before its next line.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Result of one pass of the matcher over a line set.
///
/// An incomplete pass holds the lines matched before cancellation, in
/// source order. It may be shown as a preview but is never final.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchPass {
    pub items: Vec<MatchedLineItem>,
    pub complete: bool,
}
