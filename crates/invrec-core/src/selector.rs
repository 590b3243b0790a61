//! First-match field resolution over loosely-structured documents.
//!
//! Every extracted field is described by a [`FieldSelector`]: an ordered list
//! of candidate selectors. Each candidate is a pure lookup against a
//! [`SelectorSource`] (an XML element, a spreadsheet row), and the first one
//! that yields a non-empty value wins.

use tracing::trace;

/// A document node that can answer selector lookups.
pub trait SelectorSource {
    /// Look up a single selector; `None` if it does not apply.
    fn select(&self, selector: &str) -> Option<String>;
}

/// Ordered candidate selectors for one field.
#[derive(Debug, Clone, Copy)]
pub struct FieldSelector {
    /// Field name, for diagnostics.
    pub field: &'static str,
    /// Candidates in priority order.
    pub candidates: &'static [&'static str],
}

impl FieldSelector {
    pub const fn new(field: &'static str, candidates: &'static [&'static str]) -> Self {
        Self { field, candidates }
    }

    /// Value of the first candidate that resolves to non-empty text.
    pub fn resolve<S: SelectorSource + ?Sized>(&self, source: &S) -> Option<String> {
        self.resolve_with_candidate(source).map(|(_, value)| value)
    }

    /// Like [`FieldSelector::resolve`], also returning the winning candidate.
    pub fn resolve_with_candidate<S: SelectorSource + ?Sized>(
        &self,
        source: &S,
    ) -> Option<(&'static str, String)> {
        let found = self
            .candidates
            .iter()
            .find_map(|candidate| non_empty(source.select(candidate)).map(|v| (*candidate, v)));

        if let Some((candidate, _)) = &found {
            trace!("{} resolved via {}", self.field, candidate);
        }
        found
    }
}

/// First non-empty (after trimming) value of a lazy sequence of lookups.
pub fn first_non_empty<I>(values: I) -> Option<String>
where
    I: IntoIterator<Item = Option<String>>,
{
    values.into_iter().find_map(non_empty)
}

fn non_empty(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}
