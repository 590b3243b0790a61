//! Supplier suggestion from the document's own supplier fields.
//!
//! The result is only a hint for the operator; it never replaces a selected
//! supplier.

use crate::models::catalog::Supplier;
use crate::models::invoice::InvoiceHeader;
use crate::values::fold_text;

/// A supplier proposed for the operator to confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplierSuggestion<'a> {
    /// Tax identifiers agree.
    Exact(&'a Supplier),
    /// Names contain one another.
    Similar(&'a Supplier),
}

impl<'a> SupplierSuggestion<'a> {
    pub fn supplier(&self) -> &'a Supplier {
        match self {
            SupplierSuggestion::Exact(s) | SupplierSuggestion::Similar(s) => s,
        }
    }
}

/// Propose a known supplier for the document.
pub fn suggest_supplier<'a>(
    suppliers: &'a [Supplier],
    header: &InvoiceHeader,
) -> Option<SupplierSuggestion<'a>> {
    if let Some(tax_id) = header.supplier_tax_id.as_deref().map(normalize_tax_id) {
        if !tax_id.is_empty() {
            let exact = suppliers.iter().find(|s| {
                s.tax_id
                    .as_deref()
                    .map(normalize_tax_id)
                    .is_some_and(|candidate| same_tax_id(&candidate, &tax_id))
            });
            if let Some(supplier) = exact {
                return Some(SupplierSuggestion::Exact(supplier));
            }
        }
    }

    let name = fold_text(header.supplier_name.as_deref()?.trim());
    if name.is_empty() {
        return None;
    }
    suppliers
        .iter()
        .find(|s| {
            let candidate = fold_text(s.name.trim());
            !candidate.is_empty() && (candidate.contains(&name) || name.contains(&candidate))
        })
        .map(SupplierSuggestion::Similar)
}

fn normalize_tax_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Equal, or equal once a two-letter country prefix is dropped from either side.
fn same_tax_id(a: &str, b: &str) -> bool {
    a == b || strip_country(a) == strip_country(b)
}

fn strip_country(id: &str) -> &str {
    let bytes = id.as_bytes();
    if bytes.len() > 2 && bytes[0].is_ascii_alphabetic() && bytes[1].is_ascii_alphabetic() {
        &id[2..]
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::SupplierId;
    use crate::models::invoice::SourceFormat;
    use crate::xml::XmlDialect;
    use chrono::NaiveDate;

    fn supplier(id: &str, name: &str, tax_id: Option<&str>) -> Supplier {
        Supplier {
            id: SupplierId::from(id),
            name: name.to_string(),
            tax_id: tax_id.map(str::to_string),
        }
    }

    fn header(name: Option<&str>, tax_id: Option<&str>) -> InvoiceHeader {
        InvoiceHeader {
            source_format: SourceFormat::Xml(XmlDialect::Ubl),
            invoice_number: "1".to_string(),
            invoice_number_generated: false,
            invoice_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            due_date: None,
            currency: "EUR".to_string(),
            supplier_name: name.map(str::to_string),
            supplier_tax_id: tax_id.map(str::to_string),
        }
    }

    #[test]
    fn test_tax_id_match_with_country_prefix() {
        let suppliers = vec![
            supplier("1", "Mesnica d.o.o.", Some("SI12345678")),
            supplier("2", "Mlekarna", Some("87654321")),
        ];

        let found = suggest_supplier(&suppliers, &header(None, Some("12345678")));
        assert_eq!(found, Some(SupplierSuggestion::Exact(&suppliers[0])));

        let found = suggest_supplier(&suppliers, &header(None, Some("SI 876-543-21")));
        assert_eq!(found, Some(SupplierSuggestion::Exact(&suppliers[1])));
    }

    #[test]
    fn test_name_fallback() {
        let suppliers = vec![supplier("1", "Güneş Gıda", None)];
        let found = suggest_supplier(&suppliers, &header(Some("GUNES GIDA SAN. TIC. A.S."), Some("999")));
        assert_eq!(found.map(|s| s.supplier().id.0.as_str()), Some("1"));
        assert!(matches!(found, Some(SupplierSuggestion::Similar(_))));
    }

    #[test]
    fn test_nothing_to_suggest() {
        let suppliers = vec![supplier("1", "Acme", None)];
        assert_eq!(suggest_supplier(&suppliers, &header(None, None)), None);
        assert_eq!(suggest_supplier(&suppliers, &header(Some("Other"), None)), None);
    }
}
