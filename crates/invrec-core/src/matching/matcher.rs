//! The product match cascade.
//!
//! Steps, first success wins:
//! 1. internal code looked up in the catalog (`matched`);
//! 2. supplier code resolved through the selected supplier's mapping table
//!    (`matched`, with price history);
//! 3. bidirectional substring containment of description and product name
//!    (`suggested`);
//! 4. `unmatched`.
//!
//! An operator override replaces the cascade for its line.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::models::catalog::{Product, ProductCatalog, ProductId, SupplierCodeMapping};
use crate::models::config::{MatchingConfig, PricingConfig};
use crate::models::line::{ManualMatch, MatchSource, MatchedLineItem, ProductMatch, RawLineItem};
use crate::values::fold_text;

use super::cache::SupplierCodeCache;
use super::price;
use super::{CancelToken, MatchPass};

/// Matches lines against a catalog and the loaded supplier mapping table.
///
/// Holds only borrowed, read-only state, so matching one line never
/// affects another.
#[derive(Debug, Clone, Copy)]
pub struct ProductMatcher<'a> {
    catalog: &'a ProductCatalog,
    cache: &'a SupplierCodeCache,
    min_fuzzy_length: usize,
    drift_precision: u32,
}

impl<'a> ProductMatcher<'a> {
    pub fn new(
        catalog: &'a ProductCatalog,
        cache: &'a SupplierCodeCache,
        matching: &MatchingConfig,
        pricing: &PricingConfig,
    ) -> Self {
        Self {
            catalog,
            cache,
            min_fuzzy_length: matching.min_fuzzy_length,
            drift_precision: pricing.drift_precision,
        }
    }

    /// Run the full cascade on one line.
    pub fn match_line(&self, line: RawLineItem) -> MatchedLineItem {
        if let Some(product) = self.by_internal_code(&line) {
            let product_match = matched(product, MatchSource::InternalCode);
            return self.with_history(line, product_match, None);
        }
        self.match_supplier_side(line)
    }

    /// Match every line in order, checking `cancel` before each one.
    ///
    /// Lines with an entry in `overrides` take the operator's choice instead
    /// of the cascade.
    pub fn match_all(
        &self,
        lines: &[RawLineItem],
        overrides: &BTreeMap<u32, ManualMatch>,
        cancel: &CancelToken,
    ) -> MatchPass {
        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            if cancel.is_cancelled() {
                info!("Match pass cancelled after {} of {} lines", items.len(), lines.len());
                return MatchPass {
                    items,
                    complete: false,
                };
            }
            let item = match overrides.get(&line.line_no) {
                Some(manual) => self.apply_manual(line.clone(), manual),
                None => self.match_line(line.clone()),
            };
            items.push(item);
        }

        debug!("Matched {} lines", items.len());
        MatchPass {
            items,
            complete: true,
        }
    }

    /// Re-evaluate lines after the supplier changed.
    ///
    /// Internal-code matches keep their product and manual overrides stay
    /// pinned; both get fresh price history. Every other line goes through
    /// the supplier-dependent steps again.
    pub fn rematch(&self, items: &[MatchedLineItem], cancel: &CancelToken) -> MatchPass {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            if cancel.is_cancelled() {
                return MatchPass {
                    items: out,
                    complete: false,
                };
            }

            let line = item.line.clone();
            let rematched = match (&item.manual, &item.product_match) {
                (Some(manual), _) => self.apply_manual(line, manual),
                (
                    None,
                    ProductMatch::Matched {
                        source: MatchSource::InternalCode,
                        ..
                    },
                ) => self.with_history(line, item.product_match.clone(), None),
                _ => self.match_supplier_side(line),
            };
            out.push(rematched);
        }

        MatchPass {
            items: out,
            complete: true,
        }
    }

    /// Apply an operator override to a line.
    pub fn apply_manual(&self, line: RawLineItem, manual: &ManualMatch) -> MatchedLineItem {
        let mut item = match manual {
            ManualMatch::Product(id) => {
                let product_match = ProductMatch::Matched {
                    product_id: id.clone(),
                    product_name: self
                        .catalog
                        .get(id)
                        .map_or_else(|| id.to_string(), |p| p.name.clone()),
                    source: MatchSource::Manual,
                };
                self.with_history(line, product_match, None)
            }
            ManualMatch::Clear => MatchedLineItem::unmatched(line),
        };
        item.manual = Some(manual.clone());
        item
    }

    /// Steps 2 to 4.
    fn match_supplier_side(&self, line: RawLineItem) -> MatchedLineItem {
        if let Some((product, mapping)) = self.by_supplier_code(&line) {
            let product_match = matched(product, MatchSource::SupplierCode);
            return self.with_history(line, product_match, Some(mapping));
        }

        if let Some(product) = self.by_description(&line) {
            debug!("Line {}: suggested {} by description", line.line_no, product.id);
            let mut item = MatchedLineItem::unmatched(line);
            item.product_match = ProductMatch::Suggested {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
            };
            return item;
        }

        debug!("Line {}: unmatched", line.line_no);
        MatchedLineItem::unmatched(line)
    }

    fn by_internal_code(&self, line: &RawLineItem) -> Option<&'a Product> {
        let code = line.internal_code.as_deref()?;
        let product = self.catalog.find_by_internal_code(code)?;
        debug!("Line {}: internal code {} -> {}", line.line_no, code, product.id);
        Some(product)
    }

    fn by_supplier_code(&self, line: &RawLineItem) -> Option<(&'a Product, &'a SupplierCodeMapping)> {
        self.cache.supplier()?;
        let code = line.supplier_code.as_deref()?;
        let mapping = self.cache.lookup(code)?;

        let Some(product) = self.catalog.get(&mapping.product_id) else {
            debug!(
                "Line {}: supplier code {} maps to unknown product {}",
                line.line_no, code, mapping.product_id
            );
            return None;
        };
        debug!("Line {}: supplier code {} -> {}", line.line_no, code, product.id);
        Some((product, mapping))
    }

    fn by_description(&self, line: &RawLineItem) -> Option<&'a Product> {
        if line.needs_manual_entry {
            return None;
        }
        let description = fold_text(line.description.trim());
        if description.is_empty() || description.chars().count() < self.min_fuzzy_length {
            return None;
        }

        self.catalog.iter().find(|product| {
            let name = fold_text(product.name.trim());
            !name.is_empty()
                && name.chars().count() >= self.min_fuzzy_length
                && (name.contains(&description) || description.contains(&name))
        })
    }

    /// Attach last prices and drift to an authoritative match.
    fn with_history(
        &self,
        line: RawLineItem,
        product_match: ProductMatch,
        mapping: Option<&SupplierCodeMapping>,
    ) -> MatchedLineItem {
        let mapping = mapping.or_else(|| {
            product_match
                .authoritative_product()
                .and_then(|id| self.history_for(id))
        });
        let last_price = mapping.and_then(|m| m.last_price);
        let drift = price::compare(line.unit_price, last_price, self.drift_precision);

        MatchedLineItem {
            line,
            product_match,
            manual: None,
            last_price,
            last_landed_price: mapping.and_then(|m| m.last_landed_price),
            price_drift: Some(drift),
        }
    }

    fn history_for(&self, product: &ProductId) -> Option<&'a SupplierCodeMapping> {
        self.cache.supplier()?;
        self.cache.find_by_product(product)
    }
}

fn matched(product: &Product, source: MatchSource) -> ProductMatch {
    ProductMatch::Matched {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::catalog::SupplierId;
    use crate::models::line::{DriftDirection, LineFields, MatchStatus};
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn catalog() -> ProductCatalog {
        ProductCatalog::new(vec![
            Product {
                id: ProductId::from("P1"),
                name: "Dana Kıyma".to_string(),
                internal_code: Some("URN-001".to_string()),
            },
            Product {
                id: ProductId::from("P2"),
                name: "Tavuk Göğüs".to_string(),
                internal_code: Some("URN-002".to_string()),
            },
            Product {
                id: ProductId::from("P3"),
                name: "Süt".to_string(),
                internal_code: None,
            },
        ])
    }

    fn cache(supplier: &str, mappings: &[(&str, &str, Option<Decimal>)]) -> SupplierCodeCache {
        let mut cache = SupplierCodeCache::new();
        cache.replace(
            SupplierId::from(supplier),
            mappings
                .iter()
                .map(|(code, product, last)| SupplierCodeMapping {
                    supplier_code: code.to_string(),
                    product_id: ProductId::from(*product),
                    last_price: *last,
                    last_landed_price: last.map(|p| p + dec!(1)),
                })
                .collect(),
        );
        cache
    }

    fn line(no: u32, supplier_code: Option<&str>, internal_code: Option<&str>, desc: &str, price: &str) -> RawLineItem {
        LineFields {
            supplier_code: supplier_code.map(str::to_string),
            internal_code: internal_code.map(str::to_string),
            description: Some(desc.to_string()),
            unit_price: Some(price.to_string()),
            ..Default::default()
        }
        .resolve(no, no + 1, Decimal::ZERO)
    }

    fn matcher<'a>(catalog: &'a ProductCatalog, cache: &'a SupplierCodeCache) -> ProductMatcher<'a> {
        ProductMatcher::new(catalog, cache, &MatchingConfig::default(), &PricingConfig::default())
    }

    #[test]
    fn test_internal_code_wins() {
        let catalog = catalog();
        let cache = cache("S1", &[("X-2", "P2", Some(dec!(5)))]);
        let item = matcher(&catalog, &cache).match_line(line(1, Some("X-2"), Some("URN-001"), "x", "1"));

        assert_eq!(item.product_match.product_id(), Some(&ProductId::from("P1")));
        assert_eq!(item.product_match.source(), Some(MatchSource::InternalCode));
        assert_eq!(item.price_drift.map(|d| d.direction), Some(DriftDirection::New));
    }

    #[test]
    fn test_supplier_code_with_price_history() {
        let catalog = catalog();
        let cache = cache("S1", &[("X-2", "P2", Some(dec!(100)))]);
        let item = matcher(&catalog, &cache).match_line(line(1, Some("X-2"), None, "whatever", "110"));

        assert_eq!(item.status(), MatchStatus::Matched);
        assert_eq!(item.product_match.source(), Some(MatchSource::SupplierCode));
        assert_eq!(item.last_price, Some(dec!(100)));
        assert_eq!(item.last_landed_price, Some(dec!(101)));
        let drift = item.price_drift.unwrap();
        assert_eq!(drift.percent, Some(dec!(10)));
        assert_eq!(drift.direction, DriftDirection::Up);
    }

    #[test]
    fn test_supplier_code_needs_selected_supplier() {
        let catalog = catalog();
        let empty = SupplierCodeCache::new();
        let item = matcher(&catalog, &empty).match_line(line(1, Some("X-2"), None, "Nothing alike", "1"));
        assert_eq!(item.status(), MatchStatus::Unmatched);
        assert_eq!(item.price_drift, None);
    }

    #[test]
    fn test_fuzzy_match_is_only_suggested() {
        let catalog = catalog();
        let cache = SupplierCodeCache::new();
        let m = matcher(&catalog, &cache);

        // Description contains the product name
        let item = m.match_line(line(1, None, None, "DANA KIYMA %20 yağlı", "1"));
        assert_eq!(item.status(), MatchStatus::Suggested);
        assert_eq!(item.product_match.product_id(), Some(&ProductId::from("P1")));
        assert_eq!(item.product_match.authoritative_product(), None);

        // Product name contains the description
        let item = m.match_line(line(2, None, None, "tavuk", "1"));
        assert_eq!(item.product_match.product_id(), Some(&ProductId::from("P2")));
    }

    #[test]
    fn test_min_fuzzy_length() {
        let catalog = catalog();
        let cache = SupplierCodeCache::new();
        let strict = ProductMatcher::new(
            &catalog,
            &cache,
            &MatchingConfig { min_fuzzy_length: 4 },
            &PricingConfig::default(),
        );

        // "Süt" is shorter than the threshold
        let item = strict.match_line(line(1, None, None, "Süt 1L", "1"));
        assert_eq!(item.status(), MatchStatus::Unmatched);
    }

    #[test]
    fn test_manual_override() {
        let catalog = catalog();
        let cache = cache("S1", &[("X-3", "P3", Some(dec!(2)))]);
        let m = matcher(&catalog, &cache);

        let item = m.apply_manual(line(1, None, None, "milk", "2"), &ManualMatch::Product(ProductId::from("P3")));
        assert_eq!(item.product_match.source(), Some(MatchSource::Manual));
        assert_eq!(item.last_price, Some(dec!(2)));
        assert_eq!(item.price_drift.map(|d| d.direction), Some(DriftDirection::Same));

        let cleared = m.apply_manual(line(2, None, Some("URN-001"), "x", "1"), &ManualMatch::Clear);
        assert_eq!(cleared.status(), MatchStatus::Unmatched);
        assert_eq!(cleared.manual, Some(ManualMatch::Clear));
    }

    #[test]
    fn test_rematch_after_supplier_change() {
        let catalog = catalog();
        let lines = vec![
            line(1, Some("A"), Some("URN-001"), "x", "1"),
            line(2, Some("A"), None, "y", "1"),
            line(3, Some("B"), None, "z", "1"),
        ];

        let first = cache("S1", &[("A", "P2", None)]);
        let pass = matcher(&catalog, &first).match_all(&lines, &BTreeMap::new(), &CancelToken::new());
        assert!(pass.complete);
        let mut items = pass.items;
        items[2] = matcher(&catalog, &first).apply_manual(items[2].line.clone(), &ManualMatch::Product(ProductId::from("P3")));

        let second = cache("S2", &[("A", "P3", None)]);
        let rematched = matcher(&catalog, &second).rematch(&items, &CancelToken::new());

        assert_eq!(rematched.items[0].product_match, items[0].product_match);
        assert_eq!(rematched.items[1].product_match.product_id(), Some(&ProductId::from("P3")));
        assert_eq!(rematched.items[2].product_match.source(), Some(MatchSource::Manual));
        assert_eq!(rematched.items[2].product_match.product_id(), Some(&ProductId::from("P3")));
    }

    #[test]
    fn test_matching_is_idempotent() {
        let catalog = catalog();
        let cache = cache("S1", &[("A", "P2", Some(dec!(3)))]);
        let lines = vec![
            line(1, Some("A"), None, "x", "4"),
            line(2, None, None, "süt", "1"),
            line(3, None, None, "unknown", "1"),
        ];
        let m = matcher(&catalog, &cache);

        let first = m.match_all(&lines, &BTreeMap::new(), &CancelToken::new());
        let again = m.rematch(&first.items, &CancelToken::new());
        assert_eq!(first, again);
    }

    #[test]
    fn test_cancelled_pass_is_incomplete() {
        let catalog = catalog();
        let cache = SupplierCodeCache::new();
        let token = CancelToken::new();
        token.cancel();

        let pass = matcher(&catalog, &cache).match_all(&[line(1, None, None, "x", "1")], &BTreeMap::new(), &token);
        assert!(!pass.complete);
        assert!(pass.items.is_empty());
    }
}
