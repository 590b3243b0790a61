//! Line-item models for each pipeline stage.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::values::{DEFAULT_UNIT, MAX_AMOUNT, normalize_unit, parse_decimal, round_to};

use super::catalog::ProductId;

/// One line extracted from the source document, before matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLineItem {
    /// Dense 1-based ordinal in source order.
    pub line_no: u32,

    /// 1-based row (spreadsheet) or container position (XML) in the source.
    pub source_row: u32,

    /// Supplier-side product code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_code: Option<String>,

    /// Internal product code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_code: Option<String>,

    /// Product description, never empty.
    pub description: String,

    /// Quantity (defaults to 1).
    pub quantity: Decimal,

    /// Normalized unit-of-measure code.
    pub unit: String,

    /// Net unit price (never negative).
    pub unit_price: Decimal,

    /// Tax rate in percent.
    pub tax_rate: Decimal,

    /// Quantity × unit price.
    pub net_total: Decimal,

    /// Synthesized because the document had no extractable lines.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub needs_manual_entry: bool,

    /// Fields that were replaced by their defaults after being read.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RawLineItem {
    /// Placeholder line for documents without any extractable line item.
    pub fn placeholder(description: &str, default_tax_rate: Decimal) -> Self {
        Self {
            line_no: 1,
            source_row: 1,
            supplier_code: None,
            internal_code: None,
            description: description.to_string(),
            quantity: Decimal::ONE,
            unit: DEFAULT_UNIT.to_string(),
            unit_price: Decimal::ZERO,
            tax_rate: default_tax_rate,
            net_total: Decimal::ZERO,
            needs_manual_entry: true,
            warnings: Vec::new(),
        }
    }

    /// Tax amount for this line, rounded to `dp` places.
    pub fn tax_amount(&self, dp: u32) -> Decimal {
        self.net_total
            .checked_mul(self.tax_rate)
            .map_or(Decimal::ZERO, |tax| round_to(tax / Decimal::ONE_HUNDRED, dp))
    }
}

/// Loosely-typed field values of one source line, as read from the document.
///
/// [`LineFields::resolve`] applies the default-substitution rules once, so
/// every later stage works on a complete [`RawLineItem`].
#[derive(Debug, Clone, Default)]
pub struct LineFields {
    pub supplier_code: Option<String>,
    pub internal_code: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<String>,
    pub unit: Option<String>,
    pub unit_price: Option<String>,
    pub tax_rate: Option<String>,
    /// Declared line net total, used when the unit price is missing.
    pub line_total: Option<String>,
}

impl LineFields {
    /// True if no field carries a value.
    pub fn is_blank(&self) -> bool {
        [
            &self.supplier_code,
            &self.internal_code,
            &self.description,
            &self.quantity,
            &self.unit,
            &self.unit_price,
            &self.tax_rate,
            &self.line_total,
        ]
        .iter()
        .all(|f| f.as_deref().is_none_or(|v| v.trim().is_empty()))
    }

    /// Build a typed line item, substituting documented defaults.
    pub fn resolve(self, line_no: u32, source_row: u32, default_tax_rate: Decimal) -> RawLineItem {
        let quantity = self
            .quantity
            .as_deref()
            .and_then(parse_decimal)
            .unwrap_or(Decimal::ONE);

        let unit_price = self
            .unit_price
            .as_deref()
            .and_then(parse_decimal)
            .or_else(|| {
                let total = self.line_total.as_deref().and_then(parse_decimal)?;
                total.checked_div(quantity)
            })
            .filter(|p| !p.is_sign_negative())
            .unwrap_or(Decimal::ZERO);

        let tax_rate = self
            .tax_rate
            .as_deref()
            .and_then(parse_decimal)
            .unwrap_or(default_tax_rate);

        let description = non_empty(self.description).unwrap_or_else(|| format!("Row {}", source_row));

        let mut warnings = Vec::new();
        let (unit_price, net_total) = match line_amount(quantity, unit_price, tax_rate) {
            Some(net_total) => (unit_price, net_total),
            None => {
                warn!(
                    "Line {}: {} x {} is out of range, unit price set to 0",
                    line_no, quantity, unit_price
                );
                warnings.push(format!(
                    "quantity {} x unit price {} is out of range; unit price set to 0",
                    quantity, unit_price
                ));
                (Decimal::ZERO, Decimal::ZERO)
            }
        };

        RawLineItem {
            line_no,
            source_row,
            supplier_code: non_empty(self.supplier_code),
            internal_code: non_empty(self.internal_code),
            description,
            quantity,
            unit: normalize_unit(self.unit.as_deref().unwrap_or("")),
            unit_price,
            tax_rate,
            net_total,
            needs_manual_entry: false,
            warnings,
        }
    }
}

/// Net total of a line, if it and its tax stay within [`MAX_AMOUNT`].
fn line_amount(quantity: Decimal, unit_price: Decimal, tax_rate: Decimal) -> Option<Decimal> {
    let net_total = quantity.checked_mul(unit_price)?;
    let tax = net_total.checked_mul(tax_rate)? / Decimal::ONE_HUNDRED;
    (net_total.abs() <= MAX_AMOUNT && tax.abs() <= MAX_AMOUNT).then_some(net_total)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Outcome of the product match cascade for one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProductMatch {
    /// Deterministic match from a code key or an operator override.
    Matched {
        product_id: ProductId,
        product_name: String,
        source: MatchSource,
    },
    /// Similarity-based match; needs operator confirmation.
    Suggested {
        product_id: ProductId,
        product_name: String,
    },
    /// No catalog product found.
    Unmatched,
}

impl ProductMatch {
    /// Flat status of this match.
    pub fn status(&self) -> MatchStatus {
        match self {
            ProductMatch::Matched { .. } => MatchStatus::Matched,
            ProductMatch::Suggested { .. } => MatchStatus::Suggested,
            ProductMatch::Unmatched => MatchStatus::Unmatched,
        }
    }

    /// Product id for any non-empty match.
    pub fn product_id(&self) -> Option<&ProductId> {
        match self {
            ProductMatch::Matched { product_id, .. } | ProductMatch::Suggested { product_id, .. } => {
                Some(product_id)
            }
            ProductMatch::Unmatched => None,
        }
    }

    /// Product id only when the match is authoritative.
    pub fn authoritative_product(&self) -> Option<&ProductId> {
        match self {
            ProductMatch::Matched { product_id, .. } => Some(product_id),
            _ => None,
        }
    }

    /// Cascade step that produced a deterministic match.
    pub fn source(&self) -> Option<MatchSource> {
        match self {
            ProductMatch::Matched { source, .. } => Some(*source),
            _ => None,
        }
    }
}

/// Flat match status, for statistics and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    Suggested,
    Unmatched,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::Suggested => "suggested",
            MatchStatus::Unmatched => "unmatched",
        }
    }
}

/// Where a deterministic match came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    /// Internal product code found in the catalog.
    InternalCode,
    /// Supplier code resolved through the supplier's mapping table.
    SupplierCode,
    /// Operator override.
    Manual,
}

/// Operator override for a single line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManualMatch {
    /// Force this product.
    Product(ProductId),
    /// Force the line to stay unmatched.
    Clear,
}

/// Direction of a price change against the last purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftDirection {
    Up,
    Down,
    Same,
    /// No usable prior price.
    New,
}

/// Price change against the last known purchase price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceDrift {
    /// Percent change, absent for [`DriftDirection::New`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<Decimal>,
    pub direction: DriftDirection,
}

/// A raw line plus its match result and price history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedLineItem {
    #[serde(flatten)]
    pub line: RawLineItem,

    #[serde(rename = "match")]
    pub product_match: ProductMatch,

    /// Operator override pinned on this line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual: Option<ManualMatch>,

    /// Last purchase price for this product from the selected supplier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_price: Option<Decimal>,

    /// Last landed price for this product from the selected supplier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_landed_price: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_drift: Option<PriceDrift>,
}

impl MatchedLineItem {
    /// Wrap a raw line with no match.
    pub fn unmatched(line: RawLineItem) -> Self {
        Self {
            line,
            product_match: ProductMatch::Unmatched,
            manual: None,
            last_price: None,
            last_landed_price: None,
            price_drift: None,
        }
    }

    pub fn status(&self) -> MatchStatus {
        self.product_match.status()
    }
}

/// A matched line with its share of shared invoice costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedLineItem {
    #[serde(flatten)]
    pub item: MatchedLineItem,

    /// Tax amount for the line.
    pub tax_amount: Decimal,

    /// Share of the shared expense total.
    pub expense_share: Decimal,

    /// Share divided by quantity (zero for zero quantity).
    pub unit_expense: Decimal,

    /// Unit price plus per-unit expense.
    pub landed_unit_price: Decimal,
}
