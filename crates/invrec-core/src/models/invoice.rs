//! Invoice-level models: header, totals, summary and the normalized invoice.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::sheet::SheetKind;
use crate::values::MAX_AMOUNT;
use crate::xml::XmlDialect;

use super::catalog::{SupplierCodeMapping, SupplierId};
use super::config::{ExtractionConfig, ImportOptions};
use super::line::{AllocatedLineItem, MatchStatus, RawLineItem};

/// Source document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Tabular file (first sheet only).
    Spreadsheet(SheetKind),
    /// XML e-invoice of the given dialect.
    Xml(XmlDialect),
}

impl SourceFormat {
    /// Human-readable label used in provenance notes.
    pub fn label(&self) -> &'static str {
        match self {
            SourceFormat::Spreadsheet(kind) => kind.label(),
            SourceFormat::Xml(dialect) => dialect.label(),
        }
    }
}

/// Header fields as found in the document, before defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedHeader {
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub currency: Option<String>,
    pub supplier_name: Option<String>,
    pub supplier_tax_id: Option<String>,
}

impl ExtractedHeader {
    /// Apply operator overrides and defaults.
    pub fn resolve(
        self,
        format: SourceFormat,
        file_name: &str,
        options: &ImportOptions,
        config: &ExtractionConfig,
    ) -> InvoiceHeader {
        let ingestion_date = options.ingestion_date();

        let (invoice_number, invoice_number_generated) =
            match options.invoice_number.clone().or(self.invoice_number) {
                Some(number) => (number, false),
                None => (generated_invoice_number(ingestion_date, file_name), true),
            };

        InvoiceHeader {
            source_format: format,
            invoice_number,
            invoice_number_generated,
            invoice_date: options
                .invoice_date
                .or(self.invoice_date)
                .unwrap_or(ingestion_date),
            due_date: options.due_date.or(self.due_date),
            currency: self
                .currency
                .map(|c| c.trim().to_uppercase())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| config.default_currency.clone()),
            supplier_name: self.supplier_name,
            supplier_tax_id: self.supplier_tax_id,
        }
    }
}

/// Invoice number used when the source carries none.
pub fn generated_invoice_number(date: NaiveDate, file_name: &str) -> String {
    let stem = file_name.rsplit_once('.').map_or(file_name, |(stem, _)| stem);
    let tag: String = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(12)
        .collect::<String>()
        .to_uppercase();

    if tag.is_empty() {
        format!("IMP-{}", date.format("%Y%m%d"))
    } else {
        format!("IMP-{}-{}", date.format("%Y%m%d"), tag)
    }
}

/// Resolved invoice header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    pub source_format: SourceFormat,

    pub invoice_number: String,

    /// The invoice number was generated, not read from the source.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub invoice_number_generated: bool,

    pub invoice_date: NaiveDate,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    pub currency: String,

    /// Supplier name printed on the document; only a hint for the operator.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_tax_id: Option<String>,
}

/// Totals declared by the document itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredTotals {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtotal: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tax: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grand_total: Option<Decimal>,
}

impl DeclaredTotals {
    pub fn is_empty(&self) -> bool {
        self.subtotal.is_none() && self.total_tax.is_none() && self.grand_total.is_none()
    }
}

/// Output of either extractor: typed header fields and raw lines.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub format: SourceFormat,
    pub header: ExtractedHeader,
    pub lines: Vec<RawLineItem>,
    pub declared: Option<DeclaredTotals>,
}

/// Shared invoice-level costs to spread over the lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedExpenses {
    pub transport: Decimal,
    pub customs: Decimal,
    pub other: Decimal,
}

impl SharedExpenses {
    fn named(&self) -> [(&'static str, Decimal); 3] {
        [
            ("transport", self.transport),
            ("customs", self.customs),
            ("other", self.other),
        ]
    }

    /// Reject negative amounts and amounts above [`MAX_AMOUNT`].
    pub fn check(&self) -> Result<(), ImportError> {
        match self
            .named()
            .into_iter()
            .find(|(_, amount)| *amount < Decimal::ZERO || *amount > MAX_AMOUNT)
        {
            Some((name, amount)) => Err(ImportError::InvalidExpense {
                name: name.to_string(),
                amount,
            }),
            None => Ok(()),
        }
    }

    /// Sum of all named expenses.
    pub fn total(&self) -> Decimal {
        self.named()
            .into_iter()
            .fold(Decimal::ZERO, |sum, (_, amount)| sum.saturating_add(amount))
    }
}

/// Totals recomputed from the final line items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub total_tax: Decimal,
    pub shared_expenses: Decimal,
    pub grand_total: Decimal,
}

/// Match statistics for operator feedback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub item_count: usize,
    pub matched: usize,
    pub suggested: usize,
    pub unmatched: usize,
    /// Matched lines as a percentage of all lines (1 decimal place).
    pub match_percent: Decimal,
}

impl MatchSummary {
    /// Count statuses.
    pub fn from_statuses(statuses: impl IntoIterator<Item = MatchStatus>) -> Self {
        let mut summary = Self::default();
        for status in statuses {
            summary.item_count += 1;
            match status {
                MatchStatus::Matched => summary.matched += 1,
                MatchStatus::Suggested => summary.suggested += 1,
                MatchStatus::Unmatched => summary.unmatched += 1,
            }
        }
        if summary.item_count > 0 {
            let percent = Decimal::from(summary.matched as u64) * Decimal::ONE_HUNDRED
                / Decimal::from(summary.item_count as u64);
            summary.match_percent = crate::values::round_to(percent, 1);
        }
        summary
    }
}

/// The final invoice record handed to persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedInvoice {
    /// Organizational unit the purchase belongs to.
    pub branch: String,

    /// Operator-selected supplier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<SupplierId>,

    pub header: InvoiceHeader,

    pub lines: Vec<AllocatedLineItem>,

    pub expenses: SharedExpenses,

    pub totals: InvoiceTotals,

    /// Totals as declared in the source, when it had any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declared_totals: Option<DeclaredTotals>,

    pub summary: MatchSummary,

    /// Origin of the record (file name and format).
    pub provenance: String,

    /// Supplier-code mappings learned during this import.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub learned_mappings: Vec<SupplierCodeMapping>,

    /// Advisory issues for the operator.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl NormalizedInvoice {
    /// Check invariants and completeness; returns human-readable issues.
    ///
    /// None of these block saving.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        let tolerance = Decimal::new(1, 2);

        if self.branch.trim().is_empty() {
            issues.push("Missing branch".to_string());
        }

        if self.supplier_id.is_none() {
            issues.push("No supplier selected".to_string());
        }

        let expected_grand =
            self.totals.subtotal + self.totals.total_tax + self.totals.shared_expenses;
        if (expected_grand - self.totals.grand_total).abs() > tolerance {
            issues.push(format!(
                "Grand total ({}) differs from subtotal + tax + expenses ({})",
                self.totals.grand_total, expected_grand
            ));
        }

        let allocated: Decimal = self.lines.iter().map(|l| l.expense_share).sum();
        if !self.totals.subtotal.is_zero()
            && (allocated - self.totals.shared_expenses).abs() > tolerance
        {
            issues.push(format!(
                "Allocated expenses ({}) differ from shared expense total ({})",
                allocated, self.totals.shared_expenses
            ));
        }

        for line in &self.lines {
            let raw = &line.item.line;
            if raw.needs_manual_entry {
                issues.push(format!("Line {} requires manual entry", raw.line_no));
            }
            if raw.quantity.is_zero() {
                issues.push(format!("Line {} has zero quantity", raw.line_no));
            }
            if raw.unit_price.is_zero() && !raw.needs_manual_entry {
                issues.push(format!("Line {} has zero unit price", raw.line_no));
            }
        }

        if self.summary.suggested > 0 {
            issues.push(format!(
                "{} line(s) have suggested matches awaiting confirmation",
                self.summary.suggested
            ));
        }
        if self.summary.unmatched > 0 {
            issues.push(format!("{} line(s) are unmatched", self.summary.unmatched));
        }

        if let Some(declared) = &self.declared_totals {
            issues.extend(declared_discrepancies(declared, &self.totals));
        }

        issues
    }
}

/// Differences between declared and computed totals beyond rounding.
pub fn declared_discrepancies(declared: &DeclaredTotals, computed: &InvoiceTotals) -> Vec<String> {
    let tolerance = Decimal::new(1, 2);
    let checks = [
        ("subtotal", declared.subtotal, computed.subtotal),
        ("tax", declared.total_tax, computed.total_tax),
        (
            "grand total",
            declared.grand_total,
            computed.subtotal.saturating_add(computed.total_tax),
        ),
    ];

    checks
        .into_iter()
        .filter_map(|(name, declared, computed)| {
            let declared = declared?;
            let differs = declared
                .checked_sub(computed)
                .is_none_or(|diff| diff.abs() > tolerance);
            differs.then(|| {
                format!(
                    "Declared {} ({}) differs from computed {} ({})",
                    name, declared, name, computed
                )
            })
        })
        .collect()
}
