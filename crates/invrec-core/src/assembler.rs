//! Final invoice assembly: totals, statistics and provenance.

use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::models::catalog::{SupplierCodeMapping, SupplierId};
use crate::models::config::PricingConfig;
use crate::models::invoice::{
    DeclaredTotals, InvoiceHeader, InvoiceTotals, MatchSummary, NormalizedInvoice, SharedExpenses,
    SourceFormat, declared_discrepancies,
};
use crate::models::line::AllocatedLineItem;
use crate::values::round_to;

/// Everything the assembler combines into one invoice.
#[derive(Debug, Clone)]
pub struct InvoiceParts {
    pub branch: String,
    pub supplier_id: Option<SupplierId>,
    pub file_name: String,
    pub header: InvoiceHeader,
    pub lines: Vec<AllocatedLineItem>,
    pub expenses: SharedExpenses,
    pub declared: Option<DeclaredTotals>,
    pub learned_mappings: Vec<SupplierCodeMapping>,
    pub warnings: Vec<String>,
}

/// Totals recomputed from final lines; declared totals are never used here.
///
/// Sums saturate instead of overflowing; line amounts are bounded by
/// [`crate::values::MAX_AMOUNT`] so this only matters for hand-built lines.
pub fn compute_totals(
    lines: &[AllocatedLineItem],
    expenses: &SharedExpenses,
    pricing: &PricingConfig,
) -> InvoiceTotals {
    let dp = pricing.money_precision;
    let subtotal = round_to(
        lines
            .iter()
            .map(|l| l.item.line.net_total)
            .fold(Decimal::ZERO, Decimal::saturating_add),
        dp,
    );
    let total_tax = lines
        .iter()
        .map(|l| l.tax_amount)
        .fold(Decimal::ZERO, Decimal::saturating_add);
    let shared_expenses = round_to(expenses.total(), dp);

    InvoiceTotals {
        subtotal,
        total_tax,
        shared_expenses,
        grand_total: subtotal.saturating_add(total_tax).saturating_add(shared_expenses),
    }
}

/// Origin note stored with the invoice.
pub fn provenance(file_name: &str, format: SourceFormat) -> String {
    format!("Imported from {} ({})", file_name, format.label())
}

/// Build the normalized invoice.
pub fn assemble(parts: InvoiceParts, pricing: &PricingConfig) -> NormalizedInvoice {
    let totals = compute_totals(&parts.lines, &parts.expenses, pricing);
    let summary = MatchSummary::from_statuses(parts.lines.iter().map(|l| l.item.status()));

    let mut warnings = parts.warnings;
    if let Some(declared) = &parts.declared {
        for discrepancy in declared_discrepancies(declared, &totals) {
            warn!("{}", discrepancy);
            warnings.push(discrepancy);
        }
    }

    info!(
        "Assembled invoice {}: {} line(s), {}% matched, grand total {} {}",
        parts.header.invoice_number,
        summary.item_count,
        summary.match_percent,
        totals.grand_total,
        parts.header.currency
    );

    NormalizedInvoice {
        branch: parts.branch,
        supplier_id: parts.supplier_id,
        provenance: provenance(&parts.file_name, parts.header.source_format),
        header: parts.header,
        lines: parts.lines,
        expenses: parts.expenses,
        totals,
        declared_totals: parts.declared,
        summary,
        learned_mappings: parts.learned_mappings,
        warnings,
    }
}
