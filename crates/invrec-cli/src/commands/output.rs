//! Rendering of imported invoices.

use invrec_core::models::line::PriceDrift;
use invrec_core::{DriftDirection, MatchStatus, NormalizedInvoice};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (the full invoice record)
    Json,
    /// CSV output, one row per line item
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub fn format_invoice(invoice: &NormalizedInvoice, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(invoice)?),
        OutputFormat::Csv => format_csv(invoice),
        OutputFormat::Text => Ok(format_text(invoice)),
    }
}

fn format_csv(invoice: &NormalizedInvoice) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "invoice_number",
        "line_no",
        "source_row",
        "supplier_code",
        "internal_code",
        "description",
        "quantity",
        "unit",
        "unit_price",
        "tax_rate",
        "tax_amount",
        "net_total",
        "status",
        "product_id",
        "expense_share",
        "landed_unit_price",
        "last_price",
        "drift_percent",
        "drift",
    ])?;

    for line in &invoice.lines {
        let item = &line.item;
        let raw = &item.line;
        wtr.write_record([
            invoice.header.invoice_number.as_str(),
            &raw.line_no.to_string(),
            &raw.source_row.to_string(),
            raw.supplier_code.as_deref().unwrap_or(""),
            raw.internal_code.as_deref().unwrap_or(""),
            &raw.description,
            &raw.quantity.to_string(),
            &raw.unit,
            &raw.unit_price.to_string(),
            &raw.tax_rate.to_string(),
            &line.tax_amount.to_string(),
            &raw.net_total.to_string(),
            item.status().as_str(),
            &item
                .product_match
                .product_id()
                .map(|id| id.to_string())
                .unwrap_or_default(),
            &line.expense_share.to_string(),
            &line.landed_unit_price.to_string(),
            &item.last_price.map(|p| p.to_string()).unwrap_or_default(),
            &item
                .price_drift
                .and_then(|d| d.percent)
                .map(|p| p.to_string())
                .unwrap_or_default(),
            item.price_drift.map(|d| drift_label(&d)).unwrap_or(""),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(invoice: &NormalizedInvoice) -> String {
    let header = &invoice.header;
    let currency = &header.currency;
    let mut output = String::new();

    output.push_str(&format!("Invoice: {}", header.invoice_number));
    if header.invoice_number_generated {
        output.push_str(" (generated)");
    }
    output.push('\n');
    output.push_str(&format!("Date: {}\n", header.invoice_date));
    if let Some(due_date) = header.due_date {
        output.push_str(&format!("Due: {}\n", due_date));
    }
    output.push_str(&format!("Branch: {}\n", invoice.branch));
    if let Some(supplier) = &invoice.supplier_id {
        output.push_str(&format!("Supplier: {}\n", supplier));
    }
    if let Some(name) = &header.supplier_name {
        output.push_str(&format!("Supplier on document: {}\n", name));
    }
    output.push_str(&format!("{}\n", invoice.provenance));
    output.push('\n');

    output.push_str("Lines:\n");
    for line in &invoice.lines {
        let item = &line.item;
        let raw = &item.line;
        let target = match item.product_match.product_id() {
            Some(id) => format!(" -> {}", id),
            None => String::new(),
        };
        output.push_str(&format!(
            "  {} {:>3}. {} | {} {} x {} = {}{}\n",
            status_mark(item.status()),
            raw.line_no,
            raw.description,
            raw.quantity,
            raw.unit,
            raw.unit_price,
            raw.net_total,
            target
        ));
        if !line.expense_share.is_zero() {
            output.push_str(&format!(
                "         landed {} (+{} per unit)\n",
                line.landed_unit_price, line.unit_expense
            ));
        }
        if let Some(drift) = &item.price_drift {
            if drift.direction != DriftDirection::New {
                output.push_str(&format!(
                    "         price {} {}% vs last {}\n",
                    drift_label(drift),
                    drift.percent.unwrap_or_default(),
                    item.last_price.unwrap_or_default()
                ));
            }
        }
    }
    output.push('\n');

    let totals = &invoice.totals;
    output.push_str("Totals:\n");
    output.push_str(&format!("  Subtotal: {} {}\n", totals.subtotal, currency));
    output.push_str(&format!("  Tax:      {} {}\n", totals.total_tax, currency));
    output.push_str(&format!("  Expenses: {} {}\n", totals.shared_expenses, currency));
    output.push_str(&format!("  Total:    {} {}\n", totals.grand_total, currency));
    output.push('\n');

    let summary = &invoice.summary;
    output.push_str(&format!(
        "Matched: {}/{} ({}%), {} suggested, {} unmatched\n",
        summary.matched, summary.item_count, summary.match_percent, summary.suggested, summary.unmatched
    ));

    if !invoice.learned_mappings.is_empty() {
        output.push_str(&format!(
            "Learned {} new supplier code mapping(s)\n",
            invoice.learned_mappings.len()
        ));
    }

    if !invoice.warnings.is_empty() {
        output.push_str("\nWarnings:\n");
        for warning in &invoice.warnings {
            output.push_str(&format!("  - {}\n", warning));
        }
    }

    output
}

pub fn status_mark(status: MatchStatus) -> &'static str {
    match status {
        MatchStatus::Matched => "✓",
        MatchStatus::Suggested => "?",
        MatchStatus::Unmatched => "✗",
    }
}

fn drift_label(drift: &PriceDrift) -> &'static str {
    match drift.direction {
        DriftDirection::Up => "up",
        DriftDirection::Down => "down",
        DriftDirection::Same => "same",
        DriftDirection::New => "new",
    }
}
