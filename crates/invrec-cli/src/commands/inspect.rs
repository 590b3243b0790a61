//! Inspect command - show detected format, column mapping and raw lines.

use std::path::PathBuf;

use clap::Args;
use console::style;
use serde_json::json;

use invrec_core::{ImportOptions, Inspection, SheetField, inspect};

use super::config::load_config;

/// Arguments for the inspect command.
#[derive(Args)]
pub struct InspectArgs {
    /// Input file (CSV, XLSX, XLS, ODS or XML)
    #[arg(required = true)]
    input: PathBuf,

    /// Column assignment, e.g. `unit_price=5` (repeatable)
    #[arg(long = "column", value_parser = super::import::parse_column)]
    columns: Vec<(SheetField, Option<usize>)>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

pub async fn run(args: InspectArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let config = load_config(config_path)?;
    let bytes = tokio::fs::read(&args.input).await?;
    let file_name = args
        .input
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("invoice");

    let options = ImportOptions {
        column_overrides: args.columns.iter().cloned().collect(),
        ..Default::default()
    };

    let inspection = inspect(file_name, &bytes, &config, &options)?;

    if args.json {
        print_json(file_name, &inspection)
    } else {
        print_text(file_name, &inspection);
        Ok(())
    }
}

fn print_json(file_name: &str, inspection: &Inspection) -> anyhow::Result<()> {
    let (headers, mapping) = match &inspection.columns {
        Some((headers, mapping)) => (Some(headers), Some(mapping)),
        None => (None, None),
    };

    let report = json!({
        "file_name": file_name,
        "format": inspection.format.label(),
        "header": inspection.header,
        "headers": headers,
        "column_mapping": mapping,
        "lines": inspection.lines,
        "warnings": inspection.warnings,
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_text(file_name: &str, inspection: &Inspection) {
    let header = &inspection.header;

    println!("File:     {}", file_name);
    println!("Format:   {}", style(inspection.format.label()).cyan());
    println!(
        "Invoice:  {}{}",
        header.invoice_number,
        if header.invoice_number_generated { " (generated)" } else { "" }
    );
    println!("Date:     {}", header.invoice_date);
    println!("Currency: {}", header.currency);
    if let Some(name) = &header.supplier_name {
        println!("Supplier: {}", name);
    }
    if let Some(tax_id) = &header.supplier_tax_id {
        println!("Tax ID:   {}", tax_id);
    }

    if let Some((headers, mapping)) = &inspection.columns {
        println!();
        println!("Columns:");
        for (idx, name) in headers.iter().enumerate() {
            let field = mapping
                .iter()
                .find(|(_, column)| *column == idx)
                .map(|(field, _)| field.key())
                .unwrap_or("-");
            println!("  [{}] {:<24} {}", idx, name, field);
        }
    }

    println!();
    println!("Lines ({}):", inspection.lines.len());
    for line in &inspection.lines {
        println!(
            "  {:>3}. row {:<4} {} | {} | {} | {} {} x {} @ {}%",
            line.line_no,
            line.source_row,
            line.supplier_code.as_deref().unwrap_or("-"),
            line.internal_code.as_deref().unwrap_or("-"),
            line.description,
            line.quantity,
            line.unit,
            line.unit_price,
            line.tax_rate
        );
    }

    if !inspection.warnings.is_empty() {
        println!();
        println!("{}", style("Warnings:").yellow());
        for warning in &inspection.warnings {
            println!("  - {}", warning);
        }
    }
}
