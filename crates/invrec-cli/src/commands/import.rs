//! Import command - turn a single invoice file into a normalized invoice.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use invrec_core::{
    EngineConfig, ImportOptions, ImportSession, ManualMatch, NormalizedInvoice, ProductCatalog, ProductId,
    SharedExpenses, SheetField, SupplierId,
};

use super::config::load_config;
use super::output::{OutputFormat, format_invoice};
use crate::mappings::JsonDirMappingSource;

/// Arguments for the import command.
#[derive(Args)]
pub struct ImportArgs {
    /// Input file (CSV, XLSX, XLS, ODS or XML)
    #[arg(required = true)]
    input: PathBuf,

    #[command(flatten)]
    session: SessionArgs,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Report validation issues
    #[arg(long)]
    validate: bool,
}

/// Per-import settings shared by `import` and `batch`.
#[derive(Args, Clone, Debug)]
pub struct SessionArgs {
    /// Branch the purchase is booked to
    #[arg(short, long)]
    pub branch: String,

    /// Supplier whose code mappings are used for matching (required for spreadsheets)
    #[arg(short, long)]
    pub supplier: Option<String>,

    /// Product catalog (JSON array of products)
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Directory with one `<supplier>.json` mapping table per supplier
    #[arg(long)]
    pub mappings: Option<PathBuf>,

    /// Store newly learned supplier code mappings in the mapping directory
    #[arg(long)]
    pub learn: bool,

    /// Override the invoice number
    #[arg(long)]
    pub invoice_number: Option<String>,

    /// Override the invoice date (YYYY-MM-DD)
    #[arg(long)]
    pub invoice_date: Option<NaiveDate>,

    /// Override the due date (YYYY-MM-DD)
    #[arg(long)]
    pub due_date: Option<NaiveDate>,

    /// Tax rate in percent for lines without one
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Transport cost to spread over the lines
    #[arg(long, default_value = "0")]
    pub transport: Decimal,

    /// Customs cost to spread over the lines
    #[arg(long, default_value = "0")]
    pub customs: Decimal,

    /// Other shared costs to spread over the lines
    #[arg(long, default_value = "0")]
    pub other: Decimal,

    /// Column assignment, e.g. `unit_price=5` or `unit=none` (repeatable)
    #[arg(long = "column", value_parser = parse_column)]
    pub columns: Vec<(SheetField, Option<usize>)>,

    /// Product override for a line, e.g. `3=P-100` or `3=clear` (repeatable)
    #[arg(long = "match", value_parser = parse_match)]
    pub matches: Vec<(u32, ManualMatch)>,
}

impl SessionArgs {
    /// Operator options for one import.
    pub fn options(&self) -> anyhow::Result<ImportOptions> {
        let mut options = ImportOptions::new(self.branch.trim()).with_expenses(SharedExpenses {
            transport: self.transport,
            customs: self.customs,
            other: self.other,
        });
        options.supplier = self.supplier.clone().map(SupplierId::from);
        options.invoice_number = self.invoice_number.clone();
        options.invoice_date = self.invoice_date;
        options.due_date = self.due_date;
        options.default_tax_rate = self.tax_rate;
        options.column_overrides = self.columns.iter().cloned().collect();
        options.manual_matches = self.matches.iter().cloned().collect();
        options.expenses.check()?;
        Ok(options)
    }
}

/// Everything an import needs besides the file and its options.
pub struct ImportContext {
    pub config: EngineConfig,
    pub catalog: Arc<ProductCatalog>,
    pub mappings: JsonDirMappingSource,
    pub learn: bool,
}

impl ImportContext {
    pub fn new(args: &SessionArgs, config_path: Option<&str>) -> anyhow::Result<Self> {
        if args.branch.trim().is_empty() {
            anyhow::bail!("A branch is required");
        }

        let config = load_config(config_path)?;

        let catalog = match &args.catalog {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("Failed to read catalog {}: {}", path.display(), e))?;
                let catalog = ProductCatalog::from_json(&json)?;
                info!("Loaded {} catalog products from {}", catalog.len(), path.display());
                catalog
            }
            None => {
                warn!("No catalog given; only supplier mappings can match");
                ProductCatalog::default()
            }
        };

        let mappings = JsonDirMappingSource::new(
            args.mappings
                .clone()
                .unwrap_or_else(JsonDirMappingSource::default_dir),
        );

        Ok(Self {
            config,
            catalog: Arc::new(catalog),
            mappings,
            learn: args.learn,
        })
    }
}

pub async fn run(args: ImportArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let context = ImportContext::new(&args.session, config_path)?;
    let options = args.session.options()?;

    info!("Importing file: {}", args.input.display());

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {msg}")?
            .progress_chars("##-"),
    );

    let invoice = import_file(&args.input, options, &context, &pb).await?;

    pb.finish_and_clear();

    if args.validate {
        let issues = invoice.validate();
        if !issues.is_empty() {
            eprintln!("{}", style("Validation issues:").yellow());
            for issue in &issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    let output = format_invoice(&invoice, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total import time: {:?}", start.elapsed());

    Ok(())
}

/// Run the whole pipeline on one file.
pub async fn import_file(
    path: &Path,
    options: ImportOptions,
    context: &ImportContext,
    pb: &ProgressBar,
) -> anyhow::Result<NormalizedInvoice> {
    pb.set_message("Reading file...");
    pb.set_position(10);

    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("invoice");

    pb.set_message("Extracting and matching lines...");
    pb.set_position(30);

    let supplier = options.supplier.clone();
    let mut session = ImportSession::open(
        file_name,
        &bytes,
        Arc::clone(&context.catalog),
        context.config.clone(),
        options,
        &context.mappings,
    )
    .await?;

    if let Some((headers, mapping)) = session.column_mapping() {
        debug!("Mapped {} of {} columns", mapping.iter().count(), headers.len());
    }

    pb.set_message("Assembling invoice...");
    pb.set_position(80);

    let invoice = session.finalize()?;

    if context.learn && !invoice.learned_mappings.is_empty() {
        match &supplier {
            Some(supplier) => {
                context.mappings.merge(supplier, &invoice.learned_mappings).await?;
            }
            None => warn!("--learn needs a supplier; learned mappings were not stored"),
        }
    }

    pb.set_position(100);

    Ok(invoice)
}

pub fn parse_column(s: &str) -> Result<(SheetField, Option<usize>), String> {
    let (field, column) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=COLUMN, got '{}'", s))?;

    let field = SheetField::from_key(field).ok_or_else(|| {
        let known: Vec<&str> = SheetField::ALL.iter().map(|f| f.key()).collect();
        format!("unknown field '{}' (expected one of {})", field, known.join(", "))
    })?;

    let column = match column.trim().to_ascii_lowercase().as_str() {
        "none" | "" => None,
        index => Some(
            index
                .parse::<usize>()
                .map_err(|_| format!("invalid column index '{}'", index))?,
        ),
    };

    Ok((field, column))
}

fn parse_match(s: &str) -> Result<(u32, ManualMatch), String> {
    let (line, product) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LINE=PRODUCT, got '{}'", s))?;

    let line = line
        .trim()
        .parse::<u32>()
        .map_err(|_| format!("invalid line number '{}'", line))?;

    let product = product.trim();
    if product.is_empty() {
        return Err(format!("missing product for line {}", line));
    }

    let manual = if product.eq_ignore_ascii_case("clear") {
        ManualMatch::Clear
    } else {
        ManualMatch::Product(ProductId::from(product))
    };
    Ok((line, manual))
}
