//! Engine configuration and per-import operator options.

use std::collections::BTreeMap;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::sheet::SheetField;

use super::catalog::SupplierId;
use super::invoice::SharedExpenses;
use super::line::ManualMatch;

/// Main configuration for the invrec engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Product matching configuration.
    pub matching: MatchingConfig,

    /// Rounding configuration.
    pub pricing: PricingConfig,
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Currency used when the document declares none.
    pub default_currency: String,

    /// Tax rate (percent) for lines that omit one.
    pub default_tax_rate: Decimal,

    /// Description of the line synthesized when nothing could be extracted.
    pub placeholder_description: String,

    /// Force a CSV delimiter instead of sniffing it.
    pub csv_delimiter: Option<char>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_currency: "EUR".to_string(),
            default_tax_rate: Decimal::ZERO,
            placeholder_description: "No line items found - manual entry required".to_string(),
            csv_delimiter: None,
        }
    }
}

/// Product matching configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum length (in characters) of both texts for a fuzzy match.
    /// Zero keeps plain bidirectional containment.
    pub min_fuzzy_length: usize,
}

/// Rounding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Decimal places of price drift percentages.
    pub drift_precision: u32,

    /// Decimal places of money amounts (totals, tax, expense shares).
    pub money_precision: u32,

    /// Decimal places of per-unit expense and landed unit price.
    pub unit_cost_precision: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            drift_precision: 2,
            money_precision: 2,
            unit_cost_precision: 4,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

/// Operator-supplied configuration of a single import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Organizational unit the purchase applies to.
    pub branch: String,

    /// Selected supplier; enables supplier-code mapping.
    pub supplier: Option<SupplierId>,

    /// Header overrides.
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,

    /// Tax rate for lines without one; falls back to the engine default.
    pub default_tax_rate: Option<Decimal>,

    /// Shared costs to allocate over the lines.
    pub expenses: SharedExpenses,

    /// Column assignments that replace the automatic mapping
    /// (`None` unassigns the field).
    pub column_overrides: BTreeMap<SheetField, Option<usize>>,

    /// Per-line product overrides keyed by line number.
    pub manual_matches: BTreeMap<u32, ManualMatch>,

    /// Date of the import; defaults to today.
    pub ingestion_date: Option<NaiveDate>,
}

impl ImportOptions {
    pub fn new(branch: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            ..Default::default()
        }
    }

    pub fn with_supplier(mut self, supplier: impl Into<SupplierId>) -> Self {
        self.supplier = Some(supplier.into());
        self
    }

    pub fn with_expenses(mut self, expenses: SharedExpenses) -> Self {
        self.expenses = expenses;
        self
    }

    /// Import date, today unless pinned.
    pub fn ingestion_date(&self) -> NaiveDate {
        self.ingestion_date
            .unwrap_or_else(|| Local::now().date_naive())
    }

    /// Tax rate applied to lines without one.
    pub fn tax_rate_or(&self, config: &ExtractionConfig) -> Decimal {
        self.default_tax_rate.unwrap_or(config.default_tax_rate)
    }
}
