//! Line extraction from a decoded sheet.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::ImportError;
use crate::models::invoice::{ExtractedDocument, ExtractedHeader, SourceFormat};
use crate::models::line::{LineFields, RawLineItem};
use crate::selector::{FieldSelector, SelectorSource};

use super::decode::{self, Sheet};
use super::mapper::{ColumnMapping, SheetField};
use super::{Result, SheetKind};

const SUPPLIER_CODE: FieldSelector = FieldSelector::new("supplier_code", &["supplier_code"]);
const INTERNAL_CODE: FieldSelector = FieldSelector::new("internal_code", &["internal_code"]);
const DESCRIPTION: FieldSelector = FieldSelector::new("description", &["product_name"]);
const QUANTITY: FieldSelector = FieldSelector::new("quantity", &["quantity"]);
const UNIT: FieldSelector = FieldSelector::new("unit", &["unit"]);
const UNIT_PRICE: FieldSelector = FieldSelector::new("unit_price", &["unit_price"]);
const TAX_RATE: FieldSelector = FieldSelector::new("tax_rate", &["tax_rate"]);

/// A decoded spreadsheet with its header row and column mapping.
///
/// The grid is kept so that a changed mapping can be re-applied without
/// decoding the file again.
#[derive(Debug, Clone)]
pub struct SpreadsheetDocument {
    kind: SheetKind,
    sheet: Sheet,
    header_row: usize,
    mapping: ColumnMapping,
}

impl SpreadsheetDocument {
    /// Decode a file and infer its column mapping.
    ///
    /// Fails with [`ImportError::TooFewRows`] unless the sheet has a header
    /// row and at least one more non-empty row.
    pub fn load(bytes: &[u8], kind: SheetKind, delimiter: Option<u8>) -> Result<Self> {
        let sheet = decode::decode(bytes, kind, delimiter)?;
        Self::from_sheet(kind, sheet)
    }

    pub fn from_sheet(kind: SheetKind, sheet: Sheet) -> Result<Self> {
        let found = sheet.non_blank_rows();
        if found < 2 {
            return Err(ImportError::TooFewRows { found });
        }

        let header_row = (0..sheet.rows().len())
            .find(|&i| !sheet.is_blank_row(i))
            .ok_or(ImportError::TooFewRows { found })?;

        let mapping = ColumnMapping::auto(&sheet.rows()[header_row]);
        info!(
            "Spreadsheet header on row {}, {} of {} fields mapped",
            header_row + 1,
            mapping.iter().count(),
            SheetField::ALL.len()
        );

        Ok(Self {
            kind,
            sheet,
            header_row,
            mapping,
        })
    }

    pub fn kind(&self) -> SheetKind {
        self.kind
    }

    /// Header cells.
    pub fn headers(&self) -> &[String] {
        &self.sheet.rows()[self.header_row]
    }

    pub fn width(&self) -> usize {
        self.sheet.width()
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    /// Reassign (or unassign) one field's column.
    pub fn set_column(&mut self, field: SheetField, column: Option<usize>) -> Result<()> {
        if let Some(column) = column {
            let width = self.width();
            if column >= width {
                return Err(ImportError::InvalidColumn {
                    field: field.key().to_string(),
                    column,
                    width,
                });
            }
        }
        debug!("Column for {} set to {:?}", field.key(), column);
        self.mapping.set(field, column);
        Ok(())
    }

    /// Line items of every non-blank row after the header.
    pub fn extract_lines(&self, default_tax_rate: Decimal) -> Vec<RawLineItem> {
        let mut lines = Vec::new();

        for (idx, cells) in self.sheet.rows().iter().enumerate().skip(self.header_row + 1) {
            if self.sheet.is_blank_row(idx) {
                continue;
            }

            let row = SheetRow {
                cells,
                mapping: &self.mapping,
            };
            let fields = LineFields {
                supplier_code: SUPPLIER_CODE.resolve(&row),
                internal_code: INTERNAL_CODE.resolve(&row),
                description: DESCRIPTION.resolve(&row),
                quantity: QUANTITY.resolve(&row),
                unit: UNIT.resolve(&row),
                unit_price: UNIT_PRICE.resolve(&row),
                tax_rate: TAX_RATE.resolve(&row),
                line_total: None,
            };

            let line_no = lines.len() as u32 + 1;
            lines.push(fields.resolve(line_no, idx as u32 + 1, default_tax_rate));
        }

        debug!("Extracted {} spreadsheet lines", lines.len());
        lines
    }

    /// Extract lines under the current mapping. Spreadsheets carry no header fields.
    pub fn extract(&self, default_tax_rate: Decimal) -> ExtractedDocument {
        ExtractedDocument {
            format: SourceFormat::Spreadsheet(self.kind),
            header: ExtractedHeader::default(),
            lines: self.extract_lines(default_tax_rate),
            declared: None,
        }
    }
}

/// One data row viewed through a column mapping. Selectors are field keys.
struct SheetRow<'a> {
    cells: &'a [String],
    mapping: &'a ColumnMapping,
}

impl SelectorSource for SheetRow<'_> {
    fn select(&self, selector: &str) -> Option<String> {
        let field = SheetField::from_key(selector)?;
        let column = self.mapping.get(field)?;
        self.cells.get(column).cloned()
    }
}
