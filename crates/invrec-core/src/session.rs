//! Operator-driven import workflow.
//!
//! An [`ImportSession`] owns one uploaded document from decoding until the
//! invoice is assembled: columns can be remapped, the supplier changed,
//! lines overridden and expenses edited, each step recomputing only what it
//! invalidates. Nothing is kept once the session is dropped.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::allocation::ExpenseAllocator;
use crate::assembler::{self, InvoiceParts};
use crate::error::{ImportError, MappingError};
use crate::matching::{
    CancelToken, CodeMappingSource, MatchPass, ProductMatcher, SupplierCodeCache, SupplierSuggestion,
    suggest_supplier,
};
use crate::models::catalog::{ProductCatalog, Supplier, SupplierCodeMapping, SupplierId};
use crate::models::config::{EngineConfig, ImportOptions};
use crate::models::invoice::{
    DeclaredTotals, ExtractedDocument, InvoiceHeader, NormalizedInvoice, SharedExpenses, SourceFormat,
};
use crate::models::line::{AllocatedLineItem, ManualMatch, MatchSource, RawLineItem};
use crate::sheet::{ColumnMapping, SheetField, SheetKind, SpreadsheetDocument};
use crate::xml::{self, XmlDialect, XmlDocument};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";
const ODS_MIMETYPE: &[u8] = b"application/vnd.oasis.opendocument.spreadsheet";

/// Container type of an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Spreadsheet(SheetKind),
    Xml,
}

impl SourceKind {
    /// Detect by extension, falling back to the leading bytes.
    pub fn detect(file_name: &str, bytes: &[u8]) -> Result<Self, ImportError> {
        if bytes.is_empty() {
            return Err(ImportError::Unreadable(format!("{} is empty", file_name)));
        }

        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");
        if ext.eq_ignore_ascii_case("xml") {
            return Ok(SourceKind::Xml);
        }
        if let Some(kind) = SheetKind::from_extension(ext) {
            return Ok(SourceKind::Spreadsheet(kind));
        }

        let head = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let head = head.trim_ascii_start();
        if head.starts_with(b"<") {
            Ok(SourceKind::Xml)
        } else if bytes.starts_with(ZIP_MAGIC) {
            let is_ods = bytes
                .get(30..30 + 8 + ODS_MIMETYPE.len())
                .is_some_and(|window| window.ends_with(ODS_MIMETYPE));
            Ok(SourceKind::Spreadsheet(if is_ods {
                SheetKind::Ods
            } else {
                SheetKind::Xlsx
            }))
        } else if bytes.starts_with(OLE_MAGIC) {
            Ok(SourceKind::Spreadsheet(SheetKind::Xls))
        } else if !bytes.starts_with(b"%PDF") && std::str::from_utf8(bytes).is_ok() {
            Ok(SourceKind::Spreadsheet(SheetKind::Csv))
        } else {
            Err(ImportError::UnsupportedFormat(file_name.to_string()))
        }
    }
}

/// Decoded source kept for re-extraction.
#[derive(Debug, Clone)]
enum Source {
    Spreadsheet(SpreadsheetDocument),
    Xml(XmlDialect),
}

/// One import in progress.
#[derive(Debug)]
pub struct ImportSession {
    file_name: String,
    config: EngineConfig,
    options: ImportOptions,
    catalog: Arc<ProductCatalog>,
    source: Source,
    header: InvoiceHeader,
    declared: Option<DeclaredTotals>,
    lines: Vec<RawLineItem>,
    cache: SupplierCodeCache,
    pass: MatchPass,
    cancel: CancelToken,
    warnings: Vec<String>,
}

/// Result of decoding a document, before any matching.
struct Decoded {
    source: Source,
    header: InvoiceHeader,
    declared: Option<DeclaredTotals>,
    lines: Vec<RawLineItem>,
    warnings: Vec<String>,
}

fn decode(
    file_name: &str,
    bytes: &[u8],
    kind: SourceKind,
    config: &EngineConfig,
    options: &ImportOptions,
) -> Result<Decoded, ImportError> {
    let default_tax_rate = options.tax_rate_or(&config.extraction);
    let mut warnings = Vec::new();

    let (source, extracted) = match kind {
        SourceKind::Spreadsheet(sheet_kind) => {
            let delimiter = config
                .extraction
                .csv_delimiter
                .and_then(|c| u8::try_from(c).ok());
            let mut document = SpreadsheetDocument::load(bytes, sheet_kind, delimiter)?;
            for (field, column) in &options.column_overrides {
                document.set_column(*field, *column)?;
            }
            let extracted = document.extract(default_tax_rate);
            (Source::Spreadsheet(document), extracted)
        }
        SourceKind::Xml => {
            let document = XmlDocument::parse(bytes)?;
            warnings.extend(document.warnings.iter().cloned());

            let dialect = xml::detect(&document.root);
            if dialect == XmlDialect::Unknown {
                warnings.push("Unknown XML dialect; generic extraction used".to_string());
            }
            let extracted = xml::extract::extract(
                &document.root,
                dialect,
                default_tax_rate,
                &config.extraction.placeholder_description,
            );
            (Source::Xml(dialect), extracted)
        }
    };

    let ExtractedDocument {
        format,
        header,
        lines,
        declared,
    } = extracted;
    if lines.iter().any(|l| l.needs_manual_entry) {
        warnings.push("No line items found; a placeholder line needs manual entry".to_string());
    }

    let header = header.resolve(format, file_name, options, &config.extraction);
    info!(
        "Loaded {} as {} with {} line(s)",
        file_name,
        format.label(),
        lines.len()
    );

    Ok(Decoded {
        source,
        header,
        declared,
        lines,
        warnings,
    })
}

/// What a document yields before matching.
#[derive(Debug, Clone)]
pub struct Inspection {
    pub format: SourceFormat,
    pub dialect: Option<XmlDialect>,
    pub header: InvoiceHeader,
    /// Header cells and column mapping, for spreadsheet sources.
    pub columns: Option<(Vec<String>, ColumnMapping)>,
    pub lines: Vec<RawLineItem>,
    pub warnings: Vec<String>,
}

/// Decode and extract a document without matching it.
///
/// Unlike [`ImportSession::from_bytes`] no supplier is needed.
pub fn inspect(
    file_name: &str,
    bytes: &[u8],
    config: &EngineConfig,
    options: &ImportOptions,
) -> Result<Inspection, ImportError> {
    let kind = SourceKind::detect(file_name, bytes)?;
    let decoded = decode(file_name, bytes, kind, config, options)?;

    let (dialect, columns) = match decoded.source {
        Source::Spreadsheet(document) => (
            None,
            Some((document.headers().to_vec(), document.mapping().clone())),
        ),
        Source::Xml(dialect) => (Some(dialect), None),
    };
    Ok(Inspection {
        format: decoded.header.source_format,
        dialect,
        header: decoded.header,
        columns,
        lines: decoded.lines,
        warnings: decoded.warnings,
    })
}

impl ImportSession {
    /// Decode and extract a document, then run a first match pass.
    ///
    /// Spreadsheets carry no supplier fields, so they need a supplier in
    /// `options` before decoding starts. Its code mappings are not loaded
    /// yet; call [`ImportSession::select_supplier`] (or use
    /// [`ImportSession::open`]).
    pub fn from_bytes(
        file_name: &str,
        bytes: &[u8],
        catalog: Arc<ProductCatalog>,
        config: EngineConfig,
        options: ImportOptions,
    ) -> Result<Self, ImportError> {
        options.expenses.check()?;
        let kind = SourceKind::detect(file_name, bytes)?;
        if matches!(kind, SourceKind::Spreadsheet(_)) && options.supplier.is_none() {
            return Err(ImportError::MissingSupplier(file_name.to_string()));
        }

        let decoded = decode(file_name, bytes, kind, &config, &options)?;
        let mut session = Self {
            file_name: file_name.to_string(),
            config,
            options,
            catalog,
            source: decoded.source,
            header: decoded.header,
            declared: decoded.declared,
            lines: decoded.lines,
            cache: SupplierCodeCache::new(),
            pass: MatchPass::default(),
            cancel: CancelToken::new(),
            warnings: decoded.warnings,
        };
        session.check_overrides()?;
        session.run_pass();
        Ok(session)
    }

    /// [`ImportSession::from_bytes`], then load the mappings of the supplier
    /// named in the options.
    ///
    /// A mapping table that fails to load is recorded as a warning and the
    /// lines are matched without it.
    pub async fn open<S>(
        file_name: &str,
        bytes: &[u8],
        catalog: Arc<ProductCatalog>,
        config: EngineConfig,
        options: ImportOptions,
        mappings: &S,
    ) -> crate::Result<Self>
    where
        S: CodeMappingSource + ?Sized,
    {
        let supplier = options.supplier.clone();
        let mut session = Self::from_bytes(file_name, bytes, catalog, config, options)?;
        if supplier.is_some() {
            if let Err(e) = session.select_supplier(mappings, supplier).await {
                warn!("{}", e);
                session.warnings.push(e.to_string());
            }
        }
        Ok(session)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn format(&self) -> SourceFormat {
        self.header.source_format
    }

    /// Detected dialect, for XML sources.
    pub fn dialect(&self) -> Option<XmlDialect> {
        match self.source {
            Source::Xml(dialect) => Some(dialect),
            Source::Spreadsheet(_) => None,
        }
    }

    pub fn header(&self) -> &InvoiceHeader {
        &self.header
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Extracted lines before matching.
    pub fn lines(&self) -> &[RawLineItem] {
        &self.lines
    }

    /// Latest match pass; a preview while incomplete.
    pub fn preview(&self) -> &MatchPass {
        &self.pass
    }

    /// Non-fatal problems met so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Header cells and current column mapping, for spreadsheet sources.
    pub fn column_mapping(&self) -> Option<(&[String], &ColumnMapping)> {
        match &self.source {
            Source::Spreadsheet(doc) => Some((doc.headers(), doc.mapping())),
            Source::Xml(_) => None,
        }
    }

    /// Token that stops match passes before their next line.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Propose a supplier from the document's supplier fields.
    pub fn suggest_supplier<'a>(&self, suppliers: &'a [Supplier]) -> Option<SupplierSuggestion<'a>> {
        suggest_supplier(suppliers, &self.header)
    }

    /// Reassign a spreadsheet column and re-extract every line from the
    /// already decoded grid.
    pub fn set_column(&mut self, field: SheetField, column: Option<usize>) -> Result<(), ImportError> {
        let Source::Spreadsheet(document) = &mut self.source else {
            return Err(ImportError::UnsupportedFormat(
                "column mapping applies to spreadsheets only".to_string(),
            ));
        };

        document.set_column(field, column)?;
        self.options.column_overrides.insert(field, column);
        self.lines = document.extract_lines(self.options.tax_rate_or(&self.config.extraction));
        self.options
            .manual_matches
            .retain(|line_no, _| (*line_no as usize) <= self.lines.len());
        self.run_pass();
        Ok(())
    }

    /// Change the selected supplier, reload its code mappings and re-match.
    ///
    /// On a load error the session keeps the new supplier with an empty
    /// mapping table and lines are re-matched without it.
    pub async fn select_supplier<S>(
        &mut self,
        mappings: &S,
        supplier: Option<SupplierId>,
    ) -> Result<(), MappingError>
    where
        S: CodeMappingSource + ?Sized,
    {
        self.options.supplier = supplier.clone();
        let loaded = match &supplier {
            Some(id) => self.cache.reload(mappings, id).await.map(|_| ()),
            None => {
                self.cache.clear();
                Ok(())
            }
        };

        self.rematch();
        loaded
    }

    /// Pin (or with `None`, release) the product of one line.
    pub fn set_manual_match(&mut self, line_no: u32, manual: Option<ManualMatch>) -> Result<(), ImportError> {
        let line = self
            .lines
            .iter()
            .find(|l| l.line_no == line_no)
            .cloned()
            .ok_or(ImportError::UnknownLine(line_no))?;
        if let Some(ManualMatch::Product(id)) = &manual {
            if self.catalog.get(id).is_none() {
                return Err(ImportError::UnknownProduct(id.to_string()));
            }
        }

        let matcher = ProductMatcher::new(
            &self.catalog,
            &self.cache,
            &self.config.matching,
            &self.config.pricing,
        );
        let item = match &manual {
            Some(m) => {
                self.options.manual_matches.insert(line_no, m.clone());
                matcher.apply_manual(line, m)
            }
            None => {
                self.options.manual_matches.remove(&line_no);
                matcher.match_line(line)
            }
        };

        if let Some(slot) = self.pass.items.iter_mut().find(|i| i.line.line_no == line_no) {
            debug!("Line {} now {}", line_no, item.status().as_str());
            *slot = item;
        }
        Ok(())
    }

    /// Replace the shared expenses; allocation happens at finalization.
    ///
    /// Negative or out-of-range amounts are rejected and the previous
    /// expenses are kept.
    pub fn set_expenses(&mut self, expenses: SharedExpenses) -> Result<(), ImportError> {
        expenses.check()?;
        self.options.expenses = expenses;
        Ok(())
    }

    /// Match every line again from scratch.
    ///
    /// A cancelled token stays cancelled, so the pass stops at once until
    /// [`ImportSession::resume`] is called.
    pub fn run_pass(&mut self) -> &MatchPass {
        let matcher = ProductMatcher::new(
            &self.catalog,
            &self.cache,
            &self.config.matching,
            &self.config.pricing,
        );
        self.pass = matcher.match_all(&self.lines, &self.options.manual_matches, &self.cancel);
        &self.pass
    }

    fn rematch(&mut self) {
        if !self.pass.complete {
            self.run_pass();
            return;
        }
        let matcher = ProductMatcher::new(
            &self.catalog,
            &self.cache,
            &self.config.matching,
            &self.config.pricing,
        );
        self.pass = matcher.rematch(&self.pass.items, &self.cancel);
    }

    /// Clear a cancellation and run a full pass.
    pub fn resume(&mut self) -> &MatchPass {
        self.cancel.reset();
        self.run_pass()
    }

    /// Allocated lines for the current pass and expenses.
    pub fn allocate(&self) -> Vec<AllocatedLineItem> {
        ExpenseAllocator::new(&self.config.pricing).allocate(&self.pass.items, &self.options.expenses)
    }

    /// Assemble the invoice.
    ///
    /// Fails while the latest match pass is incomplete. Learned supplier
    /// code mappings are reported on the invoice and primed into the cache.
    pub fn finalize(&mut self) -> Result<NormalizedInvoice, ImportError> {
        if !self.pass.complete {
            return Err(ImportError::Incomplete {
                matched: self.pass.items.len(),
                total: self.lines.len(),
            });
        }

        let lines = self.allocate();
        let learned = self.learned_mappings(&lines);
        for mapping in &learned {
            self.cache.prime(mapping.clone());
        }
        if !learned.is_empty() {
            info!("Learned {} supplier code mapping(s)", learned.len());
        }

        let parts = InvoiceParts {
            branch: self.options.branch.clone(),
            supplier_id: self.options.supplier.clone(),
            file_name: self.file_name.clone(),
            header: self.header.clone(),
            lines,
            expenses: self.options.expenses,
            declared: self.declared,
            learned_mappings: learned,
            warnings: self.all_warnings(),
        };
        Ok(assembler::assemble(parts, &self.config.pricing))
    }

    /// Session warnings followed by those of individual lines.
    fn all_warnings(&self) -> Vec<String> {
        let line_warnings = self
            .lines
            .iter()
            .flat_map(|l| l.warnings.iter().map(move |w| format!("Line {}: {}", l.line_no, w)));
        self.warnings.iter().cloned().chain(line_warnings).collect()
    }

    /// Supplier codes of lines matched by internal code or by the operator
    /// that the loaded mapping table does not know yet.
    fn learned_mappings(&self, lines: &[AllocatedLineItem]) -> Vec<SupplierCodeMapping> {
        if self.cache.supplier().is_none() {
            return Vec::new();
        }

        let mut learned: BTreeMap<String, SupplierCodeMapping> = BTreeMap::new();
        for line in lines {
            let item = &line.item;
            let Some(source) = item.product_match.source() else {
                continue;
            };
            if !matches!(source, MatchSource::InternalCode | MatchSource::Manual) {
                continue;
            }
            let (Some(code), Some(product)) = (
                item.line.supplier_code.as_deref().map(str::trim),
                item.product_match.authoritative_product(),
            ) else {
                continue;
            };
            if code.is_empty() || self.cache.lookup(code).is_some() || learned.contains_key(code) {
                continue;
            }

            learned.insert(
                code.to_string(),
                SupplierCodeMapping {
                    supplier_code: code.to_string(),
                    product_id: product.clone(),
                    last_price: Some(item.line.unit_price),
                    last_landed_price: Some(line.landed_unit_price),
                },
            );
        }
        learned.into_values().collect()
    }

    fn check_overrides(&self) -> Result<(), ImportError> {
        for (line_no, manual) in &self.options.manual_matches {
            if !self.lines.iter().any(|l| l.line_no == *line_no) {
                warn!("Override for missing line {}", line_no);
                return Err(ImportError::UnknownLine(*line_no));
            }
            if let ManualMatch::Product(id) = manual {
                if self.catalog.get(id).is_none() {
                    return Err(ImportError::UnknownProduct(id.to_string()));
                }
            }
        }
        Ok(())
    }
}
