//! Per-supplier code-mapping cache.
//!
//! The mapping table of the selected supplier is fetched once through a
//! [`CodeMappingSource`] when the supplier is selected, and consulted
//! synchronously by the matcher afterwards.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::MappingError;
use crate::models::catalog::{ProductId, SupplierCodeMapping, SupplierId};

/// Where supplier code-mapping tables come from.
#[async_trait]
pub trait CodeMappingSource: Send + Sync {
    /// Fetch the full mapping table of one supplier.
    async fn load(&self, supplier: &SupplierId) -> Result<Vec<SupplierCodeMapping>, MappingError>;
}

/// In-memory mapping tables.
#[derive(Debug, Clone, Default)]
pub struct StaticMappingSource {
    tables: HashMap<SupplierId, Vec<SupplierCodeMapping>>,
}

impl StaticMappingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_supplier(
        mut self,
        supplier: impl Into<SupplierId>,
        mappings: Vec<SupplierCodeMapping>,
    ) -> Self {
        self.insert(supplier, mappings);
        self
    }

    pub fn insert(&mut self, supplier: impl Into<SupplierId>, mappings: Vec<SupplierCodeMapping>) {
        self.tables.insert(supplier.into(), mappings);
    }
}

#[async_trait]
impl CodeMappingSource for StaticMappingSource {
    async fn load(&self, supplier: &SupplierId) -> Result<Vec<SupplierCodeMapping>, MappingError> {
        Ok(self.tables.get(supplier).cloned().unwrap_or_default())
    }
}

/// Mapping table of the currently selected supplier, keyed by supplier code.
#[derive(Debug, Clone, Default)]
pub struct SupplierCodeCache {
    supplier: Option<SupplierId>,
    by_code: HashMap<String, SupplierCodeMapping>,
}

impl SupplierCodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supplier whose table is loaded.
    pub fn supplier(&self) -> Option<&SupplierId> {
        self.supplier.as_ref()
    }

    /// Replace the cache with the table of `supplier`.
    ///
    /// The previous table is dropped before fetching; on error the cache is
    /// left empty for `supplier`.
    pub async fn reload<S>(&mut self, source: &S, supplier: &SupplierId) -> Result<usize, MappingError>
    where
        S: CodeMappingSource + ?Sized,
    {
        self.supplier = Some(supplier.clone());
        self.by_code.clear();

        let mappings = source.load(supplier).await?;
        self.fill(mappings);
        info!(
            "Loaded {} code mapping(s) for supplier {}",
            self.by_code.len(),
            supplier
        );
        Ok(self.by_code.len())
    }

    /// Replace the cache contents without a fetch.
    pub fn replace(&mut self, supplier: SupplierId, mappings: Vec<SupplierCodeMapping>) {
        self.supplier = Some(supplier);
        self.by_code.clear();
        self.fill(mappings);
    }

    /// Forget the loaded table (no supplier selected).
    pub fn clear(&mut self) {
        self.supplier = None;
        self.by_code.clear();
    }

    fn fill(&mut self, mappings: Vec<SupplierCodeMapping>) {
        for mapping in mappings {
            let code = mapping.supplier_code.trim().to_string();
            if code.is_empty() {
                continue;
            }
            self.by_code.entry(code).or_insert(mapping);
        }
    }

    /// Mapping for a supplier code (exact after trimming).
    pub fn lookup(&self, supplier_code: &str) -> Option<&SupplierCodeMapping> {
        self.by_code.get(supplier_code.trim())
    }

    /// Mapping that points at `product`, for price history.
    ///
    /// With several codes for one product, the lexicographically smallest
    /// code wins so that the choice is stable.
    pub fn find_by_product(&self, product: &ProductId) -> Option<&SupplierCodeMapping> {
        self.by_code
            .iter()
            .filter(|(_, m)| &m.product_id == product)
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, m)| m)
    }

    /// Add a learned mapping unless the code is already known.
    pub fn prime(&mut self, mapping: SupplierCodeMapping) -> bool {
        let code = mapping.supplier_code.trim().to_string();
        if code.is_empty() || self.by_code.contains_key(&code) {
            return false;
        }
        debug!("Primed mapping {} -> {}", code, mapping.product_id);
        self.by_code.insert(code, mapping);
        true
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}
