//! Supplier code-mapping tables stored as one JSON file per supplier.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info};

use invrec_core::{CodeMappingSource, MappingError, SupplierCodeMapping, SupplierId};

/// Reads `<dir>/<supplier>.json`, a JSON array of code mappings.
///
/// A supplier without a file has an empty table.
#[derive(Debug, Clone)]
pub struct JsonDirMappingSource {
    dir: PathBuf,
}

impl JsonDirMappingSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default location under the user's config directory.
    pub fn default_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("invrec")
            .join("mappings")
    }

    pub fn path_for(&self, supplier: &SupplierId) -> PathBuf {
        let name: String = supplier
            .0
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.dir.join(format!("{}.json", name))
    }

    /// Append mappings for codes the stored table does not have yet.
    ///
    /// Returns the number of mappings added.
    pub async fn merge(
        &self,
        supplier: &SupplierId,
        learned: &[SupplierCodeMapping],
    ) -> anyhow::Result<usize> {
        let mut table = self.load(supplier).await?;
        let before = table.len();

        for mapping in learned {
            let known = table
                .iter()
                .any(|m| m.supplier_code.trim() == mapping.supplier_code.trim());
            if !known {
                table.push(mapping.clone());
            }
        }

        let added = table.len() - before;
        if added > 0 {
            fs::create_dir_all(&self.dir).await?;
            let path = self.path_for(supplier);
            fs::write(&path, serde_json::to_string_pretty(&table)?).await?;
            info!("Stored {} new mapping(s) in {}", added, path.display());
        }
        Ok(added)
    }
}

#[async_trait]
impl CodeMappingSource for JsonDirMappingSource {
    async fn load(&self, supplier: &SupplierId) -> Result<Vec<SupplierCodeMapping>, MappingError> {
        let path = self.path_for(supplier);
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No mapping table at {}", path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(MappingError::Load {
                    supplier: supplier.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        serde_json::from_str(&content).map_err(|e| MappingError::Invalid {
            supplier: supplier.to_string(),
            reason: format!("{}: {}", path.display(), e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invrec_core::ProductId;
    use rust_decimal::Decimal;

    fn mapping(code: &str, product: &str) -> SupplierCodeMapping {
        SupplierCodeMapping {
            supplier_code: code.to_string(),
            product_id: ProductId::from(product),
            last_price: Some(Decimal::TEN),
            last_landed_price: None,
        }
    }

    #[tokio::test]
    async fn test_missing_table_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonDirMappingSource::new(dir.path());

        let table = source.load(&SupplierId::from("ACME")).await.unwrap();
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_table_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ACME.json"), "{not json").unwrap();
        let source = JsonDirMappingSource::new(dir.path());

        let err = source.load(&SupplierId::from("ACME")).await.unwrap_err();
        assert!(matches!(err, MappingError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_merge_adds_only_new_codes() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonDirMappingSource::new(dir.path().join("mappings"));
        let supplier = SupplierId::from("ACME");

        let added = source.merge(&supplier, &[mapping("A1", "10")]).await.unwrap();
        assert_eq!(added, 1);

        let added = source
            .merge(&supplier, &[mapping("A1", "99"), mapping("B2", "20")])
            .await
            .unwrap();
        assert_eq!(added, 1);

        let table = source.load(&supplier).await.unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].product_id, ProductId::from("10"));
        assert_eq!(table[1].supplier_code, "B2");
    }

    #[test]
    fn test_supplier_file_name_is_sanitized() {
        let source = JsonDirMappingSource::new("/tmp/m");
        assert_eq!(
            source.path_for(&SupplierId::from("a/b")),
            PathBuf::from("/tmp/m/a_b.json")
        );
    }
}
