//! Product catalog, supplier and supplier code-mapping models.

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Catalog product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl From<&str> for ProductId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplier (partner) identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(pub String);

impl From<&str> for SupplierId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for SupplierId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for SupplierId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A product in the internal catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_code: Option<String>,
}

/// In-memory product catalog indexed by internal code and id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Product>", into = "Vec<Product>")]
pub struct ProductCatalog {
    products: Vec<Product>,
    by_code: HashMap<String, usize>,
    by_id: HashMap<ProductId, usize>,
}

impl ProductCatalog {
    /// Build a catalog. On duplicate codes or ids the first product wins.
    pub fn new(products: Vec<Product>) -> Self {
        let mut by_code = HashMap::new();
        let mut by_id = HashMap::new();

        for (idx, product) in products.iter().enumerate() {
            by_id.entry(product.id.clone()).or_insert(idx);
            if let Some(code) = product.internal_code.as_deref().map(str::trim) {
                if !code.is_empty() {
                    by_code.entry(code.to_string()).or_insert(idx);
                }
            }
        }

        Self {
            products,
            by_code,
            by_id,
        }
    }

    /// Load a catalog from a JSON array of products.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Look up a product by its exact internal code.
    pub fn find_by_internal_code(&self, code: &str) -> Option<&Product> {
        self.by_code.get(code.trim()).map(|&idx| &self.products[idx])
    }

    /// Look up a product by id.
    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.by_id.get(id).map(|&idx| &self.products[idx])
    }

    /// Products in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

impl From<Vec<Product>> for ProductCatalog {
    fn from(products: Vec<Product>) -> Self {
        Self::new(products)
    }
}

impl From<ProductCatalog> for Vec<Product> {
    fn from(catalog: ProductCatalog) -> Self {
        catalog.products
    }
}

/// A supplier known to the purchasing side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    pub id: SupplierId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
}

/// One row of a supplier's code-mapping table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplierCodeMapping {
    /// Product code as printed by the supplier.
    pub supplier_code: String,

    /// Catalog product the code resolves to.
    pub product_id: ProductId,

    /// Last purchase price paid to this supplier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_price: Option<Decimal>,

    /// Last landed price (purchase price plus allocated costs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_landed_price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, name: &str, code: Option<&str>) -> Product {
        Product {
            id: ProductId::from(id),
            name: name.to_string(),
            internal_code: code.map(str::to_string),
        }
    }

    #[test]
    fn test_catalog_indexes() {
        let catalog = ProductCatalog::new(vec![
            product("1", "Dana Kiyma", Some("URN-001")),
            product("2", "Tavuk Gogus", Some(" URN-002 ")),
            product("3", "Duplicate", Some("URN-001")),
        ]);

        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.find_by_internal_code("URN-001").map(|p| p.name.as_str()),
            Some("Dana Kiyma")
        );
        assert_eq!(
            catalog.find_by_internal_code("URN-002").map(|p| p.id.0.as_str()),
            Some("2")
        );
        assert!(catalog.find_by_internal_code("urn-001").is_none());
        assert_eq!(catalog.get(&ProductId::from("3")).map(|p| p.name.as_str()), Some("Duplicate"));
    }

    #[test]
    fn test_catalog_from_json() {
        let json = r#"[
            {"id": "10", "name": "Butter", "internal_code": "B-1"},
            {"id": "11", "name": "Cream"}
        ]"#;
        let catalog = ProductCatalog::from_json(json).unwrap();

        assert_eq!(catalog.len(), 2);
        assert!(catalog.find_by_internal_code("B-1").is_some());
        assert!(catalog.get(&ProductId::from("11")).is_some());
    }
}
