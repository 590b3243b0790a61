//! Header-keyword column mapping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::values::fold_text;

/// Semantic spreadsheet column.
///
/// Variant order is the assignment order used by [`ColumnMapping::auto`]:
/// a column claimed by an earlier field is never reused by a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetField {
    SupplierCode,
    InternalCode,
    ProductName,
    Quantity,
    UnitPrice,
    Unit,
    TaxRate,
}

impl SheetField {
    pub const ALL: [SheetField; 7] = [
        SheetField::SupplierCode,
        SheetField::InternalCode,
        SheetField::ProductName,
        SheetField::Quantity,
        SheetField::UnitPrice,
        SheetField::Unit,
        SheetField::TaxRate,
    ];

    /// Stable key, also the selector name on a spreadsheet row.
    pub fn key(&self) -> &'static str {
        match self {
            SheetField::SupplierCode => "supplier_code",
            SheetField::InternalCode => "internal_code",
            SheetField::ProductName => "product_name",
            SheetField::Quantity => "quantity",
            SheetField::UnitPrice => "unit_price",
            SheetField::Unit => "unit",
            SheetField::TaxRate => "tax_rate",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Folded header keywords (Turkish, Slovenian/Croatian, German, English).
    fn keywords(&self) -> &'static [&'static str] {
        match self {
            SheetField::SupplierCode => &[
                "tedarikci kod",
                "tedarikci",
                "supplier code",
                "supplier sku",
                "supplier",
                "vendor code",
                "vendor",
                "sifra dobavitelja",
                "dobavitelj",
                "sifra dobavljaca",
                "dobavljac",
                "lieferantenartikel",
                "lieferant",
            ],
            SheetField::InternalCode => &[
                "bizim kod",
                "bizim",
                "our code",
                "internal code",
                "internal",
                "nasa sifra",
                "interna sifra",
                "stok kod",
                "stok",
                "artikelnummer",
                "artikelnr",
                "product code",
                "item code",
                "sku",
                "sifra",
                "code",
                "kod",
            ],
            SheetField::ProductName => &[
                "urun adi",
                "urun",
                "malzeme",
                "aciklama",
                "product name",
                "product",
                "item name",
                "description",
                "naziv",
                "opis",
                "bezeichnung",
                "artikel",
                "name",
                "item",
            ],
            SheetField::Quantity => &[
                "miktar", "adet", "quantity", "qty", "kolicina", "menge", "anzahl",
            ],
            SheetField::UnitPrice => &[
                "birim fiyat",
                "fiyat",
                "unit price",
                "price",
                "cena",
                "einzelpreis",
                "preis",
            ],
            SheetField::Unit => &["birim", "unit", "uom", "enota", "einheit", "mera", "jm"],
            SheetField::TaxRate => &[
                "kdv", "vat", "tax", "vergi", "ddv", "pdv", "mwst", "stopnja",
            ],
        }
    }

    fn matches_header(&self, folded_header: &str) -> bool {
        self.keywords().iter().any(|kw| folded_header.contains(kw))
    }
}

/// Assignment of semantic fields to zero-based column indices.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnMapping(BTreeMap<SheetField, usize>);

impl ColumnMapping {
    /// Infer the mapping from header cells.
    pub fn auto(headers: &[String]) -> Self {
        let folded: Vec<String> = headers.iter().map(|h| fold_text(h)).collect();
        let mut mapping = BTreeMap::new();

        for field in SheetField::ALL {
            let column = folded.iter().enumerate().find(|(idx, header)| {
                !header.is_empty()
                    && !mapping.values().any(|claimed| claimed == idx)
                    && field.matches_header(header)
            });

            if let Some((idx, _)) = column {
                debug!("Mapped column {} ({:?}) to {}", idx, headers[idx], field.key());
                mapping.insert(field, idx);
            }
        }

        Self(mapping)
    }

    pub fn get(&self, field: SheetField) -> Option<usize> {
        self.0.get(&field).copied()
    }

    /// Assign or unassign a field. Range checks are the caller's concern.
    pub fn set(&mut self, field: SheetField, column: Option<usize>) {
        match column {
            Some(idx) => self.0.insert(field, idx),
            None => self.0.remove(&field),
        };
    }

    pub fn iter(&self) -> impl Iterator<Item = (SheetField, usize)> + '_ {
        self.0.iter().map(|(field, idx)| (*field, *idx))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
