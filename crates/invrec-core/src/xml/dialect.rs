//! E-invoice dialect detection from the root element.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::document::XmlElement;

const UBL_NAMESPACE: &str = "oasis:names:specification:ubl";

/// Known XML e-invoice dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XmlDialect {
    /// Slovenian eSLOG.
    Eslog,
    /// Austrian ebInterface.
    EbInterface,
    /// German XRechnung (CII syntax).
    XRechnung,
    /// German ZUGFeRD / Factur-X hybrid.
    Zugferd,
    /// Turkish localized UBL.
    UblTr,
    /// Generic OASIS UBL.
    Ubl,
    Unknown,
}

impl XmlDialect {
    pub fn label(&self) -> &'static str {
        match self {
            XmlDialect::Eslog => "eSLOG",
            XmlDialect::EbInterface => "ebInterface",
            XmlDialect::XRechnung => "XRechnung",
            XmlDialect::Zugferd => "ZUGFeRD",
            XmlDialect::UblTr => "UBL-TR",
            XmlDialect::Ubl => "UBL",
            XmlDialect::Unknown => "Unknown XML",
        }
    }
}

/// Classify a document by its root tag, namespaces and attributes.
///
/// Signatures are checked most specific first; generic UBL comes last.
pub fn detect(root: &XmlElement) -> XmlDialect {
    let namespaces = root
        .namespace_declarations()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let tag = root.name.to_lowercase();
    let attrs = root
        .attributes
        .iter()
        .map(|(_, v)| v.as_str())
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let has = |needle: &str| namespaces.contains(needle) || tag.contains(needle);

    let dialect = if has("eslog") || has("izdaniracun") || tag.contains("m_invoic") {
        XmlDialect::Eslog
    } else if has("ebinterface") {
        XmlDialect::EbInterface
    } else if has("xrechnung") {
        XmlDialect::XRechnung
    } else if has("zugferd") || has("factur-x") || tag.contains("crossindustrydocument") {
        XmlDialect::Zugferd
    } else if tag.contains("crossindustryinvoice") {
        XmlDialect::XRechnung
    } else if namespaces.contains(UBL_NAMESPACE) && is_turkish_ubl(root, &tag, &attrs) {
        XmlDialect::UblTr
    } else if namespaces.contains(UBL_NAMESPACE) {
        XmlDialect::Ubl
    } else {
        XmlDialect::Unknown
    };

    if dialect == XmlDialect::Unknown {
        info!("No known dialect signature on <{}>; using generic extraction", root.name);
    } else {
        debug!("Detected dialect {} from <{}>", dialect.label(), root.name);
    }
    dialect
}

fn is_turkish_ubl(root: &XmlElement, tag: &str, attrs: &str) -> bool {
    tag.contains("ubl-tr")
        || tag.contains("ubltr")
        || root.prefix().is_some_and(|p| p.eq_ignore_ascii_case("tr"))
        || attrs.contains("ubl-tr")
        || root
            .children_named("CustomizationID")
            .any(|c| c.text.to_lowercase().contains("tr1."))
}
