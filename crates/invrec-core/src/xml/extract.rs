//! Dialect-agnostic header and line extraction.
//!
//! Every field is looked up through one candidate list that spans UBL
//! (incl. UBL-TR), UN/CEFACT CII (XRechnung, ZUGFeRD, Factur-X),
//! ebInterface and eSLOG, followed by generic element names. The detected
//! dialect is recorded but does not change the lookups, so documents of an
//! unrecognised dialect still get a best-effort extraction.

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::models::invoice::{DeclaredTotals, ExtractedDocument, ExtractedHeader, SourceFormat};
use crate::models::line::{LineFields, RawLineItem};
use crate::selector::FieldSelector;
use crate::values::{parse_date, parse_decimal};

use super::dialect::XmlDialect;
use super::document::XmlElement;

/// Line-item container element names, most specific first.
pub const LINE_CONTAINERS: &[&str] = &[
    "InvoiceLine",
    "CreditNoteLine",
    "IncludedSupplyChainTradeLineItem",
    "ListLineItem",
    "G_SG26",
    "PostavkaRacuna",
    "InvoiceItem",
    "LineItem",
    "Line",
];

const INVOICE_NUMBER: FieldSelector = FieldSelector::new(
    "invoice_number",
    &[
        "/ID",
        "ExchangedDocument/ID",
        "HeaderExchangedDocument/ID",
        "/InvoiceNumber",
        "S_BGM/C_C106/D_1004",
        "StevilkaRacuna",
        "InvoiceNumber",
        "/Number",
    ],
);

const INVOICE_DATE: FieldSelector = FieldSelector::new(
    "invoice_date",
    &[
        "/IssueDate",
        "ExchangedDocument/IssueDateTime/DateTimeString",
        "HeaderExchangedDocument/IssueDateTime/DateTimeString",
        "/InvoiceDate",
        "S_DTM/C_C507[D_2005=137]/D_2380",
        "DatumiRacuna[VrstaDatuma=137]/DatumRacuna",
        "S_DTM/C_C507/D_2380",
        "DatumRacuna",
        "InvoiceDate",
        "IssueDate",
    ],
);

const DUE_DATE: FieldSelector = FieldSelector::new(
    "due_date",
    &[
        "/DueDate",
        "PaymentMeans/PaymentDueDate",
        "SpecifiedTradePaymentTerms/DueDateDateTime/DateTimeString",
        "PaymentConditions/DueDate",
        "S_DTM/C_C507[D_2005=13]/D_2380",
        "DatumiRacuna[VrstaDatuma=13]/DatumRacuna",
        "DueDate",
        "PaymentDueDate",
    ],
);

const CURRENCY: FieldSelector = FieldSelector::new(
    "currency",
    &[
        "/DocumentCurrencyCode",
        "InvoiceCurrencyCode",
        "@InvoiceCurrency",
        "/InvoiceCurrency",
        "S_CUX/C_C504[D_6347=2]/D_6345",
        "S_CUX/C_C504/D_6345",
        "Valuta[VrstaValuteRacuna=2]/KodaValute",
        "KodaValute",
        "DocumentCurrencyCode",
        "Currency",
    ],
);

const SUPPLIER_NAME: FieldSelector = FieldSelector::new(
    "supplier_name",
    &[
        "AccountingSupplierParty/Party/PartyName/Name",
        "AccountingSupplierParty/Party/PartyLegalEntity/RegistrationName",
        "SellerTradeParty/Name",
        "Biller/Address/Name",
        "G_SG2[S_NAD/D_3035=SE]/S_NAD/C_C080/D_3036",
        "NazivNaslovPodjetja[VrstaPartnerja=II]/NazivPartnerja/NazivPartnerja1",
        "Seller/Name",
        "Supplier/Name",
    ],
);

const SUPPLIER_TAX_ID: FieldSelector = FieldSelector::new(
    "supplier_tax_id",
    &[
        "AccountingSupplierParty/Party/PartyTaxScheme/CompanyID",
        "AccountingSupplierParty/Party/PartyIdentification/ID",
        "SellerTradeParty/SpecifiedTaxRegistration/ID",
        "Biller/VATIdentificationNumber",
        "G_SG2[S_NAD/D_3035=SE]/G_SG3/S_RFF/C_C506[D_1153=VA]/D_1154",
        "PodatkiPodjetja[NazivNaslovPodjetja/VrstaPartnerja=II]/ReferencniPodatkiPodjetja[VrstaPodatkaPodjetja=VA]/PodatekPodjetja",
        "Seller/VatId",
        "Supplier/TaxId",
    ],
);

const DECLARED_SUBTOTAL: FieldSelector = FieldSelector::new(
    "declared_subtotal",
    &[
        "LegalMonetaryTotal/LineExtensionAmount",
        "SpecifiedTradeSettlementHeaderMonetarySummation/LineTotalAmount",
        "SpecifiedTradeSettlementMonetarySummation/LineTotalAmount",
        "S_MOA/C_C516[D_5025=79]/D_5004",
        "ZneskiRacuna[VrstaZneska=79]/ZnesekRacuna",
    ],
);

const DECLARED_TAX: FieldSelector = FieldSelector::new(
    "declared_tax",
    &[
        "/TaxTotal/TaxAmount",
        "SpecifiedTradeSettlementHeaderMonetarySummation/TaxTotalAmount",
        "SpecifiedTradeSettlementMonetarySummation/TaxTotalAmount",
        "S_MOA/C_C516[D_5025=176]/D_5004",
        "ZneskiRacuna[VrstaZneska=176]/ZnesekRacuna",
    ],
);

const DECLARED_GRAND_TOTAL: FieldSelector = FieldSelector::new(
    "declared_grand_total",
    &[
        "LegalMonetaryTotal/TaxInclusiveAmount",
        "SpecifiedTradeSettlementHeaderMonetarySummation/GrandTotalAmount",
        "SpecifiedTradeSettlementMonetarySummation/GrandTotalAmount",
        "/TotalGrossAmount",
        "S_MOA/C_C516[D_5025=86]/D_5004",
        "ZneskiRacuna[VrstaZneska=86]/ZnesekRacuna",
    ],
);

const LINE_SUPPLIER_CODE: FieldSelector = FieldSelector::new(
    "supplier_code",
    &[
        "SellersItemIdentification/ID",
        "SellerAssignedID",
        "S_PIA/C_C212[D_7143=SA]/D_7140",
        "SifreArtiklov[VrstaPodatkaArtikla=SA]/SifraArtikla",
        "ArticleNumber",
        "SupplierCode",
    ],
);

const LINE_INTERNAL_CODE: FieldSelector = FieldSelector::new(
    "internal_code",
    &[
        "BuyersItemIdentification/ID",
        "BuyerAssignedID",
        "BuyersArticleNumber",
        "S_PIA/C_C212[D_7143=IN]/D_7140",
        "SifreArtiklov[VrstaPodatkaArtikla=IN]/SifraArtikla",
        "InternalCode",
    ],
);

const LINE_DESCRIPTION: FieldSelector = FieldSelector::new(
    "description",
    &[
        "Item/Name",
        "Item/Description",
        "SpecifiedTradeProduct/Name",
        "/Description",
        "S_IMD/C_C273/D_7008",
        "OpisArtikla/OpisArtikla1",
        "/Name",
        "ItemName",
        "Description",
        "Name",
    ],
);

const LINE_QUANTITY: FieldSelector = FieldSelector::new(
    "quantity",
    &[
        "/InvoicedQuantity",
        "/CreditedQuantity",
        "SpecifiedLineTradeDelivery/BilledQuantity",
        "SpecifiedSupplyChainTradeDelivery/BilledQuantity",
        "/Quantity",
        "S_QTY/C_C186[D_6063=47]/D_6060",
        "S_QTY/C_C186/D_6060",
        "KolicinaArtikla[VrstaKolicine=47]/Kolicina",
        "KolicinaArtikla/Kolicina",
        "Quantity",
    ],
);

const LINE_UNIT: FieldSelector = FieldSelector::new(
    "unit",
    &[
        "/InvoicedQuantity@unitCode",
        "/CreditedQuantity@unitCode",
        "BilledQuantity@unitCode",
        "/Quantity@Unit",
        "/Quantity@unitCode",
        "S_QTY/C_C186[D_6063=47]/D_6411",
        "S_QTY/C_C186/D_6411",
        "KolicinaArtikla[VrstaKolicine=47]/EnotaMere",
        "KolicinaArtikla/EnotaMere",
        "UnitCode",
        "Unit",
    ],
);

const LINE_UNIT_PRICE: FieldSelector = FieldSelector::new(
    "unit_price",
    &[
        "Price/PriceAmount",
        "NetPriceProductTradePrice/ChargeAmount",
        "GrossPriceProductTradePrice/ChargeAmount",
        "/UnitPrice",
        "S_PRI/C_C509[D_5125=AAA]/D_5118",
        "S_PRI/C_C509/D_5118",
        "CenaPostavke/Cena",
        "UnitPrice",
        "Price",
    ],
);

const LINE_TAX_RATE: FieldSelector = FieldSelector::new(
    "tax_rate",
    &[
        "Item/ClassifiedTaxCategory/Percent",
        "TaxTotal/TaxSubtotal/TaxCategory/Percent",
        "TaxTotal/TaxSubtotal/Percent",
        "ApplicableTradeTax/RateApplicablePercent",
        "ApplicableTradeTax/ApplicablePercent",
        "TaxItem/TaxPercent",
        "/VATRate",
        "S_TAX/C_C243/D_5278",
        "DavkiNaPostavki[VrstaDavkaPostavke=VAT]/OdstotekDavkaPostavke",
        "TaxPercent",
        "VatRate",
        "Percent",
    ],
);

const LINE_TOTAL: FieldSelector = FieldSelector::new(
    "line_total",
    &[
        "/LineExtensionAmount",
        "SpecifiedTradeSettlementLineMonetarySummation/LineTotalAmount",
        "SpecifiedTradeSettlementMonetarySummation/LineTotalAmount",
        "/LineItemAmount",
        "S_MOA/C_C516[D_5025=203]/D_5004",
        "ZneskiPostavke[VrstaZneskaPostavke=203]/ZnesekPostavke",
        "LineTotal",
    ],
);

/// Extract header fields, declared totals and line items from a parsed document.
///
/// When no line container is found a single placeholder line flagged for
/// manual entry is returned instead.
pub fn extract(
    root: &XmlElement,
    dialect: XmlDialect,
    default_tax_rate: Decimal,
    placeholder_description: &str,
) -> ExtractedDocument {
    let header = extract_header(root);
    let declared = extract_declared(root);

    let mut lines = extract_lines(root, default_tax_rate);
    if lines.is_empty() {
        warn!("No line items found; adding a placeholder line for manual entry");
        lines.push(RawLineItem::placeholder(placeholder_description, default_tax_rate));
    }

    info!(
        "Extracted {} line(s) from {} document {:?}",
        lines.len(),
        dialect.label(),
        header.invoice_number.as_deref().unwrap_or("<no number>")
    );

    ExtractedDocument {
        format: SourceFormat::Xml(dialect),
        header,
        lines,
        declared,
    }
}

fn extract_header(root: &XmlElement) -> ExtractedHeader {
    let date = |selector: &FieldSelector| {
        let raw = selector.resolve(root)?;
        let parsed = parse_date(&raw);
        if parsed.is_none() {
            debug!("Unparsable {} {:?}", selector.field, raw);
        }
        parsed
    };

    ExtractedHeader {
        invoice_number: INVOICE_NUMBER.resolve(root),
        invoice_date: date(&INVOICE_DATE),
        due_date: date(&DUE_DATE),
        currency: CURRENCY.resolve(root),
        supplier_name: SUPPLIER_NAME.resolve(root),
        supplier_tax_id: SUPPLIER_TAX_ID.resolve(root),
    }
}

fn extract_declared(root: &XmlElement) -> Option<DeclaredTotals> {
    let amount = |selector: &FieldSelector| selector.resolve(root).as_deref().and_then(parse_decimal);

    let declared = DeclaredTotals {
        subtotal: amount(&DECLARED_SUBTOTAL),
        total_tax: amount(&DECLARED_TAX),
        grand_total: amount(&DECLARED_GRAND_TOTAL),
    };
    (!declared.is_empty()).then_some(declared)
}

/// Containers of the first container name that occurs in the document.
pub fn line_containers(root: &XmlElement) -> (Option<&'static str>, Vec<&XmlElement>) {
    LINE_CONTAINERS
        .iter()
        .map(|name| (*name, root.descendants_named(name)))
        .find(|(_, found)| !found.is_empty())
        .map_or((None, Vec::new()), |(name, found)| (Some(name), found))
}

fn extract_lines(root: &XmlElement, default_tax_rate: Decimal) -> Vec<RawLineItem> {
    let (container, nodes) = line_containers(root);
    if let Some(name) = container {
        debug!("Found {} <{}> line container(s)", nodes.len(), name);
    }

    let mut lines = Vec::new();
    for (idx, node) in nodes.into_iter().enumerate() {
        let fields = LineFields {
            supplier_code: LINE_SUPPLIER_CODE.resolve(node),
            internal_code: LINE_INTERNAL_CODE.resolve(node),
            description: LINE_DESCRIPTION.resolve(node),
            quantity: LINE_QUANTITY.resolve(node),
            unit: LINE_UNIT.resolve(node),
            unit_price: LINE_UNIT_PRICE.resolve(node),
            tax_rate: LINE_TAX_RATE.resolve(node),
            line_total: LINE_TOTAL.resolve(node),
        };
        if fields.is_blank() {
            debug!("Skipping empty line container #{}", idx + 1);
            continue;
        }

        let line_no = lines.len() as u32 + 1;
        lines.push(fields.resolve(line_no, idx as u32 + 1, default_tax_rate));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::document::XmlDocument;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    const PLACEHOLDER: &str = "manual entry required";

    fn run(xml: &str) -> ExtractedDocument {
        let doc = XmlDocument::parse(xml.as_bytes()).unwrap();
        extract(&doc.root, XmlDialect::Unknown, dec!(20), PLACEHOLDER)
    }

    #[test]
    fn test_cii_lines() {
        let xml = r#"<rsm:CrossIndustryInvoice xmlns:rsm="urn:rsm" xmlns:ram="urn:ram" xmlns:udt="urn:udt">
          <rsm:ExchangedDocument>
            <ram:ID>RE-2024-17</ram:ID>
            <ram:IssueDateTime><udt:DateTimeString format="102">20240305</udt:DateTimeString></ram:IssueDateTime>
          </rsm:ExchangedDocument>
          <rsm:SupplyChainTradeTransaction>
            <ram:IncludedSupplyChainTradeLineItem>
              <ram:SpecifiedTradeProduct><ram:SellerAssignedID>S-1</ram:SellerAssignedID><ram:Name>Mehl Typ 405</ram:Name></ram:SpecifiedTradeProduct>
              <ram:SpecifiedLineTradeAgreement>
                <ram:NetPriceProductTradePrice><ram:ChargeAmount>0.85</ram:ChargeAmount></ram:NetPriceProductTradePrice>
              </ram:SpecifiedLineTradeAgreement>
              <ram:SpecifiedLineTradeDelivery><ram:BilledQuantity unitCode="KGM">25</ram:BilledQuantity></ram:SpecifiedLineTradeDelivery>
              <ram:SpecifiedLineTradeSettlement>
                <ram:ApplicableTradeTax><ram:RateApplicablePercent>7</ram:RateApplicablePercent></ram:ApplicableTradeTax>
              </ram:SpecifiedLineTradeSettlement>
            </ram:IncludedSupplyChainTradeLineItem>
            <ram:ApplicableHeaderTradeSettlement>
              <ram:InvoiceCurrencyCode>EUR</ram:InvoiceCurrencyCode>
              <ram:SpecifiedTradeSettlementHeaderMonetarySummation>
                <ram:LineTotalAmount>21.25</ram:LineTotalAmount>
                <ram:TaxTotalAmount currencyID="EUR">1.49</ram:TaxTotalAmount>
                <ram:GrandTotalAmount>22.74</ram:GrandTotalAmount>
              </ram:SpecifiedTradeSettlementHeaderMonetarySummation>
            </ram:ApplicableHeaderTradeSettlement>
          </rsm:SupplyChainTradeTransaction>
        </rsm:CrossIndustryInvoice>"#;

        let extracted = run(xml);
        assert_eq!(extracted.header.invoice_number.as_deref(), Some("RE-2024-17"));
        assert_eq!(extracted.header.invoice_date, NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(extracted.header.currency.as_deref(), Some("EUR"));

        assert_eq!(extracted.lines.len(), 1);
        let line = &extracted.lines[0];
        assert_eq!(line.supplier_code.as_deref(), Some("S-1"));
        assert_eq!(line.description, "Mehl Typ 405");
        assert_eq!(line.quantity, dec!(25));
        assert_eq!(line.unit, "KG");
        assert_eq!(line.unit_price, dec!(0.85));
        assert_eq!(line.tax_rate, dec!(7));
        assert_eq!(line.net_total, dec!(21.25));

        let declared = extracted.declared.unwrap();
        assert_eq!(declared.subtotal, Some(dec!(21.25)));
        assert_eq!(declared.total_tax, Some(dec!(1.49)));
        assert_eq!(declared.grand_total, Some(dec!(22.74)));
    }

    const ESLOG_20: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Invoice xmlns="urn:eslog:2.00">
  <M_INVOIC Id="data">
    <S_BGM><C_C002><D_1001>380</D_1001></C_C002><C_C106><D_1004>2024-00042</D_1004></C_C106></S_BGM>
    <S_DTM><C_C507><D_2005>35</D_2005><D_2380>2024-03-10</D_2380></C_C507></S_DTM>
    <S_DTM><C_C507><D_2005>137</D_2005><D_2380>2024-03-15</D_2380></C_C507></S_DTM>
    <G_SG2>
      <S_NAD><D_3035>BY</D_3035><C_C080><D_3036>Gostilna Pri Lipi</D_3036></C_C080></S_NAD>
      <G_SG3><S_RFF><C_C506><D_1153>VA</D_1153><D_1154>SI99999999</D_1154></C_C506></S_RFF></G_SG3>
    </G_SG2>
    <G_SG2>
      <S_NAD><D_3035>SE</D_3035><C_C080><D_3036>Mesnine Kras d.o.o.</D_3036></C_C080></S_NAD>
      <G_SG3><S_RFF><C_C506><D_1153>VA</D_1153><D_1154>SI12345678</D_1154></C_C506></S_RFF></G_SG3>
    </G_SG2>
    <G_SG7><S_CUX><C_C504><D_6347>2</D_6347><D_6345>EUR</D_6345></C_C504></S_CUX></G_SG7>
    <G_SG8>
      <S_PAT><D_4279>1</D_4279></S_PAT>
      <S_DTM><C_C507><D_2005>13</D_2005><D_2380>2024-04-14</D_2380></C_C507></S_DTM>
    </G_SG8>
    <G_SG26>
      <S_LIN><D_1082>1</D_1082></S_LIN>
      <S_PIA><D_4347>5</D_4347><C_C212><D_7140>KR-100</D_7140><D_7143>SA</D_7143></C_C212></S_PIA>
      <S_IMD><D_7077>F</D_7077><C_C273><D_7008>Goveje meso mleto</D_7008></C_C273></S_IMD>
      <S_QTY><C_C186><D_6063>47</D_6063><D_6060>12.5</D_6060><D_6411>KGM</D_6411></C_C186></S_QTY>
      <G_SG27><S_MOA><C_C516><D_5025>38</D_5025><D_5004>123.19</D_5004></C_C516></S_MOA></G_SG27>
      <G_SG27><S_MOA><C_C516><D_5025>203</D_5025><D_5004>112.50</D_5004></C_C516></S_MOA></G_SG27>
      <G_SG29><S_PRI><C_C509><D_5125>AAB</D_5125><D_5118>10.00</D_5118></C_C509></S_PRI></G_SG29>
      <G_SG29><S_PRI><C_C509><D_5125>AAA</D_5125><D_5118>9.00</D_5118></C_C509></S_PRI></G_SG29>
      <G_SG34>
        <S_TAX><D_5283>7</D_5283><C_C241><D_5153>VAT</D_5153></C_C241><C_C243><D_5278>9.5</D_5278></C_C243></S_TAX>
        <S_MOA><C_C516><D_5025>124</D_5025><D_5004>10.69</D_5004></C_C516></S_MOA>
      </G_SG34>
    </G_SG26>
    <G_SG26>
      <S_LIN><D_1082>2</D_1082></S_LIN>
      <S_PIA><D_4347>1</D_4347><C_C212><D_7140>URN-7</D_7140><D_7143>IN</D_7143></C_C212></S_PIA>
      <S_IMD><D_7077>F</D_7077><C_C273><D_7008>Jajca M</D_7008></C_C273></S_IMD>
      <S_QTY><C_C186><D_6063>46</D_6063><D_6060>5</D_6060><D_6411>H87</D_6411></C_C186></S_QTY>
      <S_QTY><C_C186><D_6063>47</D_6063><D_6060>4</D_6060><D_6411>H87</D_6411></C_C186></S_QTY>
      <G_SG27><S_MOA><C_C516><D_5025>38</D_5025><D_5004>12.20</D_5004></C_C516></S_MOA></G_SG27>
      <G_SG27><S_MOA><C_C516><D_5025>203</D_5025><D_5004>10.00</D_5004></C_C516></S_MOA></G_SG27>
      <G_SG34>
        <S_TAX><D_5283>7</D_5283><C_C241><D_5153>VAT</D_5153></C_C241><C_C243><D_5278>22</D_5278></C_C243></S_TAX>
      </G_SG34>
    </G_SG26>
    <G_SG50><S_MOA><C_C516><D_5025>79</D_5025><D_5004>122.50</D_5004></C_C516></S_MOA></G_SG50>
    <G_SG50><S_MOA><C_C516><D_5025>176</D_5025><D_5004>12.89</D_5004></C_C516></S_MOA></G_SG50>
    <G_SG50><S_MOA><C_C516><D_5025>86</D_5025><D_5004>135.39</D_5004></C_C516></S_MOA></G_SG50>
  </M_INVOIC>
</Invoice>"#;

    #[test]
    fn test_eslog_qualified_segments() {
        let doc = XmlDocument::parse(ESLOG_20.as_bytes()).unwrap();
        assert_eq!(crate::xml::detect(&doc.root), XmlDialect::Eslog);

        let extracted = extract(&doc.root, XmlDialect::Eslog, dec!(20), PLACEHOLDER);
        let header = &extracted.header;
        assert_eq!(header.invoice_number.as_deref(), Some("2024-00042"));
        assert_eq!(header.invoice_date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(header.due_date, NaiveDate::from_ymd_opt(2024, 4, 14));
        assert_eq!(header.currency.as_deref(), Some("EUR"));
        assert_eq!(header.supplier_name.as_deref(), Some("Mesnine Kras d.o.o."));
        assert_eq!(header.supplier_tax_id.as_deref(), Some("SI12345678"));

        assert_eq!(extracted.lines.len(), 2);
        let meat = &extracted.lines[0];
        assert_eq!(meat.supplier_code.as_deref(), Some("KR-100"));
        assert_eq!(meat.internal_code, None);
        assert_eq!(meat.description, "Goveje meso mleto");
        assert_eq!(meat.quantity, dec!(12.5));
        assert_eq!(meat.unit, "KG");
        // Net (AAA) price, not the gross one listed first
        assert_eq!(meat.unit_price, dec!(9.00));
        assert_eq!(meat.tax_rate, dec!(9.5));
        assert_eq!(meat.net_total, dec!(112.50));

        let eggs = &extracted.lines[1];
        assert_eq!(eggs.supplier_code, None);
        assert_eq!(eggs.internal_code.as_deref(), Some("URN-7"));
        assert_eq!(eggs.quantity, dec!(4));
        assert_eq!(eggs.unit, "PIECE");
        // From the net line amount (203), not the gross one (38)
        assert_eq!(eggs.unit_price, dec!(2.50));
        assert_eq!(eggs.tax_rate, dec!(22));

        let declared = extracted.declared.unwrap();
        assert_eq!(declared.subtotal, Some(dec!(122.50)));
        assert_eq!(declared.total_tax, Some(dec!(12.89)));
        assert_eq!(declared.grand_total, Some(dec!(135.39)));
    }

    #[test]
    fn test_eslog_simple_invoice_lines() {
        let xml = r#"<IzdaniRacunEnostavni xmlns="http://www.gzs.si/shemas/eslog/racun/1.6">
  <Racun Id="data">
    <GlavaRacuna><VrstaRacuna>380</VrstaRacuna><StevilkaRacuna>24-0815</StevilkaRacuna></GlavaRacuna>
    <DatumiRacuna><VrstaDatuma>35</VrstaDatuma><DatumRacuna>2024-05-30T00:00:00</DatumRacuna></DatumiRacuna>
    <DatumiRacuna><VrstaDatuma>137</VrstaDatuma><DatumRacuna>2024-06-03T00:00:00</DatumRacuna></DatumiRacuna>
    <Valuta><VrstaValuteRacuna>2</VrstaValuteRacuna><KodaValute>EUR</KodaValute></Valuta>
    <PodatkiPodjetja>
      <NazivNaslovPodjetja><VrstaPartnerja>BY</VrstaPartnerja><NazivPartnerja><NazivPartnerja1>Pekarna Novak</NazivPartnerja1></NazivPartnerja></NazivNaslovPodjetja>
      <ReferencniPodatkiPodjetja><VrstaPodatkaPodjetja>VA</VrstaPodatkaPodjetja><PodatekPodjetja>SI11111111</PodatekPodjetja></ReferencniPodatkiPodjetja>
    </PodatkiPodjetja>
    <PodatkiPodjetja>
      <NazivNaslovPodjetja><VrstaPartnerja>II</VrstaPartnerja><NazivPartnerja><NazivPartnerja1>Mlin Jesenko d.o.o.</NazivPartnerja1></NazivPartnerja></NazivNaslovPodjetja>
      <ReferencniPodatkiPodjetja><VrstaPodatkaPodjetja>VA</VrstaPodatkaPodjetja><PodatekPodjetja>SI22222222</PodatekPodjetja></ReferencniPodatkiPodjetja>
    </PodatkiPodjetja>
    <PostavkaRacuna>
      <Postavka><StevilkaVrstice>1</StevilkaVrstice></Postavka>
      <SifreArtiklov><VrstaPodatkaArtikla>SA</VrstaPodatkaArtikla><SifraArtikla>T500</SifraArtikla></SifreArtiklov>
      <OpisiArtiklov><OpisArtikla><OpisArtikla1>Moka T-500</OpisArtikla1></OpisArtikla></OpisiArtiklov>
      <KolicinaArtikla><VrstaKolicine>47</VrstaKolicine><Kolicina>20</Kolicina><EnotaMere>KGM</EnotaMere></KolicinaArtikla>
      <ZneskiPostavke><VrstaZneskaPostavke>38</VrstaZneskaPostavke><ZnesekPostavke>19.71</ZnesekPostavke></ZneskiPostavke>
      <ZneskiPostavke><VrstaZneskaPostavke>203</VrstaZneskaPostavke><ZnesekPostavke>18.00</ZnesekPostavke></ZneskiPostavke>
      <DavkiPostavke><DavkiNaPostavki><VrstaDavkaPostavke>VAT</VrstaDavkaPostavke><OdstotekDavkaPostavke>9.5</OdstotekDavkaPostavke></DavkiNaPostavki></DavkiPostavke>
    </PostavkaRacuna>
    <PovzetekZneskovRacuna>
      <ZneskiRacuna><VrstaZneska>79</VrstaZneska><ZnesekRacuna>18.00</ZnesekRacuna></ZneskiRacuna>
      <ZneskiRacuna><VrstaZneska>86</VrstaZneska><ZnesekRacuna>19.71</ZnesekRacuna></ZneskiRacuna>
    </PovzetekZneskovRacuna>
  </Racun>
</IzdaniRacunEnostavni>"#;

        let doc = XmlDocument::parse(xml.as_bytes()).unwrap();
        assert_eq!(crate::xml::detect(&doc.root), XmlDialect::Eslog);

        let extracted = extract(&doc.root, XmlDialect::Eslog, dec!(22), PLACEHOLDER);
        let header = &extracted.header;
        assert_eq!(header.invoice_number.as_deref(), Some("24-0815"));
        assert_eq!(header.invoice_date, NaiveDate::from_ymd_opt(2024, 6, 3));
        assert_eq!(header.currency.as_deref(), Some("EUR"));
        assert_eq!(header.supplier_name.as_deref(), Some("Mlin Jesenko d.o.o."));
        assert_eq!(header.supplier_tax_id.as_deref(), Some("SI22222222"));

        assert_eq!(extracted.lines.len(), 1);
        let flour = &extracted.lines[0];
        assert_eq!(flour.supplier_code.as_deref(), Some("T500"));
        assert_eq!(flour.description, "Moka T-500");
        assert_eq!(flour.quantity, dec!(20));
        assert_eq!(flour.unit, "KG");
        assert_eq!(flour.unit_price, dec!(0.90));
        assert_eq!(flour.tax_rate, dec!(9.5));
        assert_eq!(flour.net_total, dec!(18.00));

        let declared = extracted.declared.unwrap();
        assert_eq!(declared.subtotal, Some(dec!(18.00)));
        assert_eq!(declared.total_tax, None);
        assert_eq!(declared.grand_total, Some(dec!(19.71)));
    }

    #[test]
    fn test_ebinterface_lines() {
        let xml = r#"<Invoice xmlns="http://www.ebinterface.at/schema/6p1/" InvoiceCurrency="EUR">
          <InvoiceNumber>993433000298</InvoiceNumber>
          <InvoiceDate>2024-02-01</InvoiceDate>
          <Details><ItemList>
            <ListLineItem>
              <Description>Schraubenzieher</Description>
              <ArticleNumber>A-77</ArticleNumber>
              <Quantity Unit="STK">100</Quantity>
              <UnitPrice>10,20</UnitPrice>
              <TaxItem><TaxPercent TaxCategoryCode="S">20</TaxPercent></TaxItem>
              <LineItemAmount>1020.00</LineItemAmount>
            </ListLineItem>
          </ItemList></Details>
        </Invoice>"#;

        let extracted = run(xml);
        assert_eq!(extracted.header.invoice_number.as_deref(), Some("993433000298"));
        assert_eq!(extracted.header.currency.as_deref(), Some("EUR"));

        let line = &extracted.lines[0];
        assert_eq!(line.supplier_code.as_deref(), Some("A-77"));
        assert_eq!(line.unit, "PIECE");
        assert_eq!(line.unit_price, dec!(10.20));
        assert_eq!(line.tax_rate, dec!(20));
        assert_eq!(line.net_total, dec!(1020.00));
    }

    #[test]
    fn test_price_from_line_total() {
        let xml = r#"<Invoice><Line><Name>Oil</Name><Quantity>4</Quantity><LineTotal>10</LineTotal></Line></Invoice>"#;
        let extracted = run(xml);
        assert_eq!(extracted.lines[0].unit_price, dec!(2.5));
        assert_eq!(extracted.lines[0].tax_rate, dec!(20));
    }

    #[test]
    fn test_no_containers_yields_placeholder() {
        let extracted = run("<Document><Header><Number>7</Number></Header></Document>");

        assert_eq!(extracted.lines.len(), 1);
        let line = &extracted.lines[0];
        assert!(line.needs_manual_entry);
        assert_eq!(line.unit_price, Decimal::ZERO);
        assert_eq!(line.description, PLACEHOLDER);
        assert!(extracted.declared.is_none());
    }

    #[test]
    fn test_empty_containers_are_skipped() {
        let extracted = run("<Invoice><InvoiceLine/><InvoiceLine><Name>Salt</Name></InvoiceLine></Invoice>");
        assert_eq!(extracted.lines.len(), 1);
        assert_eq!(extracted.lines[0].line_no, 1);
        assert_eq!(extracted.lines[0].source_row, 2);
    }
}
