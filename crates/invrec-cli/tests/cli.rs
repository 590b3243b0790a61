use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use rust_decimal::Decimal;
use tempfile::TempDir;

const CATALOG: &str = r#"[
    {"id": "P1", "name": "Beef mince", "internal_code": "URN-1"},
    {"id": "P2", "name": "Chicken wings"}
]"#;

const INVOICE_CSV: &str = "Supplier Code;Our Code;Product;Qty;Unit;Price;VAT\n\
                           A1;URN-1;Beef mince;10;kg;5,00;10\n\
                           B2;;Chicken wings;4;pcs;2,50;10\n";

const ACME_MAPPINGS: &str = r#"[{"supplier_code": "B2", "product_id": "P2", "last_price": "2.00"}]"#;

const UBL: &str = r#"<Invoice xmlns="urn:oasis:names:specification:ubl:schema:xsd:Invoice-2"
    xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2"
    xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2">
  <cbc:ID>INV-7</cbc:ID>
  <cbc:IssueDate>2024-02-01</cbc:IssueDate>
  <cac:InvoiceLine>
    <cbc:InvoicedQuantity unitCode="KGM">2</cbc:InvoicedQuantity>
    <cac:Item><cbc:Name>Beef mince</cbc:Name></cac:Item>
    <cac:Price><cbc:PriceAmount>4.00</cbc:PriceAmount></cac:Price>
  </cac:InvoiceLine>
</Invoice>"#;

/// Temp workspace with a catalog, a mapping directory and one CSV invoice.
fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("catalog.json"), CATALOG).unwrap();
    fs::write(dir.path().join("invoice.csv"), INVOICE_CSV).unwrap();
    fs::create_dir(dir.path().join("mappings")).unwrap();
    fs::write(dir.path().join("mappings").join("ACME.json"), ACME_MAPPINGS).unwrap();
    dir
}

fn invrec(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("invrec").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("XDG_CONFIG_HOME", dir.join("config"));
    cmd
}

fn decimal(value: &serde_json::Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

#[test]
fn test_help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    invrec(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("batch"));
}

#[test]
fn test_import_csv_as_json() {
    let dir = workspace();
    let output = invrec(dir.path())
        .args([
            "import",
            "invoice.csv",
            "--branch",
            "Main",
            "--supplier",
            "ACME",
            "--catalog",
            "catalog.json",
            "--mappings",
            "mappings",
            "--transport",
            "15",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let invoice: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let lines = invoice["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["match"]["source"], "internal_code");
    assert_eq!(lines[0]["unit"], "KG");
    assert_eq!(lines[1]["match"]["source"], "supplier_code");
    assert_eq!(lines[1]["match"]["product_id"], "P2");
    assert_eq!(lines[1]["price_drift"]["direction"], "up");
    assert_eq!(lines[1]["unit"], "PIECE");

    // 50.00 + 10.00 net, 10% tax, 15 transport
    assert_eq!(decimal(&invoice["totals"]["subtotal"]), Decimal::from(60));
    assert_eq!(decimal(&invoice["totals"]["total_tax"]), Decimal::from(6));
    assert_eq!(decimal(&invoice["totals"]["grand_total"]), Decimal::from(81));
    assert_eq!(invoice["provenance"], "Imported from invoice.csv (CSV)");
    assert_eq!(invoice["branch"], "Main");
}

#[test]
fn test_import_text_summary() {
    let dir = workspace();
    invrec(dir.path())
        .args([
            "import",
            "invoice.csv",
            "-b",
            "Main",
            "-s",
            "ACME",
            "--catalog",
            "catalog.json",
            "--mappings",
            "mappings",
            "-f",
            "text",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Matched: 2/2"))
        .stdout(predicate::str::contains("Beef mince"));
}

#[test]
fn test_manual_match_and_csv_output() {
    let dir = workspace();
    invrec(dir.path())
        .args([
            "import",
            "invoice.csv",
            "--branch",
            "Main",
            "--supplier",
            "ACME",
            "--catalog",
            "catalog.json",
            "--mappings",
            "mappings",
            "--match",
            "1=clear",
            "-f",
            "csv",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("line_no"))
        .stdout(predicate::str::contains("unmatched"));
}

#[test]
fn test_learn_stores_new_mappings() {
    let dir = workspace();
    invrec(dir.path())
        .args([
            "import",
            "invoice.csv",
            "--branch",
            "Main",
            "--supplier",
            "ACME",
            "--catalog",
            "catalog.json",
            "--mappings",
            "mappings",
            "--learn",
            "-o",
            "out.json",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Output written"));

    let table = fs::read_to_string(dir.path().join("mappings").join("ACME.json")).unwrap();
    assert!(table.contains("\"A1\""));
    assert!(table.contains("\"B2\""));
    assert!(dir.path().join("out.json").exists());
}

#[test]
fn test_import_missing_file_fails() {
    let dir = workspace();
    invrec(dir.path())
        .args(["import", "nope.csv", "--branch", "Main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_header_only_sheet_fails() {
    let dir = workspace();
    fs::write(dir.path().join("empty.csv"), "Code;Name;Qty\n").unwrap();
    invrec(dir.path())
        .args(["import", "empty.csv", "--branch", "Main", "--supplier", "ACME"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("header row"));
}

#[test]
fn test_sheet_without_supplier_fails() {
    let dir = workspace();
    invrec(dir.path())
        .args(["import", "invoice.csv", "--branch", "Main", "--catalog", "catalog.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("supplier must be selected"));
}

#[test]
fn test_xml_without_supplier_imports() {
    let dir = workspace();
    fs::write(dir.path().join("invoice.xml"), UBL).unwrap();
    invrec(dir.path())
        .args(["import", "invoice.xml", "--branch", "Main", "--catalog", "catalog.json", "-f", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported from invoice.xml (UBL)"))
        .stdout(predicate::str::contains("1 suggested"));
}

#[test]
fn test_unknown_column_field_is_rejected() {
    let dir = workspace();
    invrec(dir.path())
        .args(["import", "invoice.csv", "--branch", "Main", "--column", "colour=2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown field"));
}

#[test]
fn test_inspect_xml() {
    let dir = workspace();
    fs::write(dir.path().join("invoice.xml"), UBL).unwrap();
    invrec(dir.path())
        .args(["inspect", "invoice.xml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("UBL"))
        .stdout(predicate::str::contains("INV-7"))
        .stdout(predicate::str::contains("Beef mince"));
}

#[test]
fn test_inspect_sheet_json() {
    let dir = workspace();
    let output = invrec(dir.path())
        .args(["inspect", "invoice.csv", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["format"], "CSV");
    assert_eq!(report["column_mapping"]["supplier_code"], 0);
    assert_eq!(report["column_mapping"]["unit_price"], 5);
    assert_eq!(report["lines"].as_array().unwrap().len(), 2);
}

#[test]
fn test_batch_with_summary() {
    let dir = workspace();
    let inbox = dir.path().join("inbox");
    fs::create_dir(&inbox).unwrap();
    fs::write(inbox.join("a.csv"), INVOICE_CSV).unwrap();
    fs::write(inbox.join("b.xml"), UBL).unwrap();
    fs::write(inbox.join("c.xml"), "<Invoice><ID>1</ID>").unwrap();
    fs::write(inbox.join("notes.pdf"), "%PDF-1.4").unwrap();

    invrec(dir.path())
        .args([
            "batch",
            "inbox/*",
            "--branch",
            "Main",
            "--supplier",
            "ACME",
            "--catalog",
            "catalog.json",
            "-o",
            "out",
            "--summary",
            "--continue-on-error",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 successful, 1 failed"));

    assert!(dir.path().join("out").join("a.json").exists());
    assert!(dir.path().join("out").join("b.json").exists());
    let summary = fs::read_to_string(dir.path().join("out").join("summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 4);
    assert!(summary.contains("c.xml,error"));
}

#[test]
fn test_batch_stops_on_error() {
    let dir = workspace();
    fs::write(dir.path().join("bad.xml"), "<Invoice>").unwrap();
    invrec(dir.path())
        .args(["batch", "*.xml", "--branch", "Main"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Import failed"));
}

#[test]
fn test_config_init_and_get() {
    let dir = tempfile::tempdir().unwrap();
    invrec(dir.path())
        .args(["config", "init"])
        .assert()
        .success();
    invrec(dir.path())
        .args(["config", "set", "extraction.default_currency", "TRY"])
        .assert()
        .success();
    invrec(dir.path())
        .args(["config", "get", "extraction.default_currency"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"TRY\""));
}
