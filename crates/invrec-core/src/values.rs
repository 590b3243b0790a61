//! Field normalizers shared by the spreadsheet and XML extractors.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

/// Unit code used when a line carries no unit.
pub const DEFAULT_UNIT: &str = "PIECE";

/// Largest line total, tax amount or expense accepted (10^18).
///
/// Sums of amounts within this bound cannot overflow a [`Decimal`].
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA764_0000, 0x0DE0_B6B3, 0, false, 0);

lazy_static! {
    // 2024-01-15, 2024/01/15
    static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})$"
    ).unwrap();

    // 15.01.2024, 15/01/2024, 15-01-24
    static ref DATE_DMY: Regex = Regex::new(
        r"^(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})\.?$"
    ).unwrap();

    // 20240115 (UN/CEFACT format 102)
    static ref DATE_COMPACT: Regex = Regex::new(
        r"^(\d{4})(\d{2})(\d{2})$"
    ).unwrap();

    static ref UNIT_ALIASES: HashMap<&'static str, &'static str> = {
        let table: &[(&str, &[&str])] = &[
            ("KG", &["KG", "KGM", "KGS", "KILO", "KILOGRAM", "KILOGRAMM"]),
            ("G", &["G", "GR", "GRM", "GRAM", "GRAMM"]),
            ("L", &["L", "LT", "LTR", "LITER", "LITRE", "LITRE"]),
            ("ML", &["ML", "MLT"]),
            ("M", &["M", "MTR", "METER", "METRE"]),
            ("M2", &["M2", "MTK", "M²"]),
            ("M3", &["M3", "MTQ", "M³"]),
            ("H", &["H", "HUR", "HOUR", "STD", "SAAT", "URA"]),
            ("BOX", &["BOX", "BX", "KOLI", "KUTU", "KARTON", "CT"]),
            ("PACK", &["PACK", "PK", "PAK", "PAKET", "PA"]),
            (
                DEFAULT_UNIT,
                &[
                    "PIECE", "PCS", "PC", "PCE", "EA", "EACH", "H87", "C62", "ADET", "AD",
                    "KOS", "KOM", "STK", "ST", "STÜCK", "STUECK", "SZT",
                ],
            ),
        ];

        let mut map = HashMap::new();
        for (code, aliases) in table {
            for alias in *aliases {
                map.insert(*alias, *code);
            }
        }
        map
    };
}

/// Parse a decimal written with either dot or comma as decimal separator.
///
/// Accepts thousand separators (`1.234,56`, `1,234.56`, `1 234,56`),
/// currency symbols and a trailing percent sign.
pub fn parse_decimal(s: &str) -> Option<Decimal> {
    let negative = s.trim_start().starts_with('-');
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let commas = cleaned.matches(',').count();
    let dots = cleaned.matches('.').count();

    let normalized = match (commas, dots) {
        (0, 0) => cleaned,
        (0, 1) => cleaned,
        (0, _) => cleaned.replace('.', ""),
        (1, 0) => cleaned.replace(',', "."),
        (_, 0) => cleaned.replace(',', ""),
        _ => {
            // Whichever separator comes last is the decimal one
            match (cleaned.rfind(','), cleaned.rfind('.')) {
                (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
                _ => cleaned.replace(',', ""),
            }
        }
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

/// Parse a calendar date in any of the layouts seen on invoices.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // Drop a time component ("2024-01-15T10:00:00", "2024-01-15 10:00")
    let s = s.split(['T', ' ']).next().unwrap_or(s);

    if let Some(caps) = DATE_YMD.captures(s).or_else(|| DATE_COMPACT.captures(s)) {
        let year: i32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let day: u32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(caps) = DATE_DMY.captures(s) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        let year = parse_year(&caps[3]);
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    None
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() == 2 { 2000 + year } else { year }
}

/// Normalize a unit-of-measure code through the unit lookup table.
///
/// Unknown codes are kept (trimmed, upper-cased); empty input yields
/// [`DEFAULT_UNIT`].
pub fn normalize_unit(s: &str) -> String {
    let key = s.trim().trim_end_matches('.').to_uppercase();
    if key.is_empty() {
        return DEFAULT_UNIT.to_string();
    }
    UNIT_ALIASES
        .get(key.as_str())
        .map(|code| code.to_string())
        .unwrap_or(key)
}

/// Round half away from zero to the given number of decimal places.
pub fn round_to(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Fold case and the diacritics of the region's languages for keyword matching.
pub fn fold_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'ç' | 'Ç' | 'č' | 'Č' | 'ć' | 'Ć' => out.push('c'),
            'ğ' | 'Ğ' => out.push('g'),
            'ı' | 'İ' | 'I' => out.push('i'),
            'ö' | 'Ö' => out.push('o'),
            'ş' | 'Ş' | 'š' | 'Š' => out.push('s'),
            'ü' | 'Ü' => out.push('u'),
            'ž' | 'Ž' => out.push('z'),
            'đ' | 'Đ' => out.push('d'),
            'ä' | 'Ä' => out.push('a'),
            'ß' => out.push_str("ss"),
            _ => out.extend(c.to_lowercase()),
        }
    }
    out
}
