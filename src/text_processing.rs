//! # Text Processing Module
//!
//! This module turns free-form admin input into structured property data.
//!
//! ## Features
//!
//! - Lenient numeric input parsing (comma decimals, digit grouping with spaces)
//! - Labelled block parsing: one message such as `Город: ...\nАдрес: ...` carrying
//!   every field of a property at once
//! - Kind hint detection from the first line of the first wizard message
//! - Recognition of the "done" token that closes the photo step

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::{debug, trace};

use crate::property::{ParsedPropertyBlock, PropertyKind, DESCRIPTION_PLACEHOLDER};

// Accepted labels per field, in priority order
const CITY_LABELS: &[&str] = &["город", "city"];
const ADDRESS_LABELS: &[&str] = &["адрес", "address"];
const AREA_LABELS: &[&str] = &["метраж", "площадь", "площадь м2", "метраж м2", "area", "area m2"];
const TOTAL_LABELS: &[&str] = &[
    "цена",
    "итог",
    "итог мес",
    "итог в месяц",
    "price",
    "total",
    "monthly total",
];
const RATE_LABELS: &[&str] = &[
    "цена м2",
    "цена за м2",
    "ставка",
    "ставка м2",
    "price m2",
    "rate",
    "rent rate",
];
const SERVICE_LABELS: &[&str] = &["сервис чардж", "service charge", "сервис", "service"];
const DESCRIPTION_LABELS: &[&str] = &[
    "описание",
    "описание помещения",
    "комментарии",
    "комментарий",
    "description",
    "comment",
    "comments",
];

// Words that mark a warehouse when they open the first line
const WAREHOUSE_KEYWORDS: &[&str] = &["склад", "warehouse"];

// Words that close the photo step
const DONE_TOKENS: &[&str] = &["готово", "done"];

lazy_static! {
    // A digit glued to a letter (the `2` of `м2`) never starts a number;
    // whitespace between digit groups and a comma decimal are allowed inside
    static ref NUMBER_REGEX: Regex = Regex::new(r"(?:^|[^\p{L}\d])([-+]?\d+(?:\s+\d+)*(?:[.,]\d+)?)")
        .expect("Number pattern should be valid");
    static ref KIND_PREFIX_REGEX: Regex =
        Regex::new(r"(?i)^(?:склад|warehouse)\b[:\s-]*").expect("Kind prefix pattern should be valid");
}

/// Parse a number typed in answer to a numeric prompt
///
/// Commas are treated as decimal separators and all whitespace is dropped, so
/// `"1 234,5"` reads as `1234.5`. Returns `None` when the input is not a finite
/// number. No range checks are applied.
///
/// # Examples
///
/// ```rust
/// use property_bot::text_processing::parse_number;
///
/// assert_eq!(parse_number("1 234,5"), Some(1234.5));
/// assert_eq!(parse_number("-3"), Some(-3.0));
/// assert_eq!(parse_number("сто"), None);
/// ```
pub fn parse_number(input: &str) -> Option<f64> {
    let normalized = compact_decimal(input);
    normalized.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Extract the first decimal number contained in a labelled value
///
/// Unlike [`parse_number`] the value may carry units or other words around the
/// number (`"2000 $ в месяц"`, `"м2 100"`). Digit groups split by spaces are
/// joined, so `"5 000"` reads as `5000`.
pub fn extract_number(input: &str) -> Option<f64> {
    NUMBER_REGEX
        .captures(input)
        .and_then(|caps| caps.get(1))
        .and_then(|m| compact_decimal(m.as_str()).parse::<f64>().ok())
        .filter(|value| value.is_finite())
}

fn compact_decimal(input: &str) -> String {
    input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect()
}

/// Normalize a block label for synonym lookup
///
/// Lowercases, collapses inner whitespace, folds `ё` into `е` and the
/// superscript two into a plain `2` (`"Площадь м²"` becomes `"площадь м2"`).
pub fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('ё', "е")
        .replace('²', "2")
}

fn is_description_label(label: &str) -> bool {
    label.contains("описание")
        || label.contains("description")
        || label.starts_with("комментари")
        || label.starts_with("comment")
}

// First non-empty value among the accepted labels
fn pick_value<'a>(values: &'a HashMap<String, String>, labels: &[&str]) -> Option<&'a str> {
    labels.iter().find_map(|label| {
        values
            .get(*label)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    })
}

/// Parse a whole property from one labelled block of text
///
/// Every line shaped like `label: value` is collected; duplicate labels keep the
/// last value. City, address, area, total price, rate and service charge are
/// required and the four numeric ones must contain a number; otherwise the block
/// is not recognised and `None` is returned. Lines following the description
/// line are appended to the description.
///
/// # Examples
///
/// ```rust
/// use property_bot::text_processing::parse_property_block;
///
/// let block = "Город: Варшава\nАдрес: ул. Тестовая 1\nМетраж: 100\nЦена: 2000\nЦена м2: 15\nСервис: 5";
/// let parsed = parse_property_block(block).unwrap();
/// assert_eq!(parsed.city, "Варшава");
/// assert_eq!(parsed.rent_rate, 15.0);
/// assert_eq!(parsed.description, "Без описания");
///
/// assert!(parse_property_block("Варшава").is_none());
/// ```
pub fn parse_property_block(text: &str) -> Option<ParsedPropertyBlock> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut values: HashMap<String, String> = HashMap::new();
    let mut description_line: Option<usize> = None;

    for (index, line) in lines.iter().enumerate() {
        let Some((raw_label, raw_value)) = line.split_once(':') else {
            continue;
        };
        if raw_label.is_empty() {
            continue;
        }
        let label = normalize_label(raw_label);
        trace!(line = index, label = %label, "Block line recognised");
        if description_line.is_none() && is_description_label(&label) {
            description_line = Some(index);
        }
        values.insert(label, raw_value.trim().to_string());
    }

    let city = pick_value(&values, CITY_LABELS);
    let address = pick_value(&values, ADDRESS_LABELS);
    let area_raw = pick_value(&values, AREA_LABELS);
    let total_raw = pick_value(&values, TOTAL_LABELS);
    let rate_raw = pick_value(&values, RATE_LABELS);
    let service_raw = pick_value(&values, SERVICE_LABELS);

    let (Some(city), Some(address), Some(area_raw), Some(total_raw), Some(rate_raw), Some(service_raw)) =
        (city, address, area_raw, total_raw, rate_raw, service_raw)
    else {
        debug!(
            has_city = city.is_some(),
            has_address = address.is_some(),
            has_area = area_raw.is_some(),
            has_total = total_raw.is_some(),
            has_rate = rate_raw.is_some(),
            has_service = service_raw.is_some(),
            "Block not recognised: required fields missing"
        );
        return None;
    };

    let numbers = (
        extract_number(area_raw),
        extract_number(total_raw),
        extract_number(rate_raw),
        extract_number(service_raw),
    );
    let (Some(area_m2), Some(monthly_total), Some(rent_rate), Some(service_rate)) = numbers else {
        debug!(
            area = area_raw,
            total = total_raw,
            rate = rate_raw,
            service = service_raw,
            "Block not recognised: numeric fields invalid"
        );
        return None;
    };

    let mut description = pick_value(&values, DESCRIPTION_LABELS).unwrap_or_default().to_string();
    if let Some(index) = description_line {
        let tail = lines[index + 1..].join("\n");
        let tail = tail.trim();
        if !tail.is_empty() {
            if description.is_empty() {
                description = tail.to_string();
            } else {
                description = format!("{description}\n{tail}");
            }
        }
    }
    if description.is_empty() {
        description = DESCRIPTION_PLACEHOLDER.to_string();
    }

    Some(ParsedPropertyBlock {
        city: city.to_string(),
        address: address.to_string(),
        area_m2,
        monthly_total,
        rent_rate,
        service_rate,
        description,
    })
}

/// Classify a message as warehouse or premise from its first non-empty line
pub fn detect_kind_hint(text: &str) -> PropertyKind {
    let first_line = text
        .lines()
        .map(|line| line.trim().to_lowercase())
        .find(|line| !line.is_empty())
        .unwrap_or_default();

    if WAREHOUSE_KEYWORDS
        .iter()
        .any(|keyword| first_line.starts_with(*keyword))
    {
        PropertyKind::Warehouse
    } else {
        PropertyKind::Premise
    }
}

/// Remove a leading warehouse keyword (`"Склад: Варшава"` -> `"Варшава"`)
pub fn strip_kind_prefix(text: &str) -> String {
    KIND_PREFIX_REGEX.replace(text.trim(), "").trim().to_string()
}

/// Whether the message is the token that finishes the photo step
pub fn is_done_token(text: &str) -> bool {
    let lowered = text.trim().to_lowercase();
    DONE_TOKENS.iter().any(|token| lowered == *token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_label() {
        assert_eq!(normalize_label("  Цена   за М² "), "цена за м2");
        assert_eq!(normalize_label("Итог в мЁсяц"), "итог в месяц");
        assert_eq!(normalize_label("Service\tCharge"), "service charge");
    }

    #[test]
    fn test_extract_number_with_units() {
        assert_eq!(extract_number("2000 $ в месяц"), Some(2000.0));
        assert_eq!(extract_number("100 м2"), Some(100.0));
        assert_eq!(extract_number("~ 12,75 usd"), Some(12.75));
        assert_eq!(extract_number("по запросу"), None);
    }

    #[test]
    fn test_extract_number_unit_before_value() {
        assert_eq!(extract_number("м2 100"), Some(100.0));
        assert_eq!(extract_number("м² 250,5"), Some(250.5));
        assert_eq!(extract_number("$ 5 000"), Some(5000.0));
        assert_eq!(extract_number("usd2 300"), Some(300.0));
        assert_eq!(extract_number("м2"), None);
    }

    #[test]
    fn test_parse_number_rejects_non_finite() {
        assert_eq!(parse_number("inf"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("0"), Some(0.0));
    }

    #[test]
    fn test_description_label_variants() {
        assert!(is_description_label("описание помещения"));
        assert!(is_description_label("комментарий"));
        assert!(is_description_label("description"));
        assert!(!is_description_label("город"));
    }

    #[test]
    fn test_done_token() {
        assert!(is_done_token("Готово"));
        assert!(is_done_token("  ГОТОВО "));
        assert!(is_done_token("done"));
        assert!(!is_done_token("готово!"));
        assert!(!is_done_token("почти готово"));
    }
}
