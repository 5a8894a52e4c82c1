//! Field formatting rules for the return XML.
//!
//! Each rule is a standalone function so it can be checked in isolation.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

/// Named entities that may already appear in escaped text
const NAMED_ENTITIES: [&str; 5] = ["amp;", "lt;", "gt;", "quot;", "apos;"];

/// Render an amount in whole dollars.
///
/// Rounds half away from zero and keeps the sign. `None` renders as `"0"`.
pub fn format_amount(amount: Option<Decimal>) -> String {
    let Some(amount) = amount else {
        return "0".to_string();
    };
    let rounded = amount.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    if rounded.is_zero() {
        return "0".to_string();
    }
    rounded.normalize().to_string()
}

/// Normalize an SSN, ITIN or EIN to its 9 digits.
///
/// All punctuation is stripped. Anything that does not leave exactly nine
/// digits yields `None` and the field is omitted.
pub fn format_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (digits.len() == 9).then_some(digits)
}

/// Keep only the digits of a phone number, routing number or similar
pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// `YYYY-MM-DD`, or an empty string for an undefined date
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Escape text content for XML.
///
/// `&` is handled first. An ampersand that already opens a well-formed
/// entity or character reference is kept as is, so escaping is idempotent.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (idx, ch) in text.char_indices() {
        match ch {
            '&' if starts_with_reference(&text[idx + 1..]) => out.push('&'),
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

fn starts_with_reference(rest: &str) -> bool {
    if NAMED_ENTITIES.iter().any(|entity| rest.starts_with(entity)) {
        return true;
    }
    let Some(numeric) = rest.strip_prefix('#') else {
        return false;
    };
    let (body, is_hex) = match numeric.strip_prefix('x') {
        Some(hex) => (hex, true),
        None => (numeric, false),
    };
    let Some(end) = body.find(';') else {
        return false;
    };
    let digits = &body[..end];
    !digits.is_empty()
        && digits.chars().all(|c| {
            if is_hex {
                c.is_ascii_hexdigit()
            } else {
                c.is_ascii_digit()
            }
        })
}

/// Collapse runs of whitespace and trim, as MeF text types require
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First four alphanumeric characters of a last or business name, uppercased
pub fn name_control(name: &str) -> String {
    name.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .take(4)
        .collect()
}
