//! Amount normalization and location for locale-formatted invoices.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::ExtractionError;

use super::patterns::{AMOUNT_PATTERN, CURRENCY_WORD};
use super::{ExtractionMatch, FieldExtractor};

/// Characters stripped before separator disambiguation.
const DECORATION: &[char] = &[
    '€', '$', '£', '¥', '(', ')', '[', ']', '{', '}', '%', ':', ';', '"', '\'', '*', '=', '#',
];

/// Convert a locale-formatted numeric string into an exact decimal.
///
/// Separator rules:
/// - `.` and `,` both present, `,` last: `.` groups thousands, `,` is decimal.
/// - `.` and `,` both present, `.` last: `,` groups thousands.
/// - only `,`: decimal separator.
/// - only `.` or neither: already canonical.
pub fn normalize_amount(raw: &str) -> Result<Decimal, ExtractionError> {
    let stripped = strip_decoration(raw);
    if !stripped.chars().any(|c| c.is_ascii_digit()) {
        return Err(ExtractionError::NotNumeric(raw.to_string()));
    }

    let canonical = canonical_separators(&stripped);
    Decimal::from_str(&canonical).map_err(|_| ExtractionError::NotNumeric(raw.to_string()))
}

fn strip_decoration(raw: &str) -> String {
    let without_words = CURRENCY_WORD.replace_all(raw, "");
    let cleaned: String = without_words
        .chars()
        .filter(|c| !c.is_whitespace() && !DECORATION.contains(c))
        .collect();

    cleaned.trim_end_matches(['.', ',']).to_string()
}

fn canonical_separators(s: &str) -> String {
    match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => s.replace(',', ""),
        (Some(_), None) => s.replace(',', "."),
        _ => s.to_string(),
    }
}

/// Amount extractor over a single line.
pub struct AmountExtractor;

impl AmountExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<Decimal>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        AMOUNT_PATTERN
            .find_iter(text)
            // rates, not amounts
            .filter(|m| !text[m.end()..].trim_start().starts_with('%'))
            .filter_map(|m| {
                normalize_amount(m.as_str())
                    .ok()
                    .map(|amount| {
                        ExtractionMatch::new(amount, m.as_str()).with_position(m.start(), m.end())
                    })
            })
            .collect()
    }
}

/// First monetary-shaped value on a line.
pub fn locate_amount(line: &str) -> Option<Decimal> {
    AmountExtractor::new().extract(line).map(|m| m.value)
}

/// Every monetary-shaped value on a line, left to right.
pub fn locate_amounts(line: &str) -> Vec<Decimal> {
    AmountExtractor::new()
        .extract_all(line)
        .into_iter()
        .map(|m| m.value)
        .collect()
}

/// Format amount in Spanish style (1.234,56).
pub fn format_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount);
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s.as_str()),
    };

    let Some((integer_part, decimal_part)) = digits.split_once('.') else {
        return s;
    };

    // Add thousand separators
    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    format!("{}{},{}", sign, formatted, decimal_part)
}
