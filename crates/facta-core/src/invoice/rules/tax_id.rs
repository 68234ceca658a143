//! Spanish tax identifier (NIF / CIF / NIE) extraction and validation.

use super::patterns::{TAX_ID_CANONICAL, TAX_ID_TOKEN};
use super::{ExtractionMatch, FieldExtractor};
use crate::models::document::Document;

const DNI_LETTERS: &[u8] = b"TRWAGMYFPDXBNJZSQVHLCKE";
const CIF_CONTROL_LETTERS: &[u8] = b"JABCDEFGHI";

/// Tax identifier extractor.
pub struct TaxIdExtractor {
    validate: bool,
    exclude: Option<String>,
}

impl TaxIdExtractor {
    /// Create a new extractor that matches on shape only.
    pub fn new() -> Self {
        Self {
            validate: false,
            exclude: None,
        }
    }

    /// Set whether to validate control characters.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Never report this identifier (the receiving party's own).
    pub fn excluding(mut self, tax_id: Option<&str>) -> Self {
        self.exclude = tax_id.map(normalize_tax_id).filter(|id| !id.is_empty());
        self
    }

    /// Whether a candidate equals the excluded identifier.
    pub fn is_excluded(&self, candidate: &str) -> bool {
        self.exclude
            .as_deref()
            .is_some_and(|excluded| normalize_tax_id(candidate) == excluded)
    }

    /// First identifier across all document lines.
    pub fn extract_from_document(&self, doc: &Document) -> Option<String> {
        doc.iter()
            .find_map(|(_, line)| self.extract(line))
            .map(|m| m.value)
    }

    /// Every identifier in the document, in reading order, deduplicated.
    pub fn extract_all_from_document(&self, doc: &Document) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for (_, line) in doc.iter() {
            for m in self.extract_all(line) {
                if !found.contains(&m.value) {
                    found.push(m.value);
                }
            }
        }
        found
    }
}

impl Default for TaxIdExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for TaxIdExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let upper = text.to_uppercase();

        TAX_ID_TOKEN
            .find_iter(&upper)
            .filter_map(|m| {
                let id = normalize_tax_id(m.as_str());
                if self.is_excluded(&id) || (self.validate && !validate_tax_id(&id)) {
                    return None;
                }
                Some(ExtractionMatch::new(id, m.as_str()).with_position(m.start(), m.end()))
            })
            .collect()
    }
}

/// Canonical form: upper case, separators and `ES` prefix removed.
pub fn normalize_tax_id(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '-' | '.' | ' ' | '/'))
        .collect::<String>()
        .to_uppercase();

    match cleaned.strip_prefix("ES") {
        Some(rest) if rest.len() == 9 => rest.to_string(),
        _ => cleaned,
    }
}

/// Whether two identifiers denote the same party.
pub fn same_tax_id(a: &str, b: &str) -> bool {
    let a = normalize_tax_id(a);
    !a.is_empty() && a == normalize_tax_id(b)
}

/// Shape check only (no control character).
pub fn is_tax_id(raw: &str) -> bool {
    TAX_ID_CANONICAL.is_match(&normalize_tax_id(raw))
}

/// Validate the control character of a NIF, NIE or CIF.
pub fn validate_tax_id(raw: &str) -> bool {
    let id = normalize_tax_id(raw);
    if !TAX_ID_CANONICAL.is_match(&id) {
        return false;
    }

    let bytes = id.as_bytes();
    match bytes[0] {
        b'0'..=b'9' => dni_letter_matches(&id[..8], bytes[8]),
        b'X' | b'Y' | b'Z' => {
            let prefix = (b'0' + bytes[0] - b'X') as char;
            let digits = format!("{}{}", prefix, &id[1..8]);
            dni_letter_matches(&digits, bytes[8])
        }
        _ => cif_control_matches(&id),
    }
}

fn dni_letter_matches(digits: &str, letter: u8) -> bool {
    digits
        .parse::<u32>()
        .map(|n| DNI_LETTERS[(n % 23) as usize] == letter)
        .unwrap_or(false)
}

fn cif_control_matches(id: &str) -> bool {
    let bytes = id.as_bytes();
    let digits: Vec<u32> = id[1..8].chars().filter_map(|c| c.to_digit(10)).collect();
    if digits.len() != 7 {
        return false;
    }

    let sum: u32 = digits
        .iter()
        .enumerate()
        .map(|(i, d)| {
            if i % 2 == 0 {
                let doubled = d * 2;
                doubled / 10 + doubled % 10
            } else {
                *d
            }
        })
        .sum();

    let control = (10 - sum % 10) % 10;
    let control_digit = b'0' + control as u8;
    let control_letter = CIF_CONTROL_LETTERS[control as usize];
    let actual = bytes[8];

    match bytes[0] {
        b'A' | b'B' | b'E' | b'H' => actual == control_digit,
        b'N' | b'P' | b'Q' | b'R' | b'S' | b'W' => actual == control_letter,
        _ => actual == control_digit || actual == control_letter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECEIVER: &str = "B12345674";

    #[test]
    fn test_normalize_tax_id() {
        assert_eq!(normalize_tax_id("es-b12345674"), "B12345674");
        assert_eq!(normalize_tax_id("B-12.345.674"), "B12345674");
        assert_eq!(normalize_tax_id("12345678-Z"), "12345678Z");
    }

    #[test]
    fn test_shape() {
        assert!(is_tax_id("B12345674"));
        assert!(is_tax_id("12345678Z"));
        assert!(is_tax_id("X1234567L"));
        assert!(!is_tax_id("I12345674"));
        assert!(!is_tax_id("1234567Z"));
    }

    #[test]
    fn test_validate_tax_id() {
        assert!(validate_tax_id("12345678Z"));
        assert!(!validate_tax_id("12345678A"));
        assert!(validate_tax_id("B12345674"));
        assert!(!validate_tax_id("B12345675"));
        assert!(validate_tax_id("X0000000T"));
    }

    #[test]
    fn test_extract_from_line() {
        let extractor = TaxIdExtractor::new();
        let found = extractor.extract("CIF: ES-B12345674  Tel. 900 000 000").unwrap();
        assert_eq!(found.value, "B12345674");
        assert!(extractor.extract("Tel. 900 000 000").is_none());
    }

    #[test]
    fn test_excluded_receiver_is_never_reported() {
        let extractor = TaxIdExtractor::new().excluding(Some(RECEIVER));
        assert!(extractor.extract("NIF cliente: b-12345674").is_none());

        let doc = Document::new(["CIF B12345674", "NIF 12345678Z"]);
        assert_eq!(extractor.extract_from_document(&doc), Some("12345678Z".to_string()));
    }

    #[test]
    fn test_extract_all_deduplicates() {
        let doc = Document::new(["B12345674", "12345678Z B12345674"]);
        let ids = TaxIdExtractor::new().extract_all_from_document(&doc);
        assert_eq!(ids, vec!["B12345674".to_string(), "12345678Z".to_string()]);
    }

    #[test]
    fn test_validation_filters_bad_control() {
        let extractor = TaxIdExtractor::new().with_validation(true);
        assert!(extractor.extract("NIF 12345678A").is_none());
        assert!(extractor.extract("NIF 12345678Z").is_some());
    }

    #[test]
    fn test_same_tax_id() {
        assert!(same_tax_id("ESB12345674", "b-12345674"));
        assert!(!same_tax_id("", ""));
    }
}
