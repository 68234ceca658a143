//! Vehicle registration plate extraction.

use super::patterns::{PLATE_CANONICAL, PLATE_TOKEN};
use crate::models::document::Document;

/// Canonical plate: digits and letters only, upper case (`1234BCD`).
pub fn normalize_plate(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_uppercase()
}

/// Whether the text is exactly one plate, separators allowed.
pub fn is_plate(raw: &str) -> bool {
    PLATE_CANONICAL.is_match(&normalize_plate(raw))
}

/// First plate on a line, normalized.
pub fn find_plate(line: &str) -> Option<String> {
    PLATE_TOKEN
        .captures(line)
        .map(|caps| format!("{}{}", &caps[1], caps[2].to_uppercase()))
}

/// First plate anywhere in the document.
pub fn find_plate_in_document(doc: &Document) -> Option<String> {
    doc.iter().find_map(|(_, line)| find_plate(line))
}
