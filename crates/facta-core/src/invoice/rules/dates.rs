//! Date extraction for Spanish invoices.

use chrono::NaiveDate;

use super::patterns::{DATE_SPANISH_LONG, DATE_TOKEN};
use super::{ExtractionMatch, FieldExtractor};

/// Date field extractor.
///
/// Matches carry the text as written on the document; the parsed date only
/// confirms it is a real calendar day.
pub struct DateExtractor;

impl DateExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DateExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for DateExtractor {
    type Output = ExtractionMatch<NaiveDate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let mut results = Vec::new();

        // DD/MM/YYYY or DD-MM-YY or DD.MM.YYYY
        for caps in DATE_TOKEN.captures_iter(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month: u32 = caps[2].parse().unwrap_or(0);
            let year = parse_year(&caps[3]);

            if let (Some(date), Some(full_match)) =
                (NaiveDate::from_ymd_opt(year, month, day), caps.get(0))
            {
                results.push(
                    ExtractionMatch::new(date, full_match.as_str())
                        .with_position(full_match.start(), full_match.end()),
                );
            }
        }

        // Spanish long format: "15 de enero de 2024"
        for caps in DATE_SPANISH_LONG.captures_iter(text) {
            let day: u32 = caps[1].parse().unwrap_or(0);
            let month = spanish_month_to_number(&caps[2]);
            let year: i32 = caps[3].parse().unwrap_or(0);

            if let (Some(date), Some(full_match)) =
                (NaiveDate::from_ymd_opt(year, month, day), caps.get(0))
            {
                results.push(
                    ExtractionMatch::new(date, full_match.as_str())
                        .with_position(full_match.start(), full_match.end()),
                );
            }
        }

        results.sort_by_key(|m| m.position.map(|(start, _)| start));
        results
    }
}

/// Parse a date written in any supported format.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    DateExtractor::new().extract(text).map(|m| m.value)
}

/// Whether the text contains a real calendar date.
pub fn is_date(text: &str) -> bool {
    parse_date(text).is_some()
}

/// First date on a line, as written.
pub fn find_date(text: &str) -> Option<String> {
    DateExtractor::new().extract(text).map(|m| m.source)
}

fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if s.len() == 2 {
        2000 + year
    } else {
        year
    }
}

fn spanish_month_to_number(month: &str) -> u32 {
    match month.to_lowercase().as_str() {
        "enero" => 1,
        "febrero" => 2,
        "marzo" => 3,
        "abril" => 4,
        "mayo" => 5,
        "junio" => 6,
        "julio" => 7,
        "agosto" => 8,
        "septiembre" | "setiembre" => 9,
        "octubre" => 10,
        "noviembre" => 11,
        "diciembre" => 12,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 1);
        assert_eq!(parse_date("01/02/2024"), expected);
        assert_eq!(parse_date("1-2-24"), expected);
        assert_eq!(parse_date("Fecha: 01.02.2024"), expected);
    }

    #[test]
    fn test_parse_long_date() {
        assert_eq!(
            parse_date("Madrid, 15 de enero de 2024"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn test_rejects_impossible_dates() {
        assert!(!is_date("31/02/2024"));
        assert!(!is_date("99/99/9999"));
        assert!(!is_date("sin fecha"));
    }

    #[test]
    fn test_find_date_keeps_source_text() {
        assert_eq!(find_date("Fecha factura 01/02/2024 Vto 01/03/2024"), Some("01/02/2024".to_string()));
        assert_eq!(find_date("31/02/2024 y 15 de marzo de 2024"), Some("15 de marzo de 2024".to_string()));
    }
}
