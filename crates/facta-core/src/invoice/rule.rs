//! Declarative extraction rules and their evaluation against a document.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::trace;

use crate::error::ExtractionError;
use crate::models::document::{tokenize, Document};

use super::rules::anchor::find_anchor;

/// Which whitespace-delimited token(s) of the target line to return.
///
/// Indices are 1-based. A range `a-b` selects tokens `a..=b` (0-based
/// `[a-1, b)`) joined with single spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "SegmentRepr", into = "SegmentRepr")]
pub enum Segment {
    Token(usize),
    Range { start: usize, end: usize },
    /// Kept as written; never matches.
    Invalid(String),
}

impl Segment {
    /// Pick the segment out of a tokenized line.
    pub fn select(&self, tokens: &[&str]) -> Result<String, ExtractionError> {
        match self {
            Segment::Token(k) => k
                .checked_sub(1)
                .and_then(|i| tokens.get(i))
                .map(|t| t.to_string())
                .ok_or(ExtractionError::IndexOutOfRange {
                    index: *k as i64,
                    len: tokens.len(),
                }),
            Segment::Range { start, end } => {
                if *start == 0 || start > end {
                    return Err(ExtractionError::UnsupportedRule(self.to_string()));
                }
                if *end > tokens.len() {
                    return Err(ExtractionError::IndexOutOfRange {
                        index: *end as i64,
                        len: tokens.len(),
                    });
                }
                Ok(tokens[start - 1..*end].join(" "))
            }
            Segment::Invalid(raw) => Err(ExtractionError::UnsupportedRule(raw.clone())),
        }
    }
}

impl FromStr for Segment {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.split_once('-') {
            Some((a, b)) => match (a.trim().parse(), b.trim().parse()) {
                (Ok(start), Ok(end)) => Some(Segment::Range { start, end }),
                _ => None,
            },
            None => s.parse().ok().filter(|k| *k > 0).map(Segment::Token),
        };
        Ok(parsed.unwrap_or_else(|| Segment::Invalid(s.to_string())))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Token(k) => write!(f, "{}", k),
            Segment::Range { start, end } => write!(f, "{}-{}", start, end),
            Segment::Invalid(raw) => f.write_str(raw),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SegmentRepr {
    Index(i64),
    Text(String),
}

impl From<SegmentRepr> for Segment {
    fn from(repr: SegmentRepr) -> Self {
        match repr {
            SegmentRepr::Index(k) if k > 0 => Segment::Token(k as usize),
            SegmentRepr::Index(k) => Segment::Invalid(k.to_string()),
            SegmentRepr::Text(s) => s.parse().unwrap_or_else(|never| match never {}),
        }
    }
}

impl From<Segment> for SegmentRepr {
    fn from(segment: Segment) -> Self {
        match segment {
            Segment::Token(k) => SegmentRepr::Index(k as i64),
            other => SegmentRepr::Text(other.to_string()),
        }
    }
}

/// One extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExtractionRule {
    /// Constant value, independent of the document.
    #[serde(rename = "FIXED_VALUE")]
    FixedValue { value: String },

    /// Absolute 1-based line.
    #[serde(rename = "FIXED")]
    FixedLine { line: i64, segment: Segment },

    /// Line at `offset` from the first line containing the reference text.
    #[serde(rename = "VARIABLE")]
    VariableLine {
        #[serde(rename = "ref_text", deserialize_with = "one_or_many")]
        anchor_text: Vec<String>,
        #[serde(default)]
        offset: i64,
        segment: Segment,
    },

    /// Unknown rule type; loads but never matches.
    #[serde(other)]
    Unsupported,
}

impl ExtractionRule {
    pub fn fixed_value(value: impl Into<String>) -> Self {
        ExtractionRule::FixedValue {
            value: value.into(),
        }
    }

    pub fn fixed_line(line: i64, segment: Segment) -> Self {
        ExtractionRule::FixedLine { line, segment }
    }

    pub fn variable(anchor: impl Into<String>, offset: i64, segment: Segment) -> Self {
        ExtractionRule::VariableLine {
            anchor_text: vec![anchor.into()],
            offset,
            segment,
        }
    }

    /// Evaluate the rule; every failure is a silent `None`.
    pub fn evaluate(&self, doc: &Document) -> Option<String> {
        match self.resolve(doc) {
            Ok(value) => Some(value),
            Err(e) => {
                trace!("rule {:?} did not match: {}", self, e);
                None
            }
        }
    }

    /// Evaluate the rule, reporting why it did not match.
    pub fn resolve(&self, doc: &Document) -> Result<String, ExtractionError> {
        let (index, segment) = match self {
            ExtractionRule::FixedValue { value } => return Ok(value.clone()),
            ExtractionRule::FixedLine { line, segment } => (
                line.checked_sub(1).ok_or(ExtractionError::IndexOutOfRange {
                    index: *line,
                    len: doc.len(),
                })?,
                segment,
            ),
            ExtractionRule::VariableLine {
                anchor_text,
                offset,
                segment,
            } => {
                let anchor = find_anchor(doc, anchor_text)
                    .ok_or_else(|| ExtractionError::AnchorNotFound(anchor_text.join(" | ")))?;
                let index = (anchor as i64).checked_add(*offset).ok_or(
                    ExtractionError::IndexOutOfRange {
                        index: *offset,
                        len: doc.len(),
                    },
                )?;
                (index, segment)
            }
            ExtractionRule::Unsupported => {
                return Err(ExtractionError::UnsupportedRule("unknown rule type".to_string()));
            }
        };

        let line = doc.line_at(index).ok_or(ExtractionError::IndexOutOfRange {
            index,
            len: doc.len(),
        })?;

        segment.select(&tokenize(line))
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn range(start: usize, end: usize) -> Segment {
        Segment::Range { start, end }
    }

    #[test]
    fn test_range_segment_is_inclusive() {
        let tokens = ["A", "B", "C", "D", "E"];
        assert_eq!(range(2, 4).select(&tokens).unwrap(), "B C D");
        assert_eq!(range(1, 5).select(&tokens).unwrap(), "A B C D E");
        assert_eq!(range(3, 3).select(&tokens).unwrap(), "C");
    }

    #[test]
    fn test_invalid_ranges_do_not_match() {
        let tokens = ["A", "B"];
        assert!(range(0, 1).select(&tokens).is_err());
        assert!(range(2, 1).select(&tokens).is_err());
        assert!(matches!(
            range(1, 3).select(&tokens),
            Err(ExtractionError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_segment_parsing() {
        assert_eq!("2".parse::<Segment>().unwrap(), Segment::Token(2));
        assert_eq!(" 2 - 4 ".parse::<Segment>().unwrap(), range(2, 4));
        assert_eq!("0".parse::<Segment>().unwrap(), Segment::Invalid("0".to_string()));
        assert_eq!("a-b".parse::<Segment>().unwrap(), Segment::Invalid("a-b".to_string()));
    }

    #[test]
    fn test_fixed_value_ignores_document() {
        let rule = ExtractionRule::fixed_value("FACTURA");
        assert_eq!(rule.evaluate(&Document::default()), Some("FACTURA".to_string()));
    }

    #[test]
    fn test_fixed_line_bounds() {
        let doc = Document::new(["FACTURA", "Nº 00123"]);
        assert_eq!(
            ExtractionRule::fixed_line(2, Segment::Token(2)).evaluate(&doc),
            Some("00123".to_string())
        );
        assert_eq!(ExtractionRule::fixed_line(0, Segment::Token(1)).evaluate(&doc), None);
        assert_eq!(ExtractionRule::fixed_line(3, Segment::Token(1)).evaluate(&doc), None);
        assert_eq!(ExtractionRule::fixed_line(2, Segment::Token(3)).evaluate(&doc), None);
    }

    #[test]
    fn test_anchor_offset_resolution() {
        let doc = Document::new([
            "a", "b", "c", "d", "e", "Fecha", "g", "01/02/2024 Madrid", "   ",
        ]);
        let rule = ExtractionRule::variable("Fecha", 2, Segment::Token(1));
        assert_eq!(rule.evaluate(&doc), Some("01/02/2024".to_string()));

        // target line with no tokens
        let blank = ExtractionRule::variable("Fecha", 3, Segment::Token(1));
        assert_eq!(blank.evaluate(&doc), None);
        assert!(matches!(
            blank.resolve(&doc),
            Err(ExtractionError::IndexOutOfRange { index: 1, len: 0 })
        ));
    }

    #[test]
    fn test_negative_offset_reads_above_anchor() {
        let doc = Document::new(["TALLERES GARCIA S.L.", "CIF B12345674"]);
        let rule = ExtractionRule::variable("cif", -1, range(1, 3));
        assert_eq!(rule.evaluate(&doc), Some("TALLERES GARCIA S.L.".to_string()));

        let above_start = ExtractionRule::variable("talleres", -1, Segment::Token(1));
        assert_eq!(above_start.evaluate(&doc), None);
    }

    #[test]
    fn test_extreme_line_and_offset_do_not_match() {
        let doc = Document::new(["a", "b"]);

        let first = ExtractionRule::fixed_line(i64::MIN, Segment::Token(1));
        assert!(matches!(
            first.resolve(&doc),
            Err(ExtractionError::IndexOutOfRange { index: i64::MIN, len: 2 })
        ));
        assert_eq!(ExtractionRule::fixed_line(i64::MAX, Segment::Token(1)).evaluate(&doc), None);

        let below = ExtractionRule::variable("b", i64::MAX, Segment::Token(1));
        assert!(matches!(
            below.resolve(&doc),
            Err(ExtractionError::IndexOutOfRange { index: i64::MAX, len: 2 })
        ));
        assert_eq!(ExtractionRule::variable("b", i64::MIN, Segment::Token(1)).evaluate(&doc), None);
    }

    #[test]
    fn test_missing_anchor() {
        let doc = Document::new(["FACTURA"]);
        let rule = ExtractionRule::variable("Matrícula", 0, Segment::Token(2));
        assert!(matches!(rule.resolve(&doc), Err(ExtractionError::AnchorNotFound(_))));
    }

    #[test]
    fn test_anchor_uses_first_occurrence() {
        let doc = Document::new(["TOTAL", "10,00", "TOTAL", "20,00"]);
        let rule = ExtractionRule::variable("total", 1, Segment::Token(1));
        assert_eq!(rule.evaluate(&doc), Some("10,00".to_string()));
    }

    #[test]
    fn test_deserialize_rule_records() {
        let rules: Vec<ExtractionRule> = serde_json::from_str(
            r#"[
                {"type": "FIXED_VALUE", "value": "factura"},
                {"type": "FIXED", "line": 3, "segment": "2-4"},
                {"type": "VARIABLE", "ref_text": "Fecha", "offset": 1, "segment": 1},
                {"type": "VARIABLE", "ref_text": ["Total", "Importe"], "offset": 0, "segment": 2},
                {"type": "REGEX", "pattern": ".*"}
            ]"#,
        )
        .unwrap();

        assert_eq!(
            rules,
            vec![
                ExtractionRule::fixed_value("factura"),
                ExtractionRule::fixed_line(3, range(2, 4)),
                ExtractionRule::variable("Fecha", 1, Segment::Token(1)),
                ExtractionRule::VariableLine {
                    anchor_text: vec!["Total".to_string(), "Importe".to_string()],
                    offset: 0,
                    segment: Segment::Token(2),
                },
                ExtractionRule::Unsupported,
            ]
        );
    }

    #[test]
    fn test_malformed_segment_loads_but_never_matches() {
        let rule: ExtractionRule =
            serde_json::from_str(r#"{"type": "FIXED", "line": 1, "segment": "first"}"#).unwrap();
        assert_eq!(rule.evaluate(&Document::new(["FACTURA 1"])), None);
    }
}
