//! Field mapping interpreter.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, trace, warn};

use crate::models::document::Document;
use crate::models::result::{ExtractionResult, Field, FieldValue};
use crate::models::vat::VatRate;

use super::derive::derive_amounts;
use super::rule::ExtractionRule;
use super::rules::amounts::normalize_amount;
use super::rules::dates::is_date;
use super::rules::plate::is_plate;
use super::rules::tax_id::is_tax_id;
use super::ExtractionContext;

/// Named check a rule value must pass to be accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validator {
    Plate,
    TaxId,
    Date,
    Amount,
    NonEmpty,
}

impl Validator {
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            Validator::Plate => is_plate(value),
            Validator::TaxId => is_tax_id(value),
            Validator::Date => is_date(value),
            Validator::Amount => normalize_amount(value).is_ok(),
            Validator::NonEmpty => !value.trim().is_empty(),
        }
    }
}

/// A rule plus an optional validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAttempt {
    #[serde(flatten)]
    pub rule: ExtractionRule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<Validator>,
}

impl FieldAttempt {
    pub fn new(rule: ExtractionRule) -> Self {
        Self {
            rule,
            validator: None,
        }
    }

    pub fn validated(rule: ExtractionRule, validator: Validator) -> Self {
        Self {
            rule,
            validator: Some(validator),
        }
    }
}

impl From<ExtractionRule> for FieldAttempt {
    fn from(rule: ExtractionRule) -> Self {
        Self::new(rule)
    }
}

/// Ordered field -> attempts table.
///
/// Fields are interpreted in declaration order. Keys are matched
/// case-insensitively when loaded and stored as [`Field`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping {
    entries: Vec<(Field, Vec<FieldAttempt>)>,
}

impl FieldMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add attempts for a field, appending to any already declared.
    pub fn with_field<I, A>(mut self, field: Field, attempts: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<FieldAttempt>,
    {
        self.push(field, attempts.into_iter().map(Into::into).collect());
        self
    }

    pub fn push(&mut self, field: Field, attempts: Vec<FieldAttempt>) {
        match self.entries.iter_mut().find(|(f, _)| *f == field) {
            Some((_, existing)) => existing.extend(attempts),
            None => self.entries.push((field, attempts)),
        }
    }

    pub fn attempts(&self, field: Field) -> Option<&[FieldAttempt]> {
        self.entries
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, a)| a.as_slice())
    }

    /// Declared fields in order.
    pub fn fields(&self) -> impl Iterator<Item = Field> + '_ {
        self.entries.iter().map(|(f, _)| *f)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Run every declared field, then derive missing amounts.
    pub fn extract(&self, doc: &Document, vat_rate: VatRate, ctx: &ExtractionContext) -> ExtractionResult {
        let mut result = self.resolve(doc, ctx, |_| false);
        derive_amounts(&mut result, vat_rate);
        result
    }

    /// Run declared fields except those `skip` rejects. No derivation.
    pub fn resolve<F>(&self, doc: &Document, ctx: &ExtractionContext, skip: F) -> ExtractionResult
    where
        F: Fn(Field) -> bool,
    {
        let mut result = ExtractionResult::new();
        for (field, attempts) in &self.entries {
            if skip(*field) {
                continue;
            }
            if let Some(value) = resolve_attempts(*field, attempts, doc, ctx) {
                result.set(*field, value);
            }
        }
        result
    }

    /// Attempt loop for a single field.
    pub fn extract_field(&self, field: Field, doc: &Document, ctx: &ExtractionContext) -> Option<FieldValue> {
        self.attempts(field)
            .and_then(|attempts| resolve_attempts(field, attempts, doc, ctx))
    }
}

/// First attempt whose value survives validation and normalization.
fn resolve_attempts(
    field: Field,
    attempts: &[FieldAttempt],
    doc: &Document,
    ctx: &ExtractionContext,
) -> Option<FieldValue> {
    for (i, attempt) in attempts.iter().enumerate() {
        let Some(raw) = attempt.rule.evaluate(doc) else {
            continue;
        };

        if let Some(validator) = attempt.validator {
            if !validator.accepts(&raw) {
                trace!("{} attempt {}: {:?} rejected by {:?}", field, i + 1, raw, validator);
                continue;
            }
        }

        let value = if field.is_monetary() {
            match normalize_amount(&raw) {
                Ok(amount) => FieldValue::Amount(amount),
                Err(e) => {
                    debug!("{} attempt {}: {}", field, i + 1, e);
                    continue;
                }
            }
        } else {
            FieldValue::Text(raw)
        };

        if !accepts_value(field, &value, ctx) {
            debug!("{} attempt {}: receiver tax id skipped", field, i + 1);
            continue;
        }

        return Some(value);
    }
    None
}

/// The receiver's own identifier is never an issuer identifier.
pub(crate) fn accepts_value(field: Field, value: &FieldValue, ctx: &ExtractionContext) -> bool {
    match (field, value) {
        (Field::IssuerTaxId, FieldValue::Text(id)) => !ctx.is_receiver(id),
        _ => true,
    }
}

/// A malformed rule record loads as a rule that never matches.
fn lenient_attempt(field: Field, record: serde_json::Value) -> FieldAttempt {
    match serde_json::from_value::<FieldAttempt>(record) {
        Ok(attempt) => attempt,
        Err(e) => {
            warn!("{}: malformed rule record ignored: {}", field, e);
            FieldAttempt::new(ExtractionRule::Unsupported)
        }
    }
}

impl<'de> Deserialize<'de> for FieldMapping {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = FieldMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of field names to rule lists")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut mapping = FieldMapping::new();
                while let Some(key) = map.next_key::<String>()? {
                    let field: Field = key.parse().map_err(de::Error::custom)?;
                    let records: Vec<serde_json::Value> = map.next_value()?;
                    let attempts = records
                        .into_iter()
                        .map(|record| lenient_attempt(field, record))
                        .collect();
                    mapping.push(field, attempts);
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}
