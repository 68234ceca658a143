//! Extraction result with a fixed, known set of field keys.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A result field. Declaration order is the output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// Document type (factura, rectificativa, ...).
    Type,
    /// Issue date as written on the document.
    Date,
    InvoiceNumber,
    Issuer,
    IssuerTaxId,
    Client,
    ClientTaxId,
    VehicleModel,
    VehiclePlate,
    Total,
    Base,
    Tax,
    Fees,
}

impl Field {
    /// All fields in output order.
    pub const ALL: [Field; 13] = [
        Field::Type,
        Field::Date,
        Field::InvoiceNumber,
        Field::Issuer,
        Field::IssuerTaxId,
        Field::Client,
        Field::ClientTaxId,
        Field::VehicleModel,
        Field::VehiclePlate,
        Field::Total,
        Field::Base,
        Field::Tax,
        Field::Fees,
    ];

    /// Canonical snake_case key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Type => "type",
            Field::Date => "date",
            Field::InvoiceNumber => "invoice_number",
            Field::Issuer => "issuer",
            Field::IssuerTaxId => "issuer_tax_id",
            Field::Client => "client",
            Field::ClientTaxId => "client_tax_id",
            Field::VehicleModel => "vehicle_model",
            Field::VehiclePlate => "vehicle_plate",
            Field::Total => "total",
            Field::Base => "base",
            Field::Tax => "tax",
            Field::Fees => "fees",
        }
    }

    /// Monetary fields are stored as exact decimals.
    pub fn is_monetary(&self) -> bool {
        matches!(self, Field::Total | Field::Base | Field::Tax | Field::Fees)
    }
}

impl FromStr for Field {
    type Err = ConfigError;

    /// Case-insensitive lookup of a field key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim();
        Field::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(key))
            .ok_or_else(|| ConfigError::UnknownField(s.to_string()))
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved field value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Exact monetary amount.
    Amount(Decimal),
    /// Free text as extracted.
    Text(String),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Amount(_) => None,
        }
    }

    pub fn as_amount(&self) -> Option<Decimal> {
        match self {
            FieldValue::Amount(d) => Some(*d),
            FieldValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Amount(d) => write!(f, "{}", d),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// Round a monetary value for output: 2 places, half away from zero.
pub fn round_amount(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Field -> value mapping produced by every extractor.
///
/// Absent keys are unresolved fields. Iteration follows [`Field::ALL`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    fields: BTreeMap<Field, FieldValue>,
}

impl ExtractionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: Field) -> Option<&FieldValue> {
        self.fields.get(&field)
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        self.get(field).and_then(FieldValue::as_text)
    }

    pub fn amount(&self, field: Field) -> Option<Decimal> {
        self.get(field).and_then(FieldValue::as_amount)
    }

    pub fn contains(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    /// Store a value, replacing any previous one.
    pub fn set(&mut self, field: Field, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn set_text(&mut self, field: Field, value: impl Into<String>) {
        self.set(field, FieldValue::Text(value.into()));
    }

    pub fn set_amount(&mut self, field: Field, value: Decimal) {
        self.set(field, FieldValue::Amount(value));
    }

    pub fn remove(&mut self, field: Field) -> Option<FieldValue> {
        self.fields.remove(&field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolved fields in output order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    /// Copy every field of `other` that is absent here. Returns the fields copied.
    pub fn fill_missing_from(&mut self, other: &ExtractionResult) -> Vec<Field> {
        let mut filled = Vec::new();
        for (field, value) in other.iter() {
            if !self.contains(field) {
                self.set(field, value.clone());
                filled.push(field);
            }
        }
        filled
    }

    /// One output cell per field in [`Field::ALL`] order; empty when absent.
    pub fn to_row(&self) -> Vec<String> {
        Field::ALL
            .iter()
            .map(|f| self.get(*f).map(|v| v.to_string()).unwrap_or_default())
            .collect()
    }

    /// Whether either base or total is present.
    pub fn has_totals(&self) -> bool {
        self.contains(Field::Base) || self.contains(Field::Total)
    }
}
