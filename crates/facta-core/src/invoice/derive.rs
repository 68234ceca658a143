//! Derived-amount calculator.
//!
//! Reconstructs missing base, tax and total from whichever subset was found.
//! Arithmetic is exact; values are rounded only when written into a result.

use rust_decimal::Decimal;

use crate::models::result::{round_amount, ExtractionResult, Field};
use crate::models::vat::VatRate;

/// Base, tax and total of one document, each possibly unresolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Amounts {
    pub base: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub total: Option<Decimal>,
}

impl Amounts {
    /// Read the monetary fields of a result.
    pub fn from_result(result: &ExtractionResult) -> Self {
        Self {
            base: result.amount(Field::Base),
            tax: result.amount(Field::Tax),
            total: result.amount(Field::Total),
        }
    }
}

/// Net amount contained in a gross total: `total / (1 + r)`.
///
/// `None` when the value is out of the representable range.
pub fn base_from_total(total: Decimal, rate: VatRate) -> Option<Decimal> {
    total.checked_div(rate.gross_multiplier())
}

/// Gross total and tax for a net base: `(base * (1 + r), base * r)`.
///
/// Each member is `None` when it overflows.
pub fn total_and_tax_from_base(base: Decimal, rate: VatRate) -> (Option<Decimal>, Option<Decimal>) {
    (
        base.checked_mul(rate.gross_multiplier()),
        base.checked_mul(rate.as_decimal()),
    )
}

/// Fill the missing members of any subset of base, tax and total.
///
/// Present members are never changed. Tax alone, or nothing at all, cannot
/// be completed. A member whose derivation overflows stays absent.
pub fn complete(
    base: Option<Decimal>,
    tax: Option<Decimal>,
    total: Option<Decimal>,
    rate: VatRate,
) -> Amounts {
    let (base, tax, total) = match (base, tax, total) {
        (Some(b), t, Some(tot)) => (Some(b), t.or_else(|| tot.checked_sub(b)), Some(tot)),
        (Some(b), Some(t), None) => (Some(b), Some(t), b.checked_add(t)),
        (None, Some(t), Some(tot)) => (tot.checked_sub(t), Some(t), Some(tot)),
        (None, None, Some(tot)) => {
            let b = base_from_total(tot, rate);
            (b, b.and_then(|b| tot.checked_sub(b)), Some(tot))
        }
        (Some(b), None, None) => {
            let (tot, t) = total_and_tax_from_base(b, rate);
            (Some(b), t, tot)
        }
        (None, tax, None) => (None, tax, None),
    };

    Amounts { base, tax, total }
}

/// Derive missing base, tax and total in place.
///
/// Derived values are rounded to cents; extracted ones are kept as they are.
/// Returns the fields that were added.
pub fn derive_amounts(result: &mut ExtractionResult, rate: VatRate) -> Vec<Field> {
    let found = Amounts::from_result(result);
    let completed = complete(found.base, found.tax, found.total, rate);

    let mut derived = Vec::new();
    for (field, value) in [
        (Field::Total, completed.total),
        (Field::Base, completed.base),
        (Field::Tax, completed.tax),
    ] {
        let Some(value) = value else { continue };
        if !result.contains(field) {
            result.set_amount(field, round_amount(value));
            derived.push(field);
        }
    }
    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn rate() -> VatRate {
        VatRate::GENERAL
    }

    #[test]
    fn test_round_trip_at_general_rate() {
        let (total, tax) = total_and_tax_from_base(dec("100.00"), rate());
        assert_eq!(total.map(round_amount), Some(dec("121.00")));
        assert_eq!(tax.map(round_amount), Some(dec("21.00")));

        let base = base_from_total(dec("121.00"), rate()).unwrap();
        assert!((base - dec("100.00")).abs() <= dec("0.01"));
    }

    #[test]
    fn test_complete_every_subset() {
        let b = Some(dec("100"));
        let t = Some(dec("21"));
        let tot = Some(dec("121"));
        let full = Amounts { base: b, tax: t, total: tot };

        assert_eq!(complete(b, None, tot, rate()), full);
        assert_eq!(complete(b, t, None, rate()), full);
        assert_eq!(complete(None, t, tot, rate()), full);
        assert_eq!(complete(b, t, tot, rate()), full);
        assert_eq!(complete(b, None, None, rate()), full);
        assert_eq!(complete(None, t, None, rate()), Amounts { tax: t, ..Default::default() });
        assert_eq!(complete(None, None, None, rate()), Amounts::default());
    }

    #[test]
    fn test_overflowing_derivation_leaves_field_absent() {
        let completed = complete(Some(Decimal::MAX), None, None, rate());
        assert_eq!(completed.base, Some(Decimal::MAX));
        assert_eq!(completed.total, None);
        assert!(completed.tax.is_some());

        let completed = complete(Some(Decimal::MAX), Some(Decimal::MAX), None, rate());
        assert_eq!(completed.total, None);

        let completed = complete(None, Some(Decimal::MIN), Some(Decimal::MAX), rate());
        assert_eq!(completed.base, None);

        let mut result = ExtractionResult::new();
        result.set_amount(Field::Base, Decimal::MAX);
        let derived = derive_amounts(&mut result, rate());
        assert_eq!(derived, vec![Field::Tax]);
        assert!(!result.contains(Field::Total));
    }

    #[test]
    fn test_base_and_total_win_over_rate() {
        // 10% invoice read with the 21% default: tax is the difference
        let completed = complete(Some(dec("100")), None, Some(dec("110")), rate());
        assert_eq!(completed.tax, Some(dec("10")));
    }

    #[test]
    fn test_derive_rounds_only_derived_values() {
        let mut result = ExtractionResult::new();
        result.set_amount(Field::Total, dec("100"));

        let derived = derive_amounts(&mut result, rate());

        assert_eq!(derived, vec![Field::Base, Field::Tax]);
        assert_eq!(result.amount(Field::Total), Some(dec("100")));
        assert_eq!(result.amount(Field::Base), Some(dec("82.64")));
        assert_eq!(result.amount(Field::Tax), Some(dec("17.36")));
    }

    #[test]
    fn test_derive_without_base_or_total_is_a_no_op() {
        let mut result = ExtractionResult::new();
        result.set_amount(Field::Tax, dec("21"));

        assert!(derive_amounts(&mut result, rate()).is_empty());
        assert!(!result.has_totals());
    }

    #[test]
    fn test_derive_with_reduced_rate() {
        let mut result = ExtractionResult::new();
        result.set_amount(Field::Base, dec("50"));

        derive_amounts(&mut result, VatRate::from_percent(10).unwrap());

        assert_eq!(result.amount(Field::Total).unwrap().to_string(), "55.00");
        assert_eq!(result.amount(Field::Tax).unwrap().to_string(), "5.00");
    }
}
