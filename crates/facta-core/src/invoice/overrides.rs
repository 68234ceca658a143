//! Named procedural overrides.
//!
//! An override replaces the declarative rules of one field of a profile.
//! Profiles refer to them by name; the table below is the only registry.

use std::fmt;

use crate::models::document::{tokenize, Document};
use crate::models::result::FieldValue;

use super::rules::amounts::locate_amounts;
use super::rules::anchor::find_anchor;
use super::rules::patterns::{INVOICE_KEYWORD, INVOICE_NUMBER_MARKER, NOT_TOTAL_KEYWORD, TOTAL_KEYWORD};
use super::rules::plate::find_plate_in_document;
use super::ExtractionContext;

/// Signature shared by every override.
pub type OverrideFn = fn(&Document, &ExtractionContext) -> Option<FieldValue>;

/// A registered override.
#[derive(Clone, Copy)]
pub struct Override {
    pub name: &'static str,
    pub apply: OverrideFn,
}

impl fmt::Debug for Override {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Override").field(&self.name).finish()
    }
}

impl PartialEq for Override {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Override {}

static OVERRIDES: &[Override] = &[
    Override {
        name: "invoice_number_joined",
        apply: invoice_number_joined,
    },
    Override {
        name: "last_amount_on_total_line",
        apply: last_amount_on_total_line,
    },
    Override {
        name: "plate_scan",
        apply: plate_scan,
    },
    Override {
        name: "issuer_tax_id_scan",
        apply: issuer_tax_id_scan,
    },
    Override {
        name: "client_after_anchor",
        apply: client_after_anchor,
    },
];

/// Look up an override by name.
pub fn lookup(name: &str) -> Option<Override> {
    OVERRIDES.iter().find(|o| o.name == name.trim()).copied()
}

/// Every registered override name.
pub fn names() -> impl Iterator<Item = &'static str> {
    OVERRIDES.iter().map(|o| o.name)
}

/// Tokens after the number marker on the first invoice line, without spaces.
fn invoice_number_joined(doc: &Document, _ctx: &ExtractionContext) -> Option<FieldValue> {
    doc.iter()
        .filter(|(_, line)| INVOICE_KEYWORD.is_match(line))
        .find_map(|(_, line)| INVOICE_NUMBER_MARKER.find(line).map(|m| &line[m.end()..]))
        .map(|rest| tokenize(rest).concat())
        .filter(|number| !number.is_empty())
        .map(FieldValue::Text)
}

/// Last amount on the first total line that carries one.
fn last_amount_on_total_line(doc: &Document, _ctx: &ExtractionContext) -> Option<FieldValue> {
    doc.iter()
        .filter(|(_, line)| TOTAL_KEYWORD.is_match(line) && !NOT_TOTAL_KEYWORD.is_match(line))
        .find_map(|(_, line)| locate_amounts(line).last().copied())
        .map(FieldValue::Amount)
}

fn plate_scan(doc: &Document, _ctx: &ExtractionContext) -> Option<FieldValue> {
    find_plate_in_document(doc).map(FieldValue::Text)
}

fn issuer_tax_id_scan(doc: &Document, ctx: &ExtractionContext) -> Option<FieldValue> {
    ctx.tax_ids().extract_from_document(doc).map(FieldValue::Text)
}

/// First non-empty line after the `cliente` line.
fn client_after_anchor(doc: &Document, _ctx: &ExtractionContext) -> Option<FieldValue> {
    let anchor = find_anchor(doc, &["cliente"])?;
    doc.iter()
        .skip(anchor + 1)
        .map(|(_, line)| line.trim())
        .find(|line| !line.is_empty())
        .map(|line| FieldValue::Text(line.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    fn run(name: &str, doc: &Document, ctx: &ExtractionContext) -> Option<FieldValue> {
        let o = lookup(name).unwrap();
        (o.apply)(doc, ctx)
    }

    fn text(s: &str) -> Option<FieldValue> {
        Some(FieldValue::Text(s.to_string()))
    }

    #[test]
    fn test_lookup() {
        assert_eq!(names().count(), 5);
        assert!(lookup("plate_scan").is_some());
        assert!(lookup("guess_everything").is_none());
    }

    #[test]
    fn test_invoice_number_joined() {
        let doc = Document::new(["TALLERES GARCIA S.L.", "FACTURA Nº FV 2024 / 0012", "Fecha 01/02/2024"]);
        assert_eq!(run("invoice_number_joined", &doc, &ExtractionContext::new()), text("FV2024/0012"));

        let no_marker = Document::new(["FACTURA", "FV 2024"]);
        assert_eq!(run("invoice_number_joined", &no_marker, &ExtractionContext::new()), None);
    }

    #[test]
    fn test_last_amount_on_total_line() {
        let doc = Document::new([
            "Subtotal 90,00",
            "TOTAL",
            "Base 100,00  IVA 21%  21,00",
            "TOTAL FACTURA 100,00 21,00 121,00 €",
        ]);
        assert_eq!(
            run("last_amount_on_total_line", &doc, &ExtractionContext::new()),
            Some(FieldValue::Amount(Decimal::new(12100, 2)))
        );
    }

    #[test]
    fn test_plate_scan() {
        let doc = Document::new(["SEAT LEON", "Mat. 4321-FGH"]);
        assert_eq!(run("plate_scan", &doc, &ExtractionContext::new()), text("4321FGH"));
    }

    #[test]
    fn test_issuer_tax_id_scan_skips_receiver() {
        let doc = Document::new(["Cliente CIF B12345674", "Emisor NIF 12345678Z"]);
        let ctx = ExtractionContext::new().with_receiver("B12345674");
        assert_eq!(run("issuer_tax_id_scan", &doc, &ctx), text("12345678Z"));

        let only_receiver = Document::new(["CIF B12345674"]);
        assert_eq!(run("issuer_tax_id_scan", &only_receiver, &ctx), None);
    }

    #[test]
    fn test_client_after_anchor() {
        let doc = Document::new(["Datos del cliente:", "", "  TRANSPORTES LOPEZ S.L.  "]);
        assert_eq!(
            run("client_after_anchor", &doc, &ExtractionContext::new()),
            text("TRANSPORTES LOPEZ S.L.")
        );
        assert_eq!(run("client_after_anchor", &Document::new(["Cliente"]), &ExtractionContext::new()), None);
    }
}
