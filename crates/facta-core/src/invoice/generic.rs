//! Heuristic extractor used when no profile matches the document.

use rust_decimal::Decimal;
use tracing::debug;

use crate::models::document::Document;
use crate::models::result::{ExtractionResult, Field};
use crate::models::vat::VatRate;

use super::derive::derive_amounts;
use super::rules::amounts::{locate_amount, locate_amounts};
use super::rules::dates::find_date;
use super::rules::party::is_legal_entity_line;
use super::rules::patterns::*;
use super::rules::plate::find_plate_in_document;
use super::rules::tax_id::{normalize_tax_id, TaxIdExtractor};
use super::rules::FieldExtractor;
use super::{ExtractionContext, Extractor};

/// Layout-independent heuristics over the whole document.
#[derive(Debug, Clone, Default)]
pub struct GenericExtractor {
    context: ExtractionContext,
}

impl GenericExtractor {
    pub fn new(context: ExtractionContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ExtractionContext {
        &self.context
    }

    /// Run every heuristic without deriving amounts.
    pub fn scan(&self, doc: &Document) -> ExtractionResult {
        let mut result = ExtractionResult::new();

        if let Some(kind) = self.document_type(doc) {
            result.set_text(Field::Type, kind);
        }
        if let Some(date) = doc.iter().find_map(|(_, line)| find_date(line)) {
            result.set_text(Field::Date, date);
        }
        if let Some(number) = self.invoice_number(doc) {
            result.set_text(Field::InvoiceNumber, number);
        }
        if let Some(issuer) = self.issuer(doc) {
            result.set_text(Field::Issuer, issuer);
        }
        if let Some(id) = self.context.tax_ids().extract_from_document(doc) {
            result.set_text(Field::IssuerTaxId, id);
        }
        if let Some(client) = self.client(doc) {
            result.set_text(Field::Client, client);
        }
        if let Some(id) = self.client_tax_id(doc) {
            result.set_text(Field::ClientTaxId, id);
        }
        if let Some(plate) = find_plate_in_document(doc) {
            result.set_text(Field::VehiclePlate, plate);
        }
        if let Some(total) = self.total(doc) {
            result.set_amount(Field::Total, total);
        }
        if let Some(base) = self.base(doc) {
            result.set_amount(Field::Base, base);
        }

        debug!("generic heuristics resolved {} fields", result.len());
        result
    }

    fn document_type(&self, doc: &Document) -> Option<&'static str> {
        let matches = |re: &regex::Regex| doc.iter().any(|(_, line)| re.is_match(line));

        if matches(&*CORRECTIVE_INVOICE) {
            Some("rectificativa")
        } else if matches(&*PROFORMA_INVOICE) {
            Some("proforma")
        } else if matches(&*INVOICE_KEYWORD) {
            Some("factura")
        } else {
            None
        }
    }

    /// Number after a marker on a `factura` line, or on the line below it.
    fn invoice_number(&self, doc: &Document) -> Option<String> {
        let capture = |line: &str| {
            INVOICE_NUMBER
                .captures(line)
                .map(|caps| caps[1].trim_end_matches(['.', '-']).to_string())
        };

        doc.iter()
            .filter(|(_, line)| INVOICE_KEYWORD.is_match(line))
            .find_map(|(i, line)| {
                capture(line).or_else(|| doc.line(i + 1).and_then(capture))
            })
    }

    /// Upper-case company line among the header lines.
    fn issuer(&self, doc: &Document) -> Option<String> {
        doc.iter()
            .take(self.context.header_scan_lines)
            .map(|(_, line)| line.trim())
            .find(|line| is_legal_entity_line(line))
            .map(str::to_string)
    }

    /// Text after the client header, or the next non-empty line when the
    /// header stands alone.
    fn client(&self, doc: &Document) -> Option<String> {
        let (index, rest) = doc.iter().find_map(|(i, line)| {
            CLIENT_SECTION
                .find(line)
                .map(|m| (i, line[m.end()..].trim_matches(|c: char| c == ':' || c.is_whitespace())))
        })?;

        let is_name = |s: &str| {
            s.chars().any(char::is_alphabetic)
                && TaxIdExtractor::new().extract(s).is_none_or(|m| m.source.len() < s.len())
        };

        if !rest.is_empty() {
            return is_name(rest).then(|| rest.to_string());
        }

        doc.iter()
            .skip(index + 1)
            .map(|(_, line)| line.trim())
            .find(|line| !line.is_empty())
            .filter(|line| is_name(*line))
            .map(str::to_string)
    }

    /// The receiver's identifier, when the document mentions it.
    fn client_tax_id(&self, doc: &Document) -> Option<String> {
        let receiver = self.context.receiver_tax_id.as_deref()?;
        TaxIdExtractor::new()
            .with_validation(self.context.validate_tax_ids)
            .extract_all_from_document(doc)
            .iter()
            .any(|id| self.context.is_receiver(id))
            .then(|| normalize_tax_id(receiver))
    }

    /// First total line with an amount, else the amount on the line below.
    fn total(&self, doc: &Document) -> Option<Decimal> {
        let is_total = |line: &str| TOTAL_KEYWORD.is_match(line) && !NOT_TOTAL_KEYWORD.is_match(line);

        doc.iter().filter(|(_, line)| is_total(*line)).find_map(|(i, line)| {
            locate_amounts(line).last().copied().or_else(|| {
                doc.line(i + 1)
                    .filter(|next| !NOT_TOTAL_KEYWORD.is_match(next))
                    .and_then(locate_amount)
            })
        })
    }

    /// First amount after a base keyword.
    fn base(&self, doc: &Document) -> Option<Decimal> {
        doc.iter().find_map(|(_, line)| {
            TAX_BASE_KEYWORD
                .find(line)
                .and_then(|m| locate_amount(&line[m.end()..]))
        })
    }
}

impl Extractor for GenericExtractor {
    fn name(&self) -> &str {
        "generic"
    }

    fn extract(&self, doc: &Document, vat_rate: VatRate) -> ExtractionResult {
        let mut result = self.scan(doc);
        derive_amounts(&mut result, vat_rate);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn workshop_invoice() -> Document {
        Document::from_text(
            "TALLERES GARCIA S.L.\n\
             C/ Mayor 12, Valladolid\n\
             CIF: B-1234567-4\n\
             FACTURA Nº A-2024/015\n\
             Fecha: 15/03/2024\n\
             Cliente: TRANSPORTES LOPEZ S.A.\n\
             NIF cliente: A87654321\n\
             Vehículo: SEAT LEON  Matrícula 1234 BCD\n\
             Base imponible 200,00\n\
             IVA 21% 42,00\n\
             TOTAL 242,00 €\n",
        )
    }

    #[test]
    fn test_generic_heuristics() {
        let ctx = ExtractionContext::new().with_receiver("A87654321");
        let result = GenericExtractor::new(ctx).extract(&workshop_invoice(), VatRate::GENERAL);

        assert_eq!(result.text(Field::Type), Some("factura"));
        assert_eq!(result.text(Field::Date), Some("15/03/2024"));
        assert_eq!(result.text(Field::InvoiceNumber), Some("A-2024/015"));
        assert_eq!(result.text(Field::Issuer), Some("TALLERES GARCIA S.L."));
        assert_eq!(result.text(Field::IssuerTaxId), Some("B12345674"));
        assert_eq!(result.text(Field::Client), Some("TRANSPORTES LOPEZ S.A."));
        assert_eq!(result.text(Field::ClientTaxId), Some("A87654321"));
        assert_eq!(result.text(Field::VehiclePlate), Some("1234BCD"));
        assert_eq!(result.amount(Field::Total), Some(dec("242.00")));
        assert_eq!(result.amount(Field::Base), Some(dec("200.00")));
        assert_eq!(result.amount(Field::Tax), Some(dec("42.00")));
    }

    #[test]
    fn test_total_on_following_line() {
        let doc = Document::new(["FACTURA", "Nº 00123", "Fecha", "01/02/2024", "TOTAL", "121,00 €"]);
        let result = GenericExtractor::default().extract(&doc, VatRate::GENERAL);

        assert_eq!(result.text(Field::InvoiceNumber), Some("00123"));
        assert_eq!(result.amount(Field::Total), Some(dec("121.00")));
        assert_eq!(result.amount(Field::Base), Some(dec("100.00")));
    }

    #[test]
    fn test_receiver_only_document_has_no_issuer_id() {
        let doc = Document::new(["Factura simplificada", "Cliente B12345674", "Total 10,00"]);
        let ctx = ExtractionContext::new().with_receiver("B12345674");
        let result = GenericExtractor::new(ctx).scan(&doc);

        assert_eq!(result.get(Field::IssuerTaxId), None);
        assert_eq!(result.text(Field::ClientTaxId), Some("B12345674"));
        assert_eq!(result.get(Field::Client), None);
    }

    #[test]
    fn test_issuer_only_in_header_lines() {
        let mut lines = vec!["factura"; 12];
        lines.push("RECAMBIOS NORTE S.A.");
        let doc = Document::new(lines);

        let narrow = GenericExtractor::default().scan(&doc);
        assert_eq!(narrow.get(Field::Issuer), None);

        let wide = GenericExtractor::new(ExtractionContext::new().with_header_scan_lines(20)).scan(&doc);
        assert_eq!(wide.text(Field::Issuer), Some("RECAMBIOS NORTE S.A."));
    }

    #[test]
    fn test_document_type() {
        let scan = |line: &str| GenericExtractor::default().scan(&Document::new([line]));
        assert_eq!(scan("FACTURA RECTIFICATIVA").text(Field::Type), Some("rectificativa"));
        assert_eq!(scan("Factura proforma").text(Field::Type), Some("proforma"));
        assert_eq!(scan("Albarán").get(Field::Type), None);
    }
}
