//! Common regex patterns for Spanish invoice extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Amounts: grouped thousands (1.234,56 / 1\u{a0}234,56) or a plain digit
    // run, optional decimal part, optional currency marker. A plain space never
    // groups: "IVA 21 210,00" is two numbers.
    pub static ref AMOUNT_PATTERN: Regex = Regex::new(
        r"(?i)[-+]?(?:\d{1,3}(?:[.,\u{00a0}\u{202f}]\d{3})+|\d+)(?:[.,]\d{1,2})?(?:\s*(?:€|euros?|eur|\$|usd))?"
    ).unwrap();

    pub static ref CURRENCY_WORD: Regex = Regex::new(
        r"(?i)euros?|eur|usd"
    ).unwrap();

    // Dates: dd/mm/yyyy, dd-mm-yy, dd.mm.yyyy
    pub static ref DATE_TOKEN: Regex = Regex::new(
        r"\b(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{4}|\d{2})\b"
    ).unwrap();

    pub static ref DATE_SPANISH_LONG: Regex = Regex::new(
        r"(?i)\b(\d{1,2})\s+de\s+(enero|febrero|marzo|abril|mayo|junio|julio|agosto|septiembre|setiembre|octubre|noviembre|diciembre)\s+(?:de\s+|del\s+)?(\d{4})\b"
    ).unwrap();

    // Tax identifiers (CIF, NIF, NIE), optionally with an ES prefix and
    // separators. Matched against upper-cased text.
    pub static ref TAX_ID_TOKEN: Regex = Regex::new(
        r"\b(?:ES[-.]?)?(?:[ABCDEFGHJNPQRSUVW][-.]?\d{7}[-.]?[0-9A-J]|\d{8}[-.]?[A-Z]|[XYZ][-.]?\d{7}[-.]?[A-Z])\b"
    ).unwrap();

    pub static ref TAX_ID_CANONICAL: Regex = Regex::new(
        r"^(?:[ABCDEFGHJNPQRSUVW]\d{7}[0-9A-J]|\d{8}[A-Z]|[XYZ]\d{7}[A-Z])$"
    ).unwrap();

    // Vehicle plates (current national format): 1234 BCD, 1234-BCD
    pub static ref PLATE_TOKEN: Regex = Regex::new(
        r"(?i)\b(\d{4})[\s-]?([BCDFGHJKLMNPRSTVWXYZ]{3})\b"
    ).unwrap();

    pub static ref PLATE_CANONICAL: Regex = Regex::new(
        r"^\d{4}[BCDFGHJKLMNPRSTVWXYZ]{3}$"
    ).unwrap();

    // Invoice number after a number marker: "Nº 00123", "Número: A-15"
    pub static ref INVOICE_NUMBER_MARKER: Regex = Regex::new(
        r"(?i)(?:\bn\s?[º°]|\bno\.|\bnúm(?:ero)?\.?|\bnum(?:ero)?\.?)\s*:?\s*"
    ).unwrap();

    pub static ref INVOICE_NUMBER: Regex = Regex::new(
        r"(?i)(?:\bn\s?[º°]|\bno\.|\bnúm(?:ero)?\.?|\bnum(?:ero)?\.?)\s*:?\s*([A-Z0-9][A-Z0-9/\-_.]*)"
    ).unwrap();

    // Total amount line
    pub static ref TOTAL_KEYWORD: Regex = Regex::new(
        r"(?i)\btotal\b"
    ).unwrap();

    pub static ref NOT_TOTAL_KEYWORD: Regex = Regex::new(
        r"(?i)\b(?:sub-?total|base|iva|impuesto|cuota)\b"
    ).unwrap();

    pub static ref TAX_BASE_KEYWORD: Regex = Regex::new(
        r"(?i)\bbase(?:\s+imponible)?\b"
    ).unwrap();

    // Document type keywords
    pub static ref CORRECTIVE_INVOICE: Regex = Regex::new(
        r"(?i)\b(?:rectificativa|abono)\b"
    ).unwrap();

    pub static ref PROFORMA_INVOICE: Regex = Regex::new(
        r"(?i)\bpro-?forma\b"
    ).unwrap();

    pub static ref INVOICE_KEYWORD: Regex = Regex::new(
        r"(?i)\bfactura\b"
    ).unwrap();

    // Client section header
    pub static ref CLIENT_SECTION: Regex = Regex::new(
        r"(?i)\b(?:cliente|destinatario|facturar\s+a)\b"
    ).unwrap();
}
