//! Legal-entity name detection for issuer heuristics.

/// Company-form suffixes, compared without dots.
const COMPANY_SUFFIXES: &[&str] = &["SL", "SA", "SLU", "SAU", "SLL", "SCOOP", "CB", "SC", "SLP"];

/// Whether the line names a company: contains a company-form token.
pub fn has_company_suffix(line: &str) -> bool {
    let compact: Vec<String> = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .map(|t| t.replace('.', "").to_uppercase())
        .filter(|t| !t.is_empty())
        .collect();

    let single = compact.iter().any(|t| COMPANY_SUFFIXES.contains(&t.as_str()));
    // "S. L." splits into two tokens
    let paired = compact
        .windows(2)
        .any(|w| COMPANY_SUFFIXES.contains(&format!("{}{}", w[0], w[1]).as_str()));

    single || paired
}

/// Whether every cased character on the line is upper case.
pub fn is_uppercase_line(line: &str) -> bool {
    let mut letters = line.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| !c.is_lowercase())
}

/// Upper-case line carrying a company-form token.
pub fn is_legal_entity_line(line: &str) -> bool {
    is_uppercase_line(line) && has_company_suffix(line)
}
