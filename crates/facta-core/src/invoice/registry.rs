//! Extractor profiles and the registry that selects one per document.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::models::document::Document;
use crate::models::result::{ExtractionResult, Field};
use crate::models::vat::VatRate;

use super::derive::derive_amounts;
use super::mapping::{accepts_value, FieldMapping};
use super::overrides::{self, Override};
use super::rules::tax_id::{normalize_tax_id, same_tax_id};
use super::{ExtractionContext, Extractor};

/// Top-level rule configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub profiles: Vec<ProfileConfig>,
}

/// One profile as written in the rule configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    pub name: String,

    /// Case-insensitive substrings of the source identifier (file name).
    #[serde(default)]
    pub keywords: Vec<String>,

    /// Issuer tax identifiers that select this profile from content.
    #[serde(default)]
    pub tax_ids: Vec<String>,

    /// Overrides the process-wide rate for this source.
    #[serde(default)]
    pub vat_rate: Option<VatRate>,

    #[serde(default)]
    pub fields: FieldMapping,

    /// Field key -> override name.
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

/// Source-specific rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorProfile {
    name: String,
    keywords: Vec<String>,
    tax_ids: Vec<String>,
    vat_rate: Option<VatRate>,
    mapping: FieldMapping,
    overrides: Vec<(Field, Override)>,
}

impl ExtractorProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keywords: Vec::new(),
            tax_ids: Vec::new(),
            vat_rate: None,
            mapping: FieldMapping::new(),
            overrides: Vec::new(),
        }
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords.extend(
            keywords
                .into_iter()
                .map(Into::<String>::into)
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        self
    }

    pub fn with_tax_ids<I, S>(mut self, tax_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tax_ids.extend(
            tax_ids
                .into_iter()
                .map(|id| normalize_tax_id(id.as_ref()))
                .filter(|id| !id.is_empty()),
        );
        self
    }

    pub fn with_vat_rate(mut self, rate: VatRate) -> Self {
        self.vat_rate = Some(rate);
        self
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Replace the declarative rules of `field` with a named override.
    pub fn with_override(mut self, field: Field, name: &str) -> Result<Self, ConfigError> {
        let o = overrides::lookup(name).ok_or_else(|| ConfigError::UnknownOverride {
            profile: self.name.clone(),
            field: field.to_string(),
            name: name.to_string(),
        })?;
        self.overrides.retain(|(f, _)| *f != field);
        self.overrides.push((field, o));
        Ok(self)
    }

    /// Build a profile from its configuration record.
    pub fn from_config(config: ProfileConfig) -> Result<Self, ConfigError> {
        let mut profile = ExtractorProfile::new(config.name.trim())
            .with_keywords(config.keywords)
            .with_tax_ids(&config.tax_ids)
            .with_mapping(config.fields);
        profile.vat_rate = config.vat_rate;

        for (key, name) in &config.overrides {
            let field: Field = key.parse()?;
            profile = profile.with_override(field, name)?;
        }
        Ok(profile)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn tax_ids(&self) -> &[String] {
        &self.tax_ids
    }

    pub fn vat_rate(&self) -> Option<VatRate> {
        self.vat_rate
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// Overridden fields and the override names.
    pub fn overrides(&self) -> impl Iterator<Item = (Field, &'static str)> + '_ {
        self.overrides.iter().map(|(f, o)| (*f, o.name))
    }

    /// Whether a keyword occurs in the source identifier.
    pub fn matches_source(&self, source: &str) -> bool {
        let source = source.to_lowercase();
        self.keywords.iter().any(|k| source.contains(k.as_str()))
    }

    /// Whether one of the given identifiers is registered for this profile.
    pub fn matches_tax_id(&self, found: &[String]) -> bool {
        self.tax_ids
            .iter()
            .any(|id| found.iter().any(|f| same_tax_id(id, f)))
    }

    /// Declarative rules plus overrides, without derived amounts.
    pub fn resolve(&self, doc: &Document, ctx: &ExtractionContext) -> ExtractionResult {
        let is_overridden = |field: Field| self.overrides.iter().any(|(f, _)| *f == field);
        let mut result = self.mapping.resolve(doc, ctx, is_overridden);

        for (field, o) in &self.overrides {
            match (o.apply)(doc, ctx) {
                Some(value) if accepts_value(*field, &value, ctx) => result.set(*field, value),
                _ => debug!("{}: override {} found no {}", self.name, o.name, field),
            }
        }
        result
    }

    /// Bind the profile to run settings.
    pub fn extractor<'a>(&'a self, ctx: &'a ExtractionContext) -> ProfileExtractor<'a> {
        ProfileExtractor { profile: self, ctx }
    }
}

/// A profile bound to the settings of one run.
pub struct ProfileExtractor<'a> {
    profile: &'a ExtractorProfile,
    ctx: &'a ExtractionContext,
}

impl Extractor for ProfileExtractor<'_> {
    fn name(&self) -> &str {
        self.profile.name()
    }

    fn extract(&self, doc: &Document, vat_rate: VatRate) -> ExtractionResult {
        let mut result = self.profile.resolve(doc, self.ctx);
        derive_amounts(&mut result, vat_rate);
        result
    }
}

/// Registered profiles, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: Vec<ExtractorProfile>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and validate every profile of a rule configuration.
    pub fn from_config(config: RuleConfig) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for profile in config.profiles {
            registry.register(ExtractorProfile::from_config(profile)?)?;
        }
        info!("Loaded {} extractor profiles", registry.len());
        Ok(registry)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_config(serde_json::from_str(json)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Add a profile. Names must be unique and the profile reachable.
    pub fn register(&mut self, profile: ExtractorProfile) -> Result<(), ConfigError> {
        if profile.keywords.is_empty() && profile.tax_ids.is_empty() {
            return Err(ConfigError::UnreachableProfile(profile.name));
        }
        if self.get(&profile.name).is_some() {
            return Err(ConfigError::DuplicateProfile(profile.name));
        }
        self.profiles.push(profile);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ExtractorProfile> {
        self.profiles.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn profiles(&self) -> &[ExtractorProfile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Select the profile for a document: source keyword first, then the
    /// issuer tax identifiers found in the content.
    pub fn identify(
        &self,
        doc: &Document,
        source: Option<&str>,
        ctx: &ExtractionContext,
    ) -> Option<&ExtractorProfile> {
        if let Some(profile) = source.and_then(|s| self.by_source(s)) {
            debug!("{}: selected by source keyword", profile.name);
            return Some(profile);
        }

        let profile = self.by_content(doc, ctx)?;
        debug!("{}: selected by issuer tax id", profile.name);
        Some(profile)
    }

    /// First profile with a keyword in the source identifier.
    pub fn by_source(&self, source: &str) -> Option<&ExtractorProfile> {
        self.profiles.iter().find(|p| p.matches_source(source))
    }

    /// First profile registered for a tax identifier in the document.
    ///
    /// The receiver's identifier never selects a profile.
    pub fn by_content(&self, doc: &Document, ctx: &ExtractionContext) -> Option<&ExtractorProfile> {
        if self.profiles.iter().all(|p| p.tax_ids.is_empty()) {
            return None;
        }
        let found = ctx.tax_ids().extract_all_from_document(doc);
        self.profiles.iter().find(|p| p.matches_tax_id(&found))
    }

    /// Keywords registered by more than one profile. Only the first of
    /// those profiles can ever be selected through them.
    pub fn shared_keywords(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut shared = Vec::new();
        for profile in &self.profiles {
            let own: HashSet<&String> = profile.keywords.iter().collect();
            for keyword in own {
                if !seen.insert(keyword.clone()) && !shared.contains(keyword) {
                    shared.push(keyword.clone());
                }
            }
        }
        shared.sort();
        shared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::models::result::FieldValue;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    const RULES: &str = r#"{
        "profiles": [
            {
                "name": "talleres-garcia",
                "keywords": ["garcia"],
                "tax_ids": ["B12345674"],
                "vat_rate": "0.10",
                "fields": {
                    "Invoice_Number": [
                        {"type": "VARIABLE", "ref_text": "FACTURA", "offset": 1, "segment": 2}
                    ],
                    "vehicle_plate": [
                        {"type": "FIXED", "line": 4, "segment": "2-3", "validator": "plate"}
                    ],
                    "total": [
                        {"type": "VARIABLE", "ref_text": "TOTAL", "offset": 0, "segment": 2}
                    ]
                },
                "overrides": {"total": "last_amount_on_total_line"}
            },
            {
                "name": "recambios-norte",
                "tax_ids": ["A-8765432-1"]
            }
        ]
    }"#;

    fn registry() -> ProfileRegistry {
        ProfileRegistry::from_json(RULES).unwrap()
    }

    #[test]
    fn test_load_profiles() {
        let registry = registry();
        assert_eq!(registry.len(), 2);

        let garcia = registry.get("talleres-garcia").unwrap();
        assert_eq!(garcia.keywords(), ["garcia"]);
        assert_eq!(garcia.vat_rate(), Some(VatRate::from_percent(10).unwrap()));
        assert_eq!(garcia.mapping().len(), 3);
        assert_eq!(
            garcia.overrides().collect::<Vec<_>>(),
            vec![(Field::Total, "last_amount_on_total_line")]
        );

        let norte = registry.get("RECAMBIOS-NORTE").unwrap();
        assert_eq!(norte.tax_ids(), ["A87654321"]);
    }

    #[test]
    fn test_identify_by_source_keyword() {
        let registry = registry();
        let ctx = ExtractionContext::new();
        let doc = Document::new(["FACTURA"]);

        let profile = registry.identify(&doc, Some("2024/Garcia_0012.txt"), &ctx);
        assert_eq!(profile.map(ExtractorProfile::name), Some("talleres-garcia"));
        assert!(registry.identify(&doc, Some("lopez.txt"), &ctx).is_none());
    }

    #[test]
    fn test_identify_by_content_tax_id() {
        let registry = registry();
        let doc = Document::new(["RECAMBIOS NORTE S.A.", "CIF: A87654321"]);

        let profile = registry.identify(&doc, Some("scan_0001.txt"), &ExtractionContext::new());
        assert_eq!(profile.map(ExtractorProfile::name), Some("recambios-norte"));
    }

    #[test]
    fn test_receiver_id_never_selects_a_profile() {
        let registry = registry();
        let doc = Document::new(["Cliente: RECAMBIOS NORTE S.A.", "CIF: A87654321"]);
        let ctx = ExtractionContext::new().with_receiver("A87654321");

        assert!(registry.identify(&doc, None, &ctx).is_none());
    }

    #[test]
    fn test_override_supersedes_declarative_rules() {
        let registry = registry();
        let ctx = ExtractionContext::new();
        let doc = Document::new([
            "FACTURA",
            "Nº 00123",
            "Vehículo",
            "Matrícula 1234 BCD",
            "TOTAL 100,00 10,00 110,00",
        ]);

        let profile = registry.get("talleres-garcia").unwrap();
        let result = profile.extractor(&ctx).extract(&doc, profile.vat_rate().unwrap());

        assert_eq!(result.text(Field::InvoiceNumber), Some("00123"));
        assert_eq!(result.text(Field::VehiclePlate), Some("1234 BCD"));
        assert_eq!(result.get(Field::Total), Some(&FieldValue::Amount(Decimal::new(11000, 2))));
        assert_eq!(result.amount(Field::Base), Some(Decimal::new(10000, 2)));
        assert_eq!(result.amount(Field::Tax), Some(Decimal::new(1000, 2)));
    }

    #[test]
    fn test_rejects_unknown_field_key() {
        let json = r#"{"profiles": [{"name": "x", "keywords": ["x"], "fields": {"importe": []}}]}"#;
        assert!(matches!(ProfileRegistry::from_json(json), Err(ConfigError::Parse(_))));

        let json = r#"{"profiles": [{"name": "x", "keywords": ["x"], "overrides": {"importe": "plate_scan"}}]}"#;
        assert!(matches!(
            ProfileRegistry::from_json(json),
            Err(ConfigError::UnknownField(key)) if key == "importe"
        ));
    }

    #[test]
    fn test_rejects_unknown_override() {
        let json = r#"{"profiles": [{"name": "x", "keywords": ["x"], "overrides": {"total": "guess"}}]}"#;
        assert!(matches!(
            ProfileRegistry::from_json(json),
            Err(ConfigError::UnknownOverride { name, .. }) if name == "guess"
        ));
    }

    #[test]
    fn test_rejects_non_positive_vat_rate() {
        let json = r#"{"profiles": [{"name": "x", "keywords": ["x"], "vat_rate": "0"}]}"#;
        assert!(ProfileRegistry::from_json(json).is_err());
    }

    #[test]
    fn test_rejects_unreachable_and_duplicate_profiles() {
        let json = r#"{"profiles": [{"name": "x"}]}"#;
        assert!(matches!(
            ProfileRegistry::from_json(json),
            Err(ConfigError::UnreachableProfile(name)) if name == "x"
        ));

        let json = r#"{"profiles": [
            {"name": "x", "keywords": ["a"]},
            {"name": "x", "keywords": ["b"]}
        ]}"#;
        assert!(matches!(
            ProfileRegistry::from_json(json),
            Err(ConfigError::DuplicateProfile(name)) if name == "x"
        ));
    }

    #[test]
    fn test_unknown_rule_type_loads() {
        let json = r#"{"profiles": [{"name": "x", "keywords": ["x"],
            "fields": {"date": [{"type": "REGEX", "pattern": "\\d+"}]}}]}"#;
        let registry = ProfileRegistry::from_json(json).unwrap();
        let result = registry.profiles()[0].resolve(&Document::new(["01/02/2024"]), &ExtractionContext::new());
        assert!(result.is_empty());
    }

    #[test]
    fn test_malformed_record_does_not_reject_profile() {
        let json = r#"{"profiles": [{"name": "x", "keywords": ["x"],
            "fields": {
                "date": [{"type": "FIXED", "line": "3", "segment": 1}],
                "total": [{"type": "VARIABLE", "ref_text": "TOTAL", "offset": 1, "segment": 1}]
            }}]}"#;
        let registry = ProfileRegistry::from_json(json).unwrap();

        let doc = Document::new(["FACTURA", "Fecha", "01/02/2024", "TOTAL", "121,00"]);
        let result = registry.profiles()[0].resolve(&doc, &ExtractionContext::new());
        assert_eq!(result.get(Field::Date), None);
        assert_eq!(result.amount(Field::Total), Some(Decimal::new(12100, 2)));
    }

    #[test]
    fn test_shared_keywords() {
        let mut registry = ProfileRegistry::new();
        registry
            .register(ExtractorProfile::new("a").with_keywords(["norte", "Sur"]))
            .unwrap();
        registry
            .register(ExtractorProfile::new("b").with_keywords(["sur"]))
            .unwrap();

        assert_eq!(registry.shared_keywords(), vec!["sur".to_string()]);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        std::fs::write(&path, RULES).unwrap();

        assert_eq!(ProfileRegistry::from_file(&path).unwrap().len(), 2);
        assert!(matches!(
            ProfileRegistry::from_file(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
