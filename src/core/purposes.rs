//! Purpose registry
//!
//! A purpose is a named legal basis for keeping a category of personal data:
//! a retention window, a flag telling whether expiry must trigger
//! anonymization, and the field matrix of the data it covers. The registry is
//! built once from configuration and shared read-only afterwards.

use crate::anonymization::fields::{FieldMatrix, FieldSpec};
use crate::anonymization::registry::AnonymizerRegistry;
use crate::config::{ExpirationConfig, PurposeConfig};
use crate::domain::errors::CustodianError;
use crate::domain::ids::{PurposeSlug, RecordType};
use crate::domain::Result;
use chrono::{DateTime, Duration, Months, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// Calendar retention window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionWindow {
    /// Calendar years
    pub years: u32,
    /// Calendar months
    pub months: u32,
    /// Days
    pub days: u32,
}

impl RetentionWindow {
    /// Window of whole months
    pub fn months(months: u32) -> Self {
        Self {
            months,
            ..Self::default()
        }
    }

    /// Window of whole days
    pub fn days(days: u32) -> Self {
        Self {
            days,
            ..Self::default()
        }
    }

    /// End of the window starting at `start`
    ///
    /// Years and months are calendar arithmetic (clamped to the end of shorter
    /// months); days are added afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Validation`] if the result is out of range.
    pub fn add_to(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let months = self
            .years
            .checked_mul(12)
            .and_then(|m| m.checked_add(self.months))
            .ok_or_else(|| self.overflow())?;

        start
            .checked_add_months(Months::new(months))
            .and_then(|t| t.checked_add_signed(Duration::days(i64::from(self.days))))
            .ok_or_else(|| self.overflow())
    }

    fn overflow(&self) -> CustodianError {
        CustodianError::Validation(format!("Retention window {self} overflows the calendar"))
    }
}

impl From<ExpirationConfig> for RetentionWindow {
    fn from(config: ExpirationConfig) -> Self {
        Self {
            years: config.years,
            months: config.months,
            days: config.days,
        }
    }
}

impl fmt::Display for RetentionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}y{}m{}d", self.years, self.months, self.days)
    }
}

/// One registered purpose
#[derive(Debug, Clone, PartialEq)]
pub struct Purpose {
    /// Registry key
    pub slug: PurposeSlug,

    /// Display name
    pub name: String,

    /// Retention window added to the issue time of a consent
    pub window: RetentionWindow,

    /// Whether expiry must trigger anonymization
    pub retains_data: bool,

    /// Record type consents must be attached to, if restricted
    pub source_type: Option<RecordType>,

    /// Personal data covered, resolved against the source record's type
    pub fields: FieldMatrix,
}

impl Purpose {
    /// Creates a data-retaining purpose covering every declared field
    pub fn new(slug: PurposeSlug, name: impl Into<String>, window: RetentionWindow) -> Self {
        Self {
            slug,
            name: name.into(),
            window,
            retains_data: true,
            source_type: None,
            fields: FieldMatrix::all(),
        }
    }

    /// Sets the covered fields
    pub fn with_fields(mut self, fields: FieldMatrix) -> Self {
        self.fields = fields;
        self
    }

    /// Sets whether expiry triggers anonymization
    pub fn with_retains_data(mut self, retains_data: bool) -> Self {
        self.retains_data = retains_data;
        self
    }

    /// Restricts the purpose to one source record type
    pub fn with_source_type(mut self, source_type: RecordType) -> Self {
        self.source_type = Some(source_type);
        self
    }

    /// Builds a purpose from its configuration section
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for invalid slugs or source types.
    pub fn from_config(slug: &str, config: &PurposeConfig) -> Result<Self> {
        let slug = PurposeSlug::new(slug.to_string())
            .map_err(|e| CustodianError::Configuration(format!("[purposes]: {e}")))?;
        let source_type = config
            .source_type
            .as_ref()
            .map(|t| RecordType::new(t.clone()))
            .transpose()
            .map_err(|e| CustodianError::Configuration(format!("[purposes.{slug}]: {e}")))?;

        Ok(Self {
            slug,
            name: config.name.clone(),
            window: config.expiration.into(),
            retains_data: config.retains_data,
            source_type,
            fields: config.fields.clone(),
        })
    }

    /// Expiry of a consent issued at `issued_at`
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Validation`] if the date overflows.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.window.add_to(issued_at)
    }

    /// Checks that a consent of this purpose may be attached to `record_type`
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] on a source type mismatch.
    pub fn check_source_type(&self, record_type: &RecordType) -> Result<()> {
        match &self.source_type {
            Some(expected) if expected != record_type => Err(CustodianError::Configuration(format!(
                "Purpose '{}' applies to '{expected}' records, not '{record_type}'",
                self.slug
            ))),
            _ => Ok(()),
        }
    }

    /// Resolves the covered fields against a source record type
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for unknown fields or relations.
    pub fn field_spec(&self, record_type: &RecordType, registry: &AnonymizerRegistry) -> Result<FieldSpec> {
        self.check_source_type(record_type)?;
        FieldSpec::resolve(&self.fields, record_type, registry)
    }
}

/// Immutable purpose lookup table
#[derive(Debug, Clone, Default)]
pub struct PurposeRegistry {
    purposes: BTreeMap<PurposeSlug, Purpose>,
}

impl PurposeRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from `[purposes.<slug>]` sections
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for invalid sections.
    pub fn from_config(config: &BTreeMap<String, PurposeConfig>) -> Result<Self> {
        let mut registry = Self::new();
        for (slug, section) in config {
            registry.register(Purpose::from_config(slug, section)?)?;
        }
        Ok(registry)
    }

    /// Registers a purpose
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] if the slug is taken.
    pub fn register(&mut self, purpose: Purpose) -> Result<()> {
        if self.purposes.contains_key(&purpose.slug) {
            return Err(CustodianError::Configuration(format!(
                "Purpose '{}' is registered twice",
                purpose.slug
            )));
        }
        self.purposes.insert(purpose.slug.clone(), purpose);
        Ok(())
    }

    /// Looks up a purpose
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for unknown slugs.
    pub fn get(&self, slug: &PurposeSlug) -> Result<&Purpose> {
        self.purposes
            .get(slug)
            .ok_or_else(|| CustodianError::Configuration(format!("Unknown purpose '{slug}'")))
    }

    /// Slugs of purposes whose expiry triggers anonymization
    pub fn retaining_data_slugs(&self) -> Vec<PurposeSlug> {
        self.purposes
            .values()
            .filter(|p| p.retains_data)
            .map(|p| p.slug.clone())
            .collect()
    }

    /// All purposes, ordered by slug
    pub fn iter(&self) -> impl Iterator<Item = &Purpose> {
        self.purposes.values()
    }

    /// Number of purposes
    pub fn len(&self) -> usize {
        self.purposes.len()
    }

    /// Whether no purpose is registered
    pub fn is_empty(&self) -> bool {
        self.purposes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use test_case::test_case;

    fn slug(s: &str) -> PurposeSlug {
        PurposeSlug::new(s).unwrap()
    }

    #[test_case(RetentionWindow::months(6), "2024-07-15T10:00:00Z" ; "six months")]
    #[test_case(RetentionWindow::days(30), "2024-02-14T10:00:00Z" ; "thirty days")]
    #[test_case(RetentionWindow { years: 1, months: 1, days: 1 }, "2025-02-16T10:00:00Z" ; "mixed")]
    fn test_window_add(window: RetentionWindow, expected: &str) {
        let start = Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap();
        let expected: DateTime<Utc> = expected.parse().unwrap();
        assert_eq!(window.add_to(start).unwrap(), expected);
    }

    #[test]
    fn test_window_clamps_month_end() {
        let start = Utc.with_ymd_and_hms(2024, 8, 31, 0, 0, 0).unwrap();
        let end = RetentionWindow::months(6).add_to(start).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_unknown_purpose() {
        let registry = PurposeRegistry::new();
        assert!(matches!(
            registry.get(&slug("marketing")),
            Err(CustodianError::Configuration(_))
        ));
    }

    #[test]
    fn test_retaining_data_slugs() {
        let mut registry = PurposeRegistry::new();
        registry
            .register(Purpose::new(slug("billing"), "Billing", RetentionWindow::months(6)))
            .unwrap();
        registry
            .register(
                Purpose::new(slug("analytics"), "Analytics", RetentionWindow::days(10))
                    .with_retains_data(false),
            )
            .unwrap();

        assert_eq!(registry.retaining_data_slugs(), vec![slug("billing")]);
        assert!(registry
            .register(Purpose::new(slug("billing"), "Again", RetentionWindow::days(1)))
            .is_err());
    }

    #[test]
    fn test_source_type_mismatch() {
        let purpose = Purpose::new(slug("billing"), "Billing", RetentionWindow::months(6))
            .with_source_type(RecordType::new("payment").unwrap());

        assert!(purpose.check_source_type(&RecordType::new("payment").unwrap()).is_ok());
        assert!(purpose.check_source_type(&RecordType::new("customer").unwrap()).is_err());
    }
}
