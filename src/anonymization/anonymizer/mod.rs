//! Per-record-type anonymizers
//!
//! Each record type that holds personal data registers one [`ModelAnonymizer`]
//! declaring its anonymizable fields (each with a [`FieldTransform`]) and its
//! outgoing [`Relation`]s. [`DeclaredAnonymizer`] is the configuration-driven
//! implementation; applications can register their own.
//!
//! A deleting anonymizer removes the whole record when it is anonymized. Its
//! fields and relations are not visited and the deletion cannot be reversed.

pub mod relation;
pub mod transform;

pub use relation::{Relation, RelationKind};
pub use transform::FieldTransform;

use crate::anonymization::encryption::EncryptionContext;
use crate::config::AnonymizerConfig;
use crate::domain::errors::CustodianError;
use crate::domain::ids::RecordType;
use crate::domain::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Anonymization capabilities of one record type
pub trait ModelAnonymizer: Send + Sync + fmt::Debug {
    /// Record type this anonymizer is registered for
    fn record_type(&self) -> &RecordType;

    /// Declared anonymizable fields and their transforms
    fn fields(&self) -> &BTreeMap<String, FieldTransform>;

    /// Declared outgoing relations by name
    fn relations(&self) -> &BTreeMap<String, Relation>;

    /// Whether anonymizations by this anonymizer can ever be reversed
    fn is_reversible(&self) -> bool {
        true
    }

    /// Whether anonymizing a record deletes it
    fn deletes_records(&self) -> bool {
        false
    }

    /// Looks up a relation by name
    fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations().get(name)
    }

    /// Transform of a declared field
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for undeclared fields.
    fn transform(&self, field: &str) -> Result<&FieldTransform> {
        self.fields().get(field).ok_or_else(|| {
            CustodianError::Configuration(format!(
                "Field '{field}' is not declared anonymizable on '{}'",
                self.record_type()
            ))
        })
    }

    /// Whether a scrub of `field` can be reversed
    fn is_field_reversible(&self, field: &str) -> bool {
        self.is_reversible()
            && self
                .fields()
                .get(field)
                .map_or(false, FieldTransform::is_reversible)
    }

    /// Anonymizes one field value
    ///
    /// Irreversible anonymizers encrypt under a throwaway context so even the
    /// reversible transforms cannot be undone.
    fn anonymize_value(&self, field: &str, value: &Value, context: &EncryptionContext) -> Result<Value> {
        let transform = self.transform(field)?;
        if self.is_reversible() {
            transform.anonymize(value, context)
        } else {
            transform.anonymize(value, &EncryptionContext::ephemeral())
        }
    }

    /// Restores one field value
    fn deanonymize_value(
        &self,
        field: &str,
        value: &Value,
        context: &EncryptionContext,
    ) -> Result<Value> {
        if !self.is_reversible() {
            return Err(CustodianError::Encryption(format!(
                "Anonymizer for '{}' is irreversible",
                self.record_type()
            )));
        }
        self.transform(field)?.deanonymize(value, context)
    }
}

/// Anonymizer declared from configuration (or built in code)
///
/// # Examples
///
/// ```
/// use custodian::anonymization::anonymizer::{DeclaredAnonymizer, FieldTransform, ModelAnonymizer};
/// use custodian::domain::ids::RecordType;
///
/// let anonymizer = DeclaredAnonymizer::new(RecordType::new("contact_form").unwrap())
///     .field("email", FieldTransform::Email)
///     .field("full_name", FieldTransform::Text)
///     .irreversible();
///
/// assert!(!anonymizer.is_field_reversible("email"));
/// ```
#[derive(Debug, Clone)]
pub struct DeclaredAnonymizer {
    record_type: RecordType,
    fields: BTreeMap<String, FieldTransform>,
    relations: BTreeMap<String, Relation>,
    reversible: bool,
    deletes: bool,
}

impl DeclaredAnonymizer {
    /// Creates an anonymizer with no fields or relations
    pub fn new(record_type: RecordType) -> Self {
        Self {
            record_type,
            fields: BTreeMap::new(),
            relations: BTreeMap::new(),
            reversible: true,
            deletes: false,
        }
    }

    /// Declares an anonymizable field
    pub fn field(mut self, name: impl Into<String>, transform: FieldTransform) -> Self {
        self.fields.insert(name.into(), transform);
        self
    }

    /// Declares a relation
    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    /// Marks every anonymization by this anonymizer as irreversible
    pub fn irreversible(mut self) -> Self {
        self.reversible = false;
        self
    }

    /// Deletes records instead of scrubbing their fields
    pub fn deleting(mut self) -> Self {
        self.deletes = true;
        self
    }

    /// Builds an anonymizer from its configuration section
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] if a name is declared both as a
    /// field and as a relation, or a relation target is not a valid record type.
    pub fn from_config(record_type: RecordType, config: &AnonymizerConfig) -> Result<Self> {
        let mut anonymizer = Self::new(record_type);
        anonymizer.reversible = config.reversible;
        anonymizer.deletes = config.delete;

        for (name, transform) in &config.fields {
            anonymizer = anonymizer.field(name.clone(), transform.clone());
        }

        for (name, relation) in &config.relations {
            if anonymizer.fields.contains_key(name) {
                return Err(CustodianError::Configuration(format!(
                    "'{name}' on '{}' is declared both as a field and as a relation",
                    anonymizer.record_type
                )));
            }
            let target = RecordType::new(relation.target.clone()).map_err(|e| {
                CustodianError::Configuration(format!(
                    "Relation '{name}' on '{}': {e}",
                    anonymizer.record_type
                ))
            })?;
            anonymizer =
                anonymizer.with_relation(Relation::new(name.clone(), target, relation.kind.clone()));
        }

        Ok(anonymizer)
    }
}

impl ModelAnonymizer for DeclaredAnonymizer {
    fn record_type(&self) -> &RecordType {
        &self.record_type
    }

    fn fields(&self) -> &BTreeMap<String, FieldTransform> {
        &self.fields
    }

    fn relations(&self) -> &BTreeMap<String, Relation> {
        &self.relations
    }

    fn is_reversible(&self) -> bool {
        self.reversible && !self.deletes
    }

    fn deletes_records(&self) -> bool {
        self.deletes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use serde_json::json;

    fn customer() -> DeclaredAnonymizer {
        DeclaredAnonymizer::new(RecordType::new("customer").unwrap())
            .field("first_name", FieldTransform::Text)
            .field("personal_id", FieldTransform::Hash)
            .with_relation(Relation::new(
                "emails",
                RecordType::new("email").unwrap(),
                RelationKind::Reverse {
                    field: "customer_id".to_string(),
                },
            ))
    }

    fn context() -> EncryptionContext {
        EncryptionContext::new(&secret_string("key".to_string()), "salt")
    }

    #[test]
    fn test_field_reversibility() {
        let anonymizer = customer();
        assert!(anonymizer.is_field_reversible("first_name"));
        assert!(!anonymizer.is_field_reversible("personal_id"));
        assert!(!anonymizer.is_field_reversible("unknown"));
        assert!(anonymizer.relation("emails").is_some());
    }

    #[test]
    fn test_deleting_anonymizer_is_irreversible() {
        let anonymizer = customer().deleting();
        assert!(anonymizer.deletes_records());
        assert!(!anonymizer.is_reversible());
        assert!(!anonymizer.is_field_reversible("first_name"));
        assert!(!customer().deletes_records());
    }

    #[test]
    fn test_undeclared_field_is_configuration_error() {
        let result = customer().anonymize_value("last_name", &json!("Doe"), &context());
        assert!(matches!(result, Err(CustodianError::Configuration(_))));
    }

    #[test]
    fn test_irreversible_anonymizer_ignores_context() {
        let anonymizer = customer().irreversible();
        let ctx = context();
        let anonymized = anonymizer.anonymize_value("first_name", &json!("Jane"), &ctx).unwrap();
        let reversible = customer().anonymize_value("first_name", &json!("Jane"), &ctx).unwrap();
        assert_ne!(anonymized, json!("Jane"));
        assert_ne!(anonymized, reversible);
        assert!(anonymizer.deanonymize_value("first_name", &anonymized, &ctx).is_err());
    }
}
