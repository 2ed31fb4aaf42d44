//! Anonymizer registry
//!
//! Lookup table from record type to its [`ModelAnonymizer`]. Built once at
//! startup and shared read-only by the engine and the field resolver.

use crate::anonymization::anonymizer::{DeclaredAnonymizer, ModelAnonymizer};
use crate::config::AnonymizerConfig;
use crate::domain::errors::CustodianError;
use crate::domain::ids::RecordType;
use crate::domain::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Registered anonymizers keyed by record type
#[derive(Debug, Clone, Default)]
pub struct AnonymizerRegistry {
    anonymizers: HashMap<RecordType, Arc<dyn ModelAnonymizer>>,
}

impl AnonymizerRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from `[anonymizers.<type>]` configuration sections
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for invalid record types or
    /// relations pointing at unregistered types.
    pub fn from_config(config: &BTreeMap<String, AnonymizerConfig>) -> Result<Self> {
        let mut registry = Self::new();
        for (record_type, section) in config {
            let record_type = RecordType::new(record_type.clone())
                .map_err(|e| CustodianError::Configuration(format!("[anonymizers]: {e}")))?;
            registry.register(Arc::new(DeclaredAnonymizer::from_config(record_type, section)?))?;
        }
        registry.validate()?;
        Ok(registry)
    }

    /// Registers an anonymizer
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] if the record type already has one.
    pub fn register(&mut self, anonymizer: Arc<dyn ModelAnonymizer>) -> Result<()> {
        let record_type = anonymizer.record_type().clone();
        if self.anonymizers.contains_key(&record_type) {
            return Err(CustodianError::Configuration(format!(
                "An anonymizer for '{record_type}' is already registered"
            )));
        }
        self.anonymizers.insert(record_type, anonymizer);
        Ok(())
    }

    /// Anonymizer of a record type
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] if none is registered.
    pub fn get(&self, record_type: &RecordType) -> Result<Arc<dyn ModelAnonymizer>> {
        self.anonymizers.get(record_type).cloned().ok_or_else(|| {
            CustodianError::Configuration(format!(
                "No anonymizer registered for record type '{record_type}'"
            ))
        })
    }

    /// Whether a record type has an anonymizer
    pub fn contains(&self, record_type: &RecordType) -> bool {
        self.anonymizers.contains_key(record_type)
    }

    /// Registered record types, sorted
    pub fn record_types(&self) -> Vec<RecordType> {
        let mut types: Vec<_> = self.anonymizers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Number of registered anonymizers
    pub fn len(&self) -> usize {
        self.anonymizers.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.anonymizers.is_empty()
    }

    /// Checks that every relation targets a registered record type
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] naming the first dangling relation.
    pub fn validate(&self) -> Result<()> {
        for record_type in self.record_types() {
            let anonymizer = self.get(&record_type)?;
            for relation in anonymizer.relations().values() {
                if !self.contains(&relation.target) {
                    return Err(CustodianError::Configuration(format!(
                        "Relation '{}' on '{record_type}' targets '{}', which has no anonymizer",
                        relation.name, relation.target
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anonymization::anonymizer::{FieldTransform, Relation, RelationKind};

    fn record_type(name: &str) -> RecordType {
        RecordType::new(name).unwrap()
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = AnonymizerRegistry::new();
        registry
            .register(Arc::new(
                DeclaredAnonymizer::new(record_type("customer")).field("first_name", FieldTransform::Text),
            ))
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.get(&record_type("customer")).is_ok());
        assert!(matches!(
            registry.get(&record_type("invoice")),
            Err(CustodianError::Configuration(_))
        ));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = AnonymizerRegistry::new();
        let anonymizer = Arc::new(DeclaredAnonymizer::new(record_type("customer")));
        registry.register(anonymizer.clone()).unwrap();
        assert!(registry.register(anonymizer).is_err());
    }

    #[test]
    fn test_validate_dangling_relation() {
        let mut registry = AnonymizerRegistry::new();
        registry
            .register(Arc::new(DeclaredAnonymizer::new(record_type("customer")).with_relation(
                Relation::new(
                    "emails",
                    record_type("email"),
                    RelationKind::Reverse {
                        field: "customer_id".to_string(),
                    },
                ),
            )))
            .unwrap();

        let err = registry.validate().unwrap_err();
        assert!(err.to_string().contains("emails"));
    }
}
