//! Anonymization engine
//!
//! This module provides the [`AnonymizationEngine`], which walks a resolved
//! [`FieldSpec`] tree across related records, dispatches every field to the
//! anonymizer registered for its record type and records the outcome in the
//! anonymized-field ledger.
//!
//! # Architecture
//!
//! Every call runs in two phases:
//! - **Plan**: resolve the target, walk relations (local fields before relations
//!   at each node) and compute every new value without writing anything
//! - **Apply**: commit one [`FieldMutation`] per record, values and ledger rows
//!   together (or delete the record when its anonymizer deletes records), then
//!   write the audit trail
//!
//! A malformed value, an irreversible field or a reversal under the wrong
//! encryption context therefore fails the call before any record is touched.
//!
//! # Examples
//!
//! ```no_run
//! use custodian::adapters::memory::MemoryStore;
//! use custodian::anonymization::{AnonymizationEngine, AnonymizerRegistry, EncryptionContext};
//! use custodian::config::secret_string;
//! use custodian::domain::ids::RecordRef;
//! use std::sync::Arc;
//!
//! # async fn example(registry: AnonymizerRegistry) -> custodian::domain::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let engine = AnonymizationEngine::new(Arc::new(registry), store.clone(), store);
//!
//! let context = EncryptionContext::new(&secret_string("base-key".to_string()), "request-17");
//! let customer: RecordRef = "customer:42".parse().map_err(custodian::domain::CustodianError::Validation)?;
//! engine.anonymize(&customer, None, &context).await?;
//! engine.deanonymize(&customer, None, &context).await?;
//! # Ok(())
//! # }
//! ```

use crate::adapters::store::{FieldMutation, LedgerChange, LedgerStore, RecordStore};
use crate::anonymization::anonymizer::ModelAnonymizer;
use crate::anonymization::audit::{AuditEvent, AuditLogger, AuditOperation};
use crate::anonymization::encryption::EncryptionContext;
use crate::anonymization::fields::{FieldMatrix, FieldSpec};
use crate::anonymization::registry::AnonymizerRegistry;
use crate::domain::errors::CustodianError;
use crate::domain::ids::RecordRef;
use crate::domain::legal_reason::LegalReason;
use crate::domain::record::Record;
use crate::domain::Result;
use chrono::Utc;
use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Anonymize,
    Deanonymize,
}

impl Direction {
    fn audit_operation(self) -> AuditOperation {
        match self {
            Direction::Anonymize => AuditOperation::Anonymize,
            Direction::Deanonymize => AuditOperation::Deanonymize,
        }
    }
}

/// Planned change of one record
struct PlanStep {
    record: Record,
    anonymizer: Arc<dyn ModelAnonymizer>,
    fields: Vec<String>,
    delete: bool,
}

/// Summary of one anonymize/deanonymize call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnonymizationOutcome {
    /// Records reached through the field spec
    pub records_visited: usize,

    /// Fields whose value and ledger row were written
    pub fields_changed: usize,

    /// Fields left alone (already in the requested state)
    pub fields_skipped: usize,

    /// Records removed by deleting anonymizers
    pub records_deleted: usize,

    /// Wall-clock time of the call
    pub duration: Duration,
}

impl AnonymizationOutcome {
    /// Whether the call changed anything
    pub fn changed_anything(&self) -> bool {
        self.fields_changed > 0 || self.records_deleted > 0
    }
}

/// Anonymization engine
///
/// Thread-safe; share it across tasks with `Arc`.
pub struct AnonymizationEngine {
    registry: Arc<AnonymizerRegistry>,
    records: Arc<dyn RecordStore>,
    ledger: Arc<dyn LedgerStore>,
    audit_logger: Option<Arc<AuditLogger>>,
}

impl AnonymizationEngine {
    /// Create a new anonymization engine
    ///
    /// # Arguments
    ///
    /// * `registry` - Anonymizers by record type
    /// * `records` - Record store holding the data to scrub
    /// * `ledger` - Anonymized-field ledger
    pub fn new(
        registry: Arc<AnonymizerRegistry>,
        records: Arc<dyn RecordStore>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        Self {
            registry,
            records,
            ledger,
            audit_logger: None,
        }
    }

    /// Writes every committed mutation to an audit log
    pub fn with_audit_logger(mut self, audit_logger: Arc<AuditLogger>) -> Self {
        self.audit_logger = Some(audit_logger);
        self
    }

    /// Anonymizer registry in use
    pub fn registry(&self) -> &AnonymizerRegistry {
        &self.registry
    }

    /// Resolves a matrix against the type of `target`, `None` meaning every local field
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for unknown fields or relations.
    pub fn resolve(&self, target: &RecordRef, fields: Option<&FieldMatrix>) -> Result<FieldSpec> {
        match fields {
            Some(matrix) => FieldSpec::resolve(matrix, &target.record_type, &self.registry),
            None => {
                self.registry.get(&target.record_type)?;
                Ok(FieldSpec::all(target.record_type.clone()))
            }
        }
    }

    /// Anonymize fields of a record and of its related records
    ///
    /// Fields that already have an active ledger row are skipped, so repeated
    /// calls are no-ops.
    ///
    /// # Arguments
    ///
    /// * `target` - Record to anonymize
    /// * `fields` - Field matrix; `None` anonymizes every declared local field
    /// * `context` - Encryption context shared by the whole tree
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for unknown fields or relations,
    /// [`CustodianError::NotFound`] if the record or a referenced record is
    /// missing, and [`CustodianError::Encryption`] for malformed values. Nothing
    /// is written when an error is returned before the apply phase.
    pub async fn anonymize(
        &self,
        target: &RecordRef,
        fields: Option<&FieldMatrix>,
        context: &EncryptionContext,
    ) -> Result<AnonymizationOutcome> {
        let spec = self.resolve(target, fields)?;
        self.anonymize_spec(target, &spec, context, None).await
    }

    /// Anonymize every declared local field of a record
    pub async fn anonymize_all(
        &self,
        target: &RecordRef,
        context: &EncryptionContext,
    ) -> Result<AnonymizationOutcome> {
        self.anonymize(target, None, context).await
    }

    /// Anonymize with an already resolved spec
    ///
    /// `expired_reason` is stored on the ledger rows when the scrub is caused by
    /// the expiry of a legal reason.
    pub async fn anonymize_spec(
        &self,
        target: &RecordRef,
        spec: &FieldSpec,
        context: &EncryptionContext,
        expired_reason: Option<&LegalReason>,
    ) -> Result<AnonymizationOutcome> {
        self.run(
            target,
            spec,
            context,
            Direction::Anonymize,
            expired_reason.map(|r| r.id),
        )
        .await
    }

    /// Restore anonymized fields of a record and of its related records
    ///
    /// Fields without an active ledger row are skipped. Restored fields' ledger
    /// rows are deactivated, never deleted.
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::IrreversibleAnonymizer`] if any targeted field
    /// was scrubbed irreversibly, and [`CustodianError::Encryption`] if a field
    /// was scrubbed under a different encryption context. In both cases no
    /// record is modified.
    pub async fn deanonymize(
        &self,
        target: &RecordRef,
        fields: Option<&FieldMatrix>,
        context: &EncryptionContext,
    ) -> Result<AnonymizationOutcome> {
        let spec = self.resolve(target, fields)?;
        self.deanonymize_spec(target, &spec, context).await
    }

    /// Restore every declared local field of a record
    pub async fn deanonymize_all(
        &self,
        target: &RecordRef,
        context: &EncryptionContext,
    ) -> Result<AnonymizationOutcome> {
        self.deanonymize(target, None, context).await
    }

    /// Deanonymize with an already resolved spec
    pub async fn deanonymize_spec(
        &self,
        target: &RecordRef,
        spec: &FieldSpec,
        context: &EncryptionContext,
    ) -> Result<AnonymizationOutcome> {
        self.run(target, spec, context, Direction::Deanonymize, None).await
    }

    async fn run(
        &self,
        target: &RecordRef,
        spec: &FieldSpec,
        context: &EncryptionContext,
        direction: Direction,
        expired_reason: Option<Uuid>,
    ) -> Result<AnonymizationOutcome> {
        let start = Instant::now();

        if spec.record_type != target.record_type {
            return Err(CustodianError::Configuration(format!(
                "Field spec for '{}' cannot be applied to {target}",
                spec.record_type
            )));
        }

        let record = self
            .records
            .get_record(target)
            .await?
            .ok_or_else(|| CustodianError::record_not_found(target))?;

        let fingerprint = context.fingerprint();
        let mut steps = Vec::new();
        let mut outcome = AnonymizationOutcome::default();
        self.plan(record, spec, direction, &fingerprint, &mut steps, &mut outcome)
            .await?;

        let mut mutations = Vec::with_capacity(steps.len());
        for step in &steps {
            mutations.push(if step.delete || step.fields.is_empty() {
                None
            } else {
                Some(self.compute(step, context, direction, expired_reason)?)
            });
        }

        for (step, mutation) in steps.iter().zip(mutations) {
            if step.delete {
                if self.records.delete_record(&step.record.reference).await? {
                    outcome.records_deleted += 1;
                    let fields: Vec<String> = step.record.fields.keys().cloned().collect();
                    self.audit(step, &fields, AuditOperation::Delete, expired_reason);
                }
                continue;
            }
            let Some(mutation) = mutation else {
                continue;
            };

            let applied = self.records.apply_mutation(mutation).await?;
            outcome.fields_changed += applied.applied.len();
            outcome.fields_skipped += applied.skipped.len();
            if !applied.skipped.is_empty() {
                tracing::debug!(
                    record = %step.record.reference,
                    fields = ?applied.skipped,
                    "Ledger changed concurrently, fields skipped"
                );
            }
            if !applied.applied.is_empty() {
                self.audit(step, &applied.applied, direction.audit_operation(), expired_reason);
            }
        }

        outcome.duration = start.elapsed();
        tracing::debug!(
            record = %target,
            operation = direction.audit_operation().as_str(),
            records = outcome.records_visited,
            changed = outcome.fields_changed,
            skipped = outcome.fields_skipped,
            deleted = outcome.records_deleted,
            duration_ms = outcome.duration.as_millis() as u64,
            "Anonymization call completed"
        );
        Ok(outcome)
    }

    /// Walks the spec tree collecting one step per reached record
    fn plan<'a>(
        &'a self,
        record: Record,
        spec: &'a FieldSpec,
        direction: Direction,
        fingerprint: &'a str,
        steps: &'a mut Vec<PlanStep>,
        outcome: &'a mut AnonymizationOutcome,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let anonymizer = self.registry.get(record.record_type())?;
            outcome.records_visited += 1;

            if anonymizer.deletes_records() {
                // Deleted records are gone; one that still exists was never anonymized
                if direction == Direction::Anonymize {
                    steps.push(PlanStep {
                        record,
                        anonymizer,
                        fields: Vec::new(),
                        delete: true,
                    });
                }
                return Ok(());
            }

            let mut fields = Vec::new();
            for field in spec.local_field_names(anonymizer.as_ref()) {
                let entry = self.ledger.active_entry(&record.reference, &field).await?;
                match (direction, entry) {
                    (Direction::Anonymize, None) => fields.push(field),
                    (Direction::Deanonymize, Some(entry)) => {
                        if !anonymizer.is_field_reversible(&field) {
                            return Err(CustodianError::IrreversibleAnonymizer {
                                record: record.reference.clone(),
                                field,
                            });
                        }
                        if !entry.accepts_fingerprint(fingerprint) {
                            return Err(CustodianError::Encryption(format!(
                                "{}.{field} was anonymized under a different encryption context",
                                record.reference
                            )));
                        }
                        fields.push(field);
                    }
                    _ => outcome.fields_skipped += 1,
                }
            }

            let mut children = Vec::new();
            for (name, nested) in &spec.related {
                let relation = anonymizer.relation(name).ok_or_else(|| {
                    CustodianError::Configuration(format!(
                        "Unknown relation '{name}' on '{}'",
                        record.record_type()
                    ))
                })?;
                let target_deletes = self.registry.get(&relation.target)?.deletes_records();
                let related = match relation.related_records(self.records.as_ref(), &record).await {
                    Ok(related) => related,
                    // Reference to a record a deleting anonymizer already removed
                    Err(e) if e.is_not_found() && target_deletes => Vec::new(),
                    Err(e) => return Err(e),
                };
                children.extend(related.into_iter().map(|r| (r, nested)));
            }

            steps.push(PlanStep {
                record,
                anonymizer,
                fields,
                delete: false,
            });

            for (related, nested) in children {
                self.plan(related, nested, direction, fingerprint, &mut *steps, &mut *outcome)
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Computes the new values of one planned step
    fn compute(
        &self,
        step: &PlanStep,
        context: &EncryptionContext,
        direction: Direction,
        expired_reason: Option<Uuid>,
    ) -> Result<FieldMutation> {
        let mut values = Map::new();
        for field in &step.fields {
            let Some(current) = step.record.get(field) else {
                continue;
            };
            let value = match direction {
                Direction::Anonymize => step.anonymizer.anonymize_value(field, current, context),
                Direction::Deanonymize => step.anonymizer.deanonymize_value(field, current, context),
            }
            .map_err(|e| match e {
                CustodianError::Encryption(msg) => CustodianError::Encryption(format!(
                    "{}.{field}: {msg}",
                    step.record.reference
                )),
                other => other,
            })?;
            values.insert(field.clone(), value);
        }

        let ledger = match direction {
            Direction::Anonymize => LedgerChange::Record {
                fields: step.fields.clone(),
                expired_reason,
                key_fingerprint: Some(context.fingerprint()),
            },
            Direction::Deanonymize => LedgerChange::Release {
                fields: step.fields.clone(),
            },
        };

        Ok(FieldMutation {
            target: step.record.reference.clone(),
            values,
            ledger,
            at: Utc::now(),
        })
    }

    fn audit(
        &self,
        step: &PlanStep,
        applied: &[String],
        operation: AuditOperation,
        legal_reason: Option<Uuid>,
    ) {
        let Some(logger) = &self.audit_logger else {
            return;
        };

        let event = AuditEvent {
            operation,
            record: &step.record.reference,
            fields: applied
                .iter()
                .map(|field| (field.as_str(), step.record.get(field).unwrap_or(&Value::Null)))
                .collect(),
            legal_reason,
            timestamp: Utc::now(),
        };
        if let Err(e) = logger.log_event(&event) {
            tracing::error!(
                record = %step.record.reference,
                error = %format!("{e:#}"),
                "Failed to write audit entry"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStore;
    use crate::anonymization::anonymizer::{DeclaredAnonymizer, FieldTransform};
    use crate::config::secret_string;
    use crate::domain::ids::RecordType;
    use serde_json::json;

    fn customer_ref() -> RecordRef {
        RecordRef::new(RecordType::new("customer").unwrap(), "1")
    }

    async fn setup() -> (AnonymizationEngine, Arc<MemoryStore>) {
        let mut registry = AnonymizerRegistry::new();
        registry
            .register(Arc::new(
                DeclaredAnonymizer::new(RecordType::new("customer").unwrap())
                    .field("first_name", FieldTransform::Text)
                    .field("last_name", FieldTransform::Text)
                    .field("personal_id", FieldTransform::Hash),
            ))
            .unwrap();

        let store = Arc::new(MemoryStore::new());
        store
            .insert_record(
                Record::new(customer_ref())
                    .with_field("first_name", json!("Ada"))
                    .with_field("last_name", json!("Lovelace"))
                    .with_field("personal_id", json!("815210/1234")),
            )
            .await;

        let engine = AnonymizationEngine::new(Arc::new(registry), store.clone(), store.clone());
        (engine, store)
    }

    fn context() -> EncryptionContext {
        EncryptionContext::new(&secret_string("base".to_string()), "salt")
    }

    #[tokio::test]
    async fn test_anonymize_is_idempotent() {
        let (engine, store) = setup().await;
        let fields = FieldMatrix::fields(["first_name"]);

        let first = engine.anonymize(&customer_ref(), Some(&fields), &context()).await.unwrap();
        assert_eq!(first.fields_changed, 1);
        let after_first = store.get_record(&customer_ref()).await.unwrap();

        let second = engine.anonymize(&customer_ref(), Some(&fields), &context()).await.unwrap();
        assert_eq!(second.fields_changed, 0);
        assert_eq!(second.fields_skipped, 1);
        assert_eq!(store.get_record(&customer_ref()).await.unwrap(), after_first);
        assert_eq!(store.entries_for(&customer_ref()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_irreversible_field_blocks_whole_call() {
        let (engine, store) = setup().await;
        engine.anonymize_all(&customer_ref(), &context()).await.unwrap();
        let scrubbed = store.get_record(&customer_ref()).await.unwrap();

        let err = engine.deanonymize_all(&customer_ref(), &context()).await.unwrap_err();
        assert!(matches!(
            err,
            CustodianError::IrreversibleAnonymizer { ref field, .. } if field == "personal_id"
        ));
        assert_eq!(store.get_record(&customer_ref()).await.unwrap(), scrubbed);

        let names = FieldMatrix::fields(["first_name", "last_name"]);
        engine.deanonymize(&customer_ref(), Some(&names), &context()).await.unwrap();
        let restored = store.get_record(&customer_ref()).await.unwrap().unwrap();
        assert_eq!(restored.get("first_name"), Some(&json!("Ada")));
        assert_eq!(restored.get("last_name"), Some(&json!("Lovelace")));
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let (engine, _) = setup().await;
        let missing = RecordRef::new(RecordType::new("customer").unwrap(), "404");
        let err = engine.anonymize_all(&missing, &context()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_spec_for_other_type_rejected() {
        let (engine, _) = setup().await;
        let spec = FieldSpec::all(RecordType::new("payment").unwrap());
        let result = engine.anonymize_spec(&customer_ref(), &spec, &context(), None).await;
        assert!(matches!(result, Err(CustodianError::Configuration(_))));
    }
}
