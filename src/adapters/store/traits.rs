//! Storage abstraction traits
//!
//! This module defines the storage contract the consent and anonymization core
//! relies on. Records of any type are addressed by [`RecordRef`]; the store is
//! responsible for atomicity of the operations documented as atomic.

use crate::domain::anonymized_data::AnonymizedData;
use crate::domain::ids::{PurposeSlug, RecordRef, RecordType};
use crate::domain::legal_reason::{ConsentKey, LegalReason, LegalReasonRelatedObject};
use crate::domain::record::Record;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Equality filter on one record field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    /// Field name
    pub field: String,

    /// Expected value
    pub value: Value,
}

impl FieldFilter {
    /// Creates an equality filter
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether `record` satisfies this filter
    ///
    /// Numbers and strings compare by their rendered form so that `"7"` matches a
    /// foreign key stored as `7`.
    pub fn matches(&self, record: &Record) -> bool {
        match (record.get(&self.field), &self.value) {
            (Some(Value::Number(n)), Value::String(s)) | (Some(Value::String(s)), Value::Number(n)) => {
                n.to_string() == *s
            }
            (Some(actual), expected) => actual == expected,
            (None, expected) => expected.is_null(),
        }
    }
}

/// Ledger side of a [`FieldMutation`]
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerChange {
    /// Insert active ledger rows; fields that already have one are left untouched
    Record {
        /// Scrubbed fields
        fields: Vec<String>,
        /// Legal reason whose expiry triggered the scrub
        expired_reason: Option<Uuid>,
        /// Fingerprint of the encryption context used
        key_fingerprint: Option<String>,
    },
    /// Deactivate active ledger rows; fields without one are left untouched
    Release {
        /// Restored fields
        fields: Vec<String>,
    },
}

/// Atomic change of one record's field values together with its ledger rows
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMutation {
    /// Record being changed
    pub target: RecordRef,

    /// New field values
    pub values: Map<String, Value>,

    /// Ledger rows to insert or deactivate
    pub ledger: LedgerChange,

    /// Timestamp written to the ledger rows
    pub at: DateTime<Utc>,
}

/// Result of applying a [`FieldMutation`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationOutcome {
    /// Fields whose value and ledger row were written
    pub applied: Vec<String>,

    /// Fields skipped because the ledger changed since the mutation was planned
    pub skipped: Vec<String>,
}

/// Request to create or renew the legal reason of one consent key
#[derive(Debug, Clone, PartialEq)]
pub struct ConsentUpsert {
    /// Natural key
    pub key: ConsentKey,

    /// Issue time used when inserting
    pub issued_at: DateTime<Utc>,

    /// New expiry
    pub expires_at: DateTime<Utc>,

    /// New tag
    pub tag: Option<String>,

    /// Current time (creation/update timestamps)
    pub now: DateTime<Utc>,
}

/// Query over legal reasons; unset fields do not filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LegalReasonFilter {
    /// Purpose must be one of these
    pub purpose_slugs: Option<Vec<PurposeSlug>>,

    /// Source record
    pub source: Option<RecordRef>,

    /// Active flag
    pub active: Option<bool>,

    /// `expires_at < t`
    pub expired_before: Option<DateTime<Utc>>,

    /// `expires_at > t`
    pub expires_after: Option<DateTime<Utc>>,

    /// `expires_at >= t`
    pub not_expired_at: Option<DateTime<Utc>>,

    /// Row id to leave out
    pub exclude_id: Option<Uuid>,
}

impl LegalReasonFilter {
    /// Filter on one consent key
    pub fn for_key(key: &ConsentKey) -> Self {
        Self {
            purpose_slugs: Some(vec![key.purpose_slug.clone()]),
            source: Some(key.source.clone()),
            ..Self::default()
        }
    }

    /// Filter on every legal reason of one source record
    pub fn for_source(source: &RecordRef) -> Self {
        Self {
            source: Some(source.clone()),
            ..Self::default()
        }
    }

    /// Restricts to rows that are active and not expired at `now`
    pub fn valid_at(mut self, now: DateTime<Utc>) -> Self {
        self.active = Some(true);
        self.not_expired_at = Some(now);
        self
    }

    /// Whether `reason` satisfies this filter
    pub fn matches(&self, reason: &LegalReason) -> bool {
        self.purpose_slugs
            .as_ref()
            .map_or(true, |slugs| slugs.contains(&reason.purpose_slug))
            && self.source.as_ref().map_or(true, |s| *s == reason.source)
            && self.active.map_or(true, |a| a == reason.is_active)
            && self.expired_before.map_or(true, |t| reason.expires_at < t)
            && self.expires_after.map_or(true, |t| reason.expires_at > t)
            && self.not_expired_at.map_or(true, |t| reason.expires_at >= t)
            && self.exclude_id.map_or(true, |id| id != reason.id)
    }
}

/// Record store: polymorphic resolution, relation queries and field writes
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Resolves a polymorphic reference
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the record does not exist.
    async fn get_record(&self, reference: &RecordRef) -> Result<Option<Record>>;

    /// Finds records of a type matching every filter
    ///
    /// Each call re-queries the store.
    async fn find_records(
        &self,
        record_type: &RecordType,
        filters: &[FieldFilter],
    ) -> Result<Vec<Record>>;

    /// Writes field values and ledger rows of one record in a single transaction
    ///
    /// The ledger is re-checked inside the transaction: a field that gained an
    /// active ledger row since planning (for [`LedgerChange::Record`]) or lost it
    /// (for [`LedgerChange::Release`]) is skipped, value included.
    ///
    /// # Errors
    ///
    /// Returns [`crate::domain::CustodianError::NotFound`] if the record is gone;
    /// nothing is written in that case.
    async fn apply_mutation(&self, mutation: FieldMutation) -> Result<MutationOutcome>;

    /// Deletes a record together with its ledger rows, in one transaction
    ///
    /// # Returns
    ///
    /// Returns `false` if the record did not exist.
    async fn delete_record(&self, reference: &RecordRef) -> Result<bool>;
}

/// Anonymized-field ledger queries
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Active ledger row for (record, field), if any
    async fn active_entry(&self, target: &RecordRef, field: &str) -> Result<Option<AnonymizedData>>;

    /// Every ledger row of a record, active or not
    async fn entries_for(&self, target: &RecordRef) -> Result<Vec<AnonymizedData>>;

    /// Deletes every ledger row of a record
    ///
    /// # Returns
    ///
    /// Returns the number of deleted rows.
    async fn purge_record(&self, target: &RecordRef) -> Result<usize>;
}

/// Legal reason and related-object persistence
#[async_trait]
pub trait LegalReasonStore: Send + Sync {
    /// Inserts or renews the legal reason of a consent key, atomically
    ///
    /// When rows already exist the latest-expiring one (active preferred) is
    /// renewed: new expiry and tag, `is_active = true`, original `issued_at` kept.
    ///
    /// # Returns
    ///
    /// Returns the stored row and whether it was newly created.
    async fn upsert_legal_reason(&self, upsert: ConsentUpsert) -> Result<(LegalReason, bool)>;

    /// Inserts a related object unless (legal reason, object) already exists
    async fn upsert_related_object(
        &self,
        legal_reason_id: Uuid,
        object: &RecordRef,
        now: DateTime<Utc>,
    ) -> Result<LegalReasonRelatedObject>;

    /// Legal reasons matching a filter
    async fn find_legal_reasons(&self, filter: &LegalReasonFilter) -> Result<Vec<LegalReason>>;

    /// Deactivates every legal reason matching a filter
    ///
    /// # Returns
    ///
    /// Returns the number of rows changed.
    async fn deactivate_matching(
        &self,
        filter: &LegalReasonFilter,
        now: DateTime<Utc>,
    ) -> Result<usize>;

    /// Consent keys held by more than one row, with their row count
    async fn duplicate_keys(&self) -> Result<Vec<(ConsentKey, usize)>>;

    /// Deletes legal reasons (and their related objects) by id
    async fn delete_legal_reasons(&self, ids: &[Uuid]) -> Result<usize>;

    /// Related objects, optionally restricted to one legal reason or one object
    async fn find_related_objects(
        &self,
        legal_reason_id: Option<Uuid>,
        object: Option<&RecordRef>,
    ) -> Result<Vec<LegalReasonRelatedObject>>;

    /// Deletes related objects by id
    async fn delete_related_objects(&self, ids: &[Uuid]) -> Result<usize>;
}
