//! In-memory store
//!
//! Implements [`RecordStore`], [`LedgerStore`] and [`LegalReasonStore`] over a
//! single set of tables behind one lock: every trait call runs as one
//! transaction.

use super::snapshot::Snapshot;
use crate::adapters::store::{
    ConsentUpsert, FieldFilter, FieldMutation, LedgerChange, LedgerStore, LegalReasonFilter,
    LegalReasonStore, MutationOutcome, RecordStore,
};
use crate::domain::anonymized_data::AnonymizedData;
use crate::domain::errors::CustodianError;
use crate::domain::ids::{RecordRef, RecordType};
use crate::domain::legal_reason::{ConsentKey, LegalReason, LegalReasonRelatedObject};
use crate::domain::record::Record;
use crate::domain::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<RecordRef, Record>,
    legal_reasons: Vec<LegalReason>,
    related_objects: Vec<LegalReasonRelatedObject>,
    ledger: Vec<AnonymizedData>,
}

impl Tables {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            records: snapshot
                .records
                .into_iter()
                .map(|record| (record.reference.clone(), record))
                .collect(),
            legal_reasons: snapshot.legal_reasons,
            related_objects: snapshot.related_objects,
            ledger: snapshot.anonymized_data,
        }
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            records: self.records.values().cloned().collect(),
            legal_reasons: self.legal_reasons.clone(),
            related_objects: self.related_objects.clone(),
            anonymized_data: self.ledger.clone(),
        }
    }

    fn has_active_entry(&self, target: &RecordRef, field: &str) -> bool {
        self.ledger.iter().any(|entry| entry.is_active_for(target, field))
    }
}

/// Store keeping every table in memory
///
/// # Examples
///
/// ```
/// use custodian::adapters::memory::MemoryStore;
/// use custodian::adapters::store::RecordStore;
/// use custodian::domain::ids::{RecordRef, RecordType};
/// use custodian::domain::record::Record;
///
/// # async fn example() -> custodian::domain::Result<()> {
/// let store = MemoryStore::new();
/// let reference = RecordRef::new(RecordType::new("customer").unwrap(), "1");
/// store.insert_record(Record::new(reference.clone())).await;
/// assert!(store.get_record(&reference).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding the content of a snapshot
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            tables: RwLock::new(Tables::from_snapshot(snapshot)),
        }
    }

    /// Opens a snapshot file; a missing file yields an empty store
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_snapshot(Snapshot::load_or_default(path)?))
    }

    /// Copies the current content into a snapshot
    pub async fn snapshot(&self) -> Snapshot {
        self.tables.read().await.to_snapshot()
    }

    /// Saves the current content to a snapshot file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let snapshot = self.snapshot().await;
        snapshot.save(path)?;
        tracing::debug!(
            path = %path.display(),
            records = snapshot.records.len(),
            legal_reasons = snapshot.legal_reasons.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Inserts or replaces a record
    pub async fn insert_record(&self, record: Record) {
        let mut tables = self.tables.write().await;
        tables.records.insert(record.reference.clone(), record);
    }

    /// Removes a record; ledger and consent rows are left to the caller
    pub async fn remove_record(&self, reference: &RecordRef) -> Option<Record> {
        self.tables.write().await.records.remove(reference)
    }

    /// Inserts a legal reason row as-is, bypassing upsert rules
    ///
    /// Used to import existing data, which may contain duplicate keys.
    pub async fn insert_legal_reason(&self, reason: LegalReason) {
        self.tables.write().await.legal_reasons.push(reason);
    }

    /// Inserts a related-object row as-is
    pub async fn insert_related_object(&self, related: LegalReasonRelatedObject) {
        self.tables.write().await.related_objects.push(related);
    }

    /// Number of stored records
    pub async fn record_count(&self) -> usize {
        self.tables.read().await.records.len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_record(&self, reference: &RecordRef) -> Result<Option<Record>> {
        Ok(self.tables.read().await.records.get(reference).cloned())
    }

    async fn find_records(
        &self,
        record_type: &RecordType,
        filters: &[FieldFilter],
    ) -> Result<Vec<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .records
            .values()
            .filter(|record| record.record_type() == record_type)
            .filter(|record| filters.iter().all(|filter| filter.matches(record)))
            .cloned()
            .collect())
    }

    async fn apply_mutation(&self, mutation: FieldMutation) -> Result<MutationOutcome> {
        let mut tables = self.tables.write().await;
        if !tables.records.contains_key(&mutation.target) {
            return Err(CustodianError::record_not_found(&mutation.target));
        }

        let mut outcome = MutationOutcome::default();
        let (fields, recording) = match &mutation.ledger {
            LedgerChange::Record { fields, .. } => (fields, true),
            LedgerChange::Release { fields } => (fields, false),
        };
        for field in fields {
            // Recording needs no active row yet, releasing needs one
            if tables.has_active_entry(&mutation.target, field) != recording {
                outcome.applied.push(field.clone());
            } else {
                outcome.skipped.push(field.clone());
            }
        }

        if let Some(record) = tables.records.get_mut(&mutation.target) {
            for field in &outcome.applied {
                if let Some(value) = mutation.values.get(field) {
                    record.fields.insert(field.clone(), value.clone());
                }
            }
        }

        match mutation.ledger {
            LedgerChange::Record {
                expired_reason,
                key_fingerprint,
                ..
            } => {
                for field in &outcome.applied {
                    tables.ledger.push(
                        AnonymizedData::new(
                            mutation.target.clone(),
                            field.clone(),
                            expired_reason,
                            mutation.at,
                        )
                        .with_key_fingerprint(key_fingerprint.clone()),
                    );
                }
            }
            LedgerChange::Release { .. } => {
                for entry in tables.ledger.iter_mut() {
                    if entry.is_active
                        && entry.target == mutation.target
                        && outcome.applied.contains(&entry.field)
                    {
                        entry.is_active = false;
                        entry.updated_at = mutation.at;
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn delete_record(&self, reference: &RecordRef) -> Result<bool> {
        let mut tables = self.tables.write().await;
        if tables.records.remove(reference).is_none() {
            return Ok(false);
        }
        tables.ledger.retain(|entry| &entry.target != reference);
        Ok(true)
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn active_entry(&self, target: &RecordRef, field: &str) -> Result<Option<AnonymizedData>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ledger
            .iter()
            .find(|entry| entry.is_active_for(target, field))
            .cloned())
    }

    async fn entries_for(&self, target: &RecordRef) -> Result<Vec<AnonymizedData>> {
        let tables = self.tables.read().await;
        Ok(tables
            .ledger
            .iter()
            .filter(|entry| &entry.target == target)
            .cloned()
            .collect())
    }

    async fn purge_record(&self, target: &RecordRef) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let before = tables.ledger.len();
        tables.ledger.retain(|entry| &entry.target != target);
        Ok(before - tables.ledger.len())
    }
}

#[async_trait]
impl LegalReasonStore for MemoryStore {
    async fn upsert_legal_reason(&self, upsert: ConsentUpsert) -> Result<(LegalReason, bool)> {
        let mut tables = self.tables.write().await;
        let filter = LegalReasonFilter::for_key(&upsert.key);

        let existing = tables
            .legal_reasons
            .iter_mut()
            .filter(|reason| filter.matches(reason))
            .max_by_key(|reason| (reason.is_active, reason.expires_at, reason.updated_at));

        if let Some(reason) = existing {
            reason.expires_at = upsert.expires_at;
            reason.tag = upsert.tag;
            reason.is_active = true;
            reason.updated_at = upsert.now;
            return Ok((reason.clone(), false));
        }

        let reason = LegalReason {
            id: Uuid::new_v4(),
            purpose_slug: upsert.key.purpose_slug,
            source: upsert.key.source,
            issued_at: upsert.issued_at,
            expires_at: upsert.expires_at,
            tag: upsert.tag,
            is_active: true,
            created_at: upsert.now,
            updated_at: upsert.now,
        };
        tables.legal_reasons.push(reason.clone());
        Ok((reason, true))
    }

    async fn upsert_related_object(
        &self,
        legal_reason_id: Uuid,
        object: &RecordRef,
        now: DateTime<Utc>,
    ) -> Result<LegalReasonRelatedObject> {
        let mut tables = self.tables.write().await;
        if !tables.legal_reasons.iter().any(|r| r.id == legal_reason_id) {
            return Err(CustodianError::NotFound(format!(
                "legal reason {legal_reason_id} does not exist"
            )));
        }

        if let Some(related) = tables
            .related_objects
            .iter_mut()
            .find(|r| r.legal_reason_id == legal_reason_id && &r.object == object)
        {
            related.updated_at = now;
            return Ok(related.clone());
        }

        let related = LegalReasonRelatedObject {
            id: Uuid::new_v4(),
            legal_reason_id,
            object: object.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.related_objects.push(related.clone());
        Ok(related)
    }

    async fn find_legal_reasons(&self, filter: &LegalReasonFilter) -> Result<Vec<LegalReason>> {
        let tables = self.tables.read().await;
        Ok(tables
            .legal_reasons
            .iter()
            .filter(|reason| filter.matches(reason))
            .cloned()
            .collect())
    }

    async fn deactivate_matching(
        &self,
        filter: &LegalReasonFilter,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;
        for reason in tables.legal_reasons.iter_mut().filter(|r| filter.matches(r)) {
            if reason.is_active {
                reason.is_active = false;
                reason.updated_at = now;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn duplicate_keys(&self) -> Result<Vec<(ConsentKey, usize)>> {
        let tables = self.tables.read().await;
        let mut counts: BTreeMap<ConsentKey, usize> = BTreeMap::new();
        for reason in &tables.legal_reasons {
            *counts.entry(reason.key()).or_default() += 1;
        }
        Ok(counts.into_iter().filter(|(_, count)| *count > 1).collect())
    }

    async fn delete_legal_reasons(&self, ids: &[Uuid]) -> Result<usize> {
        let ids: HashSet<&Uuid> = ids.iter().collect();
        let mut tables = self.tables.write().await;
        let before = tables.legal_reasons.len();
        tables.legal_reasons.retain(|r| !ids.contains(&r.id));
        tables
            .related_objects
            .retain(|r| !ids.contains(&r.legal_reason_id));
        Ok(before - tables.legal_reasons.len())
    }

    async fn find_related_objects(
        &self,
        legal_reason_id: Option<Uuid>,
        object: Option<&RecordRef>,
    ) -> Result<Vec<LegalReasonRelatedObject>> {
        let tables = self.tables.read().await;
        Ok(tables
            .related_objects
            .iter()
            .filter(|r| legal_reason_id.map_or(true, |id| r.legal_reason_id == id))
            .filter(|r| object.map_or(true, |o| &r.object == o))
            .cloned()
            .collect())
    }

    async fn delete_related_objects(&self, ids: &[Uuid]) -> Result<usize> {
        let ids: HashSet<&Uuid> = ids.iter().collect();
        let mut tables = self.tables.write().await;
        let before = tables.related_objects.len();
        tables.related_objects.retain(|r| !ids.contains(&r.id));
        Ok(before - tables.related_objects.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::PurposeSlug;
    use chrono::Duration;
    use serde_json::{json, Map};

    fn customer(id: &str) -> RecordRef {
        RecordRef::new(RecordType::new("customer").unwrap(), id)
    }

    async fn store_with_customer() -> MemoryStore {
        let store = MemoryStore::new();
        store
            .insert_record(
                Record::new(customer("1"))
                    .with_field("first_name", json!("Ada"))
                    .with_field("last_name", json!("Lovelace")),
            )
            .await;
        store
    }

    fn scrub(fields: &[&str], values: Map<String, serde_json::Value>) -> FieldMutation {
        FieldMutation {
            target: customer("1"),
            values,
            ledger: LedgerChange::Record {
                fields: fields.iter().map(|f| f.to_string()).collect(),
                expired_reason: None,
                key_fingerprint: Some("f1".to_string()),
            },
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_apply_mutation_writes_values_and_ledger() {
        let store = store_with_customer().await;
        let mut values = Map::new();
        values.insert("first_name".to_string(), json!("Xyz"));

        let outcome = store.apply_mutation(scrub(&["first_name"], values)).await.unwrap();
        assert_eq!(outcome.applied, vec!["first_name".to_string()]);

        let record = store.get_record(&customer("1")).await.unwrap().unwrap();
        assert_eq!(record.get("first_name"), Some(&json!("Xyz")));
        assert_eq!(record.get("last_name"), Some(&json!("Lovelace")));
        assert!(store.active_entry(&customer("1"), "first_name").await.unwrap().is_some());
        assert!(store.active_entry(&customer("1"), "last_name").await.unwrap().is_none());

        let entry = store.active_entry(&customer("1"), "first_name").await.unwrap().unwrap();
        assert_eq!(entry.key_fingerprint.as_deref(), Some("f1"));
    }

    #[tokio::test]
    async fn test_apply_mutation_rechecks_ledger() {
        let store = store_with_customer().await;
        let mut values = Map::new();
        values.insert("first_name".to_string(), json!("Xyz"));
        store.apply_mutation(scrub(&["first_name"], values)).await.unwrap();

        let mut again = Map::new();
        again.insert("first_name".to_string(), json!("Abc"));
        let outcome = store.apply_mutation(scrub(&["first_name"], again)).await.unwrap();
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.skipped, vec!["first_name".to_string()]);

        let record = store.get_record(&customer("1")).await.unwrap().unwrap();
        assert_eq!(record.get("first_name"), Some(&json!("Xyz")));
        assert_eq!(store.entries_for(&customer("1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_mutation_missing_record() {
        let store = MemoryStore::new();
        let err = store.apply_mutation(scrub(&["first_name"], Map::new())).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_record_drops_ledger_rows() {
        let store = store_with_customer().await;
        let mut values = Map::new();
        values.insert("first_name".to_string(), json!("Xyz"));
        store.apply_mutation(scrub(&["first_name"], values)).await.unwrap();

        assert!(store.delete_record(&customer("1")).await.unwrap());
        assert!(store.get_record(&customer("1")).await.unwrap().is_none());
        assert!(store.entries_for(&customer("1")).await.unwrap().is_empty());
        assert!(!store.delete_record(&customer("1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_renews_in_place() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let key = ConsentKey::new(PurposeSlug::new("EML").unwrap(), customer("1"));
        let upsert = |expires_at, tag: &str| ConsentUpsert {
            key: key.clone(),
            issued_at: now,
            expires_at,
            tag: Some(tag.to_string()),
            now,
        };

        let (first, created) = store.upsert_legal_reason(upsert(now + Duration::days(10), "a")).await.unwrap();
        assert!(created);
        let (second, created) = store.upsert_legal_reason(upsert(now + Duration::days(20), "b")).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(second.tag.as_deref(), Some("b"));

        let all = store.find_legal_reasons(&LegalReasonFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(store.duplicate_keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let store = store_with_customer().await;
        let copy = MemoryStore::from_snapshot(store.snapshot().await);
        assert_eq!(copy.record_count().await, 1);
        assert_eq!(
            copy.get_record(&customer("1")).await.unwrap(),
            store.get_record(&customer("1")).await.unwrap()
        );
    }
}
