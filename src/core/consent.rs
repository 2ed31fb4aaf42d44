//! Legal reason lifecycle
//!
//! [`ConsentManager`] creates, renews and deactivates legal reasons and answers
//! the queries the retention sweep and the application need. At most one row
//! exists per (purpose, source record): renewing a consent updates that row.

use crate::adapters::store::{ConsentUpsert, LedgerStore, LegalReasonFilter, LegalReasonStore};
use crate::core::purposes::PurposeRegistry;
use crate::domain::errors::CustodianError;
use crate::domain::ids::{PurposeSlug, RecordRef};
use crate::domain::legal_reason::{ConsentKey, LegalReason, LegalReasonRelatedObject};
use crate::domain::Result;
use chrono::{DateTime, Days, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Longest accepted consent tag
pub const MAX_TAG_LEN: usize = 100;

/// Rows removed by [`ConsentManager::prune_duplicates`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    /// Keys that had more than one legal reason
    pub duplicate_keys: usize,

    /// Legal reasons deleted
    pub legal_reasons_removed: usize,

    /// Related objects deleted
    pub related_objects_removed: usize,
}

impl PruneReport {
    /// Whether anything was deleted
    pub fn removed_anything(&self) -> bool {
        self.legal_reasons_removed > 0 || self.related_objects_removed > 0
    }
}

/// Consent lifecycle operations
#[derive(Clone)]
pub struct ConsentManager {
    purposes: Arc<PurposeRegistry>,
    legal_reasons: Arc<dyn LegalReasonStore>,
    ledger: Arc<dyn LedgerStore>,
}

impl ConsentManager {
    /// Creates a manager over a purpose registry and its stores
    pub fn new(
        purposes: Arc<PurposeRegistry>,
        legal_reasons: Arc<dyn LegalReasonStore>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        Self {
            purposes,
            legal_reasons,
            ledger,
        }
    }

    /// Purpose registry
    pub fn purposes(&self) -> &PurposeRegistry {
        &self.purposes
    }

    /// Creates or renews the consent of `source` for a purpose
    ///
    /// See [`ConsentManager::create_consent_at`].
    pub async fn create_consent(
        &self,
        purpose: &PurposeSlug,
        source: &RecordRef,
        issued_at: Option<DateTime<Utc>>,
        tag: Option<String>,
        related: &[RecordRef],
    ) -> Result<LegalReason> {
        self.create_consent_at(purpose, source, issued_at, tag, related, Utc::now())
            .await
    }

    /// Creates or renews a consent as of `now`
    ///
    /// A new row gets `expires_at = issued_at + window` with `issued_at`
    /// defaulting to `now`. An existing row is renewed in place: its expiry
    /// becomes `(issued_at or now) + window`, its tag is replaced and it is
    /// reactivated. Related records are attached idempotently.
    ///
    /// # Arguments
    ///
    /// * `purpose` - Registered purpose slug
    /// * `source` - Record the consent belongs to
    /// * `issued_at` - When the consent was given
    /// * `tag` - Caller correlation string, at most [`MAX_TAG_LEN`] characters
    /// * `related` - Other records the consent covers
    /// * `now` - Current time
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for unknown purposes or a source
    /// type the purpose does not apply to, [`CustodianError::Validation`] for an
    /// oversized tag, and storage errors.
    pub async fn create_consent_at(
        &self,
        purpose: &PurposeSlug,
        source: &RecordRef,
        issued_at: Option<DateTime<Utc>>,
        tag: Option<String>,
        related: &[RecordRef],
        now: DateTime<Utc>,
    ) -> Result<LegalReason> {
        let definition = self.purposes.get(purpose)?;
        definition.check_source_type(&source.record_type)?;

        if let Some(tag) = &tag {
            if tag.chars().count() > MAX_TAG_LEN {
                return Err(CustodianError::Validation(format!(
                    "Consent tag is longer than {MAX_TAG_LEN} characters"
                )));
            }
        }

        let issued_at = issued_at.unwrap_or(now);
        let upsert = ConsentUpsert {
            key: ConsentKey::new(purpose.clone(), source.clone()),
            issued_at,
            expires_at: definition.expires_at(issued_at)?,
            tag,
            now,
        };
        let (legal_reason, created) = self.legal_reasons.upsert_legal_reason(upsert).await?;

        for object in related {
            self.legal_reasons
                .upsert_related_object(legal_reason.id, object, now)
                .await?;
        }

        tracing::info!(
            legal_reason = %legal_reason.id,
            purpose = %purpose,
            source = %source,
            created,
            related = related.len(),
            expires_at = %legal_reason.expires_at,
            "Consent recorded"
        );

        Ok(legal_reason)
    }

    /// Deactivates the valid consent of `source` for a purpose, if any
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for unknown purposes.
    pub async fn deactivate_consent(&self, purpose: &PurposeSlug, source: &RecordRef) -> Result<bool> {
        self.deactivate_consent_at(purpose, source, Utc::now()).await
    }

    /// Deactivates the consent valid at `now`; returns whether one was found
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for unknown purposes.
    pub async fn deactivate_consent_at(
        &self,
        purpose: &PurposeSlug,
        source: &RecordRef,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.purposes.get(purpose)?;

        let filter = LegalReasonFilter::for_key(&ConsentKey::new(purpose.clone(), source.clone())).valid_at(now);
        let deactivated = self.legal_reasons.deactivate_matching(&filter, now).await?;

        if deactivated > 0 {
            tracing::info!(purpose = %purpose, source = %source, "Consent deactivated");
        } else {
            tracing::debug!(purpose = %purpose, source = %source, "No valid consent to deactivate");
        }
        Ok(deactivated > 0)
    }

    /// Whether `source` holds an active, non-expired consent for a purpose
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for unknown purposes.
    pub async fn exists_valid_consent(&self, purpose: &PurposeSlug, source: &RecordRef) -> Result<bool> {
        self.exists_valid_consent_at(purpose, source, Utc::now()).await
    }

    /// [`ConsentManager::exists_valid_consent`] as of `now`
    ///
    /// # Errors
    ///
    /// Returns [`CustodianError::Configuration`] for unknown purposes.
    pub async fn exists_valid_consent_at(
        &self,
        purpose: &PurposeSlug,
        source: &RecordRef,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.purposes.get(purpose)?;
        let filter = LegalReasonFilter::for_key(&ConsentKey::new(purpose.clone(), source.clone())).valid_at(now);
        Ok(!self.legal_reasons.find_legal_reasons(&filter).await?.is_empty())
    }

    /// Expired legal reasons of data-retaining purposes
    ///
    /// See [`ConsentManager::expired_retaining_data_at`].
    pub async fn expired_retaining_data(&self, days: Option<u32>) -> Result<Vec<LegalReason>> {
        self.expired_retaining_data_at(days, Utc::now()).await
    }

    /// Legal reasons of data-retaining purposes that expired before `now`
    ///
    /// With `days`, only expiries strictly after `now - days` are returned; a
    /// lookback reaching past the calendar range applies no lower bound.
    /// Active and inactive rows are both returned.
    pub async fn expired_retaining_data_at(
        &self,
        days: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<Vec<LegalReason>> {
        let slugs = self.purposes.retaining_data_slugs();
        if slugs.is_empty() {
            return Ok(Vec::new());
        }

        let filter = LegalReasonFilter {
            purpose_slugs: Some(slugs),
            expired_before: Some(now),
            expires_after: days.and_then(|d| now.checked_sub_days(Days::new(u64::from(d)))),
            ..LegalReasonFilter::default()
        };
        self.legal_reasons.find_legal_reasons(&filter).await
    }

    /// Every legal reason of a record
    pub async fn consents_for(&self, source: &RecordRef) -> Result<Vec<LegalReason>> {
        self.legal_reasons
            .find_legal_reasons(&LegalReasonFilter::for_source(source))
            .await
    }

    /// Other legal reasons of the same source that are valid at `now`
    pub(crate) async fn other_valid_consents(
        &self,
        legal_reason: &LegalReason,
        now: DateTime<Utc>,
    ) -> Result<Vec<LegalReason>> {
        let filter = LegalReasonFilter {
            exclude_id: Some(legal_reason.id),
            ..LegalReasonFilter::for_source(&legal_reason.source).valid_at(now)
        };
        self.legal_reasons.find_legal_reasons(&filter).await
    }

    /// Related objects of a legal reason
    pub async fn related_objects(&self, legal_reason_id: Uuid) -> Result<Vec<LegalReasonRelatedObject>> {
        self.legal_reasons
            .find_related_objects(Some(legal_reason_id), None)
            .await
    }

    /// Removes duplicate legal reasons and related objects
    ///
    /// Per (purpose, source) the latest-expiring row is kept, active rows
    /// preferred. Per (legal reason, related record) the latest-created row is kept.
    pub async fn prune_duplicates(&self) -> Result<PruneReport> {
        let mut report = PruneReport::default();

        for (key, count) in self.legal_reasons.duplicate_keys().await? {
            report.duplicate_keys += 1;
            let rows = self
                .legal_reasons
                .find_legal_reasons(&LegalReasonFilter::for_key(&key))
                .await?;

            let Some(keep) = rows
                .iter()
                .max_by_key(|r| (r.is_active, r.expires_at, r.updated_at))
                .map(|r| r.id)
            else {
                continue;
            };

            let remove: Vec<Uuid> = rows.iter().map(|r| r.id).filter(|id| *id != keep).collect();
            let removed = self.legal_reasons.delete_legal_reasons(&remove).await?;
            report.legal_reasons_removed += removed;

            tracing::info!(key = %key, rows = count, kept = %keep, removed, "Pruned duplicate legal reasons");
        }

        let mut groups: BTreeMap<(Uuid, String), Vec<LegalReasonRelatedObject>> = BTreeMap::new();
        for object in self.legal_reasons.find_related_objects(None, None).await? {
            groups
                .entry((object.legal_reason_id, object.object.to_string()))
                .or_default()
                .push(object);
        }

        let mut remove = Vec::new();
        for objects in groups.into_values().filter(|g| g.len() > 1) {
            if let Some(keep) = objects.iter().max_by_key(|o| o.created_at).map(|o| o.id) {
                remove.extend(objects.iter().map(|o| o.id).filter(|id| *id != keep));
            }
        }
        if !remove.is_empty() {
            report.related_objects_removed = self.legal_reasons.delete_related_objects(&remove).await?;
        }

        if report.removed_anything() {
            tracing::info!(
                duplicate_keys = report.duplicate_keys,
                legal_reasons_removed = report.legal_reasons_removed,
                related_objects_removed = report.related_objects_removed,
                "Duplicate pruning completed"
            );
        }

        Ok(report)
    }

    /// Removes anonymization metadata of a deleted record
    ///
    /// Deletes its ledger rows and the related-object rows pointing at it.
    /// Failures are logged and leave leftovers behind; returns rows removed.
    pub async fn forget_record(&self, record: &RecordRef) -> usize {
        let mut removed = 0;

        match self.ledger.purge_record(record).await {
            Ok(count) => removed += count,
            Err(e) => tracing::warn!(record = %record, error = %e, "Failed to purge ledger rows"),
        }

        let related = match self.legal_reasons.find_related_objects(None, Some(record)).await {
            Ok(related) => related,
            Err(e) => {
                tracing::warn!(record = %record, error = %e, "Failed to look up related objects");
                return removed;
            }
        };
        let ids: Vec<Uuid> = related.iter().map(|o| o.id).collect();
        if !ids.is_empty() {
            match self.legal_reasons.delete_related_objects(&ids).await {
                Ok(count) => removed += count,
                Err(e) => tracing::warn!(record = %record, error = %e, "Failed to delete related objects"),
            }
        }

        tracing::debug!(record = %record, removed, "Forgot deleted record");
        removed
    }
}
