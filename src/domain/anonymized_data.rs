//! Anonymized-field ledger rows
//!
//! An active [`AnonymizedData`] row for (record, field) is the source of truth for
//! "already anonymized" and for reversal eligibility. Reversal deactivates the row;
//! rows are only deleted when the record itself is forgotten.

use super::ids::RecordRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger entry for one scrubbed field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnonymizedData {
    /// Row identifier
    pub id: Uuid,

    /// Scrubbed field name
    pub field: String,

    /// Record owning the field
    pub target: RecordRef,

    /// Whether the field is currently scrubbed
    pub is_active: bool,

    /// Legal reason whose expiry triggered the scrub, if any
    pub expired_reason: Option<Uuid>,

    /// Fingerprint of the encryption context the field was scrubbed under
    #[serde(default)]
    pub key_fingerprint: Option<String>,

    /// Row creation time
    pub created_at: DateTime<Utc>,

    /// Last state change
    pub updated_at: DateTime<Utc>,
}

impl AnonymizedData {
    /// Creates a new active ledger entry
    pub fn new(
        target: RecordRef,
        field: impl Into<String>,
        expired_reason: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            field: field.into(),
            target,
            is_active: true,
            expired_reason,
            key_fingerprint: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the fingerprint of the scrubbing context
    pub fn with_key_fingerprint(mut self, fingerprint: Option<String>) -> Self {
        self.key_fingerprint = fingerprint;
        self
    }

    /// Whether a reversal under a context with `fingerprint` may proceed
    ///
    /// Rows written without a fingerprint accept any context.
    pub fn accepts_fingerprint(&self, fingerprint: &str) -> bool {
        self.key_fingerprint.as_deref().map_or(true, |f| f == fingerprint)
    }

    /// Whether this row is the active entry for (target, field)
    pub fn is_active_for(&self, target: &RecordRef, field: &str) -> bool {
        self.is_active && &self.target == target && self.field == field
    }
}
