//! Legal reason (consent) domain model
//!
//! A [`LegalReason`] grants one purpose for one source record until `expires_at`.
//! At most one row exists per (purpose, source type, source id); renewing a consent
//! updates that row in place.

use super::ids::{PurposeSlug, RecordRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Natural key of a legal reason
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConsentKey {
    /// Purpose granted
    pub purpose_slug: PurposeSlug,

    /// Record whose data is retained
    pub source: RecordRef,
}

impl ConsentKey {
    /// Creates a new consent key
    pub fn new(purpose_slug: PurposeSlug, source: RecordRef) -> Self {
        Self {
            purpose_slug,
            source,
        }
    }
}

impl fmt::Display for ConsentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.purpose_slug, self.source)
    }
}

/// One grant of legal basis for retaining a record's data under a purpose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalReason {
    /// Row identifier, also used as the encryption salt of sweep-triggered scrubs
    pub id: Uuid,

    /// Purpose granted
    pub purpose_slug: PurposeSlug,

    /// Record whose data is retained
    pub source: RecordRef,

    /// When the consent was first given
    pub issued_at: DateTime<Utc>,

    /// When the retention window closes
    pub expires_at: DateTime<Utc>,

    /// Free-form caller correlation string
    pub tag: Option<String>,

    /// Whether the consent is active (deactivated rows are kept)
    pub is_active: bool,

    /// Row creation time
    pub created_at: DateTime<Utc>,

    /// Last renewal or deactivation time
    pub updated_at: DateTime<Utc>,
}

impl LegalReason {
    /// Natural key of this row
    pub fn key(&self) -> ConsentKey {
        ConsentKey::new(self.purpose_slug.clone(), self.source.clone())
    }

    /// Whether the retention window closed before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Active and not expired at `now`
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired_at(now)
    }
}

/// Another record covered by a legal reason (an order, a registration, ...)
///
/// Unique per (legal reason, object type, object id).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegalReasonRelatedObject {
    /// Row identifier
    pub id: Uuid,

    /// Owning legal reason
    pub legal_reason_id: Uuid,

    /// Related record
    pub object: RecordRef,

    /// Row creation time
    pub created_at: DateTime<Utc>,

    /// Last upsert time
    pub updated_at: DateTime<Utc>,
}
