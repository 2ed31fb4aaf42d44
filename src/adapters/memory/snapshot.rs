//! JSON snapshot of a [`super::MemoryStore`]
//!
//! The snapshot file is what the command-line tool operates on: records,
//! legal reasons, related objects and the anonymized-field ledger in one document.

use crate::domain::anonymized_data::AnonymizedData;
use crate::domain::legal_reason::{LegalReason, LegalReasonRelatedObject};
use crate::domain::record::Record;
use crate::domain::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Serializable content of a store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Application records
    #[serde(default)]
    pub records: Vec<Record>,

    /// Legal reasons
    #[serde(default)]
    pub legal_reasons: Vec<LegalReason>,

    /// Related objects of legal reasons
    #[serde(default)]
    pub related_objects: Vec<LegalReasonRelatedObject>,

    /// Anonymized-field ledger
    #[serde(default)]
    pub anonymized_data: Vec<AnonymizedData>,
}

impl Snapshot {
    /// Loads a snapshot from a JSON file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Loads a snapshot, or an empty one if the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "Snapshot file not found, starting empty");
            Ok(Self::default())
        }
    }

    /// Writes the snapshot as pretty JSON
    ///
    /// Writes to a sibling temporary file first and renames it into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}
