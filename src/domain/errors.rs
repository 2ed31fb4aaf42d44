//! Domain error types
//!
//! This module defines the error hierarchy for Custodian.
//! All errors are domain-specific and don't expose third-party types.

use super::ids::RecordRef;
use thiserror::Error;

/// Main Custodian error type
///
/// This is the primary error type used throughout the library. Configuration and
/// irreversibility errors are always surfaced to the caller; under-anonymizing
/// personal data is never treated as a recoverable condition.
#[derive(Debug, Error)]
pub enum CustodianError {
    /// Unknown purpose, relation, field or transform; invalid configuration values
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Attempted deanonymization of a field whose transform cannot be reversed
    #[error("Field '{field}' of {record} was anonymized irreversibly and cannot be restored")]
    IrreversibleAnonymizer {
        /// Record owning the field
        record: RecordRef,
        /// Field name
        field: String,
    },

    /// A record or related record is missing at resolution time
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage-layer failure (transaction aborted for the affected record)
    #[error("Storage error: {0}")]
    Storage(String),

    /// A value could not be encrypted or decrypted with the given transform
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic errors with context
    #[error("{0}")]
    Other(String),
}

impl CustodianError {
    /// Whether the error means the target record no longer exists
    pub fn is_not_found(&self) -> bool {
        matches!(self, CustodianError::NotFound(_))
    }

    /// Shorthand for a missing record error
    pub fn record_not_found(record: &RecordRef) -> Self {
        CustodianError::NotFound(format!("record {record} does not exist"))
    }
}

// Conversion from std::io::Error
impl From<std::io::Error> for CustodianError {
    fn from(err: std::io::Error) -> Self {
        CustodianError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for CustodianError {
    fn from(err: serde_json::Error) -> Self {
        CustodianError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for CustodianError {
    fn from(err: toml::de::Error) -> Self {
        CustodianError::Configuration(format!("TOML parse error: {err}"))
    }
}
