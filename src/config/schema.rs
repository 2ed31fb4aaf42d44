//! Configuration schema types
//!
//! This module defines the configuration structure for Custodian: runtime
//! settings plus the two data-driven registries (purposes and anonymizers).

use crate::anonymization::anonymizer::{FieldTransform, RelationKind};
use crate::anonymization::fields::{FieldMatrix, FieldSpec};
use crate::anonymization::registry::AnonymizerRegistry;
use crate::config::SecretString;
use crate::domain::ids::{PurposeSlug, RecordType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Main Custodian configuration
///
/// This is the root configuration structure that maps to the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodianConfig {
    /// Application-level settings
    #[serde(default)]
    pub application: ApplicationConfig,

    /// Key material for reversible anonymization
    pub encryption: EncryptionConfig,

    /// Retention sweep settings
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Record store location
    #[serde(default)]
    pub storage: StorageConfig,

    /// Anonymization audit trail
    #[serde(default)]
    pub audit: AuditConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Purpose registry keyed by purpose slug
    #[serde(default)]
    pub purposes: BTreeMap<String, PurposeConfig>,

    /// Anonymizers keyed by record type
    #[serde(default)]
    pub anonymizers: BTreeMap<String, AnonymizerConfig>,
}

impl CustodianConfig {
    /// Validates the configuration
    ///
    /// Besides per-section checks, every purpose bound to a source type has its
    /// field matrix resolved against the configured anonymizers, so a purpose
    /// naming an unknown field or relation is rejected at startup.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid
    pub fn validate(&self) -> Result<(), String> {
        self.application.validate()?;
        self.encryption.validate()?;
        self.sweep.validate()?;
        self.storage.validate()?;
        self.audit.validate()?;
        self.logging.validate()?;

        let registry = AnonymizerRegistry::from_config(&self.anonymizers).map_err(|e| e.to_string())?;

        for (slug, purpose) in &self.purposes {
            PurposeSlug::new(slug.clone()).map_err(|e| format!("[purposes.{slug}]: {e}"))?;
            purpose.validate(slug, &registry)?;
        }

        Ok(())
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Dry run mode (count sweep candidates, change nothing)
    #[serde(default)]
    pub dry_run: bool,
}

impl ApplicationConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            dry_run: false,
        }
    }
}

/// Encryption configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Organisational base key combined with a per-operation salt
    /// Stored securely in memory and automatically zeroized on drop
    pub base_key: SecretString,
}

impl EncryptionConfig {
    fn validate(&self) -> Result<(), String> {
        use secrecy::ExposeSecret;

        if self.base_key.expose_secret().is_empty() {
            return Err("encryption.base_key cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Retention sweep configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Only consider legal reasons that expired within this many days
    #[serde(default)]
    pub lookback_days: Option<u32>,
}

/// Largest accepted sweep lookback, in days
pub const MAX_LOOKBACK_DAYS: u32 = 36_500;

impl SweepConfig {
    fn validate(&self) -> Result<(), String> {
        match self.lookback_days {
            Some(days) if days > MAX_LOOKBACK_DAYS => Err(format!(
                "sweep.lookback_days must be at most {MAX_LOOKBACK_DAYS}, got {days}"
            )),
            _ => Ok(()),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON snapshot file holding records, legal reasons and the ledger
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), String> {
        if self.snapshot_path.is_empty() {
            return Err("storage.snapshot_path cannot be empty".to_string());
        }
        Ok(())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

/// Audit logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Enable audit logging
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path to audit log file
    #[serde(default = "default_audit_log_path")]
    pub log_path: String,

    /// Write entries as JSON lines
    #[serde(default = "default_true")]
    pub json_format: bool,
}

impl AuditConfig {
    fn validate(&self) -> Result<(), String> {
        if self.enabled && self.log_path.is_empty() {
            return Err("audit.log_path cannot be empty when audit is enabled".to_string());
        }
        Ok(())
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_path: default_audit_log_path(),
            json_format: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Enable local file logging
    #[serde(default = "default_true")]
    pub local_enabled: bool,

    /// Local log directory
    #[serde(default = "default_local_path")]
    pub local_path: String,

    /// Log rotation strategy (daily, hourly, never)
    #[serde(default = "default_local_rotation")]
    pub local_rotation: String,
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&self.local_rotation.as_str()) {
            return Err(format!(
                "Invalid logging.local_rotation '{}'. Must be one of: {}",
                self.local_rotation,
                valid_rotations.join(", ")
            ));
        }
        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            local_enabled: true,
            local_path: default_local_path(),
            local_rotation: default_local_rotation(),
        }
    }
}

/// Retention window of a purpose
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirationConfig {
    /// Calendar years
    #[serde(default)]
    pub years: u32,

    /// Calendar months
    #[serde(default)]
    pub months: u32,

    /// Days
    #[serde(default)]
    pub days: u32,
}

impl ExpirationConfig {
    /// Whether the window has zero length
    pub fn is_zero(&self) -> bool {
        self.years == 0 && self.months == 0 && self.days == 0
    }
}

/// One entry of the purpose registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurposeConfig {
    /// Display name
    pub name: String,

    /// Retention window added to the issue time
    pub expiration: ExpirationConfig,

    /// Whether expiry must trigger anonymization
    #[serde(default = "default_true")]
    pub retains_data: bool,

    /// Record type consents of this purpose are attached to; when set the
    /// field matrix is checked at load time and consents for other types are refused
    #[serde(default)]
    pub source_type: Option<String>,

    /// Personal data covered by the purpose
    #[serde(default = "FieldMatrix::all")]
    pub fields: FieldMatrix,
}

impl PurposeConfig {
    fn validate(&self, slug: &str, registry: &AnonymizerRegistry) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err(format!("purposes.{slug}.name cannot be empty"));
        }

        if self.expiration.is_zero() {
            return Err(format!("purposes.{slug}.expiration must be longer than zero"));
        }

        if let Some(source_type) = &self.source_type {
            let record_type = RecordType::new(source_type.clone())
                .map_err(|e| format!("purposes.{slug}.source_type: {e}"))?;
            FieldSpec::resolve(&self.fields, &record_type, registry)
                .map_err(|e| format!("purposes.{slug}.fields: {e}"))?;
        }

        Ok(())
    }
}

/// Anonymizer of one record type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnonymizerConfig {
    /// When false, every field is scrubbed with a discarded key
    #[serde(default = "default_true")]
    pub reversible: bool,

    /// When true, anonymizing a record deletes it instead of scrubbing fields
    #[serde(default)]
    pub delete: bool,

    /// Anonymizable fields and their transforms
    #[serde(default)]
    pub fields: BTreeMap<String, FieldTransform>,

    /// Outgoing relations keyed by relation name
    #[serde(default)]
    pub relations: BTreeMap<String, RelationConfig>,
}

/// Relation declared on an anonymizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationConfig {
    /// Related record type
    pub target: String,

    /// Lookup strategy, tagged by `kind`
    #[serde(flatten)]
    pub kind: RelationKind,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_snapshot_path() -> String {
    "./custodian-store.json".to_string()
}

fn default_audit_log_path() -> String {
    "./audit/anonymization.log".to_string()
}

fn default_local_path() -> String {
    "./logs".to_string()
}

fn default_local_rotation() -> String {
    "daily".to_string()
}
