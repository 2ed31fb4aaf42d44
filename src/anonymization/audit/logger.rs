//! Audit logger for anonymization operations

use crate::anonymization::encryption::sha256_hex;
use crate::domain::ids::RecordRef;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use uuid::Uuid;

/// Kind of audited operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOperation {
    /// Fields were scrubbed
    Anonymize,
    /// Fields were restored
    Deanonymize,
    /// The record was deleted
    Delete,
}

impl AuditOperation {
    /// Operation name
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOperation::Anonymize => "anonymize",
            AuditOperation::Deanonymize => "deanonymize",
            AuditOperation::Delete => "delete",
        }
    }
}

/// One committed record mutation, as seen by the audit trail
#[derive(Debug, Clone)]
pub struct AuditEvent<'a> {
    /// Operation performed
    pub operation: AuditOperation,
    /// Record changed
    pub record: &'a RecordRef,
    /// Changed fields with the values they held before the change
    pub fields: Vec<(&'a str, &'a Value)>,
    /// Legal reason whose expiry triggered the change
    pub legal_reason: Option<Uuid>,
    /// Commit time
    pub timestamp: DateTime<Utc>,
}

/// Audit log entry
#[derive(Debug, Serialize)]
struct AuditLogEntry {
    timestamp: String,
    operation: AuditOperation,
    record: String,
    legal_reason: Option<String>,
    fields_count: usize,
    fields: Vec<AuditField>,
}

/// Audited field (with hashed previous value)
#[derive(Debug, Serialize)]
struct AuditField {
    field: String,
    /// SHA-256 hash of the previous value (never log plaintext personal data)
    value_hash: String,
}

/// Audit logger for anonymization operations
#[derive(Debug)]
pub struct AuditLogger {
    log_path: PathBuf,
    json_format: bool,
    enabled: bool,
}

impl AuditLogger {
    /// Create a new audit logger
    pub fn new(log_path: PathBuf, json_format: bool, enabled: bool) -> Result<Self> {
        if enabled {
            // Ensure parent directory exists
            if let Some(parent) = log_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create audit log directory: {}", parent.display())
                })?;
            }
        }

        Ok(Self {
            log_path,
            json_format,
            enabled,
        })
    }

    /// Whether entries are written
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Log a committed mutation
    pub fn log_event(&self, event: &AuditEvent<'_>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let entry = AuditLogEntry {
            timestamp: event.timestamp.to_rfc3339(),
            operation: event.operation,
            record: event.record.to_string(),
            legal_reason: event.legal_reason.map(|id| id.to_string()),
            fields_count: event.fields.len(),
            fields: event
                .fields
                .iter()
                .map(|(field, value)| AuditField {
                    field: field.to_string(),
                    value_hash: self.hash_value(value),
                })
                .collect(),
        };

        self.write_entry(&entry)
    }

    /// Hash a previous field value using SHA-256
    fn hash_value(&self, value: &Value) -> String {
        match value {
            Value::String(s) => sha256_hex(s.as_bytes()),
            other => sha256_hex(other.to_string().as_bytes()),
        }
    }

    /// Write an audit entry to the log file
    fn write_entry(&self, entry: &AuditLogEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .with_context(|| format!("Failed to open audit log: {}", self.log_path.display()))?;

        if self.json_format {
            let json_line =
                serde_json::to_string(entry).context("Failed to serialize audit entry")?;
            writeln!(file, "{json_line}").context("Failed to write audit entry")?;
        } else {
            let fields: Vec<&str> = entry.fields.iter().map(|f| f.field.as_str()).collect();
            writeln!(
                file,
                "[{}] {} {} | Fields: {} | Legal reason: {}",
                entry.timestamp,
                entry.operation.as_str(),
                entry.record,
                fields.join(","),
                entry.legal_reason.as_deref().unwrap_or("-")
            )
            .context("Failed to write audit entry")?;
        }

        Ok(())
    }
}
