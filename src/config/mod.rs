//! Configuration management for Custodian.
//!
//! This module provides TOML-based configuration loading, parsing, and validation.
//!
//! # Overview
//!
//! Custodian uses TOML configuration files with support for:
//! - Environment variable substitution (`${VAR_NAME}`)
//! - `CUSTODIAN_<SECTION>_<KEY>` environment overrides
//! - Default values for optional settings
//! - Validation of every purpose's field matrix against the declared anonymizers
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use custodian::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("custodian.toml")?;
//!
//! println!("Snapshot: {}", config.storage.snapshot_path);
//! for (slug, purpose) in &config.purposes {
//!     println!("{slug}: {}", purpose.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration Structure
//!
//! - [`ApplicationConfig`] - Log level and dry-run mode
//! - [`EncryptionConfig`] - Base key for reversible anonymization
//! - [`SweepConfig`] - Retention sweep lookback
//! - [`StorageConfig`] - Snapshot store location
//! - [`AuditConfig`] - Anonymization audit trail
//! - [`LoggingConfig`] - Local file logging
//! - [`PurposeConfig`] - One entry of the purpose registry
//! - [`AnonymizerConfig`] - Anonymizable fields and relations of one record type
//!
//! # Example Configuration
//!
//! ```toml
//! [encryption]
//! base_key = "${CUSTODIAN_BASE_KEY}"
//!
//! [anonymizers.customer]
//! fields = { first_name = "text", last_name = "text", primary_email_address = "email" }
//!
//! [anonymizers.customer.relations.notes]
//! kind = "reverse_generic"
//! target = "note"
//!
//! [anonymizers.note]
//! fields = { note = "text" }
//!
//! [purposes.newsletter]
//! name = "Newsletter"
//! expiration = { years = 1 }
//! source_type = "customer"
//! fields = ["primary_email_address", "notes"]
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

// Re-export commonly used types
pub use loader::{load_config, parse_config};
pub use schema::{
    AnonymizerConfig, ApplicationConfig, AuditConfig, CustodianConfig, EncryptionConfig,
    ExpirationConfig, LoggingConfig, PurposeConfig, RelationConfig, StorageConfig, SweepConfig,
    MAX_LOOKBACK_DAYS,
};
pub use secret::{secret_string, SecretString, SecretValue};
