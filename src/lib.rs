//! # Custodian - consent lifecycle and reversible anonymization
//!
//! Custodian keeps track of why personal data may be kept and scrubs it once
//! that reason runs out.
//!
//! ## Overview
//!
//! - **Purposes** declare a retention window and the fields they cover
//! - **Consents** (legal reasons) bind a purpose to a source record and expire
//! - **Anonymizers** declare, per record type, how each field is scrubbed and
//!   which relations lead to other records
//! - **Sweeps** find expired consents and anonymize only the data no other
//!   valid consent still covers
//!
//! Reversible anonymizers derive their key from a base secret and the legal
//! reason, so the same consent can later restore the original values.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Consent lifecycle, purposes and retention sweeps
//! - [`anonymization`] - Field transforms, anonymizer registry and engine
//! - [`adapters`] - Storage contract and the snapshot-backed memory store
//! - [`domain`] - Core domain types and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use custodian::cli::commands::Runtime;
//! use custodian::config::load_config;
//! use custodian::core::sweep::RetentionSweep;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = load_config("custodian.toml")?;
//! let runtime = Runtime::build(config)?;
//!
//! let sweep = RetentionSweep::new(
//!     runtime.consents.clone(),
//!     runtime.engine.clone(),
//!     runtime.config.encryption.base_key.clone(),
//! );
//! let summary = sweep.run().await?;
//! println!("Anonymized {} records", summary.anonymized);
//!
//! runtime.save().await?;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod anonymization;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
