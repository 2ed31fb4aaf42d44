//! Core business logic for Custodian.
//!
//! # Modules
//!
//! - [`purposes`] - Purpose registry and retention windows
//! - [`consent`] - Legal reason lifecycle
//! - [`sweep`] - Retention sweep anonymizing expired data
//!
//! # Example
//!
//! ```rust,no_run
//! use custodian::anonymization::{AnonymizationEngine, AnonymizerRegistry};
//! use custodian::adapters::memory::MemoryStore;
//! use custodian::config::load_config;
//! use custodian::core::consent::ConsentManager;
//! use custodian::core::purposes::PurposeRegistry;
//! use custodian::core::sweep::RetentionSweep;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("custodian.toml")?;
//! let store = Arc::new(MemoryStore::new());
//!
//! let purposes = Arc::new(PurposeRegistry::from_config(&config.purposes)?);
//! let anonymizers = Arc::new(AnonymizerRegistry::from_config(&config.anonymizers)?);
//!
//! let consents = ConsentManager::new(purposes, store.clone(), store.clone());
//! let engine = Arc::new(AnonymizationEngine::new(anonymizers, store.clone(), store));
//!
//! let summary = RetentionSweep::new(consents, engine, config.encryption.base_key.clone())
//!     .run()
//!     .await?;
//! println!("Anonymized: {}", summary.anonymized);
//! # Ok(())
//! # }
//! ```

pub mod consent;
pub mod purposes;
pub mod sweep;
