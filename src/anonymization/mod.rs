//! Anonymization module for Custodian
//!
//! This module scrubs personal fields from stored records and restores them
//! when the scrub was reversible.
//!
//! # Architecture
//!
//! The anonymization pipeline consists of:
//! - **Fields**: the field matrix grammar and its resolver ([`fields`])
//! - **Encryption**: the keyed reversible codec ([`encryption`])
//! - **Anonymizers**: per-record-type field transforms and relations ([`anonymizer`])
//! - **Registry**: record type to anonymizer lookup ([`registry`])
//! - **Engine**: the tree walk and ledger bookkeeping ([`engine`])
//! - **Audit**: structured audit logging with hashed values ([`audit`])
//!
//! # Usage
//!
//! ```rust,ignore
//! use custodian::anonymization::{AnonymizationEngine, EncryptionContext, FieldMatrix};
//!
//! let engine = AnonymizationEngine::new(registry, store.clone(), store);
//! let context = EncryptionContext::new(&base_key, "salt");
//! engine.anonymize(&customer, Some(&FieldMatrix::fields(["first_name"])), &context).await?;
//! ```

pub mod anonymizer;
pub mod audit;
pub mod encryption;
pub mod engine;
pub mod fields;
pub mod registry;

// Re-export main types
pub use anonymizer::{DeclaredAnonymizer, FieldTransform, ModelAnonymizer, Relation, RelationKind};
pub use encryption::EncryptionContext;
pub use engine::{AnonymizationEngine, AnonymizationOutcome};
pub use fields::{FieldEntry, FieldMatrix, FieldSpec, LocalFields, ALL_FIELDS};
pub use registry::AnonymizerRegistry;
