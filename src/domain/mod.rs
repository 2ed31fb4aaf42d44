//! Domain models and types for Custodian.
//!
//! This module contains the core domain models, types, and business rules for Custodian.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Strongly-typed identifiers** ([`RecordType`], [`RecordRef`], [`PurposeSlug`])
//! - **Domain models** ([`Record`], [`LegalReason`], [`LegalReasonRelatedObject`], [`AnonymizedData`])
//! - **Error types** ([`CustodianError`])
//! - **Result type alias** ([`Result`])
//!
//! # Polymorphic References
//!
//! Any stored row is addressed by a [`RecordRef`]: a type discriminator plus an opaque id.
//! Legal reasons, their related objects and ledger rows all point at records this way.
//!
//! ```rust
//! use custodian::domain::{RecordRef, RecordType};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let customer = RecordRef::new(RecordType::new("customer")?, "42");
//! assert_eq!(customer.to_string(), "customer:42");
//!
//! let parsed: RecordRef = "customer:42".parse()?;
//! assert_eq!(parsed, customer);
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, CustodianError>`]:
//!
//! ```rust
//! use custodian::domain::{CustodianError, Result};
//!
//! fn example() -> Result<()> {
//!     Err(CustodianError::Configuration("unknown purpose 'marketing'".to_string()))
//! }
//! assert!(example().is_err());
//! ```

pub mod anonymized_data;
pub mod errors;
pub mod ids;
pub mod legal_reason;
pub mod record;
pub mod result;

// Re-export commonly used types for convenience
pub use anonymized_data::AnonymizedData;
pub use errors::CustodianError;
pub use ids::{PurposeSlug, RecordRef, RecordType, MAX_PURPOSE_SLUG_LEN};
pub use legal_reason::{ConsentKey, LegalReason, LegalReasonRelatedObject};
pub use record::Record;
pub use result::Result;
