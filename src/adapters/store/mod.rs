//! Storage abstraction layer
//!
//! Trait-based storage contract for records, the anonymized-field ledger and
//! legal reasons. [`crate::adapters::memory::MemoryStore`] implements all three.

pub mod traits;

pub use traits::{
    ConsentUpsert, FieldFilter, FieldMutation, LedgerChange, LedgerStore, LegalReasonFilter,
    LegalReasonStore, MutationOutcome, RecordStore,
};
