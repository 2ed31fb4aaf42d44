//! Storage adapters for Custodian.
//!
//! - [`store`] - Storage contract (trait-based)
//! - [`memory`] - In-memory implementation with JSON snapshot persistence
//!
//! # Design Pattern
//!
//! Adapters follow the **Adapter Pattern**: the consent and anonymization core
//! only sees the [`store::RecordStore`], [`store::LedgerStore`] and
//! [`store::LegalReasonStore`] traits, so applications can plug in their own
//! database by implementing them.
//!
//! ```rust
//! use custodian::adapters::memory::MemoryStore;
//! use custodian::adapters::store::{LedgerStore, LegalReasonStore, RecordStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! let records: Arc<dyn RecordStore> = store.clone();
//! let ledger: Arc<dyn LedgerStore> = store.clone();
//! let legal_reasons: Arc<dyn LegalReasonStore> = store;
//! ```

pub mod memory;
pub mod store;
