//! In-memory storage backend with JSON snapshots
//!
//! [`MemoryStore`] implements the whole storage contract and is the backend the
//! command-line tool uses, persisting between runs through a [`Snapshot`] file.

pub mod snapshot;
pub mod store;

pub use snapshot::Snapshot;
pub use store::MemoryStore;
