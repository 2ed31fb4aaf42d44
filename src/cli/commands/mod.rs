//! CLI command implementations
//!
//! Every command loads the configuration, opens the snapshot store named in
//! `[storage]` and wires the core services over it.

pub mod prune;
pub mod status;
pub mod sweep;
pub mod validate;

use crate::adapters::memory::MemoryStore;
use crate::anonymization::audit::AuditLogger;
use crate::anonymization::{AnonymizationEngine, AnonymizerRegistry};
use crate::config::CustodianConfig;
use crate::core::consent::ConsentManager;
use crate::core::purposes::PurposeRegistry;
use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;

/// Services built from one configuration
pub struct Runtime {
    /// Loaded configuration
    pub config: CustodianConfig,

    /// Snapshot-backed store
    pub store: Arc<MemoryStore>,

    /// Snapshot file the store is saved to
    pub snapshot_path: PathBuf,

    /// Consent lifecycle
    pub consents: ConsentManager,

    /// Anonymization engine
    pub engine: Arc<AnonymizationEngine>,
}

impl Runtime {
    /// Builds the registries, opens the store and wires the services
    pub fn build(config: CustodianConfig) -> anyhow::Result<Self> {
        let purposes = Arc::new(
            PurposeRegistry::from_config(&config.purposes).context("Invalid purpose registry")?,
        );
        let anonymizers = Arc::new(
            AnonymizerRegistry::from_config(&config.anonymizers)
                .context("Invalid anonymizer registry")?,
        );

        let snapshot_path = PathBuf::from(&config.storage.snapshot_path);
        let store = Arc::new(
            MemoryStore::open(&snapshot_path)
                .with_context(|| format!("Failed to open {}", snapshot_path.display()))?,
        );

        let mut engine = AnonymizationEngine::new(anonymizers, store.clone(), store.clone());
        if config.audit.enabled {
            let audit_logger = AuditLogger::new(
                PathBuf::from(&config.audit.log_path),
                config.audit.json_format,
                true,
            )?;
            engine = engine.with_audit_logger(Arc::new(audit_logger));
        }

        let consents = ConsentManager::new(purposes, store.clone(), store.clone());

        Ok(Self {
            config,
            store,
            snapshot_path,
            consents,
            engine: Arc::new(engine),
        })
    }

    /// Writes the store back to its snapshot file
    pub async fn save(&self) -> anyhow::Result<()> {
        self.store
            .save(&self.snapshot_path)
            .await
            .with_context(|| format!("Failed to save {}", self.snapshot_path.display()))
    }
}
