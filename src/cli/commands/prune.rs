//! Prune command implementation
//!
//! Repairs the store by removing duplicate legal reasons and related objects.

use crate::cli::commands::Runtime;
use crate::config::load_config;
use clap::Args;

/// Arguments for the prune command
#[derive(Args, Debug)]
pub struct PruneArgs {}

impl PruneArgs {
    /// Execute the prune command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Pruning duplicate legal reasons");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };
        let runtime = Runtime::build(config)?;

        let report = match runtime.consents.prune_duplicates().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Prune failed");
                eprintln!("Prune failed: {e}");
                return Ok(5);
            }
        };

        if report.removed_anything() {
            runtime.save().await?;
        }

        println!("Duplicate keys: {}", report.duplicate_keys);
        println!("Legal reasons removed: {}", report.legal_reasons_removed);
        println!("Related objects removed: {}", report.related_objects_removed);

        Ok(0)
    }
}
