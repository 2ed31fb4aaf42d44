//! Validate config command implementation

use crate::anonymization::AnonymizerRegistry;
use crate::config::load_config;
use crate::core::purposes::PurposeRegistry;
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {}

impl ValidateArgs {
    /// Execute the validate-config command
    ///
    /// Loading already validates every section and every purpose's field
    /// matrix; the registries are built here as the final check.
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("Validating configuration file: {config_path}");
        println!();

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Configuration is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let anonymizers = match AnonymizerRegistry::from_config(&config.anonymizers) {
            Ok(r) => r,
            Err(e) => {
                println!("Anonymizer registry is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };
        let purposes = match PurposeRegistry::from_config(&config.purposes) {
            Ok(r) => r,
            Err(e) => {
                println!("Purpose registry is invalid");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!("Configuration is valid");
        println!();
        println!("Configuration Summary:");
        println!("  Log Level: {}", config.application.log_level);
        println!("  Dry Run: {}", config.application.dry_run);
        println!("  Snapshot: {}", config.storage.snapshot_path);
        println!(
            "  Audit Log: {}",
            if config.audit.enabled { config.audit.log_path.as_str() } else { "disabled" }
        );
        println!("  Anonymizers: {}", anonymizers.len());
        for record_type in anonymizers.record_types() {
            let anonymizer = anonymizers.get(&record_type)?;
            println!(
                "    {record_type}: {} fields, {} relations{}",
                anonymizer.fields().len(),
                anonymizer.relations().len(),
                if anonymizer.is_reversible() { "" } else { " (irreversible)" }
            );
        }
        println!("  Purposes: {}", purposes.len());
        for purpose in purposes.iter() {
            println!(
                "    {}: {} ({}{})",
                purpose.slug,
                purpose.name,
                purpose.window,
                if purpose.retains_data { ", retains data" } else { "" }
            );
        }
        println!();

        Ok(0)
    }
}
