//! Status command implementation
//!
//! Shows what the snapshot store holds, or the consents and anonymized
//! fields of one record.

use crate::adapters::store::LedgerStore;
use crate::cli::commands::Runtime;
use crate::config::load_config;
use crate::domain::ids::RecordRef;
use chrono::Utc;
use clap::Args;

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show one record, as `type:id`
    #[arg(long, value_name = "TYPE:ID")]
    pub record: Option<RecordRef>,
}

impl StatusArgs {
    /// Execute the status command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!("Checking store status");

        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };
        let runtime = Runtime::build(config)?;
        let now = Utc::now();

        match &self.record {
            Some(record) => {
                println!("Status of {record}");
                println!();

                let consents = runtime.consents.consents_for(record).await?;
                if consents.is_empty() {
                    println!("  No legal reasons");
                }
                for reason in consents {
                    let state = if reason.is_valid_at(now) {
                        "valid"
                    } else if reason.is_expired_at(now) {
                        "expired"
                    } else {
                        "inactive"
                    };
                    println!(
                        "  {} {} expires {} [{state}]{}",
                        reason.id,
                        reason.purpose_slug,
                        reason.expires_at.to_rfc3339(),
                        reason.tag.map(|t| format!(" tag={t}")).unwrap_or_default()
                    );
                }

                let entries = runtime.store.entries_for(record).await?;
                let active: Vec<_> = entries.iter().filter(|e| e.is_active).map(|e| e.field.as_str()).collect();
                println!();
                println!("  Anonymized fields: {}", if active.is_empty() { "-".to_string() } else { active.join(", ") });
                println!("  Ledger rows: {}", entries.len());
            }
            None => {
                let snapshot = runtime.store.snapshot().await;
                let valid = snapshot.legal_reasons.iter().filter(|r| r.is_valid_at(now)).count();
                let expired = snapshot.legal_reasons.iter().filter(|r| r.is_expired_at(now)).count();
                let active_rows = snapshot.anonymized_data.iter().filter(|d| d.is_active).count();

                println!("Store: {}", runtime.snapshot_path.display());
                println!();
                println!("  Records: {}", snapshot.records.len());
                println!("  Legal reasons: {}", snapshot.legal_reasons.len());
                println!("    Valid: {valid}");
                println!("    Expired: {expired}");
                println!("  Related objects: {}", snapshot.related_objects.len());
                println!("  Anonymized fields: {active_rows} active of {} rows", snapshot.anonymized_data.len());

                let pending = runtime.consents.expired_retaining_data_at(None, now).await?;
                println!("  Expired legal reasons retaining data: {}", pending.len());
            }
        }
        println!();

        Ok(0)
    }
}
