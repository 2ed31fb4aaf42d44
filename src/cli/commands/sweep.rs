//! Sweep command implementation
//!
//! Anonymizes the data of expired legal reasons in the snapshot store.

use crate::cli::commands::Runtime;
use crate::config::{load_config, MAX_LOOKBACK_DAYS};
use crate::core::sweep::RetentionSweep;
use crate::log_error_with_context;
use chrono::{DateTime, Utc};
use clap::Args;
use tokio::sync::watch;

/// Arguments for the sweep command
#[derive(Args, Debug)]
pub struct SweepArgs {
    /// List candidates without anonymizing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Only consider legal reasons that expired within this many days
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_LOOKBACK_DAYS)))]
    pub lookback_days: Option<u32>,

    /// Evaluate expiry as of this RFC 3339 timestamp instead of now
    #[arg(long, value_name = "TIMESTAMP")]
    pub as_of: Option<DateTime<Utc>>,
}

impl SweepArgs {
    /// Execute the sweep command
    pub async fn execute(
        &self,
        config_path: &str,
        shutdown_signal: watch::Receiver<bool>,
    ) -> anyhow::Result<i32> {
        tracing::info!("Starting sweep command");

        let mut config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                log_error_with_context!(&e, "Failed to load configuration");
                eprintln!("Configuration error: {e}");
                return Ok(2);
            }
        };

        if self.dry_run {
            config.application.dry_run = true;
        }
        if self.lookback_days.is_some() {
            config.sweep.lookback_days = self.lookback_days;
        }

        let runtime = Runtime::build(config)?;
        let dry_run = runtime.config.application.dry_run;

        let sweep = RetentionSweep::new(
            runtime.consents.clone(),
            runtime.engine.clone(),
            runtime.config.encryption.base_key.clone(),
        )
        .with_lookback_days(runtime.config.sweep.lookback_days)
        .with_dry_run(dry_run)
        .with_shutdown_signal(shutdown_signal);

        let summary = match sweep.run_at(self.as_of.unwrap_or_else(Utc::now)).await {
            Ok(s) => s,
            Err(e) => {
                log_error_with_context!(&e, "Sweep failed");
                eprintln!("Sweep failed: {e}");
                return Ok(5);
            }
        };

        if !dry_run {
            runtime.save().await?;
        }
        summary.log_summary();

        println!();
        println!("Sweep Summary:");
        println!("  Expired legal reasons: {}", summary.examined);
        if dry_run {
            println!("  Dry run: nothing was changed");
        } else {
            println!("  Anonymized: {}", summary.anonymized);
            println!("  Unchanged: {}", summary.unchanged);
            println!("  Missing records: {}", summary.skipped_missing);
            println!("  Failed: {}", summary.failures.len());
            println!("  Fields changed: {}", summary.fields_changed);
            println!("  Records deleted: {}", summary.records_deleted);
        }
        println!("  Duration: {:.2}s", summary.duration.as_secs_f64());
        println!();

        for failure in &summary.failures {
            println!("  - {} ({}): {}", failure.source, failure.legal_reason, failure.message);
        }

        let exit_code = if summary.interrupted {
            println!("Sweep interrupted. Run it again to process the remaining legal reasons.");
            130
        } else if summary.is_successful() {
            0
        } else {
            1
        };

        Ok(exit_code)
    }
}
