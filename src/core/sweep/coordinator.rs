//! Retention sweep coordinator
//!
//! Finds legal reasons of data-retaining purposes that have expired and
//! anonymizes the data they covered. Each legal reason is an independent unit
//! of work: a failure is recorded and the sweep moves on.

use crate::anonymization::encryption::EncryptionContext;
use crate::anonymization::engine::{AnonymizationEngine, AnonymizationOutcome};
use crate::anonymization::fields::FieldSpec;
use crate::config::SecretString;
use crate::core::consent::ConsentManager;
use crate::core::sweep::summary::{SweepFailure, SweepSummary};
use crate::domain::legal_reason::LegalReason;
use crate::domain::Result;
use crate::{log_sweep_complete, log_sweep_start};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Retention sweep
pub struct RetentionSweep {
    consents: ConsentManager,
    engine: Arc<AnonymizationEngine>,
    base_key: SecretString,
    lookback_days: Option<u32>,
    dry_run: bool,
    shutdown_signal: Option<watch::Receiver<bool>>,
}

impl RetentionSweep {
    /// Create a new sweep
    ///
    /// # Arguments
    ///
    /// * `consents` - Consent lifecycle over the legal reason store
    /// * `engine` - Anonymization engine over the record store
    /// * `base_key` - Organisational key; combined with each legal reason id
    pub fn new(consents: ConsentManager, engine: Arc<AnonymizationEngine>, base_key: SecretString) -> Self {
        Self {
            consents,
            engine,
            base_key,
            lookback_days: None,
            dry_run: false,
            shutdown_signal: None,
        }
    }

    /// Only consider expiries within the last `days`
    pub fn with_lookback_days(mut self, days: Option<u32>) -> Self {
        self.lookback_days = days;
        self
    }

    /// Count candidates without changing anything
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Stop between units of work once the signal turns true
    pub fn with_shutdown_signal(mut self, shutdown_signal: watch::Receiver<bool>) -> Self {
        self.shutdown_signal = Some(shutdown_signal);
        self
    }

    /// Run the sweep now
    ///
    /// # Errors
    ///
    /// Only a failure to list the expired legal reasons is returned; per-record
    /// failures are collected in the summary.
    pub async fn run(&self) -> Result<SweepSummary> {
        self.run_at(Utc::now()).await
    }

    /// Run the sweep as of `now`
    ///
    /// # Errors
    ///
    /// See [`RetentionSweep::run`].
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<SweepSummary> {
        let start_time = Instant::now();
        let mut summary = SweepSummary::new();
        summary.dry_run = self.dry_run;

        log_sweep_start!(self.lookback_days, self.dry_run);

        let candidates = self
            .consents
            .expired_retaining_data_at(self.lookback_days, now)
            .await?;
        summary.examined = candidates.len();

        if self.dry_run {
            for reason in &candidates {
                tracing::info!(
                    legal_reason = %reason.id,
                    purpose = %reason.purpose_slug,
                    source = %reason.source,
                    expires_at = %reason.expires_at,
                    "Dry run: would anonymize"
                );
            }
            return Ok(summary.with_duration(start_time.elapsed()));
        }

        for reason in &candidates {
            if self.is_shutdown_requested() {
                tracing::warn!(
                    processed = summary.processed(),
                    remaining = candidates.len() - summary.processed(),
                    "Shutdown requested, stopping sweep"
                );
                summary.interrupted = true;
                break;
            }

            match self.process(reason, now).await {
                Ok(outcome) if outcome.changed_anything() => {
                    summary.anonymized += 1;
                    summary.fields_changed += outcome.fields_changed;
                    summary.records_deleted += outcome.records_deleted;
                }
                Ok(_) => summary.unchanged += 1,
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        legal_reason = %reason.id,
                        source = %reason.source,
                        error = %e,
                        "Record missing, skipping"
                    );
                    summary.skipped_missing += 1;
                }
                Err(e) => {
                    tracing::error!(
                        legal_reason = %reason.id,
                        source = %reason.source,
                        error = %e,
                        "Failed to anonymize expired data"
                    );
                    summary.add_failure(SweepFailure {
                        legal_reason: reason.id,
                        source: reason.source.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let summary = summary.with_duration(start_time.elapsed());
        log_sweep_complete!(summary.examined, summary.anonymized, summary.duration);
        Ok(summary)
    }

    /// Fields the expiry of `reason` must anonymize
    ///
    /// The purpose's fields, minus whatever other valid consents of the same
    /// record still cover.
    pub async fn expiring_fields(&self, reason: &LegalReason, now: DateTime<Utc>) -> Result<FieldSpec> {
        let registry = self.engine.registry();
        let purposes = self.consents.purposes();
        let record_type = &reason.source.record_type;

        let mut spec = purposes
            .get(&reason.purpose_slug)?
            .field_spec(record_type, registry)?;

        for other in self.consents.other_valid_consents(reason, now).await? {
            let covered = purposes
                .get(&other.purpose_slug)?
                .field_spec(record_type, registry)?;
            spec = spec.subtract(&covered, registry)?;
        }

        Ok(spec)
    }

    async fn process(&self, reason: &LegalReason, now: DateTime<Utc>) -> Result<AnonymizationOutcome> {
        let spec = self.expiring_fields(reason, now).await?;
        if spec.is_empty() {
            tracing::debug!(
                legal_reason = %reason.id,
                "Every field is still covered by another consent"
            );
            return Ok(AnonymizationOutcome::default());
        }

        let context = EncryptionContext::for_legal_reason(&self.base_key, reason);
        self.engine
            .anonymize_spec(&reason.source, &spec, &context, Some(reason))
            .await
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_signal
            .as_ref()
            .map_or(false, |signal| *signal.borrow())
    }
}
