//! Retention sweep summary and reporting

use crate::domain::ids::RecordRef;
use std::time::Duration;
use uuid::Uuid;

/// A legal reason whose record could not be anonymized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepFailure {
    /// Expired legal reason
    pub legal_reason: Uuid,

    /// Record the legal reason belongs to
    pub source: RecordRef,

    /// Error message
    pub message: String,
}

/// Summary of a retention sweep
#[derive(Debug, Clone, Default)]
pub struct SweepSummary {
    /// Expired legal reasons found
    pub examined: usize,

    /// Legal reasons whose expiry changed at least one field
    pub anonymized: usize,

    /// Legal reasons with nothing left to change
    pub unchanged: usize,

    /// Legal reasons whose record no longer exists
    pub skipped_missing: usize,

    /// Per-record failures; the sweep continued past each of them
    pub failures: Vec<SweepFailure>,

    /// Fields changed across all records
    pub fields_changed: usize,

    /// Records removed by deleting anonymizers
    pub records_deleted: usize,

    /// Whether a shutdown signal stopped the sweep early
    pub interrupted: bool,

    /// Whether this was a dry run
    pub dry_run: bool,

    /// Duration of the sweep
    pub duration: Duration,
}

impl SweepSummary {
    /// Create a new empty summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Record a failure
    pub fn add_failure(&mut self, failure: SweepFailure) {
        self.failures.push(failure);
    }

    /// Legal reasons fully handled
    pub fn processed(&self) -> usize {
        self.anonymized + self.unchanged + self.skipped_missing + self.failures.len()
    }

    /// Check if the sweep had no failures
    pub fn is_successful(&self) -> bool {
        self.failures.is_empty()
    }

    /// Log the summary
    pub fn log_summary(&self) {
        tracing::info!(
            examined = self.examined,
            anonymized = self.anonymized,
            unchanged = self.unchanged,
            skipped_missing = self.skipped_missing,
            failed = self.failures.len(),
            fields_changed = self.fields_changed,
            records_deleted = self.records_deleted,
            interrupted = self.interrupted,
            dry_run = self.dry_run,
            duration_ms = self.duration.as_millis() as u64,
            "Sweep summary"
        );

        for failure in &self.failures {
            tracing::warn!(
                legal_reason = %failure.legal_reason,
                source = %failure.source,
                message = %failure.message,
                "Sweep failure"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::RecordType;

    #[test]
    fn test_sweep_summary_creation() {
        let summary = SweepSummary::new().with_duration(Duration::from_secs(3));
        assert_eq!(summary.examined, 0);
        assert_eq!(summary.duration, Duration::from_secs(3));
        assert!(summary.is_successful());
    }

    #[test]
    fn test_failures_make_sweep_unsuccessful() {
        let mut summary = SweepSummary::new();
        summary.anonymized = 2;
        summary.add_failure(SweepFailure {
            legal_reason: Uuid::new_v4(),
            source: RecordRef::new(RecordType::new("customer").unwrap(), "1"),
            message: "storage unavailable".to_string(),
        });

        assert!(!summary.is_successful());
        assert_eq!(summary.processed(), 3);
    }
}
