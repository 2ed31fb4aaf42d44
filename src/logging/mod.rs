//! Logging and observability
//!
//! This module provides structured logging with support for:
//! - Configurable log levels
//! - Console output
//! - JSON-formatted local file logging with rotation
//!
//! Personal data never goes into log fields; records are identified by their
//! `type:id` reference only.
//!
//! # Example
//!
//! ```no_run
//! use custodian::logging::init_logging;
//! use custodian::config::LoggingConfig;
//!
//! let config = LoggingConfig::default();
//! let _guard = init_logging("info", &config).expect("Failed to initialize logging");
//!
//! tracing::info!("Application started");
//! ```

pub mod structured;

// Re-export commonly used items
pub use structured::{init_logging, LoggingGuard};

/// Log the start of a retention sweep
///
/// # Example
///
/// ```no_run
/// use custodian::log_sweep_start;
///
/// log_sweep_start!(Some(30u32), false);
/// ```
#[macro_export]
macro_rules! log_sweep_start {
    ($lookback_days:expr, $dry_run:expr) => {
        tracing::info!(
            lookback_days = ?$lookback_days,
            dry_run = $dry_run,
            "Starting retention sweep"
        );
    };
}

/// Log the completion of a retention sweep
///
/// # Example
///
/// ```no_run
/// use custodian::log_sweep_complete;
/// use std::time::Duration;
///
/// log_sweep_complete!(12, 3, Duration::from_secs(2));
/// ```
#[macro_export]
macro_rules! log_sweep_complete {
    ($examined:expr, $anonymized:expr, $duration:expr) => {
        tracing::info!(
            examined = $examined,
            anonymized = $anonymized,
            duration_ms = $duration.as_millis() as u64,
            "Retention sweep completed"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use custodian::log_error_with_context;
/// use custodian::domain::CustodianError;
///
/// let error = CustodianError::Configuration("Unknown purpose".to_string());
/// log_error_with_context!(&error, "Failed to load configuration");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
