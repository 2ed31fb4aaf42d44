//! Configuration loader with TOML parsing and environment variable overrides

use super::schema::CustodianConfig;
use crate::config::secret_string;
use crate::domain::errors::CustodianError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// This function:
/// 1. Reads the TOML file
/// 2. Performs environment variable substitution (${VAR} syntax)
/// 3. Parses the TOML into CustodianConfig
/// 4. Applies environment variable overrides (CUSTODIAN_* prefix)
/// 5. Validates the configuration, including every purpose's field matrix
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Errors
///
/// Returns [`CustodianError::Configuration`] if:
/// - File cannot be read
/// - TOML parsing fails (including unknown field transforms)
/// - A referenced environment variable is not set
/// - Configuration validation fails
///
/// # Examples
///
/// ```no_run
/// use custodian::config::load_config;
///
/// let config = load_config("custodian.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CustodianConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(CustodianError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CustodianError::Configuration(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;

    parse_config(&contents)
}

/// Parses, overrides and validates configuration text
///
/// # Errors
///
/// Same as [`load_config`], minus file access.
pub fn parse_config(contents: &str) -> Result<CustodianConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: CustodianConfig = toml::from_str(&contents)
        .map_err(|e| CustodianError::Configuration(format!("Failed to parse TOML: {}", e)))?;

    apply_env_overrides(&mut config);

    config.validate().map_err(|e| {
        CustodianError::Configuration(format!("Configuration validation failed: {}", e))
    })?;

    Ok(config)
}

/// Substitutes environment variables in the format ${VAR_NAME}
///
/// Comment lines are left untouched.
///
/// # Errors
///
/// Returns an error listing every referenced environment variable that is not set
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| CustodianError::Configuration(format!("Invalid substitution pattern: {e}")))?;
    let mut lines = Vec::new();
    let mut missing_vars: Vec<String> = Vec::new();

    for line in input.lines() {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_string());
            continue;
        }

        let mut processed_line = line.to_string();
        for cap in re.captures_iter(line) {
            let var_name = &cap[1];
            match std::env::var(var_name) {
                Ok(value) => {
                    processed_line = processed_line.replace(&format!("${{{var_name}}}"), &value);
                }
                Err(_) => {
                    if !missing_vars.iter().any(|v| v == var_name) {
                        missing_vars.push(var_name.to_string());
                    }
                }
            }
        }
        lines.push(processed_line);
    }

    if !missing_vars.is_empty() {
        return Err(CustodianError::Configuration(format!(
            "Missing required environment variables: {}",
            missing_vars.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

/// Applies environment variable overrides using CUSTODIAN_* prefix
///
/// Environment variables follow the pattern: CUSTODIAN_<SECTION>_<KEY>
/// For example: CUSTODIAN_APPLICATION_LOG_LEVEL, CUSTODIAN_ENCRYPTION_BASE_KEY
fn apply_env_overrides(config: &mut CustodianConfig) {
    // Application overrides
    if let Ok(val) = std::env::var("CUSTODIAN_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Ok(val) = std::env::var("CUSTODIAN_APPLICATION_DRY_RUN") {
        config.application.dry_run = val.parse().unwrap_or(false);
    }

    // Encryption overrides
    if let Ok(val) = std::env::var("CUSTODIAN_ENCRYPTION_BASE_KEY") {
        config.encryption.base_key = secret_string(val);
    }

    // Sweep overrides
    if let Ok(val) = std::env::var("CUSTODIAN_SWEEP_LOOKBACK_DAYS") {
        if let Ok(days) = val.parse() {
            config.sweep.lookback_days = Some(days);
        }
    }

    // Storage overrides
    if let Ok(val) = std::env::var("CUSTODIAN_STORAGE_SNAPSHOT_PATH") {
        config.storage.snapshot_path = val;
    }

    // Audit overrides
    if let Ok(val) = std::env::var("CUSTODIAN_AUDIT_ENABLED") {
        config.audit.enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("CUSTODIAN_AUDIT_LOG_PATH") {
        config.audit.log_path = val;
    }
    if let Ok(val) = std::env::var("CUSTODIAN_AUDIT_JSON_FORMAT") {
        config.audit.json_format = val.parse().unwrap_or(true);
    }

    // Logging overrides
    if let Ok(val) = std::env::var("CUSTODIAN_LOGGING_LOCAL_ENABLED") {
        config.logging.local_enabled = val.parse().unwrap_or(true);
    }
    if let Ok(val) = std::env::var("CUSTODIAN_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("CUSTODIAN_LOGGING_LOCAL_ROTATION") {
        config.logging.local_rotation = val;
    }
}
