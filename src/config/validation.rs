//! Configuration validation.
//!
//! Serde handles the syntactic layer; this module checks values that parse
//! but make no sense (bad URLs, zero budgets, oversized seeds). All problems
//! are collected rather than stopping at the first one.

use std::fmt;

use crate::config::schema::ClientConfig;
use crate::ledger::address::MAX_SEED_LEN;
use crate::ledger::types::Pubkey;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// What is wrong with it.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_url(&mut errors, "ledger.rpc_url", &config.ledger.rpc_url);
    for url in &config.ledger.failover_urls {
        check_url(&mut errors, "ledger.failover_urls", url);
    }
    if config.ledger.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("ledger.rpc_timeout_secs", "must be greater than 0"));
    }

    if config.program.program_id.parse::<Pubkey>().is_err() {
        errors.push(ValidationError::new(
            "program.program_id",
            format!("'{}' is not a base58 public key", config.program.program_id),
        ));
    }
    if config.program.seed_tag.is_empty() {
        errors.push(ValidationError::new("program.seed_tag", "must not be empty"));
    } else if config.program.seed_tag.len() > MAX_SEED_LEN {
        errors.push(ValidationError::new(
            "program.seed_tag",
            format!("{} bytes exceeds the {} byte seed limit", config.program.seed_tag.len(), MAX_SEED_LEN),
        ));
    }

    let submitter = &config.submitter;
    if submitter.create_max_attempts == 0 {
        errors.push(ValidationError::new("submitter.create_max_attempts", "must be at least 1"));
    }
    if submitter.transfer_max_attempts == 0 {
        errors.push(ValidationError::new("submitter.transfer_max_attempts", "must be at least 1"));
    }
    if submitter.max_delay_ms < submitter.base_delay_ms {
        errors.push(ValidationError::new("submitter.max_delay_ms", "must not be below base_delay_ms"));
    }
    if submitter.confirm_poll_interval_ms == 0 {
        errors.push(ValidationError::new("submitter.confirm_poll_interval_ms", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &str, raw: &str) {
    match url::Url::parse(raw) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("'{}': {}", raw, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ClientConfig::default()).is_ok());
    }

    #[test]
    fn test_oversized_seed_tag() {
        let mut config = ClientConfig::default();
        config.program.seed_tag = "x".repeat(MAX_SEED_LEN + 1);
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "program.seed_tag");
    }

    #[test]
    fn test_bad_program_id_and_scheme() {
        let mut config = ClientConfig::default();
        config.program.program_id = "not-base58-0OIl".to_string();
        config.ledger.failover_urls.push("ws://127.0.0.1:8900".to_string());
        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert!(fields.contains(&"program.program_id"));
        assert!(fields.contains(&"ledger.failover_urls"));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = ClientConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
