use std::{fs, path::Path};
use crate::config::settings::{LogFormat, LoggingConfig, RetryConfig};
use crate::config::sources::ServiceConfig;
use crate::config::proc_validator;
use crate::observability::metrics::get_metrics;
use crate::utils::constants::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS};
use anyhow::{anyhow, Result};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, error};

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow!("cannot read config {}: {}", path.display(), e))?;

    let expanded = expand_env_vars(&content);
    parse_config(expanded).await
}

pub async fn parse_config(content: String) -> Result<ServiceConfig> {
    let metrics = get_metrics().await;
    let mut service_config: ServiceConfig = serde_yaml::from_str(&content)
        .inspect_err(|e| {
            error!("parse config error: {}", e);
            metrics.config_validation_errors.inc();
        })?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::new("info".to_owned(), LogFormat::Compact));
    }
    let retry = service_config.settings.retry.take();
    service_config.settings.retry = Some(RetryConfig {
        attempts: retry.as_ref().and_then(|r| r.attempts).or(Some(DEFAULT_RETRY_ATTEMPTS)),
        base_delay_ms: retry.as_ref().and_then(|r| r.base_delay_ms).or(Some(DEFAULT_RETRY_BASE_DELAY_MS)),
        max_delay_ms: retry.as_ref().and_then(|r| r.max_delay_ms).or(Some(DEFAULT_RETRY_MAX_DELAY_MS)),
    });

    debug!("validation config ...");
    proc_validator::validate_service_config(&service_config)
        .await
        .map_err(|errors| anyhow!("invalid config:\n  - {}", errors.join("\n  - ")))?;

    Ok(service_config)
}

/// Replace `${VAR}` and `${VAR:default}` with environment values.
pub fn expand_env_vars(input: &str) -> String {
    static ENV_VAR: OnceLock<Regex> = OnceLock::new();
    let re = ENV_VAR.get_or_init(|| {
        Regex::new(r"\$\{(\w+)(?::([^\}]*))?\}").expect("env var pattern is valid")
    });
    re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}
