//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Session timing invariants (buffer vs session duration, timeouts)
//! - Authentication request and response extraction rules
//! - Retry / logging / server invariants

use http::{HeaderName, Method};
use std::path::Path;
use tracing::{error, info};

use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::config::sources::{
    AuthConfig, GenericSourceValue, ServiceConfig, SessionTimeoutLocation, TokenLocation,
};
use crate::observability::metrics::get_metrics;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_auth(&cfg.auth, &mut errors);

    if errors.is_empty() {
        info!("config validation passed");
        Ok(())
    } else {
        let metrics = get_metrics().await;
        for e in &errors {
            error!("config validation: {}", e);
            metrics.config_validation_errors.inc();
        }
        Err(errors)
    }
}

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    let session = &settings.session;
    if session.session_timeout_ms == 0 {
        errors.push("settings.session.session_timeout_ms must be > 0".to_string());
    }
    if session.expiry_buffer_ms >= session.session_timeout_ms {
        errors.push(format!(
            "settings.session.expiry_buffer_ms ({}) must be < session_timeout_ms ({})",
            session.expiry_buffer_ms, session.session_timeout_ms
        ));
    }
    if session.request_timeout_ms == 0 {
        errors.push("settings.session.request_timeout_ms must be > 0".to_string());
    }
    if session.token_file.trim().is_empty() {
        errors.push("settings.session.token_file must not be empty".to_string());
    } else if Path::new(&session.token_file).is_dir() {
        errors.push(format!(
            "settings.session.token_file '{}' is a directory",
            session.token_file
        ));
    }

    if let Some(retry) = &settings.retry {
        validate_retry(retry, errors);
    }

    if let Some(logging) = &settings.logging {
        if !LOG_LEVELS.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' must be one of {:?}",
                logging.level, LOG_LEVELS
            ));
        }
    }

    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!("settings.server.port '{}' is not a valid port", settings.server.port));
    }
    if settings.metrics.is_enabled && !settings.metrics.path.starts_with('/') {
        errors.push(format!("settings.metrics.path '{}' must start with '/'", settings.metrics.path));
    }
}

fn validate_retry(retry: &RetryConfig, errors: &mut Vec<String>) {
    if retry.attempts == Some(0) {
        errors.push("settings.retry.attempts must be >= 1".to_string());
    }
    if let (Some(base), Some(max)) = (retry.base_delay_ms, retry.max_delay_ms) {
        if max < base {
            errors.push(format!(
                "settings.retry.max_delay_ms ({}) must be >= base_delay_ms ({})",
                max, base
            ));
        }
    }
}

fn validate_auth(auth: &AuthConfig, errors: &mut Vec<String>) {
    if auth.account.trim().is_empty() {
        errors.push("auth.account must not be empty".to_string());
    }

    let request = &auth.request;
    match reqwest::Url::parse(&request.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!("auth.request.url scheme '{}' is not http(s)", url.scheme())),
        Err(e) => errors.push(format!("auth.request.url '{}' is invalid: {}", request.url, e)),
    }
    if request.method != Method::GET && request.method != Method::POST {
        errors.push(format!("auth.request.method '{}' must be GET or POST", request.method));
    }
    if request.method == Method::GET && request.body.is_some() {
        errors.push("auth.request.body is not allowed with GET".to_string());
    }

    if let Some(headers) = &request.headers {
        for (name, value) in headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                errors.push(format!("auth.request.headers['{}'] is not a valid header name", name));
            }
            validate_value(&format!("auth.request.headers['{}']", name), value, errors);
        }
    }
    if let Some(body) = &request.body {
        for (key, value) in body {
            validate_value(&format!("auth.request.body['{}']", key), value, errors);
        }
    }

    match &auth.parse.token {
        TokenLocation::Body { pointer } => validate_pointer("auth.parse.token.pointer", pointer, errors),
        TokenLocation::Header { name } => validate_header_name("auth.parse.token.name", name, errors),
        TokenLocation::Cookie { name } => {
            if name.trim().is_empty() {
                errors.push("auth.parse.token.name must not be empty".to_string());
            }
        }
    }

    match &auth.parse.session_timeout {
        Some(SessionTimeoutLocation::Body { pointer, .. }) => {
            validate_pointer("auth.parse.session_timeout.pointer", pointer, errors)
        }
        Some(SessionTimeoutLocation::Header { name, .. }) => {
            validate_header_name("auth.parse.session_timeout.name", name, errors)
        }
        Some(SessionTimeoutLocation::Jwt) | None => {}
    }
}

fn validate_value(field: &str, value: &GenericSourceValue, errors: &mut Vec<String>) {
    match value {
        GenericSourceValue::Literal { .. } => {}
        GenericSourceValue::FromEnv { from_env } => {
            if from_env.trim().is_empty() {
                errors.push(format!("{}.from_env must not be empty", field));
            }
        }
        GenericSourceValue::FromFile { path } => {
            if path.trim().is_empty() {
                errors.push(format!("{}.path must not be empty", field));
            }
        }
    }
}

fn validate_pointer(field: &str, pointer: &str, errors: &mut Vec<String>) {
    if !pointer.starts_with('/') {
        errors.push(format!("{} '{}' must be a JSON pointer starting with '/'", field, pointer));
    }
}

fn validate_header_name(field: &str, name: &str, errors: &mut Vec<String>) {
    if HeaderName::from_bytes(name.as_bytes()).is_err() {
        errors.push(format!("{} '{}' is not a valid header name", field, name));
    }
}
