use http::Method;
use serde::Deserialize;
use std::collections::HashMap;
use crate::config::settings::SettingsConfig;


/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub settings: SettingsConfig,
    pub auth: AuthConfig,
}

/// ================================
/// Authentication endpoint
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// account the session is opened for, also the token store key
    pub account: String,
    pub request: RequestConfig,
    pub parse: ParseConfig,
}

/// HTTP request details
#[derive(Debug, Deserialize, Clone)]
pub struct RequestConfig {
    pub url: String,
    #[serde(with = "http_serde::method", default = "default_method")]
    pub method: Method, // GET, POST
    pub headers: Option<HashMap<String, GenericSourceValue>>,
    pub body: Option<HashMap<String, GenericSourceValue>>,
}

/// Where a header or body value comes from
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum GenericSourceValue {
    Literal {
        value: String,
    },
    FromEnv {
        from_env: String,
    },
    FromFile {
        path: String,
    },
}

/// ================================
/// Parsing - token & session timeout
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ParseConfig {
    pub token: TokenLocation,
    pub session_timeout: Option<SessionTimeoutLocation>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "from", rename_all = "lowercase")]
pub enum TokenLocation {
    /// JSON pointer into the response body
    Body { pointer: String },
    Header { name: String },
    /// cookie name looked up in `Set-Cookie`
    Cookie { name: String },
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(tag = "from", rename_all = "lowercase")]
pub enum SessionTimeoutLocation {
    Body {
        pointer: String,
        #[serde(default)]
        unit: TimeoutUnit,
    },
    Header {
        name: String,
        #[serde(default)]
        unit: TimeoutUnit,
    },
    /// `exp` claim of the token itself
    Jwt,
}

#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutUnit {
    Milliseconds,
    #[default]
    Seconds,
    Minutes,
}

impl TimeoutUnit {
    pub fn to_duration(&self, amount: u64) -> chrono::Duration {
        let amount = amount.min(i64::MAX as u64 / 60_000) as i64;
        match self {
            TimeoutUnit::Milliseconds => chrono::Duration::milliseconds(amount),
            TimeoutUnit::Seconds => chrono::Duration::seconds(amount),
            TimeoutUnit::Minutes => chrono::Duration::minutes(amount),
        }
    }
}

// jwt token
#[derive(Debug, Deserialize)]
pub struct JwtClaims {
    pub exp: i64,
}

fn default_method() -> Method {
    Method::POST
}
