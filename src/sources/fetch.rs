/// Authentication sources
///
/// The exchange that opens a session on the external endpoint, and the
/// HTTP implementation driven by the `auth` block of the config.

use http::StatusCode;
use reqwest::Client;
use serde_json::{Map, Value};
use std::future::Future;
use std::{env, fs};
use tracing::{debug, warn};

use chrono::{DateTime, Utc};

use crate::config::sources::{AuthConfig, GenericSourceValue};
use crate::parser::parser;
use crate::session::error::SessionError;

/// How long a freshly issued session lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifetime {
    /// the response said nothing, the configured session timeout applies
    Configured,
    Duration(chrono::Duration),
    ExpiresAt(DateTime<Utc>),
}

/// Raw outcome of one successful authentication exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub lifetime: Lifetime,
}

/// One authentication round-trip against the external endpoint.
pub trait Authenticator: Send + Sync + 'static {
    /// Account the session is opened for.
    fn account(&self) -> &str;

    fn authenticate(&self) -> impl Future<Output = Result<Credential, SessionError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    config: AuthConfig,
    client: Client,
}

impl HttpAuthenticator {
    pub fn new(config: AuthConfig, client: Client) -> Self {
        Self { config, client }
    }
}

impl Authenticator for HttpAuthenticator {
    fn account(&self) -> &str {
        &self.config.account
    }

    async fn authenticate(&self) -> Result<Credential, SessionError> {
        let req_cfg = &self.config.request;
        let mut request = self.client.request(req_cfg.method.clone(), &req_cfg.url);

        // Build headers dynamically
        if let Some(headers) = &req_cfg.headers {
            for (key, v) in headers {
                let value = prepare_generic_source_value(v)?;
                request = request.header(key, value);
            }
        }
        // Build body dynamically
        if let Some(source_body) = &req_cfg.body {
            let mut body = Map::new();
            for (k, v) in source_body {
                body.insert(k.to_owned(), Value::String(prepare_generic_source_value(v)?));
            }
            request = request.json(&body);
        }

        debug!(url = %req_cfg.url, method = %req_cfg.method, "sending login request");
        let response = request.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(status_to_error(status, &body));
        }
        parser::parse_credential(&headers, &body, &self.config.parse)
    }
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 300;

fn status_to_error(status: StatusCode, body: &str) -> SessionError {
    let truncated: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            warn!(%status, "login rejected");
            SessionError::Authentication(format!("{}: {}", status, truncated))
        }
        _ => SessionError::Transport(format!("login failed with {}: {}", status, truncated)),
    }
}

fn prepare_generic_source_value(value: &GenericSourceValue) -> Result<String, SessionError> {
    match value {
        GenericSourceValue::Literal { value } => Ok(value.to_owned()),
        GenericSourceValue::FromEnv { from_env } => env::var(from_env).map_err(|err| {
            SessionError::Authentication(format!("credential env '{}' unavailable: {}", from_env, err))
        }),
        GenericSourceValue::FromFile { path } => fs::read_to_string(path)
            .map(|res| res.trim().to_string())
            .map_err(|err| SessionError::Io(format!("credential file '{}': {}", path, err))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources::{ParseConfig, RequestConfig, TokenLocation};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn auth_config(url: String) -> AuthConfig {
        let mut body = HashMap::new();
        body.insert("CompanyDB".to_string(), GenericSourceValue::Literal { value: "SBODEMOUS".into() });
        body.insert("UserName".to_string(), GenericSourceValue::Literal { value: "manager".into() });
        body.insert("Password".to_string(), GenericSourceValue::Literal { value: "secret".into() });
        AuthConfig {
            account: "manager".into(),
            request: RequestConfig {
                url,
                method: http::Method::POST,
                headers: None,
                body: Some(body),
            },
            parse: ParseConfig {
                token: TokenLocation::Body { pointer: "/SessionId".into() },
                session_timeout: None,
            },
        }
    }

    #[tokio::test]
    async fn successful_login_yields_credential() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/b1s/v1/Login")
                    .json_body(json!({"CompanyDB": "SBODEMOUS", "UserName": "manager", "Password": "secret"}));
                then.status(200).json_body(json!({"SessionId": "sid-1", "SessionTimeout": 30}));
            })
            .await;

        let auth = HttpAuthenticator::new(auth_config(server.url("/b1s/v1/Login")), Client::new());
        let credential = auth.authenticate().await.unwrap();
        assert_eq!(credential.value, "sid-1");
        assert_eq!(credential.lifetime, Lifetime::Configured);
        assert_eq!(auth.account(), "manager");
    }

    #[tokio::test]
    async fn rejected_credentials_map_to_authentication_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/b1s/v1/Login");
                then.status(401).json_body(json!({"error": {"code": 100000027, "message": "Fail to get DB Credentials"}}));
            })
            .await;

        let auth = HttpAuthenticator::new(auth_config(server.url("/b1s/v1/Login")), Client::new());
        let err = auth.authenticate().await.unwrap_err();
        assert_eq!(err.reason(), "authentication");
    }

    #[tokio::test]
    async fn server_errors_are_transport_errors() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/b1s/v1/Login");
                then.status(503).body("maintenance");
            })
            .await;

        let auth = HttpAuthenticator::new(auth_config(server.url("/b1s/v1/Login")), Client::new());
        let err = auth.authenticate().await.unwrap_err();
        assert_eq!(err.reason(), "transport");
        assert!(err.is_retryable());
    }

    #[test]
    fn file_values_are_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"  s3cret\n").unwrap();
        let value = GenericSourceValue::FromFile { path: file.path().display().to_string() };
        assert_eq!(prepare_generic_source_value(&value).unwrap(), "s3cret");
    }
}
