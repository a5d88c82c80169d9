use crate::config::sources::{JwtClaims, ParseConfig, SessionTimeoutLocation, TokenLocation};
use crate::session::error::SessionError;
use crate::sources::fetch::{Credential, Lifetime};
use base64::Engine;
use chrono::DateTime;
use http::header::SET_COOKIE;
use http::HeaderMap;
use serde_json::Value;
use tracing::{debug, warn};

/// Extract the session token and its lifetime from a successful login response.
pub fn parse_credential(
    headers: &HeaderMap,
    body: &str,
    parse_config: &ParseConfig,
) -> Result<Credential, SessionError> {
    let json_body: Option<Value> = match serde_json::from_str(body) {
        Ok(v) => Some(v),
        Err(e) => {
            if !body.trim().is_empty() {
                warn!("login response body is not valid JSON: {}", e);
            }
            None
        }
    };

    let value = match &parse_config.token {
        TokenLocation::Body { pointer } => get_body_string(json_body.as_ref(), pointer)?,
        TokenLocation::Header { name } => get_header_value(headers, name)?,
        TokenLocation::Cookie { name } => get_cookie_value(headers, name)?,
    };
    if value.is_empty() {
        return Err(SessionError::InvalidResponse("token value is empty".to_string()));
    }

    let lifetime = match &parse_config.session_timeout {
        None => Lifetime::Configured,
        Some(SessionTimeoutLocation::Body { pointer, unit }) => {
            let amount = get_body_u64(json_body.as_ref(), pointer)?;
            Lifetime::Duration(unit.to_duration(amount))
        }
        Some(SessionTimeoutLocation::Header { name, unit }) => {
            let raw = get_header_value(headers, name)?;
            let amount = raw.trim().parse::<u64>().map_err(|e| {
                SessionError::InvalidResponse(format!("header '{}' is not a number: {}", name, e))
            })?;
            Lifetime::Duration(unit.to_duration(amount))
        }
        Some(SessionTimeoutLocation::Jwt) => {
            let claims = decode_jwt_claims(&value)?;
            let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or_else(|| {
                SessionError::InvalidResponse(format!("jwt exp {} is out of range", claims.exp))
            })?;
            Lifetime::ExpiresAt(expires_at)
        }
    };

    debug!(?lifetime, "login response parsed");
    Ok(Credential { value, lifetime })
}

fn get_body_string(json_body: Option<&Value>, pointer: &str) -> Result<String, SessionError> {
    let json = json_body
        .ok_or_else(|| SessionError::InvalidResponse("JSON body required for body token".to_string()))?;
    json.pointer(pointer)
        .and_then(Value::as_str)
        .map(|s| s.to_owned())
        .ok_or_else(|| {
            SessionError::InvalidResponse(format!("body field '{}' not found or not a string", pointer))
        })
}

fn get_body_u64(json_body: Option<&Value>, pointer: &str) -> Result<u64, SessionError> {
    let json = json_body.ok_or_else(|| {
        SessionError::InvalidResponse("JSON body required for session timeout".to_string())
    })?;
    match json.pointer(pointer) {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        SessionError::InvalidResponse(format!("body field '{}' not found or not an unsigned number", pointer))
    })
}

fn get_header_value(headers: &HeaderMap, key: &str) -> Result<String, SessionError> {
    headers
        .get(key)
        .ok_or_else(|| SessionError::InvalidResponse(format!("header '{}' not found", key)))?
        .to_str()
        .map(|s| s.to_owned())
        .map_err(|e| SessionError::InvalidResponse(format!("invalid header '{}': {}", key, e)))
}

fn get_cookie_value(headers: &HeaderMap, name: &str) -> Result<String, SessionError> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|cookie| {
            let pair = cookie.split(';').next()?;
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim().trim_matches('"').to_owned())
        })
        .next()
        .ok_or_else(|| SessionError::InvalidResponse(format!("cookie '{}' not found", name)))
}

fn decode_jwt_claims(token: &str) -> Result<JwtClaims, SessionError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(SessionError::InvalidResponse("invalid JWT format".to_string()));
    }

    let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| SessionError::InvalidResponse(format!("base64 decode error: {}", e)))?;

    serde_json::from_slice::<JwtClaims>(&decoded)
        .map_err(|e| SessionError::InvalidResponse(format!("invalid JWT payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources::TimeoutUnit;
    use http::HeaderValue;

    fn cfg(token: TokenLocation, session_timeout: Option<SessionTimeoutLocation>) -> ParseConfig {
        ParseConfig { token, session_timeout }
    }

    #[test]
    fn body_token_with_minutes_timeout() {
        let body = r#"{"odata.metadata":"x","SessionId":"4a1c-77","Version":"1000","SessionTimeout":30}"#;
        let parse = cfg(
            TokenLocation::Body { pointer: "/SessionId".into() },
            Some(SessionTimeoutLocation::Body { pointer: "/SessionTimeout".into(), unit: TimeoutUnit::Minutes }),
        );

        let credential = parse_credential(&HeaderMap::new(), body, &parse).unwrap();
        assert_eq!(credential.value, "4a1c-77");
        assert_eq!(credential.lifetime, Lifetime::Duration(chrono::Duration::minutes(30)));
    }

    #[test]
    fn cookie_token_without_timeout_uses_configured_lifetime() {
        let mut headers = HeaderMap::new();
        headers.append(SET_COOKIE, HeaderValue::from_static("ROUTEID=.node1; path=/b1s"));
        headers.append(SET_COOKIE, HeaderValue::from_static("B1SESSION=abc-123; path=/b1s/v1; Secure; HttpOnly"));
        let parse = cfg(TokenLocation::Cookie { name: "B1SESSION".into() }, None);

        let credential = parse_credential(&headers, "", &parse).unwrap();
        assert_eq!(credential.value, "abc-123");
        assert_eq!(credential.lifetime, Lifetime::Configured);
    }

    #[test]
    fn header_token_and_header_timeout() {
        let mut headers = HeaderMap::new();
        headers.insert("x-session", HeaderValue::from_static("hdr-token"));
        headers.insert("x-session-ttl", HeaderValue::from_static("900"));
        let parse = cfg(
            TokenLocation::Header { name: "x-session".into() },
            Some(SessionTimeoutLocation::Header { name: "x-session-ttl".into(), unit: TimeoutUnit::Seconds }),
        );

        let credential = parse_credential(&headers, "not json", &parse).unwrap();
        assert_eq!(credential.value, "hdr-token");
        assert_eq!(credential.lifetime, Lifetime::Duration(chrono::Duration::seconds(900)));
    }

    #[test]
    fn jwt_exp_becomes_absolute_expiry() {
        let payload = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(r#"{"exp":1900000000,"sub":"manager"}"#);
        let jwt = format!("eyJhbGciOiJIUzI1NiJ9.{}.c2ln", payload);
        let body = serde_json::json!({ "access_token": jwt }).to_string();
        let parse = cfg(
            TokenLocation::Body { pointer: "/access_token".into() },
            Some(SessionTimeoutLocation::Jwt),
        );

        let credential = parse_credential(&HeaderMap::new(), &body, &parse).unwrap();
        assert_eq!(
            credential.lifetime,
            Lifetime::ExpiresAt(DateTime::from_timestamp(1_900_000_000, 0).unwrap())
        );
    }

    #[test]
    fn missing_token_is_invalid_response() {
        let parse = cfg(TokenLocation::Body { pointer: "/SessionId".into() }, None);
        let err = parse_credential(&HeaderMap::new(), r#"{"error":{"code":-304}}"#, &parse).unwrap_err();
        assert_eq!(err.reason(), "invalid_response");

        let parse = cfg(TokenLocation::Cookie { name: "B1SESSION".into() }, None);
        assert!(parse_credential(&HeaderMap::new(), "", &parse).is_err());
    }
}
