use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::session::error::SessionError;

/// Session token issued by the authentication endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub value: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// account the token was issued for
    pub source: String,
}

impl Token {
    /// Fails when the issued lifetime does not fit in a timestamp.
    pub fn new(
        value: String,
        issued_at: DateTime<Utc>,
        session_duration: Duration,
        source: String,
    ) -> Result<Self, SessionError> {
        let expires_at = issued_at.checked_add_signed(session_duration).ok_or_else(|| {
            SessionError::InvalidResponse(format!("session lifetime out of range: {}s", session_duration.num_seconds()))
        })?;
        Ok(Self {
            value,
            issued_at,
            expires_at,
            source,
        })
    }
}

/// Lifetime rules shared by every token the manager hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub session_duration: Duration,
    pub expiry_buffer: Duration,
}

impl ExpiryPolicy {
    pub fn new(session_duration: Duration, expiry_buffer: Duration) -> Self {
        Self { session_duration, expiry_buffer }
    }

    /// Moment from which the token should be renewed ahead of expiry.
    pub fn renew_at(&self, token: &Token) -> DateTime<Utc> {
        token
            .expires_at
            .checked_sub_signed(self.expiry_buffer)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    pub fn is_expired(&self, token: &Token, now: DateTime<Utc>) -> bool {
        now >= token.expires_at
    }

    pub fn is_renewable_soon(&self, token: &Token, now: DateTime<Utc>) -> bool {
        now >= self.renew_at(token)
    }

    /// A token is usable when it is outside the renewal buffer.
    pub fn is_usable(&self, token: &Token, now: DateTime<Utc>) -> bool {
        !self.is_renewable_soon(token, now)
    }

    pub fn phase_of(&self, token: &Token, now: DateTime<Utc>) -> SessionPhase {
        if self.is_expired(token, now) {
            SessionPhase::Expired
        } else if self.is_renewable_soon(token, now) {
            SessionPhase::NearExpiry
        } else {
            SessionPhase::Valid
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Uninitialized,
    Valid,
    NearExpiry,
    Expired,
    Renewing,
    Failed,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Uninitialized => "uninitialized",
            SessionPhase::Valid => "valid",
            SessionPhase::NearExpiry => "near_expiry",
            SessionPhase::Expired => "expired",
            SessionPhase::Renewing => "renewing",
            SessionPhase::Failed => "failed",
        }
    }
}
