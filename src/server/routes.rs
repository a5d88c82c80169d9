use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::server::server::AppState;
use crate::session::{SessionError, SessionManager, SessionPhase, Token};
use crate::sources::fetch::Authenticator;

pub struct SessionRoutesState<A: Authenticator> {
    pub session: SessionManager<A>,
}

impl<A: Authenticator> Clone for SessionRoutesState<A> {
    fn clone(&self) -> Self {
        Self { session: self.session.clone() }
    }
}

impl<A: Authenticator> SessionRoutesState<A> {
    pub fn new(session: SessionManager<A>) -> Self {
        Self { session }
    }

    pub fn router(&self) -> Router<AppState<A>> {
        Router::new()
            .route("/token", get(get_token::<A>))
            .route("/token/renew", post(renew_token::<A>))
            .route("/token/invalidate", post(invalidate_token::<A>))
            .route("/health", get(health::<A>))
    }
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    token: String,
    expires_at: DateTime<Utc>,
    source: String,
}

impl From<Token> for TokenResponse {
    fn from(token: Token) -> Self {
        Self {
            token: token.value,
            expires_at: token.expires_at,
            source: token.source,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
}

fn error_response(err: SessionError) -> Response {
    let status = match &err {
        SessionError::Authentication(_) => StatusCode::UNAUTHORIZED,
        SessionError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        SessionError::Transport(_) | SessionError::InvalidResponse(_) => StatusCode::BAD_GATEWAY,
        SessionError::Io(_) | SessionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(%status, error = %err, "token request failed");
    (
        status,
        Json(ErrorResponse {
            error: err.reason(),
            message: err.to_string(),
        }),
    )
        .into_response()
}

async fn get_token<A: Authenticator>(State(state): State<AppState<A>>) -> Response {
    match state.session_state.session.get_token().await {
        Ok(token) => Json(TokenResponse::from(token)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn renew_token<A: Authenticator>(State(state): State<AppState<A>>) -> Response {
    info!("forced renewal requested");
    match state.session_state.session.renew().await {
        Ok(token) => Json(TokenResponse::from(token)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn invalidate_token<A: Authenticator>(State(state): State<AppState<A>>) -> StatusCode {
    state.session_state.session.invalidate().await;
    StatusCode::NO_CONTENT
}

async fn health<A: Authenticator>(State(state): State<AppState<A>>) -> Response {
    let snapshot = state.session_state.session.snapshot().await;
    let status = match snapshot.phase {
        SessionPhase::Failed => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(snapshot)).into_response()
}
