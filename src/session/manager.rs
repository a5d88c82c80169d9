//! Session token manager.
//!
//! Serves a token that is valid for at least the expiry buffer, renewing it
//! through the [`Authenticator`] when needed. Concurrent callers that find no
//! usable token share one in-flight renewal: the renewal runs on its own task,
//! and every waiter receives the same token or the same error. A waiter that
//! gives up does not cancel the renewal.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::helpers::time::{get_instant, Clock, SystemClock};
use crate::observability::metrics::get_metrics;
use crate::session::error::SessionError;
use crate::session::store::TokenStore;
use crate::session::token::{ExpiryPolicy, SessionPhase, Token};
use crate::sources::fetch::{Authenticator, Lifetime};

type SharedRenewal = Shared<BoxFuture<'static, Result<Token, SessionError>>>;

/// Handle to the process-wide session. Cheap to clone.
pub struct SessionManager<A: Authenticator> {
    inner: Arc<Inner<A>>,
}

impl<A: Authenticator> Clone for SessionManager<A> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

struct Inner<A> {
    authenticator: A,
    store: TokenStore,
    policy: ExpiryPolicy,
    request_timeout: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
}

#[derive(Default)]
struct SessionState {
    cached: Option<Token>,
    /// kept for diagnostics after invalidation or expiry, never served
    last_known: Option<Token>,
    inflight: Option<(u64, SharedRenewal)>,
    next_generation: u64,
    last_failure: Option<SessionError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub account: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_known_expires_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct Renewal {
    shared: SharedRenewal,
    /// another caller started it
    joined: bool,
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Expiry,
    Forced,
}

impl Trigger {
    fn as_str(&self) -> &'static str {
        match self {
            Trigger::Expiry => "expiry",
            Trigger::Forced => "forced",
        }
    }
}

impl<A: Authenticator> SessionManager<A> {
    /// Build the manager and seed it from the token store.
    pub async fn init(
        authenticator: A,
        store: TokenStore,
        policy: ExpiryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, SessionError> {
        Self::init_with_clock(authenticator, store, policy, request_timeout, Arc::new(SystemClock)).await
    }

    pub async fn init_with_clock(
        authenticator: A,
        store: TokenStore,
        policy: ExpiryPolicy,
        request_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        let stored = store.load().await.inspect_err(|e| {
            error!(path = %store.path().display(), error = %e, "cannot read token store");
        })?;

        let mut state = SessionState::default();
        if let Some(token) = stored {
            let now = clock.now();
            if policy.is_usable(&token, now) {
                info!(expires_at = %token.expires_at, "reusing stored session token");
                get_metrics().await.token_expiry_unix.set(token.expires_at.timestamp());
                state.cached = Some(token);
            } else {
                info!(expires_at = %token.expires_at, "stored session token is due for renewal");
                state.last_known = Some(token);
            }
        }

        Ok(Self {
            inner: Arc::new(Inner {
                authenticator,
                store,
                policy,
                request_timeout,
                clock,
                state: Mutex::new(state),
            }),
        })
    }

    /// Return a token that is outside the renewal buffer, renewing first if needed.
    pub async fn get_token(&self) -> Result<Token, SessionError> {
        let metrics = get_metrics().await;
        let renewal = {
            let mut state = self.inner.state.lock().await;
            let now = self.inner.clock.now();
            match &state.cached {
                Some(token) if self.inner.policy.is_usable(token, now) => {
                    metrics.token_requests.with_label_values(&["cached"]).inc();
                    return Ok(token.clone());
                }
                Some(token) => {
                    debug!(
                        phase = self.inner.policy.phase_of(token, now).as_str(),
                        expires_at = %token.expires_at,
                        "cached token needs renewal"
                    );
                }
                None => debug!("no cached token"),
            }
            self.join_or_start(&mut state, Trigger::Expiry)
        };
        if renewal.joined {
            metrics.renewal_waiters.inc();
        }

        match renewal.shared.await {
            Ok(token) => {
                metrics.token_requests.with_label_values(&["renewed"]).inc();
                Ok(token)
            }
            Err(SessionError::Io(reason)) => {
                // renewed but not persisted: the in-memory token is still good
                let state = self.inner.state.lock().await;
                let now = self.inner.clock.now();
                match state.cached.as_ref().filter(|t| self.inner.policy.is_usable(t, now)) {
                    Some(token) => {
                        warn!(%reason, "serving in-memory token, store write failed");
                        metrics.token_requests.with_label_values(&["renewed"]).inc();
                        Ok(token.clone())
                    }
                    None => {
                        metrics.token_requests.with_label_values(&["failed"]).inc();
                        Err(SessionError::Io(reason))
                    }
                }
            }
            Err(e) => {
                metrics.token_requests.with_label_values(&["failed"]).inc();
                Err(e)
            }
        }
    }

    /// Perform one authentication exchange regardless of the cached token.
    ///
    /// Joins a renewal that is already in flight instead of starting a second one.
    pub async fn renew(&self) -> Result<Token, SessionError> {
        let renewal = {
            let mut state = self.inner.state.lock().await;
            self.join_or_start(&mut state, Trigger::Forced)
        };
        if renewal.joined {
            get_metrics().await.renewal_waiters.inc();
        }
        renewal.shared.await
    }

    /// Forget the cached token, e.g. after the downstream service answered 401.
    ///
    /// The token file is left alone; the next renewal overwrites it.
    pub async fn invalidate(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(token) = state.cached.take() {
            info!(expires_at = %token.expires_at, "session token invalidated");
            state.last_known = Some(token);
        }
        let metrics = get_metrics().await;
        metrics.invalidations.inc();
        metrics.token_expiry_unix.set(0);
    }

    pub async fn phase(&self) -> SessionPhase {
        let state = self.inner.state.lock().await;
        self.phase_locked(&state)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.inner.state.lock().await;
        SessionSnapshot {
            phase: self.phase_locked(&state),
            account: self.inner.authenticator.account().to_owned(),
            expires_at: state.cached.as_ref().map(|t| t.expires_at),
            last_known_expires_at: state.last_known.as_ref().map(|t| t.expires_at),
            last_error: state.last_failure.as_ref().map(|e| e.to_string()),
        }
    }

    fn phase_locked(&self, state: &SessionState) -> SessionPhase {
        if state.inflight.is_some() {
            return SessionPhase::Renewing;
        }
        if let Some(token) = &state.cached {
            let now = self.inner.clock.now();
            if state.last_failure.is_some() && !self.inner.policy.is_usable(token, now) {
                return SessionPhase::Failed;
            }
            return self.inner.policy.phase_of(token, now);
        }
        if state.last_failure.is_some() {
            return SessionPhase::Failed;
        }
        SessionPhase::Uninitialized
    }

    fn join_or_start(&self, state: &mut SessionState, trigger: Trigger) -> Renewal {
        if let Some((generation, renewal)) = &state.inflight {
            debug!(generation, "joining in-flight renewal");
            return Renewal { shared: renewal.clone(), joined: true };
        }

        let generation = state.next_generation;
        state.next_generation += 1;

        let inner = self.inner.clone();
        let handle = tokio::spawn(async move { inner.run_renewal(generation, trigger).await });
        let renewal: SharedRenewal = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(SessionError::Internal(format!("renewal task failed: {}", e))))
        }
        .boxed()
        .shared();

        state.inflight = Some((generation, renewal.clone()));
        Renewal { shared: renewal, joined: false }
    }
}

impl<A: Authenticator> Inner<A> {
    async fn run_renewal(&self, generation: u64, trigger: Trigger) -> Result<Token, SessionError> {
        let metrics = get_metrics().await;
        let account = self.authenticator.account().to_owned();
        info!(generation, trigger = trigger.as_str(), %account, "renewing session token");
        metrics.renewals.with_label_values(&[trigger.as_str()]).inc();

        let start = get_instant();
        let outcome = match tokio::time::timeout(self.request_timeout, self.authenticator.authenticate()).await {
            Ok(Ok(credential)) => {
                let issued_at = self.clock.now();
                let session_duration = match credential.lifetime {
                    Lifetime::Configured => self.policy.session_duration,
                    Lifetime::Duration(d) => d,
                    Lifetime::ExpiresAt(at) => at - issued_at,
                };
                Token::new(credential.value, issued_at, session_duration, account)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SessionError::Timeout(self.request_timeout)),
        };
        let elapsed = start.elapsed().as_secs_f64();

        let token = match outcome {
            Ok(token) => token,
            Err(e) => {
                error!(generation, error = %e, "session renewal failed");
                metrics.renewal_duration.with_label_values(&["failure"]).observe(elapsed);
                metrics.renewal_failures.with_label_values(&[e.reason()]).inc();
                let mut state = self.state.lock().await;
                self.finish(&mut state, generation);
                // an expired token must never be served again
                if let Some(old) = state.cached.take() {
                    if self.policy.is_expired(&old, self.clock.now()) {
                        state.last_known = Some(old);
                    } else {
                        state.cached = Some(old);
                    }
                }
                state.last_failure = Some(e.clone());
                return Err(e);
            }
        };
        metrics.renewal_duration.with_label_values(&["success"]).observe(elapsed);

        if !self.policy.is_usable(&token, token.issued_at) {
            warn!(
                expires_at = %token.expires_at,
                "issued session is shorter than the expiry buffer, every call will renew"
            );
        }

        let persisted = self.store.save(&token).await.inspect_err(|e| {
            error!(generation, error = %e, "cannot persist session token");
            metrics.store_failures.with_label_values(&["write"]).inc();
        });

        let mut state = self.state.lock().await;
        self.finish(&mut state, generation);
        if let Some(old) = state.cached.replace(token.clone()) {
            state.last_known = Some(old);
        }
        metrics.token_expiry_unix.set(token.expires_at.timestamp());
        info!(generation, expires_at = %token.expires_at, "session token renewed");

        match persisted {
            Ok(()) => {
                state.last_failure = None;
                Ok(token)
            }
            Err(e) => {
                state.last_failure = Some(e.clone());
                Err(e)
            }
        }
    }

    fn finish(&self, state: &mut SessionState, generation: u64) {
        if state.inflight.as_ref().map(|(g, _)| *g) == Some(generation) {
            state.inflight = None;
        }
    }
}
