// shared fixtures for the integration-style tests
pub use axum::Router;
pub use tokio::task::JoinHandle;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::helpers::time::ManualClock;
use crate::session::{ExpiryPolicy, SessionError, SessionManager, TokenStore};
use crate::sources::fetch::{Authenticator, Credential, Lifetime};

pub const ACCOUNT: &str = "manager";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap()
}

/// 1800s sessions renewed 60s ahead, as in production.
pub fn policy() -> ExpiryPolicy {
    ExpiryPolicy::new(chrono::Duration::seconds(1800), chrono::Duration::seconds(60))
}

pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Scripted authenticator: counts calls, optionally sleeps, replays queued outcomes.
#[derive(Clone)]
pub struct FakeAuthenticator {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    lifetime: Lifetime,
    outcomes: Arc<Mutex<Vec<Result<String, SessionError>>>>,
}

impl FakeAuthenticator {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            lifetime: Lifetime::Configured,
            outcomes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Lifetime reported with every issued credential.
    pub fn with_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Queue an outcome; once the queue is empty every call yields `session-<n>`.
    pub fn push(&self, outcome: Result<&str, SessionError>) {
        self.outcomes.lock().unwrap().push(outcome.map(|s| s.to_owned()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Authenticator for FakeAuthenticator {
    fn account(&self) -> &str {
        ACCOUNT
    }

    async fn authenticate(&self) -> Result<Credential, SessionError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = {
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() { None } else { Some(outcomes.remove(0)) }
        };
        let value = match scripted {
            Some(outcome) => outcome?,
            None => format!("session-{}", n),
        };
        Ok(Credential { value, lifetime: self.lifetime })
    }
}

pub async fn manager_at(
    auth: FakeAuthenticator,
    token_file: &Path,
    clock: &ManualClock,
) -> SessionManager<FakeAuthenticator> {
    SessionManager::init_with_clock(
        auth,
        TokenStore::new(token_file, ACCOUNT),
        policy(),
        REQUEST_TIMEOUT,
        Arc::new(clock.clone()),
    )
    .await
    .expect("manager init")
}
