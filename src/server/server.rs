use anyhow::{anyhow, Result};
use axum::Router;
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::server::routes::SessionRoutesState;
use crate::session::SessionManager;
use crate::sources::fetch::Authenticator;
use std::future::Future;
use tracing::info;

pub struct AppState<A: Authenticator> {
    pub metrics_state: MetricsState,
    pub session_state: SessionRoutesState<A>,
}

impl<A: Authenticator> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self {
            metrics_state: self.metrics_state.clone(),
            session_state: self.session_state.clone(),
        }
    }
}

impl<A: Authenticator> AppState<A> {
    pub fn new(metrics: &Metrics, session: SessionManager<A>) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            session_state: SessionRoutesState::new(session),
        }
    }
}

/// Router with the token routes and, when enabled, the metrics route.
pub async fn app<A: Authenticator>(settings_config: &SettingsConfig, session: SessionManager<A>) -> Router {
    let metrics = get_metrics().await;
    let state = AppState::new(metrics, session);

    Router::new()
        .merge(state.metrics_state.router::<A>(&settings_config.metrics))
        .merge(state.session_state.router())
        .with_state(state)
}

/// Serve until `shutdown` resolves.
pub async fn start<A: Authenticator>(
    settings_config: &SettingsConfig,
    session: SessionManager<A>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let metrics = get_metrics().await;
    let app = app(settings_config, session).await;

    let bind_addr = format!("{}:{}", settings_config.server.host, settings_config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow!("cannot bind {}: {}", bind_addr, e))?;
    info!("listening on {}", bind_addr);

    metrics.up.set(1);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow!("server error: {}", e));
    metrics.up.set(0);
    served
}
