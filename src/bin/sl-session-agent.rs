use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::arg;
use clap::command;
use clap::Parser;
use reqwest::Client;
use sl_session_agent::observability::service_resources_metrics::collect_process_metrics;
use sl_session_agent::resilience::retry::RetrySettings;
use sl_session_agent::server;
use sl_session_agent::session::{ExpiryPolicy, SessionManager, TokenStore};
use sl_session_agent::sources::HttpAuthenticator;
use sl_session_agent::utils::config_loader;
use sl_session_agent::utils::logging;
use sl_session_agent::utils::logging::LogLevel;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "sl-session-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, init logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level);

    let settings = &service_config.settings;
    let session_cfg = &settings.session;

    // -------------------------------
    // 2. Build the session manager (one per process)
    // -------------------------------

    let client = Client::builder()
        .connect_timeout(Duration::from_millis(session_cfg.request_timeout_ms))
        .build()
        .map_err(|e| anyhow!("cannot build HTTP client: {}", e))?;

    let authenticator = HttpAuthenticator::new(service_config.auth.clone(), client);
    let store = TokenStore::new(&session_cfg.token_file, service_config.auth.account.clone());
    let policy = ExpiryPolicy::new(
        chrono::Duration::milliseconds(session_cfg.session_timeout_ms as i64),
        chrono::Duration::milliseconds(session_cfg.expiry_buffer_ms as i64),
    );
    let session = SessionManager::init(
        authenticator,
        store,
        policy,
        Duration::from_millis(session_cfg.request_timeout_ms),
    )
    .await?;

    // -------------------------------
    // 3. Warm up: open a session before serving, retrying transient failures
    // -------------------------------

    let retry = RetrySettings::from(settings.retry.as_ref());
    match retry.run_with_retry(|| session.get_token()).await {
        Ok(token) => info!(expires_at = %token.expires_at, "session ready"),
        Err(e) => warn!(error = %e, "initial session unavailable, will renew on demand"),
    }

    // -------------------------------
    // 4. Serve until SIGINT / SIGTERM
    // -------------------------------

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let shutdown = async move {
        let _ = shutdown_rx.wait_for(|stop| *stop).await;
    };

    let http_server = server::server::start(settings, session.clone(), shutdown);
    let service_metrics = tokio::spawn(collect_process_metrics(settings.metrics.is_enabled));
    let signals = async move {
        wait_for_signal().await?;
        let _ = shutdown_tx.send(true);
        Ok::<(), anyhow::Error>(())
    };

    info!("Service starting...");
    tokio::try_join!(http_server, signals)?;
    service_metrics.abort();
    info!("Service stopped");

    Ok(())
}

async fn wait_for_signal() -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT. Initiating graceful shutdown..."),
        _ = sigterm.recv() => info!("Received SIGTERM. Initiating graceful shutdown..."),
    }
    Ok(())
}
