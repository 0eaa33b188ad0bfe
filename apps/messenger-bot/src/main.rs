use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::serve;
use sos_core::{EgressSender, MessengerSender, RetryPolicy};
use sos_messenger_bot::config::{BotConfig, NluEngineKind};
use sos_messenger_bot::{AppState, build_router};
use sos_nlu::{KeywordEngine, NluEngine, WitEngine};
use sos_session::{shared_memory_store, spawn_idle_sweeper};
use sos_telemetry::install as init_telemetry;
use tokio::net::TcpListener;
use tracing::{error, info};

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    init_telemetry("sos-messenger-bot", env!("CARGO_PKG_VERSION"))?;

    let config = match BotConfig::load() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };
    info!(config = ?config, "configuration loaded");

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let sender: Arc<dyn EgressSender> = Arc::new(
        MessengerSender::new(
            http.clone(),
            config.credentials.page_access_token.clone(),
            config.graph_api_base.clone(),
        )
        .with_retry(RetryPolicy::default().with_max_attempts(config.send_max_attempts)),
    );
    let nlu: Arc<dyn NluEngine> = match config.nlu_engine {
        NluEngineKind::Wit => Arc::new(WitEngine::new(
            http,
            config.wit_token.clone(),
            Some(config.wit_api_base.clone()),
        )),
        NluEngineKind::Keyword => Arc::new(KeywordEngine::new()),
    };
    info!(engine = nlu.name(), "nlu engine selected");

    let sessions = shared_memory_store();
    let sweeper = spawn_idle_sweeper(
        sessions.clone(),
        config.session_ttl,
        SWEEP_INTERVAL.min(config.session_ttl.max(Duration::from_secs(1))),
    );

    let addr = config.listen_addr();
    let state = AppState {
        config: Arc::new(config),
        sessions,
        sender,
        nlu,
    };
    let listener = TcpListener::bind(addr).await?;
    info!("sos-messenger-bot listening on {}", addr);

    serve(listener, build_router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("sos-messenger-bot stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
