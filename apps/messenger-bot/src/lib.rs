//! Facebook Messenger webhook service that guides users through reporting
//! an emergency and shares safety guidelines.
//!
//! ```text
//! Facebook calls `POST /webhook`; each verified event is handled on its own
//! task and replies go out through the Graph Send API.
//! ```

pub mod actions;
pub mod config;
pub mod events;
pub mod request_log;
pub mod signature;
pub mod webhook;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::get;
use sos_core::EgressSender;
use sos_nlu::NluEngine;
use sos_session::SharedSessionStore;
use tower_http::services::ServeDir;

use crate::config::BotConfig;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BotConfig>,
    pub sessions: SharedSessionStore,
    pub sender: Arc<dyn EgressSender>,
    pub nlu: Arc<dyn NluEngine>,
}

/// Webhook routes plus static files from the configured directory.
pub fn build_router(state: AppState) -> Router {
    let static_files = ServeDir::new(&state.config.static_dir);
    Router::new()
        .route("/webhook", get(webhook::verify).post(webhook::receive))
        .route("/healthz", get(webhook::healthz))
        .fallback_service(static_files)
        .layer(middleware::from_fn(request_log::with_request_id))
        .with_state(state)
}
