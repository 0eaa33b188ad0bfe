use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use metrics::counter;
use serde::Deserialize;
use sos_core::WebhookPayload;
use sos_telemetry::{WEBHOOK_EVENTS_RECEIVED, WEBHOOK_SIGNATURE_REJECTED};

use crate::AppState;
use crate::events::spawn_dispatch;
use crate::signature::{self, SIGNATURE_HEADER};

#[derive(Debug, Deserialize)]
pub struct VerifyQs {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
    #[serde(rename = "hub.verify_token")]
    token: Option<String>,
}

/// Subscription handshake: echoes `hub.challenge` when the verify token matches.
pub async fn verify(
    State(state): State<AppState>,
    query: Result<Query<VerifyQs>, QueryRejection>,
) -> impl IntoResponse {
    let q = match query {
        Ok(Query(q)) => q,
        Err(err) => {
            tracing::warn!(error = %err, "malformed verification query");
            return (StatusCode::FORBIDDEN, "forbidden".to_string());
        }
    };
    if q.mode.as_deref() == Some("subscribe")
        && q.token.as_deref() == Some(state.config.credentials.validation_token.as_str())
    {
        tracing::info!("validating webhook");
        (StatusCode::OK, q.challenge.unwrap_or_default())
    } else {
        tracing::error!("failed validation, make sure the validation tokens match");
        (StatusCode::FORBIDDEN, "forbidden".to_string())
    }
}

pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    if let Err(err) = signature::verify(&state.config.credentials.app_secret, header, &body) {
        counter!(WEBHOOK_SIGNATURE_REJECTED).increment(1);
        tracing::warn!(error = %err, "rejected webhook delivery");
        return StatusCode::FORBIDDEN;
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!("failed to decode payload: {err}");
            return StatusCode::BAD_REQUEST;
        }
    };
    if !payload.is_page() {
        tracing::debug!(object = %payload.object, "ignoring non-page webhook");
        return StatusCode::OK;
    }

    for event in payload.events() {
        counter!(WEBHOOK_EVENTS_RECEIVED, "kind" => event.kind().as_str()).increment(1);
        spawn_dispatch(state.clone(), event);
    }
    StatusCode::OK
}

pub async fn healthz() -> impl IntoResponse {
    StatusCode::NO_CONTENT
}
