//! Handlers for the messaging events carried by a webhook delivery.

use metrics::counter;
use sos_core::guidelines;
use sos_core::{Delivery, EventKind, Message, MessagingEvent, Optin, OutboundMessage, Postback};
use sos_session::{Context, SessionId};
use sos_telemetry::{NLU_RUNS, with_event_fields};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::AppState;
use crate::actions::BotActions;

pub const AUTHENTICATION_REPLY: &str = "Authentication successful";
pub const POSTBACK_FALLBACK: &str = "Cannot handle your postback";

/// Runs `event` on its own task; the webhook does not wait for it.
pub fn spawn_dispatch(state: AppState, event: MessagingEvent) -> JoinHandle<()> {
    let span = info_span!(
        "messaging_event",
        kind = event.kind().as_str(),
        sender = tracing::field::Empty,
        msg_id = tracing::field::Empty,
    );
    let mid = event.message.as_ref().and_then(|m| m.mid.as_deref());
    with_event_fields(&span, &event.sender.id, mid);
    tokio::spawn(async move { dispatch(&state, &event).await }.instrument(span))
}

pub async fn dispatch(state: &AppState, event: &MessagingEvent) {
    match event.kind() {
        EventKind::Authentication(optin) => received_authentication(state, event, optin).await,
        EventKind::Message(message) => received_message(state, event, message).await,
        EventKind::Delivery(delivery) => received_delivery(delivery),
        EventKind::Postback(postback) => received_postback(state, event, postback).await,
        EventKind::Unknown => {
            let fields: Vec<&str> = event.other.keys().map(String::as_str).collect();
            info!(?fields, "webhook received unknown messaging event");
        }
    }
}

async fn reply(state: &AppState, message: OutboundMessage) {
    let kind = message.body.kind();
    if let Err(err) = state.sender.send(message).await {
        warn!(kind, error = %err, "failed to send reply");
    }
}

async fn received_authentication(state: &AppState, event: &MessagingEvent, optin: &Optin) {
    info!(
        page = %event.recipient.id,
        pass_through = optin.reference.as_deref().unwrap_or(""),
        timestamp = event.timestamp,
        "received authentication"
    );
    reply(state, OutboundMessage::text(&event.sender.id, AUTHENTICATION_REPLY)).await;
}

async fn received_message(state: &AppState, event: &MessagingEvent, message: &Message) {
    let sender = event.sender.id.as_str();
    let record = match state.sessions.get_or_create(sender).await {
        Ok(record) => record,
        Err(err) => {
            error!(error = %err, "failed to resolve session");
            return;
        }
    };

    if !message.attachments.is_empty() {
        for attachment in &message.attachments {
            match attachment.coordinates() {
                Some(coordinates) => run_nlu(state, &record.id, &coordinates).await,
                None => {
                    let text = format!(
                        "Sorry I cannot handle this type of attachment for now: {}",
                        attachment.kind
                    );
                    reply(state, OutboundMessage::text(sender, text)).await;
                }
            }
        }
    } else if let Some(text) = message.text.as_deref().filter(|t| !t.is_empty()) {
        run_nlu(state, &record.id, text).await;
    } else {
        debug!("message without text or attachments");
    }
}

/// Runs the NLU engine for one input while holding the session lock, then
/// stores the resulting context.
async fn run_nlu(state: &AppState, session_id: &SessionId, text: &str) {
    let _guard = state.sessions.lock(session_id).await;
    let context = match state.sessions.get(session_id).await {
        Ok(Some(record)) => record.context,
        Ok(None) => {
            warn!(%session_id, "session evicted before the message was handled");
            return;
        }
        Err(err) => {
            error!(%session_id, error = %err, "failed to load session");
            return;
        }
    };

    let actions = BotActions::new(state.sessions.clone(), state.sender.clone());
    let engine = state.nlu.name();
    match state
        .nlu
        .run_actions(session_id.as_str(), text, context, &actions)
        .await
    {
        Ok(context) => {
            counter!(NLU_RUNS, "engine" => engine, "outcome" => "ok").increment(1);
            store_context(state, session_id, context).await;
        }
        Err(err) => {
            counter!(NLU_RUNS, "engine" => engine, "outcome" => "error").increment(1);
            error!(%session_id, engine, error = %err, "got an error from the nlu engine");
        }
    }
}

async fn store_context(state: &AppState, session_id: &SessionId, context: Context) {
    match state.sessions.update_context(session_id, context).await {
        Ok(true) => {}
        Ok(false) => warn!(%session_id, "session vanished before its context was stored"),
        Err(err) => error!(%session_id, error = %err, "failed to store session context"),
    }
}

fn received_delivery(delivery: &Delivery) {
    for mid in &delivery.mids {
        info!(mid = %mid, "received delivery confirmation");
    }
    info!(
        watermark = delivery.watermark,
        "all messages before watermark were delivered"
    );
}

async fn received_postback(state: &AppState, event: &MessagingEvent, postback: &Postback) {
    info!(payload = %postback.payload, "received postback");
    let message = match guidelines::card(&postback.payload) {
        Some(card) => OutboundMessage::image(&event.sender.id, card.image_url),
        None => OutboundMessage::text(&event.sender.id, POSTBACK_FALLBACK),
    };
    reply(state, message).await;
}
