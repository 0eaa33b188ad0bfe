use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use sos_core::{EgressSender, MessengerSender, OutboundMessage, RetryPolicy, SendError};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Captured {
    requests: Arc<Mutex<Vec<(HashMap<String, String>, Value)>>>,
}

// Starts a Graph API stand-in answering every send with `reply`.
// Returns None when binding to localhost is not permitted.
async fn graph_mock(status: StatusCode, reply: Value) -> Option<(SocketAddr, Captured)> {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("skipping messenger sender test: {err}");
            return None;
        }
    };
    let captured = Captured::default();
    let app = Router::new().route(
        "/me/messages",
        post({
            let captured = captured.clone();
            move |Query(query): Query<HashMap<String, String>>, Json(body): Json<Value>| {
                let captured = captured.clone();
                let reply = reply.clone();
                async move {
                    captured.requests.lock().unwrap().push((query, body));
                    (status, Json(reply))
                }
            }
        }),
    );
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app.into_make_service()).await {
            eprintln!("graph mock server error: {err}");
        }
    });
    Some((addr, captured))
}

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts: attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

#[tokio::test]
async fn posts_payload_with_page_token() {
    let Some((addr, captured)) = graph_mock(
        StatusCode::OK,
        json!({"recipient_id": "1254", "message_id": "mid.1"}),
    )
    .await
    else {
        return;
    };

    let sender = MessengerSender::new(
        reqwest::Client::new(),
        "page-token",
        Some(format!("http://{addr}")),
    );
    let result = sender
        .send(OutboundMessage::image("1254", "https://img.example/cpr.jpg"))
        .await
        .expect("send succeeds");
    assert_eq!(result.message_id.as_deref(), Some("mid.1"));
    assert_eq!(result.recipient_id.as_deref(), Some("1254"));

    let requests = captured.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let (query, body) = &requests[0];
    assert_eq!(query.get("access_token").map(String::as_str), Some("page-token"));
    assert_eq!(body["recipient"]["id"], "1254");
    assert_eq!(body["message"]["attachment"]["type"], "image");
}

#[tokio::test]
async fn platform_error_message_fails_the_send_without_retry() {
    let Some((addr, captured)) = graph_mock(
        StatusCode::BAD_REQUEST,
        json!({"error": {"message": "(#100) No matching user found", "code": 100}}),
    )
    .await
    else {
        return;
    };

    let sender = MessengerSender::new(
        reqwest::Client::new(),
        "page-token",
        Some(format!("http://{addr}")),
    )
    .with_retry(fast_retry(3));
    let err = sender
        .send(OutboundMessage::text("1254", "hello"))
        .await
        .expect_err("platform error");
    match &err {
        SendError::Platform {
            status,
            code,
            message,
        } => {
            assert_eq!(*status, 400);
            assert_eq!(*code, Some(100));
            assert_eq!(message, "(#100) No matching user found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_retryable());
    assert_eq!(captured.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn error_field_wins_even_on_success_status() {
    let Some((addr, _captured)) = graph_mock(
        StatusCode::OK,
        json!({"error": {"message": "Invalid OAuth access token."}}),
    )
    .await
    else {
        return;
    };

    let sender = MessengerSender::new(reqwest::Client::new(), "bad", Some(format!("http://{addr}")));
    let err = sender
        .send(OutboundMessage::text("1", "hi"))
        .await
        .expect_err("error field present");
    assert!(err.to_string().contains("Invalid OAuth access token."));
}

#[tokio::test]
async fn unreachable_platform_is_retried_then_reported() {
    // Reserve a port, then close it so connections are refused.
    let addr = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener.local_addr().unwrap(),
        Err(err) => {
            eprintln!("skipping unreachable platform test: {err}");
            return;
        }
    };

    let sender = MessengerSender::new(
        reqwest::Client::new(),
        "page-token",
        Some(format!("http://{addr}")),
    )
    .with_retry(fast_retry(2));
    let err = sender
        .send(OutboundMessage::text("1", "hi"))
        .await
        .expect_err("connection refused");
    assert!(matches!(err, SendError::Transport(_)));
    assert!(err.is_retryable());
}
