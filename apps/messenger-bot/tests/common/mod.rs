#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use serde_json::Value;
use sos_core::testkit::RecordingSender;
use sos_messenger_bot::config::BotConfig;
use sos_messenger_bot::signature::sign;
use sos_messenger_bot::{AppState, build_router};
use sos_nlu::{KeywordEngine, NluEngine};
use sos_session::{SharedSessionStore, shared_memory_store};
use tower::ServiceExt;

pub const APP_SECRET: &str = "test-app-secret";
pub const VALIDATION_TOKEN: &str = "test-verify-token";

pub struct Harness {
    pub state: AppState,
    pub sender: Arc<RecordingSender>,
    pub sessions: SharedSessionStore,
}

pub fn test_config(static_dir: Option<&str>) -> BotConfig {
    let static_dir = static_dir.map(str::to_string);
    BotConfig::from_sources(None, &move |key: &str| match key {
        "PORT" => Some("0".into()),
        "WIT_TOKEN" => Some("wit-token".into()),
        "FB_PAGE_TOKEN" => Some("page-token".into()),
        "FB_APP_SECRET" => Some(APP_SECRET.into()),
        "FB_VALIDATION_TOKEN" => Some(VALIDATION_TOKEN.into()),
        "STATIC_DIR" => static_dir.clone(),
        _ => None,
    })
    .expect("test config")
}

pub fn harness() -> Harness {
    harness_with(test_config(None), RecordingSender::new())
}

pub fn harness_with(config: BotConfig, sender: RecordingSender) -> Harness {
    harness_with_engine(config, sender, Arc::new(KeywordEngine::new()))
}

pub fn harness_with_engine(
    config: BotConfig,
    sender: RecordingSender,
    nlu: Arc<dyn NluEngine>,
) -> Harness {
    let sender = Arc::new(sender);
    let sessions = shared_memory_store();
    let state = AppState {
        config: Arc::new(config),
        sessions: sessions.clone(),
        sender: sender.clone(),
        nlu,
    };
    Harness {
        state,
        sender,
        sessions,
    }
}

impl Harness {
    pub async fn call(&self, request: Request<Body>) -> Response<Body> {
        build_router(self.state.clone())
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn post_signed(&self, payload: &Value) -> Response<Body> {
        let body = serde_json::to_vec(payload).unwrap();
        let signature = sign(APP_SECRET, &body).unwrap();
        self.call(
            Request::post("/webhook")
                .header("content-type", "application/json")
                .header("x-hub-signature", signature)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
    }
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn page_event(event: Value) -> Value {
    page_event_batch(vec![event])
}

pub fn page_event_batch(events: Vec<Value>) -> Value {
    serde_json::json!({
        "object": "page",
        "entry": [{ "id": "page-1", "time": 1_458_692_752_478_i64, "messaging": events }]
    })
}

/// Polls the user's session until `check` accepts its context.
pub async fn wait_for_context(
    sessions: &SharedSessionStore,
    user: &str,
    check: impl Fn(&sos_session::Context) -> bool,
) -> sos_session::Context {
    let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
    loop {
        let record = sessions.get_or_create(user).await.expect("session");
        if check(&record.context) || tokio::time::Instant::now() >= deadline {
            return record.context;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
