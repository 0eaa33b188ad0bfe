use std::time::Instant;

use axum::{
    body::Body,
    http::{HeaderValue, Request, header::HeaderName},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const MAX_REQUEST_ID_LEN: usize = 128;

fn incoming_request_id(req: &Request<Body>) -> Option<String> {
    let value = req.headers().get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    (!value.is_empty() && value.len() <= MAX_REQUEST_ID_LEN).then(|| value.to_string())
}

/// Tags every response with the caller's request id, or a fresh one, and
/// logs it on completion.
pub async fn with_request_id(mut req: Request<Body>, next: Next) -> Response {
    let rid = incoming_request_id(&req).unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(rid.clone());
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let mut res = next.run(req).await;
    tracing::info!(
        request_id = %rid,
        status = res.status().as_u16(),
        %method,
        %uri,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "request completed"
    );
    if let Ok(value) = HeaderValue::from_str(&rid) {
        res.headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    res
}
