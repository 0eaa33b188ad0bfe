use async_trait::async_trait;
use metrics::counter;
use serde_json::Value;
use sos_telemetry::{OUTBOUND_FAILED, OUTBOUND_SENT};

use super::retry::RetryPolicy;
use crate::egress::{EgressSender, OutboundMessage, SendError, SendOutcome, SendResult};

pub const DEFAULT_GRAPH_API_BASE: &str = "https://graph.facebook.com";

/// Posts messages to the Graph `me/messages` endpoint with the page token as
/// the `access_token` query parameter.
pub struct MessengerSender {
    http: reqwest::Client,
    page_token: String,
    api_base: String,
    retry: RetryPolicy,
}

impl MessengerSender {
    pub fn new(
        http: reqwest::Client,
        page_token: impl Into<String>,
        api_base: Option<String>,
    ) -> Self {
        let base = api_base.unwrap_or_else(|| DEFAULT_GRAPH_API_BASE.into());
        Self {
            http,
            page_token: page_token.into(),
            api_base: base.trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_url(&self) -> String {
        format!("{}/me/messages", self.api_base)
    }

    async fn post_once(&self, payload: &Value) -> SendOutcome {
        let response = self
            .http
            .post(self.build_url())
            .query(&[("access_token", self.page_token.as_str())])
            .json(payload)
            .send()
            .await
            .map_err(SendError::Transport)?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|source| SendError::Decode {
            status: status.as_u16(),
            source,
        })?;

        if let Some(message) = body.pointer("/error/message").and_then(Value::as_str) {
            return Err(SendError::Platform {
                status: status.as_u16(),
                code: body.pointer("/error/code").and_then(Value::as_i64),
                message: message.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SendError::Platform {
                status: status.as_u16(),
                code: None,
                message: format!("unexpected status {status}"),
            });
        }

        Ok(SendResult {
            recipient_id: string_field(&body, "recipient_id"),
            message_id: string_field(&body, "message_id"),
            raw: body,
        })
    }
}

fn string_field(body: &Value, key: &str) -> Option<String> {
    body.get(key).and_then(Value::as_str).map(str::to_string)
}

#[async_trait]
impl EgressSender for MessengerSender {
    async fn send(&self, msg: OutboundMessage) -> SendOutcome {
        let kind = msg.body.kind();
        let payload = msg.to_payload();
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.post_once(&payload).await {
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    tracing::warn!(
                        error = %err,
                        attempt,
                        recipient = %msg.recipient,
                        "messenger send did not reach the platform; retrying"
                    );
                    self.retry.sleep(attempt).await;
                    attempt += 1;
                }
                Ok(result) => {
                    counter!(OUTBOUND_SENT, "kind" => kind).increment(1);
                    tracing::debug!(
                        recipient = %msg.recipient,
                        message_id = result.message_id.as_deref().unwrap_or(""),
                        kind,
                        "messenger message sent"
                    );
                    return Ok(result);
                }
                Err(err) => {
                    counter!(OUTBOUND_FAILED, "kind" => kind).increment(1);
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_built_from_trimmed_base() {
        let sender = MessengerSender::new(
            reqwest::Client::new(),
            "token",
            Some("https://graph.facebook.com/v19.0/".into()),
        );
        assert_eq!(sender.api_base(), "https://graph.facebook.com/v19.0");
        assert_eq!(
            sender.build_url(),
            "https://graph.facebook.com/v19.0/me/messages"
        );

        let default = MessengerSender::new(reqwest::Client::new(), "token", None);
        assert_eq!(default.build_url(), "https://graph.facebook.com/me/messages");
    }
}
