//! In-process test doubles shared by the workspace's test suites.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::egress::{EgressSender, OutboundMessage, SendError, SendOutcome, SendResult};

/// Sender that records every message instead of calling the Graph API.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<OutboundMessage>>,
    reject_with: Option<String>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records messages but answers each with a platform error.
    pub fn rejecting(message: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject_with: Some(message.into()),
        }
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Polls until at least `count` messages were recorded or `timeout` elapses,
    /// then returns whatever was recorded.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<OutboundMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent();
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl EgressSender for RecordingSender {
    async fn send(&self, msg: OutboundMessage) -> SendOutcome {
        let recipient = msg.recipient.clone();
        self.sent.lock().unwrap().push(msg);
        if let Some(message) = &self.reject_with {
            return Err(SendError::Platform {
                status: 400,
                code: Some(100),
                message: message.clone(),
            });
        }
        Ok(SendResult {
            recipient_id: Some(recipient.clone()),
            message_id: Some(format!("mid.test.{recipient}")),
            raw: json!({ "recipient_id": recipient }),
        })
    }
}
