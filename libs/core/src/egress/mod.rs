use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, json};

use crate::guidelines::GuidelineCard;

/// Text shown above the button template used for "nearest" links.
pub const NEAREST_BUTTONS_TEXT: &str = "The nearest locations list";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Button {
    Postback { title: String, payload: String },
    WebUrl { url: String, title: String },
}

/// One element of a generic (carousel) template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateElement {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
}

impl From<&GuidelineCard> for TemplateElement {
    fn from(card: &GuidelineCard) -> Self {
        Self {
            title: card.title.to_string(),
            item_url: card.item_url.map(str::to_string),
            image_url: Some(card.image_url.to_string()),
            subtitle: card.subtitle.map(str::to_string),
            buttons: card
                .button
                .iter()
                .map(|button| Button::Postback {
                    title: button.title.to_string(),
                    payload: button.payload.to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text {
        text: String,
        quick_replies: Vec<String>,
    },
    Generic {
        elements: Vec<TemplateElement>,
    },
    Button {
        text: String,
        buttons: Vec<Button>,
    },
    Image {
        url: String,
    },
}

impl MessageBody {
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::Text { .. } => "text",
            MessageBody::Generic { .. } => "generic",
            MessageBody::Button { .. } => "button",
            MessageBody::Image { .. } => "image",
        }
    }

    fn to_message(&self) -> Value {
        match self {
            MessageBody::Text {
                text,
                quick_replies,
            } => {
                let mut message = json!({ "text": text });
                if !quick_replies.is_empty() {
                    message["quick_replies"] = quick_replies
                        .iter()
                        .map(|title| {
                            json!({
                                "content_type": "text",
                                "title": title,
                                "payload": title,
                            })
                        })
                        .collect();
                }
                message
            }
            MessageBody::Generic { elements } => json!({
                "attachment": {
                    "type": "template",
                    "payload": {
                        "template_type": "generic",
                        "elements": elements,
                    }
                }
            }),
            MessageBody::Button { text, buttons } => json!({
                "attachment": {
                    "type": "template",
                    "payload": {
                        "text": text,
                        "template_type": "button",
                        "buttons": buttons,
                    }
                }
            }),
            MessageBody::Image { url } => json!({
                "attachment": {
                    "type": "image",
                    "payload": { "url": url }
                }
            }),
        }
    }
}

/// A message addressed to one Messenger user.
///
/// ```
/// use sos_core::OutboundMessage;
///
/// let msg = OutboundMessage::text("1234", "Stay calm");
/// assert_eq!(msg.to_payload()["message"]["text"], "Stay calm");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub recipient: String,
    pub body: MessageBody,
}

impl OutboundMessage {
    pub fn text(recipient: impl Into<String>, text: impl Into<String>) -> Self {
        Self::text_with_replies(recipient, text, Vec::new())
    }

    pub fn text_with_replies(
        recipient: impl Into<String>,
        text: impl Into<String>,
        quick_replies: Vec<String>,
    ) -> Self {
        Self {
            recipient: recipient.into(),
            body: MessageBody::Text {
                text: text.into(),
                quick_replies,
            },
        }
    }

    pub fn generic(recipient: impl Into<String>, elements: Vec<TemplateElement>) -> Self {
        Self {
            recipient: recipient.into(),
            body: MessageBody::Generic { elements },
        }
    }

    pub fn buttons(recipient: impl Into<String>, buttons: Vec<Button>) -> Self {
        Self {
            recipient: recipient.into(),
            body: MessageBody::Button {
                text: NEAREST_BUTTONS_TEXT.to_string(),
                buttons,
            },
        }
    }

    pub fn image(recipient: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            body: MessageBody::Image { url: url.into() },
        }
    }

    /// JSON body accepted by the Graph `me/messages` endpoint.
    pub fn to_payload(&self) -> Value {
        json!({
            "recipient": { "id": self.recipient },
            "message": self.body.to_message(),
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SendResult {
    pub recipient_id: Option<String>,
    pub message_id: Option<String>,
    pub raw: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("messenger transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("messenger rejected message (status {status}): {message}")]
    Platform {
        status: u16,
        code: Option<i64>,
        message: String,
    },
    #[error("undecodable messenger response (status {status})")]
    Decode {
        status: u16,
        #[source]
        source: reqwest::Error,
    },
}

impl SendError {
    /// True only when the request never reached the platform, so resending
    /// cannot produce a duplicate delivery.
    pub fn is_retryable(&self) -> bool {
        match self {
            SendError::Transport(err) => err.is_connect(),
            _ => false,
        }
    }
}

pub type SendOutcome = Result<SendResult, SendError>;

#[async_trait]
pub trait EgressSender: Send + Sync {
    async fn send(&self, msg: OutboundMessage) -> SendOutcome;
}
