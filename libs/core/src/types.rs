use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Top-level body of a Messenger webhook callback.
///
/// ```
/// use sos_core::WebhookPayload;
///
/// let payload: WebhookPayload = serde_json::from_str(
///     r#"{"object":"page","entry":[{"id":"p1","time":1,"messaging":[]}]}"#,
/// ).unwrap();
/// assert!(payload.is_page());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookPayload {
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

impl WebhookPayload {
    pub fn is_page(&self) -> bool {
        self.object == "page"
    }

    /// Decodes every messaging event across all entries, in delivery order.
    ///
    /// Events are decoded one at a time so a single malformed event cannot
    /// poison the rest of the delivery.
    pub fn events(&self) -> impl Iterator<Item = MessagingEvent> + '_ {
        self.entry
            .iter()
            .flat_map(|entry| entry.messaging.iter())
            .map(MessagingEvent::decode)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub messaging: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    #[serde(default)]
    pub id: String,
}

/// One entry of `entry[].messaging[]`. Exactly one of the optional payload
/// fields is expected to be set; [`MessagingEvent::kind`] classifies it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MessagingEvent {
    #[serde(default)]
    pub sender: Participant,
    #[serde(default)]
    pub recipient: Participant,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optin: Option<Optin>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery: Option<Delivery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postback: Option<Postback>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind<'a> {
    Authentication(&'a Optin),
    Message(&'a Message),
    Delivery(&'a Delivery),
    Postback(&'a Postback),
    Unknown,
}

impl EventKind<'_> {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Authentication(_) => "authentication",
            EventKind::Message(_) => "message",
            EventKind::Delivery(_) => "delivery",
            EventKind::Postback(_) => "postback",
            EventKind::Unknown => "unknown",
        }
    }
}

impl MessagingEvent {
    /// Decodes one raw `messaging[]` item. Items that do not fit the typed
    /// shape keep their sender and raw fields and classify as
    /// [`EventKind::Unknown`].
    pub fn decode(raw: &Value) -> Self {
        match serde_json::from_value(raw.clone()) {
            Ok(event) => event,
            Err(err) => {
                tracing::info!(error = %err, "undecodable messaging event");
                Self::undecodable(raw)
            }
        }
    }

    fn undecodable(raw: &Value) -> Self {
        let participant = |key: &str| Participant {
            id: raw
                .pointer(&format!("/{key}/id"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        };
        let other: BTreeMap<String, Value> = raw
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .filter(|(key, _)| !matches!(key.as_str(), "sender" | "recipient" | "timestamp"))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            sender: participant("sender"),
            recipient: participant("recipient"),
            timestamp: raw.get("timestamp").and_then(Value::as_i64),
            other,
            ..Self::default()
        }
    }

    /// Classifies the event. Precedence follows the Messenger docs: opt-in,
    /// message, delivery, postback.
    pub fn kind(&self) -> EventKind<'_> {
        if let Some(optin) = &self.optin {
            EventKind::Authentication(optin)
        } else if let Some(message) = &self.message {
            EventKind::Message(message)
        } else if let Some(delivery) = &self.delivery {
            EventKind::Delivery(delivery)
        } else if let Some(postback) = &self.postback {
            EventKind::Postback(postback)
        } else {
            EventKind::Unknown
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Optin {
    #[serde(rename = "ref", default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(default)]
    pub mid: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

impl Attachment {
    /// Returns `"<lat>,<long>"` for location attachments.
    pub fn coordinates(&self) -> Option<String> {
        if self.kind != "location" {
            return None;
        }
        let coords = self.payload.as_ref()?.get("coordinates")?;
        let lat = coords.get("lat")?;
        let long = coords.get("long")?;
        Some(format!("{lat},{long}"))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delivery {
    #[serde(default)]
    pub mids: Vec<String>,
    #[serde(default)]
    pub watermark: Option<i64>,
    #[serde(default)]
    pub seq: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Postback {
    pub payload: String,
    #[serde(default)]
    pub title: Option<String>,
}
