//! Natural-language engines that turn a user message into a sequence of
//! dialogue actions.
//!
//! An [`NluEngine`] owns the conversation graph; the host service supplies an
//! [`ActionHandler`] that knows how to execute each named action against the
//! session [`Context`].

pub mod keyword;
pub mod wit;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sos_session::Context;
use thiserror::Error;

pub use keyword::KeywordEngine;
pub use wit::{DEFAULT_WIT_API_BASE, WitEngine};

/// Entities extracted from one message, keyed by entity name. Each entry is an
/// array of candidates shaped like `{"value": ..., "confidence": ...}`.
pub type Entities = Map<String, Value>;

/// Inputs shared by every action invocation of one engine step.
#[derive(Debug, Clone, Copy)]
pub struct ActionRequest<'a> {
    pub session_id: &'a str,
    pub text: Option<&'a str>,
    pub entities: &'a Entities,
}

/// Text the engine wants delivered to the user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotResponse {
    pub text: String,
    #[serde(default)]
    pub quickreplies: Vec<String>,
}

impl BotResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            quickreplies: Vec::new(),
        }
    }

    pub fn with_quickreplies<I, S>(mut self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.quickreplies = replies.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unknown action `{0}`")]
    Unknown(String),
}

#[derive(Debug, Error)]
pub enum NluError {
    #[error("nlu request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("nlu engine returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("nlu response could not be decoded: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("nlu engine reported an error: {0}")]
    Engine(String),
    #[error("unknown step type `{0}`")]
    UnknownStep(String),
    #[error(transparent)]
    Action(#[from] ActionError),
}

/// Executes the named dialogue actions on behalf of an engine.
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// Delivers a bot utterance to the user behind `request.session_id`.
    async fn send(&self, request: ActionRequest<'_>, response: BotResponse)
    -> Result<(), ActionError>;

    /// Runs the action called `action`, mutating `context` in place.
    async fn run(
        &self,
        action: &str,
        request: ActionRequest<'_>,
        context: &mut Context,
    ) -> Result<(), ActionError>;
}

#[async_trait]
pub trait NluEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// Interprets `text` for the session and runs the resulting actions,
    /// returning the context they produced.
    async fn run_actions(
        &self,
        session_id: &str,
        text: &str,
        context: Context,
        actions: &dyn ActionHandler,
    ) -> Result<Context, NluError>;
}

/// Value of the first candidate for `name`. Nested `{"value": ...}` objects are
/// unwrapped; empty strings, `null`, `false` and `0` count as absent.
pub fn first_entity_value(entities: &Entities, name: &str) -> Option<Value> {
    let mut value = entities.get(name)?.as_array()?.first()?.get("value")?;
    if let Value::Object(inner) = value {
        value = inner.get("value")?;
    }
    let present = match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    };
    present.then(|| value.clone())
}

/// Builds a single-candidate entity entry in the shape Wit returns.
pub fn entity(value: impl Into<Value>) -> Value {
    serde_json::json!([{ "value": value.into(), "confidence": 1.0 }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entities(value: Value) -> Entities {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn first_entity_value_takes_first_candidate() {
        let ents = entities(json!({
            "location": [{"value": "Montreal"}, {"value": "Laval"}]
        }));
        assert_eq!(first_entity_value(&ents, "location"), Some(json!("Montreal")));
        assert_eq!(first_entity_value(&ents, "datetime"), None);
    }

    #[test]
    fn first_entity_value_unwraps_nested_values() {
        let ents = entities(json!({
            "datetime": [{"value": {"value": "2016-06-01T10:00:00.000-04:00", "grain": "hour"}}]
        }));
        assert_eq!(
            first_entity_value(&ents, "datetime"),
            Some(json!("2016-06-01T10:00:00.000-04:00"))
        );
    }

    #[test]
    fn falsy_values_count_as_absent() {
        for falsy in [json!(""), json!(null), json!(false), json!(0)] {
            let ents = entities(json!({ "location": [{ "value": falsy }] }));
            assert_eq!(first_entity_value(&ents, "location"), None);
        }
        let ents = entities(json!({ "location": [] }));
        assert_eq!(first_entity_value(&ents, "location"), None);
        let ents = entities(json!({ "location": "Montreal" }));
        assert_eq!(first_entity_value(&ents, "location"), None);
    }

    #[test]
    fn bot_response_deserializes_without_quickreplies() {
        let response: BotResponse = serde_json::from_value(json!({"text": "hi"})).unwrap();
        assert_eq!(response, BotResponse::text("hi"));
        let with = BotResponse::text("pick").with_quickreplies(["a", "b"]);
        assert_eq!(with.quickreplies, vec!["a", "b"]);
    }
}
