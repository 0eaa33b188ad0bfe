use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use serde_json::Value;
use sos_session::Context;
use tracing::{debug, warn};

use crate::{ActionHandler, ActionRequest, BotResponse, Entities, NluEngine, NluError};

pub const DEFAULT_WIT_API_BASE: &str = "https://api.wit.ai";
pub const DEFAULT_MAX_STEPS: usize = 5;
const WIT_ACCEPT: &str = "application/vnd.wit.20160526+json";

/// One step returned by the converse endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConverseStep {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub msg: Option<String>,
    pub quickreplies: Option<Vec<String>>,
    pub action: Option<String>,
    #[serde(default)]
    pub entities: Entities,
    pub confidence: Option<f64>,
    pub error: Option<Value>,
}

/// Wit.ai converse client driving the bot-engine story for each message.
#[derive(Clone)]
pub struct WitEngine {
    http: Client,
    token: String,
    api_base: String,
    max_steps: usize,
}

impl WitEngine {
    pub fn new(http: Client, token: impl Into<String>, api_base: Option<String>) -> Self {
        let api_base = api_base
            .unwrap_or_else(|| DEFAULT_WIT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            http,
            token: token.into(),
            api_base,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn converse_url(&self) -> String {
        format!("{}/converse", self.api_base)
    }

    /// Asks Wit for the next step. `text` is only sent on the first step of a
    /// message.
    pub async fn converse(
        &self,
        session_id: &str,
        text: Option<&str>,
        context: &Context,
    ) -> Result<ConverseStep, NluError> {
        let mut query = vec![("session_id", session_id)];
        if let Some(text) = text {
            query.push(("q", text));
        }
        let resp = self
            .http
            .post(self.converse_url())
            .bearer_auth(&self.token)
            .header(ACCEPT, WIT_ACCEPT)
            .query(&query)
            .json(context)
            .send()
            .await
            .map_err(NluError::Transport)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NluError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let step: ConverseStep = resp.json().await.map_err(NluError::Decode)?;
        if let Some(error) = &step.error {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| other.to_string()),
            };
            return Err(NluError::Engine(message));
        }
        debug!(
            session_id,
            kind = step.kind.as_deref().unwrap_or("-"),
            action = step.action.as_deref().unwrap_or("-"),
            confidence = step.confidence,
            "wit converse step"
        );
        Ok(step)
    }
}

#[async_trait]
impl NluEngine for WitEngine {
    fn name(&self) -> &'static str {
        "wit"
    }

    async fn run_actions(
        &self,
        session_id: &str,
        text: &str,
        mut context: Context,
        actions: &dyn ActionHandler,
    ) -> Result<Context, NluError> {
        let mut query = Some(text);
        for _ in 0..self.max_steps {
            let step = self.converse(session_id, query, &context).await?;
            let request = ActionRequest {
                session_id,
                text: Some(text),
                entities: &step.entities,
            };
            match step.kind.as_deref() {
                Some("stop") => return Ok(context),
                Some("msg") => {
                    let response = BotResponse {
                        text: step.msg.clone().unwrap_or_default(),
                        quickreplies: step.quickreplies.clone().unwrap_or_default(),
                    };
                    actions.send(request, response).await?;
                }
                Some("action") => {
                    let name = step
                        .action
                        .as_deref()
                        .ok_or_else(|| NluError::Engine("action step without a name".into()))?;
                    actions.run(name, request, &mut context).await?;
                }
                Some("merge") => actions.run("merge", request, &mut context).await?,
                Some("error") => {
                    return Err(NluError::Engine("Oops, I don't know what to do.".into()));
                }
                other => return Err(NluError::UnknownStep(other.unwrap_or("<none>").into())),
            }
            query = None;
        }
        warn!(session_id, max_steps = self.max_steps, "max steps reached, stopping");
        Ok(context)
    }
}
