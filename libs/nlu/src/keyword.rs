//! Offline engine: keyword and pattern extraction feeding a fixed dialogue
//! graph over the same action names the Wit story uses.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use sos_session::{Context, Slot};
use tracing::debug;

use crate::{ActionHandler, ActionRequest, BotResponse, Entities, NluEngine, NluError, entity};

pub const ASK_EMERGENCY_TYPE: &str = "What kind of emergency is it?";
pub const ASK_LOCATION: &str = "Where is it happening? You can share your location.";
pub const ASK_DATETIME: &str = "When did it happen?";
pub const ASK_POSITION: &str = "Where are you? Share your location and I will look nearby.";
pub const REPORT_DONE: &str = "Thank you. If anyone is in immediate danger, call 911.";
pub const EMERGENCY_REPLIES: [&str; 4] = ["Fire", "Medical", "Car accident", "Crime"];

static EMERGENCY_KEYWORDS: &[(&str, &[&str])] = &[
    ("carAccident", &["car accident", "crash", "collision", "accident"]),
    ("fire", &["fire", "smoke", "burning", "flames"]),
    (
        "medical",
        &["medical", "heart", "injured", "hurt", "bleeding", "unconscious", "choking", "cpr"],
    ),
    ("crime", &["crime", "robbery", "theft", "stolen", "assault", "break-in"]),
];

static COORDINATES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d{1,2}(?:\.\d+)?)\s*,\s*(-?\d{1,3}(?:\.\d+)?)").expect("valid regex")
});
static NEAREST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:nearest|closest)\s+([a-z][a-z ]{1,40}?)\s*(?:[?.!]|$)")
        .expect("valid regex")
});
static PLACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:in|at|on)\s+([a-z0-9][a-z0-9 .'-]{1,60}?)\s*(?:[?.!,]|$)")
        .expect("valid regex")
});
static DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(just now|right now|now|today|tonight|yesterday|this (?:morning|afternoon|evening)|\d+ (?:minutes?|hours?) ago|\d{1,2}(?::\d{2})?\s?(?:am|pm))\b",
    )
    .expect("valid regex")
});

/// Extracts Wit-shaped entities from free text.
pub fn extract_entities(text: &str) -> Entities {
    let mut entities = Entities::new();
    let lower = text.to_lowercase();

    if let Some(caps) = NEAREST.captures(text) {
        entities.insert("intent".into(), entity("nearest"));
        entities.insert("location".into(), entity(caps[1].trim().to_lowercase()));
    } else if let Some(caps) = COORDINATES.captures(text) {
        entities.insert("location".into(), entity(format!("{},{}", &caps[1], &caps[2])));
    } else if let Some(caps) = PLACE.captures(text) {
        entities.insert("location".into(), entity(caps[1].trim().to_string()));
    }

    if let Some((category, _)) = EMERGENCY_KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|word| lower.contains(word)))
    {
        entities.insert("emergencyType".into(), entity(*category));
    }

    if let Some(caps) = DATETIME.captures(text) {
        entities.insert("datetime".into(), entity(caps[1].to_lowercase()));
    }
    entities
}

/// Dialogue graph driven by keyword extraction.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordEngine;

impl KeywordEngine {
    pub fn new() -> Self {
        Self
    }

    async fn ask(
        &self,
        actions: &dyn ActionHandler,
        request: ActionRequest<'_>,
        response: BotResponse,
    ) -> Result<(), NluError> {
        actions.send(request, response).await?;
        Ok(())
    }

    async fn nearest_flow(
        &self,
        actions: &dyn ActionHandler,
        request: ActionRequest<'_>,
        context: &mut Context,
        asked_now: bool,
    ) -> Result<(), NluError> {
        if asked_now {
            actions.run("getLocationToFind", request, context).await?;
        } else {
            actions.run("getLocation", request, context).await?;
        }
        if context.slot(Slot::Location).is_none() {
            return self.ask(actions, request, BotResponse::text(ASK_POSITION)).await;
        }
        actions.run("sendNearest", request, context).await?;
        context.clear_slot(Slot::Location);
        context.clear_slot(Slot::LocationToFind);
        Ok(())
    }

    async fn report_flow(
        &self,
        actions: &dyn ActionHandler,
        request: ActionRequest<'_>,
        context: &mut Context,
    ) -> Result<(), NluError> {
        if context.slot(Slot::EmergencyType).is_none() {
            actions.run("getEmergencyType", request, context).await?;
            if context.slot(Slot::EmergencyType).is_none() {
                let ask = BotResponse::text(ASK_EMERGENCY_TYPE).with_quickreplies(EMERGENCY_REPLIES);
                return self.ask(actions, request, ask).await;
            }
            actions.run("sendGuidelinesList", request, context).await?;
        }

        if context.slot(Slot::Location).is_none() {
            actions.run("getLocation", request, context).await?;
            if context.slot(Slot::Location).is_none() {
                return self.ask(actions, request, BotResponse::text(ASK_LOCATION)).await;
            }
        }

        if context.slot(Slot::Datetime).is_none() {
            actions.run("getDatetime", request, context).await?;
            if context.slot(Slot::Datetime).is_none() {
                return self.ask(actions, request, BotResponse::text(ASK_DATETIME)).await;
            }
        }

        self.ask(actions, request, BotResponse::text(REPORT_DONE)).await?;
        actions.run("prepareNewRequest", request, context).await?;
        Ok(())
    }
}

#[async_trait]
impl NluEngine for KeywordEngine {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn run_actions(
        &self,
        session_id: &str,
        text: &str,
        mut context: Context,
        actions: &dyn ActionHandler,
    ) -> Result<Context, NluError> {
        let entities = extract_entities(text);
        debug!(session_id, entities = ?entities, "keyword entities");
        let request = ActionRequest {
            session_id,
            text: Some(text),
            entities: &entities,
        };

        let asked_nearest = entities.contains_key("intent");
        let awaiting_position = context.slot(Slot::LocationToFind).is_some();
        if awaiting_position && !asked_nearest && entities.contains_key("emergencyType") {
            context.clear_slot(Slot::LocationToFind);
            self.report_flow(actions, request, &mut context).await?;
        } else if asked_nearest || awaiting_position {
            self.nearest_flow(actions, request, &mut context, asked_nearest)
                .await?;
        } else {
            self.report_flow(actions, request, &mut context).await?;
        }
        Ok(context)
    }
}
