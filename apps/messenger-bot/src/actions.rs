//! Dialogue actions the NLU engine can invoke by name.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use sos_core::{Button, EgressSender, EmergencyCategory, OutboundMessage, TemplateElement};
use sos_nlu::{ActionError, ActionHandler, ActionRequest, BotResponse, first_entity_value};
use sos_session::{Context, SessionId, SharedSessionStore, Slot};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogueAction {
    PrepareNewRequest,
    GetEmergencyType,
    GetLocation,
    GetDatetime,
    GetLocationToFind,
    SendGuidelinesList,
    SendNearest,
}

impl DialogueAction {
    pub const ALL: [DialogueAction; 7] = [
        DialogueAction::PrepareNewRequest,
        DialogueAction::GetEmergencyType,
        DialogueAction::GetLocation,
        DialogueAction::GetDatetime,
        DialogueAction::GetLocationToFind,
        DialogueAction::SendGuidelinesList,
        DialogueAction::SendNearest,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DialogueAction::PrepareNewRequest => "prepareNewRequest",
            DialogueAction::GetEmergencyType => "getEmergencyType",
            DialogueAction::GetLocation => "getLocation",
            DialogueAction::GetDatetime => "getDatetime",
            DialogueAction::GetLocationToFind => "getLocationToFind",
            DialogueAction::SendGuidelinesList => "sendGuidelinesList",
            DialogueAction::SendNearest => "sendNearest",
        }
    }
}

impl FromStr for DialogueAction {
    type Err = ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.name() == s)
            .ok_or_else(|| ActionError::Unknown(s.to_string()))
    }
}

/// Maps search link for `location_to_find` around the `location` coordinates.
pub fn nearest_search_url(location_to_find: &str, location: &str) -> String {
    format!(
        "https://www.google.ca/maps/search/{}+near+me/@{}",
        urlencoding::encode(location_to_find),
        location
    )
}

/// Action set backed by the session store and the Messenger sender.
///
/// Outbound failures are logged and swallowed so a lost reply never aborts
/// the dialogue.
#[derive(Clone)]
pub struct BotActions {
    sessions: SharedSessionStore,
    sender: Arc<dyn EgressSender>,
}

impl BotActions {
    pub fn new(sessions: SharedSessionStore, sender: Arc<dyn EgressSender>) -> Self {
        Self { sessions, sender }
    }

    async fn recipient(&self, session_id: &str) -> Option<String> {
        match self.sessions.get(&SessionId::from(session_id)).await {
            Ok(Some(record)) => Some(record.external_user_id),
            Ok(None) => {
                error!(session_id, "couldn't find user for session");
                None
            }
            Err(err) => {
                error!(session_id, error = %err, "session lookup failed");
                None
            }
        }
    }

    async fn deliver(&self, message: OutboundMessage) {
        let kind = message.body.kind();
        let recipient = message.recipient.clone();
        match self.sender.send(message).await {
            Ok(result) => debug!(
                %recipient,
                kind,
                message_id = result.message_id.as_deref().unwrap_or("-"),
                "message delivered"
            ),
            Err(err) => warn!(%recipient, kind, error = %err, "failed to send message"),
        }
    }

    async fn send_guidelines(&self, session_id: &str, context: &Context) {
        let Some(raw) = context.slot_text(Slot::EmergencyType) else {
            warn!(session_id, "no emergency type to send guidelines for");
            return;
        };
        let category = match raw.parse::<EmergencyCategory>() {
            Ok(category) => category,
            Err(err) => {
                warn!(session_id, error = %err, "skipping guidelines");
                return;
            }
        };
        let Some(recipient) = self.recipient(session_id).await else {
            return;
        };
        let elements = category
            .guidelines()
            .into_iter()
            .map(TemplateElement::from)
            .collect();
        self.deliver(OutboundMessage::generic(recipient, elements))
            .await;
    }

    async fn send_nearest(&self, session_id: &str, context: &mut Context) {
        let target = context.slot_text(Slot::LocationToFind);
        let location = context.slot_text(Slot::Location);
        context.remove(Slot::Location.value_key());
        context.remove(Slot::LocationToFind.value_key());

        let (Some(target), Some(location)) = (target, location) else {
            warn!(session_id, "nearest search needs both a place and a location");
            return;
        };
        let Some(recipient) = self.recipient(session_id).await else {
            return;
        };
        let button = Button::WebUrl {
            url: nearest_search_url(&target, &location),
            title: format!("Show nearest {target}"),
        };
        self.deliver(OutboundMessage::buttons(recipient, vec![button]))
            .await;
    }
}

#[async_trait]
impl ActionHandler for BotActions {
    async fn send(
        &self,
        request: ActionRequest<'_>,
        response: BotResponse,
    ) -> Result<(), ActionError> {
        if let Some(recipient) = self.recipient(request.session_id).await {
            let message =
                OutboundMessage::text_with_replies(recipient, response.text, response.quickreplies);
            self.deliver(message).await;
        }
        Ok(())
    }

    async fn run(
        &self,
        action: &str,
        request: ActionRequest<'_>,
        context: &mut Context,
    ) -> Result<(), ActionError> {
        let action: DialogueAction = action.parse()?;
        debug!(session_id = request.session_id, action = action.name(), "running action");
        let entity = |name: &str| first_entity_value(request.entities, name);
        match action {
            DialogueAction::PrepareNewRequest => context.clear(),
            DialogueAction::GetEmergencyType => {
                context.set_slot(Slot::EmergencyType, entity("emergencyType"))
            }
            DialogueAction::GetLocation => context.set_slot(Slot::Location, entity("location")),
            DialogueAction::GetDatetime => context.set_slot(Slot::Datetime, entity("datetime")),
            DialogueAction::GetLocationToFind => {
                context.set_slot(Slot::LocationToFind, entity("location"))
            }
            DialogueAction::SendGuidelinesList => {
                self.send_guidelines(request.session_id, context).await
            }
            DialogueAction::SendNearest => self.send_nearest(request.session_id, context).await,
        }
        Ok(())
    }
}
