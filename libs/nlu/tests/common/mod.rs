#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use sos_nlu::{ActionError, ActionHandler, ActionRequest, BotResponse, first_entity_value};
use sos_session::{Context, Slot};

/// Records every action and utterance; slot getters behave like the bot's.
#[derive(Default)]
pub struct RecordingActions {
    pub calls: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<BotResponse>>,
}

impl RecordingActions {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<BotResponse> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ActionHandler for RecordingActions {
    async fn send(
        &self,
        _request: ActionRequest<'_>,
        response: BotResponse,
    ) -> Result<(), ActionError> {
        self.calls.lock().unwrap().push("send".into());
        self.sent.lock().unwrap().push(response);
        Ok(())
    }

    async fn run(
        &self,
        action: &str,
        request: ActionRequest<'_>,
        context: &mut Context,
    ) -> Result<(), ActionError> {
        self.calls.lock().unwrap().push(action.to_string());
        let fill = |slot: Slot, entity: &str, context: &mut Context| {
            context.set_slot(slot, first_entity_value(request.entities, entity));
        };
        match action {
            "getEmergencyType" => fill(Slot::EmergencyType, "emergencyType", context),
            "getLocation" => fill(Slot::Location, "location", context),
            "getDatetime" => fill(Slot::Datetime, "datetime", context),
            "getLocationToFind" => fill(Slot::LocationToFind, "location", context),
            "prepareNewRequest" => context.clear(),
            "sendGuidelinesList" => {}
            "sendNearest" => {
                context.remove("location");
                context.remove("locationToFind");
            }
            other => return Err(ActionError::Unknown(other.to_string())),
        }
        Ok(())
    }
}
