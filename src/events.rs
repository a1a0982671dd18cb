use serde_derive::{Deserialize, Serialize};

use crate::errors::AppError;

/// Body of a request delivered to the Events API request URL.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventEnvelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        team_id: String,
        #[serde(default)]
        event_id: Option<String>,
        event: Event,
    },
    #[serde(other)]
    Unsupported,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Message(MessageEvent),
    FileCreated(FileCreatedEvent),
    #[serde(other)]
    Other,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MessageEvent {
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
}

impl MessageEvent {
    /// Plain user messages: no subtype and not posted by a bot.
    pub fn is_plain(&self) -> bool {
        self.subtype.is_none() && self.bot_id.is_none()
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FileCreatedEvent {
    pub file_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IdRef {
    pub id: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Interactive component payload (`block_actions`).
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct InteractionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub team: Option<IdRef>,
    #[serde(default)]
    pub user: Option<IdRef>,
    #[serde(default)]
    pub channel: Option<IdRef>,
    #[serde(default)]
    pub response_url: Option<String>,
    #[serde(default)]
    pub actions: Vec<BlockAction>,
}

impl InteractionPayload {
    /// Decodes the `payload` field of a form encoded interaction request.
    pub fn from_form(body: &str) -> Result<InteractionPayload, AppError> {
        let payload = form_urlencoded::parse(body.as_bytes())
            .find(|(key, _)| key == "payload")
            .map(|(_, value)| value.into_owned())
            .ok_or_else(|| AppError::InvalidPayload("missing payload field".to_string()))?;

        serde_json::from_str(&payload)
            .map_err(|err| AppError::InvalidPayload(format!("payload is not valid JSON: {}", err)))
    }

    pub fn team_id(&self) -> Option<&str> {
        self.team.as_ref().map(|team| team.id.as_str())
    }
}
