use std::sync::Arc;

use futures::future::join_all;
use tracing::{info, warn};

use crate::{
    blocks::{paste_prompt, pastes_text, PromptSubject},
    client_cache::ClientCache,
    errors::AppError,
    events::{Event, FileCreatedEvent, MessageEvent},
    pending_actions::{PendingAction, PendingActions, PendingContent},
    rules::{Intent, Rules, TriggerRule},
    service_provider::paste::PasteApi,
};

/// Turns inbound events into prompts and replies. Holds no per-event state.
pub struct EventDispatcher {
    clients: Arc<ClientCache>,
    paste_api: Arc<PasteApi>,
    pending: Arc<PendingActions>,
    rules: Rules,
    paste_user: String,
}

impl EventDispatcher {
    pub fn new(
        clients: Arc<ClientCache>,
        paste_api: Arc<PasteApi>,
        pending: Arc<PendingActions>,
        rules: Rules,
        paste_user: String,
    ) -> EventDispatcher {
        EventDispatcher { clients, paste_api, pending, rules, paste_user }
    }

    /// Returns how many messages were posted. Failures are logged and dropped.
    pub async fn dispatch(&self, team_id: &str, event: &Event) -> usize {
        match event {
            Event::Message(message) if message.is_plain() => self.dispatch_message(team_id, message).await,
            Event::Message(_) | Event::Other => 0,
            Event::FileCreated(file_event) => match self.offer_snippet(team_id, file_event).await {
                Ok(posted) => posted as usize,
                Err(err) => {
                    log_dropped(team_id, None, "snippet", &err);
                    0
                }
            },
        }
    }

    async fn dispatch_message(&self, team_id: &str, message: &MessageEvent) -> usize {
        let runs = self.rules
            .matching(&message.text)
            .map(|rule| self.run_rule(team_id, rule, message));

        join_all(runs).await.into_iter().sum()
    }

    async fn run_rule(&self, team_id: &str, rule: &TriggerRule, message: &MessageEvent) -> usize {
        let result = match rule.intent {
            Intent::OfferPaste => self.offer_paste(team_id, message).await,
            Intent::ListPastes => self.list_pastes(team_id, message).await,
        };

        match result {
            Ok(posted) => posted as usize,
            Err(err) => {
                log_dropped(team_id, Some(&message.channel), rule.name, &err);
                0
            }
        }
    }

    async fn offer_paste(&self, team_id: &str, message: &MessageEvent) -> Result<bool, AppError> {
        let slack = self.clients.require(team_id).await?;
        let user_id = message.user.as_deref()
            .ok_or_else(|| AppError::InvalidPayload("message has no user".to_string()))?;

        let username = slack.get_user_by_id(user_id).await?
            .map(|user| user.display_name().to_string());

        let pending_id = self.pending.insert(PendingAction {
            team_id: team_id.to_string(),
            channel_id: message.channel.clone(),
            content: PendingContent::Message { event: message.clone(), username },
        });

        let prompt = paste_prompt(user_id, PromptSubject::CodeBlock, &pending_id);
        if let Err(err) = slack.post_message(&message.channel, &prompt.text, Some(prompt.attachments)).await {
            self.pending.take(&pending_id);
            return Err(err);
        }

        info!(team_id, channel_id = %message.channel, user_id, "Offered to save code block");
        Ok(true)
    }

    async fn list_pastes(&self, team_id: &str, message: &MessageEvent) -> Result<bool, AppError> {
        let slack = self.clients.require(team_id).await?;
        let pastes = self.paste_api.list_pastes(&self.paste_user).await?;

        let Some(latest) = pastes.first() else {
            info!(team_id, paste_user = %self.paste_user, "No pastes to list");
            return Ok(false);
        };

        slack.post_message(&message.channel, &pastes_text(&latest.url), None).await?;
        Ok(true)
    }

    async fn offer_snippet(&self, team_id: &str, file_event: &FileCreatedEvent) -> Result<bool, AppError> {
        let slack = self.clients.require(team_id).await?;
        let file = slack.get_file_info(&file_event.file_id).await?;

        if !file.is_snippet() {
            return Ok(false);
        }

        let Some(channel_id) = file.first_channel() else {
            info!(team_id, file_id = %file.id, "Snippet is not shared to a channel yet");
            return Ok(false);
        };

        let user_id = file.user.as_deref()
            .or(file_event.user_id.as_deref())
            .ok_or_else(|| AppError::InvalidPayload(format!("snippet {} has no owner", file.id)))?;

        let pending_id = self.pending.insert(PendingAction {
            team_id: team_id.to_string(),
            channel_id: channel_id.to_string(),
            content: PendingContent::Snippet { file_id: file.id.clone() },
        });

        let prompt = paste_prompt(user_id, PromptSubject::Snippet, &pending_id);
        if let Err(err) = slack.post_message(channel_id, &prompt.text, Some(prompt.attachments)).await {
            self.pending.take(&pending_id);
            return Err(err);
        }

        info!(team_id, channel_id, file_id = %file.id, "Offered to save snippet");
        Ok(true)
    }
}

fn log_dropped(team_id: &str, channel_id: Option<&str>, rule: &str, err: &AppError) {
    match err {
        AppError::MissingCredential(_) => {
            warn!(team_id, channel_id, rule, "No credential for team, event dropped");
        },
        _ => {
            warn!(team_id, channel_id, rule, error = %err, "Failed to handle event, event dropped");
        },
    }
}
