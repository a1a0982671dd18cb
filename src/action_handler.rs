use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    blocks::{saved_text, CANCELLED_TEXT, CANCEL_PASTE_ACTION, EXPIRED_TEXT, SAVE_FAILED_TEXT, SAVE_PASTE_ACTION},
    client_cache::ClientCache,
    errors::AppError,
    events::{BlockAction, InteractionPayload},
    pending_actions::{PendingAction, PendingActions, PendingContent},
    service_provider::{paste::{PasteApi, PasteRequest}, slack::{ActionResponse, Responder}},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Saved(String),
    SaveFailed,
    Cancelled,
    Ignored,
}

/// Handles clicks on the buttons of a paste prompt.
pub struct ActionHandler {
    clients: Arc<ClientCache>,
    paste_api: Arc<PasteApi>,
    pending: Arc<PendingActions>,
}

impl ActionHandler {
    pub fn new(clients: Arc<ClientCache>, paste_api: Arc<PasteApi>, pending: Arc<PendingActions>) -> ActionHandler {
        ActionHandler { clients, paste_api, pending }
    }

    pub async fn handle(&self, payload: &InteractionPayload, responder: &Responder) -> Result<ActionOutcome, AppError> {
        if payload.kind != "block_actions" {
            info!(kind = %payload.kind, "Ignored interaction");
            return Ok(ActionOutcome::Ignored);
        }

        let Some(action) = payload.actions.first() else {
            return Ok(ActionOutcome::Ignored);
        };

        match action.action_id.as_str() {
            SAVE_PASTE_ACTION => self.save(payload, action, responder).await,
            CANCEL_PASTE_ACTION => self.cancel(action, responder).await,
            other => {
                info!(action_id = other, "Ignored unknown action");
                Ok(ActionOutcome::Ignored)
            }
        }
    }

    async fn save(&self, payload: &InteractionPayload, action: &BlockAction, responder: &Responder) -> Result<ActionOutcome, AppError> {
        let pending_id = action.value.as_deref()
            .ok_or_else(|| AppError::InvalidPayload("save action has no value".to_string()))?;

        let same_team = |pending: &PendingAction| payload.team_id().map_or(true, |team_id| team_id == pending.team_id);
        let Some(pending) = self.pending.take_if(pending_id, same_team) else {
            warn!(team_id = ?payload.team_id(), action_id = SAVE_PASTE_ACTION, pending_id, "Pending paste is gone");
            responder.respond(&ActionResponse::replacing(EXPIRED_TEXT)).await?;
            return Err(AppError::PendingActionNotFound(pending_id.to_string()));
        };

        match self.create_paste(&pending, pending_id).await {
            Ok(paste_url) => {
                responder.respond(&ActionResponse::replacing(saved_text(&paste_url))).await?;
                Ok(ActionOutcome::Saved(paste_url))
            },
            Err(err) => {
                warn!(team_id = %pending.team_id, channel_id = %pending.channel_id, action_id = SAVE_PASTE_ACTION, error = %err, "Failed to save paste");
                responder.respond(&ActionResponse::replacing(SAVE_FAILED_TEXT)).await?;
                Ok(ActionOutcome::SaveFailed)
            }
        }
    }

    async fn create_paste(&self, pending: &PendingAction, idempotency_key: &str) -> Result<String, AppError> {
        let request = match &pending.content {
            PendingContent::Message { event, username } => PasteRequest {
                text: event.text.clone(),
                user: event.user.clone(),
                channel: pending.channel_id.clone(),
                username: username.clone(),
                filename: None,
            },
            PendingContent::Snippet { file_id } => {
                let slack = self.clients.require(&pending.team_id).await?;
                let file = slack.get_file_info(file_id).await?;
                let text = file.content
                    .ok_or_else(|| AppError::SlackError(format!("snippet {} has no content", file_id)))?;

                PasteRequest {
                    text,
                    user: file.user,
                    channel: pending.channel_id.clone(),
                    username: None,
                    filename: Some(file.name).filter(|name| !name.is_empty()),
                }
            },
        };

        self.paste_api.create_paste(&request, idempotency_key).await
    }

    async fn cancel(&self, action: &BlockAction, responder: &Responder) -> Result<ActionOutcome, AppError> {
        if let Some(pending_id) = action.value.as_deref() {
            self.pending.take(pending_id);
        }

        responder.respond(&ActionResponse::replacing(CANCELLED_TEXT)).await?;
        Ok(ActionOutcome::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use httpmock::{Method::{GET, POST}, MockServer};
    use reqwest::Client;
    use serde_json::json;

    use super::{ActionHandler, ActionOutcome};
    use crate::{
        client_cache::ClientCache,
        db::{CredentialStore, MemoryCredentialStore, TeamCredential},
        errors::AppError,
        events::{BlockAction, IdRef, InteractionPayload, MessageEvent},
        pending_actions::{PendingAction, PendingActions, PendingContent},
        service_provider::{paste::PasteApi, slack::Responder},
    };

    const ORIGINAL_TEXT: &str = "here's my code: ```print(1)```";

    struct Fixture {
        handler: ActionHandler,
        pending: Arc<PendingActions>,
    }

    async fn fixture(slack: &MockServer, paste: &MockServer) -> Fixture {
        let store = Arc::new(MemoryCredentialStore::new());
        store.set(&TeamCredential::new("T1", "xoxb-1")).await.unwrap();

        let clients = Arc::new(ClientCache::new(store, Client::new(), &slack.base_url()));
        let paste_api = Arc::new(PasteApi::new(Client::new(), &paste.base_url()));
        let pending = Arc::new(PendingActions::new(Duration::from_secs(60), 16));

        Fixture { handler: ActionHandler::new(clients, paste_api, pending.clone()), pending }
    }

    fn pending_message(pending: &PendingActions) -> String {
        pending.insert(PendingAction {
            team_id: "T1".to_string(),
            channel_id: "C1".to_string(),
            content: PendingContent::Message {
                event: MessageEvent {
                    channel: "C1".to_string(),
                    user: Some("U1".to_string()),
                    text: ORIGINAL_TEXT.to_string(),
                    ..MessageEvent::default()
                },
                username: Some("Ada".to_string()),
            },
        })
    }

    fn interaction(action_id: &str, value: &str) -> InteractionPayload {
        InteractionPayload {
            kind: "block_actions".to_string(),
            team: Some(IdRef { id: "T1".to_string() }),
            user: Some(IdRef { id: "U1".to_string() }),
            channel: Some(IdRef { id: "C1".to_string() }),
            response_url: None,
            actions: vec![BlockAction { action_id: action_id.to_string(), value: Some(value.to_string()) }],
        }
    }

    #[tokio::test]
    async fn confirm_creates_paste_and_replaces_prompt() {
        let slack = MockServer::start_async().await;
        let paste = MockServer::start_async().await;
        let create = paste.mock(|when, then| {
            when.method(POST).path("/createGist").body_includes("print(1)");
            then.status(200).body("https://paste.example/abc");
        });
        let respond = slack.mock(|when, then| {
            when.method(POST)
                .path("/respond")
                .body_includes("https://paste.example/abc")
                .body_includes("\"replace_original\":true");
            then.status(200).body("ok");
        });

        let fixture = fixture(&slack, &paste).await;
        let id = pending_message(&fixture.pending);
        let responder = Responder::new(Client::new(), slack.url("/respond"));

        let outcome = fixture.handler.handle(&interaction("save_paste", &id), &responder).await.unwrap();

        assert_eq!(outcome, ActionOutcome::Saved("https://paste.example/abc".to_string()));
        create.assert_calls(1);
        respond.assert_calls(1);
        assert!(fixture.pending.is_empty());
    }

    #[tokio::test]
    async fn paste_failure_responds_with_retry_later() {
        let slack = MockServer::start_async().await;
        let paste = MockServer::start_async().await;
        paste.mock(|when, then| {
            when.method(POST).path("/createGist");
            then.status(500);
        });
        let respond = slack.mock(|when, then| {
            when.method(POST).path("/respond").body_includes("Try again later");
            then.status(200).body("ok");
        });

        let fixture = fixture(&slack, &paste).await;
        let id = pending_message(&fixture.pending);
        let responder = Responder::new(Client::new(), slack.url("/respond"));

        let outcome = fixture.handler.handle(&interaction("save_paste", &id), &responder).await.unwrap();

        assert_eq!(outcome, ActionOutcome::SaveFailed);
        respond.assert_calls(1);
    }

    #[tokio::test]
    async fn cancel_makes_no_paste_call() {
        let slack = MockServer::start_async().await;
        let paste = MockServer::start_async().await;
        let any_paste = paste.mock(|when, then| {
            when.any_request();
            then.status(200).body("https://paste.example/never");
        });
        let respond = slack.mock(|when, then| {
            when.method(POST).path("/respond").body_includes("won't save it");
            then.status(200).body("ok");
        });

        let fixture = fixture(&slack, &paste).await;
        let id = pending_message(&fixture.pending);
        let responder = Responder::new(Client::new(), slack.url("/respond"));

        let outcome = fixture.handler.handle(&interaction("cancel_paste", &id), &responder).await.unwrap();

        assert_eq!(outcome, ActionOutcome::Cancelled);
        any_paste.assert_calls(0);
        respond.assert_calls(1);
        assert!(fixture.pending.is_empty());
    }

    #[tokio::test]
    async fn unknown_pending_id_fails_without_paste_call() {
        let slack = MockServer::start_async().await;
        let paste = MockServer::start_async().await;
        let any_paste = paste.mock(|when, then| {
            when.any_request();
            then.status(200).body("https://paste.example/never");
        });
        let respond = slack.mock(|when, then| {
            when.method(POST).path("/respond").body_includes("Post it again");
            then.status(200).body("ok");
        });

        let fixture = fixture(&slack, &paste).await;
        let responder = Responder::new(Client::new(), slack.url("/respond"));

        let result = fixture.handler.handle(&interaction("save_paste", "{\"corrupted\": "), &responder).await;

        assert!(matches!(result, Err(AppError::PendingActionNotFound(_))));
        any_paste.assert_calls(0);
        respond.assert_calls(1);
    }

    #[tokio::test]
    async fn expired_confirm_tells_the_user() {
        let slack = MockServer::start_async().await;
        let paste = MockServer::start_async().await;
        let any_paste = paste.mock(|when, then| {
            when.any_request();
            then.status(200).body("https://paste.example/never");
        });
        let respond = slack.mock(|when, then| {
            when.method(POST)
                .path("/respond")
                .body_includes("expired")
                .body_includes("\"replace_original\":true");
            then.status(200).body("ok");
        });

        let fixture = fixture(&slack, &paste).await;
        let id = pending_message(&fixture.pending);
        let now = chrono::Utc::now();
        assert!(fixture.pending.take_at(&id, now + chrono::Duration::seconds(120)).is_none());
        let responder = Responder::new(Client::new(), slack.url("/respond"));

        let result = fixture.handler.handle(&interaction("save_paste", &id), &responder).await;

        assert!(matches!(result, Err(AppError::PendingActionNotFound(_))));
        respond.assert_calls(1);
        any_paste.assert_calls(0);
    }

    #[tokio::test]
    async fn pending_id_from_another_team_is_rejected() {
        let slack = MockServer::start_async().await;
        let paste = MockServer::start_async().await;
        let any_paste = paste.mock(|when, then| {
            when.any_request();
            then.status(200).body("https://paste.example/never");
        });

        let respond = slack.mock(|when, then| {
            when.method(POST).path("/respond");
            then.status(200).body("ok");
        });

        let fixture = fixture(&slack, &paste).await;
        let id = pending_message(&fixture.pending);
        let mut payload = interaction("save_paste", &id);
        payload.team = Some(IdRef { id: "T2".to_string() });
        let responder = Responder::new(Client::new(), slack.url("/respond"));

        let result = fixture.handler.handle(&payload, &responder).await;

        assert!(matches!(result, Err(AppError::PendingActionNotFound(_))));
        any_paste.assert_calls(0);
        respond.assert_calls(1);
        assert_eq!(fixture.pending.len(), 1);
    }

    #[tokio::test]
    async fn snippet_confirm_reads_file_content() {
        let slack = MockServer::start_async().await;
        let paste = MockServer::start_async().await;
        let file_info = slack.mock(|when, then| {
            when.method(GET).path("/files.info").query_param("file", "F1");
            then.status(200).json_body(json!({
                "ok": true,
                "file": { "id": "F1", "mode": "snippet", "user": "U1", "name": "main.rs", "channels": ["C1"] },
                "content": "fn main() {}"
            }));
        });
        let create = paste.mock(|when, then| {
            when.method(POST)
                .path("/createGist")
                .json_body(json!({ "text": "fn main() {}", "user": "U1", "channel": "C1", "filename": "main.rs" }));
            then.status(200).body("https://paste.example/snippet");
        });
        slack.mock(|when, then| {
            when.method(POST).path("/respond");
            then.status(200).body("ok");
        });

        let fixture = fixture(&slack, &paste).await;
        let id = fixture.pending.insert(PendingAction {
            team_id: "T1".to_string(),
            channel_id: "C1".to_string(),
            content: PendingContent::Snippet { file_id: "F1".to_string() },
        });
        let responder = Responder::new(Client::new(), slack.url("/respond"));

        let outcome = fixture.handler.handle(&interaction("save_paste", &id), &responder).await.unwrap();

        assert_eq!(outcome, ActionOutcome::Saved("https://paste.example/snippet".to_string()));
        file_info.assert_calls(1);
        create.assert_calls(1);
    }

    #[tokio::test]
    async fn other_interactions_are_ignored() {
        let slack = MockServer::start_async().await;
        let paste = MockServer::start_async().await;
        let fixture = fixture(&slack, &paste).await;
        let responder = Responder::new(Client::new(), slack.url("/respond"));

        let mut payload = interaction("save_paste", "x");
        payload.kind = "view_submission".to_string();
        assert_eq!(fixture.handler.handle(&payload, &responder).await.unwrap(), ActionOutcome::Ignored);

        let payload = interaction("something_else", "x");
        assert_eq!(fixture.handler.handle(&payload, &responder).await.unwrap(), ActionOutcome::Ignored);
    }
}
