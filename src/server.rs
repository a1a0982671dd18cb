use std::sync::Arc;

use aws_config::{BehaviorVersion, SdkConfig};
use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::{
    action_handler::ActionHandler,
    build_http_client,
    client_cache::ClientCache,
    config::{Config, CredentialStoreKind},
    db::{CredentialStore, DynamoDbCredentialStore, FileCredentialStore},
    encryptor::Encryptor,
    errors::AppError,
    event_dispatcher::EventDispatcher,
    events::{EventEnvelope, InteractionPayload},
    installation::{CallbackParams, InstallationFlow, InstallationSettings},
    pending_actions::{ExpiringMap, PendingActions},
    rules::Rules,
    secrets::SecretsClient,
    service_provider::{paste::PasteApi, slack::Responder},
    signature::verify_headers,
};

/// Everything a request handler needs, shared behind one `Arc`.
pub struct AppContext {
    pub http_client: Client,
    pub signing_secret: String,
    pub clients: Arc<ClientCache>,
    pub pending: Arc<PendingActions>,
    pub dispatcher: EventDispatcher,
    pub actions: ActionHandler,
    pub installation: InstallationFlow,
}

impl AppContext {
    /// Wires the components on top of an already opened credential store.
    pub fn new(config: &Config, http_client: Client, credentials: Arc<dyn CredentialStore>) -> Result<AppContext, AppError> {
        config.validate()?;
        let app = config.slack_app()?;

        let clients = Arc::new(ClientCache::new(credentials.clone(), http_client.clone(), &config.slack_api_url));
        let paste_api = Arc::new(PasteApi::new(http_client.clone(), &config.paste_api_url()?));
        let pending = Arc::new(PendingActions::new(config.pending_action_ttl(), config.pending_action_capacity));

        let dispatcher = EventDispatcher::new(
            clients.clone(),
            paste_api.clone(),
            pending.clone(),
            Rules::default_with_keyword(&config.list_pastes_keyword),
            config.paste_user.clone(),
        );
        let actions = ActionHandler::new(clients.clone(), paste_api, pending.clone());

        let signing_secret = app.signing_secret.clone();
        let installation = InstallationFlow::new(
            http_client.clone(),
            credentials,
            clients.clone(),
            InstallationSettings {
                app,
                scopes: config.slack_scopes.clone(),
                redirect_url: config.slack_redirect_url.clone(),
                authorize_url: config.slack_oauth_url.clone(),
                api_url: config.slack_api_url.clone(),
            },
            ExpiringMap::new(config.pending_action_ttl(), config.pending_action_capacity),
        );

        Ok(AppContext { http_client, signing_secret, clients, pending, dispatcher, actions, installation })
    }
}

/// Loads secrets and opens the configured credential store before wiring the context.
pub async fn build_context(mut config: Config) -> Result<AppContext, AppError> {
    let needs_aws = config.aws_secret_name.is_some() || config.credential_store == CredentialStoreKind::Dynamodb;
    let sdk_config: Option<SdkConfig> = match needs_aws {
        true => Some(aws_config::load_defaults(BehaviorVersion::latest()).await),
        false => None,
    };

    if let (Some(secret_name), Some(sdk_config)) = (config.aws_secret_name.clone(), sdk_config.as_ref()) {
        let secrets = SecretsClient::new(sdk_config).get_secret(&secret_name).await?;
        config.apply_secrets(secrets);
    }

    config.validate()?;
    let encryptor = Encryptor::from_base64(&config.encryption_key()?)?;

    let credentials: Arc<dyn CredentialStore> = match (config.credential_store, sdk_config.as_ref()) {
        (CredentialStoreKind::Dynamodb, Some(sdk_config)) => {
            info!(table = %config.installations_table_name, "Using DynamoDB credential store");
            Arc::new(DynamoDbCredentialStore::new(sdk_config, config.installations_table_name.clone(), encryptor))
        },
        _ => {
            info!(directory = %config.storage_dir.display(), "Using file credential store");
            Arc::new(FileCredentialStore::new(&config.storage_dir, encryptor).await?)
        },
    };

    let http_client = build_http_client(config.http_timeout())?;
    AppContext::new(&config, http_client, credentials)
}

pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/auth/install", get(install))
        .route("/auth/install/callback", get(install_callback))
        .route("/events", post(events))
        .route("/actions", post(actions))
        .with_state(context)
}

pub async fn serve(config: Config) -> Result<(), AppError> {
    let address = config.listen_address()?;
    let context = Arc::new(build_context(config).await?);

    let listener = tokio::net::TcpListener::bind(address).await?;
    info!(address = %address, "Listening");

    axum::serve(listener, router(context))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
    }
}

async fn home() -> Html<&'static str> {
    Html(r#"<!DOCTYPE html>
<html>
  <head><title>Paste bot</title></head>
  <body>
    <h1>Paste bot</h1>
    <p><a href="/auth/install">Add to Slack</a></p>
  </body>
</html>"#)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "checked_at": Utc::now().to_rfc3339() }))
}

async fn install(State(context): State<Arc<AppContext>>) -> Result<Response, AppError> {
    let url = context.installation.start()?;
    Ok((StatusCode::FOUND, [(header::LOCATION, url)]).into_response())
}

async fn install_callback(State(context): State<Arc<AppContext>>, Query(params): Query<CallbackParams>) -> Response {
    match context.installation.complete(&params).await {
        Ok(credential) => Html(format!(
            "<html><body><h1>Thanks for installing!</h1><p>The bot is now active in team {}.</p></body></html>",
            escape_html(&credential.team_id),
        )).into_response(),
        Err(err) => {
            warn!(error = %err, "Installation failed");
            let page = format!(
                "<html><body><h1>Installation failed</h1><pre>{}</pre></body></html>",
                escape_html(&err.to_string()),
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Html(page)).into_response()
        },
    }
}

async fn events(State(context): State<Arc<AppContext>>, headers: HeaderMap, body: String) -> Result<Response, AppError> {
    verify_headers(&context.signing_secret, &headers, &body, Utc::now().timestamp())?;

    match serde_json::from_str::<EventEnvelope>(&body)? {
        EventEnvelope::UrlVerification { challenge } => {
            info!("Answered url verification");
            Ok(Json(json!({ "challenge": challenge })).into_response())
        },
        EventEnvelope::EventCallback { team_id, event_id, event } => {
            debug!(team_id = %team_id, event_id = ?event_id, "Received event callback");

            tokio::spawn(async move {
                let posted = context.dispatcher.dispatch(&team_id, &event).await;
                debug!(team_id = %team_id, event_id = ?event_id, posted, "Event handled");
            });

            Ok(StatusCode::OK.into_response())
        },
        EventEnvelope::Unsupported => {
            debug!("Ignored unsupported envelope");
            Ok(StatusCode::OK.into_response())
        },
    }
}

async fn actions(State(context): State<Arc<AppContext>>, headers: HeaderMap, body: String) -> Result<StatusCode, AppError> {
    verify_headers(&context.signing_secret, &headers, &body, Utc::now().timestamp())?;

    let payload = InteractionPayload::from_form(&body)?;
    let Some(response_url) = payload.response_url.clone() else {
        info!(kind = %payload.kind, "Ignored interaction without response url");
        return Ok(StatusCode::OK);
    };

    tokio::spawn(async move {
        let responder = Responder::new(context.http_client.clone(), response_url);

        match context.actions.handle(&payload, &responder).await {
            Ok(outcome) => debug!(outcome = ?outcome, "Action handled"),
            Err(err) => warn!(error = %err, team_id = ?payload.team_id(), "Action failed"),
        }
    });

    Ok(StatusCode::OK)
}

fn escape_html(text: &str) -> String {
    text.chars().fold(String::with_capacity(text.len()), |mut escaped, c| {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
        escaped
    })
}
