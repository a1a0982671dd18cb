use std::sync::Arc;

use chrono::Utc;
use reqwest::{Client, Url};
use serde_derive::Deserialize;
use tracing::{info, warn};

use crate::{
    client_cache::ClientCache,
    config::SlackApp,
    db::{CredentialStore, TeamCredential},
    errors::AppError,
    pending_actions::ExpiringMap,
    service_provider::slack::swap_slack_access_token,
};

/// Query parameters Slack sends back to the redirect URL.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub struct InstallationSettings {
    pub app: SlackApp,
    pub scopes: Vec<String>,
    pub redirect_url: Option<String>,
    pub authorize_url: String,
    pub api_url: String,
}

/// OAuth handshake: `start` redirects to Slack, `complete` stores the token.
pub struct InstallationFlow {
    http_client: Client,
    credentials: Arc<dyn CredentialStore>,
    clients: Arc<ClientCache>,
    settings: InstallationSettings,
    states: ExpiringMap<()>,
}

impl InstallationFlow {
    pub fn new(
        http_client: Client,
        credentials: Arc<dyn CredentialStore>,
        clients: Arc<ClientCache>,
        settings: InstallationSettings,
        states: ExpiringMap<()>,
    ) -> InstallationFlow {
        InstallationFlow { http_client, credentials, clients, settings, states }
    }

    /// Returns the provider URL to redirect the user to.
    pub fn start(&self) -> Result<String, AppError> {
        let state = self.states.insert(());
        let scopes = self.settings.scopes.join(",");

        let mut params = vec![
            ("client_id", self.settings.app.client_id.as_str()),
            ("scope", scopes.as_str()),
            ("state", state.as_str()),
        ];
        if let Some(redirect_url) = &self.settings.redirect_url {
            params.push(("redirect_uri", redirect_url.as_str()));
        }

        let url = Url::parse_with_params(&self.settings.authorize_url, &params)
            .map_err(|err| AppError::Config(format!("invalid authorize URL {}: {}", self.settings.authorize_url, err)))?;

        Ok(url.to_string())
    }

    pub async fn complete(&self, params: &CallbackParams) -> Result<TeamCredential, AppError> {
        if let Some(error) = &params.error {
            return Err(AppError::Installation(format!("authorization was denied: {}", error)));
        }

        let state = params.state.as_deref()
            .ok_or_else(|| AppError::Installation("missing state parameter".to_string()))?;
        if self.states.take(state).is_none() {
            return Err(AppError::Installation("unknown or expired state, please restart the installation".to_string()));
        }

        let code = params.code.as_deref()
            .ok_or_else(|| AppError::Installation("missing code parameter".to_string()))?;

        let oauth = swap_slack_access_token(
            &self.http_client,
            &self.settings.api_url,
            code,
            &self.settings.app.client_id,
            &self.settings.app.client_secret,
            self.settings.redirect_url.as_deref(),
        ).await.inspect_err(|err| warn!(error = %err, "Failed to exchange OAuth code"))?;

        let credential = TeamCredential {
            team_id: oauth.team.id,
            access_token: oauth.access_token,
            bot_user_id: oauth.bot_user_id,
            scope: oauth.scope,
            enterprise_id: oauth.enterprise.map(|enterprise| enterprise.id),
            installed_at: Utc::now(),
        };

        self.credentials.set(&credential).await?;
        self.clients.invalidate(&credential.team_id).await;

        info!(team_id = %credential.team_id, team_name = ?oauth.team.name, "Installed on team");
        Ok(credential)
    }
}
