use reqwest::Client;
use serde_derive::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PasteSummary {
    pub url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body sent to the paste service when saving content.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PasteRequest {
    pub text: String,
    pub user: Option<String>,
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

pub struct PasteApi {
    http_client: Client,
    base_url: String,
}

impl PasteApi {
    pub fn new(http_client: Client, base_url: &str) -> PasteApi {
        PasteApi { http_client, base_url: base_url.trim_end_matches('/').to_string() }
    }

    pub async fn list_pastes(&self, user: &str) -> Result<Vec<PasteSummary>, AppError> {
        let url = format!("{}/users/{}/gists", self.base_url, user);

        let response = self.http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.error_for_status() {
            Ok(res) => Ok(res.json().await?),
            Err(err) => {
                warn!(user, error = %err, "Failed to list pastes");
                Err(AppError::PasteApiError(err.to_string()))
            }
        }
    }

    /// Returns the URL of the created paste. The idempotency key lets the
    /// paste service drop a duplicate of a retried request.
    pub async fn create_paste(&self, paste: &PasteRequest, idempotency_key: &str) -> Result<String, AppError> {
        let url = format!("{}/createGist", self.base_url);

        let response = self.http_client
            .post(&url)
            .header("Idempotency-Key", idempotency_key)
            .json(paste)
            .send()
            .await?;

        let response = match response.error_for_status() {
            Ok(res) => res,
            Err(err) => {
                warn!(channel = %paste.channel, error = %err, "Failed to create paste");
                return Err(AppError::PasteApiError(err.to_string()));
            }
        };

        let paste_url = response.text().await?.trim().to_string();
        if paste_url.is_empty() {
            return Err(AppError::PasteApiError("paste service returned an empty body".to_string()));
        }

        info!(channel = %paste.channel, paste_url = %paste_url, "Created paste");
        Ok(paste_url)
    }
}
