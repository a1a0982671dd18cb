use base64::{Engine as _, engine::general_purpose};
use derive_more::Display;
use reqwest::{Method, Client};
use serde_derive::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::errors::AppError;

#[derive(Deserialize, Debug)]
struct SlackResponse<T> {
    ok: bool,
    error: Option<String>,

    #[serde(flatten)]
    data: Option<T>,
}

#[derive(Deserialize, Debug)]
struct UserInfoResponse {
    user: Option<User>,
}

#[derive(Deserialize, Debug)]
struct FileInfoResponse {
    file: FileInfo,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub real_name: String,
}

#[derive(Deserialize, Debug, Clone, Display, PartialEq)]
#[display("User ({id}, {name})")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub profile: UserProfile,
}

impl User {
    /// Display name, falling back to the real name and then the handle.
    pub fn display_name(&self) -> &str {
        [self.profile.display_name.as_str(), self.profile.real_name.as_str()]
            .into_iter()
            .find(|name| !name.is_empty())
            .unwrap_or(self.name.as_str())
    }
}

#[derive(Deserialize, Debug, Clone, Display, PartialEq)]
#[display("File ({id}, {mode})")]
pub struct FileInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub mode: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl FileInfo {
    pub fn is_snippet(&self) -> bool {
        self.mode == "snippet"
    }

    /// First public channel, or private channel, the file was shared to.
    pub fn first_channel(&self) -> Option<&str> {
        self.channels.first().or(self.groups.first()).map(String::as_str)
    }
}

pub struct Slack {
    http_client: Client,
    api_url: String,
    api_token: String,
}

impl Slack {
    pub fn new(http_client: Client, api_url: &str, api_token: String) -> Slack {
        Slack{ http_client, api_url: api_url.trim_end_matches('/').to_string(), api_token }
    }

    pub async fn post_message(&self, channel_id: &str, text: &str, attachments: Option<Value>) -> Result<PostedMessage, AppError> {
        let mut payload = json!({
            "channel": channel_id,
            "text": text,
        });

        if let Some(attachments) = attachments {
            payload["attachments"] = attachments;
        }

        self.send_request::<_, ()>("chat.postMessage", Method::POST, None, Some(&payload)).await
    }

    pub async fn get_user_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        let params = json!({
            "user": id,
        });

        let response: UserInfoResponse = self.send_request("users.info", Method::GET, Some(&params), None).await?;
        Ok(response.user)
    }

    /// Snippet text is returned alongside the file metadata by `files.info`.
    pub async fn get_file_info(&self, file_id: &str) -> Result<FileInfo, AppError> {
        let params = json!({
            "file": file_id,
        });

        let response: FileInfoResponse = self.send_request("files.info", Method::GET, Some(&params), None).await?;

        let mut file = response.file;
        if response.content.is_some() {
            file.content = response.content;
        }
        Ok(file)
    }

    async fn send_request<T, Q>(&self, endpoint: &str, method: Method, params: Option<&Q>, payload: Option<&Value>) -> Result<T, AppError>
    where
        T: for<'a> serde::Deserialize<'a>,
        Q: serde::Serialize,
    {
        let url = format!("{}/{}", self.api_url, endpoint);

        let mut request_builder = self.http_client.request(method.clone(), url)
            .bearer_auth(&self.api_token);

        if let Some(params) = params {
            request_builder = request_builder.query(params);
        }

        if let Some(payload) = payload {
            debug!(endpoint, method = method.as_str(), "Slack request");
            request_builder = request_builder
                .header("Content-Type", "application/json; charset=utf-8")
                .body(payload.to_string());
        }

        let response = request_builder
            .send()
            .await?;

        parse_slack_response(endpoint, response).await
    }
}

async fn parse_slack_response<T>(endpoint: &str, response: reqwest::Response) -> Result<T, AppError>
where
    T: for<'a> serde::Deserialize<'a>,
{
    let status = response.status();
    if !status.is_success() {
        warn!(endpoint, %status, "Failed sending request to Slack");
        return Err(AppError::SlackError(format!("Failed sending request to Slack, status: {}", status)));
    }

    let response_body = response.text().await?;
    let json_response: SlackResponse<T> = serde_json::from_str(&response_body)
        .map_err(|err| AppError::SlackError(format!("Failed to parse {} response: {}", endpoint, err)))?;

    match json_response {
        SlackResponse { ok: true, data: Some(data), .. } => Ok(data),
        SlackResponse { ok: true, data: None, .. } => {
            Err(AppError::SlackError(format!("Unexpected {} response shape", endpoint)))
        },
        SlackResponse { error: Some(error), .. } => {
            warn!(endpoint, error = %error, "Slack API returned an error");
            Err(AppError::SlackError(error))
        },
        SlackResponse { error: None, .. } => Err(AppError::SlackError("Unknown error".to_string())),
    }
}

#[derive(Deserialize, Debug)]
pub struct SlackTeam {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct Enterprise {
    pub id: String,
}

#[derive(Deserialize, Debug)]
pub struct SlackOauthResponse {
    pub access_token: String,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub bot_user_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    pub team: SlackTeam,
    #[serde(default)]
    pub enterprise: Option<Enterprise>,
}

pub async fn swap_slack_access_token(
    http_client: &Client,
    api_url: &str,
    temp_code: &str,
    slack_client_id: &str,
    slack_client_secret: &str,
    redirect_url: Option<&str>,
) -> Result<SlackOauthResponse, AppError> {
    debug!("Swap slack access token");
    let mut params = vec![("code", temp_code)];
    if let Some(redirect_url) = redirect_url {
        params.push(("redirect_uri", redirect_url));
    }

    let basic = general_purpose::STANDARD.encode(format!("{}:{}", slack_client_id, slack_client_secret));
    let response = http_client
        .request(Method::POST, format!("{}/oauth.v2.access", api_url.trim_end_matches('/')))
        .header("Authorization", format!("Basic {}", basic))
        .form(&params)
        .send()
        .await?;

    parse_slack_response("oauth.v2.access", response).await
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ActionResponse {
    pub text: String,
    pub replace_original: bool,
}

impl ActionResponse {
    pub fn replacing(text: impl Into<String>) -> ActionResponse {
        ActionResponse { text: text.into(), replace_original: true }
    }
}

/// Posts to the `response_url` of an interaction.
pub struct Responder {
    http_client: Client,
    response_url: String,
}

impl Responder {
    pub fn new(http_client: Client, response_url: String) -> Responder {
        Responder { http_client, response_url }
    }

    pub async fn respond(&self, response: &ActionResponse) -> Result<(), AppError> {
        let result = self.http_client
            .post(&self.response_url)
            .json(response)
            .send()
            .await?;

        if let Err(err) = result.error_for_status_ref() {
            return Err(AppError::SlackError(format!("Failed to respond to interaction: {}", err)));
        }

        Ok(())
    }
}
