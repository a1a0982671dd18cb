use std::{net::SocketAddr, path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};

use crate::{errors::AppError, secrets::Secrets};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CredentialStoreKind {
    File,
    Dynamodb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Slack bot which offers to save pasted code blocks as Gists", long_about = None)]
pub struct Config {
    #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    pub slack_signing_secret: Option<String>,

    #[arg(long, env = "SLACK_CLIENT_ID")]
    pub slack_client_id: Option<String>,

    #[arg(long, env = "SLACK_CLIENT_SECRET", hide_env_values = true)]
    pub slack_client_secret: Option<String>,

    /// Must match a "Redirect URL" of the Slack app when set.
    #[arg(long, env = "SLACK_REDIRECT_URL")]
    pub slack_redirect_url: Option<String>,

    #[arg(
        long,
        env = "SLACK_SCOPES",
        value_delimiter = ',',
        default_value = "chat:write,channels:history,groups:history,im:history,users:read,files:read"
    )]
    pub slack_scopes: Vec<String>,

    #[arg(long, env = "SLACK_API_URL", default_value = "https://slack.com/api")]
    pub slack_api_url: String,

    #[arg(long, env = "SLACK_OAUTH_URL", default_value = "https://slack.com/oauth/v2/authorize")]
    pub slack_oauth_url: String,

    #[arg(long, env = "PASTE_API_URL")]
    pub paste_api_url: Option<String>,

    /// User whose pastes are listed by the keyword trigger.
    #[arg(long, env = "PASTE_USER", default_value = "SlackLackey")]
    pub paste_user: String,

    #[arg(long, env = "LIST_PASTES_KEYWORD", default_value = "get gists")]
    pub list_pastes_keyword: String,

    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    #[arg(long, env = "CREDENTIAL_STORE", value_enum, default_value_t = CredentialStoreKind::File)]
    pub credential_store: CredentialStoreKind,

    #[arg(long, env = "STORAGE_DIR", default_value = "./storage")]
    pub storage_dir: PathBuf,

    #[arg(long, env = "INSTALLATIONS_TABLE_NAME", default_value = "paste-bot-installations")]
    pub installations_table_name: String,

    /// Base64 encoded 32 byte key used to encrypt stored tokens.
    #[arg(long, env = "ENCRYPTION_KEY", hide_env_values = true)]
    pub encryption_key: Option<String>,

    /// Name of an AWS Secrets Manager secret overriding the Slack secrets and encryption key.
    #[arg(long, env = "AWS_SECRET_NAME")]
    pub aws_secret_name: Option<String>,

    #[arg(long, env = "PENDING_ACTION_TTL_SECS", default_value_t = 3600)]
    pub pending_action_ttl_secs: u64,

    #[arg(long, env = "PENDING_ACTION_CAPACITY", default_value_t = 1024)]
    pub pending_action_capacity: usize,

    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10)]
    pub http_timeout_secs: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Slack app secrets, all present.
#[derive(Debug, Clone)]
pub struct SlackApp {
    pub client_id: String,
    pub client_secret: String,
    pub signing_secret: String,
}

impl Config {
    pub fn apply_secrets(&mut self, secrets: Secrets) {
        if secrets.encryption_key.is_some() {
            self.encryption_key = secrets.encryption_key;
        }
        if secrets.slack_client_id.is_some() {
            self.slack_client_id = secrets.slack_client_id;
        }
        if secrets.slack_client_secret.is_some() {
            self.slack_client_secret = secrets.slack_client_secret;
        }
        if secrets.slack_signing_secret.is_some() {
            self.slack_signing_secret = secrets.slack_signing_secret;
        }
    }

    pub fn slack_app(&self) -> Result<SlackApp, AppError> {
        Ok(SlackApp {
            client_id: required(&self.slack_client_id, "SLACK_CLIENT_ID")?,
            client_secret: required(&self.slack_client_secret, "SLACK_CLIENT_SECRET")?,
            signing_secret: required(&self.slack_signing_secret, "SLACK_SIGNING_SECRET")?,
        })
    }

    pub fn paste_api_url(&self) -> Result<String, AppError> {
        required(&self.paste_api_url, "PASTE_API_URL").map(|url| url.trim_end_matches('/').to_string())
    }

    pub fn encryption_key(&self) -> Result<String, AppError> {
        required(&self.encryption_key, "ENCRYPTION_KEY")
    }

    pub fn listen_address(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|err| AppError::Config(format!("invalid listen address {}:{}: {}", self.bind_address, self.port, err)))
    }

    pub fn pending_action_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_action_ttl_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Checks every required value up front so startup fails fast.
    pub fn validate(&self) -> Result<(), AppError> {
        self.slack_app()?;
        self.paste_api_url()?;
        self.encryption_key()?;
        self.listen_address()?;

        if self.list_pastes_keyword.is_empty() {
            return Err(AppError::Config("LIST_PASTES_KEYWORD must not be empty".to_string()));
        }
        if self.pending_action_capacity == 0 {
            return Err(AppError::Config("PENDING_ACTION_CAPACITY must be greater than zero".to_string()));
        }

        Ok(())
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, AppError> {
    value
        .as_ref()
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .ok_or_else(|| AppError::Config(format!("{} is required", name)))
}
