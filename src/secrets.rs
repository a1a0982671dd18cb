use aws_config::SdkConfig;
use aws_sdk_secretsmanager::Client;
use serde_derive::{Serialize, Deserialize};
use tracing::info;

use crate::errors::AppError;

/// Secret overlay stored as JSON in AWS Secrets Manager. Absent fields keep
/// the values from the environment.
#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Secrets {
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub slack_client_id: Option<String>,
    #[serde(default)]
    pub slack_client_secret: Option<String>,
    #[serde(default)]
    pub slack_signing_secret: Option<String>,
}

impl Secrets {
    pub fn from_json(value: &str) -> Result<Secrets, AppError> {
        Ok(serde_json::from_str(value)?)
    }
}

pub struct SecretsClient {
    client: Client,
}

impl SecretsClient {
    pub fn new(config: &SdkConfig) -> SecretsClient {
        SecretsClient{ client: Client::new(config) }
    }

    pub async fn get_secret(&self, name: &str) -> Result<Secrets, AppError> {
        info!(secret_name = name, "Querying secret value");

        let result = self.client
            .get_secret_value()
            .secret_id(name)
            .send()
            .await?;

        let secret_value = result
            .secret_string()
            .ok_or_else(|| AppError::Config(format!("secret {} has no string value", name)))?;

        Secrets::from_json(secret_value)
    }
}
