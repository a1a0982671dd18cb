use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_dynamodb::{Client, types::AttributeValue};
use chrono::{DateTime, Utc};
use tracing::info;

use crate::{encryptor::Encryptor, errors::AppError};
use super::dynamodb_client::{get_attribute, get_optional_attribute};

use super::{CredentialStore, TeamCredential};

pub struct DynamoDbCredentialStore {
    client: Client,
    table_name: String,
    encryptor: Encryptor,
}

impl DynamoDbCredentialStore {
    pub fn new(config: &SdkConfig, table_name: String, encryptor: Encryptor) -> DynamoDbCredentialStore {
        DynamoDbCredentialStore{ client: Client::new(config), table_name, encryptor }
    }
}

fn to_item(credential: &TeamCredential, encryptor: &Encryptor) -> Result<HashMap<String, AttributeValue>, AppError> {
    let encrypted_token = encryptor.encrypt(&credential.access_token)?;
    let encrypted_token_json = serde_json::to_string(&encrypted_token)?;

    let mut item = HashMap::from([
        ("team_id".to_string(), AttributeValue::S(credential.team_id.clone())),
        ("access_token".to_string(), AttributeValue::S(encrypted_token_json)),
        ("installed_at".to_string(), AttributeValue::S(credential.installed_at.to_rfc3339())),
        ("last_updated_at".to_string(), AttributeValue::S(Utc::now().to_rfc3339())),
    ]);

    let optional = [
        ("bot_user_id", &credential.bot_user_id),
        ("scope", &credential.scope),
        ("enterprise_id", &credential.enterprise_id),
    ];
    for (name, value) in optional {
        if let Some(value) = value {
            item.insert(name.to_string(), AttributeValue::S(value.clone()));
        }
    }

    Ok(item)
}

fn from_item(item: &HashMap<String, AttributeValue>, encryptor: &Encryptor) -> Result<TeamCredential, AppError> {
    let team_id = get_attribute(item, "team_id")?;
    let encrypted_token = serde_json::from_str(&get_attribute(item, "access_token")?)?;
    let access_token = encryptor.decrypt(&encrypted_token)?;

    let installed_at = DateTime::parse_from_rfc3339(&get_attribute(item, "installed_at")?)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| AppError::UnexpectedError(format!("invalid installed_at for team {}: {}", team_id, err)))?;

    Ok(TeamCredential {
        team_id,
        access_token,
        bot_user_id: get_optional_attribute(item, "bot_user_id"),
        scope: get_optional_attribute(item, "scope"),
        enterprise_id: get_optional_attribute(item, "enterprise_id"),
        installed_at,
    })
}

#[async_trait]
impl CredentialStore for DynamoDbCredentialStore {
    async fn get(&self, team_id: &str) -> Result<Option<TeamCredential>, AppError> {
        let output = self.client
            .get_item()
            .table_name(&self.table_name)
            .key("team_id", AttributeValue::S(team_id.to_string()))
            .send()
            .await?;

        output.item
            .map(|item| from_item(&item, &self.encryptor))
            .transpose()
    }

    async fn set(&self, credential: &TeamCredential) -> Result<(), AppError> {
        let item = to_item(credential, &self.encryptor)?;

        info!(team_id = %credential.team_id, table = %self.table_name, "Save team credential to DynamoDB");
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await?;

        Ok(())
    }
}
