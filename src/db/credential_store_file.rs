use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_derive::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::{encryptor::{EncryptedData, Encryptor}, errors::AppError};

use super::{CredentialStore, TeamCredential};

#[derive(Serialize, Deserialize, Debug)]
struct StoredCredential {
    team_id: String,
    access_token: EncryptedData,
    #[serde(default)]
    bot_user_id: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    enterprise_id: Option<String>,
    installed_at: DateTime<Utc>,
}

/// One JSON file per team, token encrypted at rest.
pub struct FileCredentialStore {
    directory: PathBuf,
    encryptor: Encryptor,
}

impl FileCredentialStore {
    pub async fn new(directory: impl AsRef<Path>, encryptor: Encryptor) -> Result<FileCredentialStore, AppError> {
        let directory = directory.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&directory).await?;
        info!(directory = %directory.display(), "Using file credential store");

        Ok(FileCredentialStore { directory, encryptor })
    }

    fn path_for(&self, team_id: &str) -> PathBuf {
        self.directory.join(format!("{}.json", file_stem(team_id)))
    }
}

/// Team ids are opaque; anything outside `[A-Za-z0-9_-]` is hex escaped so a
/// team id can never name a path outside the store directory.
fn file_stem(team_id: &str) -> String {
    team_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            c.to_string()
        } else {
            let mut buf = [0u8; 4];
            format!("%{}", hex::encode(c.encode_utf8(&mut buf).as_bytes()))
        })
        .collect()
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self, team_id: &str) -> Result<Option<TeamCredential>, AppError> {
        let path = self.path_for(team_id);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(team_id, "No stored credential");
                return Ok(None);
            },
            Err(err) => return Err(err.into()),
        };

        let stored: StoredCredential = serde_json::from_str(&content)?;
        let access_token = self.encryptor.decrypt(&stored.access_token)?;

        Ok(Some(TeamCredential {
            team_id: stored.team_id,
            access_token,
            bot_user_id: stored.bot_user_id,
            scope: stored.scope,
            enterprise_id: stored.enterprise_id,
            installed_at: stored.installed_at,
        }))
    }

    async fn set(&self, credential: &TeamCredential) -> Result<(), AppError> {
        let stored = StoredCredential {
            team_id: credential.team_id.clone(),
            access_token: self.encryptor.encrypt(&credential.access_token)?,
            bot_user_id: credential.bot_user_id.clone(),
            scope: credential.scope.clone(),
            enterprise_id: credential.enterprise_id.clone(),
            installed_at: credential.installed_at,
        };

        let path = self.path_for(&credential.team_id);
        let temp_path = path.with_extension("json.tmp");

        tokio::fs::write(&temp_path, serde_json::to_vec_pretty(&stored)?).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        info!(team_id = %credential.team_id, path = %path.display(), "Saved team credential");
        Ok(())
    }
}
