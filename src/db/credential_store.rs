use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::errors::AppError;

use super::TeamCredential;

/// Persists one credential per team. Last write wins.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, team_id: &str) -> Result<Option<TeamCredential>, AppError>;

    async fn set(&self, credential: &TeamCredential) -> Result<(), AppError>;
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    credentials: RwLock<HashMap<String, TeamCredential>>,
}

impl MemoryCredentialStore {
    pub fn new() -> MemoryCredentialStore {
        MemoryCredentialStore::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self, team_id: &str) -> Result<Option<TeamCredential>, AppError> {
        Ok(self.credentials.read().await.get(team_id).cloned())
    }

    async fn set(&self, credential: &TeamCredential) -> Result<(), AppError> {
        self.credentials.write().await.insert(credential.team_id.clone(), credential.clone());
        Ok(())
    }
}
