use std::{collections::HashMap, sync::Arc};

use reqwest::Client;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{db::CredentialStore, errors::AppError, service_provider::slack::Slack};

/// One Slack client per team, built lazily from the stored credential.
pub struct ClientCache {
    credentials: Arc<dyn CredentialStore>,
    http_client: Client,
    api_url: String,
    slots: RwLock<Slots>,
}

#[derive(Default)]
struct Slots {
    clients: HashMap<String, Arc<Slack>>,
    // bumped by `invalidate`, so a resolve that read an older token does not memoize it
    generations: HashMap<String, u64>,
}

impl Slots {
    fn generation(&self, team_id: &str) -> u64 {
        self.generations.get(team_id).copied().unwrap_or_default()
    }
}

impl ClientCache {
    pub fn new(credentials: Arc<dyn CredentialStore>, http_client: Client, api_url: &str) -> ClientCache {
        ClientCache {
            credentials,
            http_client,
            api_url: api_url.to_string(),
            slots: RwLock::new(Slots::default()),
        }
    }

    pub async fn resolve(&self, team_id: &str) -> Result<Option<Arc<Slack>>, AppError> {
        loop {
            let generation = {
                let slots = self.slots.read().await;
                if let Some(client) = slots.clients.get(team_id) {
                    return Ok(Some(client.clone()));
                }
                slots.generation(team_id)
            };

            let Some(credential) = self.credentials.get(team_id).await? else {
                return Ok(None);
            };

            let mut slots = self.slots.write().await;
            if slots.generation(team_id) != generation {
                debug!(team_id, "Credential changed while resolving, reading it again");
                continue;
            }

            // another task may have built it while the store was read
            let client = slots.clients
                .entry(team_id.to_string())
                .or_insert_with(|| {
                    debug!(team_id, "Creating Slack client");
                    Arc::new(Slack::new(self.http_client.clone(), &self.api_url, credential.access_token))
                })
                .clone();

            return Ok(Some(client));
        }
    }

    /// `resolve`, treating a team without a credential as an error.
    pub async fn require(&self, team_id: &str) -> Result<Arc<Slack>, AppError> {
        self.resolve(team_id)
            .await?
            .ok_or_else(|| AppError::MissingCredential(team_id.to_string()))
    }

    /// Drops the cached client so the next `resolve` picks up a new token.
    pub async fn invalidate(&self, team_id: &str) {
        let mut slots = self.slots.write().await;
        slots.clients.remove(team_id);
        *slots.generations.entry(team_id.to_string()).or_default() += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::{AtomicBool, Ordering}, Arc};

    use async_trait::async_trait;
    use httpmock::{Method::POST, MockServer};
    use reqwest::Client;
    use serde_json::json;
    use tokio::sync::Notify;

    use super::ClientCache;
    use crate::{db::{CredentialStore, MemoryCredentialStore, TeamCredential}, errors::AppError};

    /// Holds the first `get` after it read the store until `release` is notified.
    #[derive(Default)]
    struct PausingStore {
        inner: MemoryCredentialStore,
        paused: AtomicBool,
        reading: Notify,
        release: Notify,
    }

    #[async_trait]
    impl CredentialStore for PausingStore {
        async fn get(&self, team_id: &str) -> Result<Option<TeamCredential>, AppError> {
            let credential = self.inner.get(team_id).await?;
            if !self.paused.swap(true, Ordering::SeqCst) {
                self.reading.notify_one();
                self.release.notified().await;
            }
            Ok(credential)
        }

        async fn set(&self, credential: &TeamCredential) -> Result<(), AppError> {
            self.inner.set(credential).await
        }
    }

    #[tokio::test]
    async fn absent_without_credential() {
        let cache = ClientCache::new(Arc::new(MemoryCredentialStore::new()), Client::new(), "http://localhost");

        assert!(cache.resolve("T1").await.unwrap().is_none());
        assert!(matches!(cache.require("T1").await, Err(AppError::MissingCredential(team)) if team == "T1"));
    }

    #[tokio::test]
    async fn returns_the_same_handle_once_stored() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.set(&TeamCredential::new("T1", "xoxb-1")).await.unwrap();
        let cache = ClientCache::new(store, Client::new(), "http://localhost");

        let first = cache.resolve("T1").await.unwrap().expect("client");
        let second = cache.resolve("T1").await.unwrap().expect("client");

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn invalidate_rebuilds_the_handle() {
        let store = Arc::new(MemoryCredentialStore::new());
        store.set(&TeamCredential::new("T1", "xoxb-1")).await.unwrap();
        let cache = ClientCache::new(store, Client::new(), "http://localhost");

        let first = cache.resolve("T1").await.unwrap().expect("client");
        cache.invalidate("T1").await;
        let second = cache.resolve("T1").await.unwrap().expect("client");

        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn reinstall_during_resolve_does_not_keep_the_old_token() {
        let server = MockServer::start_async().await;
        let with_new_token = server.mock(|when, then| {
            when.method(POST).path("/chat.postMessage").header("authorization", "Bearer xoxb-new");
            then.status(200).json_body(json!({"ok": true, "channel": "C1", "ts": "1.0"}));
        });

        let store = Arc::new(PausingStore::default());
        store.set(&TeamCredential::new("T1", "xoxb-old")).await.unwrap();
        let cache = Arc::new(ClientCache::new(store.clone(), Client::new(), &server.base_url()));

        let resolving = tokio::spawn({
            let cache = cache.clone();
            async move { cache.resolve("T1").await }
        });

        store.reading.notified().await;
        store.set(&TeamCredential::new("T1", "xoxb-new")).await.unwrap();
        cache.invalidate("T1").await;
        store.release.notify_one();

        let client = resolving.await.unwrap().unwrap().expect("client");
        client.post_message("C1", "hello", None).await.unwrap();
        with_new_token.assert_calls(1);

        let cached = cache.resolve("T1").await.unwrap().expect("client");
        assert!(Arc::ptr_eq(&client, &cached));
    }
}
