pub mod dynamodb_client;
mod credential_store;
mod credential_store_dynamodb;
mod credential_store_file;
mod team_credential;

pub use credential_store::{CredentialStore, MemoryCredentialStore};
pub use credential_store_dynamodb::DynamoDbCredentialStore;
pub use credential_store_file::FileCredentialStore;
pub use team_credential::TeamCredential;
