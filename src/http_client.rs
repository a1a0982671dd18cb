use std::time::Duration;

use reqwest::Client;

use crate::errors::AppError;

pub fn build_http_client(timeout: Duration) -> Result<Client, AppError> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(concat!("paste-bot/", env!("CARGO_PKG_VERSION")))
        .build()?;

    Ok(client)
}
