use aws_sdk_dynamodb::{operation::{get_item::GetItemError, put_item::PutItemError}, error::SdkError};
use aws_sdk_secretsmanager::operation::get_secret_value::GetSecretValueError;
use axum::{http::StatusCode, response::{IntoResponse, Response}};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to decode base64, `{0:?}`")]
    Base64DecodeError(#[from] base64::DecodeError),

    #[error("IO error: `{0:?}`")]
    IOError(#[from] std::io::Error),

    #[error("Failed to parse json: `{0}`")]
    JsonError(#[from] serde_json::Error),

    #[error("Reqwest error: `{0}`")]
    ReqwestError(#[from] reqwest::Error),

    #[error("Slack error: `{0:?}`")]
    SlackError(String),

    #[error("Failed to send request to paste API, error: `{0:?}`")]
    PasteApiError(String),

    #[error("Request verification failed: {0}")]
    Verification(String),

    #[error("No credential stored for team `{0}`")]
    MissingCredential(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Pending action `{0}` not found or expired")]
    PendingActionNotFound(String),

    #[error("Installation failed: {0}")]
    Installation(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to get item from DynamoDB: `{0:?}`")]
    DynamoDBGetItemError(#[from] SdkError<GetItemError>),

    #[error("Failed to put item to DynamoDB: `{0:?}`")]
    DynamoDBPutItemError(#[from] SdkError<PutItemError>),

    #[error("Failed to get secret value: `{0:?}`")]
    GetSecretValueError(#[from] SdkError<GetSecretValueError>),

    #[error("Failed to encrypt/decrypt: `{0:?}`")]
    Chacha20poly1305Error(#[from] chacha20poly1305::Error),

    #[error("Unexpected error: `{0:?}`")]
    UnexpectedError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Verification(_) => StatusCode::UNAUTHORIZED,
            AppError::InvalidPayload(_) | AppError::JsonError(_) => StatusCode::BAD_REQUEST,
            AppError::PendingActionNotFound(_) => StatusCode::GONE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status_code(), self.to_string()).into_response()
    }
}
