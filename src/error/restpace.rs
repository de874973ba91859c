use reqwest::StatusCode;
use reqwest::header::InvalidHeaderValue;
use thiserror::Error as ThisError;

use super::IsRetryable;
use super::api::{ApiError, ApiErrorKind};

#[derive(Debug, ThisError)]
pub enum RestpaceError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RestpaceError {
    /// Status of the failed call, when the failure has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RestpaceError::Api(err) => Some(err.status),
            RestpaceError::Transport(err) => err.status(),
            _ => None,
        }
    }

    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            RestpaceError::Api(err) => Some(err),
            _ => None,
        }
    }
}

impl IsRetryable for RestpaceError {
    fn is_retryable(&self) -> bool {
        match self {
            RestpaceError::Api(err) => {
                err.kind == ApiErrorKind::Status && err.status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => false,
        }
    }
}
