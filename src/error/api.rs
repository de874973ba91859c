use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error as ThisError;
use url::Url;

/// What went wrong with a request that reached (or timed out against) the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// No response within the configured deadline. Always carries `408`.
    Timeout,
    /// Every attempt was answered with `429`.
    RetriesExhausted,
    /// The server answered with a non-2xx status.
    Status,
    /// A 2xx response whose body was not the expected JSON.
    Decode,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ApiErrorKind::Timeout => "request timed out",
            ApiErrorKind::RetriesExhausted => "rate limited, retries exhausted",
            ApiErrorKind::Status => "upstream error",
            ApiErrorKind::Decode => "unexpected response body",
        };
        f.write_str(label)
    }
}

/// Uniform error shape for failed calls: callers branch on `status`.
#[derive(Debug, Clone, ThisError)]
#[error("{kind} with status {status} for {url}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: StatusCode,
    pub url: Url,
    pub body_text: Option<String>,
    pub retry_after: Option<Duration>,
}

impl ApiError {
    pub fn timeout(url: Url) -> Self {
        Self {
            kind: ApiErrorKind::Timeout,
            status: StatusCode::REQUEST_TIMEOUT,
            url,
            body_text: None,
            retry_after: None,
        }
    }

    pub fn status(
        status: StatusCode,
        url: Url,
        body_text: Option<String>,
        retry_after: Option<Duration>,
    ) -> Self {
        Self {
            kind: ApiErrorKind::Status,
            status,
            url,
            body_text,
            retry_after,
        }
    }

    pub fn decode(status: StatusCode, url: Url, body_text: String) -> Self {
        Self {
            kind: ApiErrorKind::Decode,
            status,
            url,
            body_text: Some(body_text),
            retry_after: None,
        }
    }

    /// Turns the last `429` of a call into the terminal exhaustion error.
    pub(crate) fn into_exhausted(self) -> Self {
        Self {
            kind: ApiErrorKind::RetriesExhausted,
            status: StatusCode::TOO_MANY_REQUESTS,
            ..self
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ApiErrorKind::Timeout
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == StatusCode::TOO_MANY_REQUESTS
    }

    pub fn is_auth(&self) -> bool {
        matches!(
            self.status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        )
    }

    /// Short text suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        if self.is_timeout() {
            return "Request timed out, try again.".to_string();
        }
        if self.is_auth() {
            return "The API rejected the credentials; check the API token.".to_string();
        }
        if self.is_rate_limited() {
            return match self.retry_after {
                Some(wait) => format!(
                    "Rate limit reached, try again in {}s.",
                    wait.as_secs().max(1)
                ),
                None => "Rate limit reached, try again shortly.".to_string(),
            };
        }
        match self.body_text.as_deref().map(str::trim) {
            Some(body) if !body.is_empty() => format!("Request failed ({}): {body}", self.status),
            _ => format!("Request failed ({}).", self.status),
        }
    }
}
