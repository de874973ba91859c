use serde::{Deserialize, Serialize};
use url::Url;

use crate::client::DEFAULT_MAX_ATTEMPTS;

/// Connection settings for one [`HttpJsonClient`](crate::HttpJsonClient).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClientConfig {
    /// API root, e.g. `https://eu1.make.com/api/v2`. `https://` is assumed when no scheme is given.
    /// TOML: `client.base_url`.
    #[serde(default)]
    pub base_url: String,

    /// API token, either bare (`abc123`) or with its scheme (`Bearer abc123`).
    /// TOML: `client.api_token`. Usually supplied via `RESTPACE_CLIENT__API_TOKEN`.
    #[serde(default)]
    pub api_token: String,

    /// Scheme word put in front of a bare token.
    /// TOML: `client.auth_scheme`. Default: `Token`.
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,

    /// Per-attempt deadline in milliseconds, never below 1000.
    /// TOML: `client.timeout_ms`. Default: `30000`.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Optional request quota; enables request spacing when set.
    /// TOML: `client.requests_per_minute`.
    #[serde(default)]
    pub requests_per_minute: Option<f64>,

    /// Total attempts per call when the API answers 429.
    /// TOML: `client.max_attempts`. Default: `3`.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Optional outbound HTTP proxy. Example: `http://127.0.0.1:1080`.
    /// TOML: `client.proxy`.
    #[serde(default)]
    pub proxy: Option<Url>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            ..Self::default()
        }
    }

    /// Authorization header value: bare tokens get the configured scheme word.
    pub fn authorization_value(&self) -> String {
        let token = self.api_token.trim();
        if token.contains(char::is_whitespace) {
            return token.to_string();
        }
        let scheme = self.auth_scheme.trim();
        if scheme.is_empty() {
            token.to_string()
        } else {
            format!("{scheme} {token}")
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_token: String::new(),
            auth_scheme: default_auth_scheme(),
            timeout_ms: default_timeout_ms(),
            requests_per_minute: None,
            max_attempts: default_max_attempts(),
            proxy: None,
        }
    }
}

fn default_auth_scheme() -> String {
    "Token".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}
