use backon::Retryable;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::endpoint::{build_request_url, normalize_base_url};
use super::query::Query;
use super::retry::{RetryPolicy, retry_after_from_headers};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiErrorKind, IsRetryable, RestpaceError};
use crate::limiter::{RateLimiter, is_positive_finite};
use crate::utils::logging::{body_preview, with_pretty_json_debug};

const MIN_TIMEOUT: Duration = Duration::from_millis(1000);
const JSON_MIME: &str = "application/json";

/// Authenticated JSON client with request spacing and bounded 429 retries.
pub struct HttpJsonClient {
    http: reqwest::Client,
    base_url: Url,
    authorization: HeaderValue,
    timeout: Duration,
    rate_limiter: Option<RateLimiter>,
    retry_policy: RetryPolicy,
}

impl HttpJsonClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self, RestpaceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(proxy) = &cfg.proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy.as_str())?);
        }
        Self::with_http_client(cfg, builder.build()?)
    }

    /// Builds a client on top of an existing `reqwest::Client` (shared pools, custom TLS).
    pub fn with_http_client(
        cfg: &ClientConfig,
        http: reqwest::Client,
    ) -> Result<Self, RestpaceError> {
        if cfg.api_token.trim().is_empty() {
            return Err(RestpaceError::Config(
                "api_token must be set and non-empty".to_string(),
            ));
        }

        let base_url = normalize_base_url(&cfg.base_url)?;
        let mut authorization = HeaderValue::from_str(&cfg.authorization_value())?;
        authorization.set_sensitive(true);

        let mut client = Self {
            http,
            base_url,
            authorization,
            timeout: Duration::from_millis(cfg.timeout_ms).max(MIN_TIMEOUT),
            rate_limiter: None,
            retry_policy: RetryPolicy::new(cfg.max_attempts),
        };
        if let Some(per_minute) = cfg.requests_per_minute {
            client.set_rate_limit_per_minute(per_minute);
        }
        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn rate_limiter(&self) -> Option<&RateLimiter> {
        self.rate_limiter.as_ref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Enables request spacing, or changes the quota of the existing limiter.
    /// Ignored unless `per_minute` is a positive finite number.
    pub fn set_rate_limit_per_minute(&mut self, per_minute: f64) {
        if !is_positive_finite(per_minute) {
            return;
        }
        match &self.rate_limiter {
            Some(limiter) => limiter.configure(per_minute),
            None => self.rate_limiter = Some(RateLimiter::new(per_minute)),
        }
    }

    /// Sets the per-attempt deadline. Ignored unless `ms` is a positive finite
    /// number; values under one second are raised to one second.
    pub fn set_timeout_ms(&mut self, ms: f64) {
        if !is_positive_finite(ms) {
            return;
        }
        self.timeout = Duration::from_millis(ms as u64).max(MIN_TIMEOUT);
    }

    pub async fn get_json<T>(&self, path: &str, query: Option<&Query>) -> Result<T, RestpaceError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post_json<T, B>(
        &self,
        path: &str,
        query: Option<&Query>,
        body: Option<&B>,
    ) -> Result<T, RestpaceError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = match body {
            Some(body) => {
                with_pretty_json_debug(body, |pretty_body| {
                    debug!(path, body = %pretty_body, "Prepared request body");
                });
                Some(serde_json::to_vec(body)?)
            }
            None => None,
        };
        self.request(Method::POST, path, query, body).await
    }

    async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: Option<&Query>,
        body: Option<Vec<u8>>,
    ) -> Result<T, RestpaceError>
    where
        T: DeserializeOwned,
    {
        let url = build_request_url(&self.base_url, path, query)?;
        let attempts = AtomicUsize::new(0);

        let op = || {
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            let (method, url, body) = (&method, &url, body.as_deref());
            async move {
                if let Some(limiter) = &self.rate_limiter {
                    limiter.wait_turn().await;
                }
                self.send_once(method, url, body, attempt).await
            }
        };

        let outcome = op
            .retry(self.retry_policy)
            .when(|err: &RestpaceError| err.is_retryable())
            .adjust(|err: &RestpaceError, delay: Option<Duration>| {
                delay.map(|fallback| {
                    err.as_api()
                        .and_then(|api| api.retry_after)
                        .unwrap_or(fallback)
                })
            })
            .notify(|err: &RestpaceError, delay: Duration| {
                warn!(
                    %method,
                    url = %url,
                    status = ?err.status(),
                    delay_ms = delay.as_millis() as u64,
                    "Rate limited, retrying after delay"
                );
            })
            .await;

        outcome.map_err(|err| match err {
            RestpaceError::Api(api)
                if api.kind == ApiErrorKind::Status
                    && api.status == StatusCode::TOO_MANY_REQUESTS =>
            {
                warn!(
                    %method,
                    url = %api.url,
                    attempts = attempts.load(Ordering::Relaxed),
                    "Rate limit retries exhausted"
                );
                RestpaceError::Api(api.into_exhausted())
            }
            other => other,
        })
    }

    async fn send_once<T>(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&[u8]>,
        attempt: usize,
    ) -> Result<T, RestpaceError>
    where
        T: DeserializeOwned,
    {
        debug!(
            %method,
            url = %url,
            attempt,
            max_attempts = self.retry_policy.max_attempts(),
            "Sending request"
        );

        let mut request = self
            .http
            .request(method.clone(), url.clone())
            .timeout(self.timeout)
            .header(AUTHORIZATION, self.authorization.clone())
            .header(ACCEPT, JSON_MIME);
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, JSON_MIME).body(body.to_vec());
        }

        let resp = request
            .send()
            .await
            .map_err(|err| self.transport_error(err, url))?;
        let status = resp.status();

        if !status.is_success() {
            let retry_after = retry_after_from_headers(resp.headers());
            let body_text = resp.text().await.ok();
            debug!(
                %status,
                url = %url,
                retry_after_ms = retry_after.map(|d| d.as_millis() as u64),
                body = %body_preview(body_text.as_deref()),
                "Upstream error response"
            );
            return Err(ApiError::status(status, url.clone(), body_text, retry_after).into());
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|err| self.transport_error(err, url))?;
        decode_json(status, url, &bytes)
    }

    fn transport_error(&self, err: reqwest::Error, url: &Url) -> RestpaceError {
        if err.is_timeout() {
            warn!(
                url = %url,
                timeout_ms = self.timeout.as_millis() as u64,
                "Request timed out"
            );
            return ApiError::timeout(url.clone()).into();
        }
        debug!(url = %url, error = %err, "Transport error");
        RestpaceError::Transport(err)
    }
}

/// Parses a 2xx body. An empty body reads as JSON `null`.
fn decode_json<T>(status: StatusCode, url: &Url, bytes: &[u8]) -> Result<T, RestpaceError>
where
    T: DeserializeOwned,
{
    let parsed = if bytes.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice(b"null")
    } else {
        serde_json::from_slice(bytes)
    };

    parsed.map_err(|err| {
        let raw_body = String::from_utf8_lossy(bytes).into_owned();
        debug!(
            %status,
            url = %url,
            error = %err,
            body = %body_preview(Some(&raw_body)),
            "Response body did not decode"
        );
        ApiError::decode(status, url.clone(), raw_body).into()
    })
}
