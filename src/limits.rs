//! Request quotas learned from the API itself.
//!
//! Vendors such as Make.com publish the account's per-minute quota on an
//! account endpoint. The value changes rarely, so it is cached per key for a
//! TTL and pushed into the client before issuing the real requests.

use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use crate::client::HttpJsonClient;
use crate::error::RestpaceError;

/// Where to read the quota: a GET path and a JSON pointer into its response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitProbe {
    /// TOML: `probe.path`. Example: `/organizations/1234`.
    pub path: String,

    /// TOML: `probe.pointer`. Default: `/organization/license/apiLimit`.
    #[serde(default = "default_pointer")]
    pub pointer: String,
}

impl RateLimitProbe {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            pointer: default_pointer(),
        }
    }

    pub fn with_pointer(mut self, pointer: impl Into<String>) -> Self {
        self.pointer = pointer.into();
        self
    }

    /// Fetches the quota in requests per minute.
    pub async fn fetch(&self, client: &HttpJsonClient) -> Result<f64, RestpaceError> {
        let body: Value = client.get_json(&self.path, None).await?;
        quota_at(&body, &self.pointer).ok_or_else(|| {
            RestpaceError::Config(format!(
                "no numeric rate limit at {} in response from {}",
                self.pointer, self.path
            ))
        })
    }
}

fn default_pointer() -> String {
    "/organization/license/apiLimit".to_string()
}

fn quota_at(body: &Value, pointer: &str) -> Option<f64> {
    let value = body.pointer(pointer)?;
    let quota = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    (quota.is_finite() && quota > 0.0).then_some(quota)
}

/// TTL cache of learned quotas, keyed by whatever identifies the account.
#[derive(Clone)]
pub struct LearnedRateLimits {
    cache: Cache<String, f64>,
}

impl LearnedRateLimits {
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Cache::builder().max_capacity(256).time_to_live(ttl).build(),
        }
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.cache.get(key)
    }

    pub fn insert(&self, key: impl Into<String>, per_minute: f64) {
        self.cache.insert(key.into(), per_minute);
    }

    pub fn invalidate(&self, key: &str) {
        self.cache.invalidate(key);
    }

    /// Returns the cached quota for `key`, or runs `fetch` and caches its result.
    /// Failed fetches are not cached.
    pub async fn resolve<F, Fut>(&self, key: &str, fetch: F) -> Result<f64, RestpaceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<f64, RestpaceError>>,
    {
        if let Some(cached) = self.cache.get(key) {
            debug!(key, per_minute = cached, "Using cached rate limit");
            return Ok(cached);
        }

        let per_minute = fetch().await?;
        info!(key, per_minute, "Learned rate limit");
        self.cache.insert(key.to_string(), per_minute);
        Ok(per_minute)
    }

    /// Resolves the quota for `key` through `probe` and applies it to `client`.
    pub async fn apply(
        &self,
        client: &mut HttpJsonClient,
        key: &str,
        probe: &RateLimitProbe,
    ) -> Result<f64, RestpaceError> {
        let per_minute = {
            let client = &*client;
            self.resolve(key, || probe.fetch(client)).await?
        };
        client.set_rate_limit_per_minute(per_minute);
        Ok(per_minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn quota_is_read_at_pointer() {
        let body = json!({"organization": {"license": {"apiLimit": 240}}});
        assert_eq!(quota_at(&body, "/organization/license/apiLimit"), Some(240.0));

        let body = json!({"limits": {"rpm": "60"}});
        assert_eq!(quota_at(&body, "/limits/rpm"), Some(60.0));
    }

    #[test]
    fn missing_or_invalid_quota_is_none() {
        let body = json!({"organization": {"license": {"apiLimit": 0}}});
        assert_eq!(quota_at(&body, "/organization/license/apiLimit"), None);
        assert_eq!(quota_at(&body, "/nope"), None);
        let body = json!({"organization": {"license": {"apiLimit": true}}});
        assert_eq!(quota_at(&body, "/organization/license/apiLimit"), None);
    }

    #[tokio::test]
    async fn resolve_fetches_once_within_ttl() {
        let limits = LearnedRateLimits::new(Duration::from_secs(60));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = limits
                .resolve("org-1", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(120.0)
                })
                .await
                .unwrap();
            assert_eq!(value, 120.0);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let limits = LearnedRateLimits::new(Duration::from_secs(60));
        let err = limits
            .resolve("org-1", || async {
                Err(RestpaceError::Config("down".to_string()))
            })
            .await;
        assert!(err.is_err());
        assert_eq!(limits.get("org-1"), None);

        limits.insert("org-1", 30.0);
        assert_eq!(limits.get("org-1"), Some(30.0));
        limits.invalidate("org-1");
        assert_eq!(limits.get("org-1"), None);
    }
}
