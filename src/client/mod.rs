mod client;
mod endpoint;
mod query;
mod retry;

pub use client::HttpJsonClient;
pub use query::{Query, QueryValue};
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, RetryBackoff, RetryPolicy, backoff_delay, parse_retry_after,
    retry_after_from_headers,
};

/// Upper bound on response bytes echoed into logs.
pub const BODY_PREVIEW_CHARS: usize = 300;
