//! Rate-limited, retrying JSON client for vendor REST APIs.
//!
//! [`HttpJsonClient`] spaces requests through a [`RateLimiter`], retries `429`
//! responses with `Retry-After` or exponential backoff, and reports every
//! failure as a [`RestpaceError`].

pub mod client;
pub mod config;
pub mod error;
pub mod limiter;
pub mod limits;
pub mod utils;

pub use client::{HttpJsonClient, Query, QueryValue};
pub use config::{ClientConfig, Config};
pub use error::{ApiError, ApiErrorKind, RestpaceError};
pub use limiter::RateLimiter;
pub use limits::{LearnedRateLimits, RateLimitProbe};
