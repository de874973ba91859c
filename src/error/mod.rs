mod api;
mod restpace;

pub use api::{ApiError, ApiErrorKind};
pub use restpace::RestpaceError;

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
