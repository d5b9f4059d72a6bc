use thiserror::Error;

use crate::limiter::RateLimitError;

/// Application-wide error types.
///
/// Rate limit checks themselves never fail; these cover startup and
/// configuration problems that must stop the service rather than let it run
/// with a broken limiter.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid rate limit configuration: {0}")]
    InvalidRateLimit(#[from] RateLimitError),
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
