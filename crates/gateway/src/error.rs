//! Error types for the gateway layer

use thiserror::Error;

/// Failures surfaced over the WebSocket itself: authentication failures
/// close the connection before registration, the rest are delivered to the
/// offending sender as `error` events.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("rate limit exceeded")]
    RateLimitExceeded,
}

pub type GatewayResult<T> = Result<T, GatewayError>;

impl From<amicale_auth::AuthError> for GatewayError {
    fn from(error: amicale_auth::AuthError) -> Self {
        GatewayError::AuthenticationFailed(error.to_string())
    }
}
