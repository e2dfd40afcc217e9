//! Unified error handling for the client runtime
//!
//! One taxonomy for everything the runtime can report: transport-level
//! failures resolved centrally by the request pipeline, pass-through API
//! errors owned by the caller, and local configuration/storage problems.

use thiserror::Error;

pub type InstikitResult<T> = Result<T, InstikitError>;

/// Main error type for the InstiKit client runtime
#[derive(Error, Debug)]
pub enum InstikitError {
    /// The server rejected the credential on an authenticated request.
    /// Handled centrally: the session is torn down exactly once and the
    /// failed call surfaces this error without being retried.
    #[error("session expired")]
    AuthExpired,

    /// The retry budget for a throttled request is exhausted.
    #[error("rate limited by the server, try again shortly")]
    RateLimited { retry_after_ms: Option<u64> },

    /// A 4xx the caller handles locally, including envelope rejections.
    #[error("request rejected ({status}): {message}")]
    Validation { status: u16, message: String },

    /// A 5xx passed through untouched, never retried automatically.
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// No response was received at all; distinguishable from a server
    /// rejection so callers can tell "offline" from "rejected".
    #[error("network unavailable: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("configuration error: {message}")]
    Config { message: String },

    #[error("credential storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("session error: {message}")]
    Session { message: String },

    #[error("realtime channel error: {message}")]
    Realtime { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl InstikitError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a session error
    pub fn session<S: Into<String>>(message: S) -> Self {
        Self::Session {
            message: message.into(),
        }
    }

    /// Create a realtime error
    pub fn realtime<S: Into<String>>(message: S) -> Self {
        Self::Realtime {
            message: message.into(),
        }
    }

    /// Create a network error with its transport source
    pub fn network<S: Into<String>>(
        message: S,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source,
        }
    }

    /// Whether retrying the same operation could plausibly succeed.
    /// AuthExpired is deliberately not recoverable: the session is gone.
    pub fn is_recoverable(&self) -> bool {
        match self {
            InstikitError::Network { .. } => true,
            InstikitError::RateLimited { .. } => true,
            InstikitError::Server { .. } => true,
            InstikitError::AuthExpired => false,
            InstikitError::Validation { .. } => false,
            InstikitError::Config { .. } => false,
            _ => false,
        }
    }

    /// Server-suggested wait before retrying, when one was given.
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            InstikitError::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_recoverable() {
        assert!(InstikitError::network("connection refused", None).is_recoverable());
        assert!(InstikitError::RateLimited {
            retry_after_ms: Some(5000)
        }
        .is_recoverable());
    }

    #[test]
    fn auth_expiry_is_fatal() {
        assert!(!InstikitError::AuthExpired.is_recoverable());
        assert!(!InstikitError::Validation {
            status: 422,
            message: "bad field".into()
        }
        .is_recoverable());
    }

    #[test]
    fn rate_limit_carries_retry_hint() {
        let err = InstikitError::RateLimited {
            retry_after_ms: Some(5000),
        };
        assert_eq!(err.retry_delay_ms(), Some(5000));
        assert_eq!(InstikitError::AuthExpired.retry_delay_ms(), None);
    }
}
