//! Error types for reply generation.

use std::fmt;

/// Provider-agnostic error for generation, moderation and sentiment calls.
///
/// Provider implementations map their native failures onto these variants.
#[derive(Debug)]
pub enum Error {
    /// API key rejected or lacking permissions.
    Authentication(String),

    /// Connection failures and transport errors.
    Network(String),

    /// Invalid tone settings or missing provider configuration.
    Configuration(String),

    /// The provider answered but could not produce a usable result.
    Provider(String),

    /// The call exceeded its time bound.
    Timeout(String),

    /// Provider rate limit exceeded.
    RateLimited { retry_after_seconds: u64 },

    /// The provider's response did not match the expected shape.
    Deserialization(String),

    /// A drafted reply was flagged by the moderation check and must not be posted.
    Moderation(String),

    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Authentication(msg) => write!(f, "Authentication failed: {}", msg),
            Error::Network(msg) => write!(f, "Network error: {}", msg),
            Error::Configuration(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Provider(msg) => write!(f, "Provider error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::RateLimited {
                retry_after_seconds,
            } => {
                write!(f, "Rate limited: retry after {}s", retry_after_seconds)
            }
            Error::Deserialization(msg) => write!(f, "Deserialization error: {}", msg),
            Error::Moderation(msg) => write!(f, "Moderation rejected reply: {}", msg),
            Error::Other(err) => write!(f, "Other error: {}", err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
