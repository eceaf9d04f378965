//! Error types for the `review-auth` crate.
//!
//! A root `Error` struct carrying an error kind and an optional source, the same
//! shape as `domain::error`.

use std::error::Error as StdError;
use std::fmt;

#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors in review-auth.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    OAuth(OAuthErrorKind),
    Token(TokenErrorKind),
    Storage(StorageErrorKind),
    Webhook(WebhookErrorKind),
    Http(HttpErrorKind),
}

#[derive(Debug, PartialEq)]
pub enum OAuthErrorKind {
    TokenExchangeFailed,
    TokenRefreshFailed,
    /// The provider rejected the grant (revoked or expired refresh token,
    /// reused authorization code).
    InvalidGrant,
    InvalidResponse,
}

#[derive(Debug, PartialEq)]
pub enum TokenErrorKind {
    MissingRefreshToken,
    Malformed,
}

/// Errors from encrypting or decrypting tokens at rest.
#[derive(Debug, PartialEq)]
pub enum StorageErrorKind {
    EncryptionFailed,
    DecryptionFailed,
}

#[derive(Debug, PartialEq)]
pub enum WebhookErrorKind {
    InvalidSignature,
    MissingSignature,
    TimestampExpired,
    InvalidPayload,
}

#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Timeout,
    Network,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let prefix = match &self.error_kind {
            ErrorKind::OAuth(kind) => format!("OAuth error: {:?}", kind),
            ErrorKind::Token(kind) => format!("Token error: {:?}", kind),
            ErrorKind::Storage(kind) => format!("Storage error: {:?}", kind),
            ErrorKind::Webhook(kind) => format!("Webhook error: {:?}", kind),
            ErrorKind::Http(kind) => format!("HTTP error: {:?}", kind),
        };
        match &self.source {
            Some(source) => write!(f, "{prefix}: {source}"),
            None => write!(f, "{prefix}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_timeout() {
            ErrorKind::Http(HttpErrorKind::Timeout)
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<reqwest_middleware::Error> for Error {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(err) => err.into(),
            reqwest_middleware::Error::Middleware(err) => Error {
                source: Some(err.into()),
                error_kind: ErrorKind::Http(HttpErrorKind::Network),
            },
        }
    }
}

pub fn oauth_error(kind: OAuthErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::OAuth(kind),
    }
}

pub fn token_error(kind: TokenErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Token(kind),
    }
}

pub fn storage_error(kind: StorageErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Storage(kind),
    }
}

pub fn webhook_error(kind: WebhookErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Webhook(kind),
    }
}
