//! Error types for the `domain` layer.
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use review_ai::Error as ReviewAiError;
use review_auth::error::{
    Error as ReviewAuthError, ErrorKind as ReviewAuthErrorKind, HttpErrorKind, OAuthErrorKind,
};
use std::error::Error as StdError;
use std::fmt;

/// Top-level domain error type.
/// Errors in the domain layer form a tree: `domain::error::Error` is the root,
/// holding an `error_kind` that says which layer or collaborator failed and how.
/// `source` keeps the original error. Lower layers (`entity_api`, `review_auth`,
/// `review_ai`) are translated here so that job entry points only ever see
/// domain errors.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
}

#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
    /// A required setting (API key, encryption key, URL) is missing or unusable.
    Config,
    /// Caller input or a webhook payload was rejected.
    Validation(String),
    Other(String),
}

/// Entity errors translated up from `entity_api`.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    Invalid,
    DbTransaction,
    Other(String),
}

/// Failures of an external provider call.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    Network,
    Timeout,
    /// The review provider rejected the access token (HTTP 401/403, revoked grant).
    Unauthorized,
    /// The reply generator failed or its output was rejected.
    Generation,
    Other(String),
}

impl Error {
    pub fn internal(kind: InternalErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::Internal(kind),
        }
    }

    pub fn external(kind: ExternalErrorKind) -> Self {
        Error {
            source: None,
            error_kind: DomainErrorKind::External(kind),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::internal(InternalErrorKind::Validation(message.into()))
    }

    pub fn not_found() -> Self {
        Self::internal(InternalErrorKind::Entity(EntityErrorKind::NotFound))
    }

    pub fn config(message: &str) -> Self {
        Error {
            source: Some(message.to_string().into()),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Config),
        }
    }

    pub fn with_source(mut self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_unauthorized(&self) -> bool {
        self.error_kind == DomainErrorKind::External(ExternalErrorKind::Unauthorized)
    }

    pub fn is_not_found(&self) -> bool {
        self.error_kind
            == DomainErrorKind::Internal(InternalErrorKind::Entity(EntityErrorKind::NotFound))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match &self.error_kind {
            DomainErrorKind::Internal(kind) => format!("internal error ({kind:?})"),
            DomainErrorKind::External(kind) => format!("external error ({kind:?})"),
        };
        match &self.source {
            Some(source) => write!(f, "{kind}: {source}"),
            None => write!(f, "{kind}"),
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

// This is where we translate errors from the `entity_api` layer to the `domain` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let entity_error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => EntityErrorKind::NotFound,
            EntityApiErrorKind::ValidationError => EntityErrorKind::Invalid,
            EntityApiErrorKind::SystemError | EntityApiErrorKind::RecordNotUpdated => {
                EntityErrorKind::DbTransaction
            }
            EntityApiErrorKind::Other => EntityErrorKind::Other("EntityErrorKind".to_string()),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(entity_error_kind)),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        // Errors building the client happen before any network call is made.
        let error_kind = if err.is_builder() {
            DomainErrorKind::Internal(InternalErrorKind::Other(
                "Failed to build reqwest client".to_string(),
            ))
        } else if err.is_timeout() {
            DomainErrorKind::External(ExternalErrorKind::Timeout)
        } else {
            DomainErrorKind::External(ExternalErrorKind::Network)
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
                error_kind: DomainErrorKind::External(ExternalErrorKind::Network),
            },
        }
    }
}

impl From<ReviewAuthError> for Error {
    fn from(err: ReviewAuthError) -> Self {
        let error_kind = match &err.error_kind {
            ReviewAuthErrorKind::Http(HttpErrorKind::Timeout) => {
                DomainErrorKind::External(ExternalErrorKind::Timeout)
            }
            ReviewAuthErrorKind::Http(HttpErrorKind::BuilderFailed) => {
                DomainErrorKind::Internal(InternalErrorKind::Config)
            }
            ReviewAuthErrorKind::Http(_) => DomainErrorKind::External(ExternalErrorKind::Network),
            ReviewAuthErrorKind::OAuth(OAuthErrorKind::InvalidGrant) => {
                DomainErrorKind::External(ExternalErrorKind::Unauthorized)
            }
            ReviewAuthErrorKind::OAuth(kind) => {
                DomainErrorKind::External(ExternalErrorKind::Other(format!("OAuth {kind:?}")))
            }
            ReviewAuthErrorKind::Webhook(kind) => DomainErrorKind::Internal(
                InternalErrorKind::Validation(format!("webhook {kind:?}")),
            ),
            ReviewAuthErrorKind::Storage(_) | ReviewAuthErrorKind::Token(_) => {
                DomainErrorKind::Internal(InternalErrorKind::Other(err.to_string()))
            }
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<ReviewAiError> for Error {
    fn from(err: ReviewAiError) -> Self {
        let error_kind = match &err {
            ReviewAiError::Timeout(_) => DomainErrorKind::External(ExternalErrorKind::Timeout),
            ReviewAiError::Network(_) => DomainErrorKind::External(ExternalErrorKind::Network),
            ReviewAiError::Configuration(message) => {
                DomainErrorKind::Internal(InternalErrorKind::Validation(message.clone()))
            }
            _ => DomainErrorKind::External(ExternalErrorKind::Generation),
        };
        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Validation(
                "malformed JSON".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use review_auth::error::{oauth_error, webhook_error, WebhookErrorKind};

    #[test]
    fn entity_not_found_is_translated() {
        let err: Error = EntityApiError {
            source: None,
            error_kind: EntityApiErrorKind::RecordNotFound,
        }
        .into();
        assert!(err.is_not_found());
    }

    #[test]
    fn revoked_grant_is_unauthorized() {
        let err: Error = oauth_error(OAuthErrorKind::InvalidGrant, "revoked").into();
        assert!(err.is_unauthorized());

        let err: Error = oauth_error(OAuthErrorKind::TokenRefreshFailed, "500").into();
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn generator_auth_failure_is_not_review_source_unauthorized() {
        let err: Error = ReviewAiError::Authentication("bad key".to_string()).into();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::Generation)
        );
        assert!(!err.is_unauthorized());

        let err: Error = ReviewAiError::Moderation("flagged".to_string()).into();
        assert_eq!(
            err.error_kind,
            DomainErrorKind::External(ExternalErrorKind::Generation)
        );
    }

    #[test]
    fn webhook_errors_are_validation_errors() {
        let err: Error = webhook_error(WebhookErrorKind::TimestampExpired, "stale").into();
        assert!(matches!(
            err.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Validation(_))
        ));
    }

    #[test]
    fn display_includes_source_message() {
        let err = Error::external(ExternalErrorKind::Unauthorized)
            .with_source("HTTP 401 from review provider");
        assert_eq!(
            err.to_string(),
            "external error (Unauthorized): HTTP 401 from review provider"
        );
    }
}
