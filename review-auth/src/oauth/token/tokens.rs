//! OAuth token types.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{token_error, Error, TokenErrorKind};

/// OAuth tokens with metadata.
#[derive(Debug, Clone)]
pub struct Tokens {
    /// Access token for API requests.
    pub access_token: SecretString,
    /// Refresh token for obtaining new access tokens.
    pub refresh_token: Option<SecretString>,
    /// When the access token expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Token type (usually "Bearer").
    pub token_type: String,
    /// Granted scopes.
    pub scopes: Vec<String>,
}

impl Tokens {
    /// True once `now` has reached the expiry instant. A bundle without an
    /// expiry never counts as expired.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .map(|expires| expires <= now)
            .unwrap_or(false)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Get the remaining time until expiration.
    pub fn time_until_expiry(&self) -> Option<chrono::Duration> {
        self.expires_at.map(|expires| expires - Utc::now())
    }

    /// Keeps `previous` as the refresh token when this bundle came back without one.
    pub fn or_refresh_token(mut self, previous: Option<SecretString>) -> Self {
        if self.refresh_token.is_none() {
            self.refresh_token = previous;
        }
        self
    }

    pub fn into_plain(self) -> PlainTokens {
        PlainTokens {
            access_token: self.access_token.expose_secret().clone(),
            refresh_token: self
                .refresh_token
                .map(|token| token.expose_secret().clone()),
            expires_at: self.expires_at,
            token_type: self.token_type,
            scopes: self.scopes,
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(&self.clone().into_plain()).map_err(|e| Error {
            source: Some(Box::new(e)),
            error_kind: crate::ErrorKind::Token(TokenErrorKind::Malformed),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, Error> {
        let plain: PlainTokens = serde_json::from_str(json)
            .map_err(|e| token_error(TokenErrorKind::Malformed, &e.to_string()))?;
        Ok(plain.into())
    }
}

/// Serializable form of [`Tokens`], only ever written encrypted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl From<PlainTokens> for Tokens {
    fn from(plain: PlainTokens) -> Self {
        Tokens {
            access_token: SecretString::new(plain.access_token),
            refresh_token: plain.refresh_token.map(SecretString::new),
            expires_at: plain.expires_at,
            token_type: plain.token_type,
            scopes: plain.scopes,
        }
    }
}

/// Result of a token refresh operation.
#[derive(Debug, Clone)]
pub struct RefreshResult {
    /// The new tokens.
    pub tokens: Tokens,
    /// True if the provider issued a new refresh token.
    pub refresh_token_rotated: bool,
}

impl RefreshResult {
    pub fn no_rotation(tokens: Tokens) -> Self {
        Self {
            tokens,
            refresh_token_rotated: false,
        }
    }

    pub fn with_rotation(tokens: Tokens) -> Self {
        Self {
            tokens,
            refresh_token_rotated: true,
        }
    }
}
