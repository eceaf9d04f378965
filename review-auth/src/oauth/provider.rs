//! OAuth provider trait and types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::token::{RefreshResult, Tokens};
use crate::error::Error;

/// Known OAuth providers for review platforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Google,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
        }
    }
}

/// An OAuth 2.0 provider granting offline access to a review platform.
#[async_trait]
pub trait Provider: Send + Sync {
    fn provider(&self) -> ProviderKind;

    /// Consent URL for the authorization-code flow. `state` round-trips to the
    /// callback unchanged.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for access and refresh tokens.
    async fn exchange_code(&self, code: &str) -> Result<Tokens, Error>;

    /// Obtain a new access token from a refresh token.
    ///
    /// Providers that do not rotate refresh tokens return a result whose
    /// `tokens.refresh_token` is `None`; callers keep the one they sent.
    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshResult, Error>;
}
