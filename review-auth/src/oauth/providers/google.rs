//! Google OAuth provider for the Business Profile API.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{oauth_error, Error, OAuthErrorKind};
use crate::http::AuthenticatedClient;
use crate::oauth::token::{RefreshResult, Tokens};
use crate::oauth::ProviderKind;

/// Scope needed to list reviews and post replies.
pub const BUSINESS_MANAGE_SCOPE: &str = "https://www.googleapis.com/auth/business.manage";

#[derive(Debug, Clone)]
pub struct Config {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    #[serde(default = "bearer")]
    token_type: String,
    #[serde(default)]
    scope: String,
}

fn bearer() -> String {
    "Bearer".to_string()
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Serialize)]
struct TokenExchangeRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    redirect_uri: &'a str,
    grant_type: &'static str,
}

#[derive(Serialize)]
struct TokenRefreshRequest<'a> {
    refresh_token: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

impl From<TokenResponse> for Tokens {
    fn from(response: TokenResponse) -> Self {
        Tokens {
            access_token: SecretString::new(response.access_token),
            refresh_token: response.refresh_token.map(SecretString::new),
            expires_at: response
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            token_type: response.token_type,
            scopes: response
                .scope
                .split_whitespace()
                .map(str::to_string)
                .collect(),
        }
    }
}

pub struct Provider {
    config: Config,
    http_client: AuthenticatedClient,
}

impl Provider {
    pub fn new(config: Config, http_client: AuthenticatedClient) -> Self {
        Self {
            config,
            http_client,
        }
    }

    async fn request_tokens<T: Serialize + ?Sized>(
        &self,
        form: &T,
        failure: OAuthErrorKind,
    ) -> Result<TokenResponse, Error> {
        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return response.json::<TokenResponse>().await.map_err(|e| {
                warn!("Failed to parse Google token response: {e}");
                oauth_error(OAuthErrorKind::InvalidResponse, &e.to_string())
            });
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Google token endpoint returned {status}: {body}");

        match serde_json::from_str::<TokenErrorResponse>(&body) {
            Ok(err) if err.error == "invalid_grant" => Err(oauth_error(
                OAuthErrorKind::InvalidGrant,
                err.error_description.as_deref().unwrap_or("invalid_grant"),
            )),
            _ => Err(oauth_error(failure, &format!("{status}: {body}"))),
        }
    }
}

#[async_trait]
impl crate::oauth::Provider for Provider {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Google
    }

    fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}\
             &access_type=offline&prompt=consent&state={}",
            self.config.auth_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(BUSINESS_MANAGE_SCOPE),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<Tokens, Error> {
        debug!("Exchanging Google authorization code");

        let request = TokenExchangeRequest {
            code,
            client_id: &self.config.client_id,
            client_secret: self.config.client_secret.expose_secret(),
            redirect_uri: &self.config.redirect_uri,
            grant_type: "authorization_code",
        };

        let tokens: Tokens = self
            .request_tokens(&request, OAuthErrorKind::TokenExchangeFailed)
            .await?
            .into();

        info!("Exchanged Google authorization code for tokens");
        Ok(tokens)
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<RefreshResult, Error> {
        debug!("Refreshing Google access token");

        let request = TokenRefreshRequest {
            refresh_token,
            client_id: &self.config.client_id,
            client_secret: self.config.client_secret.expose_secret(),
            grant_type: "refresh_token",
        };

        let tokens: Tokens = self
            .request_tokens(&request, OAuthErrorKind::TokenRefreshFailed)
            .await?
            .into();

        if tokens.refresh_token.is_some() {
            Ok(RefreshResult::with_rotation(tokens))
        } else {
            Ok(RefreshResult::no_rotation(tokens))
        }
    }
}
