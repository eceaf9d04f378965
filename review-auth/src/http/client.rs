//! HTTP client builder with bearer auth, timeout and retry middleware.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest_middleware::ClientBuilder;
use reqwest_retry::RetryTransientMiddleware;
use secrecy::{ExposeSecret, SecretString};

use super::BackoffPolicy;
use crate::error::{Error, ErrorKind, HttpErrorKind};

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Upper bound for a single request, including reading the body.
    pub timeout: Duration,
    /// Retries for transient failures (connect errors, 5xx, 429).
    pub max_retries: u32,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            user_agent: format!("replyflow/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// HTTP client with retry middleware.
pub type AuthenticatedClient = reqwest_middleware::ClientWithMiddleware;

pub struct AuthenticatedClientBuilder {
    config: HttpClientConfig,
    bearer_token: Option<SecretString>,
}

impl AuthenticatedClientBuilder {
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
            bearer_token: None,
        }
    }

    /// Sends `Authorization: Bearer <token>` on every request.
    pub fn with_bearer_token(mut self, token: SecretString) -> Self {
        self.bearer_token = Some(token);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.config.user_agent = user_agent;
        self
    }

    pub fn build(self) -> Result<AuthenticatedClient, Error> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .map_err(|e| Error {
                    source: Some(Box::new(e)),
                    error_kind: ErrorKind::Http(HttpErrorKind::BuilderFailed),
                })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .timeout(self.config.timeout)
            .user_agent(self.config.user_agent)
            .default_headers(headers)
            .build()?;

        let retry_policy = BackoffPolicy::new(self.config.max_retries);
        Ok(ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build())
    }
}

impl Default for AuthenticatedClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
