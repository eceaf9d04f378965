//! Traits and clients for the outside services the jobs talk to.

use async_trait::async_trait;
use review_auth::oauth::token::Tokens;
use secrecy::SecretString;

use crate::error::Error;

pub mod google_business;
pub mod mailersend;
pub mod openai;

/// A business location at the review provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location<'a> {
    pub account_ref: Option<&'a str>,
    pub location_id: &'a str,
}

impl Location<'_> {
    /// Resource path of the location, relative to the API base URL.
    ///
    /// A `location_id` that already starts with `accounts/` is taken as a full path.
    pub fn resource_path(&self) -> String {
        let location_id = self.location_id.trim_matches('/');
        if location_id.starts_with("accounts/") {
            return location_id.to_string();
        }
        let location = if location_id.starts_with("locations/") {
            location_id.to_string()
        } else {
            format!("locations/{location_id}")
        };
        match self.account_ref.map(|r| r.trim_matches('/')) {
            Some(account_ref) if !account_ref.is_empty() => {
                let account = if account_ref.starts_with("accounts/") {
                    account_ref.to_string()
                } else {
                    format!("accounts/{account_ref}")
                };
                format!("{account}/{location}")
            }
            _ => location,
        }
    }
}

/// A review as listed by the provider, before it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedReview {
    pub resource_name: Option<String>,
    pub review_id: Option<String>,
    pub text: String,
    pub rating: i32,
}

/// The review provider: OAuth plus listing reviews and publishing replies.
#[async_trait]
pub trait ReviewSource: Send + Sync {
    fn authorization_url(&self, state: &str) -> String;

    async fn exchange_code(&self, code: &str) -> Result<Tokens, Error>;

    /// The returned bundle may lack a refresh token; callers keep the old one.
    async fn refresh_token(&self, refresh_token: &SecretString) -> Result<Tokens, Error>;

    async fn fetch_reviews(
        &self,
        access_token: &SecretString,
        location: Location<'_>,
    ) -> Result<Vec<FetchedReview>, Error>;

    async fn post_reply(
        &self,
        access_token: &SecretString,
        location: Location<'_>,
        review_id: &str,
        text: &str,
    ) -> Result<(), Error>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), Error>;
}
