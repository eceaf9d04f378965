//! Recording fakes for job-level tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use entity::plan::PlanState;
use review_ai::traits::reply::Generator;
use review_ai::types::reply::Request;
use review_auth::oauth::token::Tokens;
use secrecy::{ExposeSecret, SecretString};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::account::Account;
use crate::error::{Error, ExternalErrorKind};
use crate::gateway::{Email, FetchedReview, Location, Mailer, ReviewSource};

pub fn tokens_expiring(expires_at: DateTime<Utc>) -> Tokens {
    Tokens {
        access_token: SecretString::new("access".to_string()),
        refresh_token: Some(SecretString::new("refresh".to_string())),
        expires_at: Some(expires_at),
        token_type: "Bearer".to_string(),
        scopes: vec![],
    }
}

/// Active account with location `loc-1` and the given credentials.
pub fn account_with_tokens(id: &str, tokens: Tokens) -> Account {
    let mut account = Account::new(id, format!("owner@{id}.example"));
    account.plan = PlanState::Active;
    account.tokens = Some(tokens);
    account.location_id = Some("loc-1".to_string());
    account
}

pub fn active_account(id: &str) -> Account {
    account_with_tokens(id, tokens_expiring(Utc::now() + ChronoDuration::hours(1)))
}

fn unauthorized() -> Error {
    Error::external(ExternalErrorKind::Unauthorized).with_source("401 from fake source")
}

#[derive(Default)]
pub struct FakeSource {
    reviews: Vec<FetchedReview>,
    failing_posts: HashSet<String>,
    fail_refresh: bool,
    /// Only refreshed access tokens are accepted.
    reject_stale_tokens: bool,
    /// Every fetch and post is rejected as unauthorized.
    always_unauthorized: bool,
    refresh_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    posts: Mutex<Vec<(String, String)>>,
    post_attempts: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reviews(mut self, reviews: Vec<FetchedReview>) -> Self {
        self.reviews = reviews;
        self
    }

    pub fn failing_post_for(mut self, review_id: &str) -> Self {
        self.failing_posts.insert(review_id.to_string());
        self
    }

    pub fn failing_refresh(mut self) -> Self {
        self.fail_refresh = true;
        self
    }

    pub fn rejecting_stale_tokens(mut self) -> Self {
        self.reject_stale_tokens = true;
        self
    }

    pub fn always_unauthorized(mut self) -> Self {
        self.always_unauthorized = true;
        self
    }

    pub fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn post_attempts(&self) -> usize {
        self.post_attempts.load(Ordering::SeqCst)
    }

    /// Successful posts as `(review_id, text)`.
    pub fn posts(&self) -> Vec<(String, String)> {
        self.posts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn check_token(&self, access_token: &SecretString) -> Result<(), Error> {
        let stale = !access_token.expose_secret().starts_with("refreshed-");
        if self.always_unauthorized || (self.reject_stale_tokens && stale) {
            Err(unauthorized())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ReviewSource for FakeSource {
    fn authorization_url(&self, state: &str) -> String {
        format!("https://accounts.example/auth?scope=business.manage&state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<Tokens, Error> {
        let mut tokens = tokens_expiring(Utc::now() + ChronoDuration::hours(1));
        tokens.access_token = SecretString::new(format!("exchanged-{code}"));
        Ok(tokens)
    }

    async fn refresh_token(&self, _refresh_token: &SecretString) -> Result<Tokens, Error> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_refresh {
            return Err(unauthorized());
        }
        Ok(Tokens {
            access_token: SecretString::new(format!("refreshed-{n}")),
            refresh_token: None,
            expires_at: Some(Utc::now() + ChronoDuration::hours(1)),
            token_type: "Bearer".to_string(),
            scopes: vec![],
        })
    }

    async fn fetch_reviews(
        &self,
        access_token: &SecretString,
        _location: Location<'_>,
    ) -> Result<Vec<FetchedReview>, Error> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_token(access_token)?;
        Ok(self.reviews.clone())
    }

    async fn post_reply(
        &self,
        access_token: &SecretString,
        _location: Location<'_>,
        review_id: &str,
        text: &str,
    ) -> Result<(), Error> {
        self.post_attempts.fetch_add(1, Ordering::SeqCst);
        self.check_token(access_token)?;
        if self.failing_posts.contains(review_id) {
            return Err(Error::external(ExternalErrorKind::Other(
                "503 from fake source".to_string(),
            )));
        }
        if let Ok(mut posts) = self.posts.lock() {
            posts.push((review_id.to_string(), text.to_string()));
        }
        Ok(())
    }
}

pub struct FakeGenerator {
    failing_texts: HashSet<String>,
    sentiment: f64,
    sentiment_delay: Option<Duration>,
    reply_calls: AtomicUsize,
    sentiment_calls: AtomicUsize,
}

impl Default for FakeGenerator {
    fn default() -> Self {
        Self {
            failing_texts: HashSet::new(),
            sentiment: 0.5,
            sentiment_delay: None,
            reply_calls: AtomicUsize::new(0),
            sentiment_calls: AtomicUsize::new(0),
        }
    }
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply generation fails for reviews with exactly this text.
    pub fn failing_on(mut self, review_text: &str) -> Self {
        self.failing_texts.insert(review_text.to_string());
        self
    }

    pub fn with_sentiment(mut self, score: f64) -> Self {
        self.sentiment = score;
        self
    }

    pub fn with_sentiment_delay(mut self, delay: Duration) -> Self {
        self.sentiment_delay = Some(delay);
        self
    }

    pub fn reply_calls(&self) -> usize {
        self.reply_calls.load(Ordering::SeqCst)
    }

    pub fn sentiment_calls(&self) -> usize {
        self.sentiment_calls.load(Ordering::SeqCst)
    }

    pub fn reply_for(review_text: &str) -> String {
        format!("Thanks for your review: {review_text}")
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate_reply(&self, request: &Request) -> Result<String, review_ai::Error> {
        self.reply_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_texts.contains(&request.review_text) {
            return Err(review_ai::Error::Moderation("flagged".to_string()));
        }
        Ok(Self::reply_for(&request.review_text))
    }

    async fn score_sentiment(&self, _text: &str) -> f64 {
        self.sentiment_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.sentiment_delay {
            tokio::time::sleep(delay).await;
        }
        self.sentiment
    }

    fn provider_id(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
pub struct FakeMailer {
    failing_recipients: HashSet<String>,
    sent: Mutex<Vec<Email>>,
}

impl FakeMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, to: &str) -> Self {
        self.failing_recipients.insert(to.to_string());
        self
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn send(&self, email: &Email) -> Result<(), Error> {
        if self.failing_recipients.contains(&email.to) {
            return Err(Error::external(ExternalErrorKind::Network));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(email.clone());
        }
        Ok(())
    }
}

/// Store whose every call fails, for invocation-level failure paths.
pub struct BrokenStore;

fn broken() -> Error {
    Error::internal(crate::error::InternalErrorKind::Entity(
        crate::error::EntityErrorKind::DbTransaction,
    ))
    .with_source("connection refused")
}

#[async_trait]
impl crate::store::AccountStore for BrokenStore {
    async fn find_account(&self, _id: &str) -> Result<Option<Account>, Error> {
        Err(broken())
    }

    async fn find_eligible(&self) -> Result<Vec<Account>, Error> {
        Err(broken())
    }

    async fn find_by_plan(&self, _plan: PlanState) -> Result<Vec<Account>, Error> {
        Err(broken())
    }

    async fn find_by_subscription(&self, _id: &str) -> Result<Option<Account>, Error> {
        Err(broken())
    }

    async fn create_if_absent(&self, _id: &str, _email: &str) -> Result<Account, Error> {
        Err(broken())
    }

    async fn store_tokens(&self, _id: &str, _tokens: &Tokens) -> Result<(), Error> {
        Err(broken())
    }

    async fn set_plan(
        &self,
        _id: &str,
        _plan: PlanState,
        _subscription_id: Option<String>,
    ) -> Result<(), Error> {
        Err(broken())
    }

    async fn set_tone(
        &self,
        _id: &str,
        _tone: &review_ai::types::tone::Config,
    ) -> Result<(), Error> {
        Err(broken())
    }

    async fn set_location(
        &self,
        _id: &str,
        _account_ref: Option<String>,
        _location_id: String,
    ) -> Result<(), Error> {
        Err(broken())
    }
}

#[async_trait]
impl crate::store::ReviewStore for BrokenStore {
    async fn find_review(
        &self,
        _business_id: &str,
        _review_id: &str,
    ) -> Result<Option<crate::review::Review>, Error> {
        Err(broken())
    }

    async fn insert_if_absent(&self, _review: crate::review::Review) -> Result<bool, Error> {
        Err(broken())
    }

    async fn find_pending(&self) -> Result<Vec<crate::review::Review>, Error> {
        Err(broken())
    }

    async fn find_by_business(
        &self,
        _business_id: &str,
    ) -> Result<Vec<crate::review::Review>, Error> {
        Err(broken())
    }

    async fn find_created_between(
        &self,
        _business_id: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<crate::review::Review>, Error> {
        Err(broken())
    }

    async fn update_review(
        &self,
        _business_id: &str,
        _review_id: &str,
        _patch: crate::review::ReviewPatch,
    ) -> Result<crate::review::Review, Error> {
        Err(broken())
    }
}
