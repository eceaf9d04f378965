//! Narrow persistence interfaces the jobs depend on.
//!
//! `DbStore` persists through `entity_api` and encrypts credentials at rest;
//! `MemoryStore` keeps everything in process.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::plan::PlanState;
use review_ai::types::tone;
use review_auth::oauth::token::Tokens;

use crate::account::Account;
use crate::error::Error;
use crate::review::{Review, ReviewPatch};

mod db;
mod memory;

pub use db::DbStore;
pub use memory::MemoryStore;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_account(&self, id: &str) -> Result<Option<Account>, Error>;

    /// Accounts on the active plan that hold credentials.
    async fn find_eligible(&self) -> Result<Vec<Account>, Error>;

    async fn find_by_plan(&self, plan: PlanState) -> Result<Vec<Account>, Error>;

    async fn find_by_subscription(&self, subscription_id: &str)
        -> Result<Option<Account>, Error>;

    /// Returns the account, creating it on the trial plan if it does not exist.
    async fn create_if_absent(&self, id: &str, email: &str) -> Result<Account, Error>;

    async fn store_tokens(&self, id: &str, tokens: &Tokens) -> Result<(), Error>;

    async fn set_plan(
        &self,
        id: &str,
        plan: PlanState,
        subscription_id: Option<String>,
    ) -> Result<(), Error>;

    async fn set_tone(&self, id: &str, tone: &tone::Config) -> Result<(), Error>;

    async fn set_location(
        &self,
        id: &str,
        account_ref: Option<String>,
        location_id: String,
    ) -> Result<(), Error>;
}

#[async_trait]
pub trait ReviewStore: Send + Sync {
    async fn find_review(&self, business_id: &str, review_id: &str)
        -> Result<Option<Review>, Error>;

    /// Writes `review` unless its key exists. Returns whether a row was written.
    async fn insert_if_absent(&self, review: Review) -> Result<bool, Error>;

    /// Reviews with `posted = false`, across all businesses.
    async fn find_pending(&self) -> Result<Vec<Review>, Error>;

    /// Newest first.
    async fn find_by_business(&self, business_id: &str) -> Result<Vec<Review>, Error>;

    /// Reviews created in `[from, to)`, newest first.
    async fn find_created_between(
        &self,
        business_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Review>, Error>;

    /// Applies `patch`. Posted reviews reject anything but clearing `last_error`.
    async fn update_review(
        &self,
        business_id: &str,
        review_id: &str,
        patch: ReviewPatch,
    ) -> Result<Review, Error>;
}
