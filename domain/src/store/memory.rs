use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::plan::PlanState;
use review_ai::types::tone;
use review_auth::oauth::token::Tokens;
use tokio::sync::Mutex;

use super::{AccountStore, ReviewStore};
use crate::account::Account;
use crate::error::{EntityErrorKind, Error, InternalErrorKind};
use crate::review::{Review, ReviewPatch};

/// In-process store holding plaintext credentials.
#[derive(Debug, Default)]
pub struct MemoryStore {
    accounts: Mutex<BTreeMap<String, Account>>,
    reviews: Mutex<BTreeMap<(String, String), Review>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an account as-is.
    pub async fn put_account(&self, account: Account) {
        self.accounts
            .lock()
            .await
            .insert(account.id.clone(), account);
    }

    pub async fn all_reviews(&self) -> Vec<Review> {
        self.reviews.lock().await.values().cloned().collect()
    }

    async fn modify_account<F>(&self, id: &str, modify: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Account) + Send,
    {
        let mut accounts = self.accounts.lock().await;
        let account = accounts.get_mut(id).ok_or_else(Error::not_found)?;
        modify(account);
        Ok(())
    }
}

fn newest_first(mut reviews: Vec<Review>) -> Vec<Review> {
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    reviews
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn find_account(&self, id: &str) -> Result<Option<Account>, Error> {
        Ok(self.accounts.lock().await.get(id).cloned())
    }

    async fn find_eligible(&self) -> Result<Vec<Account>, Error> {
        Ok(self
            .accounts
            .lock()
            .await
            .values()
            .filter(|account| account.is_eligible())
            .cloned()
            .collect())
    }

    async fn find_by_plan(&self, plan: PlanState) -> Result<Vec<Account>, Error> {
        Ok(self
            .accounts
            .lock()
            .await
            .values()
            .filter(|account| account.plan == plan)
            .cloned()
            .collect())
    }

    async fn find_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Account>, Error> {
        Ok(self
            .accounts
            .lock()
            .await
            .values()
            .find(|account| account.subscription_id.as_deref() == Some(subscription_id))
            .cloned())
    }

    async fn create_if_absent(&self, id: &str, email: &str) -> Result<Account, Error> {
        Ok(self
            .accounts
            .lock()
            .await
            .entry(id.to_string())
            .or_insert_with(|| Account::new(id, email))
            .clone())
    }

    async fn store_tokens(&self, id: &str, tokens: &Tokens) -> Result<(), Error> {
        let tokens = tokens.clone();
        self.modify_account(id, move |account| account.tokens = Some(tokens))
            .await
    }

    async fn set_plan(
        &self,
        id: &str,
        plan: PlanState,
        subscription_id: Option<String>,
    ) -> Result<(), Error> {
        self.modify_account(id, move |account| {
            account.plan = plan;
            if subscription_id.is_some() {
                account.subscription_id = subscription_id;
            }
        })
        .await
    }

    async fn set_tone(&self, id: &str, tone: &tone::Config) -> Result<(), Error> {
        let tone = tone.clone();
        self.modify_account(id, move |account| account.tone = tone)
            .await
    }

    async fn set_location(
        &self,
        id: &str,
        account_ref: Option<String>,
        location_id: String,
    ) -> Result<(), Error> {
        self.modify_account(id, move |account| {
            account.account_ref = account_ref;
            account.location_id = Some(location_id);
        })
        .await
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn find_review(
        &self,
        business_id: &str,
        review_id: &str,
    ) -> Result<Option<Review>, Error> {
        Ok(self
            .reviews
            .lock()
            .await
            .get(&(business_id.to_string(), review_id.to_string()))
            .cloned())
    }

    async fn insert_if_absent(&self, review: Review) -> Result<bool, Error> {
        let mut reviews = self.reviews.lock().await;
        let key = (review.business_id.clone(), review.review_id.clone());
        if reviews.contains_key(&key) {
            return Ok(false);
        }
        reviews.insert(key, review);
        Ok(true)
    }

    async fn find_pending(&self) -> Result<Vec<Review>, Error> {
        Ok(self
            .reviews
            .lock()
            .await
            .values()
            .filter(|review| !review.posted)
            .cloned()
            .collect())
    }

    async fn find_by_business(&self, business_id: &str) -> Result<Vec<Review>, Error> {
        let reviews = self
            .reviews
            .lock()
            .await
            .values()
            .filter(|review| review.business_id == business_id)
            .cloned()
            .collect();
        Ok(newest_first(reviews))
    }

    async fn find_created_between(
        &self,
        business_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Review>, Error> {
        let reviews = self
            .reviews
            .lock()
            .await
            .values()
            .filter(|review| {
                review.business_id == business_id
                    && review.created_at >= from
                    && review.created_at < to
            })
            .cloned()
            .collect();
        Ok(newest_first(reviews))
    }

    async fn update_review(
        &self,
        business_id: &str,
        review_id: &str,
        patch: ReviewPatch,
    ) -> Result<Review, Error> {
        let mut reviews = self.reviews.lock().await;
        let review = reviews
            .get_mut(&(business_id.to_string(), review_id.to_string()))
            .ok_or_else(Error::not_found)?;

        if review.posted && !patch.allowed_on_posted() {
            return Err(Error::internal(InternalErrorKind::Entity(
                EntityErrorKind::Invalid,
            ))
            .with_source(format!("review {review_id} is already posted")));
        }

        patch.apply(review);
        Ok(review.clone())
    }
}
