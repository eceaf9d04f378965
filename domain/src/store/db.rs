use async_trait::async_trait;
use chrono::{DateTime, Utc};
use entity::business_accounts;
use entity::plan::PlanState;
use entity_api::{business_account, review};
use entity_api::mutate::IntoUpdateMap;
use log::*;
use review_ai::types::tone;
use review_auth::oauth::token::{encryption::TokenCipher, Tokens};
use sea_orm::DatabaseConnection;

use super::{AccountStore, ReviewStore};
use crate::account::Account;
use crate::error::{EntityErrorKind, Error, InternalErrorKind};
use crate::review::{Review, ReviewPatch};

/// Postgres-backed store. Credential bundles are sealed with `cipher` before
/// they reach the `google_tokens` column.
#[derive(Debug, Clone)]
pub struct DbStore {
    db: DatabaseConnection,
    cipher: TokenCipher,
}

impl DbStore {
    pub fn new(db: DatabaseConnection, cipher: TokenCipher) -> Self {
        Self { db, cipher }
    }

    fn to_account(&self, model: business_accounts::Model) -> Account {
        let tokens = model
            .google_tokens
            .as_deref()
            .and_then(|sealed| match self.cipher.open(sealed) {
                Ok(tokens) => Some(tokens),
                Err(e) => {
                    warn!("Unreadable credentials for business {}: {e}", model.id);
                    None
                }
            });

        let tone = match model.tone {
            Some(json) => serde_json::from_value(json).unwrap_or_else(|e| {
                warn!("Unreadable tone settings for business {}: {e}", model.id);
                tone::Config::default()
            }),
            None => tone::Config::default(),
        };

        Account {
            id: model.id,
            email: model.email,
            plan: model.plan,
            subscription_id: model.subscription_id,
            tokens,
            tone,
            account_ref: model.account_ref,
            location_id: model.location_id,
        }
    }

    fn to_accounts(&self, models: Vec<business_accounts::Model>) -> Vec<Account> {
        models.into_iter().map(|m| self.to_account(m)).collect()
    }
}

#[async_trait]
impl AccountStore for DbStore {
    async fn find_account(&self, id: &str) -> Result<Option<Account>, Error> {
        Ok(business_account::find_by_id(&self.db, id)
            .await?
            .map(|model| self.to_account(model)))
    }

    async fn find_eligible(&self) -> Result<Vec<Account>, Error> {
        let models = business_account::find_eligible(&self.db).await?;
        // Rows whose credentials fail to decrypt drop out here.
        Ok(self
            .to_accounts(models)
            .into_iter()
            .filter(Account::is_eligible)
            .collect())
    }

    async fn find_by_plan(&self, plan: PlanState) -> Result<Vec<Account>, Error> {
        let models = business_account::find_by_plan(&self.db, plan).await?;
        Ok(self.to_accounts(models))
    }

    async fn find_by_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<Account>, Error> {
        Ok(
            business_account::find_by_subscription_id(&self.db, subscription_id)
                .await?
                .map(|model| self.to_account(model)),
        )
    }

    async fn create_if_absent(&self, id: &str, email: &str) -> Result<Account, Error> {
        let model =
            business_account::create_if_absent(&self.db, id.to_string(), email.to_string())
                .await?;
        Ok(self.to_account(model))
    }

    async fn store_tokens(&self, id: &str, tokens: &Tokens) -> Result<(), Error> {
        let sealed = self.cipher.seal(tokens)?;
        business_account::update_tokens(&self.db, id, Some(sealed)).await?;
        Ok(())
    }

    async fn set_plan(
        &self,
        id: &str,
        plan: PlanState,
        subscription_id: Option<String>,
    ) -> Result<(), Error> {
        business_account::update_plan(&self.db, id, plan, subscription_id).await?;
        Ok(())
    }

    async fn set_tone(&self, id: &str, tone: &tone::Config) -> Result<(), Error> {
        business_account::update_tone(&self.db, id, serde_json::to_value(tone)?).await?;
        Ok(())
    }

    async fn set_location(
        &self,
        id: &str,
        account_ref: Option<String>,
        location_id: String,
    ) -> Result<(), Error> {
        business_account::update_location(&self.db, id, account_ref, location_id).await?;
        Ok(())
    }
}

#[async_trait]
impl ReviewStore for DbStore {
    async fn find_review(
        &self,
        business_id: &str,
        review_id: &str,
    ) -> Result<Option<Review>, Error> {
        Ok(review::find(&self.db, business_id, review_id).await?)
    }

    async fn insert_if_absent(&self, review: Review) -> Result<bool, Error> {
        Ok(review::insert_if_absent(&self.db, review).await?)
    }

    async fn find_pending(&self) -> Result<Vec<Review>, Error> {
        Ok(review::find_pending(&self.db).await?)
    }

    async fn find_by_business(&self, business_id: &str) -> Result<Vec<Review>, Error> {
        Ok(review::find_by_business(&self.db, business_id).await?)
    }

    async fn find_created_between(
        &self,
        business_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Review>, Error> {
        Ok(review::find_by_business_created_between(
            &self.db,
            business_id,
            from.fixed_offset(),
            to.fixed_offset(),
        )
        .await?)
    }

    async fn update_review(
        &self,
        business_id: &str,
        review_id: &str,
        patch: ReviewPatch,
    ) -> Result<Review, Error> {
        if !patch.allowed_on_posted() {
            let current = review::find(&self.db, business_id, review_id)
                .await?
                .ok_or_else(Error::not_found)?;
            if current.posted {
                return Err(Error::internal(InternalErrorKind::Entity(
                    EntityErrorKind::Invalid,
                ))
                .with_source(format!("review {review_id} is already posted")));
            }
        }

        Ok(review::update(&self.db, business_id, review_id, patch.into_update_map()).await?)
    }
}

#[cfg(test)]
#[cfg(feature = "mock")]
mod tests {
    use super::*;
    use review_auth::oauth::token::PlainTokens;
    use sea_orm::{DatabaseBackend, MockDatabase};

    const KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn cipher() -> TokenCipher {
        TokenCipher::new(KEY).unwrap()
    }

    fn account_model(google_tokens: Option<String>) -> business_accounts::Model {
        let now = Utc::now();
        business_accounts::Model {
            id: "biz-1".to_string(),
            email: "owner@cafe.example".to_string(),
            plan: PlanState::Active,
            subscription_id: None,
            google_tokens,
            tone: Some(serde_json::json!({ "casualProfessional": 9.0 })),
            account_ref: None,
            location_id: Some("loc-1".to_string()),
            created_at: now.into(),
            updated_at: now.into(),
        }
    }

    fn sealed_tokens() -> String {
        let tokens: Tokens = PlainTokens {
            access_token: "access".to_string(),
            refresh_token: Some("refresh".to_string()),
            expires_at: None,
            token_type: "Bearer".to_string(),
            scopes: vec![],
        }
        .into();
        cipher().seal(&tokens).unwrap()
    }

    #[tokio::test]
    async fn find_account_decrypts_credentials_and_tone() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![account_model(Some(sealed_tokens()))]])
            .into_connection();
        let store = DbStore::new(db, cipher());

        let account = store.find_account("biz-1").await.unwrap().unwrap();

        assert!(account.is_eligible());
        assert_eq!(account.tone.casual_professional, 9.0);
    }

    #[tokio::test]
    async fn undecryptable_credentials_make_account_ineligible() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![account_model(Some("garbage".to_string()))]])
            .into_connection();
        let store = DbStore::new(db, cipher());

        assert!(store.find_eligible().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn posted_review_rejects_a_second_reply() {
        let now = Utc::now();
        let posted = entity::reviews::Model {
            business_id: "biz-1".to_string(),
            review_id: "r1".to_string(),
            review_text: "Great coffee".to_string(),
            rating: 5,
            sentiment_score: 0.8,
            generated_reply: Some("Thanks!".to_string()),
            posted: true,
            posted_status: entity::review_status::ReviewStatus::Posted,
            created_at: now.into(),
            posted_at: Some(now.into()),
            last_error: None,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(vec![vec![posted]])
            .into_connection();
        let store = DbStore::new(db, cipher());

        let err = store
            .update_review("biz-1", "r1", ReviewPatch::posted("Again", now))
            .await
            .unwrap_err();

        assert_eq!(
            err.error_kind,
            crate::error::DomainErrorKind::Internal(InternalErrorKind::Entity(
                EntityErrorKind::Invalid
            ))
        );
    }
}
