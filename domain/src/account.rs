//! Business accounts: connecting the review provider and tone settings.

use email_address::EmailAddress;
use entity::plan::PlanState;
use entity::Id;
use log::*;
use review_ai::types::tone;
use review_auth::oauth::token::Tokens;

use crate::error::Error;
use crate::gateway::{Location, ReviewSource};
use crate::store::AccountStore;

/// A business account as the jobs see it, with credentials already decrypted.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Id,
    pub email: String,
    pub plan: PlanState,
    pub subscription_id: Option<String>,
    pub tokens: Option<Tokens>,
    pub tone: tone::Config,
    pub account_ref: Option<String>,
    pub location_id: Option<String>,
}

impl Account {
    pub fn new(id: impl Into<Id>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            plan: PlanState::Trial,
            subscription_id: None,
            tokens: None,
            tone: tone::Config::default(),
            account_ref: None,
            location_id: None,
        }
    }

    /// Active plan and a credential bundle on file.
    pub fn is_eligible(&self) -> bool {
        self.plan == PlanState::Active && self.tokens.is_some()
    }

    /// Where reviews are listed and answered, when a location is configured.
    pub fn location(&self) -> Option<Location<'_>> {
        self.location_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .map(|location_id| Location {
                account_ref: self.account_ref.as_deref(),
                location_id,
            })
    }
}

/// Consent URL for connecting a business. The business id travels as `state`.
pub fn authorization_url(source: &dyn ReviewSource, business_id: &str) -> Result<String, Error> {
    validate_business_id(business_id)?;
    Ok(source.authorization_url(business_id))
}

/// Completes the OAuth callback: creates the account if needed and stores the
/// exchanged credentials.
pub async fn connect(
    accounts: &dyn AccountStore,
    source: &dyn ReviewSource,
    business_id: &str,
    email: &str,
    code: &str,
) -> Result<Account, Error> {
    validate_business_id(business_id)?;
    if !EmailAddress::is_valid(email) {
        return Err(Error::validation(format!("invalid email address: {email}")));
    }
    if code.trim().is_empty() {
        return Err(Error::validation("authorization code is required"));
    }

    let mut account = accounts.create_if_absent(business_id, email).await?;
    let tokens = source.exchange_code(code).await?;

    accounts.store_tokens(business_id, &tokens).await?;
    info!("Connected review provider for business {business_id}");

    account.tokens = Some(tokens);
    Ok(account)
}

pub async fn update_tone(
    accounts: &dyn AccountStore,
    business_id: &str,
    tone: tone::Config,
) -> Result<tone::Config, Error> {
    tone.validate()?;

    if accounts.find_account(business_id).await?.is_none() {
        return Err(Error::not_found());
    }

    accounts.set_tone(business_id, &tone).await?;
    debug!("Updated tone for business {business_id}");
    Ok(tone)
}

pub async fn update_location(
    accounts: &dyn AccountStore,
    business_id: &str,
    account_ref: Option<String>,
    location_id: String,
) -> Result<(), Error> {
    if location_id.trim().is_empty() {
        return Err(Error::validation("location id is required"));
    }
    if accounts.find_account(business_id).await?.is_none() {
        return Err(Error::not_found());
    }
    accounts
        .set_location(business_id, account_ref, location_id)
        .await
}

fn validate_business_id(business_id: &str) -> Result<(), Error> {
    if business_id.trim().is_empty() {
        Err(Error::validation("business id is required"))
    } else {
        Ok(())
    }
}
