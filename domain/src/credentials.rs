//! Access-token refresh shared by ingestion and the reply pipeline.

use chrono::{DateTime, Utc};
use log::*;
use review_auth::oauth::token::Tokens;
use std::time::Duration;

use crate::account::Account;
use crate::error::{Error, ExternalErrorKind};
use crate::gateway::ReviewSource;
use crate::job::bounded;
use crate::store::AccountStore;

/// Returns usable credentials for `account`, refreshing them when the access
/// token expired at or before `now`.
pub async fn ensure_fresh(
    accounts: &dyn AccountStore,
    source: &dyn ReviewSource,
    account: &Account,
    call_timeout: Duration,
    now: DateTime<Utc>,
) -> Result<Tokens, Error> {
    let tokens = account.tokens.clone().ok_or_else(|| {
        Error::external(ExternalErrorKind::Unauthorized)
            .with_source(format!("business {} has no credentials", account.id))
    })?;

    if !tokens.is_expired_at(now) {
        return Ok(tokens);
    }

    debug!("Access token for business {} expired, refreshing", account.id);
    force_refresh(accounts, source, &account.id, &tokens, call_timeout).await
}

/// Exchanges the refresh token regardless of expiry and persists the result.
/// The previous refresh token is kept when the provider does not rotate it.
pub async fn force_refresh(
    accounts: &dyn AccountStore,
    source: &dyn ReviewSource,
    business_id: &str,
    tokens: &Tokens,
    call_timeout: Duration,
) -> Result<Tokens, Error> {
    let refresh_token = tokens.refresh_token.clone().ok_or_else(|| {
        Error::external(ExternalErrorKind::Unauthorized)
            .with_source(format!("business {business_id} has no refresh token"))
    })?;

    let refreshed = bounded(call_timeout, source.refresh_token(&refresh_token))
        .await?
        .or_refresh_token(Some(refresh_token));

    accounts.store_tokens(business_id, &refreshed).await?;
    info!("Refreshed credentials for business {business_id}");
    Ok(refreshed)
}
