//! Scheduled ingestion: pulls new reviews for every eligible business and
//! stores them as pending with a sentiment score.

use chrono::{DateTime, Utc};
use log::*;
use review_ai::types::reply::clamp_sentiment;
use serde::Serialize;

use crate::account::Account;
use crate::credentials::{ensure_fresh, force_refresh};
use crate::error::Error;
use crate::gateway::FetchedReview;
use crate::job::{bounded, JobContext, JobResponse};
use crate::review::{derive_review_id, new_pending};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionSummary {
    /// Reviews newly stored by this run.
    pub total_reviews: usize,
    /// Businesses attempted: active plan with stored credentials.
    pub businesses_eligible: usize,
    /// Businesses whose reviews were fetched and stored.
    pub businesses_processed: usize,
    pub businesses_skipped: usize,
    pub businesses_failed: usize,
}

pub async fn handle(ctx: JobContext<'_>) -> JobResponse {
    JobResponse::from_result(run(ctx, Utc::now()).await)
}

pub async fn run(ctx: JobContext<'_>, now: DateTime<Utc>) -> Result<IngestionSummary, Error> {
    let accounts = ctx.accounts.find_eligible().await?;
    info!("Ingesting reviews for {} businesses", accounts.len());

    let mut summary = IngestionSummary {
        businesses_eligible: accounts.len(),
        ..Default::default()
    };
    for account in &accounts {
        match ingest_business(ctx, account, now).await {
            Ok(Some(inserted)) => {
                summary.businesses_processed += 1;
                summary.total_reviews += inserted;
            }
            Ok(None) => summary.businesses_skipped += 1,
            Err(e) => {
                error!("Ingestion failed for business {}: {e}", account.id);
                summary.businesses_failed += 1;
            }
        }
    }

    info!("Ingestion finished: {summary:?}");
    Ok(summary)
}

/// Returns the number of reviews stored, or `None` when the business was skipped.
async fn ingest_business(
    ctx: JobContext<'_>,
    account: &Account,
    now: DateTime<Utc>,
) -> Result<Option<usize>, Error> {
    let Some(location) = account.location() else {
        warn!("Business {} has no location configured, skipping", account.id);
        return Ok(None);
    };

    let tokens = ensure_fresh(ctx.accounts, ctx.source, account, ctx.call_timeout, now).await?;

    let fetched = match bounded(
        ctx.call_timeout,
        ctx.source.fetch_reviews(&tokens.access_token, location),
    )
    .await
    {
        Err(e) if e.is_unauthorized() => {
            warn!("Review fetch unauthorized for business {}, refreshing", account.id);
            let tokens =
                force_refresh(ctx.accounts, ctx.source, &account.id, &tokens, ctx.call_timeout)
                    .await?;
            bounded(
                ctx.call_timeout,
                ctx.source.fetch_reviews(&tokens.access_token, location),
            )
            .await?
        }
        result => result?,
    };

    debug!("Fetched {} reviews for business {}", fetched.len(), account.id);

    let mut inserted = 0;
    for review in fetched {
        match store_review(ctx, &account.id, review, now).await {
            Ok(true) => inserted += 1,
            Ok(false) => {}
            Err(e) => warn!("Failed to store review for business {}: {e}", account.id),
        }
    }
    Ok(Some(inserted))
}

async fn store_review(
    ctx: JobContext<'_>,
    business_id: &str,
    fetched: FetchedReview,
    now: DateTime<Utc>,
) -> Result<bool, Error> {
    let review_id = derive_review_id(fetched.resource_name.as_deref(), fetched.review_id.as_deref());

    if ctx.reviews.find_review(business_id, &review_id).await?.is_some() {
        return Ok(false);
    }

    let sentiment = match tokio::time::timeout(
        ctx.call_timeout,
        ctx.generator.score_sentiment(&fetched.text),
    )
    .await
    {
        Ok(score) => clamp_sentiment(score),
        Err(_) => {
            warn!("Sentiment scoring timed out for review {review_id}");
            0.0
        }
    };

    ctx.reviews
        .insert_if_absent(new_pending(
            business_id,
            review_id,
            fetched.text,
            fetched.rating,
            sentiment,
            now,
        ))
        .await
}
