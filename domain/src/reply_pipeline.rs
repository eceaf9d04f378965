//! The reply pipeline: drafts a tone-conditioned reply for every pending review,
//! posts it to the review source and records the outcome per review.
//!
//! Reviews are grouped by business so each account is loaded and its
//! credentials refreshed once per run. A failure is confined to the review it
//! happened on, except an authorization failure that survives a forced refresh
//! attempt, which abandons the rest of that business for the run.

use chrono::{DateTime, Utc};
use log::*;
use review_ai::types::reply::Request;
use review_auth::oauth::token::Tokens;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::account::Account;
use crate::credentials::{ensure_fresh, force_refresh};
use crate::error::Error;
use crate::gateway::Location;
use crate::job::{bounded, JobContext, JobResponse};
use crate::review::{Review, ReviewPatch};

/// Counts for one run. `success_count + error_count + skipped_count` always
/// equals `total_processed`, the number of pending reviews loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplySummary {
    pub success_count: usize,
    pub error_count: usize,
    pub skipped_count: usize,
    pub total_processed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Posted,
    Skipped,
    Failed,
    /// Authorization could not be restored; stop working on this business.
    Abandoned,
}

/// Per-business state carried across its reviews.
struct BusinessRun<'a> {
    account: &'a Account,
    location: Location<'a>,
    tokens: Tokens,
    refreshed: bool,
}

pub async fn handle(ctx: JobContext<'_>) -> JobResponse {
    JobResponse::from_result(run(ctx, Utc::now()).await)
}

pub async fn run(ctx: JobContext<'_>, now: DateTime<Utc>) -> Result<ReplySummary, Error> {
    let pending = ctx.reviews.find_pending().await?;

    let mut summary = ReplySummary {
        total_processed: pending.len(),
        ..ReplySummary::default()
    };

    let mut by_business: BTreeMap<String, Vec<Review>> = BTreeMap::new();
    for review in pending {
        by_business
            .entry(review.business_id.clone())
            .or_default()
            .push(review);
    }

    info!(
        "Processing {} pending reviews across {} businesses",
        summary.total_processed,
        by_business.len()
    );

    for (business_id, reviews) in by_business {
        process_business(ctx, &business_id, reviews, now, &mut summary).await;
    }

    info!("Reply pipeline finished: {summary:?}");
    Ok(summary)
}

async fn process_business(
    ctx: JobContext<'_>,
    business_id: &str,
    reviews: Vec<Review>,
    now: DateTime<Utc>,
    summary: &mut ReplySummary,
) {
    let count = reviews.len();

    let account = match ctx.accounts.find_account(business_id).await {
        Ok(Some(account)) if account.is_eligible() => account,
        Ok(Some(_)) => {
            info!("Business {business_id} is not eligible for auto-replies, skipping {count} reviews");
            summary.skipped_count += count;
            return;
        }
        Ok(None) => {
            warn!("No account for business {business_id}, skipping {count} reviews");
            summary.skipped_count += count;
            return;
        }
        Err(e) => {
            error!("Failed to load account for business {business_id}: {e}");
            summary.error_count += count;
            return;
        }
    };

    let tokens = match ensure_fresh(ctx.accounts, ctx.source, &account, ctx.call_timeout, now)
        .await
    {
        Ok(tokens) => tokens,
        Err(e) => {
            error!("Credentials unusable for business {business_id}: {e}");
            summary.error_count += count;
            return;
        }
    };

    let Some(location) = account.location() else {
        warn!("Business {business_id} has no location configured, skipping {count} reviews");
        summary.skipped_count += count;
        return;
    };

    let mut business = BusinessRun {
        account: &account,
        location,
        tokens,
        refreshed: false,
    };

    let mut remaining = reviews.into_iter();
    while let Some(review) = remaining.next() {
        match process_review(ctx, &mut business, &review, now).await {
            Outcome::Posted => summary.success_count += 1,
            Outcome::Skipped => summary.skipped_count += 1,
            Outcome::Failed => summary.error_count += 1,
            Outcome::Abandoned => {
                let abandoned = remaining.len();
                warn!(
                    "Abandoning {abandoned} remaining reviews for business {business_id} this run"
                );
                summary.error_count += 1 + abandoned;
                break;
            }
        }
    }
}

async fn process_review(
    ctx: JobContext<'_>,
    business: &mut BusinessRun<'_>,
    review: &Review,
    now: DateTime<Utc>,
) -> Outcome {
    let business_id = review.business_id.as_str();
    let review_id = review.review_id.as_str();

    if review.posted {
        debug!("Review {review_id} is already posted, skipping");
        return Outcome::Skipped;
    }

    let request = Request::new(
        review.review_text.clone(),
        review.rating,
        business.account.tone.clone(),
    );
    let reply = match bounded(ctx.call_timeout, ctx.generator.generate_reply(&request)).await {
        Ok(reply) => reply,
        Err(e) => {
            record_failure(ctx, review, &e).await;
            return Outcome::Failed;
        }
    };

    match ctx.reviews.find_review(business_id, review_id).await {
        Ok(Some(current)) if current.posted => {
            debug!("Review {review_id} was posted by another run, skipping");
            return Outcome::Skipped;
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!("Review {review_id} of business {business_id} disappeared before posting");
            return Outcome::Failed;
        }
        Err(e) => {
            record_failure(ctx, review, &e).await;
            return Outcome::Failed;
        }
    }

    let mut posted = post(ctx, business, review_id, &reply).await;

    if matches!(&posted, Err(e) if e.is_unauthorized()) && !business.refreshed {
        business.refreshed = true;
        warn!("Posting unauthorized for business {business_id}, forcing a token refresh");
        match force_refresh(
            ctx.accounts,
            ctx.source,
            business_id,
            &business.tokens,
            ctx.call_timeout,
        )
        .await
        {
            Ok(tokens) => {
                business.tokens = tokens;
                posted = post(ctx, business, review_id, &reply).await;
            }
            Err(e) => {
                record_failure(ctx, review, &e).await;
                return Outcome::Abandoned;
            }
        }
    }

    if let Err(e) = posted {
        record_failure(ctx, review, &e).await;
        return Outcome::Failed;
    }

    match ctx
        .reviews
        .update_review(business_id, review_id, ReviewPatch::posted(reply, now))
        .await
    {
        Ok(_) => {
            info!("Posted reply for review {review_id} of business {business_id}");
            Outcome::Posted
        }
        Err(e) => {
            error!("Reply for review {review_id} was posted but recording it failed: {e}");
            Outcome::Failed
        }
    }
}

async fn post(
    ctx: JobContext<'_>,
    business: &BusinessRun<'_>,
    review_id: &str,
    reply: &str,
) -> Result<(), Error> {
    bounded(
        ctx.call_timeout,
        ctx.source
            .post_reply(&business.tokens.access_token, business.location, review_id, reply),
    )
    .await
}

async fn record_failure(ctx: JobContext<'_>, review: &Review, err: &Error) {
    warn!(
        "Reply failed for review {} of business {}: {err}",
        review.review_id, review.business_id
    );
    if let Err(e) = ctx
        .reviews
        .update_review(
            &review.business_id,
            &review.review_id,
            ReviewPatch::failed(err.to_string()),
        )
        .await
    {
        error!(
            "Failed to record error on review {}: {e}",
            review.review_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::new_pending;
    use crate::store::{AccountStore, MemoryStore, ReviewStore};
    use crate::test_support::*;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use entity::plan::PlanState;
    use entity::review_status::ReviewStatus;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_millis(500);

    fn ctx<'a>(
        store: &'a MemoryStore,
        source: &'a FakeSource,
        generator: &'a FakeGenerator,
    ) -> JobContext<'a> {
        JobContext {
            accounts: store,
            reviews: store,
            source,
            generator,
            call_timeout: TIMEOUT,
        }
    }

    async fn pending(store: &MemoryStore, business_id: &str, review_id: &str, text: &str) {
        store
            .insert_if_absent(new_pending(
                business_id,
                review_id.to_string(),
                text.to_string(),
                4,
                0.3,
                Utc::now(),
            ))
            .await
            .unwrap();
    }

    async fn review(store: &MemoryStore, business_id: &str, review_id: &str) -> Review {
        store
            .find_review(business_id, review_id)
            .await
            .unwrap()
            .unwrap()
    }

    fn assert_counts_add_up(summary: &ReplySummary) {
        assert_eq!(
            summary.success_count + summary.error_count + summary.skipped_count,
            summary.total_processed
        );
    }

    #[tokio::test]
    async fn posts_replies_and_a_second_run_does_nothing() {
        let store = MemoryStore::new();
        store.put_account(active_account("B")).await;
        pending(&store, "B", "r1", "Lovely staff").await;
        pending(&store, "B", "r2", "Great coffee").await;
        let source = FakeSource::new();
        let generator = FakeGenerator::new();

        let first = run(ctx(&store, &source, &generator), Utc::now()).await.unwrap();

        assert_eq!(
            first,
            ReplySummary {
                success_count: 2,
                error_count: 0,
                skipped_count: 0,
                total_processed: 2,
            }
        );
        for (id, text) in [("r1", "Lovely staff"), ("r2", "Great coffee")] {
            let stored = review(&store, "B", id).await;
            assert!(stored.posted);
            assert_eq!(stored.posted_status, ReviewStatus::Posted);
            assert_eq!(
                stored.generated_reply,
                Some(FakeGenerator::reply_for(text))
            );
            assert!(stored.posted_at.is_some());
            assert_eq!(stored.last_error, None);
        }
        assert_eq!(source.posts().len(), 2);

        let second = run(ctx(&store, &source, &generator), Utc::now()).await.unwrap();

        assert_eq!(second, ReplySummary::default());
        assert_eq!(generator.reply_calls(), 2);
        assert_eq!(source.post_attempts(), 2);
    }

    #[tokio::test]
    async fn ingested_reviews_are_posted_once_under_their_derived_ids() {
        let store = MemoryStore::new();
        let mut business = active_account("B");
        business.location_id = Some("L".to_string());
        store.put_account(business).await;
        let source = FakeSource::new().with_reviews(vec![
            crate::gateway::FetchedReview {
                resource_name: Some("accounts/1/locations/L/reviews/r1".to_string()),
                review_id: None,
                text: "Great service!".to_string(),
                rating: 5,
            },
            crate::gateway::FetchedReview {
                resource_name: None,
                review_id: Some("r2".to_string()),
                text: "Slow".to_string(),
                rating: 2,
            },
        ]);
        let generator = FakeGenerator::new().with_sentiment(0.6);

        let ingested = crate::ingestion::run(ctx(&store, &source, &generator), Utc::now())
            .await
            .unwrap();
        assert_eq!(ingested.total_reviews, 2);
        for (id, rating) in [("r1", 5), ("r2", 2)] {
            let stored = review(&store, "B", id).await;
            assert!(!stored.posted);
            assert_eq!(stored.posted_status, ReviewStatus::Pending);
            assert_eq!(stored.rating, rating);
            assert_eq!(stored.sentiment_score, 0.6);
        }

        let first = run(ctx(&store, &source, &generator), Utc::now()).await.unwrap();
        assert_eq!(first.success_count, 2);

        let mut posted_ids: Vec<String> = source.posts().into_iter().map(|(id, _)| id).collect();
        posted_ids.sort();
        assert_eq!(posted_ids, vec!["r1".to_string(), "r2".to_string()]);
        for id in ["r1", "r2"] {
            let stored = review(&store, "B", id).await;
            assert!(stored.posted);
            assert!(stored.generated_reply.is_some());
        }

        let second = run(ctx(&store, &source, &generator), Utc::now()).await.unwrap();

        assert_eq!(second, ReplySummary::default());
        assert_eq!(generator.reply_calls(), 2);
        assert_eq!(source.post_attempts(), 2);
    }

    #[tokio::test]
    async fn one_failing_generation_is_isolated() {
        let store = MemoryStore::new();
        store.put_account(active_account("a")).await;
        store.put_account(active_account("b")).await;
        pending(&store, "a", "r1", "Good").await;
        pending(&store, "a", "r2", "offensive").await;
        pending(&store, "b", "r3", "Nice").await;
        let source = FakeSource::new();
        let generator = FakeGenerator::new().failing_on("offensive");

        let summary = run(ctx(&store, &source, &generator), Utc::now()).await.unwrap();

        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.error_count, 1);
        assert_counts_add_up(&summary);
        assert!(review(&store, "a", "r1").await.posted);
        assert!(review(&store, "b", "r3").await.posted);

        let failed = review(&store, "a", "r2").await;
        assert!(!failed.posted);
        assert_eq!(failed.posted_status, ReviewStatus::Pending);
        assert!(failed.last_error.is_some());
        assert_eq!(failed.generated_reply, None);
    }

    #[tokio::test]
    async fn failed_post_converges_on_a_later_run() {
        let store = MemoryStore::new();
        store.put_account(active_account("biz")).await;
        pending(&store, "biz", "r1", "Good").await;
        let generator = FakeGenerator::new();

        let broken = FakeSource::new().failing_post_for("r1");
        let first = run(ctx(&store, &broken, &generator), Utc::now()).await.unwrap();
        assert_eq!(first.error_count, 1);
        assert!(review(&store, "biz", "r1").await.last_error.is_some());

        let healthy = FakeSource::new();
        let second = run(ctx(&store, &healthy, &generator), Utc::now()).await.unwrap();
        assert_eq!(second.success_count, 1);

        let stored = review(&store, "biz", "r1").await;
        assert!(stored.posted);
        assert_eq!(stored.last_error, None);
    }

    #[tokio::test]
    async fn ineligible_accounts_are_untouched() {
        let store = MemoryStore::new();
        let mut trial = active_account("trial");
        trial.plan = PlanState::Trial;
        store.put_account(trial).await;
        let mut disconnected = active_account("disconnected");
        disconnected.tokens = None;
        store.put_account(disconnected).await;
        pending(&store, "trial", "r1", "Good").await;
        pending(&store, "disconnected", "r2", "Good").await;
        pending(&store, "unknown", "r3", "Good").await;
        let before = store.all_reviews().await;
        let source = FakeSource::new();
        let generator = FakeGenerator::new();

        let summary = run(ctx(&store, &source, &generator), Utc::now()).await.unwrap();

        assert_eq!(summary.skipped_count, 3);
        assert_counts_add_up(&summary);
        assert_eq!(generator.reply_calls(), 0);
        assert_eq!(source.post_attempts(), 0);
        assert_eq!(store.all_reviews().await, before);
    }

    #[tokio::test]
    async fn missing_location_skips_business() {
        let store = MemoryStore::new();
        let mut account = active_account("biz");
        account.location_id = None;
        store.put_account(account).await;
        pending(&store, "biz", "r1", "Good").await;
        let source = FakeSource::new();
        let generator = FakeGenerator::new();

        let summary = run(ctx(&store, &source, &generator), Utc::now()).await.unwrap();

        assert_eq!(summary.skipped_count, 1);
        assert_eq!(generator.reply_calls(), 0);
        assert_eq!(review(&store, "biz", "r1").await.last_error, None);
    }

    #[tokio::test]
    async fn unusable_credentials_count_errors_without_touching_records() {
        let store = MemoryStore::new();
        let now = Utc::now();
        store
            .put_account(account_with_tokens(
                "biz",
                tokens_expiring(now - ChronoDuration::minutes(1)),
            ))
            .await;
        pending(&store, "biz", "r1", "Good").await;
        pending(&store, "biz", "r2", "Fine").await;
        let source = FakeSource::new().failing_refresh();
        let generator = FakeGenerator::new();

        let summary = run(ctx(&store, &source, &generator), now).await.unwrap();

        assert_eq!(summary.error_count, 2);
        assert_eq!(generator.reply_calls(), 0);
        assert_eq!(review(&store, "biz", "r1").await.last_error, None);
    }

    #[tokio::test]
    async fn unauthorized_post_refreshes_once_per_business() {
        let store = MemoryStore::new();
        store.put_account(active_account("biz")).await;
        pending(&store, "biz", "r1", "Good").await;
        pending(&store, "biz", "r2", "Fine").await;
        let source = FakeSource::new().rejecting_stale_tokens();
        let generator = FakeGenerator::new();

        let summary = run(ctx(&store, &source, &generator), Utc::now()).await.unwrap();

        assert_eq!(summary.success_count, 2);
        assert_eq!(source.refresh_calls(), 1);
        assert_eq!(source.post_attempts(), 3);
    }

    #[tokio::test]
    async fn persistent_unauthorized_does_not_refresh_again() {
        let store = MemoryStore::new();
        store.put_account(active_account("biz")).await;
        pending(&store, "biz", "r1", "Good").await;
        pending(&store, "biz", "r2", "Fine").await;
        let source = FakeSource::new().always_unauthorized();
        let generator = FakeGenerator::new();

        let summary = run(ctx(&store, &source, &generator), Utc::now()).await.unwrap();

        assert_eq!(summary.error_count, 2);
        assert_eq!(source.refresh_calls(), 1);
        assert!(review(&store, "biz", "r1").await.last_error.is_some());
        assert!(review(&store, "biz", "r2").await.last_error.is_some());
    }

    #[tokio::test]
    async fn failed_forced_refresh_abandons_the_business() {
        let store = MemoryStore::new();
        store.put_account(active_account("biz")).await;
        store.put_account(active_account("other")).await;
        pending(&store, "biz", "r1", "Good").await;
        pending(&store, "biz", "r2", "Fine").await;
        pending(&store, "biz", "r3", "Okay").await;
        pending(&store, "other", "r4", "Nice").await;
        let source = FakeSource::new()
            .rejecting_stale_tokens()
            .failing_refresh();
        let generator = FakeGenerator::new();

        let summary = run(ctx(&store, &source, &generator), Utc::now()).await.unwrap();

        assert_eq!(summary.error_count, 4);
        assert_counts_add_up(&summary);
        assert!(review(&store, "biz", "r1").await.last_error.is_some());
        assert_eq!(review(&store, "biz", "r2").await.last_error, None);
        assert_eq!(review(&store, "biz", "r3").await.last_error, None);
        // one attempt for biz, one for other
        assert_eq!(source.refresh_calls(), 2);
    }

    /// Serves posted records from `find_pending`, like a lagging index.
    struct StaleIndex(MemoryStore);

    #[async_trait]
    impl ReviewStore for StaleIndex {
        async fn find_review(&self, b: &str, r: &str) -> Result<Option<Review>, Error> {
            self.0.find_review(b, r).await
        }

        async fn insert_if_absent(&self, review: Review) -> Result<bool, Error> {
            self.0.insert_if_absent(review).await
        }

        async fn find_pending(&self) -> Result<Vec<Review>, Error> {
            Ok(self.0.all_reviews().await)
        }

        async fn find_by_business(&self, b: &str) -> Result<Vec<Review>, Error> {
            self.0.find_by_business(b).await
        }

        async fn find_created_between(
            &self,
            b: &str,
            from: DateTime<Utc>,
            to: DateTime<Utc>,
        ) -> Result<Vec<Review>, Error> {
            self.0.find_created_between(b, from, to).await
        }

        async fn update_review(
            &self,
            b: &str,
            r: &str,
            patch: ReviewPatch,
        ) -> Result<Review, Error> {
            self.0.update_review(b, r, patch).await
        }
    }

    #[tokio::test]
    async fn stale_posted_records_are_skipped_not_reposted() {
        let store = StaleIndex(MemoryStore::new());
        store.0.put_account(active_account("biz")).await;
        pending(&store.0, "biz", "r1", "Good").await;
        pending(&store.0, "biz", "r2", "Fine").await;
        store
            .0
            .update_review("biz", "r1", ReviewPatch::posted("Thanks", Utc::now()))
            .await
            .unwrap();
        let source = FakeSource::new();
        let generator = FakeGenerator::new();

        let summary = run(
            JobContext {
                accounts: &store.0,
                reviews: &store,
                source: &source,
                generator: &generator,
                call_timeout: TIMEOUT,
            },
            Utc::now(),
        )
        .await
        .unwrap();

        assert_eq!(summary.skipped_count, 1);
        assert_eq!(summary.success_count, 1);
        assert_eq!(source.posts(), vec![(
            "r2".to_string(),
            FakeGenerator::reply_for("Fine")
        )]);
        assert_eq!(
            review(&store.0, "biz", "r1").await.generated_reply.as_deref(),
            Some("Thanks")
        );
    }

    #[tokio::test]
    async fn pending_listing_failure_fails_the_invocation() {
        let source = FakeSource::new();
        let generator = FakeGenerator::new();
        let response = handle(JobContext {
            accounts: &BrokenStore,
            reviews: &BrokenStore,
            source: &source,
            generator: &generator,
            call_timeout: TIMEOUT,
        })
        .await;

        assert_eq!(response.status_code, 500);
    }

    #[tokio::test]
    async fn handle_reports_camel_case_summary() {
        let store = MemoryStore::new();
        let source = FakeSource::new();
        let generator = FakeGenerator::new();

        let response = handle(ctx(&store, &source, &generator)).await;

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body["successCount"], 0);
        assert_eq!(response.body["totalProcessed"], 0);
    }
}
