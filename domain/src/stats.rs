//! Aggregates over a set of reviews, as shown on the dashboard and in summaries.

use chrono::{DateTime, FixedOffset};
use entity::plan::PlanState;
use log::*;
use review_ai::types::tone;
use serde::Serialize;

use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use crate::job::JobResponse;
use crate::review::Review;
use crate::store::{AccountStore, ReviewStore};

/// Reviews listed on the dashboard next to the stats.
pub const RECENT_REVIEWS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_reviews: usize,
    pub posted_replies: usize,
    /// Percentage of reviews with a posted reply, one decimal.
    pub response_rate: f64,
    /// One decimal.
    pub average_rating: f64,
    /// Two decimals.
    pub average_sentiment: f64,
}

impl ReviewStats {
    pub fn from_reviews(reviews: &[Review]) -> Self {
        if reviews.is_empty() {
            return Self::default();
        }

        let total = reviews.len();
        let posted = reviews.iter().filter(|review| review.posted).count();
        let rating_sum: i64 = reviews.iter().map(|review| i64::from(review.rating)).sum();
        let sentiment_sum: f64 = reviews.iter().map(|review| review.sentiment_score).sum();

        Self {
            total_reviews: total,
            posted_replies: posted,
            response_rate: round_to(posted as f64 / total as f64 * 100.0, 1),
            average_rating: round_to(rating_sum as f64 / total as f64, 1),
            average_sentiment: round_to(sentiment_sum / total as f64, 2),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.average_sentiment > 0.0
    }
}

/// The `limit` newest reviews, newest first.
pub fn recent(reviews: &[Review], limit: usize) -> Vec<&Review> {
    let mut sorted: Vec<&Review> = reviews.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    sorted.truncate(limit);
    sorted
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentReview {
    pub review_id: String,
    pub review_text: String,
    pub rating: i32,
    pub posted: bool,
    pub generated_reply: Option<String>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<&Review> for RecentReview {
    fn from(review: &Review) -> Self {
        Self {
            review_id: review.review_id.clone(),
            review_text: review.review_text.clone(),
            rating: review.rating,
            posted: review.posted,
            generated_reply: review.generated_reply.clone(),
            created_at: review.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfile {
    pub email: String,
    pub plan: PlanState,
    pub tone: tone::Config,
    pub has_google_connected: bool,
}

/// Dashboard payload for one business.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessStats {
    pub stats: ReviewStats,
    pub business: BusinessProfile,
    pub recent_reviews: Vec<RecentReview>,
}

pub async fn business_stats(
    accounts: &dyn AccountStore,
    reviews: &dyn ReviewStore,
    business_id: &str,
) -> Result<BusinessStats, Error> {
    if business_id.trim().is_empty() {
        return Err(Error::validation("business id is required"));
    }

    let account = accounts
        .find_account(business_id)
        .await?
        .ok_or_else(|| Error::not_found().with_source(format!("business {business_id}")))?;

    let all = reviews.find_by_business(business_id).await?;
    debug!("Computing stats over {} reviews for business {business_id}", all.len());

    Ok(BusinessStats {
        stats: ReviewStats::from_reviews(&all),
        business: BusinessProfile {
            email: account.email,
            plan: account.plan,
            tone: account.tone,
            has_google_connected: account.tokens.is_some(),
        },
        recent_reviews: recent(&all, RECENT_REVIEWS)
            .into_iter()
            .map(RecentReview::from)
            .collect(),
    })
}

pub async fn handle(
    accounts: &dyn AccountStore,
    reviews: &dyn ReviewStore,
    business_id: Option<&str>,
) -> JobResponse {
    match business_stats(accounts, reviews, business_id.unwrap_or_default()).await {
        Ok(stats) => JobResponse::ok(&stats),
        Err(e) if e.is_not_found() => JobResponse::not_found(&e),
        Err(e) if matches!(
            e.error_kind,
            DomainErrorKind::Internal(InternalErrorKind::Validation(_))
        ) =>
        {
            JobResponse::bad_request(&e)
        }
        Err(e) => JobResponse::error(&e),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
