//! Review records and typed partial updates.

use chrono::{DateTime, Utc};
use entity::review_status::ReviewStatus;
use entity_api::mutate::{IntoUpdateMap, UpdateMap};
use sea_orm::Value;
use uuid::Uuid;

pub use entity::reviews::Model as Review;

/// Field-level patch for a review record.
///
/// `None` leaves a field untouched. `last_error: Some(None)` clears the error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewPatch {
    pub posted: Option<bool>,
    pub generated_reply: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    pub last_error: Option<Option<String>>,
}

impl ReviewPatch {
    /// Terminal transition after a reply was accepted by the review provider.
    pub fn posted(reply: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            posted: Some(true),
            generated_reply: Some(reply.into()),
            posted_at: Some(now),
            last_error: Some(None),
        }
    }

    /// Records a failed attempt; the review stays pending.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            last_error: Some(Some(message.into())),
            ..Self::default()
        }
    }

    pub fn clear_error() -> Self {
        Self {
            last_error: Some(None),
            ..Self::default()
        }
    }

    /// The only patch a posted review still accepts.
    pub fn allowed_on_posted(&self) -> bool {
        self.posted.is_none()
            && self.generated_reply.is_none()
            && self.posted_at.is_none()
            && matches!(self.last_error, None | Some(None))
    }

    /// Applies the patch in place, keeping `posted_status` in step with `posted`.
    pub fn apply(&self, review: &mut Review) {
        if let Some(posted) = self.posted {
            review.posted = posted;
            review.posted_status = ReviewStatus::from_posted(posted);
        }
        if let Some(reply) = &self.generated_reply {
            review.generated_reply = Some(reply.clone());
        }
        if let Some(posted_at) = self.posted_at {
            review.posted_at = Some(posted_at.fixed_offset());
        }
        if let Some(last_error) = &self.last_error {
            review.last_error = last_error.clone();
        }
    }
}

impl IntoUpdateMap for ReviewPatch {
    fn into_update_map(self) -> UpdateMap {
        let mut update_map = UpdateMap::new();
        if let Some(posted) = self.posted {
            update_map.insert("posted".to_string(), Some(Value::Bool(Some(posted))));
            update_map.insert(
                "posted_status".to_string(),
                Some(Value::String(Some(Box::new(
                    ReviewStatus::from_posted(posted).to_string(),
                )))),
            );
        }
        if let Some(reply) = self.generated_reply {
            update_map.insert(
                "generated_reply".to_string(),
                Some(Value::String(Some(Box::new(reply)))),
            );
        }
        if let Some(posted_at) = self.posted_at {
            update_map.insert(
                "posted_at".to_string(),
                Some(Value::from(posted_at.fixed_offset())),
            );
        }
        if let Some(last_error) = self.last_error {
            update_map.insert(
                "last_error".to_string(),
                Some(Value::String(last_error.map(Box::new))),
            );
        }
        update_map
    }
}

/// Stable id for a fetched review: the last segment of the provider resource
/// name, else the provider review id, else a generated `review-<uuid>`.
pub fn derive_review_id(resource_name: Option<&str>, review_id: Option<&str>) -> String {
    resource_name
        .and_then(|name| name.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .or_else(|| review_id.filter(|id| !id.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("review-{}", Uuid::new_v4()))
}

/// A pending review as ingestion stores it.
pub fn new_pending(
    business_id: &str,
    review_id: String,
    review_text: String,
    rating: i32,
    sentiment_score: f64,
    now: DateTime<Utc>,
) -> Review {
    Review {
        business_id: business_id.to_string(),
        review_id,
        review_text,
        rating: rating.clamp(0, 5),
        sentiment_score,
        generated_reply: None,
        posted: false,
        posted_status: ReviewStatus::Pending,
        created_at: now.fixed_offset(),
        posted_at: None,
        last_error: None,
    }
}
