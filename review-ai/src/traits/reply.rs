//! Reply generation provider trait.

use async_trait::async_trait;

use crate::types::reply::Request;
use crate::Error;

/// Drafts replies to reviews and scores review sentiment.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Generator: Send + Sync {
    /// Draft a reply shaped by `request.tone`. Never returns empty text.
    async fn generate_reply(&self, request: &Request) -> Result<String, Error>;

    /// Sentiment in [-1, 1]. Any provider failure yields neutral 0.
    async fn score_sentiment(&self, text: &str) -> f64;

    /// Lowercase identifier, e.g. "openai".
    fn provider_id(&self) -> &str;
}
