//! Content moderation provider trait.

use async_trait::async_trait;

use crate::Error;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Moderator: Send + Sync {
    /// True when `text` must not be published.
    async fn is_flagged(&self, text: &str) -> Result<bool, Error>;
}
