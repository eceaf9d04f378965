//! Business logic for replyflow: the scheduled jobs, billing sync and account
//! settings, written against narrow store and gateway traits.
//!
//! Items from `entity_api` are re-exported so that consumers of the `domain`
//! crate do not need to depend on `entity_api` or `entity` directly.
pub use entity_api::{
    business_accounts,
    mutate::{IntoUpdateMap, UpdateMap},
    plan, review_status, reviews, Id,
};

pub mod account;
pub mod billing;
pub mod credentials;
pub mod error;
pub mod ingestion;
pub mod job;
pub mod reply_pipeline;
pub mod review;
pub mod stats;
pub mod store;
pub mod summary;

pub mod gateway;

#[cfg(test)]
pub(crate) mod test_support;
