//! Pieces shared by the scheduled jobs.

use log::*;
use review_ai::traits::reply::Generator;
use serde::Serialize;
use serde_json::json;
use std::future::Future;
use std::time::Duration;

use crate::error::{Error, ExternalErrorKind};
use crate::gateway::ReviewSource;
use crate::store::{AccountStore, ReviewStore};

/// Collaborators for one job invocation, built by the entry point and dropped
/// when it returns.
#[derive(Clone, Copy)]
pub struct JobContext<'a> {
    pub accounts: &'a dyn AccountStore,
    pub reviews: &'a dyn ReviewStore,
    pub source: &'a dyn ReviewSource,
    pub generator: &'a dyn Generator,
    /// Upper bound for every review source and generator call.
    pub call_timeout: Duration,
}

/// Runs `future` with a deadline. Elapsing is an external `Timeout` error.
pub async fn bounded<T, E, F>(timeout: Duration, future: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, E>>,
    E: Into<Error>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result.map_err(Into::into),
        Err(elapsed) => Err(Error::external(ExternalErrorKind::Timeout).with_source(elapsed)),
    }
}

/// What a scheduled job hands back to its trigger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

impl JobResponse {
    pub fn ok<T: Serialize>(summary: &T) -> Self {
        match serde_json::to_value(summary) {
            Ok(body) => Self {
                status_code: 200,
                body,
            },
            Err(e) => Self::error(&Error::from(e)),
        }
    }

    pub fn error(err: &Error) -> Self {
        error!("Job failed: {err}");
        Self {
            status_code: 500,
            body: json!({
                "error": "Internal server error",
                "message": err.to_string(),
            }),
        }
    }

    pub fn bad_request(err: &Error) -> Self {
        warn!("Rejected request: {err}");
        Self {
            status_code: 400,
            body: json!({
                "error": "Bad request",
                "message": err.to_string(),
            }),
        }
    }

    pub fn not_found(err: &Error) -> Self {
        warn!("Not found: {err}");
        Self {
            status_code: 404,
            body: json!({
                "error": "Not found",
                "message": err.to_string(),
            }),
        }
    }

    pub fn from_result<T: Serialize>(result: Result<T, Error>) -> Self {
        match result {
            Ok(summary) => Self::ok(&summary),
            Err(e) => Self::error(&e),
        }
    }
}
