//! Google Business Profile: OAuth through `review_auth` plus the v4 reviews API.

use async_trait::async_trait;
use log::*;
use review_auth::http::AuthenticatedClient;
use review_auth::oauth::providers::google;
use review_auth::oauth::token::Tokens;
use review_auth::oauth::Provider as _;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{FetchedReview, Location, ReviewSource};
use crate::error::{DomainErrorKind, Error, ExternalErrorKind};

/// Upper bound on pages followed per location in one fetch.
const MAX_PAGES: usize = 100;

pub struct GoogleBusinessClient {
    oauth: google::Provider,
    http_client: AuthenticatedClient,
    base_url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListReviewsResponse {
    #[serde(default)]
    reviews: Vec<GoogleReview>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleReview {
    name: Option<String>,
    review_id: Option<String>,
    #[serde(default)]
    comment: Option<String>,
    #[serde(default)]
    star_rating: Option<StarRating>,
}

/// `starRating` arrives as an enum name (`"FOUR"`) or, from some proxies, a number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StarRating {
    Number(i64),
    Name(String),
}

impl StarRating {
    fn stars(&self) -> i32 {
        match self {
            StarRating::Number(n) => (*n).clamp(0, 5) as i32,
            StarRating::Name(name) => match name.to_ascii_uppercase().as_str() {
                "ONE" => 1,
                "TWO" => 2,
                "THREE" => 3,
                "FOUR" => 4,
                "FIVE" => 5,
                other => other.parse::<i32>().map(|n| n.clamp(0, 5)).unwrap_or(0),
            },
        }
    }
}

impl From<GoogleReview> for FetchedReview {
    fn from(review: GoogleReview) -> Self {
        FetchedReview {
            rating: review.star_rating.as_ref().map(StarRating::stars).unwrap_or(0),
            resource_name: review.name,
            review_id: review.review_id,
            text: review.comment.unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct ReplyRequest<'a> {
    comment: &'a str,
}

impl GoogleBusinessClient {
    pub fn new(oauth: google::Provider, http_client: AuthenticatedClient, base_url: &str) -> Self {
        Self {
            oauth,
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn reviews_url(&self, location: Location<'_>) -> String {
        format!("{}/{}/reviews", self.base_url, location.resource_path())
    }
}

/// Maps a non-success status to a domain error. 401 and 403 are `Unauthorized`.
async fn error_for_status(response: reqwest::Response, action: &str) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!("Google Business API {action} returned {status}: {body}");

    let kind = match status.as_u16() {
        401 | 403 => ExternalErrorKind::Unauthorized,
        _ => ExternalErrorKind::Other(format!("{action} failed with status {status}")),
    };
    Error {
        source: Some(format!("{status}: {body}").into()),
        error_kind: DomainErrorKind::External(kind),
    }
}

#[async_trait]
impl ReviewSource for GoogleBusinessClient {
    fn authorization_url(&self, state: &str) -> String {
        self.oauth.authorization_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<Tokens, Error> {
        Ok(self.oauth.exchange_code(code).await?)
    }

    async fn refresh_token(&self, refresh_token: &SecretString) -> Result<Tokens, Error> {
        let result = self.oauth.refresh_token(refresh_token.expose_secret()).await?;
        debug!(
            "Refreshed access token (refresh token rotated: {})",
            result.refresh_token_rotated
        );
        Ok(result.tokens)
    }

    async fn fetch_reviews(
        &self,
        access_token: &SecretString,
        location: Location<'_>,
    ) -> Result<Vec<FetchedReview>, Error> {
        let url = self.reviews_url(location);
        let mut reviews = Vec::new();
        let mut page_token: Option<String> = None;

        for _ in 0..MAX_PAGES {
            let mut request = self
                .http_client
                .get(&url)
                .bearer_auth(access_token.expose_secret());
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(error_for_status(response, "list reviews").await);
            }

            let page: ListReviewsResponse = response.json().await?;
            reviews.extend(page.reviews.into_iter().map(FetchedReview::from));

            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Fetched {} reviews from {url}", reviews.len());
        Ok(reviews)
    }

    async fn post_reply(
        &self,
        access_token: &SecretString,
        location: Location<'_>,
        review_id: &str,
        text: &str,
    ) -> Result<(), Error> {
        let url = format!(
            "{}/{}/reply",
            self.reviews_url(location),
            urlencoding::encode(review_id)
        );

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(access_token.expose_secret())
            .json(&ReplyRequest { comment: text })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_for_status(response, "post reply").await);
        }

        info!("Posted reply to review {review_id}");
        Ok(())
    }
}
