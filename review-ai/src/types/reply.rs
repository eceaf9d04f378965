//! Reply and sentiment request types and prompt construction.

use serde::{Deserialize, Serialize};

use super::tone;

/// Ratings at or below this value (and above zero) count as negative.
pub const NEGATIVE_RATING_MAX: i32 = 2;

pub const SENTIMENT_SYSTEM_PROMPT: &str = "Analyze the sentiment of this review and return a \
number between -1 (very negative) and 1 (very positive). Return only the number.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub review_text: String,
    /// Star rating 1-5, or 0 when the reviewer left none
    pub rating: i32,
    pub tone: tone::Config,
}

impl Request {
    pub fn new(review_text: impl Into<String>, rating: i32, tone: tone::Config) -> Self {
        Self {
            review_text: review_text.into(),
            rating,
            tone,
        }
    }

    pub fn is_negative(&self) -> bool {
        (1..=NEGATIVE_RATING_MAX).contains(&self.rating)
    }

    pub fn system_prompt(&self) -> String {
        let mut lines = vec![
            "You are a polite business representative writing a public reply to a customer review."
                .to_string(),
            "Never mention refunds or personal information. Keep the reply brand-safe.".to_string(),
        ];
        lines.extend(self.tone.style_guidance());

        if self.is_negative() {
            lines.push(self.tone.negative_review_guidance());
            if let Some(email) = self.tone.support_contact() {
                lines.push(format!(
                    "Invite the customer to contact {email} so the team can follow up."
                ));
            }
        }

        lines.join("\n")
    }

    pub fn user_prompt(&self) -> String {
        let rating = if self.rating > 0 {
            format!("{} stars", self.rating)
        } else {
            "no star rating".to_string()
        };
        format!(
            "Review ({rating}): \"{}\"\nWrite the reply:",
            self.review_text
        )
    }
}

/// Reads a sentiment score from model output.
///
/// Takes the leading number, clamps it to [-1, 1] and falls back to neutral 0
/// for anything unparseable or non-finite.
pub fn parse_sentiment(raw: &str) -> f64 {
    let trimmed = raw.trim();
    let numeric: String = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || *c == '.' || (*i == 0 && matches!(c, '-' | '+')))
        .map(|(_, c)| c)
        .collect();

    clamp_sentiment(numeric.trim_end_matches('.').parse::<f64>().unwrap_or(0.0))
}

pub fn clamp_sentiment(score: f64) -> f64 {
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
