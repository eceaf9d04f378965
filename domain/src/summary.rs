//! Daily summary email for every business on the active plan.

use chrono::{DateTime, Duration, Utc};
use entity::plan::PlanState;
use log::*;
use serde::Serialize;

use crate::account::Account;
use crate::error::Error;
use crate::gateway::{Email, Mailer};
use crate::job::JobResponse;
use crate::review::Review;
use crate::stats::{recent, ReviewStats};
use crate::store::{AccountStore, ReviewStore};

/// Reviews listed in one email.
pub const MAX_LISTED_REVIEWS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryReport {
    pub emails_sent: usize,
    pub total_users: usize,
}

#[derive(Clone, Copy)]
pub struct SummaryContext<'a> {
    pub accounts: &'a dyn AccountStore,
    pub reviews: &'a dyn ReviewStore,
    pub mailer: &'a dyn Mailer,
    pub dashboard_url: &'a str,
}

/// `[yesterday 00:00, today 00:00)` in UTC.
pub fn yesterday_window(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now);
    (today - Duration::days(1), today)
}

pub async fn handle(ctx: SummaryContext<'_>) -> JobResponse {
    JobResponse::from_result(run(ctx, Utc::now()).await)
}

pub async fn run(ctx: SummaryContext<'_>, now: DateTime<Utc>) -> Result<SummaryReport, Error> {
    let accounts = ctx.accounts.find_by_plan(PlanState::Active).await?;
    let (from, to) = yesterday_window(now);

    let mut report = SummaryReport {
        emails_sent: 0,
        total_users: accounts.len(),
    };

    for account in &accounts {
        match send_summary(ctx, account, from, to).await {
            Ok(true) => report.emails_sent += 1,
            Ok(false) => {}
            Err(e) => error!("Failed to send summary to business {}: {e}", account.id),
        }
    }

    info!("Summary emails finished: {report:?}");
    Ok(report)
}

async fn send_summary(
    ctx: SummaryContext<'_>,
    account: &Account,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<bool, Error> {
    let reviews = ctx
        .reviews
        .find_created_between(&account.id, from, to)
        .await?;
    if reviews.is_empty() {
        debug!("No new reviews yesterday for business {}", account.id);
        return Ok(false);
    }

    let email = compose(account, &reviews, ctx.dashboard_url);
    ctx.mailer.send(&email).await?;
    info!("Sent summary email to {}", account.email);
    Ok(true)
}

/// Builds the summary email for `reviews`.
pub fn compose(account: &Account, reviews: &[Review], dashboard_url: &str) -> Email {
    let stats = ReviewStats::from_reviews(reviews);
    let listed = recent(reviews, MAX_LISTED_REVIEWS);
    let greeting_name = account.email.split('@').next().unwrap_or(&account.email);

    Email {
        to: account.email.clone(),
        subject: format!("Daily Review Summary - {} New Reviews", stats.total_reviews),
        text: text_body(&stats, dashboard_url),
        html: html_body(greeting_name, &stats, &listed, dashboard_url),
    }
}

fn text_body(stats: &ReviewStats, dashboard_url: &str) -> String {
    format!(
        "Daily Review Summary\n\n\
         Total Reviews: {}\n\
         Replies Posted: {} ({:.1}% response rate)\n\
         Average Rating: {:.1} stars\n\n\
         View your dashboard: {dashboard_url}",
        stats.total_reviews, stats.posted_replies, stats.response_rate, stats.average_rating,
    )
}

fn html_body(
    greeting_name: &str,
    stats: &ReviewStats,
    reviews: &[&Review],
    dashboard_url: &str,
) -> String {
    let sentiment = if stats.is_positive() {
        "Positive"
    } else {
        "Neutral"
    };

    let listed: String = reviews
        .iter()
        .map(|review| {
            let text = if review.review_text.trim().is_empty() {
                "No text".to_string()
            } else {
                escape_html(&review.review_text)
            };
            let status = if review.posted {
                r#"<p style="color: green;">Reply posted</p>"#
            } else {
                r#"<p style="color: orange;">Pending reply</p>"#
            };
            format!(
                r#"<div class="review"><div class="rating">{} &#11088;</div><p>{text}</p>{status}</div>"#,
                review.rating
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<style>
body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
.container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
.header {{ background: #4F46E5; color: white; padding: 20px; border-radius: 8px 8px 0 0; }}
.content {{ background: #f9fafb; padding: 20px; border-radius: 0 0 8px 8px; }}
.stat {{ background: white; padding: 15px; margin: 10px 0; border-radius: 4px; border-left: 4px solid #4F46E5; }}
.review {{ background: white; padding: 15px; margin: 10px 0; border-radius: 4px; }}
.rating {{ color: #F59E0B; font-weight: bold; }}
</style>
</head>
<body>
<div class="container">
<div class="header"><h1>Daily Review Summary</h1></div>
<div class="content">
<p>Hi {name},</p>
<p>Here's your review activity from yesterday:</p>
<div class="stat"><strong>Total Reviews:</strong> {total}</div>
<div class="stat"><strong>Replies Posted:</strong> {posted} ({rate:.1}% response rate)</div>
<div class="stat"><strong>Average Rating:</strong> <span class="rating">{rating:.1} &#11088;</span></div>
<div class="stat"><strong>Average Sentiment:</strong> {sentiment} ({score:.2})</div>
<h3>Recent Reviews:</h3>
{listed}
<p style="margin-top: 30px;"><a href="{dashboard_url}">View Dashboard</a></p>
</div>
</div>
</body>
</html>"#,
        name = escape_html(greeting_name),
        total = stats.total_reviews,
        posted = stats.posted_replies,
        rate = stats.response_rate,
        rating = stats.average_rating,
        score = stats.average_sentiment,
    )
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::new_pending;
    use crate::store::MemoryStore;
    use crate::test_support::{active_account, FakeMailer};
    use chrono::TimeZone;

    const DASHBOARD: &str = "https://app.replyflow.example/dashboard";

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 9, 30, 0).unwrap()
    }

    async fn add_review(store: &MemoryStore, business: &str, id: &str, at: DateTime<Utc>) {
        store
            .insert_if_absent(new_pending(
                business,
                id.to_string(),
                format!("Review <{id}>"),
                4,
                0.5,
                at,
            ))
            .await
            .unwrap();
    }

    fn ctx<'a>(store: &'a MemoryStore, mailer: &'a FakeMailer) -> SummaryContext<'a> {
        SummaryContext {
            accounts: store,
            reviews: store,
            mailer,
            dashboard_url: DASHBOARD,
        }
    }

    #[test]
    fn window_is_previous_utc_day() {
        let (from, to) = yesterday_window(now());
        assert_eq!(from, Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn sends_one_email_per_active_account_with_reviews() {
        let store = MemoryStore::new();
        store.put_account(active_account("busy")).await;
        store.put_account(active_account("quiet")).await;
        let mut trial = active_account("trial");
        trial.plan = PlanState::Trial;
        store.put_account(trial).await;

        let yesterday = Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap();
        add_review(&store, "busy", "r1", yesterday).await;
        add_review(&store, "busy", "r2", yesterday).await;
        add_review(&store, "quiet", "old", yesterday - Duration::days(3)).await;
        add_review(&store, "trial", "r3", yesterday).await;
        let mailer = FakeMailer::new();

        let report = run(ctx(&store, &mailer), now()).await.unwrap();

        assert_eq!(
            report,
            SummaryReport {
                emails_sent: 1,
                total_users: 2
            }
        );
        let sent = mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "owner@busy.example");
        assert_eq!(sent[0].subject, "Daily Review Summary - 2 New Reviews");
        assert!(sent[0].text.contains("Replies Posted: 0 (0.0% response rate)"));
        assert!(sent[0].html.contains("Hi owner,"));
        assert!(sent[0].html.contains("Review &lt;r1&gt;"));
        assert!(sent[0].html.contains(DASHBOARD));
    }

    #[tokio::test]
    async fn mail_failure_is_isolated_per_account() {
        let store = MemoryStore::new();
        store.put_account(active_account("a")).await;
        store.put_account(active_account("b")).await;
        let yesterday = Utc.with_ymd_and_hms(2026, 3, 14, 8, 0, 0).unwrap();
        add_review(&store, "a", "r1", yesterday).await;
        add_review(&store, "b", "r2", yesterday).await;
        let mailer = FakeMailer::new().failing_for("owner@a.example");

        let report = run(ctx(&store, &mailer), now()).await.unwrap();

        assert_eq!(report.emails_sent, 1);
        assert_eq!(mailer.sent()[0].to, "owner@b.example");
    }

    #[test]
    fn lists_at_most_ten_reviews() {
        let account = active_account("biz");
        let reviews: Vec<Review> = (0..15)
            .map(|i| {
                new_pending(
                    "biz",
                    format!("r{i}"),
                    format!("text {i}"),
                    5,
                    0.1,
                    now() - Duration::minutes(i),
                )
            })
            .collect();

        let email = compose(&account, &reviews, DASHBOARD);

        assert_eq!(email.subject, "Daily Review Summary - 15 New Reviews");
        assert_eq!(email.html.matches(r#"<div class="review">"#).count(), 10);
        assert!(email.html.contains("text 0"));
        assert!(!email.html.contains("text 14"));
    }
}
