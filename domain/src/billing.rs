//! Billing sync: verifies payment-processor webhooks and maps subscription
//! events onto account plans.

use entity::plan::PlanState;
use log::*;
use review_auth::webhook::WebhookValidator;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use crate::account::Account;
use crate::error::{DomainErrorKind, Error, InternalErrorKind};
use crate::job::JobResponse;
use crate::store::AccountStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum BillingOutcome {
    #[serde(rename_all = "camelCase")]
    PlanChanged { business_id: String, plan: PlanState },
    #[serde(rename_all = "camelCase")]
    Ignored { event_type: String },
}

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct CheckoutSession {
    #[serde(default)]
    metadata: HashMap<String, String>,
    subscription: Option<String>,
    customer_details: Option<CustomerDetails>,
    customer_email: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    id: String,
    status: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

const USER_ID_KEY: &str = "userId";

/// Plan for a subscription status; `None` leaves the plan alone.
fn plan_for_status(status: &str) -> Option<PlanState> {
    match status {
        "active" | "trialing" => Some(PlanState::Active),
        "canceled" | "unpaid" | "incomplete_expired" => Some(PlanState::Inactive),
        _ => None,
    }
}

pub async fn handle_webhook(
    accounts: &dyn AccountStore,
    validator: &dyn WebhookValidator,
    headers: &HashMap<String, String>,
    body: &[u8],
) -> Result<BillingOutcome, Error> {
    if !validator.validate(headers, body)? {
        warn!("Rejected {} webhook with bad signature", validator.provider_id());
        return Err(Error::validation("webhook signature does not match"));
    }

    let event: Event = serde_json::from_slice(body)?;
    debug!("Received billing event {}", event.event_type);

    let ignored = || BillingOutcome::Ignored {
        event_type: event.event_type.clone(),
    };

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSession = serde_json::from_value(event.data.object)?;
            let Some(business_id) = session.metadata.get(USER_ID_KEY) else {
                warn!("Checkout session without {USER_ID_KEY} metadata");
                return Ok(ignored());
            };
            let email = session
                .customer_details
                .and_then(|details| details.email)
                .or(session.customer_email)
                .unwrap_or_default();

            accounts.create_if_absent(business_id, &email).await?;
            accounts
                .set_plan(business_id, PlanState::Active, session.subscription)
                .await?;
            Ok(plan_changed(business_id, PlanState::Active))
        }
        "customer.subscription.created" | "customer.subscription.updated" => {
            let subscription: Subscription = serde_json::from_value(event.data.object)?;
            let Some(plan) = plan_for_status(&subscription.status) else {
                info!(
                    "Subscription {} has status {}, plan unchanged",
                    subscription.id, subscription.status
                );
                return Ok(ignored());
            };
            apply_subscription_plan(accounts, &subscription, plan)
                .await
                .map(|outcome| outcome.unwrap_or_else(ignored))
        }
        "customer.subscription.deleted" => {
            let subscription: Subscription = serde_json::from_value(event.data.object)?;
            apply_subscription_plan(accounts, &subscription, PlanState::Inactive)
                .await
                .map(|outcome| outcome.unwrap_or_else(ignored))
        }
        "invoice.payment_succeeded" | "invoice.payment_failed" => {
            info!("Billing event {} recorded, no plan change", event.event_type);
            Ok(ignored())
        }
        other => {
            debug!("Unhandled billing event type {other}");
            Ok(ignored())
        }
    }
}

/// Webhook entry point: `400` for rejected payloads, `500` for store failures.
pub async fn handle(
    accounts: &dyn AccountStore,
    validator: &dyn WebhookValidator,
    headers: &HashMap<String, String>,
    body: &[u8],
) -> JobResponse {
    match handle_webhook(accounts, validator, headers, body).await {
        Ok(outcome) => JobResponse {
            status_code: 200,
            body: json!({ "received": true, "result": outcome }),
        },
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

async fn apply_subscription_plan(
    accounts: &dyn AccountStore,
    subscription: &Subscription,
    plan: PlanState,
) -> Result<Option<BillingOutcome>, Error> {
    let Some(account) = find_subscriber(accounts, subscription).await? else {
        warn!("No account for subscription {}", subscription.id);
        return Ok(None);
    };

    accounts
        .set_plan(&account.id, plan, Some(subscription.id.clone()))
        .await?;
    Ok(Some(plan_changed(&account.id, plan)))
}

async fn find_subscriber(
    accounts: &dyn AccountStore,
    subscription: &Subscription,
) -> Result<Option<Account>, Error> {
    if let Some(account) = accounts.find_by_subscription(&subscription.id).await? {
        return Ok(Some(account));
    }
    match subscription.metadata.get(USER_ID_KEY) {
        Some(business_id) => accounts.find_account(business_id).await,
        None => Ok(None),
    }
}

fn plan_changed(business_id: &str, plan: PlanState) -> BillingOutcome {
    info!("Business {business_id} moved to plan {plan}");
    BillingOutcome::PlanChanged {
        business_id: business_id.to_string(),
        plan,
    }
}
