use super::error::Error;
use entity::business_accounts::{ActiveModel, Column, Entity, Model};
use entity::plan::PlanState;
use entity::Id;
use log::debug;
use sea_orm::{entity::prelude::*, ActiveValue::Set, DatabaseConnection, TryIntoModel};

/// Creates a business account on the trial plan.
pub async fn create(db: &DatabaseConnection, id: Id, email: String) -> Result<Model, Error> {
    debug!("Creating business account: {id}");

    let now = chrono::Utc::now();

    let active_model = ActiveModel {
        id: Set(id),
        email: Set(email),
        plan: Set(PlanState::Trial),
        subscription_id: Set(None),
        google_tokens: Set(None),
        tone: Set(None),
        account_ref: Set(None),
        location_id: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    };

    Ok(active_model.insert(db).await?.try_into_model()?)
}

/// Returns the existing account for `id`, creating a trial account when there is none.
pub async fn create_if_absent(
    db: &DatabaseConnection,
    id: Id,
    email: String,
) -> Result<Model, Error> {
    match find_by_id(db, &id).await? {
        Some(existing) => Ok(existing),
        None => create(db, id, email).await,
    }
}

pub async fn find_by_id(db: &DatabaseConnection, id: &str) -> Result<Option<Model>, Error> {
    Ok(Entity::find_by_id(id.to_string()).one(db).await?)
}

/// Accounts on the active plan that hold a credential bundle.
pub async fn find_eligible(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::Plan.eq(PlanState::Active))
        .filter(Column::GoogleTokens.is_not_null())
        .all(db)
        .await?)
}

pub async fn find_by_plan(db: &DatabaseConnection, plan: PlanState) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::Plan.eq(plan))
        .all(db)
        .await?)
}

pub async fn find_by_subscription_id(
    db: &DatabaseConnection,
    subscription_id: &str,
) -> Result<Option<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::SubscriptionId.eq(subscription_id))
        .one(db)
        .await?)
}

/// Replaces the encrypted credential bundle. `None` disconnects the account.
pub async fn update_tokens(
    db: &DatabaseConnection,
    id: &str,
    google_tokens: Option<String>,
) -> Result<Model, Error> {
    let mut active_model: ActiveModel = find_existing(db, id).await?.into();

    debug!("Updating credential bundle for business account: {id}");

    active_model.google_tokens = Set(google_tokens);
    active_model.updated_at = Set(chrono::Utc::now().into());

    Ok(active_model.update(db).await?.try_into_model()?)
}

/// Sets the plan, and the subscription id when one is given.
pub async fn update_plan(
    db: &DatabaseConnection,
    id: &str,
    plan: PlanState,
    subscription_id: Option<String>,
) -> Result<Model, Error> {
    let mut active_model: ActiveModel = find_existing(db, id).await?.into();

    debug!("Updating plan for business account {id} to {plan}");

    active_model.plan = Set(plan);
    if subscription_id.is_some() {
        active_model.subscription_id = Set(subscription_id);
    }
    active_model.updated_at = Set(chrono::Utc::now().into());

    Ok(active_model.update(db).await?.try_into_model()?)
}

pub async fn update_tone(db: &DatabaseConnection, id: &str, tone: Json) -> Result<Model, Error> {
    let mut active_model: ActiveModel = find_existing(db, id).await?.into();

    active_model.tone = Set(Some(tone));
    active_model.updated_at = Set(chrono::Utc::now().into());

    Ok(active_model.update(db).await?.try_into_model()?)
}

pub async fn update_location(
    db: &DatabaseConnection,
    id: &str,
    account_ref: Option<String>,
    location_id: String,
) -> Result<Model, Error> {
    let mut active_model: ActiveModel = find_existing(db, id).await?.into();

    active_model.account_ref = Set(account_ref);
    active_model.location_id = Set(Some(location_id));
    active_model.updated_at = Set(chrono::Utc::now().into());

    Ok(active_model.update(db).await?.try_into_model()?)
}

async fn find_existing(db: &DatabaseConnection, id: &str) -> Result<Model, Error> {
    find_by_id(db, id).await?.ok_or_else(Error::not_found)
}
