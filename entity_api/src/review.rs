use super::error::Error;
use crate::mutate::{self, UpdateMap};
use entity::review_status::ReviewStatus;
use entity::reviews::{ActiveModel, Column, Entity, Model};
use log::{debug, warn};
use sea_orm::{
    entity::prelude::*, sea_query::OnConflict, ActiveValue::Set, DatabaseConnection, QueryOrder,
};

/// The only column that may still change once a review is posted.
const LAST_ERROR: &str = "last_error";

pub async fn find(
    db: &DatabaseConnection,
    business_id: &str,
    review_id: &str,
) -> Result<Option<Model>, Error> {
    Ok(
        Entity::find_by_id((business_id.to_string(), review_id.to_string()))
            .one(db)
            .await?,
    )
}

/// Inserts `model` unless a review with the same key already exists.
///
/// Returns `true` when a row was written.
pub async fn insert_if_absent(db: &DatabaseConnection, model: Model) -> Result<bool, Error> {
    if find(db, &model.business_id, &model.review_id).await?.is_some() {
        return Ok(false);
    }

    debug!(
        "Inserting review {} for business {}",
        model.review_id, model.business_id
    );

    let active_model = ActiveModel {
        business_id: Set(model.business_id),
        review_id: Set(model.review_id),
        review_text: Set(model.review_text),
        rating: Set(model.rating),
        sentiment_score: Set(model.sentiment_score),
        generated_reply: Set(model.generated_reply),
        posted_status: Set(ReviewStatus::from_posted(model.posted)),
        posted: Set(model.posted),
        created_at: Set(model.created_at),
        posted_at: Set(model.posted_at),
        last_error: Set(model.last_error),
    };

    let rows = Entity::insert(active_model)
        .on_conflict(
            OnConflict::columns([Column::BusinessId, Column::ReviewId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    Ok(rows > 0)
}

/// Reviews still waiting for a reply, selected through the `posted_status` index.
pub async fn find_pending(db: &DatabaseConnection) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::PostedStatus.eq(ReviewStatus::Pending))
        .all(db)
        .await?)
}

/// All reviews of a business, newest first.
pub async fn find_by_business(
    db: &DatabaseConnection,
    business_id: &str,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::BusinessId.eq(business_id))
        .order_by_desc(Column::CreatedAt)
        .all(db)
        .await?)
}

/// Reviews of a business created in `[from, to)`, newest first.
pub async fn find_by_business_created_between(
    db: &DatabaseConnection,
    business_id: &str,
    from: DateTimeWithTimeZone,
    to: DateTimeWithTimeZone,
) -> Result<Vec<Model>, Error> {
    Ok(Entity::find()
        .filter(Column::BusinessId.eq(business_id))
        .filter(Column::CreatedAt.gte(from))
        .filter(Column::CreatedAt.lt(to))
        .order_by_desc(Column::CreatedAt)
        .all(db)
        .await?)
}

/// Applies a partial update to one review.
///
/// A posted review only accepts clearing `last_error`; any other change is
/// rejected with `ValidationError`.
pub async fn update(
    db: &DatabaseConnection,
    business_id: &str,
    review_id: &str,
    update_map: UpdateMap,
) -> Result<Model, Error> {
    let existing = find(db, business_id, review_id)
        .await?
        .ok_or_else(Error::not_found)?;

    if existing.posted && !only_clears_last_error(&update_map) {
        warn!("Rejected update of posted review {review_id} for business {business_id}");
        return Err(Error::validation());
    }

    mutate::update::<ActiveModel, Column>(db, existing.into(), update_map).await
}

fn only_clears_last_error(update_map: &UpdateMap) -> bool {
    update_map.keys().all(|key| key == LAST_ERROR)
        && matches!(
            update_map.get(LAST_ERROR),
            None | Some(Value::String(None))
        )
}
