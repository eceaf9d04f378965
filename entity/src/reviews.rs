//! SeaORM Entity for the reviews table.
//! Keyed by (business_id, review_id); the review id comes from the review provider.

use crate::review_status::ReviewStatus;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(schema_name = "replyflow", table_name = "reviews")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub business_id: Id,

    #[sea_orm(primary_key, auto_increment = false)]
    pub review_id: String,

    pub review_text: String,

    /// Star rating, 0 when the provider sent none
    pub rating: i32,

    /// Sentiment in [-1, 1]
    #[sea_orm(column_type = "Double")]
    pub sentiment_score: f64,

    pub generated_reply: Option<String>,

    pub posted: bool,

    pub posted_status: ReviewStatus,

    pub created_at: DateTimeWithTimeZone,

    pub posted_at: Option<DateTimeWithTimeZone>,

    /// Message from the most recent failed generate/post attempt
    pub last_error: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::business_accounts::Entity",
        from = "Column::BusinessId",
        to = "super::business_accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    BusinessAccounts,
}

impl Related<super::business_accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BusinessAccounts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
