//! SeaORM Entity for the business_accounts table.
//! One row per tenant, holding billing state, encrypted Google credentials and
//! reply tone settings.

use crate::plan::PlanState;
use crate::Id;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(schema_name = "replyflow", table_name = "business_accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Id,

    pub email: String,

    pub plan: PlanState,

    /// Billing provider subscription backing an active plan
    pub subscription_id: Option<String>,

    /// AES-256-GCM encrypted JSON token bundle, never serialized out
    #[serde(skip_serializing)]
    pub google_tokens: Option<String>,

    /// Reply tone settings as JSON
    pub tone: Option<Json>,

    /// External account reference used when listing reviews
    pub account_ref: Option<String>,

    /// External location whose reviews are ingested and answered
    pub location_id: Option<String>,

    #[serde(skip_deserializing)]
    pub created_at: DateTimeWithTimeZone,

    #[serde(skip_deserializing)]
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reviews::Entity")]
    Reviews,
}

impl Related<super::reviews::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reviews.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
