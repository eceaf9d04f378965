use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Billing state of a business account. Only `Active` accounts are worked by the
/// review jobs.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Default, Serialize, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "plan_state")]
pub enum PlanState {
    #[sea_orm(string_value = "trial")]
    #[default]
    Trial,
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

impl std::fmt::Display for PlanState {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanState::Trial => write!(fmt, "trial"),
            PlanState::Active => write!(fmt, "active"),
            PlanState::Inactive => write!(fmt, "inactive"),
        }
    }
}
