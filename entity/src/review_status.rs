use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Indexed mirror of `reviews.posted`, kept so pending reviews can be selected
/// without a full scan.
#[derive(
    Debug, Clone, Copy, Eq, PartialEq, EnumIter, Deserialize, Default, Serialize, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "review_status")]
pub enum ReviewStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "posted")]
    Posted,
}

impl ReviewStatus {
    pub fn from_posted(posted: bool) -> Self {
        if posted {
            ReviewStatus::Posted
        } else {
            ReviewStatus::Pending
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewStatus::Pending => write!(fmt, "pending"),
            ReviewStatus::Posted => write!(fmt, "posted"),
        }
    }
}
