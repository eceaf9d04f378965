pub use entity::{business_accounts, plan, review_status, reviews, Id};

pub mod business_account;
pub mod error;
pub mod mutate;
pub mod review;
