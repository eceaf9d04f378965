pub mod business_accounts;
pub mod plan;
pub mod review_status;
pub mod reviews;

/// Business and review identifiers are assigned outside this system: business ids
/// by the client, review ids by the review provider.
pub type Id = String;
