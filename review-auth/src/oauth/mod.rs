//! OAuth 2.0 authorization-code flow with offline refresh.

mod provider;

pub mod providers;
pub mod token;

pub use provider::{Provider, ProviderKind};
