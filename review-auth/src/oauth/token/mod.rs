//! OAuth token types and at-rest encryption.

pub mod encryption;
mod tokens;

pub use tokens::{PlainTokens, RefreshResult, Tokens};
