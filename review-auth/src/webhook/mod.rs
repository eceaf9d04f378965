//! Webhook signature validation.

mod stripe;

pub use stripe::StripeSignatureValidator;

use std::collections::HashMap;

use crate::error::Error;

/// Trait for validating webhook signatures.
pub trait WebhookValidator: Send + Sync {
    /// Validate a webhook request.
    ///
    /// Returns `Ok(false)` for a well-formed signature that does not match, and
    /// an error when the signature is missing, malformed or stale.
    fn validate(&self, headers: &HashMap<String, String>, body: &[u8]) -> Result<bool, Error>;

    fn provider_id(&self) -> &str;
}

/// Case-insensitive header lookup.
pub(crate) fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
