//! Stripe webhook signature validation.
//!
//! The `Stripe-Signature` header has the form `t=<unix>,v1=<hex>[,v1=<hex>...]`
//! where each `v1` is HMAC-SHA256 over `"<t>.<body>"` keyed with the endpoint
//! secret.

use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use super::{header, WebhookValidator};
use crate::error::{webhook_error, Error, WebhookErrorKind};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Default allowed clock skew between signing and verification.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

pub struct StripeSignatureValidator {
    secret: String,
    tolerance_secs: i64,
}

struct ParsedSignature {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl StripeSignatureValidator {
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Validates against an explicit clock, in unix seconds.
    pub fn validate_at(
        &self,
        headers: &HashMap<String, String>,
        body: &[u8],
        now: i64,
    ) -> Result<bool, Error> {
        let value = header(headers, SIGNATURE_HEADER).ok_or_else(|| {
            webhook_error(
                WebhookErrorKind::MissingSignature,
                &format!("Missing signature header: {SIGNATURE_HEADER}"),
            )
        })?;

        let parsed = parse_header(value)?;

        let age = now.checked_sub(parsed.timestamp).map(i64::unsigned_abs);
        if !matches!(age, Some(age) if age <= self.tolerance_secs.unsigned_abs()) {
            warn!(
                "Rejecting webhook signed at {} (now {now})",
                parsed.timestamp
            );
            return Err(webhook_error(
                WebhookErrorKind::TimestampExpired,
                "Signature timestamp outside tolerance",
            ));
        }

        let mac = self.signed_payload_mac(parsed.timestamp, body)?;

        Ok(parsed
            .signatures
            .iter()
            .any(|signature| mac.clone().verify_slice(signature).is_ok()))
    }

    /// Builds a `Stripe-Signature` header value for `body`.
    pub fn sign(&self, body: &[u8], timestamp: i64) -> Result<String, Error> {
        let mac = self.signed_payload_mac(timestamp, body)?;
        Ok(format!(
            "t={timestamp},v1={}",
            hex::encode(mac.finalize().into_bytes())
        ))
    }

    fn signed_payload_mac(&self, timestamp: i64, body: &[u8]) -> Result<HmacSha256, Error> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| webhook_error(WebhookErrorKind::InvalidPayload, "Invalid HMAC key"))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(body);
        Ok(mac)
    }
}

impl WebhookValidator for StripeSignatureValidator {
    fn validate(&self, headers: &HashMap<String, String>, body: &[u8]) -> Result<bool, Error> {
        self.validate_at(headers, body, Utc::now().timestamp())
    }

    fn provider_id(&self) -> &str {
        "stripe"
    }
}

fn parse_header(value: &str) -> Result<ParsedSignature, Error> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in value.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = t.parse::<i64>().ok(),
            Some(("v1", sig)) => signatures.push(hex::decode(sig).map_err(|_| {
                webhook_error(WebhookErrorKind::InvalidSignature, "Invalid signature format")
            })?),
            _ => {}
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(ParsedSignature {
            timestamp,
            signatures,
        }),
        _ => Err(webhook_error(
            WebhookErrorKind::InvalidSignature,
            "Signature header needs t= and v1=",
        )),
    }
}
