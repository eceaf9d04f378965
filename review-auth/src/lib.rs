//! # review-auth
//!
//! Authentication plumbing for the review provider and the billing provider:
//! - OAuth 2.0 provider trait and the Google Business Profile implementation
//! - Token types, expiry checks and AES-256-GCM encryption at rest
//! - HTTP client building with retry middleware
//! - Webhook signature validation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use review_auth::{
//!     http::AuthenticatedClientBuilder,
//!     oauth::{providers::google, Provider},
//!     webhook::{StripeSignatureValidator, WebhookValidator},
//! };
//! ```

pub mod error;
pub mod http;
pub mod oauth;
pub mod webhook;

pub use error::{Error, ErrorKind};
