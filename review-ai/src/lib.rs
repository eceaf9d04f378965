//! Reply generation abstraction layer.
//!
//! Trait-based seams for drafting replies to customer reviews, screening them
//! through a moderation check and scoring review sentiment, plus the tone
//! settings that shape each reply. Provider implementations live with the
//! gateways that call them.

pub mod error;
pub mod moderated;
pub mod traits;
pub mod types;

pub use error::Error;
pub use moderated::ModeratedGenerator;
