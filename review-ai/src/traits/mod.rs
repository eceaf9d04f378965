pub mod moderation;
pub mod reply;
