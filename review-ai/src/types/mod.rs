pub mod reply;
pub mod tone;
