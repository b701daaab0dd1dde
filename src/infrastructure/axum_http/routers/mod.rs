pub mod auth;
pub mod billing;
pub mod discovery;
pub mod schedule;
pub mod voice;
