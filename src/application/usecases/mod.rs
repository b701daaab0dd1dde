pub mod billing;
pub mod connect;
pub mod scheduling;
pub mod voice;
