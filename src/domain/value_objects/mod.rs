pub mod account_model;
pub mod discovery_model;
pub mod enums;
pub mod scheduling_model;
pub mod subscription_model;
pub mod voice;
