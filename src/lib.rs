pub mod ai;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod payments;
pub mod security;
pub mod worker;
pub mod x_api;
