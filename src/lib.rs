// Library entry shared by the binary and the integration tests

pub mod config;
pub mod downloads;
pub mod events;
pub mod library;
pub mod models;
pub mod services;
pub mod source;
pub mod utils;
pub mod workers;
