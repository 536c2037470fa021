//! Domain types and models

pub mod config;
pub mod record;

pub use config::ServerConfig;
pub use record::Record;
