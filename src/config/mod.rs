/// Database configuration and connection management
pub mod database;

/// Transfer protocol settings from transfer.toml
pub mod transfer;
