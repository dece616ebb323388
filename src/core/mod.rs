//! Core transfer logic - framework-agnostic operations over a database connection.

pub mod health;
pub mod history;
pub mod listing;
pub mod migration;
pub mod snapshot;
pub mod tac;
pub mod transfer;
