//! # Database Module
//!
//! Account and refresh token persistence. PostgreSQL through tokio-postgres and
//! deadpool when a database is configured, an in-memory store otherwise.

pub mod connection;
pub mod memory;
pub mod migrations;
pub mod models;
pub mod postgres;
pub mod store;

pub use connection::{DatabaseConnection, DatabaseConfig};
pub use memory::MemoryStore;
pub use store::{AccountStore, AuthStore, StoreError};
