//! PostgreSQL connector for the user store

mod config;
mod connector;

pub use config::PostgresConfig;
pub use connector::{connect_from_config_with_retry, connect_with_options};

pub use sea_orm::{ConnectOptions, DatabaseConnection, DbErr};
