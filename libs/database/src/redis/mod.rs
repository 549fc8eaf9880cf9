//! Redis connector for the stream broker

mod config;
mod connector;

pub use config::RedisConfig;
pub use connector::{connect, connect_from_config_with_retry};

pub use redis::aio::ConnectionManager;
