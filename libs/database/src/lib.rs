//! Connectors for the stores the email worker talks to.
//!
//! - `postgres` (default): read-side user store via SeaORM
//! - `redis` (default): the Redis Streams broker connection
//! - `config`: `core_config::FromEnv` implementations for the configs
//!
//! ```ignore
//! use database::{postgres, redis};
//!
//! let db = postgres::connect_from_config_with_retry(pg_config, None).await?;
//! let broker = redis::connect_from_config_with_retry(redis_config, None).await?;
//! ```

pub mod common;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "redis")]
pub mod redis;

pub use common::{DatabaseError, DatabaseResult};
