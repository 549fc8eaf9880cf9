//! Read-only user directory
//!
//! Resolves the delivery identity (first name, email) of a user by id.
//! "Not found" is an ordinary outcome (`Ok(None)`); an unreachable store is
//! [`DirectoryError::Unavailable`] so callers can retry.

mod directory;
mod error;
mod models;
#[cfg(feature = "postgres")]
mod postgres;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use directory::{InMemoryUserDirectory, UserDirectory};
pub use error::{DirectoryError, DirectoryResult};
pub use models::{User, UserId};
#[cfg(feature = "postgres")]
pub use postgres::PostgresUserDirectory;
