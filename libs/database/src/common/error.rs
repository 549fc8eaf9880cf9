/// Error type returned by the connectors in this crate
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// Connection could not be established within the retry budget
    #[error("Connection to {target} failed after {attempts} attempts: {reason}")]
    ConnectionFailed {
        target: &'static str,
        attempts: u32,
        reason: String,
    },
}

/// Result type alias for connector operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;
