use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The backing store could not be queried; the lookup may succeed later.
    #[error("User directory unavailable: {0}")]
    Unavailable(String),

    /// The lookup did not finish within the configured time budget.
    #[error("User lookup timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl DirectoryError {
    /// Every directory failure is worth retrying; "not found" is not an error.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_display() {
        let err = DirectoryError::Unavailable("connection refused".into());
        assert_eq!(err.to_string(), "User directory unavailable: connection refused");
        assert!(err.is_retryable());

        let err = DirectoryError::Timeout(Duration::from_secs(5));
        assert_eq!(err.to_string(), "User lookup timed out after 5s");
    }
}
