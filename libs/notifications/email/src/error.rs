//! Delivery failures, split by whether a later attempt can succeed.

use std::time::Duration;
use thiserror::Error;

pub type DeliveryResult<T> = Result<T, DeliveryError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// Network, TLS, authentication, 4xx replies. Retry later.
    #[error("Transient delivery failure: {0}")]
    Transient(String),

    /// The SMTP exchange did not finish in time. Retry later.
    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),

    /// Invalid address or content rejected by the server. Retrying cannot help.
    #[error("Permanent delivery failure: {0}")]
    Permanent(String),
}

impl DeliveryError {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient(reason.into())
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self::Permanent(reason.into())
    }

    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Permanent(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(DeliveryError::transient("connection reset").is_retryable());
        assert!(DeliveryError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!DeliveryError::permanent("550 mailbox unavailable").is_retryable());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            DeliveryError::Timeout(Duration::from_secs(30)).to_string(),
            "Delivery timed out after 30s"
        );
        assert_eq!(
            DeliveryError::permanent("bad address").to_string(),
            "Permanent delivery failure: bad address"
        );
    }
}
