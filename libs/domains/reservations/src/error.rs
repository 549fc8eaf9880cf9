use chrono::{DateTime, FixedOffset};
use domain_users::DirectoryError;
use email::DeliveryError;
use stream_worker::{ErrorCategory, StreamError};
use thiserror::Error;

/// A queue payload that cannot become a [`crate::ReservationEvent`]
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Empty payload")]
    Empty,

    #[error("Malformed reservation event: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Reservation ends ({end}) before it starts ({start})")]
    InvalidTimeRange {
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    },
}

/// Why a reservation event could not be turned into a delivered email
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Lookup(#[from] DirectoryError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl ProcessingError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ProcessingError::Decode(_) => ErrorCategory::Permanent,
            ProcessingError::Lookup(e) if e.is_retryable() => ErrorCategory::Transient,
            ProcessingError::Lookup(_) => ErrorCategory::Permanent,
            ProcessingError::Delivery(e) if e.is_retryable() => ErrorCategory::Transient,
            ProcessingError::Delivery(_) => ErrorCategory::Permanent,
        }
    }
}

impl From<ProcessingError> for StreamError {
    fn from(e: ProcessingError) -> Self {
        StreamError::Processing {
            category: e.category(),
            message: e.to_string(),
        }
    }
}
