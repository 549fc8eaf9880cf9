//! Dead-letter entries
//!
//! An entry that cannot be processed is copied, payload untouched, to the
//! dead-letter stream together with the reason and its delivery history.

use crate::event::StreamEvent;
use crate::registry::MessageKey;
use chrono::{DateTime, SecondsFormat, Utc};

/// A dead-lettered entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// Original payload, verbatim
    pub payload: Vec<u8>,
    /// Why the entry was given up on
    pub error: String,
    /// ID of the entry in the source stream
    pub original_id: String,
    pub delivery_count: u32,
    pub failed_at: DateTime<Utc>,
}

impl DeadLetter {
    pub fn from_event(event: &StreamEvent, error: impl Into<String>) -> Self {
        Self {
            payload: event.payload.clone(),
            error: error.into(),
            original_id: event.stream_id.clone(),
            delivery_count: event.delivery_count,
            failed_at: Utc::now(),
        }
    }

    /// Metadata fields written next to the payload in the dead-letter stream.
    pub fn metadata_fields(&self) -> [(MessageKey, String); 4] {
        [
            (MessageKey::Error, self.error.clone()),
            (MessageKey::OriginalId, self.original_id.clone()),
            (MessageKey::DeliveryCount, self.delivery_count.to_string()),
            (
                MessageKey::FailedAt,
                self.failed_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ),
        ]
    }
}
