//! Stream event wrapper
//!
//! An entry as delivered by the broker: raw payload bytes plus stream metadata.
//! Decoding the payload is the processor's job.

use chrono::{DateTime, Utc};

/// A delivered stream entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEvent {
    /// Redis stream entry ID (e.g., "1234567890123-0")
    pub stream_id: String,

    /// Raw `job` field of the entry. Empty when the field was missing.
    pub payload: Vec<u8>,

    /// When the entry was appended (parsed from stream ID)
    pub timestamp: DateTime<Utc>,

    /// Number of times this entry has been delivered, this delivery included
    pub delivery_count: u32,
}

impl StreamEvent {
    /// First delivery of an entry
    pub fn new(stream_id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self::with_delivery_count(stream_id, payload, 1)
    }

    pub fn with_delivery_count(
        stream_id: impl Into<String>,
        payload: impl Into<Vec<u8>>,
        delivery_count: u32,
    ) -> Self {
        let stream_id = stream_id.into();
        let timestamp = Self::parse_timestamp(&stream_id);
        Self {
            stream_id,
            payload: payload.into(),
            timestamp,
            delivery_count,
        }
    }

    /// Parse timestamp from Redis stream ID
    ///
    /// Stream IDs are in format "timestamp_ms-sequence"
    fn parse_timestamp(stream_id: &str) -> DateTime<Utc> {
        stream_id
            .split('-')
            .next()
            .and_then(|ts| ts.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now)
    }

    /// Payload as text, lossy for invalid UTF-8. For logs.
    pub fn payload_lossy(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_count > 1
    }
}
