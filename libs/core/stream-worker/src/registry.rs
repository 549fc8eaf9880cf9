//! Stream registry types and definitions.
//!
//! This module provides:
//! - `StreamDef` trait for domain-specific stream definitions
//! - `MessageKey` enum for the field names used in stream entries

use strum::{AsRefStr, Display, EnumString};

/// Field names used in stream entries and dead-letter entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MessageKey {
    /// The event payload (JSON text, kept verbatim).
    Job,
    /// Why the entry was dead-lettered.
    Error,
    /// ID of the entry in the source stream.
    OriginalId,
    /// Deliveries made before giving up.
    DeliveryCount,
    /// RFC 3339 time of dead-lettering.
    FailedAt,
}

/// Stream definition trait.
///
/// Each domain implements this trait to define its stream configuration.
///
/// # Example
///
/// ```rust,ignore
/// use stream_worker::StreamDef;
///
/// pub struct ReminderQueue;
///
/// impl StreamDef for ReminderQueue {
///     const STREAM_NAME: &'static str = "reminder-queue";
///     const CONSUMER_GROUP: &'static str = "email_workers";
///     const DLQ_STREAM: &'static str = "reminder-queue:dlq";
/// }
/// ```
pub trait StreamDef: Send + Sync {
    /// The Redis stream name.
    const STREAM_NAME: &'static str;

    /// The consumer group name for this stream.
    const CONSUMER_GROUP: &'static str;

    /// The dead letter stream name for failed entries.
    const DLQ_STREAM: &'static str;

    /// Approximate MAXLEN of the dead letter stream.
    const DLQ_MAX_LENGTH: i64 = 10_000;

    fn stream_name() -> &'static str {
        Self::STREAM_NAME
    }

    fn consumer_group() -> &'static str {
        Self::CONSUMER_GROUP
    }

    fn dlq_stream() -> &'static str {
        Self::DLQ_STREAM
    }
}
