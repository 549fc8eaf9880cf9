//! Stream definitions for the reservations domain.
//!
//! Both queues share one consumer group so any number of worker processes can
//! split the load.

use stream_worker::StreamDef;

/// Reservation confirmations.
pub struct ConfirmationQueue;

impl StreamDef for ConfirmationQueue {
    const STREAM_NAME: &'static str = "confirmation-queue";
    const CONSUMER_GROUP: &'static str = "email_workers";
    const DLQ_STREAM: &'static str = "confirmation-queue:dlq";
}

/// Reminders ahead of a reservation.
pub struct ReminderQueue;

impl StreamDef for ReminderQueue {
    const STREAM_NAME: &'static str = "reminder-queue";
    const CONSUMER_GROUP: &'static str = "email_workers";
    const DLQ_STREAM: &'static str = "reminder-queue:dlq";
}
