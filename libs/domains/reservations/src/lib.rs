//! Reservations Domain
//!
//! Turns reservation events published on the confirmation and reminder
//! queues into emails for the affected user.
//!
//! # Architecture
//!
//! ```text
//! confirmation-queue ─┐                      ┌─ UserDirectory
//!                     ├─ StreamWorker ─ ReservationMailProcessor ─ EmailComposer
//! reminder-queue ─────┘   (one per queue)    └─ MailTransport
//! ```
//!
//! The queue a message arrived on decides its [`EventKind`]; everything after
//! decoding is shared between both kinds.
//!
//! # Usage
//!
//! ```rust,ignore
//! use domain_reservations::{
//!     ConfirmationQueue, EmailComposer, EventKind, ReservationMailProcessor,
//! };
//! use stream_worker::{StreamWorker, WorkerConfig};
//!
//! let processor = ReservationMailProcessor::new(
//!     EventKind::Confirmation,
//!     directory.clone(),
//!     transport.clone(),
//!     composer.clone(),
//! );
//! let config = WorkerConfig::from_stream_def::<ConfirmationQueue>();
//! let worker = StreamWorker::new(consumer, processor, config);
//! worker.run(shutdown_rx).await;
//! ```

pub mod composer;
pub mod error;
pub mod event;
pub mod kind;
pub mod processor;
pub mod streams;

pub use composer::EmailComposer;
pub use error::{DecodeError, ProcessingError};
pub use event::{ReservationEvent, decode};
pub use kind::EventKind;
pub use processor::{Outcome, ReservationMailProcessor};
pub use streams::{ConfirmationQueue, ReminderQueue};
