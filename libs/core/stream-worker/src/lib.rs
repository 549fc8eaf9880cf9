//! Stream Worker Framework
//!
//! Consumes a Redis stream through a consumer group and hands every entry to a
//! [`StreamProcessor`]. The processor's result alone decides what happens to the entry:
//!
//! - `Ok(())` → the entry is acknowledged (`XACK`)
//! - transient error → the entry stays pending and is redelivered after the
//!   visibility window, until `max_deliveries` is reached
//! - permanent error → the entry is copied to the dead-letter stream and acknowledged
//!
//! Broker-level failures never stop the loop; they are reported to an [`ErrorSink`].
//!
//! ## Example
//!
//! ```ignore
//! use stream_worker::{StreamConsumer, StreamDef, StreamWorker, WorkerConfig};
//!
//! struct ConfirmationStream;
//! impl StreamDef for ConfirmationStream {
//!     const STREAM_NAME: &'static str = "confirmation-queue";
//!     const CONSUMER_GROUP: &'static str = "email_workers";
//!     const DLQ_STREAM: &'static str = "confirmation-queue:dlq";
//! }
//!
//! let config = WorkerConfig::from_stream_def::<ConfirmationStream>().with_max_concurrent_jobs(4);
//! let stream = StreamConsumer::new(redis, config.clone());
//! let worker = StreamWorker::new(stream, processor, config);
//! worker.run(shutdown_rx).await;
//! ```

mod config;
mod consumer;
mod dlq;
mod error;
mod event;
mod memory;
pub mod metrics;
mod registry;
mod sink;
mod worker;

pub use config::WorkerConfig;
pub use consumer::{MessageStream, StreamConsumer};
pub use dlq::DeadLetter;
pub use error::{ErrorCategory, StreamError};
pub use event::StreamEvent;
pub use memory::InMemoryStream;
pub use metrics::StreamMetrics;
pub use registry::{MessageKey, StreamDef};
pub use sink::{ErrorSink, TracingErrorSink};
pub use worker::{Disposition, StreamProcessor, StreamWorker};
