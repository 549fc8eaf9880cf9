//! Broker error reporting
//!
//! Failures talking to the broker (reads, acks, dead-lettering, group setup) never
//! stop a worker. They are handed to an [`ErrorSink`] and the loop carries on.

use crate::error::StreamError;
use crate::metrics::StreamMetrics;
use tracing::{error, warn};

/// Receives broker-level errors observed by a worker.
pub trait ErrorSink: Send + Sync {
    fn record(&self, stream: &str, error: &StreamError);
}

/// Logs each error and bumps `stream_worker_broker_errors_total`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn record(&self, stream: &str, err: &StreamError) {
        StreamMetrics::new(stream, "broker").broker_error();

        if err.is_connection_error() {
            warn!(
                stream = %stream,
                error = %err,
                category = err.category().as_str(),
                "Lost connection to broker"
            );
        } else {
            error!(
                stream = %stream,
                error = %err,
                category = err.category().as_str(),
                "Broker error"
            );
        }
    }
}
