//! Metrics for stream workers
//!
//! Emitted through the `metrics` facade. Nothing is recorded unless the host
//! installs a recorder.

use metrics::{counter, histogram};
use std::time::Duration;

/// Stream worker metrics helper
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    stream_name: String,
    processor_name: String,
}

impl StreamMetrics {
    pub fn new(stream_name: impl Into<String>, processor_name: impl Into<String>) -> Self {
        Self {
            stream_name: stream_name.into(),
            processor_name: processor_name.into(),
        }
    }

    /// Record a job completed and acknowledged
    pub fn job_completed(&self, duration: Duration) {
        self.job_status("success");

        histogram!(
            "stream_worker_job_duration_seconds",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone()
        )
        .record(duration.as_secs_f64());
    }

    /// Record a job left pending for redelivery
    pub fn job_left_for_redelivery(&self) {
        self.job_status("redelivery");
    }

    /// Record a job moved to the dead-letter stream
    pub fn job_dead_lettered(&self) {
        self.job_status("dead_letter");
    }

    /// Record a handler that panicked
    pub fn job_panicked(&self) {
        self.job_status("panicked");
    }

    pub fn broker_error(&self) {
        counter!(
            "stream_worker_broker_errors_total",
            "stream" => self.stream_name.clone()
        )
        .increment(1);
    }

    /// Record idle entries taken over from the pending list
    pub fn messages_claimed(&self, count: usize) {
        counter!(
            "stream_worker_messages_claimed_total",
            "stream" => self.stream_name.clone()
        )
        .increment(count as u64);
    }

    fn job_status(&self, status: &'static str) {
        counter!(
            "stream_worker_jobs_processed_total",
            "stream" => self.stream_name.clone(),
            "processor" => self.processor_name.clone(),
            "status" => status
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let metrics = StreamMetrics::new("confirmation-queue", "reservation_mail");
        metrics.job_completed(Duration::from_millis(12));
        metrics.job_left_for_redelivery();
        metrics.job_dead_lettered();
        metrics.job_panicked();
        metrics.broker_error();
        metrics.messages_claimed(3);
    }
}
