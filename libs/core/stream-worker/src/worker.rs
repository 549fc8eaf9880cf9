//! Core worker trait and the generic StreamWorker implementation.
//!
//! This module provides:
//! - `StreamProcessor` trait for message handlers
//! - `Disposition`, the completion decision derived from a handler result
//! - `StreamWorker` struct for running the worker loop

use crate::config::WorkerConfig;
use crate::consumer::MessageStream;
use crate::error::StreamError;
use crate::event::StreamEvent;
use crate::metrics::StreamMetrics;
use crate::sink::{ErrorSink, TracingErrorSink};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::{self, JoinError, JoinSet};
use tracing::{debug, error, info, warn};

const MAX_BACKOFF_SECS: u64 = 30;

/// Trait for message handlers.
///
/// The returned result is the only thing the worker looks at:
/// `Ok(())` completes the message, a transient error leaves it for redelivery,
/// a permanent error dead-letters it.
///
/// # Example
///
/// ```rust,ignore
/// use stream_worker::{StreamEvent, StreamError, StreamProcessor};
///
/// struct AuditProcessor;
///
/// #[async_trait]
/// impl StreamProcessor for AuditProcessor {
///     async fn process(&self, event: &StreamEvent) -> Result<(), StreamError> {
///         let entry: AuditEntry = serde_json::from_slice(&event.payload)
///             .map_err(|e| StreamError::permanent(e.to_string()))?;
///         store(entry).await.map_err(|e| StreamError::transient(e.to_string()))
///     }
///
///     fn name(&self) -> &'static str {
///         "audit"
///     }
/// }
/// ```
#[async_trait]
pub trait StreamProcessor: Send + Sync {
    async fn process(&self, event: &StreamEvent) -> Result<(), StreamError>;

    /// Get the processor name for logging and metrics labels.
    fn name(&self) -> &'static str;
}

/// What happens to a message once its handler returned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Acknowledge; never delivered again
    Complete,
    /// Do not acknowledge; the broker redelivers after the idle window
    LeaveForRedelivery { reason: String },
    /// Copy to the dead-letter stream, then acknowledge
    DeadLetter { reason: String },
}

impl Disposition {
    /// Derive the decision from a handler result.
    ///
    /// A transient failure on the `max_deliveries`-th delivery is dead-lettered.
    pub fn decide(
        outcome: &Result<(), StreamError>,
        delivery_count: u32,
        max_deliveries: u32,
    ) -> Self {
        match outcome {
            Ok(()) => Disposition::Complete,
            Err(e) if !e.category().is_retryable() => Disposition::DeadLetter {
                reason: e.to_string(),
            },
            Err(e) if delivery_count >= max_deliveries => Disposition::DeadLetter {
                reason: format!("{e} (giving up after {delivery_count} deliveries)"),
            },
            Err(e) => Disposition::LeaveForRedelivery {
                reason: e.to_string(),
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Disposition::Complete)
    }
}

/// State shared between the loop and spawned handler tasks
struct Shared<S, P> {
    stream: Arc<S>,
    processor: Arc<P>,
    error_sink: Arc<dyn ErrorSink>,
    metrics: StreamMetrics,
    max_deliveries: u32,
}

/// Generic stream worker that hands messages to a processor.
///
/// - Up to `max_concurrent_jobs` handlers run at once; the loop stops reading
///   while all slots are taken
/// - Idle pending entries are reclaimed every `claim_interval()`, skipping the
///   ones this worker is still processing
/// - Broker errors go to the [`ErrorSink`] and the loop backs off (1s doubling to 30s)
/// - A handler that panics leaves its message pending
/// - On shutdown no new messages are taken; running handlers get
///   `shutdown_grace_ms` to finish before they are aborted
pub struct StreamWorker<S, P> {
    shared: Arc<Shared<S, P>>,
    config: WorkerConfig,
}

impl<S, P> StreamWorker<S, P>
where
    S: MessageStream,
    P: StreamProcessor + 'static,
{
    pub fn new(stream: S, processor: P, config: WorkerConfig) -> Self {
        Self::with_shared(Arc::new(stream), Arc::new(processor), config)
    }

    /// Create a worker over a stream and processor owned elsewhere.
    pub fn with_shared(stream: Arc<S>, processor: Arc<P>, config: WorkerConfig) -> Self {
        let metrics = StreamMetrics::new(stream.stream_name(), processor.name());
        Self {
            shared: Arc::new(Shared {
                stream,
                processor,
                error_sink: Arc::new(TracingErrorSink),
                metrics,
                max_deliveries: config.max_deliveries,
            }),
            config,
        }
    }

    /// Replace the default [`TracingErrorSink`].
    ///
    /// Must be called before the worker is shared or run.
    pub fn with_error_sink(mut self, sink: Arc<dyn ErrorSink>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.error_sink = sink,
            None => warn!("Worker already shared, keeping existing error sink"),
        }
        self
    }

    /// Run the worker loop until `shutdown` turns `true` (or its sender is dropped).
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let stream_name = self.shared.stream.stream_name().to_string();

        info!(
            consumer_id = %self.config.consumer_id,
            stream = %stream_name,
            group = %self.config.consumer_group,
            processor = %self.shared.processor.name(),
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            max_deliveries = self.config.max_deliveries,
            blocking = self.config.blocking_timeout_ms.is_some(),
            "Starting stream worker"
        );

        if !self.ensure_group(&mut shutdown).await {
            info!(stream = %stream_name, "Shutdown requested before consumer group was ready");
            return;
        }

        let claim_interval = self.config.claim_interval();
        let mut tasks: JoinSet<()> = JoinSet::new();
        let mut in_flight: HashMap<task::Id, String> = HashMap::new();
        let mut last_claim: Option<Instant> = None;
        let mut consecutive_errors: u32 = 0;
        let mut stopping = false;

        loop {
            if stopping || *shutdown.borrow() {
                info!(stream = %stream_name, "Received shutdown signal, stopping intake");
                break;
            }

            while let Some(joined) = tasks.try_join_next_with_id() {
                self.on_joined(joined, &mut in_flight);
            }

            let capacity = self.config.max_concurrent_jobs.saturating_sub(in_flight.len());
            if capacity == 0 {
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown) => stopping = true,
                    Some(joined) = tasks.join_next_with_id() => {
                        self.on_joined(joined, &mut in_flight);
                    }
                }
                continue;
            }

            let claim_due = last_claim.is_none_or(|at| at.elapsed() >= claim_interval);
            let exclude: HashSet<String> = in_flight.values().cloned().collect();
            let wanted = capacity.min(self.config.batch_size);

            let fetched = self.fetch(wanted, claim_due, &exclude).await;
            if claim_due {
                last_claim = Some(Instant::now());
            }

            match fetched {
                Ok(events) => {
                    if consecutive_errors > 0 {
                        info!(
                            stream = %stream_name,
                            consecutive_errors,
                            "Broker connection recovered"
                        );
                        consecutive_errors = 0;
                    }

                    if events.is_empty() {
                        if self.config.blocking_timeout_ms.is_some() {
                            continue;
                        }
                        tokio::select! {
                            _ = shutdown_requested(&mut shutdown) => stopping = true,
                            _ = tokio::time::sleep(self.config.poll_interval()) => {}
                            Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                                self.on_joined(joined, &mut in_flight);
                            }
                        }
                        continue;
                    }

                    for event in events {
                        let stream_id = event.stream_id.clone();
                        let shared = Arc::clone(&self.shared);
                        let handle = tasks.spawn(async move { shared.handle(event).await });
                        in_flight.insert(handle.id(), stream_id);
                    }
                }
                Err(e) => {
                    consecutive_errors += 1;
                    self.shared.error_sink.record(&stream_name, &e);

                    let backoff = backoff_delay(consecutive_errors);
                    debug!(
                        stream = %stream_name,
                        consecutive_errors,
                        backoff_ms = backoff.as_millis() as u64,
                        "Backing off after broker error"
                    );
                    tokio::select! {
                        _ = shutdown_requested(&mut shutdown) => stopping = true,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        }

        self.drain(&mut tasks, &mut in_flight).await;
        info!(stream = %stream_name, "Stream worker stopped");
    }

    /// Create the consumer group, retrying with backoff. Returns false on shutdown.
    async fn ensure_group(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let mut attempt: u32 = 0;
        loop {
            match self.shared.stream.ensure_group().await {
                Ok(()) => return true,
                Err(e) => {
                    attempt += 1;
                    self.shared.error_sink.record(self.shared.stream.stream_name(), &e);
                    tokio::select! {
                        _ = shutdown_requested(shutdown) => return false,
                        _ = tokio::time::sleep(backoff_delay(attempt)) => {}
                    }
                }
            }
        }
    }

    /// Reclaim idle entries when due, otherwise (or when none) read new ones.
    async fn fetch(
        &self,
        wanted: usize,
        claim_due: bool,
        exclude: &HashSet<String>,
    ) -> Result<Vec<StreamEvent>, StreamError> {
        if claim_due {
            let claimed = self.shared.stream.claim_idle(wanted, exclude).await?;
            if !claimed.is_empty() {
                self.shared.metrics.messages_claimed(claimed.len());
                return Ok(claimed);
            }
        }
        self.shared.stream.read_new(wanted).await
    }

    fn on_joined(
        &self,
        joined: Result<(task::Id, ()), JoinError>,
        in_flight: &mut HashMap<task::Id, String>,
    ) {
        match joined {
            Ok((id, ())) => {
                in_flight.remove(&id);
            }
            Err(err) => {
                let stream_id = in_flight.remove(&err.id()).unwrap_or_default();
                if err.is_panic() {
                    self.shared.metrics.job_panicked();
                    error!(
                        stream = %self.shared.stream.stream_name(),
                        stream_id = %stream_id,
                        "Handler panicked, message left for redelivery"
                    );
                } else {
                    debug!(stream_id = %stream_id, "Handler aborted, message left for redelivery");
                }
            }
        }
    }

    async fn drain(
        &self,
        tasks: &mut JoinSet<()>,
        in_flight: &mut HashMap<task::Id, String>,
    ) {
        if tasks.is_empty() {
            return;
        }

        info!(
            stream = %self.shared.stream.stream_name(),
            in_flight = tasks.len(),
            grace_ms = self.config.shutdown_grace_ms,
            "Waiting for in-flight messages"
        );

        let deadline = tokio::time::sleep(self.config.shutdown_grace());
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = tasks.join_next_with_id() => match joined {
                    Some(joined) => self.on_joined(joined, in_flight),
                    None => return,
                },
                _ = &mut deadline => break,
            }
        }

        warn!(
            stream = %self.shared.stream.stream_name(),
            remaining = tasks.len(),
            "Shutdown grace period elapsed, aborting handlers; their messages stay pending"
        );
        tasks.abort_all();
        while let Some(joined) = tasks.join_next_with_id().await {
            self.on_joined(joined, in_flight);
        }
    }
}

impl<S, P> Shared<S, P>
where
    S: MessageStream,
    P: StreamProcessor,
{
    async fn handle(&self, event: StreamEvent) {
        let started = Instant::now();
        let stream = self.stream.stream_name();

        let disposition = if event.delivery_count > self.max_deliveries {
            Disposition::DeadLetter {
                reason: format!(
                    "delivered {} times without completing",
                    event.delivery_count
                ),
            }
        } else {
            debug!(
                stream = %stream,
                stream_id = %event.stream_id,
                delivery_count = event.delivery_count,
                redelivery = event.is_redelivery(),
                "Processing message"
            );
            let outcome = self.processor.process(&event).await;
            Disposition::decide(&outcome, event.delivery_count, self.max_deliveries)
        };

        match disposition {
            Disposition::Complete => match self.stream.ack(&event.stream_id).await {
                Ok(()) => self.metrics.job_completed(started.elapsed()),
                Err(e) => self.error_sink.record(stream, &e),
            },
            Disposition::LeaveForRedelivery { reason } => {
                self.metrics.job_left_for_redelivery();
                warn!(
                    stream = %stream,
                    stream_id = %event.stream_id,
                    delivery_count = event.delivery_count,
                    max_deliveries = self.max_deliveries,
                    error = %reason,
                    "Processing failed, message left for redelivery"
                );
            }
            Disposition::DeadLetter { reason } => {
                match self.stream.dead_letter(&event, &reason).await {
                    Ok(()) => {
                        self.metrics.job_dead_lettered();
                        error!(
                            stream = %stream,
                            stream_id = %event.stream_id,
                            delivery_count = event.delivery_count,
                            error = %reason,
                            "Message dead-lettered"
                        );
                    }
                    Err(e) => self.error_sink.record(stream, &e),
                }
            }
        }
    }
}

/// Resolves once `true` is observed. A dropped sender counts as a shutdown request.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// 1s, 2s, 4s, ... capped at 30s
fn backoff_delay(consecutive_errors: u32) -> Duration {
    let exp = consecutive_errors.saturating_sub(1).min(5);
    Duration::from_secs(2u64.pow(exp).min(MAX_BACKOFF_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStream;
    use std::future::Future;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CollectingSink {
        errors: Mutex<Vec<String>>,
    }

    impl ErrorSink for CollectingSink {
        fn record(&self, stream: &str, error: &StreamError) {
            self.errors
                .lock()
                .unwrap()
                .push(format!("{stream}: {error}"));
        }
    }

    /// Succeeds unless the payload says otherwise
    #[derive(Default)]
    struct ScriptedProcessor {
        calls: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delay: Duration,
    }

    impl ScriptedProcessor {
        fn with_delay(delay: Duration) -> Self {
            Self {
                delay,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl StreamProcessor for ScriptedProcessor {
        async fn process(&self, event: &StreamEvent) -> Result<(), StreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            match event.payload.as_slice() {
                b"transient" => Err(StreamError::transient("mail server busy")),
                b"permanent" => Err(StreamError::permanent("mailbox unavailable")),
                b"panic" => panic!("handler bug"),
                _ => Ok(()),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn test_config() -> WorkerConfig {
        WorkerConfig::new("test-queue", "test-group")
            .with_poll_interval_ms(10)
            .with_max_concurrent_jobs(4)
            .with_shutdown_grace(Duration::from_secs(5))
    }

    async fn eventually<F, Fut>(mut check: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        for _ in 0..300 {
            if check().await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached in time");
    }

    fn spawn_worker(
        worker: StreamWorker<InMemoryStream, ScriptedProcessor>,
    ) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { worker.run(rx).await });
        (tx, handle)
    }

    #[test]
    fn test_disposition_decide() {
        assert!(Disposition::decide(&Ok(()), 1, 5).is_complete());

        let transient = Err(StreamError::transient("timeout"));
        assert!(matches!(
            Disposition::decide(&transient, 4, 5),
            Disposition::LeaveForRedelivery { .. }
        ));
        assert!(matches!(
            Disposition::decide(&transient, 5, 5),
            Disposition::DeadLetter { .. }
        ));

        let permanent = Err(StreamError::permanent("bad address"));
        assert_eq!(
            Disposition::decide(&permanent, 1, 5),
            Disposition::DeadLetter {
                reason: "Processing error: bad address".to_string()
            }
        );
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(4), Duration::from_secs(8));
        assert_eq!(backoff_delay(6), Duration::from_secs(30));
        assert_eq!(backoff_delay(50), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_success_is_acknowledged() {
        let stream = Arc::new(InMemoryStream::new("test-queue"));
        let processor = Arc::new(ScriptedProcessor::default());
        let id = stream.publish(b"ok".to_vec()).await;

        let worker = StreamWorker::with_shared(stream.clone(), processor.clone(), test_config());
        let (tx, handle) = spawn_worker(worker);

        eventually(|| {
            let stream = stream.clone();
            let id = id.clone();
            async move { stream.acked().await.contains(&id) }
        })
        .await;

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert!(stream.pending_ids().await.is_empty());
        assert!(stream.dead_letters().await.is_empty());
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_dead_lettered() {
        let stream = Arc::new(InMemoryStream::new("test-queue"));
        let processor = Arc::new(ScriptedProcessor::default());
        let id = stream.publish(b"permanent".to_vec()).await;

        let worker = StreamWorker::with_shared(stream.clone(), processor, test_config());
        let (tx, handle) = spawn_worker(worker);

        eventually(|| {
            let stream = stream.clone();
            async move { !stream.dead_letters().await.is_empty() }
        })
        .await;

        tx.send(true).unwrap();
        handle.await.unwrap();
        let letters = stream.dead_letters().await;
        assert_eq!(letters[0].original_id, id);
        assert!(letters[0].error.contains("mailbox unavailable"));
        assert!(stream.pending_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_transient_failure_is_redelivered_then_dead_lettered() {
        let stream = Arc::new(
            InMemoryStream::new("test-queue").with_claim_idle(Duration::from_millis(20)),
        );
        let processor = Arc::new(ScriptedProcessor::default());
        stream.publish(b"transient".to_vec()).await;

        let config = test_config().with_claim_idle_ms(20).with_max_deliveries(3);
        let worker = StreamWorker::with_shared(stream.clone(), processor.clone(), config);
        let (tx, handle) = spawn_worker(worker);

        eventually(|| {
            let stream = stream.clone();
            async move { !stream.dead_letters().await.is_empty() }
        })
        .await;

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(processor.calls.load(Ordering::SeqCst), 3);
        let letters = stream.dead_letters().await;
        assert_eq!(letters[0].delivery_count, 3);
        assert!(letters[0].error.contains("giving up after 3 deliveries"));
    }

    #[tokio::test]
    async fn test_transient_failure_stays_pending() {
        let stream = Arc::new(InMemoryStream::new("test-queue"));
        let processor = Arc::new(ScriptedProcessor::default());
        let id = stream.publish(b"transient".to_vec()).await;

        let worker = StreamWorker::with_shared(stream.clone(), processor.clone(), test_config());
        let (tx, handle) = spawn_worker(worker);

        eventually(|| {
            let processor = processor.clone();
            async move { processor.calls.load(Ordering::SeqCst) == 1 }
        })
        .await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(stream.pending_ids().await, vec![id]);
        assert!(stream.acked().await.is_empty());
        assert!(stream.dead_letters().await.is_empty());
    }

    #[tokio::test]
    async fn test_broker_errors_go_to_sink_and_loop_continues() {
        let stream = Arc::new(InMemoryStream::new("test-queue"));
        let processor = Arc::new(ScriptedProcessor::default());
        let sink = Arc::new(CollectingSink::default());
        stream
            .inject_failure(StreamError::Protocol("connection reset".into()))
            .await;
        let id = stream.publish(b"ok".to_vec()).await;

        let worker = StreamWorker::with_shared(stream.clone(), processor, test_config())
            .with_error_sink(sink.clone());
        let (tx, handle) = spawn_worker(worker);

        eventually(|| {
            let stream = stream.clone();
            let id = id.clone();
            async move { stream.acked().await.contains(&id) }
        })
        .await;

        tx.send(true).unwrap();
        handle.await.unwrap();
        let errors = sink.errors.lock().unwrap().clone();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("test-queue: "));
        assert!(errors[0].contains("connection reset"));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let stream = Arc::new(InMemoryStream::new("test-queue"));
        let processor = Arc::new(ScriptedProcessor::with_delay(Duration::from_millis(30)));
        for _ in 0..12 {
            stream.publish(b"ok".to_vec()).await;
        }

        let config = test_config().with_max_concurrent_jobs(3);
        let worker = StreamWorker::with_shared(stream.clone(), processor.clone(), config);
        let (tx, handle) = spawn_worker(worker);

        eventually(|| {
            let stream = stream.clone();
            async move { stream.acked().await.len() == 12 }
        })
        .await;

        tx.send(true).unwrap();
        handle.await.unwrap();
        let max_active = processor.max_active.load(Ordering::SeqCst);
        assert!(max_active <= 3, "ran {max_active} handlers at once");
        assert!(max_active >= 2);
    }

    #[tokio::test]
    async fn test_panicking_handler_leaves_message_pending() {
        let stream = Arc::new(InMemoryStream::new("test-queue"));
        let processor = Arc::new(ScriptedProcessor::default());
        let bad = stream.publish(b"panic".to_vec()).await;
        let good = stream.publish(b"ok".to_vec()).await;

        let worker = StreamWorker::with_shared(stream.clone(), processor, test_config());
        let (tx, handle) = spawn_worker(worker);

        eventually(|| {
            let stream = stream.clone();
            let good = good.clone();
            async move { stream.acked().await.contains(&good) }
        })
        .await;

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(stream.pending_ids().await, vec![bad]);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_after_grace_period() {
        let stream = Arc::new(InMemoryStream::new("test-queue"));
        let processor = Arc::new(ScriptedProcessor::with_delay(Duration::from_secs(60)));
        let id = stream.publish(b"ok".to_vec()).await;

        let config = test_config().with_shutdown_grace(Duration::from_millis(50));
        let worker = StreamWorker::with_shared(stream.clone(), processor.clone(), config);
        let (tx, handle) = spawn_worker(worker);

        eventually(|| {
            let processor = processor.clone();
            async move { processor.calls.load(Ordering::SeqCst) == 1 }
        })
        .await;

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("worker did not stop within grace period")
            .unwrap();
        assert_eq!(stream.pending_ids().await, vec![id]);
        assert!(stream.acked().await.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_in_flight_handlers() {
        let stream = Arc::new(InMemoryStream::new("test-queue"));
        let processor = Arc::new(ScriptedProcessor::with_delay(Duration::from_millis(100)));
        let id = stream.publish(b"ok".to_vec()).await;

        let worker = StreamWorker::with_shared(stream.clone(), processor.clone(), test_config());
        let (tx, handle) = spawn_worker(worker);

        eventually(|| {
            let processor = processor.clone();
            async move { processor.calls.load(Ordering::SeqCst) == 1 }
        })
        .await;

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(stream.acked().await, vec![id]);
    }

    #[tokio::test]
    async fn test_over_delivered_message_is_dead_lettered_without_processing() {
        let stream = Arc::new(
            InMemoryStream::new("test-queue").with_claim_idle(Duration::ZERO),
        );
        let processor = Arc::new(ScriptedProcessor::default());
        stream.publish(b"ok".to_vec()).await;

        // Simulate deliveries to consumers that crashed mid-handler
        stream.read_new(1).await.unwrap();
        for _ in 0..2 {
            stream.claim_idle(1, &HashSet::new()).await.unwrap();
        }

        let config = test_config().with_claim_idle_ms(0).with_max_deliveries(2);
        let worker = StreamWorker::with_shared(stream.clone(), processor.clone(), config);
        let (tx, handle) = spawn_worker(worker);

        eventually(|| {
            let stream = stream.clone();
            async move { !stream.dead_letters().await.is_empty() }
        })
        .await;

        tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(processor.calls.load(Ordering::SeqCst), 0);
        assert_eq!(stream.dead_letters().await[0].delivery_count, 4);
    }
}
