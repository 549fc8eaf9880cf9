//! Stream consumer for Redis operations
//!
//! Handles reading, acknowledging, reclaiming and dead-lettering entries of a
//! Redis stream through a consumer group.

use crate::config::WorkerConfig;
use crate::dlq::DeadLetter;
use crate::error::StreamError;
use crate::event::StreamEvent;
use crate::registry::MessageKey;
use async_trait::async_trait;
use redis::RedisResult;
use redis::aio::ConnectionManager;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

type StreamEntry = (String, Vec<(String, Vec<u8>)>);
type StreamReply = Vec<(String, Vec<StreamEntry>)>;

/// Broker operations a [`crate::StreamWorker`] needs.
///
/// Implemented by [`StreamConsumer`] for Redis and by [`crate::InMemoryStream`]
/// for tests and local runs.
#[async_trait]
pub trait MessageStream: Send + Sync + 'static {
    /// Name of the stream, used in logs and metrics labels
    fn stream_name(&self) -> &str;

    /// Create the consumer group (and the stream) if missing
    async fn ensure_group(&self) -> Result<(), StreamError>;

    /// Read up to `count` entries never delivered to the group
    async fn read_new(&self, count: usize) -> Result<Vec<StreamEvent>, StreamError>;

    /// Take over up to `count` entries that have stayed unacknowledged past the
    /// idle window. Entries whose IDs are in `exclude` are left alone.
    async fn claim_idle(
        &self,
        count: usize,
        exclude: &HashSet<String>,
    ) -> Result<Vec<StreamEvent>, StreamError>;

    /// Mark an entry as done for the group
    async fn ack(&self, stream_id: &str) -> Result<(), StreamError>;

    /// Copy the entry to the dead-letter stream and acknowledge it
    async fn dead_letter(&self, event: &StreamEvent, reason: &str) -> Result<(), StreamError>;
}

/// Stream consumer for Redis operations
pub struct StreamConsumer {
    redis: Arc<ConnectionManager>,
    config: WorkerConfig,
}

impl StreamConsumer {
    pub fn new(redis: Arc<ConnectionManager>, config: WorkerConfig) -> Self {
        Self { redis, config }
    }

    /// Convert raw entries into events, pulling the payload out of the `job` field
    fn parse_entries(
        &self,
        entries: Vec<StreamEntry>,
        delivery_count: impl Fn(&str) -> u32,
    ) -> Vec<StreamEvent> {
        entries
            .into_iter()
            .map(|(stream_id, fields)| {
                let deliveries = delivery_count(&stream_id);
                let payload = fields
                    .into_iter()
                    .find(|(k, _)| k == MessageKey::Job.as_ref())
                    .map(|(_, v)| v);

                match payload {
                    Some(payload) => {
                        StreamEvent::with_delivery_count(stream_id, payload, deliveries)
                    }
                    None => {
                        warn!(
                            stream = %self.config.stream_name,
                            stream_id = %stream_id,
                            "Missing 'job' field in message"
                        );
                        StreamEvent::with_delivery_count(stream_id, Vec::new(), deliveries)
                    }
                }
            })
            .collect()
    }
}

#[async_trait]
impl MessageStream for StreamConsumer {
    fn stream_name(&self) -> &str {
        &self.config.stream_name
    }

    async fn ensure_group(&self) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();

        let result: RedisResult<()> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("0") // Start from beginning
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => {
                info!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Created consumer group"
                );
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Consumer group already exists"
                );
            }
            Err(e) => return Err(StreamError::Redis(e)),
        }

        Ok(())
    }

    async fn read_new(&self, count: usize) -> Result<Vec<StreamEvent>, StreamError> {
        let mut conn = (*self.redis).clone();

        let mut cmd = redis::cmd("XREADGROUP");
        cmd.arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg("COUNT")
            .arg(count);

        if let Some(timeout) = self.config.blocking_timeout_ms {
            cmd.arg("BLOCK").arg(timeout);
        }

        cmd.arg("STREAMS").arg(&self.config.stream_name).arg(">");

        let result: Result<Option<StreamReply>, StreamError> =
            cmd.query_async(&mut conn).await.map_err(StreamError::from);

        match result {
            Ok(Some(streams)) => Ok(streams
                .into_iter()
                .flat_map(|(_, entries)| self.parse_entries(entries, |_| 1))
                .collect()),
            Ok(None) => Ok(vec![]),
            Err(e) if e.is_nogroup_error() => {
                warn!(
                    stream = %self.config.stream_name,
                    group = %self.config.consumer_group,
                    "Consumer group missing, recreating"
                );
                self.ensure_group().await?;
                Ok(vec![])
            }
            Err(e) => Err(e),
        }
    }

    async fn claim_idle(
        &self,
        count: usize,
        exclude: &HashSet<String>,
    ) -> Result<Vec<StreamEvent>, StreamError> {
        let mut conn = (*self.redis).clone();

        // id, consumer, idle ms, deliveries so far
        let pending: RedisResult<Vec<(String, String, u64, u64)>> = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(self.config.claim_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count + exclude.len())
            .query_async(&mut conn)
            .await;

        let pending = match pending.map_err(StreamError::from) {
            Ok(p) => p,
            Err(e) if e.is_nogroup_error() => return Ok(vec![]),
            Err(e) => return Err(e),
        };

        let candidates: Vec<(String, u64)> = pending
            .into_iter()
            .filter(|(id, _, _, _)| !exclude.contains(id))
            .take(count)
            .map(|(id, _, _, deliveries)| (id, deliveries))
            .collect();

        if candidates.is_empty() {
            return Ok(vec![]);
        }

        // MIN-IDLE is re-checked by Redis, so a consumer that claimed first wins
        let mut cmd = redis::cmd("XCLAIM");
        cmd.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_id)
            .arg(self.config.claim_idle_ms);
        for (id, _) in &candidates {
            cmd.arg(id);
        }

        // Entries trimmed from the stream come back as nil on older servers
        let claimed: Vec<Option<StreamEntry>> = cmd.query_async(&mut conn).await?;

        let mut entries = Vec::with_capacity(claimed.len());
        for (entry, (id, _)) in claimed.into_iter().zip(candidates.iter()) {
            match entry {
                Some(entry) => entries.push(entry),
                None => {
                    warn!(stream_id = %id, "Pending entry no longer in stream, acknowledging");
                    self.ack(id).await?;
                }
            }
        }

        let events = self.parse_entries(entries, |id| {
            candidates
                .iter()
                .find(|(candidate, _)| candidate == id)
                .map(|(_, deliveries)| *deliveries as u32 + 1)
                .unwrap_or(2)
        });

        if !events.is_empty() {
            warn!(
                stream = %self.config.stream_name,
                count = events.len(),
                "Claimed idle messages for redelivery"
            );
        }

        Ok(events)
    }

    async fn ack(&self, stream_id: &str) -> Result<(), StreamError> {
        let mut conn = (*self.redis).clone();

        let _: i64 = redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(stream_id)
            .query_async(&mut conn)
            .await?;

        debug!(stream_id = %stream_id, "Acknowledged message");
        Ok(())
    }

    async fn dead_letter(&self, event: &StreamEvent, reason: &str) -> Result<(), StreamError> {
        let letter = DeadLetter::from_event(event, reason);
        let mut conn = (*self.redis).clone();

        let mut xadd = redis::cmd("XADD");
        xadd.arg(&self.config.dlq_stream)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.config.dlq_max_length)
            .arg("*")
            .arg(MessageKey::Job.as_ref())
            .arg(&letter.payload);
        for (key, value) in letter.metadata_fields() {
            xadd.arg(key.as_ref()).arg(value);
        }

        let mut xack = redis::cmd("XACK");
        xack.arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(&event.stream_id);

        let (dlq_id, _acked): (String, i64) = redis::pipe()
            .atomic()
            .add_command(xadd)
            .add_command(xack)
            .query_async(&mut conn)
            .await?;

        info!(
            stream = %self.config.stream_name,
            stream_id = %event.stream_id,
            dlq_id = %dlq_id,
            delivery_count = event.delivery_count,
            error = %reason,
            "Moved message to dead-letter stream"
        );

        Ok(())
    }
}
