//! In-process message stream
//!
//! Mirrors the consumer-group semantics of [`crate::StreamConsumer`] without a
//! broker: entries stay pending until acknowledged, idle pending entries can be
//! claimed again, and dead-lettered entries are kept for inspection.

use crate::consumer::MessageStream;
use crate::dlq::DeadLetter;
use crate::error::StreamError;
use crate::event::StreamEvent;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug)]
struct PendingEntry {
    payload: Vec<u8>,
    deliveries: u32,
    delivered_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    next_seq: u64,
    unread: VecDeque<(String, Vec<u8>)>,
    pending: BTreeMap<String, PendingEntry>,
    acked: Vec<String>,
    dead_letters: Vec<DeadLetter>,
    injected_failures: VecDeque<StreamError>,
}

/// In-memory stream with a single implicit consumer group
#[derive(Debug)]
pub struct InMemoryStream {
    name: String,
    claim_idle: Duration,
    state: Mutex<State>,
}

impl InMemoryStream {
    /// Pending entries become claimable after 60 seconds by default
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            claim_idle: Duration::from_secs(60),
            state: Mutex::new(State::default()),
        }
    }

    pub fn with_claim_idle(mut self, idle: Duration) -> Self {
        self.claim_idle = idle;
        self
    }

    /// Append a payload and return its entry ID
    pub async fn publish(&self, payload: impl Into<Vec<u8>>) -> String {
        let mut state = self.state.lock().await;
        state.next_seq += 1;
        let id = format!("{}-0", state.next_seq);
        state.unread.push_back((id.clone(), payload.into()));
        id
    }

    /// Make the next broker call fail with `error`
    pub async fn inject_failure(&self, error: StreamError) {
        self.state.lock().await.injected_failures.push_back(error);
    }

    pub async fn acked(&self) -> Vec<String> {
        self.state.lock().await.acked.clone()
    }

    pub async fn pending_ids(&self) -> Vec<String> {
        self.state.lock().await.pending.keys().cloned().collect()
    }

    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().await.dead_letters.clone()
    }

    /// Entries not yet delivered to anyone
    pub async fn unread_len(&self) -> usize {
        self.state.lock().await.unread.len()
    }

    /// Delivery count recorded for a pending entry
    pub async fn deliveries(&self, stream_id: &str) -> Option<u32> {
        self.state
            .lock()
            .await
            .pending
            .get(stream_id)
            .map(|entry| entry.deliveries)
    }
}

fn take_failure(state: &mut State) -> Result<(), StreamError> {
    match state.injected_failures.pop_front() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[async_trait]
impl MessageStream for InMemoryStream {
    fn stream_name(&self) -> &str {
        &self.name
    }

    async fn ensure_group(&self) -> Result<(), StreamError> {
        take_failure(&mut *self.state.lock().await)
    }

    async fn read_new(&self, count: usize) -> Result<Vec<StreamEvent>, StreamError> {
        let mut state = self.state.lock().await;
        take_failure(&mut state)?;

        let take = count.min(state.unread.len());
        let now = Instant::now();
        let mut events = Vec::with_capacity(take);

        let drained: Vec<(String, Vec<u8>)> = state.unread.drain(..take).collect();
        for (id, payload) in drained {
            state.pending.insert(
                id.clone(),
                PendingEntry {
                    payload: payload.clone(),
                    deliveries: 1,
                    delivered_at: now,
                },
            );
            events.push(StreamEvent::new(id, payload));
        }

        Ok(events)
    }

    async fn claim_idle(
        &self,
        count: usize,
        exclude: &HashSet<String>,
    ) -> Result<Vec<StreamEvent>, StreamError> {
        let mut state = self.state.lock().await;
        take_failure(&mut state)?;

        let now = Instant::now();
        let claim_idle = self.claim_idle;
        let mut events = Vec::new();

        for (id, entry) in state.pending.iter_mut() {
            if events.len() >= count {
                break;
            }
            if exclude.contains(id) || now.duration_since(entry.delivered_at) < claim_idle {
                continue;
            }
            entry.deliveries += 1;
            entry.delivered_at = now;
            events.push(StreamEvent::with_delivery_count(
                id.clone(),
                entry.payload.clone(),
                entry.deliveries,
            ));
        }

        Ok(events)
    }

    async fn ack(&self, stream_id: &str) -> Result<(), StreamError> {
        let mut state = self.state.lock().await;
        take_failure(&mut state)?;

        if state.pending.remove(stream_id).is_some() {
            state.acked.push(stream_id.to_string());
        }
        Ok(())
    }

    async fn dead_letter(&self, event: &StreamEvent, reason: &str) -> Result<(), StreamError> {
        let mut state = self.state.lock().await;
        take_failure(&mut state)?;

        state.dead_letters.push(DeadLetter::from_event(event, reason));
        if state.pending.remove(&event.stream_id).is_some() {
            state.acked.push(event.stream_id.clone());
        }
        Ok(())
    }
}
