//! Recording transport for tests and local runs

use super::MailTransport;
use crate::error::{DeliveryError, DeliveryResult};
use crate::models::{EmailMessage, Sent};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Transport that captures messages instead of sending them
#[derive(Clone, Default)]
pub struct MockMailTransport {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    attempts: Arc<Mutex<usize>>,
    failures: Arc<Mutex<VecDeque<DeliveryError>>>,
    always_fail: Option<DeliveryError>,
}

impl MockMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose every send fails with `error`
    pub fn failing(error: DeliveryError) -> Self {
        Self {
            always_fail: Some(error),
            ..Self::default()
        }
    }

    /// Fail the next send with `error`, then go back to normal
    pub async fn fail_next(&self, error: DeliveryError) {
        self.failures.lock().await.push_back(error);
    }

    /// Messages accepted so far
    pub async fn sent_messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Calls to `send`, failed ones included
    pub async fn attempts(&self) -> usize {
        *self.attempts.lock().await
    }

    pub async fn was_sent_to(&self, address: &str) -> bool {
        self.sent.lock().await.iter().any(|m| m.to == address)
    }
}

#[async_trait]
impl MailTransport for MockMailTransport {
    async fn send(&self, message: &EmailMessage) -> DeliveryResult<Sent> {
        *self.attempts.lock().await += 1;

        if let Some(error) = &self.always_fail {
            return Err(error.clone());
        }
        if let Some(error) = self.failures.lock().await.pop_front() {
            return Err(error);
        }

        let mut sent = self.sent.lock().await;
        sent.push(message.clone());
        Ok(Sent {
            message_id: format!("mock-{}", sent.len()),
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
