//! Reservation mail processor for stream workers.
//!
//! One pipeline for both queues: decode → look up the user → compose → send.
//! The only thing that differs per queue is the [`EventKind`] the processor was
//! built with.

use crate::composer::EmailComposer;
use crate::error::ProcessingError;
use crate::event::decode;
use crate::kind::EventKind;
use async_trait::async_trait;
use domain_users::{DirectoryError, UserDirectory};
use email::MailTransport;
use std::sync::Arc;
use std::time::Duration;
use stream_worker::{StreamError, StreamEvent, StreamProcessor};
use tracing::{debug, error, info, warn};

pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// How a successfully handled event ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The mail server accepted the email
    Delivered { message_id: String },
    /// No such user; nothing to send and nothing to retry
    UserNotFound,
}

/// Sends the email a reservation event asks for.
///
/// Directory and transport are long-lived and shared by both queues' processors.
pub struct ReservationMailProcessor<D: ?Sized, T: ?Sized> {
    kind: EventKind,
    directory: Arc<D>,
    transport: Arc<T>,
    composer: Arc<EmailComposer>,
    lookup_timeout: Duration,
}

impl<D, T> ReservationMailProcessor<D, T>
where
    D: UserDirectory + ?Sized,
    T: MailTransport + ?Sized,
{
    pub fn new(
        kind: EventKind,
        directory: Arc<D>,
        transport: Arc<T>,
        composer: Arc<EmailComposer>,
    ) -> Self {
        Self {
            kind,
            directory,
            transport,
            composer,
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Bound each directory lookup. Running out of time counts as unavailable.
    pub fn with_lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Run the pipeline for one queue payload.
    pub async fn handle(&self, payload: &[u8]) -> Result<Outcome, ProcessingError> {
        let event = decode(payload)?;

        let lookup = self.directory.get_by_id(&event.user_id);
        let user = match tokio::time::timeout(self.lookup_timeout, lookup).await {
            Ok(result) => result?,
            Err(_) => return Err(DirectoryError::Timeout(self.lookup_timeout).into()),
        };

        let Some(user) = user else {
            warn!(user_id = %event.user_id, kind = %self.kind, "No user found");
            return Ok(Outcome::UserNotFound);
        };

        let message = self.composer.compose(self.kind, &event, &user);
        debug!(
            user_id = %user.id,
            kind = %self.kind,
            transport = self.transport.name(),
            "Composed email"
        );

        let sent = self.transport.send(&message).await?;
        info!(
            to = %message.to,
            kind = %self.kind,
            message_id = %sent.message_id,
            "Email sent"
        );

        Ok(Outcome::Delivered {
            message_id: sent.message_id,
        })
    }
}

#[async_trait]
impl<D, T> StreamProcessor for ReservationMailProcessor<D, T>
where
    D: UserDirectory + ?Sized + 'static,
    T: MailTransport + ?Sized + 'static,
{
    async fn process(&self, event: &StreamEvent) -> Result<(), StreamError> {
        match self.handle(&event.payload).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if let ProcessingError::Decode(reason) = &e {
                    warn!(
                        stream_id = %event.stream_id,
                        kind = %self.kind,
                        payload = %event.payload_lossy(),
                        reason = %reason,
                        "Undecodable reservation event"
                    );
                }
                error!(
                    stream_id = %event.stream_id,
                    kind = %self.kind,
                    delivery_count = event.delivery_count,
                    category = e.category().as_str(),
                    error = %e,
                    "Failed to deliver reservation email"
                );
                Err(e.into())
            }
        }
    }

    fn name(&self) -> &'static str {
        self.kind.processor_name()
    }
}

impl<D: ?Sized, T: ?Sized> Clone for ReservationMailProcessor<D, T> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            directory: Arc::clone(&self.directory),
            transport: Arc::clone(&self.transport),
            composer: Arc::clone(&self.composer),
            lookup_timeout: self.lookup_timeout,
        }
    }
}
