//! Mail transports

mod mock;
mod smtp;

pub use mock::MockMailTransport;
pub use smtp::{SmtpConfig, SmtpTransport, TlsMode};

use crate::error::DeliveryResult;
use crate::models::{EmailMessage, Sent};
use async_trait::async_trait;

/// Delivers one message per call.
///
/// Failures come back as [`crate::DeliveryError`] values; implementations never panic
/// on a bad message. Must tolerate concurrent use.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> DeliveryResult<Sent>;

    /// Get transport name
    fn name(&self) -> &'static str;
}
