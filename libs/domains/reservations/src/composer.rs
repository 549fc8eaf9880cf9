//! Email composition
//!
//! Pure mapping from (kind, event, user) to a plain-text [`EmailMessage`].
//! Subject and body depend only on the kind; the recipient is always the user.

use crate::event::ReservationEvent;
use crate::kind::EventKind;
use chrono::format::{Item, StrftimeItems};
use core_config::{ConfigError, FromEnv, env_or_default};
use domain_users::User;
use email::{EmailMessage, Sender};

pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone)]
pub struct EmailComposer {
    sender: Sender,
    time_format: String,
}

impl EmailComposer {
    pub fn new(sender: Sender) -> Self {
        Self {
            sender,
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    /// Use a chrono `strftime` format for the start time.
    pub fn with_time_format(mut self, format: impl Into<String>) -> Result<Self, ConfigError> {
        let format = format.into();
        let malformed = StrftimeItems::new(&format).any(|item| matches!(item, Item::Error));
        if format.trim().is_empty() || malformed {
            return Err(ConfigError::Invalid(format!("invalid time format '{format}'")));
        }
        self.time_format = format;
        Ok(self)
    }

    pub fn sender(&self) -> &Sender {
        &self.sender
    }

    pub fn compose(&self, kind: EventKind, event: &ReservationEvent, user: &User) -> EmailMessage {
        let start = event.start_time.format(&self.time_format).to_string();

        let (subject, body) = match kind {
            EventKind::Confirmation => (
                "Reservation Confirmation",
                format!(
                    "Hello {},\n\nYour reservation for {} at {} with {} is confirmed for {}.\n\nThank you!",
                    user.first_name, event.service, event.saloon, event.worker, start
                ),
            ),
            EventKind::Reminder => (
                "Reservation Reminder",
                format!(
                    "Hello {},\n\nThis is a reminder for your reservation for {} at {} with {} scheduled for {}.\n\nSee you soon!",
                    user.first_name, event.service, event.saloon, event.worker, start
                ),
            ),
        };

        EmailMessage::new(self.sender.clone(), user.email.clone(), subject, body)
    }
}

impl FromEnv for EmailComposer {
    /// Sender from `EMAIL_FROM_ADDRESS`/`EMAIL_FROM_NAME`,
    /// start time format from `EMAIL_TIME_FORMAT`
    fn from_env() -> Result<Self, ConfigError> {
        EmailComposer::new(Sender::from_env()?)
            .with_time_format(env_or_default("EMAIL_TIME_FORMAT", DEFAULT_TIME_FORMAT))
    }
}
