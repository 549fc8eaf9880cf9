use crate::streams::{ConfirmationQueue, ReminderQueue};
use stream_worker::StreamDef;
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Which notification a reservation event asks for. Decided by the source queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, AsRefStr, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum EventKind {
    Confirmation,
    Reminder,
}

impl EventKind {
    pub fn queue_name(&self) -> &'static str {
        match self {
            EventKind::Confirmation => ConfirmationQueue::stream_name(),
            EventKind::Reminder => ReminderQueue::stream_name(),
        }
    }

    /// Processor name used in logs and metric labels
    pub fn processor_name(&self) -> &'static str {
        match self {
            EventKind::Confirmation => "confirmation_mail",
            EventKind::Reminder => "reminder_mail",
        }
    }
}
