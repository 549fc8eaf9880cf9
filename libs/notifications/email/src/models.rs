use core_config::{env_or_default, env_required, ConfigError, FromEnv};
use std::fmt;

/// Sender identity shown in the `From` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub address: String,
    pub name: Option<String>,
}

impl Sender {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} <{}>", name, self.address),
            None => f.write_str(&self.address),
        }
    }
}

impl FromEnv for Sender {
    /// `EMAIL_FROM_ADDRESS` (required), `EMAIL_FROM_NAME` (optional)
    fn from_env() -> Result<Self, ConfigError> {
        let address = env_required("EMAIL_FROM_ADDRESS")?;
        if address.trim().is_empty() {
            return Err(ConfigError::MissingEnvVar("EMAIL_FROM_ADDRESS".to_string()));
        }
        let name = env_or_default("EMAIL_FROM_NAME", "");
        let sender = Sender::new(address.trim());

        Ok(match name.trim() {
            "" => sender,
            name => sender.with_name(name),
        })
    }
}

/// A composed plain-text email, ready for a [`crate::MailTransport`].
///
/// Carries content only, so equal inputs compose equal messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub from: Sender,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn new(
        from: Sender,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// Successful hand-off to the mail server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    /// Server-provided queue id when available, the transport's own id otherwise
    pub message_id: String,
}
