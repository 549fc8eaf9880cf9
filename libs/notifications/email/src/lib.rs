//! Email delivery
//!
//! - [`EmailMessage`]: one composed plain-text email
//! - [`MailTransport`]: delivers a message, reporting [`Sent`] or a classified [`DeliveryError`]
//! - [`SmtpTransport`]: lettre-backed SMTP (implicit TLS, STARTTLS or plaintext)
//! - [`MockMailTransport`]: records messages instead of sending them
//!
//! ```rust,ignore
//! use email::{EmailMessage, MailTransport, Sender, SmtpConfig, SmtpTransport};
//! use core_config::FromEnv;
//!
//! let transport = SmtpTransport::new(SmtpConfig::from_env()?)?;
//! let message = EmailMessage::new(Sender::from_env()?, "maria@example.com", "Hello", "Hi Maria");
//! transport.send(&message).await?;
//! ```

pub mod error;
pub mod models;
pub mod transport;

pub use error::{DeliveryError, DeliveryResult};
pub use models::{EmailMessage, Sender, Sent};
pub use transport::{MailTransport, MockMailTransport, SmtpConfig, SmtpTransport, TlsMode};
