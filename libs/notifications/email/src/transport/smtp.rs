//! SMTP transport using lettre
//!
//! No connection pool: every send connects, authenticates, sends and quits.
//! lettre closes the connection on every exit path, failed ones included.

use super::MailTransport;
use crate::error::{DeliveryError, DeliveryResult};
use crate::models::{EmailMessage, Sent};
use async_trait::async_trait;
use core_config::{env_parse, env_required, ConfigError, FromEnv};
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How the SMTP session is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsMode {
    /// TLS from the first byte (SMTPS, usually port 465)
    Implicit,
    /// Plaintext greeting upgraded with STARTTLS (usually port 587)
    StartTls,
    /// No encryption. Local catchers such as Mailpit only.
    None,
}

impl FromStr for TlsMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "implicit" | "tls" | "smtps" => Ok(TlsMode::Implicit),
            "starttls" => Ok(TlsMode::StartTls),
            "none" | "plain" | "off" => Ok(TlsMode::None),
            other => Err(format!(
                "unknown TLS mode '{}', expected implicit, starttls or none",
                other
            )),
        }
    }
}

/// SMTP endpoint configuration
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub tls: TlsMode,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Bound for the whole exchange and for each SMTP command
    pub timeout: Duration,
}

impl SmtpConfig {
    pub fn new(host: impl Into<String>, port: u16, tls: TlsMode) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FromEnv for SmtpConfig {
    /// `SMTP_HOST` (required), `SMTP_PORT` (465), `SMTP_TLS` (implicit),
    /// `SMTP_USERNAME`/`SMTP_PASSWORD` (required unless TLS is none),
    /// `SMTP_TIMEOUT_SECS` (30)
    fn from_env() -> Result<Self, ConfigError> {
        let host = env_required("SMTP_HOST")?;
        let port = env_parse("SMTP_PORT", 465u16)?;
        let tls = match std::env::var("SMTP_TLS") {
            Ok(raw) => raw.parse::<TlsMode>().map_err(|details| ConfigError::ParseError {
                key: "SMTP_TLS".to_string(),
                details,
            })?,
            Err(_) => TlsMode::Implicit,
        };
        let timeout = Duration::from_secs(env_parse("SMTP_TIMEOUT_SECS", 30u64)?);

        let mut config = SmtpConfig::new(host, port, tls).with_timeout(timeout);

        match tls {
            TlsMode::None => {
                if let (Ok(user), Ok(pass)) =
                    (std::env::var("SMTP_USERNAME"), std::env::var("SMTP_PASSWORD"))
                {
                    config = config.with_credentials(user, pass);
                }
            }
            _ => {
                config = config.with_credentials(
                    env_required("SMTP_USERNAME")?,
                    env_required("SMTP_PASSWORD")?,
                );
            }
        }

        Ok(config)
    }
}

/// SMTP mail transport
pub struct SmtpTransport {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    timeout: Duration,
}

impl SmtpTransport {
    /// Build the transport. Nothing is sent over the network until the first send.
    pub fn new(config: SmtpConfig) -> DeliveryResult<Self> {
        let builder = match config.tls {
            TlsMode::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| DeliveryError::permanent(format!("Invalid SMTP relay: {}", e)))?,
            TlsMode::StartTls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                    .map_err(|e| DeliveryError::permanent(format!("Invalid SMTP relay: {}", e)))?
            }
            TlsMode::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        };

        let mut builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        info!(
            host = %config.host,
            port = config.port,
            tls = ?config.tls,
            authenticated = config.username.is_some(),
            "SMTP transport configured"
        );

        Ok(Self {
            transport: builder.build(),
            timeout: config.timeout,
        })
    }

    fn build_message(message: &EmailMessage) -> DeliveryResult<Message> {
        let from: Mailbox = message
            .from
            .to_string()
            .parse()
            .map_err(|e| DeliveryError::permanent(format!("Invalid from address: {}", e)))?;

        let to: Mailbox = message
            .to
            .parse()
            .map_err(|e| {
                DeliveryError::permanent(format!("Invalid to address '{}': {}", message.to, e))
            })?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(&message.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| DeliveryError::permanent(format!("Failed to build message: {}", e)))
    }
}

/// Reply codes that will not change on retry: bad syntax, unknown mailbox,
/// exceeded storage, bad mailbox name, rejected transaction.
const PERMANENT_REPLY_CODES: [&str; 6] = ["501", "550", "551", "552", "553", "554"];

fn classify(err: &lettre::transport::smtp::Error) -> DeliveryError {
    let reason = err.to_string();

    if err.is_timeout() {
        return DeliveryError::transient(reason);
    }

    match err.status() {
        Some(code) if PERMANENT_REPLY_CODES.contains(&code.to_string().as_str()) => {
            DeliveryError::Permanent(reason)
        }
        _ => DeliveryError::Transient(reason),
    }
}

#[async_trait]
impl MailTransport for SmtpTransport {
    async fn send(&self, message: &EmailMessage) -> DeliveryResult<Sent> {
        let email = Self::build_message(message)?;
        let email_id = Uuid::new_v4().to_string();

        debug!(email_id = %email_id, to = %message.to, "Sending email via SMTP");

        let response = match tokio::time::timeout(self.timeout, self.transport.send(email)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let err = classify(&e);
                warn!(email_id = %email_id, to = %message.to, error = %e, "SMTP send failed");
                return Err(err);
            }
            Err(_) => return Err(DeliveryError::Timeout(self.timeout)),
        };

        let message_id = response
            .message()
            .next()
            .map(|s| s.to_string())
            .unwrap_or(email_id);

        Ok(Sent { message_id })
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sender;

    fn message(to: &str) -> EmailMessage {
        EmailMessage::new(
            Sender::new("noreply@glow.test").with_name("Glow"),
            to,
            "Reservation Confirmation",
            "Hello Maria",
        )
    }

    #[test]
    fn test_tls_mode_parse() {
        assert_eq!("implicit".parse::<TlsMode>().unwrap(), TlsMode::Implicit);
        assert_eq!("STARTTLS".parse::<TlsMode>().unwrap(), TlsMode::StartTls);
        assert_eq!("none".parse::<TlsMode>().unwrap(), TlsMode::None);
        assert!("ssl3".parse::<TlsMode>().is_err());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = SmtpConfig::new("smtp.glow.test", 465, TlsMode::Implicit)
            .with_credentials("mailer", "hunter2");
        let debug = format!("{:?}", config);

        assert!(debug.contains("mailer"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_from_env_defaults() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", Some("smtp.glow.test")),
                ("SMTP_PORT", None),
                ("SMTP_TLS", None),
                ("SMTP_USERNAME", Some("mailer")),
                ("SMTP_PASSWORD", Some("secret")),
                ("SMTP_TIMEOUT_SECS", None),
            ],
            || {
                let config = SmtpConfig::from_env().unwrap();
                assert_eq!(config.host, "smtp.glow.test");
                assert_eq!(config.port, 465);
                assert_eq!(config.tls, TlsMode::Implicit);
                assert_eq!(config.username.as_deref(), Some("mailer"));
                assert_eq!(config.timeout, Duration::from_secs(30));
            },
        );
    }

    #[test]
    fn test_from_env_requires_credentials_with_tls() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", Some("smtp.glow.test")),
                ("SMTP_TLS", Some("starttls")),
                ("SMTP_USERNAME", None),
                ("SMTP_PASSWORD", None),
            ],
            || {
                let err = SmtpConfig::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "SMTP_USERNAME"));
            },
        );
    }

    #[test]
    fn test_from_env_plaintext_without_credentials() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", Some("localhost")),
                ("SMTP_PORT", Some("1025")),
                ("SMTP_TLS", Some("none")),
                ("SMTP_USERNAME", None),
                ("SMTP_PASSWORD", None),
            ],
            || {
                let config = SmtpConfig::from_env().unwrap();
                assert_eq!(config.port, 1025);
                assert_eq!(config.tls, TlsMode::None);
                assert!(config.username.is_none());
            },
        );
    }

    #[test]
    fn test_from_env_rejects_bad_values() {
        temp_env::with_vars(
            [
                ("SMTP_HOST", Some("smtp.glow.test")),
                ("SMTP_PORT", Some("smtp")),
                ("SMTP_TLS", None),
            ],
            || {
                let err = SmtpConfig::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::ParseError { key, .. } if key == "SMTP_PORT"));
            },
        );

        temp_env::with_vars(
            [("SMTP_HOST", Some("smtp.glow.test")), ("SMTP_TLS", Some("ssl3"))],
            || {
                let err = SmtpConfig::from_env().unwrap_err();
                assert!(matches!(err, ConfigError::ParseError { key, .. } if key == "SMTP_TLS"));
            },
        );
    }

    #[test]
    fn test_build_message_valid() {
        let email = SmtpTransport::build_message(&message("maria@example.com")).unwrap();
        let raw = String::from_utf8(email.formatted()).unwrap();

        assert!(raw.contains("To: maria@example.com"));
        assert!(raw.contains("Subject: Reservation Confirmation"));
        assert!(raw.contains("Hello Maria"));
    }

    #[test]
    fn test_invalid_recipient_is_permanent() {
        let err = SmtpTransport::build_message(&message("not-an-address")).unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("not-an-address"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transient() {
        let config = SmtpConfig::new("127.0.0.1", 1, TlsMode::None)
            .with_timeout(Duration::from_secs(2));
        let transport = SmtpTransport::new(config).unwrap();

        let err = transport.send(&message("maria@example.com")).await.unwrap_err();
        assert!(err.is_retryable(), "expected retryable, got {err}");
    }
}
