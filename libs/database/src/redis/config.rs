#[cfg(feature = "config")]
use core_config::{ConfigError, FromEnv, env_parse};
use std::time::Duration;

/// Same as the redis crate's own default
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Redis connection settings
///
/// Credentials and the database index may be given separately from the URL; they are
/// folded into the URL by [`RedisConfig::build_url`].
#[derive(Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g. `redis://127.0.0.1:6379`)
    pub url: String,

    /// Optional database number
    pub database: Option<u8>,

    /// Optional username for Redis ACL
    pub username: Option<String>,

    /// Optional password
    pub password: Option<String>,

    /// How long a command may wait for its reply
    pub response_timeout: Duration,
}

impl RedisConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: None,
            username: None,
            password: None,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Config for a connection that issues blocking reads (`XREADGROUP ... BLOCK`).
    ///
    /// The reply to a blocking read may legitimately take `block` longer than any
    /// other command, so the response timeout is widened by that much.
    pub fn for_blocking_reads(&self, block: Option<Duration>) -> Self {
        let mut config = self.clone();
        if let Some(block) = block {
            config.response_timeout = self.response_timeout + block;
        }
        config
    }

    /// Connection target without credentials, for logs.
    pub fn redacted_url(&self) -> String {
        match self.url.split_once("://") {
            Some((scheme, rest)) => {
                let host = rest.rsplit_once('@').map_or(rest, |(_, host)| host);
                format!("{}://{}", scheme, host)
            }
            None => self
                .url
                .rsplit_once('@')
                .map_or(self.url.as_str(), |(_, host)| host)
                .to_string(),
        }
    }

    /// Build the connection URL, inserting credentials and database when the base
    /// URL does not already carry them.
    pub fn build_url(&self) -> String {
        let (scheme, rest) = match self.url.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => ("redis", self.url.as_str()),
        };

        let mut authority_and_path = rest.to_string();

        if !authority_and_path.contains('@') {
            let userinfo = match (&self.username, &self.password) {
                (Some(user), Some(pass)) => Some(format!("{}:{}", user, pass)),
                (None, Some(pass)) => Some(format!(":{}", pass)),
                (Some(user), None) => Some(user.clone()),
                (None, None) => None,
            };
            if let Some(userinfo) = userinfo {
                authority_and_path = format!("{}@{}", userinfo, authority_and_path);
            }
        }

        if let Some(db) = self.database {
            let has_path = authority_and_path
                .split_once('/')
                .map(|(_, path)| !path.is_empty())
                .unwrap_or(false);
            if !has_path {
                let trimmed = authority_and_path.trim_end_matches('/');
                authority_and_path = format!("{}/{}", trimmed, db);
            }
        }

        format!("{}://{}", scheme, authority_and_path)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self::new("redis://127.0.0.1:6379")
    }
}

// Credentials stay out of logs.
impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("url", &self.redacted_url())
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

/// Environment variables:
/// - `REDIS_URL` or `REDIS_HOST` (required)
/// - `REDIS_DATABASE`, `REDIS_USERNAME`, `REDIS_PASSWORD` (optional)
/// - `REDIS_RESPONSE_TIMEOUT_MS` (default 500)
#[cfg(feature = "config")]
impl FromEnv for RedisConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("REDIS_URL")
            .or_else(|_| std::env::var("REDIS_HOST"))
            .map_err(|_| ConfigError::MissingEnvVar("REDIS_URL or REDIS_HOST".to_string()))?;

        let database = match std::env::var("REDIS_DATABASE") {
            Ok(db_str) => Some(db_str.parse().map_err(|e| ConfigError::ParseError {
                key: "REDIS_DATABASE".to_string(),
                details: format!("{}", e),
            })?),
            Err(_) => None,
        };

        Ok(Self {
            url,
            database,
            username: std::env::var("REDIS_USERNAME").ok(),
            password: std::env::var("REDIS_PASSWORD").ok(),
            response_timeout: Duration::from_millis(env_parse(
                "REDIS_RESPONSE_TIMEOUT_MS",
                DEFAULT_RESPONSE_TIMEOUT.as_millis() as u64,
            )?),
        })
    }
}
