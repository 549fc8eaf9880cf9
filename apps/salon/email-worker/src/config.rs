use core_config::{ConfigError, FromEnv, env_parse};
use std::time::Duration;
use stream_worker::{StreamDef, WorkerConfig};

/// Per-queue consumer tuning, shared by both queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub max_concurrent_jobs: usize,
    pub batch_size: usize,
    /// XREADGROUP BLOCK in ms; `None` polls every `poll_interval_ms`
    pub block_ms: Option<u64>,
    pub poll_interval_ms: u64,
    pub claim_idle_ms: u64,
    pub max_deliveries: u32,
    pub shutdown_grace: Duration,
    pub lookup_timeout: Duration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            batch_size: 10,
            block_ms: None,
            poll_interval_ms: 500,
            claim_idle_ms: 60_000,
            max_deliveries: 5,
            shutdown_grace: Duration::from_secs(30),
            lookup_timeout: Duration::from_secs(5),
        }
    }
}

impl WorkerSettings {
    pub fn block_timeout(&self) -> Option<Duration> {
        self.block_ms.map(Duration::from_millis)
    }

    /// Longest a single message can take: user lookup plus SMTP send.
    pub fn handler_budget(&self, send_timeout: Duration) -> Duration {
        self.lookup_timeout + send_timeout
    }

    /// The claim idle window must outlast the handler budget, or another replica
    /// claims a message that is still being processed.
    pub fn check_claim_idle(&self, send_timeout: Duration) -> Result<(), ConfigError> {
        let budget = self.handler_budget(send_timeout);
        if Duration::from_millis(self.claim_idle_ms) <= budget {
            return Err(ConfigError::Invalid(format!(
                "WORKER_CLAIM_IDLE_MS ({}) must exceed USER_LOOKUP_TIMEOUT_SECS + \
                 SMTP_TIMEOUT_SECS ({}ms)",
                self.claim_idle_ms,
                budget.as_millis()
            )));
        }
        Ok(())
    }

    /// Consumer configuration for queue `Q`
    pub fn worker_config<Q: StreamDef>(&self) -> WorkerConfig {
        WorkerConfig::from_stream_def::<Q>()
            .with_max_concurrent_jobs(self.max_concurrent_jobs)
            .with_batch_size(self.batch_size)
            .with_blocking(self.block_ms)
            .with_poll_interval_ms(self.poll_interval_ms)
            .with_claim_idle_ms(self.claim_idle_ms)
            .with_max_deliveries(self.max_deliveries)
            .with_shutdown_grace(self.shutdown_grace)
    }
}

impl FromEnv for WorkerSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_concurrent_jobs =
            env_parse("WORKER_MAX_CONCURRENT_JOBS", defaults.max_concurrent_jobs)?;
        if max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "WORKER_MAX_CONCURRENT_JOBS must be at least 1".to_string(),
            ));
        }

        let block_ms = match env_parse("WORKER_BLOCK_MS", 0u64)? {
            0 => None,
            ms => Some(ms),
        };

        Ok(Self {
            max_concurrent_jobs,
            batch_size: env_parse("WORKER_BATCH_SIZE", defaults.batch_size)?,
            block_ms,
            poll_interval_ms: env_parse("WORKER_POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
            claim_idle_ms: env_parse("WORKER_CLAIM_IDLE_MS", defaults.claim_idle_ms)?,
            max_deliveries: env_parse("WORKER_MAX_DELIVERIES", defaults.max_deliveries)?,
            shutdown_grace: Duration::from_secs(env_parse(
                "WORKER_SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace.as_secs(),
            )?),
            lookup_timeout: Duration::from_secs(env_parse(
                "USER_LOOKUP_TIMEOUT_SECS",
                defaults.lookup_timeout.as_secs(),
            )?),
        })
    }
}
