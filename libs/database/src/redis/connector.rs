use redis::Client;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use std::time::Duration;
use tracing::info;

use super::RedisConfig;
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry_with_backoff};

/// Connect to Redis and verify the connection with `PING`.
///
/// The returned `ConnectionManager` reconnects on its own after connection loss.
/// Commands whose reply takes longer than `response_timeout` fail with a timeout.
pub async fn connect(
    url: &str,
    response_timeout: Duration,
) -> redis::RedisResult<ConnectionManager> {
    let client = Client::open(url)?;
    let config = ConnectionManagerConfig::new().set_response_timeout(Some(response_timeout));
    let manager = ConnectionManager::new_with_config(client, config).await?;

    let mut conn = manager.clone();
    let _: String = redis::cmd("PING").query_async(&mut conn).await?;

    Ok(manager)
}

/// Connect from config, retrying with backoff (default policy when `retry_config` is `None`).
pub async fn connect_from_config_with_retry(
    config: RedisConfig,
    retry_config: Option<RetryConfig>,
) -> DatabaseResult<ConnectionManager> {
    let retry_config = retry_config.unwrap_or_default();
    let attempts = retry_config.max_attempts();
    let url = config.build_url();
    let response_timeout = config.response_timeout;

    info!(
        redis = %config.redacted_url(),
        response_timeout_ms = response_timeout.as_millis() as u64,
        "Connecting to Redis"
    );

    let manager = retry_with_backoff(|| connect(&url, response_timeout), retry_config)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed {
            target: "redis",
            attempts,
            reason: e.to_string(),
        })?;

    info!("Connected to Redis");
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_with_retry_reports_attempts() {
        // Port 1 is never a Redis server
        let config = RedisConfig::new("redis://127.0.0.1:1");
        let retry = RetryConfig::new()
            .with_max_retries(1)
            .with_initial_delay(1)
            .without_jitter();

        let err = connect_from_config_with_retry(config, Some(retry))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DatabaseError::ConnectionFailed { target: "redis", attempts: 2, .. }
        ));
    }
}
