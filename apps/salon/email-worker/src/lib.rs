//! Salon Email Worker
//!
//! Consumes reservation events and emails the affected user.
//!
//! ## Architecture
//!
//! ```text
//! Redis Stream (confirmation-queue)      Redis Stream (reminder-queue)
//!   ↓ (Consumer Group: email_workers)      ↓ (Consumer Group: email_workers)
//! StreamWorker<ReservationMailProcessor>  StreamWorker<ReservationMailProcessor>
//!   ↓                                      ↓
//!   └──── PostgreSQL (users) ── SMTP ──────┘
//! ```
//!
//! Each queue reads over its own Redis connection, so a blocking read on one
//! never delays commands of the other.
//!
//! A message is acknowledged only once the mail server accepted the email (or
//! the user does not exist). Transient failures stay pending and are picked up
//! again after `WORKER_CLAIM_IDLE_MS`; malformed payloads and permanent
//! delivery failures go to `<queue>:dlq`.

pub mod config;

use crate::config::WorkerSettings;
use core_config::{Environment, FromEnv};
use database::postgres::{PostgresConfig, connect_from_config_with_retry};
use database::redis::{ConnectionManager, RedisConfig};
use domain_reservations::{
    ConfirmationQueue, EmailComposer, EventKind, ReminderQueue, ReservationMailProcessor,
};
use domain_users::PostgresUserDirectory;
use email::{SmtpConfig, SmtpTransport};
use eyre::{Result, WrapErr};
use std::sync::Arc;
use stream_worker::{StreamConsumer, StreamDef, StreamWorker};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

type MailProcessor = ReservationMailProcessor<PostgresUserDirectory, SmtpTransport>;

/// Collaborators shared by both queue workers
struct Pipeline {
    directory: Arc<PostgresUserDirectory>,
    transport: Arc<SmtpTransport>,
    composer: Arc<EmailComposer>,
}

impl Pipeline {
    fn spawn_worker<Q: StreamDef>(
        &self,
        kind: EventKind,
        settings: &WorkerSettings,
        redis: ConnectionManager,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let config = settings.worker_config::<Q>();
        info!(
            stream = %config.stream_name,
            consumer_group = %config.consumer_group,
            consumer_id = %config.consumer_id,
            block_timeout_ms = ?config.blocking_timeout_ms,
            batch_size = config.batch_size,
            max_concurrent_jobs = config.max_concurrent_jobs,
            max_deliveries = config.max_deliveries,
            "Worker configuration loaded"
        );

        let consumer = StreamConsumer::new(Arc::new(redis), config.clone());
        let processor: MailProcessor = ReservationMailProcessor::new(
            kind,
            Arc::clone(&self.directory),
            Arc::clone(&self.transport),
            Arc::clone(&self.composer),
        )
        .with_lookup_timeout(settings.lookup_timeout);

        let worker = StreamWorker::new(consumer, processor, config);
        tokio::spawn(async move { worker.run(shutdown).await })
    }
}

/// Run the email worker
///
/// 1. Sets up structured logging (JSON for prod, pretty for dev)
/// 2. Loads worker, SMTP, sender, PostgreSQL and Redis configuration
/// 3. Connects to PostgreSQL (users) and Redis (queues) with retry
/// 4. Runs one worker per queue until SIGINT/SIGTERM, then drains both
///
/// # Errors
///
/// Returns an error if configuration is missing or invalid, a backing service
/// cannot be reached at startup, or a worker task dies.
pub async fn run() -> Result<()> {
    let environment = Environment::from_env();
    core_config::tracing::init_tracing(&environment);

    info!(
        name = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "Starting salon email worker"
    );

    let settings = WorkerSettings::from_env().wrap_err("Failed to load worker settings")?;
    let smtp_config = SmtpConfig::from_env().wrap_err("Failed to load SMTP configuration")?;
    settings
        .check_claim_idle(smtp_config.timeout)
        .wrap_err("Invalid worker settings")?;
    let composer = EmailComposer::from_env().wrap_err("Failed to load sender configuration")?;
    let pg_config = PostgresConfig::from_env().wrap_err("Failed to load PostgreSQL configuration")?;
    let redis_config = RedisConfig::from_env().wrap_err("Failed to load Redis configuration")?;

    info!("Connecting to PostgreSQL...");
    let db = connect_from_config_with_retry(pg_config, None)
        .await
        .wrap_err("Failed to connect to PostgreSQL")?;
    info!("Connected to PostgreSQL successfully");

    info!("Connecting to Redis...");
    let broker_config = redis_config.for_blocking_reads(settings.block_timeout());
    let confirmation_redis = connect_broker(&broker_config).await?;
    let reminder_redis = connect_broker(&broker_config).await?;
    info!("Connected to Redis successfully");

    let transport = SmtpTransport::new(smtp_config).wrap_err("Failed to configure SMTP transport")?;

    let pipeline = Pipeline {
        directory: Arc::new(PostgresUserDirectory::new(db)),
        transport: Arc::new(transport),
        composer: Arc::new(composer),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(e) = shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        let _ = shutdown_tx.send(true);
    });

    let confirmations = pipeline.spawn_worker::<ConfirmationQueue>(
        EventKind::Confirmation,
        &settings,
        confirmation_redis,
        shutdown_rx.clone(),
    );
    let reminders = pipeline.spawn_worker::<ReminderQueue>(
        EventKind::Reminder,
        &settings,
        reminder_redis,
        shutdown_rx,
    );

    info!(
        queues = ?[ConfirmationQueue::STREAM_NAME, ReminderQueue::STREAM_NAME],
        "Email worker running"
    );

    let (confirmations, reminders) = tokio::join!(confirmations, reminders);
    confirmations.wrap_err("Confirmation worker task failed")?;
    reminders.wrap_err("Reminder worker task failed")?;

    info!("Salon email worker stopped");
    Ok(())
}

async fn connect_broker(config: &RedisConfig) -> Result<ConnectionManager> {
    database::redis::connect_from_config_with_retry(config.clone(), None)
        .await
        .wrap_err("Failed to connect to Redis")
}

/// Wait for a shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .wrap_err("Failed to install SIGTERM handler")?;

        tokio::select! {
            result = signal::ctrl_c() => {
                result.wrap_err("Failed to listen for Ctrl+C")?;
                info!("Received Ctrl+C, initiating shutdown...");
            },
            _ = terminate.recv() => {
                info!("Received SIGTERM, initiating shutdown...");
            },
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.wrap_err("Failed to listen for Ctrl+C")?;
        info!("Received Ctrl+C, initiating shutdown...");
    }

    Ok(())
}
