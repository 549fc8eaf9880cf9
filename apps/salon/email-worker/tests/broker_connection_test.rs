//! Blocking reads against a real Redis.
//!
//! Requires Docker: `cargo test -p salon_email_worker -- --ignored`

use database::redis::{RedisConfig, connect_from_config_with_retry};
use domain_reservations::{ConfirmationQueue, ReminderQueue};
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};
use stream_worker::{MessageStream, StreamConsumer, StreamDef, WorkerConfig};
use test_utils::{TestDataBuilder, TestRedis};

const BLOCK: Duration = Duration::from_millis(1500);

async fn blocking_consumer<Q: StreamDef>(redis: &TestRedis, stream: &str) -> StreamConsumer {
    let group = Q::consumer_group();
    let config = RedisConfig::new(redis.connection_string()).for_blocking_reads(Some(BLOCK));
    let conn = connect_from_config_with_retry(config, None).await.unwrap();

    let worker_config = WorkerConfig::new(stream, group)
        .with_blocking(Some(BLOCK.as_millis() as u64));
    let consumer = StreamConsumer::new(Arc::new(conn), worker_config);
    consumer.ensure_group().await.unwrap();
    consumer
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_idle_blocking_read_returns_empty_instead_of_timing_out() {
    let redis = TestRedis::new().await;
    let stream = TestDataBuilder::from_test_name("idle_block").stream_name("confirmation-queue");
    let consumer = blocking_consumer::<ConfirmationQueue>(&redis, &stream).await;

    let started = Instant::now();
    let events = consumer.read_new(10).await.unwrap();

    assert!(events.is_empty());
    assert!(started.elapsed() >= BLOCK - Duration::from_millis(100));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_one_queue_blocking_does_not_delay_the_other() {
    let redis = TestRedis::new().await;
    let names = TestDataBuilder::from_test_name("independent_queues");
    let confirmations = names.stream_name("confirmation-queue");
    let reminders = names.stream_name("reminder-queue");

    let confirmation = blocking_consumer::<ConfirmationQueue>(&redis, &confirmations).await;
    let reminder = blocking_consumer::<ReminderQueue>(&redis, &reminders).await;

    let idle_read = tokio::spawn(async move { confirmation.read_new(10).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut conn = redis.connection().await;
    let id: String = conn.xadd(&reminders, "*", &[("job", "{}")]).await.unwrap();

    let started = Instant::now();
    let events = reminder.read_new(10).await.unwrap();
    assert_eq!(events[0].stream_id, id);
    reminder.ack(&id).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));

    assert!(idle_read.await.unwrap().unwrap().is_empty());
}
