//! Engine-level integration tests: drive the real poll/flush/dispatch loop
//! against in-memory broker fakes and a mocked webhook endpoint, covering
//! the batch-flush, retry, demotion, and tail-drop scenarios end-to-end.

use std::{collections::HashSet, sync::Arc, time::Duration};

use serde_json::json;
use webhook_broker::{
    fakes::{InMemoryBrokerConsumer, InMemoryBrokerProducer},
    ExponentialBackoff, LogEmitter,
};
use webhook_cache::{InMemoryCacheClient, RollingAverageMaintainer};
use webhook_common::TierPolicy;
use webhook_delivery::{outcome::build_client, DeliveryEngine};
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn event_bytes(pkg_code: &str, shop_id: &str, webhook_path: &str) -> Vec<u8> {
    json!({
        "pkg_code": pkg_code,
        "shop_id": shop_id,
        "package_status_id": 1,
        "webhook_url": webhook_path,
    })
    .to_string()
    .into_bytes()
}

/// No-delay backoff so retry scenarios don't actually wait out a real
/// `ExponentialBackoff::default()`'s 30s base delay.
fn immediate_retry() -> ExponentialBackoff {
    ExponentialBackoff {
        max_attempts: 5,
        base_delay_secs: 0,
        max_delay_secs: 0,
        jitter_factor: 0.0,
    }
}

/// Run `engine` in the background, let it process its seeded poll batches,
/// then signal shutdown and wait for the loop to exit. Mirrors how
/// `webhook-worker`'s binary drives the same `run`/shutdown-broadcast pair.
async fn drive_to_completion<Consumer, Producer, C, P>(engine: DeliveryEngine<Consumer, Producer, C, P>)
where
    Consumer: webhook_broker::BrokerConsumer + Send + Sync + 'static,
    Producer: webhook_broker::BrokerProducer + Send + Sync + 'static,
    C: webhook_cache::CacheClient + Send + Sync + 'static,
    P: webhook_broker::RetryPolicy + Send + Sync + 'static,
{
    let (tx, rx) = tokio::sync::broadcast::channel(1);
    let handle = tokio::spawn(async move { engine.run(rx).await });
    tokio::time::sleep(Duration::from_millis(150)).await;
    let _ = tx.send(());
    let _ = handle.await;
}

#[tokio::test]
async fn batch_flushes_at_threshold_and_updates_the_rolling_average() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let consumer = InMemoryBrokerConsumer::new(vec![vec![
        event_bytes("PKG-A", "shop-1", "/hook"),
        event_bytes("PKG-B", "shop-1", "/hook"),
    ]]);
    let demotion_producer = Arc::new(InMemoryBrokerProducer::new());
    let retry_producer = Arc::new(InMemoryBrokerProducer::new());
    let log_producer = Arc::new(InMemoryBrokerProducer::new());
    let log_emitter = LogEmitter::new(log_producer.clone(), "logstash_topic");

    let cache = Arc::new(InMemoryCacheClient::new());
    cache.ensure_record("shop-1").await.unwrap();
    let maintainer = RollingAverageMaintainer::new(cache.clone(), 20);

    let engine = DeliveryEngine::from_parts(
        consumer,
        demotion_producer.clone(),
        retry_producer,
        log_emitter,
        "gold_topic",
        server.uri(),
        [500u16, 502, 503, 504].into_iter().collect::<HashSet<_>>(),
        Duration::from_secs(5),
        2,
        Duration::from_millis(50),
        build_client(true).unwrap(),
        TierPolicy::new(vec!["gold_topic".into(), "silver_topic".into()]),
        maintainer,
        immediate_retry(),
    );

    drive_to_completion(engine).await;

    let record = cache.get_record("shop-1").await.unwrap().unwrap();
    assert_eq!(record.time_responses.len(), 2);
    assert!(demotion_producer.published().is_empty());
}

#[tokio::test]
async fn empty_poll_flushes_a_partial_batch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    // Limit is 10, so the single event only flushes because the next poll
    // comes back empty.
    let consumer = InMemoryBrokerConsumer::new(vec![vec![event_bytes("PKG-A", "shop-1", "/hook")], vec![]]);
    let demotion_producer = Arc::new(InMemoryBrokerProducer::new());
    let retry_producer = Arc::new(InMemoryBrokerProducer::new());
    let log_producer = Arc::new(InMemoryBrokerProducer::new());
    let log_emitter = LogEmitter::new(log_producer, "logstash_topic");

    let cache = Arc::new(InMemoryCacheClient::new());
    cache.ensure_record("shop-1").await.unwrap();
    let maintainer = RollingAverageMaintainer::new(cache.clone(), 20);

    let engine = DeliveryEngine::from_parts(
        consumer,
        demotion_producer,
        retry_producer,
        log_emitter,
        "gold_topic",
        server.uri(),
        [500u16, 502, 503, 504].into_iter().collect::<HashSet<_>>(),
        Duration::from_secs(5),
        10,
        Duration::from_millis(20),
        build_client(true).unwrap(),
        TierPolicy::new(vec!["gold_topic".into(), "silver_topic".into()]),
        maintainer,
        immediate_retry(),
    );

    drive_to_completion(engine).await;

    let record = cache.get_record("shop-1").await.unwrap().unwrap();
    assert_eq!(record.time_responses.len(), 1);
}

#[tokio::test]
async fn retryable_status_invokes_the_retry_arbiter() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let consumer = InMemoryBrokerConsumer::new(vec![vec![event_bytes("PKG-A", "shop-1", "/hook")]]);
    let demotion_producer = Arc::new(InMemoryBrokerProducer::new());
    let retry_producer = Arc::new(InMemoryBrokerProducer::new());
    let log_producer = Arc::new(InMemoryBrokerProducer::new());
    let log_emitter = LogEmitter::new(log_producer, "logstash_topic");

    let cache = Arc::new(InMemoryCacheClient::new());
    cache.ensure_record("shop-1").await.unwrap();
    let maintainer = RollingAverageMaintainer::new(cache.clone(), 20);

    let engine = DeliveryEngine::from_parts(
        consumer,
        demotion_producer.clone(),
        retry_producer.clone(),
        log_emitter,
        "gold_topic",
        server.uri(),
        [500u16, 502, 503, 504].into_iter().collect::<HashSet<_>>(),
        Duration::from_secs(5),
        1,
        Duration::from_millis(20),
        build_client(true).unwrap(),
        TierPolicy::new(vec!["gold_topic".into(), "silver_topic".into()]),
        maintainer,
        immediate_retry(),
    );

    drive_to_completion(engine).await;

    let retries = retry_producer.published();
    assert_eq!(retries.len(), 1);
    assert_eq!(retries[0].0, "gold_topic");
    assert_eq!(retries[0].1, "PKG-A");
    assert!(demotion_producer.published().is_empty());

    // A retryable response still counts toward the rolling average — a
    // response was in fact received within that wall-clock time.
    let record = cache.get_record("shop-1").await.unwrap().unwrap();
    assert_eq!(record.time_responses.len(), 1);
}

#[tokio::test]
async fn transport_failure_demotes_to_the_next_lower_tier() {
    let consumer = InMemoryBrokerConsumer::new(vec![vec![event_bytes("PKG-A", "shop-1", "/hook")]]);
    let demotion_producer = Arc::new(InMemoryBrokerProducer::new());
    let retry_producer = Arc::new(InMemoryBrokerProducer::new());
    let log_producer = Arc::new(InMemoryBrokerProducer::new());
    let log_emitter = LogEmitter::new(log_producer, "logstash_topic");

    let cache = Arc::new(InMemoryCacheClient::new());
    cache.ensure_record("shop-1").await.unwrap();
    let maintainer = RollingAverageMaintainer::new(cache.clone(), 20);

    let engine = DeliveryEngine::from_parts(
        consumer,
        demotion_producer.clone(),
        retry_producer,
        log_emitter,
        "gold_topic",
        // Nothing listens here: every dispatch is a transport failure.
        "http://127.0.0.1:1".to_string(),
        [500u16, 502, 503, 504].into_iter().collect::<HashSet<_>>(),
        Duration::from_millis(200),
        1,
        Duration::from_millis(20),
        build_client(true).unwrap(),
        TierPolicy::new(vec!["gold_topic".into(), "silver_topic".into(), "bronze_topic".into()]),
        maintainer,
        immediate_retry(),
    );

    drive_to_completion(engine).await;

    let demotions = demotion_producer.published();
    assert_eq!(demotions.len(), 1);
    assert_eq!(demotions[0].0, "silver_topic");
    assert_eq!(demotions[0].1, "PKG-A");

    // Transport failures never update the rolling average.
    let record = cache.get_record("shop-1").await.unwrap().unwrap();
    assert!(record.time_responses.is_empty());
}

#[tokio::test]
async fn tail_tier_drops_instead_of_demoting() {
    let consumer = InMemoryBrokerConsumer::new(vec![vec![event_bytes("PKG-A", "shop-1", "/hook")]]);
    let demotion_producer = Arc::new(InMemoryBrokerProducer::new());
    let retry_producer = Arc::new(InMemoryBrokerProducer::new());
    let log_producer = Arc::new(InMemoryBrokerProducer::new());
    let log_emitter = LogEmitter::new(log_producer, "logstash_topic");

    let cache = Arc::new(InMemoryCacheClient::new());
    let maintainer = RollingAverageMaintainer::new(cache.clone(), 20);

    let engine = DeliveryEngine::from_parts(
        consumer,
        demotion_producer.clone(),
        retry_producer,
        log_emitter,
        "bronze_topic",
        "http://127.0.0.1:1".to_string(),
        [500u16, 502, 503, 504].into_iter().collect::<HashSet<_>>(),
        Duration::from_millis(200),
        1,
        Duration::from_millis(20),
        build_client(true).unwrap(),
        TierPolicy::new(vec!["gold_topic".into(), "silver_topic".into(), "bronze_topic".into()]),
        maintainer,
        immediate_retry(),
    );

    drive_to_completion(engine).await;

    assert!(demotion_producer.published().is_empty());
}
