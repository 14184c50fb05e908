//! The Delivery Engine: poll, batch, fan out, classify, demote or retry.

use std::{collections::HashSet, sync::Arc, time::Duration};

use serde_json::json;
use tracing::{info, warn};
use webhook_broker::{BrokerConsumer, BrokerProducer, EventProducer, LogEmitter, RetryArbiter, RetryPolicy, TopicConsumer};
use webhook_cache::{CacheClient, RollingAverageMaintainer};
use webhook_common::{Batch, Event, TierPolicy};
use webhook_metrics::DeliveryMetrics;
use webhook_tracing::traced;

use crate::{
    error::DeliveryError,
    outcome::{build_client, dispatch, Outcome},
};

/// Everything a single event's dispatch needs, shared across the
/// concurrently spawned per-event tasks within one batch flush.
struct Shared<Producer: BrokerProducer, C: CacheClient, P: RetryPolicy> {
    tier: String,
    base_url: String,
    status_allow: HashSet<u16>,
    request_timeout: Duration,
    http: reqwest::Client,
    producer: Producer,
    retry_arbiter: RetryArbiter<Producer, P>,
    log_emitter: LogEmitter<Producer>,
    maintainer: RollingAverageMaintainer<C>,
    tier_policy: TierPolicy,
}

/// Drives one tier's poll/dispatch/classify loop.
///
/// Generic over the broker consumer/producer so tests can substitute
/// in-memory fakes (see `webhook_broker::fakes`) for a real Kafka client —
/// [`DeliveryEngine::new`] is the production convenience constructor that
/// wires up real `rdkafka`-backed components; [`DeliveryEngine::from_parts`]
/// accepts already-constructed ones.
pub struct DeliveryEngine<Consumer, Producer, C, P>
where
    Consumer: BrokerConsumer + 'static,
    Producer: BrokerProducer + 'static,
    C: CacheClient + 'static,
    P: RetryPolicy + 'static,
{
    consumer: Consumer,
    limit_msg: usize,
    timeout_msg: Duration,
    shared: Arc<Shared<Producer, C, P>>,
}

impl<C: CacheClient + 'static, P: RetryPolicy + 'static> DeliveryEngine<TopicConsumer, EventProducer, C, P> {
    /// Construct an engine for one tier, backed by real Kafka consumer and
    /// producer clients. `topic`/`group` identify the source topic consumed
    /// under `group`; `base_url` is prepended to every event's
    /// `webhook_url`; `request_timeout` bounds each HTTP POST.
    ///
    /// # Errors
    /// Returns [`DeliveryError`] if the Kafka consumer/producer clients or
    /// the HTTP client cannot be constructed.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bootstrap_servers: &str,
        group: &str,
        topic: &str,
        base_url: String,
        status_allow: HashSet<u16>,
        request_timeout: Duration,
        limit_msg: usize,
        timeout_msg: Duration,
        tls_verify: bool,
        log_stash_topic: &str,
        tier_policy: TierPolicy,
        maintainer: RollingAverageMaintainer<C>,
        retry_policy: P,
    ) -> Result<Self, DeliveryError> {
        let consumer = TopicConsumer::new(bootstrap_servers, group, topic)?;
        let producer = EventProducer::new(bootstrap_servers)?;
        let retry_producer = EventProducer::new(bootstrap_servers)?;
        let log_emitter = LogEmitter::from_bootstrap(bootstrap_servers, log_stash_topic)?;
        let http = build_client(tls_verify).map_err(|e| DeliveryError::ClientBuild(e.to_string()))?;

        Ok(Self::from_parts(
            consumer,
            producer,
            retry_producer,
            log_emitter,
            topic,
            base_url,
            status_allow,
            request_timeout,
            limit_msg,
            timeout_msg,
            http,
            tier_policy,
            maintainer,
            retry_policy,
        ))
    }
}

impl<Consumer, Producer, C, P> DeliveryEngine<Consumer, Producer, C, P>
where
    Consumer: BrokerConsumer + 'static,
    Producer: BrokerProducer + 'static,
    C: CacheClient + 'static,
    P: RetryPolicy + 'static,
{
    /// Construct an engine from already-built parts — the seam integration
    /// tests use to drive the loop against in-memory broker fakes.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        consumer: Consumer,
        producer: Producer,
        retry_producer: Producer,
        log_emitter: LogEmitter<Producer>,
        topic: &str,
        base_url: String,
        status_allow: HashSet<u16>,
        request_timeout: Duration,
        limit_msg: usize,
        timeout_msg: Duration,
        http: reqwest::Client,
        tier_policy: TierPolicy,
        maintainer: RollingAverageMaintainer<C>,
        retry_policy: P,
    ) -> Self {
        let retry_arbiter = RetryArbiter::new(retry_producer, topic, retry_policy);

        Self {
            consumer,
            limit_msg,
            timeout_msg,
            shared: Arc::new(Shared {
                tier: topic.to_string(),
                base_url,
                status_allow,
                request_timeout,
                http,
                producer,
                retry_arbiter,
                log_emitter,
                maintainer,
                tier_policy,
            }),
        }
    }

    /// Poll `topic` under `group` and deliver each event to its webhook
    /// until `shutdown` fires. The current poll's batch (including any
    /// in-flight flush) always runs to completion before the loop checks
    /// `shutdown` again, so a signal never truncates a flush in progress.
    pub async fn run(&self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let mut batch = Batch::new(self.limit_msg);

        loop {
            let poll_result = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(tier = %self.shared.tier, "shutdown signal received, exiting poll loop");
                    break;
                }
                result = self.consumer.poll_batch(self.timeout_msg, self.limit_msg) => result,
            };

            let raw = match poll_result {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(tier = %self.shared.tier, error = %e, "poll failed");
                    continue;
                }
            };
            let poll_was_empty = raw.is_empty();

            for record in raw {
                match Event::decode(&record) {
                    Ok(event) => batch.push(event),
                    Err(e) => {
                        warn!(tier = %self.shared.tier, error = %e, "dropping unparseable record");
                        if webhook_metrics::is_enabled() {
                            webhook_metrics::metrics().record_outcome(&self.shared.tier, "parse_error");
                        }
                    }
                }
            }

            if batch.should_flush(poll_was_empty) {
                self.flush(batch.take()).await;
            }
        }
    }

    #[traced(instrument(level = tracing::Level::DEBUG, skip(self), fields(tier = %self.shared.tier)), timing(precision = "ms"))]
    async fn flush(&self, events: Vec<Event>) {
        let started = std::time::Instant::now();
        let tasks: Vec<_> = events
            .into_iter()
            .map(|event| {
                let shared = self.shared.clone();
                tokio::spawn(async move { process_event(shared, event).await })
            })
            .collect();

        for task in tasks {
            let _ = task.await;
        }

        let elapsed = started.elapsed().as_secs_f64();
        if webhook_metrics::is_enabled() {
            webhook_metrics::metrics().record_batch_duration(&self.shared.tier, elapsed);
        }
    }
}

async fn process_event<Producer: BrokerProducer + 'static, C: CacheClient + 'static, P: RetryPolicy + 'static>(
    shared: Arc<Shared<Producer, C, P>>,
    event: Event,
) {
    let outcome = dispatch(
        &shared.http,
        &shared.base_url,
        &event,
        &shared.status_allow,
        shared.request_timeout,
    )
    .await;

    match outcome {
        Outcome::Delivered { response_time } => {
            shared
                .log_emitter
                .emit(&json!({"kind": "response", "status": "delivered"}), &event.pkg_code)
                .await;
            if let Err(e) = shared.maintainer.observe(&event.shop_id, response_time.as_secs_f64()).await {
                warn!(pkg_code = %event.pkg_code, error = %e, "failed to update rolling average");
            }
            record_outcome(&shared, "success", Some(response_time.as_secs_f64()));
        }
        Outcome::Retryable { status, response_time } => {
            shared
                .log_emitter
                .emit(&json!({"kind": "response", "status": status}), &event.pkg_code)
                .await;
            if let Err(e) = shared.maintainer.observe(&event.shop_id, response_time.as_secs_f64()).await {
                warn!(pkg_code = %event.pkg_code, error = %e, "failed to update rolling average");
            }
            record_outcome(&shared, "retryable", Some(response_time.as_secs_f64()));

            // Backoff can run up to max_delay_secs; scheduling it onto its own
            // task keeps this flush (and the poll loop behind it) from
            // stalling on a single flaky merchant's retry.
            let retry_shared = shared.clone();
            let payload = event.to_bytes();
            let pkg_code = event.pkg_code.clone();
            tokio::spawn(async move {
                retry_shared.retry_arbiter.retry(&pkg_code, &payload).await;
                if webhook_metrics::is_enabled() {
                    webhook_metrics::metrics().record_retry(&retry_shared.tier);
                }
            });
        }
        Outcome::Failed => {
            shared
                .log_emitter
                .emit(&json!({"kind": "timeout"}), &event.pkg_code)
                .await;
            record_outcome(&shared, "demoted", None);
            demote(&shared, event).await;
        }
    }
}

async fn demote<Producer: BrokerProducer, C: CacheClient, P: RetryPolicy>(shared: &Shared<Producer, C, P>, event: Event) {
    match shared.tier_policy.next_tier(&shared.tier) {
        Some(next_topic) => {
            let next_topic = next_topic.to_string();
            shared.producer.produce(&next_topic, &event.pkg_code, &event.to_bytes()).await;
            if webhook_metrics::is_enabled() {
                webhook_metrics::metrics().record_demotion(&shared.tier);
            }
            info!(pkg_code = %event.pkg_code, from = %shared.tier, to = %next_topic, "demoted event");
        }
        None => {
            warn!(pkg_code = %event.pkg_code, tier = %shared.tier, "no lower tier, dropping event");
            if webhook_metrics::is_enabled() {
                webhook_metrics::metrics().record_drop(&shared.tier, "no_lower_tier");
            }
        }
    }
}

fn record_outcome<Producer: BrokerProducer, C: CacheClient, P: RetryPolicy>(
    shared: &Shared<Producer, C, P>,
    classification: &str,
    response_time_secs: Option<f64>,
) {
    if !webhook_metrics::is_enabled() {
        return;
    }
    let metrics: &DeliveryMetrics = webhook_metrics::metrics();
    metrics.record_outcome(&shared.tier, classification);
    if let Some(secs) = response_time_secs {
        metrics.record_response_time(&shared.tier, secs);
    }
}
