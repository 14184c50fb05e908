//! Environment-sourced configuration.
//!
//! Every constant the delivery engine needs (`LIMIT_MSG`, `TIMEOUT_MSG`,
//! `STATUS_ALLOW`, `LIMIT_REDIS_MSG`, `RANK_TOPIC`, per-tier timeouts) has a
//! compiled-in default and an environment override, following the same
//! "env var with a fallback" idiom the original worker used.

use std::{collections::HashSet, env, time::Duration};

use crate::error::CoreError;

fn default_limit_msg() -> usize {
    100
}

fn default_timeout_msg_ms() -> u64 {
    1_000
}

fn default_limit_redis_msg() -> usize {
    20
}

fn default_status_allow() -> HashSet<u16> {
    [500, 502, 503, 504].into_iter().collect()
}

fn default_log_stash_topic() -> String {
    "logstash_topic".to_string()
}

fn default_metrics_endpoint() -> String {
    "http://localhost:4318/v1/metrics".to_string()
}

fn default_tier_timeout_secs() -> u64 {
    3
}

/// The retry/batching limits and constants the delivery engine consults
/// on every poll and every HTTP outcome.
#[derive(Debug, Clone)]
pub struct DeliveryLimits {
    /// Maximum records per poll, and the batch flush threshold.
    pub limit_msg: usize,
    /// How long a single poll blocks waiting for records.
    pub timeout_msg: Duration,
    /// Maximum response times kept in a merchant's rolling window.
    pub limit_redis_msg: usize,
    /// HTTP status codes that trigger a same-tier retry rather than a
    /// plain success classification.
    pub status_allow: HashSet<u16>,
}

impl DeliveryLimits {
    fn from_env() -> Result<Self, CoreError> {
        Ok(Self {
            limit_msg: parse_env_or("LIMIT_MSG", default_limit_msg())?,
            timeout_msg: Duration::from_millis(parse_env_or(
                "TIMEOUT_MSG",
                default_timeout_msg_ms(),
            )?),
            limit_redis_msg: parse_env_or("LIMIT_REDIS_MSG", default_limit_redis_msg())?,
            status_allow: match env::var("STATUS_ALLOW") {
                Ok(raw) => parse_status_allow(&raw)?,
                Err(_) => default_status_allow(),
            },
        })
    }
}

fn parse_status_allow(raw: &str) -> Result<HashSet<u16>, CoreError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>().map_err(|e| CoreError::InvalidEnv {
                name: "STATUS_ALLOW",
                reason: e.to_string(),
            })
        })
        .collect()
}

fn parse_env_or<T>(name: &'static str, default: T) -> Result<T, CoreError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| CoreError::InvalidEnv {
            name,
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// One tier's (topic, consumer group, request timeout) triple — the value
/// that replaces per-tier subclassing.
#[derive(Debug, Clone)]
pub struct TierConfiguration {
    pub topic: String,
    pub group: String,
    pub request_timeout: Duration,
}

impl TierConfiguration {
    /// Build a tier configuration from `<TIER>_TOPIC`, `<TIER>_GROUP`, and
    /// `<TIER>_TIMEOUT_REQUEST`, where `tier` is the upper-cased prefix
    /// (e.g. `"GOLD"`).
    pub fn from_env(tier: &str, default_topic: &str, default_group: &str) -> Result<Self, CoreError> {
        let topic = env::var(format!("{tier}_TOPIC")).unwrap_or_else(|_| default_topic.to_string());
        let group = env::var(format!("{tier}_GROUP")).unwrap_or_else(|_| default_group.to_string());
        let timeout_var = format!("{tier}_TIMEOUT_REQUEST");
        let timeout_secs = match env::var(&timeout_var) {
            Ok(raw) => raw.parse().map_err(|e: std::num::ParseIntError| CoreError::InvalidEnv {
                name: "<TIER>_TIMEOUT_REQUEST",
                reason: e.to_string(),
            })?,
            Err(_) => default_tier_timeout_secs(),
        };
        Ok(Self {
            topic,
            group,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

/// Process-wide, environment-sourced worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub bootstrap_servers: String,
    pub redis_host: String,
    pub redis_port: u16,
    pub webhook_url: String,
    pub log_stash_topic: String,
    pub webhook_tls_verify: bool,
    pub metrics_enabled: bool,
    pub metrics_endpoint: String,
    pub limits: DeliveryLimits,
    pub tier_ranking: Vec<String>,
}

impl WorkerSettings {
    /// Load settings from the process environment.
    ///
    /// # Errors
    /// Returns [`CoreError`] if a required variable is missing or an
    /// overridden numeric/list variable fails to parse.
    pub fn from_env() -> Result<Self, CoreError> {
        let bootstrap_servers = env::var("BOOTSTRAP_SERVERS")
            .unwrap_or_else(|_| "kafka101:29092,kafka102:29092,kafka103:29092".to_string());
        let redis_host = env::var("REDIS_HOST").unwrap_or_else(|_| "redis".to_string());
        let redis_port = parse_env_or("REDIS_PORT", 6379u16)?;
        let webhook_url = env::var("WEBHOOK_URL").map_err(|_| CoreError::MissingEnv("WEBHOOK_URL"))?;
        let log_stash_topic =
            env::var("LOG_STASH_TOPIC").unwrap_or_else(|_| default_log_stash_topic());
        let webhook_tls_verify = match env::var("WEBHOOK_TLS_VERIFY") {
            Ok(raw) => raw.eq_ignore_ascii_case("true"),
            Err(_) => false,
        };
        let metrics_enabled = match env::var("METRICS_ENABLED") {
            Ok(raw) => !raw.eq_ignore_ascii_case("false"),
            Err(_) => true,
        };
        let metrics_endpoint =
            env::var("METRICS_ENDPOINT").unwrap_or_else(|_| default_metrics_endpoint());
        let tier_ranking = match env::var("RANK_TOPIC") {
            Ok(raw) => raw.split(',').map(str::trim).map(str::to_string).collect(),
            Err(_) => vec![
                "gold_topic".to_string(),
                "silver_topic".to_string(),
                "bronze_topic".to_string(),
            ],
        };

        Ok(Self {
            bootstrap_servers,
            redis_host,
            redis_port,
            webhook_url,
            log_stash_topic,
            webhook_tls_verify,
            metrics_enabled,
            metrics_endpoint,
            limits: DeliveryLimits::from_env()?,
            tier_ranking,
        })
    }

    #[must_use]
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialise tests that touch
    // them so they don't race.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in [
            "BOOTSTRAP_SERVERS",
            "REDIS_HOST",
            "REDIS_PORT",
            "WEBHOOK_URL",
            "LOG_STASH_TOPIC",
            "WEBHOOK_TLS_VERIFY",
            "METRICS_ENABLED",
            "METRICS_ENDPOINT",
            "LIMIT_MSG",
            "TIMEOUT_MSG",
            "LIMIT_REDIS_MSG",
            "STATUS_ALLOW",
            "RANK_TOPIC",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn defaults_apply_with_no_overrides() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("WEBHOOK_URL", "https://example.test");

        let settings = WorkerSettings::from_env().expect("webhook url is set");

        assert_eq!(settings.limits.limit_msg, default_limit_msg());
        assert_eq!(settings.limits.timeout_msg, Duration::from_millis(1_000));
        assert_eq!(settings.log_stash_topic, "logstash_topic");
        assert!(!settings.webhook_tls_verify);
        assert_eq!(
            settings.tier_ranking,
            vec!["gold_topic", "silver_topic", "bronze_topic"]
        );

        clear_env();
    }

    #[test]
    fn missing_webhook_url_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        assert!(matches!(
            WorkerSettings::from_env(),
            Err(CoreError::MissingEnv("WEBHOOK_URL"))
        ));
    }

    #[test]
    fn status_allow_overrides_parse_as_a_set() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("WEBHOOK_URL", "https://example.test");
        env::set_var("STATUS_ALLOW", "500, 503");

        let settings = WorkerSettings::from_env().unwrap();
        assert_eq!(settings.limits.status_allow, [500, 503].into_iter().collect());

        clear_env();
    }

    #[test]
    fn tier_configuration_falls_back_to_defaults() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let tier = TierConfiguration::from_env("GOLD", "gold_topic", "gold_group").unwrap();
        assert_eq!(tier.topic, "gold_topic");
        assert_eq!(tier.group, "gold_group");
        assert_eq!(tier.request_timeout, Duration::from_secs(3));
    }
}
