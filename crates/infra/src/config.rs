//! Engine configuration loaded from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::projections::requisition_board::DEFAULT_ACTIVITY_CAPACITY;
use crate::vendor::RetryPolicy;

const DEV_JWT_SECRET: &str = "reqflow-dev-secret";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    /// Per gateway call.
    pub vendor_timeout: Duration,
    pub vendor_retry: RetryPolicy,
    /// `None` disables the background vendor poller.
    pub vendor_poll_interval: Option<Duration>,
    pub activity_capacity: usize,
    /// `None` disables the escalation view.
    pub escalation_after: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            vendor_timeout: Duration::from_millis(5000),
            vendor_retry: RetryPolicy::default(),
            vendor_poll_interval: None,
            activity_capacity: DEFAULT_ACTIVITY_CAPACITY,
            escalation_after: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults and
    /// malformed ones fall back with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let jwt_secret = match lookup("JWT_SECRET").filter(|s| !s.trim().is_empty()) {
            Some(secret) => secret,
            None => {
                warn!("JWT_SECRET not set; using insecure dev default");
                defaults.jwt_secret.clone()
            }
        };

        let base = millis(&lookup, "REQFLOW_VENDOR_BACKOFF_BASE_MS", defaults.vendor_retry.base_delay);
        let cap = millis(&lookup, "REQFLOW_VENDOR_BACKOFF_MAX_MS", defaults.vendor_retry.max_delay);
        let attempts = parsed(&lookup, "REQFLOW_VENDOR_MAX_ATTEMPTS", defaults.vendor_retry.max_attempts);

        let poll_ms: u64 = parsed(&lookup, "REQFLOW_VENDOR_POLL_INTERVAL_MS", 0);
        let escalation_secs: Option<u64> = lookup("REQFLOW_ESCALATION_AFTER_SECS")
            .and_then(|raw| parse_or_warn("REQFLOW_ESCALATION_AFTER_SECS", &raw));

        Self {
            bind_addr: parsed(&lookup, "REQFLOW_BIND_ADDR", defaults.bind_addr),
            jwt_secret,
            vendor_timeout: millis(&lookup, "REQFLOW_VENDOR_TIMEOUT_MS", defaults.vendor_timeout),
            vendor_retry: RetryPolicy::exponential(attempts.max(1), base, cap.max(base)),
            vendor_poll_interval: (poll_ms > 0).then(|| Duration::from_millis(poll_ms)),
            activity_capacity: parsed(&lookup, "REQFLOW_ACTIVITY_CAPACITY", defaults.activity_capacity).max(1),
            escalation_after: escalation_secs.map(Duration::from_secs),
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
{
    lookup(key)
        .and_then(|raw| parse_or_warn(key, &raw))
        .unwrap_or(default)
}

fn millis(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: Duration) -> Duration {
    lookup(key)
        .and_then(|raw| parse_or_warn::<u64>(key, &raw))
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn parse_or_warn<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = raw, "ignoring malformed configuration value");
            None
        }
    }
}
