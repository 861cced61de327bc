//! Server configuration read from `LINKAPP_*` environment variables.

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use linktag_core::retry::{DEFAULT_BASE_SLEEP, DEFAULT_MAX_ATTEMPTS};
use linktag_core::{AuditFailurePolicy, RetryPolicy};
use thiserror::Error;

pub const LISTEN_ADDR: &str = "LINKAPP_LISTEN_ADDR";
pub const REDIS_URL: &str = "LINKAPP_REDIS_URL";
pub const RABBIT_URL: &str = "LINKAPP_RABBIT_URL";
pub const BROKER_RETRIES: &str = "LINKAPP_BROKER_RETRIES";
pub const BROKER_RETRY_SLEEP: &str = "LINKAPP_BROKER_RETRY_SLEEP";
pub const BROKER_RETRY_MAX_SLEEP: &str = "LINKAPP_BROKER_RETRY_MAX_SLEEP";
pub const BROKER_RETRY_JITTER: &str = "LINKAPP_BROKER_RETRY_JITTER";
pub const LISTING_PER_PAGE: &str = "LINKAPP_LISTING_PER_PAGE";
pub const AUDIT_FAILURE: &str = "LINKAPP_AUDIT_FAILURE";

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_LISTING_PER_PAGE: u64 = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &'static str, value: &str, reason: impl Display) -> Self {
        Self::Invalid {
            key,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

const REDIS_SCHEMES: &[&str] = &["redis", "rediss", "redis+unix", "unix"];
const AMQP_SCHEMES: &[&str] = &["amqp", "amqps"];

/// Where the tag index keeps its sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process store; contents are lost on exit
    Memory,
    Redis(String),
}

/// Where work items and audit events are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerBackend {
    /// In-process broker; audit events are written to the log
    Memory,
    Amqp(String),
}

impl StoreBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Redis(_) => "redis",
        }
    }
}

impl BrokerBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Amqp(_) => "amqp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds
    pub listen_addr: SocketAddr,

    /// Key-value store backing the index
    pub store: StoreBackend,

    /// Message broker for work items and audit events
    pub broker: BrokerBackend,

    /// Backoff for (re)connecting to the broker
    pub broker_retry: RetryPolicy,

    /// Links per page on `GET /tag/{tag}`
    pub listing_per_page: u64,

    /// What a failed audit write does to the request that caused it
    pub audit_failure: AuditFailurePolicy,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let listen_addr = match get(LISTEN_ADDR) {
            Some(raw) => parse(LISTEN_ADDR, &raw)?,
            None => parse(LISTEN_ADDR, DEFAULT_LISTEN_ADDR)?,
        };

        let store = match get(REDIS_URL) {
            Some(raw) => StoreBackend::Redis(url(REDIS_URL, &raw, REDIS_SCHEMES)?),
            None => StoreBackend::Memory,
        };

        let broker = match get(RABBIT_URL) {
            Some(raw) => BrokerBackend::Amqp(url(RABBIT_URL, &raw, AMQP_SCHEMES)?),
            None => BrokerBackend::Memory,
        };

        let retries = match get(BROKER_RETRIES) {
            Some(raw) => {
                let retries: u32 = parse(BROKER_RETRIES, &raw)?;
                if retries == 0 {
                    return Err(ConfigError::invalid(BROKER_RETRIES, &raw, "must be at least 1"));
                }
                retries
            }
            None => DEFAULT_MAX_ATTEMPTS,
        };

        let base_sleep = match get(BROKER_RETRY_SLEEP) {
            Some(raw) => seconds(BROKER_RETRY_SLEEP, &raw)?,
            None => DEFAULT_BASE_SLEEP,
        };

        let mut broker_retry = RetryPolicy::new(retries, base_sleep);
        if let Some(raw) = get(BROKER_RETRY_MAX_SLEEP) {
            broker_retry = broker_retry.with_max_sleep(seconds(BROKER_RETRY_MAX_SLEEP, &raw)?);
        }
        if let Some(raw) = get(BROKER_RETRY_JITTER) {
            broker_retry = broker_retry.with_jitter(flag(BROKER_RETRY_JITTER, &raw)?);
        }

        let listing_per_page = match get(LISTING_PER_PAGE) {
            Some(raw) => {
                let per_page: u64 = parse(LISTING_PER_PAGE, &raw)?;
                if per_page == 0 {
                    return Err(ConfigError::invalid(LISTING_PER_PAGE, &raw, "must be at least 1"));
                }
                per_page
            }
            None => DEFAULT_LISTING_PER_PAGE,
        };

        let audit_failure = match get(AUDIT_FAILURE) {
            Some(raw) => parse(AUDIT_FAILURE, &raw)?,
            None => AuditFailurePolicy::default(),
        };

        Ok(Self {
            listen_addr,
            store,
            broker,
            broker_retry,
            listing_per_page,
            audit_failure,
        })
    }
}

fn parse<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse().map_err(|e| ConfigError::invalid(key, raw, e))
}

/// Accept `raw` when its scheme is one of `schemes`; the rest is left to the client library.
fn url(key: &'static str, raw: &str, schemes: &[&str]) -> Result<String, ConfigError> {
    match raw.split_once("://") {
        Some((scheme, rest)) if !rest.is_empty() && schemes.contains(&scheme) => Ok(raw.to_string()),
        _ => Err(ConfigError::invalid(
            key,
            raw,
            format!("expected a {}:// URL", schemes[0]),
        )),
    }
}

fn seconds(key: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let secs: f64 = parse(key, raw)?;
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::invalid(key, raw, e))
}

fn flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected true or false")),
    }
}
