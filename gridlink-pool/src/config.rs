//! Pool and remote-handle configuration.
//!
//! A [`PoolConfig`] is built once, either in code or from the process
//! environment, and is immutable after it is handed to a pool.

use crate::error::{PoolError, PoolResult};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_URL: &str = "SHOTGRID_URL";
pub const ENV_SCRIPT_NAME: &str = "SHOTGRID_SCRIPT_NAME";
pub const ENV_SCRIPT_KEY: &str = "SHOTGRID_SCRIPT_KEY";
pub const ENV_HTTP_PROXY: &str = "SHOTGUN_HTTP_PROXY";
pub const ENV_CA_CERTS: &str = "SHOTGUN_API_CACERTS";
pub const ENV_POOL_MAX_SIZE: &str = "SHOTGRID_POOL_MAX_SIZE";
pub const ENV_MAX_RPC_ATTEMPTS: &str = "SHOTGRID_MAX_RPC_ATTEMPTS";
pub const ENV_TIMEOUT_SECS: &str = "SHOTGRID_TIMEOUT_SECS";
pub const ENV_RPC_ATTEMPT_INTERVAL: &str = "SHOTGRID_RPC_ATTEMPT_INTERVAL";

/// Script credentials. The key is never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub script_name: String,
    pub script_key: String,
}

impl Credentials {
    pub fn new(script_name: impl Into<String>, script_key: impl Into<String>) -> Self {
        Self {
            script_name: script_name.into(),
            script_key: script_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("script_name", &self.script_name)
            .field("script_key", &"<redacted>")
            .finish()
    }
}

/// Retry and timeout parameters applied to every pool-built handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReliabilityConfig {
    /// Attempts per remote call, including the first.
    pub max_rpc_attempts: u32,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Delay between attempts.
    pub rpc_attempt_interval: Duration,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            max_rpc_attempts: 10,
            timeout: Duration::from_secs(30),
            rpc_attempt_interval: Duration::from_secs(10),
        }
    }
}

impl ReliabilityConfig {
    /// Overlays `max_rpc_attempts`, `timeout_secs` and `rpc_attempt_interval`
    /// (milliseconds) from a JSON argument map. Absent or null keys keep the
    /// defaults.
    pub fn from_args(args: &Map<String, Value>) -> PoolResult<Self> {
        let mut config = Self::default();
        if let Some(attempts) = arg_u64(args, "max_rpc_attempts")? {
            config.max_rpc_attempts = u32::try_from(attempts)
                .map_err(|_| {
                    PoolError::Config(format!("max_rpc_attempts out of range: {attempts}"))
                })?;
        }
        if let Some(secs) = arg_u64(args, "timeout_secs")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = arg_u64(args, "rpc_attempt_interval")? {
            config.rpc_attempt_interval = Duration::from_millis(ms);
        }
        Ok(config)
    }
}

fn arg_u64(args: &Map<String, Value>, key: &str) -> PoolResult<Option<u64>> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| {
                PoolError::Config(format!("{key} must be a non-negative integer, got {value}"))
            }),
    }
}

/// Everything needed to open handles against one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Base URL of the site, e.g. `https://studio.shotgrid.autodesk.com`.
    pub endpoint: String,
    pub credentials: Credentials,
    /// `None` means unlimited. A negative number deserializes as `None`.
    #[serde(default, deserialize_with = "capacity")]
    pub max_size: Option<usize>,
    #[serde(default)]
    pub reliability: ReliabilityConfig,
    #[serde(default)]
    pub http_proxy: Option<String>,
    #[serde(default)]
    pub ca_certs: Option<PathBuf>,
}

fn capacity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<usize>, D::Error> {
    let max_size = Option::<i64>::deserialize(deserializer)?;
    Ok(max_size.and_then(|n| usize::try_from(n).ok()))
}

impl PoolConfig {
    pub fn new(endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials,
            max_size: None,
            reliability: ReliabilityConfig::default(),
            http_proxy: None,
            ca_certs: None,
        }
    }

    /// Sets the capacity. Any negative value (conventionally `-1`) means unlimited.
    pub fn with_max_size(mut self, max_size: i64) -> Self {
        self.max_size = usize::try_from(max_size).ok();
        self
    }

    pub fn with_reliability(mut self, reliability: ReliabilityConfig) -> Self {
        self.reliability = reliability;
        self
    }

    pub fn with_http_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.http_proxy = Some(proxy.into());
        self
    }

    pub fn with_ca_certs(mut self, path: impl Into<PathBuf>) -> Self {
        self.ca_certs = Some(path.into());
        self
    }

    /// Reads the configuration from the process environment.
    pub fn from_env() -> PoolResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> PoolResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let required = [ENV_URL, ENV_SCRIPT_NAME, ENV_SCRIPT_KEY];
        let missing: Vec<&str> = required.iter().copied().filter(|n| get(*n).is_none()).collect();
        if !missing.is_empty() {
            return Err(PoolError::Config(format!(
                "missing environment variables: {}",
                missing.join(", ")
            )));
        }
        let [endpoint, script_name, script_key] = required.map(|n| get(n).unwrap_or_default());

        let mut config = Self::new(endpoint, Credentials::new(script_name, script_key));
        config.http_proxy = get(ENV_HTTP_PROXY);
        config.ca_certs = get(ENV_CA_CERTS).map(PathBuf::from);

        if let Some(raw) = get(ENV_POOL_MAX_SIZE) {
            config = config.with_max_size(parse_env(ENV_POOL_MAX_SIZE, &raw)?);
        }
        if let Some(raw) = get(ENV_MAX_RPC_ATTEMPTS) {
            config.reliability.max_rpc_attempts = parse_env(ENV_MAX_RPC_ATTEMPTS, &raw)?;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            config.reliability.timeout = Duration::from_secs(parse_env(ENV_TIMEOUT_SECS, &raw)?);
        }
        if let Some(raw) = get(ENV_RPC_ATTEMPT_INTERVAL) {
            config.reliability.rpc_attempt_interval =
                Duration::from_millis(parse_env(ENV_RPC_ATTEMPT_INTERVAL, &raw)?);
        }
        Ok(config)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> PoolResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| PoolError::Config(format!("{name} has an invalid value: {raw}")))
}
