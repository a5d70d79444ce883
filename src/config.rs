//! Pool configuration: sizing and timing parameters, validated at construction
//!
//! `PoolConfig` is immutable once built. Every way of obtaining one - the
//! builder or deserialization - funnels through the same validation, so an
//! invalid configuration is never observable and the pool constructor needs
//! no re-checks.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::pool::{DEFAULT_MAX_POOL_SIZE, DEFAULT_MIN_POOL_SIZE};
use crate::constants::timing::{
    DEFAULT_CHECK_INTERVAL, DEFAULT_IDLE_TIMEOUT, MIN_CHECK_INTERVAL, MIN_IDLE_TIMEOUT,
};
use crate::error::ConfigError;

/// Validated, immutable pool configuration
///
/// Construct via [`PoolConfig::builder`]. Serializes with durations in
/// whole milliseconds (`idle_timeout_ms`, `check_interval_ms`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawPoolConfig", into = "RawPoolConfig")]
pub struct PoolConfig {
    host: String,
    port: u16,
    name: String,
    username: Option<String>,
    password: Option<String>,
    min_pool_size: usize,
    max_pool_size: usize,
    idle_timeout: Duration,
    check_interval: Duration,
}

impl PoolConfig {
    /// Create a builder with required endpoint parameters
    ///
    /// # Examples
    ///
    /// ```
    /// use exec_pool::PoolConfig;
    /// use std::time::Duration;
    ///
    /// let config = PoolConfig::builder("engine.example.com", 9000)
    ///     .name("primary")
    ///     .min_pool_size(2)
    ///     .max_pool_size(5)
    ///     .idle_timeout(Duration::from_secs(30))
    ///     .check_interval(Duration::from_secs(10))
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(config.max_pool_size(), 5);
    /// ```
    #[must_use]
    pub fn builder(host: impl Into<String>, port: u16) -> Builder {
        Builder::new(host, port)
    }

    /// Engine hostname or IP address
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Engine port
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Friendly name used in logging (defaults to `"host:port"`)
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Authentication username, if any
    #[must_use]
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Authentication password, if any
    #[must_use]
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Floor on the number of live connections
    #[must_use]
    pub const fn min_pool_size(&self) -> usize {
        self.min_pool_size
    }

    /// Ceiling on the number of live connections
    #[must_use]
    pub const fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Idle time after which a connection becomes eligible for reclamation
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Interval between idle reclaimer sweeps
    #[must_use]
    pub const fn check_interval(&self) -> Duration {
        self.check_interval
    }
}

/// Builder for [`PoolConfig`]
///
/// All sizing and timing parameters have defaults; only the endpoint is
/// required.
#[derive(Debug, Clone)]
pub struct Builder {
    host: String,
    port: u16,
    name: Option<String>,
    username: Option<String>,
    password: Option<String>,
    min_pool_size: usize,
    max_pool_size: usize,
    idle_timeout: Duration,
    check_interval: Duration,
}

impl Builder {
    /// Create a new builder with required endpoint parameters
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            name: None,
            username: None,
            password: None,
            min_pool_size: DEFAULT_MIN_POOL_SIZE,
            max_pool_size: DEFAULT_MAX_POOL_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Set a friendly name for logging (defaults to `"host:port"`)
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the authentication username
    #[must_use]
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the authentication password
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the minimum number of warm connections
    #[must_use]
    pub fn min_pool_size(mut self, size: usize) -> Self {
        self.min_pool_size = size;
        self
    }

    /// Set the maximum number of connections
    #[must_use]
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Set the idle timeout (minimum 10 seconds)
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the reclaimer check interval (minimum 1 second)
    #[must_use]
    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Validate and freeze the configuration
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when either pool size is zero, the minimum
    /// exceeds the maximum, or a timing parameter is below its floor. No
    /// side effects either way; building a config never creates connections.
    pub fn build(self) -> Result<PoolConfig, ConfigError> {
        if self.min_pool_size == 0 {
            return Err(ConfigError::ZeroMinPoolSize);
        }
        if self.max_pool_size == 0 {
            return Err(ConfigError::ZeroMaxPoolSize);
        }
        if self.min_pool_size > self.max_pool_size {
            return Err(ConfigError::MinExceedsMax {
                min: self.min_pool_size,
                max: self.max_pool_size,
            });
        }
        if self.idle_timeout < MIN_IDLE_TIMEOUT {
            return Err(ConfigError::IdleTimeoutTooShort {
                actual: self.idle_timeout,
                minimum: MIN_IDLE_TIMEOUT,
            });
        }
        if self.check_interval < MIN_CHECK_INTERVAL {
            return Err(ConfigError::CheckIntervalTooShort {
                actual: self.check_interval,
                minimum: MIN_CHECK_INTERVAL,
            });
        }

        let name = self
            .name
            .unwrap_or_else(|| format!("{}:{}", self.host, self.port));

        Ok(PoolConfig {
            host: self.host,
            port: self.port,
            name,
            username: self.username,
            password: self.password,
            min_pool_size: self.min_pool_size,
            max_pool_size: self.max_pool_size,
            idle_timeout: self.idle_timeout,
            check_interval: self.check_interval,
        })
    }
}

/// Helper for (de)serializing `Duration` from whole milliseconds
///
/// Configuration files specify timeouts in milliseconds, so we need custom
/// serde to convert from u64 milliseconds to `Duration`.
pub mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Wire-format shadow of [`PoolConfig`]; validation happens in `TryFrom`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPoolConfig {
    host: String,
    port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default = "default_min_pool_size")]
    min_pool_size: usize,
    #[serde(default = "default_max_pool_size")]
    max_pool_size: usize,
    #[serde(
        rename = "idle_timeout_ms",
        default = "default_idle_timeout",
        with = "duration_ms_serde"
    )]
    idle_timeout: Duration,
    #[serde(
        rename = "check_interval_ms",
        default = "default_check_interval",
        with = "duration_ms_serde"
    )]
    check_interval: Duration,
}

fn default_min_pool_size() -> usize {
    DEFAULT_MIN_POOL_SIZE
}

fn default_max_pool_size() -> usize {
    DEFAULT_MAX_POOL_SIZE
}

fn default_idle_timeout() -> Duration {
    DEFAULT_IDLE_TIMEOUT
}

fn default_check_interval() -> Duration {
    DEFAULT_CHECK_INTERVAL
}

impl TryFrom<RawPoolConfig> for PoolConfig {
    type Error = ConfigError;

    fn try_from(raw: RawPoolConfig) -> Result<Self, Self::Error> {
        let mut builder = Builder::new(raw.host, raw.port)
            .min_pool_size(raw.min_pool_size)
            .max_pool_size(raw.max_pool_size)
            .idle_timeout(raw.idle_timeout)
            .check_interval(raw.check_interval);

        if let Some(name) = raw.name {
            builder = builder.name(name);
        }
        if let Some(username) = raw.username {
            builder = builder.username(username);
        }
        if let Some(password) = raw.password {
            builder = builder.password(password);
        }

        builder.build()
    }
}

impl From<PoolConfig> for RawPoolConfig {
    fn from(config: PoolConfig) -> Self {
        Self {
            host: config.host,
            port: config.port,
            name: Some(config.name),
            username: config.username,
            password: config.password,
            min_pool_size: config.min_pool_size,
            max_pool_size: config.max_pool_size,
            idle_timeout: config.idle_timeout,
            check_interval: config.check_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = Builder::new("engine.example.com", 9000).build().unwrap();

        assert_eq!(config.host(), "engine.example.com");
        assert_eq!(config.port(), 9000);
        assert_eq!(config.name(), "engine.example.com:9000");
        assert_eq!(config.min_pool_size(), DEFAULT_MIN_POOL_SIZE);
        assert_eq!(config.max_pool_size(), DEFAULT_MAX_POOL_SIZE);
        assert_eq!(config.idle_timeout(), DEFAULT_IDLE_TIMEOUT);
        assert_eq!(config.check_interval(), DEFAULT_CHECK_INTERVAL);
        assert!(config.username().is_none());
        assert!(config.password().is_none());
    }

    #[test]
    fn test_builder_chaining() {
        let config = PoolConfig::builder("engine.example.com", 9000)
            .name("primary")
            .username("svc")
            .password("secret")
            .min_pool_size(3)
            .max_pool_size(8)
            .idle_timeout(Duration::from_secs(45))
            .check_interval(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.name(), "primary");
        assert_eq!(config.username(), Some("svc"));
        assert_eq!(config.password(), Some("secret"));
        assert_eq!(config.min_pool_size(), 3);
        assert_eq!(config.max_pool_size(), 8);
        assert_eq!(config.idle_timeout(), Duration::from_secs(45));
        assert_eq!(config.check_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_min_pool_size_rejected() {
        let err = Builder::new("h", 1).min_pool_size(0).build().unwrap_err();
        assert_eq!(err, ConfigError::ZeroMinPoolSize);
    }

    #[test]
    fn test_zero_max_pool_size_rejected() {
        let err = Builder::new("h", 1)
            .min_pool_size(1)
            .max_pool_size(0)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroMaxPoolSize);
    }

    #[test]
    fn test_min_exceeding_max_rejected() {
        let err = Builder::new("h", 1)
            .min_pool_size(6)
            .max_pool_size(5)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::MinExceedsMax { min: 6, max: 5 });
    }

    #[test]
    fn test_idle_timeout_floor() {
        let err = Builder::new("h", 1)
            .idle_timeout(Duration::from_millis(9_999))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::IdleTimeoutTooShort { .. }));

        // Exactly the floor is accepted
        let config = Builder::new("h", 1)
            .idle_timeout(MIN_IDLE_TIMEOUT)
            .build()
            .unwrap();
        assert_eq!(config.idle_timeout(), MIN_IDLE_TIMEOUT);
    }

    #[test]
    fn test_check_interval_floor() {
        let err = Builder::new("h", 1)
            .check_interval(Duration::from_millis(999))
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::CheckIntervalTooShort { .. }));

        let config = Builder::new("h", 1)
            .check_interval(MIN_CHECK_INTERVAL)
            .build()
            .unwrap();
        assert_eq!(config.check_interval(), MIN_CHECK_INTERVAL);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: PoolConfig =
            serde_json::from_str(r#"{"host": "engine.example.com", "port": 9000}"#).unwrap();

        assert_eq!(config.host(), "engine.example.com");
        assert_eq!(config.min_pool_size(), DEFAULT_MIN_POOL_SIZE);
        assert_eq!(config.idle_timeout(), DEFAULT_IDLE_TIMEOUT);
    }

    #[test]
    fn test_deserialize_millisecond_durations() {
        let config: PoolConfig = serde_json::from_str(
            r#"{
                "host": "engine.example.com",
                "port": 9000,
                "min_pool_size": 2,
                "max_pool_size": 5,
                "idle_timeout_ms": 30000,
                "check_interval_ms": 10000
            }"#,
        )
        .unwrap();

        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.check_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_deserialize_rejects_invalid_sizing() {
        let result: Result<PoolConfig, _> = serde_json::from_str(
            r#"{"host": "h", "port": 1, "min_pool_size": 9, "max_pool_size": 3}"#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("min_pool_size"), "unexpected error: {err}");
    }

    #[test]
    fn test_deserialize_rejects_short_idle_timeout() {
        let result: Result<PoolConfig, _> =
            serde_json::from_str(r#"{"host": "h", "port": 1, "idle_timeout_ms": 500}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = PoolConfig::builder("engine.example.com", 9000)
            .name("primary")
            .username("svc")
            .min_pool_size(2)
            .max_pool_size(5)
            .idle_timeout(Duration::from_secs(30))
            .check_interval(Duration::from_secs(10))
            .build()
            .unwrap();

        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"idle_timeout_ms\":30000"), "json: {json}");

        let back: PoolConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
