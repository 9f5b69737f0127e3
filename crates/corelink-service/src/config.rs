// ============================================
// File: crates/corelink-service/src/config.rs
// ============================================
//! # Service Configuration
//!
//! ## Creation Reason
//! Collects every tunable of the link layer (queue bounds, quotas,
//! timer constants) in one TOML document.
//!
//! ## Main Functionality
//! - `CoreConfig`: top-level configuration
//! - TOML loading and parsing
//! - Per-section validation
//! - `Duration` accessors for the timer section
//!
//! ## Configuration Sections
//! - `identity`: key file path
//! - `limits`: plaintext queue and client queue bounds
//! - `bandwidth`: node-wide quota and per-neighbour defaults
//! - `timers`: corking, expiry, handshake, keep-alive, quota, decay
//! - `logging`: log level
//!
//! ## Example Configuration
//! ```toml
//! [identity]
//! key_file = "/etc/corelink/identity.json"
//!
//! [limits]
//! max_peer_queue_size = 16
//!
//! [bandwidth]
//! total_quota_out = 1048576
//! default_bw_in_out = 32768
//!
//! [timers]
//! idle_timeout_secs = 300
//! max_cork_delay_ms = 1000
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Config changes require a restart
//! - `max_peer_queue_size` below 2 would make corking impossible to leave
//!
//! ## Last Modified
//! v0.1.0 - Initial configuration implementation

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ServiceError};

// ============================================
// CoreConfig
// ============================================

/// Main service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Identity key configuration.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Queue bounds.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Bandwidth quota.
    #[serde(default)]
    pub bandwidth: BandwidthConfig,

    /// Timer constants.
    #[serde(default)]
    pub timers: TimersConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl CoreConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or validated.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.display().to_string();

        info!("Loading configuration from: {}", path_str);

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ServiceError::config_load(&path_str, e.to_string()))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ServiceError::config_load(&path_str, e.to_string()))?;

        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    /// Loads configuration from a string (useful for testing).
    ///
    /// # Errors
    /// Returns error if the content cannot be parsed or validated.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServiceError::config_load("<string>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// `ConfigInvalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        self.bandwidth.validate()?;
        self.timers.validate()?;
        Ok(())
    }

    /// Serializes configuration to TOML string.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

// ============================================
// IdentityConfig
// ============================================

/// Identity key section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Path to the JSON key file.
    #[serde(default = "default_key_file")]
    pub key_file: String,
}

fn default_key_file() -> String {
    "/etc/corelink/identity.json".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            key_file: default_key_file(),
        }
    }
}

// ============================================
// LimitsConfig
// ============================================

/// Queue bounds section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Plaintext messages queued per neighbour.
    #[serde(default = "default_max_peer_queue_size")]
    pub max_peer_queue_size: usize,

    /// Pending transmit requests per local client.
    #[serde(default = "default_max_client_queue_size")]
    pub max_client_queue_size: usize,
}

fn default_max_peer_queue_size() -> usize {
    16
}

fn default_max_client_queue_size() -> usize {
    32
}

impl LimitsConfig {
    fn validate(&self) -> Result<()> {
        if self.max_peer_queue_size < 2 {
            return Err(ServiceError::config_invalid(
                "limits.max_peer_queue_size",
                "must be at least 2",
            ));
        }
        if self.max_client_queue_size == 0 {
            return Err(ServiceError::config_invalid(
                "limits.max_client_queue_size",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_peer_queue_size: default_max_peer_queue_size(),
            max_client_queue_size: default_max_client_queue_size(),
        }
    }
}

// ============================================
// BandwidthConfig
// ============================================

/// Bandwidth section; all rates in bytes per second.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandwidthConfig {
    /// Node-wide inbound quota.
    #[serde(default = "default_total_quota")]
    pub total_quota_in: u64,

    /// Node-wide outbound quota, shared out as per-neighbour `bw_in`.
    #[serde(default = "default_total_quota")]
    pub total_quota_out: u64,

    /// Initial and minimum per-neighbour rate.
    #[serde(default = "default_bw_in_out")]
    pub default_bw_in_out: u32,

    /// Seconds of unused bandwidth a tracker may carry over.
    #[serde(default = "default_max_window_secs")]
    pub max_window_secs: u32,
}

fn default_total_quota() -> u64 {
    1024 * 1024
}

fn default_bw_in_out() -> u32 {
    32 * 1024
}

fn default_max_window_secs() -> u32 {
    300
}

impl BandwidthConfig {
    fn validate(&self) -> Result<()> {
        if self.default_bw_in_out == 0 {
            return Err(ServiceError::config_invalid(
                "bandwidth.default_bw_in_out",
                "must be greater than 0",
            ));
        }
        if self.max_window_secs == 0 {
            return Err(ServiceError::config_invalid(
                "bandwidth.max_window_secs",
                "must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for BandwidthConfig {
    fn default() -> Self {
        Self {
            total_quota_in: default_total_quota(),
            total_quota_out: default_total_quota(),
            default_bw_in_out: default_bw_in_out(),
            max_window_secs: default_max_window_secs(),
        }
    }
}

// ============================================
// TimersConfig
// ============================================

/// Timer section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[allow(clippy::struct_field_names)]
pub struct TimersConfig {
    /// Neighbour idle bound.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Longest a small batch may be held back.
    #[serde(default = "default_max_cork_delay_ms")]
    pub max_cork_delay_ms: u64,

    /// Grace after a deadline before a queued message is dropped.
    #[serde(default = "default_past_expiration_discard_ms")]
    pub past_expiration_discard_ms: u64,

    /// First key retransmission delay; doubles per retry.
    #[serde(default = "default_set_key_retry_secs")]
    pub set_key_retry_secs: u64,

    /// Lower bound on the keep-alive interval.
    #[serde(default = "default_min_ping_frequency_secs")]
    pub min_ping_frequency_secs: u64,

    /// Deadline for a PING frame; PONG gets twice this.
    #[serde(default = "default_max_ping_delay_secs")]
    pub max_ping_delay_secs: u64,

    /// Interval of the per-neighbour quota recomputation.
    #[serde(default = "default_quota_update_secs")]
    pub quota_update_secs: u64,

    /// Interval of the preference halving sweep.
    #[serde(default = "default_preference_decay_secs")]
    pub preference_decay_secs: u64,

    /// Oldest acceptable frame timestamp.
    #[serde(default = "default_max_message_age_secs")]
    pub max_message_age_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_max_cork_delay_ms() -> u64 {
    1000
}

fn default_past_expiration_discard_ms() -> u64 {
    1000
}

fn default_set_key_retry_secs() -> u64 {
    15
}

fn default_min_ping_frequency_secs() -> u64 {
    5
}

fn default_max_ping_delay_secs() -> u64 {
    10
}

fn default_quota_update_secs() -> u64 {
    5
}

fn default_preference_decay_secs() -> u64 {
    60
}

fn default_max_message_age_secs() -> u64 {
    24 * 60 * 60
}

impl TimersConfig {
    fn validate(&self) -> Result<()> {
        let non_zero = [
            ("timers.idle_timeout_secs", self.idle_timeout_secs),
            ("timers.set_key_retry_secs", self.set_key_retry_secs),
            ("timers.min_ping_frequency_secs", self.min_ping_frequency_secs),
            ("timers.quota_update_secs", self.quota_update_secs),
            ("timers.preference_decay_secs", self.preference_decay_secs),
            ("timers.max_message_age_secs", self.max_message_age_secs),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ServiceError::config_invalid(field, "must be greater than 0"));
            }
        }
        Ok(())
    }

    /// Neighbour idle bound.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Maximum cork delay.
    #[must_use]
    pub const fn max_cork_delay(&self) -> Duration {
        Duration::from_millis(self.max_cork_delay_ms)
    }

    /// Expiry grace.
    #[must_use]
    pub const fn past_expiration_discard(&self) -> Duration {
        Duration::from_millis(self.past_expiration_discard_ms)
    }

    /// Initial key retry delay.
    #[must_use]
    pub const fn set_key_retry(&self) -> Duration {
        Duration::from_secs(self.set_key_retry_secs)
    }

    /// Keep-alive floor.
    #[must_use]
    pub const fn min_ping_frequency(&self) -> Duration {
        Duration::from_secs(self.min_ping_frequency_secs)
    }

    /// PING deadline.
    #[must_use]
    pub const fn max_ping_delay(&self) -> Duration {
        Duration::from_secs(self.max_ping_delay_secs)
    }

    /// Quota recomputation interval.
    #[must_use]
    pub const fn quota_update(&self) -> Duration {
        Duration::from_secs(self.quota_update_secs)
    }

    /// Preference decay interval.
    #[must_use]
    pub const fn preference_decay(&self) -> Duration {
        Duration::from_secs(self.preference_decay_secs)
    }

    /// Oldest acceptable frame.
    #[must_use]
    pub const fn max_message_age(&self) -> Duration {
        Duration::from_secs(self.max_message_age_secs)
    }
}

impl Default for TimersConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            max_cork_delay_ms: default_max_cork_delay_ms(),
            past_expiration_discard_ms: default_past_expiration_discard_ms(),
            set_key_retry_secs: default_set_key_retry_secs(),
            min_ping_frequency_secs: default_min_ping_frequency_secs(),
            max_ping_delay_secs: default_max_ping_delay_secs(),
            quota_update_secs: default_quota_update_secs(),
            preference_decay_secs: default_preference_decay_secs(),
            max_message_age_secs: default_max_message_age_secs(),
        }
    }
}

// ============================================
// LoggingConfig
// ============================================

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_peer_queue_size, 16);
        assert_eq!(config.bandwidth.default_bw_in_out, 32 * 1024);
        assert_eq!(config.timers.max_cork_delay(), Duration::from_secs(1));
        assert_eq!(config.timers.max_message_age(), Duration::from_secs(86_400));
    }

    #[test]
    fn test_full_config_format() {
        let toml = r#"
            [identity]
            key_file = "/tmp/identity.json"

            [limits]
            max_peer_queue_size = 8
            max_client_queue_size = 4

            [bandwidth]
            total_quota_in = 65536
            total_quota_out = 131072
            default_bw_in_out = 1024
            max_window_secs = 60

            [timers]
            idle_timeout_secs = 30
            max_cork_delay_ms = 250

            [logging]
            level = "debug"
        "#;

        let config = CoreConfig::from_str(toml).unwrap();
        assert_eq!(config.identity.key_file, "/tmp/identity.json");
        assert_eq!(config.limits.max_peer_queue_size, 8);
        assert_eq!(config.bandwidth.total_quota_out, 131_072);
        assert_eq!(config.timers.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.timers.max_cork_delay(), Duration::from_millis(250));
        // unspecified keys keep defaults
        assert_eq!(config.timers.set_key_retry(), Duration::from_secs(15));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = CoreConfig::from_str("").unwrap();
        assert_eq!(config.identity.key_file, "/etc/corelink/identity.json");
        assert_eq!(config.timers.quota_update(), Duration::from_secs(5));
    }

    #[test]
    fn test_queue_size_too_small() {
        let err = CoreConfig::from_str("[limits]\nmax_peer_queue_size = 1\n").unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("max_peer_queue_size"));
    }

    #[test]
    fn test_zero_timer_rejected() {
        let err = CoreConfig::from_str("[timers]\nidle_timeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("idle_timeout_secs"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = CoreConfig::default();
        let parsed = CoreConfig::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed.timers.idle_timeout_secs, config.timers.idle_timeout_secs);
    }
}
