// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session configuration.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use trap_opcda::config::SessionConfig;
//!
//! let config = SessionConfig::builder()
//!     .health_interval(Duration::from_secs(10))
//!     .default_host("10.0.0.5")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.health_interval, Duration::from_secs(10));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, OpcDaError, OpcDaResult};

/// Host used when discovery is queried without an explicit host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

// =============================================================================
// SessionConfig
// =============================================================================

/// Configuration of a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Period of the health daemon.
    #[serde(default = "default_health_interval")]
    #[serde(with = "humantime_serde")]
    pub health_interval: Duration,

    /// Host queried by [`Session::available_servers`](crate::Session::available_servers)
    /// when none is given.
    #[serde(default = "default_host")]
    pub default_host: String,

    /// Percent deadband applied to newly created groups.
    #[serde(default)]
    pub group_deadband: f32,
}

fn default_health_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            health_interval: default_health_interval(),
            default_host: default_host(),
            group_deadband: 0.0,
        }
    }
}

impl SessionConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Validates this configuration.
    pub fn validate(&self) -> OpcDaResult<()> {
        if self.health_interval.is_zero() {
            return Err(OpcDaError::configuration(ConfigurationError::invalid_interval(
                "health_interval",
                self.health_interval,
                "Health interval must be greater than 0",
            )));
        }

        if self.default_host.trim().is_empty() {
            return Err(OpcDaError::configuration(ConfigurationError::missing_field(
                "default_host",
            )));
        }

        if !(0.0..=100.0).contains(&self.group_deadband) {
            return Err(OpcDaError::configuration(ConfigurationError::invalid_value(
                "group_deadband",
                format!("{} is outside 0..=100 percent", self.group_deadband),
            )));
        }

        Ok(())
    }
}

// =============================================================================
// SessionConfigBuilder
// =============================================================================

/// Builder for `SessionConfig`.
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    health_interval: Option<Duration>,
    default_host: Option<String>,
    group_deadband: Option<f32>,
}

impl SessionConfigBuilder {
    /// Sets the health daemon period.
    pub fn health_interval(mut self, interval: Duration) -> Self {
        self.health_interval = Some(interval);
        self
    }

    /// Sets the default discovery host.
    pub fn default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = Some(host.into());
        self
    }

    /// Sets the group deadband in percent.
    pub fn group_deadband(mut self, deadband: f32) -> Self {
        self.group_deadband = Some(deadband);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> OpcDaResult<SessionConfig> {
        let config = SessionConfig {
            health_interval: self.health_interval.unwrap_or_else(default_health_interval),
            default_host: self.default_host.unwrap_or_else(default_host),
            group_deadband: self.group_deadband.unwrap_or_default(),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.health_interval, Duration::from_secs(5));
        assert_eq!(config.default_host, "127.0.0.1");
        assert_eq!(config.group_deadband, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = SessionConfig::builder()
            .health_interval(Duration::from_millis(750))
            .default_host("plc-gateway")
            .group_deadband(0.5)
            .build()
            .unwrap();

        assert_eq!(config.health_interval, Duration::from_millis(750));
        assert_eq!(config.default_host, "plc-gateway");
        assert_eq!(config.group_deadband, 0.5);
    }

    #[test]
    fn test_validation_failures() {
        let zero = SessionConfig::builder()
            .health_interval(Duration::ZERO)
            .build()
            .unwrap_err();
        assert_eq!(zero.category(), "configuration");

        assert!(SessionConfig::builder().default_host(" ").build().is_err());
        assert!(SessionConfig::builder().group_deadband(120.0).build().is_err());
        assert!(SessionConfig::builder().group_deadband(-1.0).build().is_err());
    }

    #[test]
    fn test_deserialize_humantime() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "health_interval": "2s 500ms" }"#).unwrap();
        assert_eq!(config.health_interval, Duration::from_millis(2500));
        assert_eq!(config.default_host, DEFAULT_HOST);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = SessionConfig::builder()
            .health_interval(Duration::from_secs(30))
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("30s"));
        let back: SessionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
