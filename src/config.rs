//! Cache configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Time-to-live for each cache entry
    #[serde(with = "humantime_serde", default = "default_ttl")]
    pub ttl: Duration,

    /// Maximum number of cache entries
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Interval between expiry sweeps
    #[serde(with = "humantime_serde", default = "default_cleanup_interval")]
    pub cleanup_interval: Duration,
}

fn default_ttl() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_capacity() -> usize {
    1000
}

fn default_cleanup_interval() -> Duration {
    Duration::from_secs(60)
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_ttl(),
            capacity: default_capacity(),
            cleanup_interval: default_cleanup_interval(),
        }
    }
}

impl CacheConfig {
    /// Replaces zero fields with the defaults. A capacity of zero is not a
    /// valid configuration.
    pub fn normalize(mut self) -> Self {
        if self.ttl.is_zero() {
            self.ttl = default_ttl();
        }
        if self.capacity == 0 {
            self.capacity = default_capacity();
        }
        if self.cleanup_interval.is_zero() {
            self.cleanup_interval = default_cleanup_interval();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.capacity, 1000);
        assert_eq!(config.cleanup_interval, Duration::from_secs(60));
    }

    #[test]
    fn normalize_restores_defaults_for_zero_fields() {
        let config = CacheConfig {
            ttl: Duration::ZERO,
            capacity: 0,
            cleanup_interval: Duration::ZERO,
        }
        .normalize();

        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn normalize_keeps_explicit_values() {
        let config = CacheConfig {
            ttl: Duration::from_millis(50),
            capacity: 2,
            cleanup_interval: Duration::from_millis(20),
        };
        assert_eq!(config.clone().normalize(), config);
    }

    #[test]
    fn deserializes_durations_from_humantime() {
        let config: CacheConfig = serde_json::from_str(r#"{"ttl": "2m", "capacity": 500, "cleanup_interval": "30s"}"#).unwrap();
        assert_eq!(config.ttl, Duration::from_secs(120));
        assert_eq!(config.capacity, 500);
        assert_eq!(config.cleanup_interval, Duration::from_secs(30));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CacheConfig::default());
    }
}
