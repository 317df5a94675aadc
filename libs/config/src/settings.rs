//! Process-wide settings loaded from the environment. Individual components
//! still take their own config structs (`ConnectorConfig`, `Profile`,
//! `Template`, ...); this module only covers the cross-cutting knobs that
//! don't belong to one of them.

use std::env;
use std::time::Duration;

/// Settings for the classification engine's cache manager.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub max_cache_size: usize,
    pub default_ttl_hours: u32,
    pub distributed_cache_url: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { max_cache_size: 10_000, default_ttl_hours: 24, distributed_cache_url: None }
    }
}

impl CacheSettings {
    pub fn from_env() -> Self {
        Self {
            max_cache_size: env::var("CLASSIFIER_CACHE_MAX_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
            default_ttl_hours: env::var("CLASSIFIER_CACHE_TTL_HOURS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(24),
            distributed_cache_url: env::var("CLASSIFIER_DISTRIBUTED_CACHE_URL").ok(),
        }
    }
}

/// Settings for the usage tracker's in-memory event log.
#[derive(Debug, Clone, Copy)]
pub struct UsageTrackerSettings {
    pub max_events: usize,
}

impl Default for UsageTrackerSettings {
    fn default() -> Self {
        Self { max_events: 100_000 }
    }
}

impl UsageTrackerSettings {
    pub fn from_env() -> Self {
        Self {
            max_events: env::var("USAGE_TRACKER_MAX_EVENTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100_000),
        }
    }
}

/// Settings for the health monitor's scheduler and bounded metric FIFO.
#[derive(Debug, Clone)]
pub struct HealthMonitorSettings {
    pub default_check_interval: Duration,
    pub default_check_timeout: Duration,
    pub max_metrics: usize,
}

impl Default for HealthMonitorSettings {
    fn default() -> Self {
        Self {
            default_check_interval: Duration::from_secs(30),
            default_check_timeout: Duration::from_secs(5),
            max_metrics: 10_000,
        }
    }
}

impl HealthMonitorSettings {
    pub fn from_env() -> Self {
        Self {
            default_check_interval: Duration::from_secs(
                env::var("HEALTH_CHECK_INTERVAL_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(30),
            ),
            default_check_timeout: Duration::from_secs(
                env::var("HEALTH_CHECK_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()).unwrap_or(5),
            ),
            max_metrics: env::var("HEALTH_MONITOR_MAX_METRICS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_settings_default_matches_spec() {
        let settings = CacheSettings::default();
        assert_eq!(settings.max_cache_size, 10_000);
        assert_eq!(settings.default_ttl_hours, 24);
    }
}
