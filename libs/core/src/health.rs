//! Shapes owned by the health monitor: scheduled checks, alerts, and
//! the metric samples it keeps in its bounded FIFO.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Overall status derived from a connector's or a check's recent behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Aggregate several check results: unhealthy dominates, then degraded.
    pub fn aggregate(statuses: impl IntoIterator<Item = (HealthStatus, bool)>) -> HealthStatus {
        let mut any_unhealthy_critical = false;
        let mut any_bad = false;
        for (status, critical) in statuses {
            match status {
                HealthStatus::Unhealthy if critical => any_unhealthy_critical = true,
                HealthStatus::Unhealthy | HealthStatus::Degraded => any_bad = true,
                HealthStatus::Healthy => {}
            }
        }
        if any_unhealthy_critical {
            HealthStatus::Unhealthy
        } else if any_bad {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }
}

/// Severity of an alert rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Kind of metric sample recorded into the bounded FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    Timer,
}

/// A single metric observation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: f64,
    pub metric_type: MetricType,
    pub timestamp: DateTime<Utc>,
    pub tags: HashMap<String, String>,
}
