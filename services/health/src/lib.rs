//! # Health Monitor
//!
//! Scheduled health checks across every connector a [`ConnectorFactory`] has
//! created: a periodic sweep derives each connector's
//! [`HealthStatus`], raises [`Alert`]s on status changes, and keeps a bounded
//! FIFO of [`Metric`] samples an operator can scrape through the bundled
//! HTTP surface. Grounded on the venue health-check server's
//! `ServiceHealth`/`HealthCheckServer` split, generalized from one process's
//! liveness to a fleet of connectors.

#![warn(missing_docs)]

mod server;

pub use server::HealthCheckServer;

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::sync::Arc;

use chrono::Utc;
use connector_config::HealthMonitorSettings;
use connector_core::{AlertSeverity, HealthStatus, Metric, MetricType};
use connector_factory::ConnectorFactory;
use parking_lot::RwLock;
use tracing::{info, warn};

/// One alert raised when a connector's derived health status changes.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Alert {
    pub connector_id: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub raised_at: chrono::DateTime<Utc>,
}

/// Per-connector health snapshot kept between sweeps so alerts only fire on
/// a transition, not on every poll.
#[derive(Debug, Clone)]
struct ConnectorStats {
    last_status: HealthStatus,
    last_checked: chrono::DateTime<Utc>,
}

/// Sweeps a [`ConnectorFactory`]'s registered connectors on an interval,
/// derives health, raises alerts on transitions, and records metric samples
/// into a bounded FIFO.
pub struct HealthMonitor {
    factory: Arc<ConnectorFactory>,
    settings: HealthMonitorSettings,
    stats: RwLock<HashMap<String, ConnectorStats>>,
    alerts: RwLock<VecDeque<Alert>>,
    metrics: RwLock<VecDeque<Metric>>,
}

impl HealthMonitor {
    pub fn new(factory: Arc<ConnectorFactory>, settings: HealthMonitorSettings) -> Self {
        Self {
            factory,
            settings,
            stats: RwLock::new(HashMap::new()),
            alerts: RwLock::new(VecDeque::new()),
            metrics: RwLock::new(VecDeque::new()),
        }
    }

    /// Run one sweep across every connector in the factory immediately
    /// (without waiting for the scheduler interval). Returns the snapshot
    /// taken.
    pub async fn check_once(&self) -> HashMap<String, HealthStatus> {
        let statuses = self.factory.health_check_all().await;
        let now = Utc::now();

        for (connector_id, status) in &statuses {
            self.record_metric(connector_id, *status);

            let mut stats = self.stats.write();
            let previous = stats.get(connector_id).map(|s| s.last_status);
            if previous != Some(*status) {
                self.raise_alert(connector_id, *status, previous);
            }
            stats.insert(connector_id.clone(), ConnectorStats { last_status: *status, last_checked: now });
        }
        statuses
    }

    fn record_metric(&self, connector_id: &str, status: HealthStatus) {
        let value = match status {
            HealthStatus::Healthy => 1.0,
            HealthStatus::Degraded => 0.5,
            HealthStatus::Unhealthy => 0.0,
        };
        let mut tags = HashMap::new();
        tags.insert("connector_id".to_string(), connector_id.to_string());

        let mut metrics = self.metrics.write();
        if metrics.len() >= self.settings.max_metrics {
            metrics.pop_front();
        }
        metrics.push_back(Metric { name: "connector_health".to_string(), value, metric_type: MetricType::Gauge, timestamp: Utc::now(), tags });
    }

    fn raise_alert(&self, connector_id: &str, status: HealthStatus, previous: Option<HealthStatus>) {
        let severity = match status {
            HealthStatus::Unhealthy => AlertSeverity::Critical,
            HealthStatus::Degraded => AlertSeverity::Warning,
            HealthStatus::Healthy => AlertSeverity::Info,
        };
        let message = match previous {
            Some(prev) => format!("connector `{connector_id}` transitioned {prev:?} -> {status:?}"),
            None => format!("connector `{connector_id}` first observed as {status:?}"),
        };
        if severity == AlertSeverity::Critical {
            warn!(connector_id, %message, "health alert");
        } else {
            info!(connector_id, %message, "health alert");
        }
        let mut alerts = self.alerts.write();
        if alerts.len() >= self.settings.max_metrics {
            alerts.pop_front();
        }
        alerts.push_back(Alert { connector_id: connector_id.to_string(), severity, message, raised_at: Utc::now() });
    }

    /// Spawn the periodic sweep. Runs until the returned handle is aborted
    /// or dropped.
    pub fn spawn_scheduler(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.settings.default_check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.check_once().await;
            }
        })
    }

    pub fn recent_alerts(&self, limit: usize) -> Vec<Alert> {
        self.alerts.read().iter().rev().take(limit).cloned().collect()
    }

    pub fn recent_metrics(&self, limit: usize) -> Vec<Metric> {
        self.metrics.read().iter().rev().take(limit).cloned().collect()
    }

    /// Aggregate overall status across every connector currently tracked:
    /// `Unhealthy` dominates, then `Degraded`, matching
    /// [`HealthStatus::aggregate`].
    pub fn overall_status(&self) -> HealthStatus {
        let stats = self.stats.read();
        HealthStatus::aggregate(stats.values().map(|s| (s.last_status, true)))
    }

    pub fn connector_status(&self, connector_id: &str) -> Option<HealthStatus> {
        self.stats.read().get(connector_id).map(|s| s.last_status)
    }
}

/// Alias used by the HTTP handlers; kept separate from hyper's own
/// `Result` to avoid a name clash.
pub type HandlerResult<T> = std::result::Result<T, Infallible>;
