//! Hybrid multi-axis circuit breaker.
//!
//! One breaker governs one connector. Calls are tagged with an [`Axis`] at
//! the call site; each axis keeps its own sliding failure window and
//! threshold, and there is an overall threshold across all axes combined.
//! Domain isolation additionally matches call context against configured
//! indicator substrings rather than tracking a window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use connector_core::Axis;
use parking_lot::Mutex;
use tracing::{info, warn};

pub use connector_core::CircuitState;

/// Thresholds and timing for one breaker instance.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Per-axis failure threshold within `time_window`.
    pub axis_thresholds: HashMap<Axis, u32>,
    /// Window over which failures are counted; older entries are pruned.
    pub time_window: Duration,
    /// How long `Open` must elapse before the next call is tried as `HalfOpen`.
    pub recovery_timeout: Duration,
    /// Deadline for the call itself, distinct from `recovery_timeout`. A
    /// request is bounded by `min(request-supplied timeout, call_timeout)`.
    pub call_timeout: Duration,
    /// Successes required in `HalfOpen` before returning to `Closed`.
    pub half_open_max_calls: u32,
    /// Substrings that, when found in a call's context values, mark it as
    /// belonging to the isolated domain.
    pub domain_indicators: Vec<String>,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        let mut axis_thresholds = HashMap::new();
        axis_thresholds.insert(Axis::Si, 5);
        axis_thresholds.insert(Axis::App, 5);
        axis_thresholds.insert(Axis::Hybrid, 8);
        axis_thresholds.insert(Axis::Domain, 3);
        Self {
            axis_thresholds,
            time_window: Duration::from_secs(60),
            recovery_timeout: Duration::from_secs(60),
            call_timeout: Duration::from_secs(30),
            half_open_max_calls: 3,
            domain_indicators: Vec::new(),
        }
    }
}

struct Inner {
    state: CircuitState,
    windows: HashMap<Axis, Vec<Instant>>,
    last_state_change: Instant,
    last_failure_time: Option<Instant>,
    half_open_success_count: u32,
    /// Append-only log of `(state, reason)` for every transition, satisfying
    /// the "every transition has a reason string" invariant.
    observations: Vec<(CircuitState, String)>,
}

impl Inner {
    fn prune(&mut self, window: Duration, now: Instant) {
        for timestamps in self.windows.values_mut() {
            timestamps.retain(|t| now.duration_since(*t) < window);
        }
    }

    fn transition(&mut self, to: CircuitState, reason: impl Into<String>, now: Instant) {
        let reason = reason.into();
        if to != self.state {
            info!(from = ?self.state, to = ?to, reason = %reason, "circuit breaker transition");
            self.state = to;
            self.last_state_change = now;
            self.half_open_success_count = 0;
        }
        self.observations.push((to, reason));
    }
}

/// The hybrid circuit breaker for one connector.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                windows: HashMap::new(),
                last_state_change: Instant::now(),
                last_failure_time: None,
                half_open_success_count: 0,
                observations: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Enter or leave maintenance mode. The only two transitions this
    /// function performs; nothing else can reach or leave `Maintenance`.
    pub fn set_maintenance(&self, enabled: bool) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        if enabled {
            inner.transition(CircuitState::Maintenance, "operator entered maintenance", now);
        } else {
            inner.transition(CircuitState::Closed, "operator left maintenance", now);
        }
    }

    /// Whether a call on `axis`, with the given call-context map, is
    /// admitted right now. `context` is checked against `domain_indicators`
    /// via substring match when the breaker is `DomainIsolated`.
    pub fn admit(&self, axis: Axis, context: &HashMap<String, String>) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.prune(self.config.time_window, now);

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Maintenance => false,
            CircuitState::Open => {
                if let Some(last_failure) = inner.last_failure_time {
                    if now.duration_since(last_failure) >= self.config.recovery_timeout {
                        inner.transition(CircuitState::HalfOpen, "recovery timeout elapsed", now);
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => inner.half_open_success_count < self.config.half_open_max_calls,
            CircuitState::SiDegraded => axis != Axis::Si,
            CircuitState::AppDegraded => axis != Axis::App,
            CircuitState::HybridDegraded => axis != Axis::Hybrid,
            CircuitState::DomainIsolated => {
                let matches_domain = context
                    .values()
                    .any(|v| self.config.domain_indicators.iter().any(|ind| v.contains(ind.as_str())));
                !matches_domain
            }
        }
    }

    /// Record a failure of the given axis and run the transition precedence:
    /// domain threshold, then this axis's threshold, then the
    /// combined threshold, then half-open reverting to open.
    pub fn on_failure(&self, axis: Axis) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.prune(self.config.time_window, now);
        inner.windows.entry(axis).or_default().push(now);
        inner.last_failure_time = Some(now);

        let domain_count = inner.windows.get(&Axis::Domain).map_or(0, Vec::len) as u32;
        let domain_threshold = *self.config.axis_thresholds.get(&Axis::Domain).unwrap_or(&u32::MAX);
        let axis_count = inner.windows.get(&axis).map_or(0, Vec::len) as u32;
        let axis_threshold = *self.config.axis_thresholds.get(&axis).unwrap_or(&u32::MAX);
        let combined: u32 = inner.windows.values().map(|w| w.len() as u32).sum();
        let max_axis_threshold = self.config.axis_thresholds.values().copied().max().unwrap_or(u32::MAX);

        if domain_count >= domain_threshold {
            inner.transition(
                CircuitState::DomainIsolated,
                format!("domain axis reached {domain_count}/{domain_threshold} failures"),
                now,
            );
        } else if axis_count >= axis_threshold {
            inner.transition(
                CircuitState::degraded_for(axis),
                format!("{axis:?} axis reached {axis_count}/{axis_threshold} failures"),
                now,
            );
        } else if combined >= max_axis_threshold {
            inner.transition(
                CircuitState::Open,
                format!("combined axis failures {combined} reached {max_axis_threshold}"),
                now,
            );
        } else if inner.state == CircuitState::HalfOpen {
            inner.transition(CircuitState::Open, "failure observed while half-open", now);
        } else {
            warn!(?axis, "breaker recorded failure without a state transition");
        }
    }

    /// Record a success. In `HalfOpen`, enough successes close the breaker
    /// and reset every axis window; in a degraded state, enough time since
    /// the last failure also closes it.
    pub fn on_success(&self, axis: Axis) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.prune(self.config.time_window, now);
        let _ = axis;

        match inner.state {
            CircuitState::HalfOpen => {
                inner.half_open_success_count += 1;
                if inner.half_open_success_count >= self.config.half_open_max_calls {
                    inner.windows.clear();
                    inner.transition(CircuitState::Closed, "half-open success quota reached", now);
                }
            }
            state if state.is_degraded() => {
                if inner.last_failure_time.is_none_or(|t| now.duration_since(t) >= self.config.recovery_timeout) {
                    inner.transition(CircuitState::Closed, "recovered from degraded state", now);
                }
            }
            _ => {}
        }
    }

    /// Deadline for a call governed by this breaker, given the connector's
    /// own requested timeout: `min(requested_timeout, call_timeout)`.
    pub fn effective_deadline(&self, requested_timeout: Duration) -> Duration {
        requested_timeout.min(self.config.call_timeout)
    }

    /// Copy of the transition log, oldest first, for diagnostics and tests.
    pub fn observations(&self) -> Vec<(CircuitState, String)> {
        self.inner.lock().observations.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn config() -> CircuitBreakerConfig {
        let mut axis_thresholds = HashMap::new();
        axis_thresholds.insert(Axis::Si, 2);
        axis_thresholds.insert(Axis::App, 10);
        axis_thresholds.insert(Axis::Hybrid, 3);
        axis_thresholds.insert(Axis::Domain, 10);
        CircuitBreakerConfig {
            axis_thresholds,
            time_window: Duration::from_secs(60),
            recovery_timeout: Duration::from_millis(50),
            call_timeout: Duration::from_secs(30),
            half_open_max_calls: 2,
            domain_indicators: vec![],
        }
    }

    #[test]
    fn open_to_half_open_to_closed() {
        let breaker = CircuitBreaker::new(config());
        let ctx = HashMap::new();

        breaker.on_failure(Axis::Si);
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.on_failure(Axis::Si);
        assert_eq!(breaker.state(), CircuitState::SiDegraded);

        breaker.on_failure(Axis::Hybrid);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(!breaker.admit(Axis::Hybrid, &ctx));

        sleep(Duration::from_millis(60));
        assert!(breaker.admit(Axis::Hybrid, &ctx));
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        breaker.on_success(Axis::Hybrid);
        breaker.on_success(Axis::Hybrid);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let breaker = CircuitBreaker::new(config());
        for _ in 0..3 {
            breaker.on_failure(Axis::Hybrid);
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        sleep(Duration::from_millis(60));
        assert!(breaker.admit(Axis::Hybrid, &HashMap::new()));
        breaker.on_failure(Axis::Hybrid);
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn domain_isolation_rejects_matching_context_only() {
        let mut cfg = config();
        cfg.domain_indicators = vec!["vendor-x".to_string()];
        let breaker = CircuitBreaker::new(cfg);
        for _ in 0..10 {
            breaker.on_failure(Axis::Domain);
        }
        assert_eq!(breaker.state(), CircuitState::DomainIsolated);

        let mut matching = HashMap::new();
        matching.insert("counterparty".to_string(), "vendor-x-ltd".to_string());
        assert!(!breaker.admit(Axis::Domain, &matching));

        let mut other = HashMap::new();
        other.insert("counterparty".to_string(), "vendor-y-ltd".to_string());
        assert!(breaker.admit(Axis::Domain, &other));
    }
}
