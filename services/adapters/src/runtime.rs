//! Connector runtime: the object a caller actually holds. Composes a
//! protocol adapter, the shared authentication manager, a per-connector rate
//! limiter window and hybrid circuit breaker into one execution path with a
//! fixed order: breaker admission, rate-limit admission, auth header
//! application, protocol call (bounded by the breaker's effective deadline
//! and retried with `backoff_ms * attempt` up to `max_attempts` while the
//! error is retryable), then metrics/breaker update on the final outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use connector_core::{
    Axis, CircuitState, ConnectorConfig, ConnectorError, ConnectorRequest, ConnectorResponse, HealthStatus, Method,
    Result,
};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::auth::AuthenticationManager;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::protocol::{self, ProtocolAdapter};
use crate::rate_limit::RateLimiter;

/// Running totals a runtime keeps about its own calls. Feeds both `health()`
/// and the values the health monitor polls via `metrics()`.
#[derive(Debug, Clone, Default)]
pub struct RuntimeMetrics {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub rate_limited_calls: u64,
    pub circuit_rejected_calls: u64,
    pub total_latency_ms: u64,
}

impl RuntimeMetrics {
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            1.0
        } else {
            self.successful_calls as f64 / self.total_calls as f64
        }
    }

    pub fn average_latency_ms(&self) -> f64 {
        if self.successful_calls == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.successful_calls as f64
        }
    }
}

/// A live, authenticated connection to one external system.
pub struct ConnectorRuntime {
    config: ConnectorConfig,
    protocol: Box<dyn ProtocolAdapter>,
    auth: Arc<AuthenticationManager>,
    rate_limiter: Arc<RateLimiter>,
    breaker: CircuitBreaker,
    metrics: Mutex<RuntimeMetrics>,
}

impl ConnectorRuntime {
    pub fn new(
        config: ConnectorConfig,
        auth: Arc<AuthenticationManager>,
        rate_limiter: Arc<RateLimiter>,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let protocol = protocol::for_protocol(config.protocol);
        Self { config, protocol, auth, rate_limiter, breaker: CircuitBreaker::new(breaker_config), metrics: Mutex::new(RuntimeMetrics::default()) }
    }

    /// Test-only constructor taking an injected adapter so the retry/timeout
    /// path can be exercised without a real wire protocol.
    #[cfg(test)]
    fn with_protocol(
        config: ConnectorConfig,
        protocol: Box<dyn ProtocolAdapter>,
        auth: Arc<AuthenticationManager>,
        rate_limiter: Arc<RateLimiter>,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        Self { config, protocol, auth, rate_limiter, breaker: CircuitBreaker::new(breaker_config), metrics: Mutex::new(RuntimeMetrics::default()) }
    }

    pub fn connector_id(&self) -> &str {
        &self.config.connector_id
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    /// Open the protocol adapter's connection state and authenticate.
    #[instrument(skip(self), fields(connector_id = %self.config.connector_id))]
    pub async fn initialize(&self) -> Result<()> {
        self.protocol.open(&self.config).await?;
        self.auth.authenticate(&self.config).await?;
        self.rate_limiter.configure(&self.config.connector_id, self.config.rate_limit.requests_per_minute);
        info!("connector runtime initialized");
        Ok(())
    }

    /// Which failure axis a request belongs to, for breaker bookkeeping. A
    /// caller can pin the axis explicitly via the `axis` metadata key;
    /// otherwise system-level calls (no body) default to `Si` and calls
    /// carrying a payload default to `App`.
    fn axis_for(request: &ConnectorRequest) -> Axis {
        match request.metadata.get("axis").map(String::as_str) {
            Some("si") => Axis::Si,
            Some("app") => Axis::App,
            Some("hybrid") => Axis::Hybrid,
            Some("domain") => Axis::Domain,
            _ if request.body.is_some() => Axis::App,
            _ => Axis::Si,
        }
    }

    /// Execute one request through the full admission chain.
    #[instrument(skip(self, request), fields(connector_id = %self.config.connector_id, operation = %request.operation))]
    pub async fn execute(&self, mut request: ConnectorRequest) -> Result<ConnectorResponse> {
        let axis = Self::axis_for(&request);
        let context: HashMap<String, String> = request.metadata.clone();

        if !self.breaker.admit(axis, &context) {
            self.metrics.lock().circuit_rejected_calls += 1;
            return Err(ConnectorError::CircuitOpen {
                connector_id: self.config.connector_id.clone(),
                axis: Some(format!("{axis:?}")),
            });
        }

        if !self.rate_limiter.try_acquire(&self.config.connector_id) {
            self.metrics.lock().rate_limited_calls += 1;
            return Err(ConnectorError::RateLimit { connector_id: self.config.connector_id.clone() });
        }

        self.auth.apply(&self.config.connector_id, &mut request.headers)?;

        let requested_timeout = request.timeout.unwrap_or_else(|| Duration::from_millis(self.config.request_timeout_ms));
        let deadline = self.breaker.effective_deadline(requested_timeout);
        let retry_policy = &self.config.retry_policy;
        let max_attempts = if request.retry_on_failure { retry_policy.max_attempts.max(1) } else { 1 };

        let started = Instant::now();
        let mut outcome = Err(ConnectorError::Timeout { connector_id: self.config.connector_id.clone(), elapsed_ms: 0 });
        for attempt in 1..=max_attempts {
            outcome = match tokio::time::timeout(deadline, self.protocol.execute(&self.config, request.clone())).await {
                Ok(result) => result,
                Err(_) => Err(ConnectorError::Timeout {
                    connector_id: self.config.connector_id.clone(),
                    elapsed_ms: deadline.as_millis() as u64,
                }),
            };

            match &outcome {
                Ok(_) => break,
                Err(e) if attempt < max_attempts && e.is_retryable() => {
                    let backoff = Duration::from_millis(retry_policy.backoff_ms * attempt as u64);
                    warn!(attempt, error = %e, backoff_ms = backoff.as_millis() as u64, "retrying connector call after backoff");
                    tokio::time::sleep(backoff).await;
                }
                _ => break,
            }
        }

        {
            let mut metrics = self.metrics.lock();
            metrics.total_calls += 1;
            match &outcome {
                Ok(_) => {
                    metrics.successful_calls += 1;
                    metrics.total_latency_ms += started.elapsed().as_millis() as u64;
                }
                Err(_) => metrics.failed_calls += 1,
            }
        }

        match &outcome {
            Ok(_) => self.breaker.on_success(axis),
            Err(e) => {
                if e.counts_as_breaker_failure() {
                    self.breaker.on_failure(axis);
                }
                warn!(error = %e, "connector call failed");
            }
        }

        outcome
    }

    pub async fn create(&self, resource_type: &str, data: Value) -> Result<ConnectorResponse> {
        self.execute(ConnectorRequest::new("create", resource_type, Method::Post).with_body(data)).await
    }

    pub async fn read(&self, resource_type: &str, resource_id: &str) -> Result<ConnectorResponse> {
        let endpoint = format!("{resource_type}/{resource_id}");
        self.execute(ConnectorRequest::new("read", endpoint, Method::Get)).await
    }

    pub async fn update(&self, resource_type: &str, resource_id: &str, data: Value) -> Result<ConnectorResponse> {
        let endpoint = format!("{resource_type}/{resource_id}");
        self.execute(ConnectorRequest::new("update", endpoint, Method::Put).with_body(data)).await
    }

    pub async fn delete(&self, resource_type: &str, resource_id: &str) -> Result<ConnectorResponse> {
        let endpoint = format!("{resource_type}/{resource_id}");
        self.execute(ConnectorRequest::new("delete", endpoint, Method::Delete)).await
    }

    pub async fn list(&self, resource_type: &str, filters: Option<Value>) -> Result<ConnectorResponse> {
        let mut request = ConnectorRequest::new("list", resource_type, Method::Get);
        if let Some(Value::Object(map)) = filters {
            for (key, value) in map {
                let text = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                request = request.with_query(key, text);
            }
        }
        self.execute(request).await
    }

    /// Run a batch of requests. GraphQL and JSON-RPC adapters build one
    /// true array-payload wire call via [`ProtocolAdapter::execute_batch`];
    /// every other protocol falls back to running requests sequentially so
    /// the rate limiter and breaker still see every call and a single
    /// failure does not abort the remaining ones.
    pub async fn batch(&self, requests: Vec<ConnectorRequest>) -> Vec<Result<ConnectorResponse>> {
        if requests.is_empty() {
            return Vec::new();
        }
        if let Some(results) = self.execute_batch_natively(requests.clone()).await {
            return results;
        }
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.execute(request).await);
        }
        results
    }

    /// Runs `requests` through one admission check and one wire-level batch
    /// call when the protocol supports it, returning `None` when it doesn't
    /// so `batch` falls back to per-request execution.
    async fn execute_batch_natively(&self, mut requests: Vec<ConnectorRequest>) -> Option<Vec<Result<ConnectorResponse>>> {
        let axis = Self::axis_for(&requests[0]);
        let context: HashMap<String, String> = requests[0].metadata.clone();
        let count = requests.len();

        if !self.breaker.admit(axis, &context) {
            self.metrics.lock().circuit_rejected_calls += count as u64;
            let axis_label = format!("{axis:?}");
            return Some(
                (0..count)
                    .map(|_| Err(ConnectorError::CircuitOpen { connector_id: self.config.connector_id.clone(), axis: Some(axis_label.clone()) }))
                    .collect(),
            );
        }
        if !self.rate_limiter.try_acquire(&self.config.connector_id) {
            self.metrics.lock().rate_limited_calls += count as u64;
            return Some((0..count).map(|_| Err(ConnectorError::RateLimit { connector_id: self.config.connector_id.clone() })).collect());
        }
        for request in &mut requests {
            if let Err(e) = self.auth.apply(&self.config.connector_id, &mut request.headers) {
                let message = e.to_string();
                return Some(
                    (0..count)
                        .map(|_| Err(ConnectorError::Auth { connector_id: self.config.connector_id.clone(), reason: message.clone() }))
                        .collect(),
                );
            }
        }

        match self.protocol.execute_batch(&self.config, &requests).await? {
            Ok(responses) => {
                let successes = responses.iter().filter(|r| r.success).count() as u64;
                {
                    let mut metrics = self.metrics.lock();
                    metrics.total_calls += count as u64;
                    metrics.successful_calls += successes;
                    metrics.failed_calls += count as u64 - successes;
                }
                self.breaker.on_success(axis);
                Some(responses.into_iter().map(Ok).collect())
            }
            Err(e) => {
                self.metrics.lock().failed_calls += count as u64;
                if e.counts_as_breaker_failure() {
                    self.breaker.on_failure(axis);
                }
                let message = e.to_string();
                Some(
                    (0..count)
                        .map(|_| Err(ConnectorError::Protocol { connector_id: self.config.connector_id.clone(), message: message.clone() }))
                        .collect(),
                )
            }
        }
    }

    /// Health derived from the recent success rate and breaker state:
    /// `Unhealthy` if the breaker is open or isolated, `Degraded` if the
    /// success rate has dropped below 95% or the breaker is in any other
    /// degraded state, `Healthy` otherwise.
    pub fn health(&self) -> HealthStatus {
        let state = self.breaker.state();
        if matches!(state, CircuitState::Open | CircuitState::DomainIsolated | CircuitState::Maintenance) {
            return HealthStatus::Unhealthy;
        }
        if state.is_degraded() || state == CircuitState::HalfOpen {
            return HealthStatus::Degraded;
        }
        let metrics = self.metrics.lock();
        if metrics.total_calls >= 10 && metrics.success_rate() < 0.80 {
            HealthStatus::Unhealthy
        } else if metrics.total_calls >= 10 && metrics.success_rate() < 0.95 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        }
    }

    pub fn metrics(&self) -> RuntimeMetrics {
        self.metrics.lock().clone()
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// Exercise the wire path without going through the admission chain,
    /// used by the factory's `test_connection` and the health monitor.
    pub async fn test_connection(&self) -> Result<()> {
        self.protocol.test(&self.config).await
    }

    #[instrument(skip(self), fields(connector_id = %self.config.connector_id))]
    pub async fn disconnect(&self) -> Result<()> {
        self.protocol.close(&self.config).await?;
        self.auth.revoke(&self.config.connector_id);
        info!("connector runtime disconnected");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use connector_core::{AuthScheme, ConnectorKind, DataFormat, Protocol, RateLimit, RetryPolicy};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config(retry_policy: RetryPolicy) -> ConnectorConfig {
        ConnectorConfig {
            connector_id: "test-connector".to_string(),
            name: "Test Connector".to_string(),
            kind: ConnectorKind::Erp,
            protocol: Protocol::Rest,
            auth_scheme: AuthScheme::None,
            base_url: "https://example.invalid".to_string(),
            endpoints: HashMap::new(),
            default_headers: HashMap::new(),
            auth_config: HashMap::new(),
            connect_timeout_ms: 1_000,
            request_timeout_ms: 5_000,
            retry_policy,
            rate_limit: RateLimit::default(),
            batch_size: 50,
            ssl_verify: true,
            data_format: DataFormat::Json,
            custom_settings: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    fn test_runtime(protocol: Box<dyn ProtocolAdapter>, retry_policy: RetryPolicy) -> ConnectorRuntime {
        ConnectorRuntime::with_protocol(
            test_config(retry_policy),
            protocol,
            crate::auth::shared_default(),
            Arc::new(RateLimiter::new()),
            CircuitBreakerConfig::default(),
        )
    }

    /// Fails `fail_times` calls with a retryable `Protocol` error, then succeeds.
    struct FlakyAdapter {
        fail_times: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ProtocolAdapter for FlakyAdapter {
        async fn open(&self, _config: &ConnectorConfig) -> Result<()> {
            Ok(())
        }

        async fn test(&self, _config: &ConnectorConfig) -> Result<()> {
            Ok(())
        }

        async fn execute(&self, _config: &ConnectorConfig, request: ConnectorRequest) -> Result<ConnectorResponse> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_times {
                Err(ConnectorError::Protocol { connector_id: "test-connector".into(), message: "flaked".into() })
            } else {
                Ok(ConnectorResponse::ok(200, None, request.operation))
            }
        }

        async fn close(&self, _config: &ConnectorConfig) -> Result<()> {
            Ok(())
        }
    }

    /// Never returns, used to exercise the timeout path.
    struct HangingAdapter;

    #[async_trait]
    impl ProtocolAdapter for HangingAdapter {
        async fn open(&self, _config: &ConnectorConfig) -> Result<()> {
            Ok(())
        }

        async fn test(&self, _config: &ConnectorConfig) -> Result<()> {
            Ok(())
        }

        async fn execute(&self, _config: &ConnectorConfig, _request: ConnectorRequest) -> Result<ConnectorResponse> {
            std::future::pending().await
        }

        async fn close(&self, _config: &ConnectorConfig) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn retries_retryable_failures_up_to_max_attempts() {
        let adapter = FlakyAdapter { fail_times: 2, calls: AtomicU32::new(0) };
        let runtime = test_runtime(Box::new(adapter), RetryPolicy { max_attempts: 3, backoff_ms: 1 });

        let response = runtime.execute(ConnectorRequest::new("read", "/widgets", Method::Get)).await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(runtime.metrics().total_calls, 1);
        assert_eq!(runtime.metrics().successful_calls, 1);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_the_last_error() {
        let adapter = FlakyAdapter { fail_times: 5, calls: AtomicU32::new(0) };
        let runtime = test_runtime(Box::new(adapter), RetryPolicy { max_attempts: 2, backoff_ms: 1 });

        let result = runtime.execute(ConnectorRequest::new("read", "/widgets", Method::Get)).await;
        assert!(result.is_err());
        assert_eq!(runtime.metrics().failed_calls, 1);
    }

    #[tokio::test]
    async fn retry_on_failure_false_disables_retries() {
        let adapter = FlakyAdapter { fail_times: 1, calls: AtomicU32::new(0) };
        let runtime = test_runtime(Box::new(adapter), RetryPolicy { max_attempts: 3, backoff_ms: 1 });

        let mut request = ConnectorRequest::new("read", "/widgets", Method::Get);
        request.retry_on_failure = false;
        let result = runtime.execute(request).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn call_exceeding_the_breaker_deadline_times_out() {
        let runtime = test_runtime(Box::new(HangingAdapter), RetryPolicy { max_attempts: 1, backoff_ms: 1 });
        let mut request = ConnectorRequest::new("read", "/widgets", Method::Get);
        request.timeout = Some(Duration::from_millis(20));

        let result = runtime.execute(request).await;
        assert!(matches!(result, Err(ConnectorError::Timeout { .. })));
    }
}
