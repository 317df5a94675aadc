//! Error taxonomy shared across the connector framework.

use thiserror::Error;

/// Result type alias used throughout the connector framework.
pub type Result<T> = std::result::Result<T, ConnectorError>;

/// Unified error type for connector, classification and transform operations.
///
/// Each variant maps to a recovery strategy described in the error handling
/// design: some are retried by the caller, some are surfaced immediately,
/// some are recorded against the circuit breaker.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Missing or invalid configuration, e.g. a required template field.
    #[error("configuration error: {0}")]
    Config(String),

    /// TCP/TLS level connection failure.
    #[error("connection error to {connector_id}: {reason}")]
    Connection {
        /// Connector that failed to connect.
        connector_id: String,
        /// Underlying reason.
        reason: String,
    },

    /// Authentication failed: 401, invalid credentials, non-200 from token endpoint.
    #[error("authentication failed for {connector_id}: {reason}")]
    Auth {
        /// Connector whose credentials were rejected.
        connector_id: String,
        /// Underlying reason.
        reason: String,
    },

    /// Local limiter rejected the call, or upstream returned 429.
    #[error("rate limit exceeded for {connector_id}")]
    RateLimit {
        /// Connector that is rate limited.
        connector_id: String,
    },

    /// Deadline exceeded for the call.
    #[error("timeout after {elapsed_ms}ms for {connector_id}")]
    Timeout {
        /// Connector the call was made against.
        connector_id: String,
        /// Elapsed time before the deadline fired.
        elapsed_ms: u64,
    },

    /// Malformed response, SOAP Fault, GraphQL `errors[]`, OData error body.
    #[error("protocol error from {connector_id}: {message}")]
    Protocol {
        /// Connector that returned the malformed response.
        connector_id: String,
        /// Description of what went wrong.
        message: String,
    },

    /// Transformer validation failure (missing required field, failed rule).
    #[error("validation error: {0}")]
    Validation(String),

    /// Upstream classification LLM call failed.
    #[error("classification error: {0}")]
    Classification(String),

    /// Residual PII detected in an anonymized payload.
    #[error("privacy violation: {0}")]
    PrivacyViolation(String),

    /// Breaker rejected the call outright.
    #[error("circuit breaker open for {connector_id} (axis {axis:?})")]
    CircuitOpen {
        /// Connector whose breaker rejected the call.
        connector_id: String,
        /// Axis that is tripped, if known.
        axis: Option<String>,
    },

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Catch-all for errors from collaborators (HTTP clients, etc.)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ConnectorError {
    /// Whether a caller should retry this error per the configured retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectorError::Connection { .. } | ConnectorError::Protocol { .. })
    }

    /// Whether this failure should be recorded against the circuit breaker.
    pub fn counts_as_breaker_failure(&self) -> bool {
        matches!(
            self,
            ConnectorError::Connection { .. }
                | ConnectorError::Timeout { .. }
                | ConnectorError::Protocol { .. }
        )
    }
}
