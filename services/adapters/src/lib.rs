//! # Connector Adapters
//!
//! The execution layer between a [`connector_core::ConnectorConfig`] and the
//! external system it describes. Three collaborators compose into one
//! [`ConnectorRuntime`] per connector:
//!
//! - [`protocol`] — one module per wire protocol (REST, SOAP, GraphQL, OData,
//!   JSON-RPC, XML-RPC), all implementing the same narrow
//!   [`protocol::ProtocolAdapter`] capability set.
//! - [`auth`] — an [`auth::AuthenticationManager`] that authenticates,
//!   applies and refreshes credentials for every [`connector_core::AuthScheme`].
//! - [`circuit_breaker`] and [`rate_limit`] — the hybrid multi-axis breaker
//!   and the sliding-window rate limiter a runtime checks before every call.
//!
//! Nothing here constructs connectors from templates; that's `connector-factory`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod circuit_breaker;
pub mod protocol;
pub mod rate_limit;
pub mod runtime;

pub use auth::AuthenticationManager;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use protocol::{compose_entity_set_url, GraphQlAdapter, JsonRpcAdapter, ODataAdapter, ProtocolAdapter, RestAdapter, SoapAdapter, XmlRpcAdapter};
pub use rate_limit::RateLimiter;
pub use runtime::{ConnectorRuntime, RuntimeMetrics};
