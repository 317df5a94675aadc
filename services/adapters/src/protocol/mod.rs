//! Protocol adapters: one module per wire protocol, all implementing
//! [`ProtocolAdapter`] so the runtime never has to know which one it's
//! driving.

mod graphql;
mod jsonrpc;
mod odata;
mod rest;
mod soap;
mod xmlrpc;

pub use graphql::GraphQlAdapter;
pub use jsonrpc::JsonRpcAdapter;
pub use odata::{compose_entity_set_url, ODataAdapter};
pub use rest::RestAdapter;
pub use soap::SoapAdapter;
pub use xmlrpc::XmlRpcAdapter;

use async_trait::async_trait;
use connector_core::{ConnectorConfig, ConnectorRequest, ConnectorResponse, Protocol, Result};

/// The capability set every protocol module provides. The runtime composes
/// this with the authentication manager, rate limiter and circuit breaker;
/// a protocol adapter itself only knows how to shape bytes on the wire.
#[async_trait]
pub trait ProtocolAdapter: Send + Sync {
    /// Build any connection state the adapter needs (HTTP client, base
    /// headers, endpoint map). Idempotent.
    async fn open(&self, config: &ConnectorConfig) -> Result<()>;

    /// A cheap call that exercises the wire path without mutating remote
    /// state, used by the health monitor and the factory's `test_connection`.
    async fn test(&self, config: &ConnectorConfig) -> Result<()>;

    /// Execute one request and map the wire response onto the common
    /// envelope.
    async fn execute(&self, config: &ConnectorConfig, request: ConnectorRequest) -> Result<ConnectorResponse>;

    /// Execute many requests as a single wire-level batch, for protocols
    /// whose wire format has a native batch envelope (a JSON-RPC array of
    /// calls, a GraphQL array of query documents). Returns `None` when this
    /// protocol has no such envelope, so the runtime falls back to issuing
    /// `execute` once per request.
    async fn execute_batch(&self, _config: &ConnectorConfig, _requests: &[ConnectorRequest]) -> Option<Result<Vec<ConnectorResponse>>> {
        None
    }

    /// Release any held connection state. Idempotent.
    async fn close(&self, config: &ConnectorConfig) -> Result<()>;
}

/// Construct the protocol adapter matching a connector's configured wire
/// protocol.
pub fn for_protocol(protocol: Protocol) -> Box<dyn ProtocolAdapter> {
    match protocol {
        Protocol::Rest | Protocol::Custom => Box::new(RestAdapter::new()),
        Protocol::Soap => Box::new(SoapAdapter::new()),
        Protocol::GraphQl => Box::new(GraphQlAdapter::new()),
        Protocol::OData => Box::new(ODataAdapter::new()),
        Protocol::JsonRpc => Box::new(JsonRpcAdapter::new()),
        Protocol::XmlRpc => Box::new(XmlRpcAdapter::new()),
    }
}
