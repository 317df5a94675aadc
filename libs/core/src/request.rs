//! Protocol-agnostic request/response envelopes passed between a runtime and
//! its adapter.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP-equivalent method. Protocols that have no verbs of their own (GraphQL,
/// JSON-RPC) map every call onto `Post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

/// A single outbound call, independent of the wire protocol that will carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorRequest {
    pub operation: String,
    /// Either a named endpoint key (resolved via `ConnectorConfig::endpoint`)
    /// or a literal path.
    pub endpoint: String,
    pub method: Method,
    pub body: Option<Value>,
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub timeout: Option<Duration>,
    pub retry_on_failure: bool,
    pub metadata: HashMap<String, String>,
}

impl ConnectorRequest {
    pub fn new(operation: impl Into<String>, endpoint: impl Into<String>, method: Method) -> Self {
        Self {
            operation: operation.into(),
            endpoint: endpoint.into(),
            method,
            body: None,
            query: HashMap::new(),
            headers: HashMap::new(),
            timeout: None,
            retry_on_failure: true,
            metadata: HashMap::new(),
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The result of executing a `ConnectorRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorResponse {
    pub status_code: u16,
    pub body: Option<Value>,
    pub headers: HashMap<String, String>,
    pub success: bool,
    pub error_message: Option<String>,
    pub response_time_ms: u64,
    pub request_id: String,
}

impl ConnectorResponse {
    pub fn failed(status_code: u16, error_message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            status_code,
            body: None,
            headers: HashMap::new(),
            success: false,
            error_message: Some(error_message.into()),
            response_time_ms: 0,
            request_id: request_id.into(),
        }
    }

    pub fn ok(status_code: u16, body: Option<Value>, request_id: impl Into<String>) -> Self {
        Self {
            status_code,
            body,
            headers: HashMap::new(),
            success: status_code < 400,
            error_message: None,
            response_time_ms: 0,
            request_id: request_id.into(),
        }
    }
}
