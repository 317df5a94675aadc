//! Connector templates: the reusable shape a factory instantiates into a
//! concrete [`connector_core::ConnectorConfig`] given a connector id and
//! caller-supplied overrides.

use std::collections::HashMap;

use connector_core::{AuthScheme, ConnectorKind, DataFormat, Protocol, RateLimit, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A named, reusable connector shape. One template typically covers one
/// external vendor (e.g. "paystack-v2", "quickbooks-online").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub template_id: String,
    pub name: String,
    pub kind: ConnectorKind,
    pub protocol: Protocol,
    pub auth_scheme: AuthScheme,
    pub data_format: DataFormat,
    pub default_base_url: Option<String>,
    pub default_endpoints: HashMap<String, String>,
    pub default_headers: HashMap<String, String>,
    pub default_auth_config: HashMap<String, Value>,
    pub default_retry_policy: RetryPolicy,
    pub default_rate_limit: RateLimit,
    pub default_connect_timeout_ms: u64,
    pub default_request_timeout_ms: u64,
    pub default_batch_size: usize,
    pub default_ssl_verify: bool,
    /// Auth config keys the factory refuses to instantiate without, e.g.
    /// `["client_id", "client_secret", "token_url"]` for an OAuth2 template.
    pub required_auth_fields: Vec<String>,
}

impl Template {
    pub fn new(template_id: impl Into<String>, name: impl Into<String>, kind: ConnectorKind, protocol: Protocol, auth_scheme: AuthScheme) -> Self {
        Self {
            template_id: template_id.into(),
            name: name.into(),
            kind,
            protocol,
            auth_scheme,
            data_format: DataFormat::Json,
            default_base_url: None,
            default_endpoints: HashMap::new(),
            default_headers: HashMap::new(),
            default_auth_config: HashMap::new(),
            default_retry_policy: RetryPolicy::default(),
            default_rate_limit: RateLimit::default(),
            default_connect_timeout_ms: 5_000,
            default_request_timeout_ms: 30_000,
            default_batch_size: 50,
            default_ssl_verify: true,
            required_auth_fields: Vec::new(),
        }
    }
}
