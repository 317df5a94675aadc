//! `ConnectorConfig` and the enumerations that describe a connector's wire shape.
//!
//! A `ConnectorConfig` is immutable after construction: the factory builds one
//! from a template plus caller overrides and hands it to a runtime, which never
//! mutates it again.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Category of external system a connector talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectorKind {
    Erp,
    Crm,
    Accounting,
    Pos,
    Ecommerce,
    Banking,
    Payment,
    Forex,
    Government,
    Generic,
}

/// Wire protocol a connector speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Rest,
    Soap,
    GraphQl,
    OData,
    JsonRpc,
    XmlRpc,
    Custom,
}

/// Authentication scheme a connector uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthScheme {
    None,
    Basic,
    ApiKey,
    OAuth2,
    Jwt,
    Saml,
    CustomToken,
}

/// Payload encoding a connector prefers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    Json,
    Xml,
    Csv,
    Form,
    Binary,
}

/// Retry behaviour for a failed call: exponential backoff of `backoff_ms * attempt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, backoff_ms: 250 }
    }
}

/// Requests-per-minute admission limit for a connector.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimit {
    pub requests_per_minute: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self { requests_per_minute: 60 }
    }
}

/// Immutable connector identity and wire configuration.
///
/// Constructed once by the factory from a template plus overrides; every
/// collaborator (runtime, adapter, auth manager) treats it as read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub connector_id: String,
    pub name: String,
    pub kind: ConnectorKind,
    pub protocol: Protocol,
    pub auth_scheme: AuthScheme,
    pub base_url: String,
    /// Named endpoint map, e.g. `"invoices" -> "/api/v1/invoices"`.
    pub endpoints: HashMap<String, String>,
    pub default_headers: HashMap<String, String>,
    /// Opaque auth configuration consumed by the authentication manager
    /// (client id/secret, token url, api key location, JWT secret, ...).
    pub auth_config: HashMap<String, serde_json::Value>,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub retry_policy: RetryPolicy,
    pub rate_limit: RateLimit,
    pub batch_size: usize,
    pub ssl_verify: bool,
    pub data_format: DataFormat,
    pub custom_settings: HashMap<String, serde_json::Value>,
    /// Free-form metadata set by the factory (`template_id`, `template_name`, ...).
    pub metadata: HashMap<String, String>,
}

impl ConnectorConfig {
    /// Looks up an endpoint path by key, falling back to treating the key
    /// itself as a literal path when it starts with `/`.
    pub fn endpoint(&self, key: &str) -> Option<&str> {
        self.endpoints
            .get(key)
            .map(|s| s.as_str())
            .or_else(|| key.starts_with('/').then_some(key))
    }

    pub fn auth_str(&self, key: &str) -> Option<&str> {
        self.auth_config.get(key).and_then(|v| v.as_str())
    }

    pub fn custom_str(&self, key: &str) -> Option<&str> {
        self.custom_settings.get(key).and_then(|v| v.as_str())
    }
}
