//! OData adapter: composes `$filter`/`$top`/`$skip`/`$orderby` query options
//! from `ConnectorRequest::query` onto a REST-shaped entity-set URL. Supports
//! both OData v2 (`d`-wrapped bodies, `DataServiceVersion` headers, CSRF
//! tokens) and v4 (`value`-wrapped bodies, `OData-Version` headers) based on
//! the connector's configured `odata_version`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use connector_core::{ConnectorConfig, ConnectorError, ConnectorRequest, ConnectorResponse, Method, Result};
use parking_lot::RwLock;
use reqwest::Client;
use tracing::warn;
use uuid::Uuid;

use super::ProtocolAdapter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ODataVersion {
    V2,
    V4,
}

impl ODataVersion {
    fn from_config(config: &ConnectorConfig) -> Self {
        match config.custom_str("odata_version") {
            Some(v) if v.trim_start_matches('v') == "2" => ODataVersion::V2,
            _ => ODataVersion::V4,
        }
    }
}

pub struct ODataAdapter {
    clients: RwLock<HashMap<String, Client>>,
    /// Entity sets discovered from `$metadata` on `open()`, keyed by connector.
    entity_sets: RwLock<HashMap<String, Vec<String>>>,
    /// Cached CSRF token per connector, fetched lazily before the first
    /// modifying call and reused until `close()`.
    csrf_tokens: RwLock<HashMap<String, String>>,
}

impl ODataAdapter {
    pub fn new() -> Self {
        Self { clients: RwLock::new(HashMap::new()), entity_sets: RwLock::new(HashMap::new()), csrf_tokens: RwLock::new(HashMap::new()) }
    }

    fn client_for(&self, config: &ConnectorConfig) -> Result<Client> {
        if let Some(client) = self.clients.read().get(&config.connector_id) {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .danger_accept_invalid_certs(!config.ssl_verify)
            .build()
            .map_err(|e| ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() })?;
        self.clients.write().insert(config.connector_id.clone(), client.clone());
        Ok(client)
    }

    fn query_options(&self, request: &ConnectorRequest) -> Vec<(String, String)> {
        request.query.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Entity sets discovered from `$metadata` on `open()`, empty until then
    /// or if the connector has no reachable `$metadata` endpoint.
    pub fn entity_sets(&self, connector_id: &str) -> Vec<String> {
        self.entity_sets.read().get(connector_id).cloned().unwrap_or_default()
    }

    /// Fetches `$metadata` and records every `<EntitySet Name="...">` found,
    /// so callers can later discover what this service exposes.
    async fn load_metadata(&self, config: &ConnectorConfig) -> Result<()> {
        let client = self.client_for(config)?;
        let url = format!("{}/$metadata", config.base_url.trim_end_matches('/'));
        let text = match client.get(&url).send().await {
            Ok(response) => response.text().await.unwrap_or_default(),
            Err(e) => {
                warn!(connector_id = %config.connector_id, error = %e, "failed to fetch $metadata, entity sets unknown");
                return Ok(());
            }
        };
        let sets = parse_entity_sets(&text);
        self.entity_sets.write().insert(config.connector_id.clone(), sets);
        Ok(())
    }

    /// Sets the headers each OData version requires on every call, in
    /// addition to whatever the connector/request already carry.
    fn version_headers(&self, version: ODataVersion) -> Vec<(&'static str, &'static str)> {
        match version {
            ODataVersion::V4 => vec![
                ("Accept", "application/json"),
                ("OData-Version", "4.0"),
                ("OData-MaxVersion", "4.0"),
            ],
            ODataVersion::V2 => vec![
                ("Accept", "application/json"),
                ("DataServiceVersion", "2.0"),
                ("MaxDataServiceVersion", "2.0"),
            ],
        }
    }

    /// Fetches and caches a CSRF token for `connector_id` via `X-CSRF-Token:
    /// Fetch` on a GET, per the SAP OData convention for modifying calls.
    async fn csrf_token(&self, config: &ConnectorConfig, client: &Client) -> Result<Option<String>> {
        if let Some(token) = self.csrf_tokens.read().get(&config.connector_id).cloned() {
            return Ok(Some(token));
        }
        let url = format!("{}/$metadata", config.base_url.trim_end_matches('/'));
        let response = client
            .get(&url)
            .header("X-CSRF-Token", "Fetch")
            .send()
            .await
            .map_err(|e| ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() })?;
        let token = response.headers().get("x-csrf-token").and_then(|v| v.to_str().ok()).map(str::to_string);
        if let Some(token) = &token {
            self.csrf_tokens.write().insert(config.connector_id.clone(), token.clone());
        }
        Ok(token)
    }
}

/// Unwraps a response body per OData version: v2 wraps everything in `d`
/// (a collection as `d.results`, a single entity as `d` itself); v4 wraps
/// collections in `value` and returns single entities bare.
fn unwrap_body(version: ODataVersion, body: serde_json::Value) -> serde_json::Value {
    match version {
        ODataVersion::V4 => body.get("value").cloned().unwrap_or(body),
        ODataVersion::V2 => match body.get("d").cloned() {
            Some(d) => d.get("results").cloned().unwrap_or(d),
            None => body,
        },
    }
}

/// Pulls every `<EntitySet Name="...">` out of a `$metadata` document.
fn parse_entity_sets(xml: &str) -> Vec<String> {
    let mut reader = quick_xml::Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut sets = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) | Ok(quick_xml::events::Event::Empty(e)) => {
                if e.local_name().as_ref() == b"EntitySet" {
                    for attr in e.attributes().flatten() {
                        if attr.key.as_ref() == b"Name" {
                            sets.push(attr.unescape_value().unwrap_or_default().into_owned());
                        }
                    }
                }
            }
            Ok(quick_xml::events::Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    sets
}

/// Composes an OData entity-set path with `$filter`/`$select`/`$top`/`$skip`,
/// percent-encoding the filter expression the way the wire format requires.
/// `filters` pairs are combined with `eq` and joined with ` and `.
pub fn compose_entity_set_url(entity_set: &str, filters: &[(&str, &str)], select: &[&str], top: Option<u32>, skip: Option<u32>) -> String {
    let mut params = Vec::new();
    if !filters.is_empty() {
        let expr = filters.iter().map(|(field, value)| format!("{field} eq '{value}'")).collect::<Vec<_>>().join(" and ");
        params.push(format!("$filter={}", percent_encode(&expr)));
    }
    if !select.is_empty() {
        params.push(format!("$select={}", select.join(",")));
    }
    if let Some(top) = top {
        params.push(format!("$top={top}"));
    }
    if let Some(skip) = skip {
        params.push(format!("$skip={skip}"));
    }
    if params.is_empty() {
        format!("/{entity_set}")
    } else {
        format!("/{entity_set}?{}", params.join("&"))
    }
}

fn percent_encode(expr: &str) -> String {
    expr.chars()
        .map(|c| match c {
            ' ' => "%20".to_string(),
            '\'' => "%27".to_string(),
            other => other.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_filter_select_top_skip() {
        let url = compose_entity_set_url("Invoices", &[("Status", "Paid")], &["Id", "Total"], Some(10), Some(20));
        assert_eq!(url, "/Invoices?$filter=Status%20eq%20%27Paid%27&$select=Id,Total&$top=10&$skip=20");
    }

    #[test]
    fn no_options_is_bare_entity_set() {
        assert_eq!(compose_entity_set_url("Invoices", &[], &[], None, None), "/Invoices");
    }

    #[test]
    fn v4_unwraps_value_array() {
        let body = serde_json::json!({"value": [{"Id": 1}]});
        assert_eq!(unwrap_body(ODataVersion::V4, body), serde_json::json!([{"Id": 1}]));
    }

    #[test]
    fn v2_unwraps_d_results() {
        let body = serde_json::json!({"d": {"results": [{"Id": 1}]}});
        assert_eq!(unwrap_body(ODataVersion::V2, body), serde_json::json!([{"Id": 1}]));
    }

    #[test]
    fn v2_unwraps_single_entity_without_results() {
        let body = serde_json::json!({"d": {"Id": 1}});
        assert_eq!(unwrap_body(ODataVersion::V2, body), serde_json::json!({"Id": 1}));
    }

    #[test]
    fn parses_entity_sets_from_metadata() {
        let xml = r#"<?xml version="1.0"?>
<edmx:Edmx xmlns:edmx="http://schemas.microsoft.com/ado/2007/06/edmx">
  <edmx:DataServices>
    <Schema xmlns="http://schemas.microsoft.com/ado/2009/11/edm">
      <EntityContainer Name="Default">
        <EntitySet Name="Invoices" EntityType="ns.Invoice" />
        <EntitySet Name="Customers" EntityType="ns.Customer" />
      </EntityContainer>
    </Schema>
  </edmx:DataServices>
</edmx:Edmx>"#;
        assert_eq!(parse_entity_sets(xml), vec!["Invoices".to_string(), "Customers".to_string()]);
    }

    #[test]
    fn version_from_config_defaults_to_v4() {
        let config = test_config(HashMap::new());
        assert_eq!(ODataVersion::from_config(&config), ODataVersion::V4);
    }

    #[test]
    fn version_from_config_honors_v2() {
        let mut custom_settings = HashMap::new();
        custom_settings.insert("odata_version".to_string(), serde_json::Value::String("v2".to_string()));
        let config = test_config(custom_settings);
        assert_eq!(ODataVersion::from_config(&config), ODataVersion::V2);
    }

    fn test_config(custom_settings: HashMap<String, serde_json::Value>) -> ConnectorConfig {
        use connector_core::{AuthScheme, ConnectorKind, DataFormat, Protocol, RateLimit, RetryPolicy};
        ConnectorConfig {
            connector_id: "od".to_string(),
            name: "OData".to_string(),
            kind: ConnectorKind::Erp,
            protocol: Protocol::OData,
            auth_scheme: AuthScheme::None,
            base_url: "https://example.test/odata".to_string(),
            endpoints: HashMap::new(),
            default_headers: HashMap::new(),
            auth_config: HashMap::new(),
            connect_timeout_ms: 1_000,
            request_timeout_ms: 5_000,
            retry_policy: RetryPolicy::default(),
            rate_limit: RateLimit::default(),
            batch_size: 50,
            ssl_verify: true,
            data_format: DataFormat::Json,
            custom_settings,
            metadata: HashMap::new(),
        }
    }
}

impl Default for ODataAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for ODataAdapter {
    async fn open(&self, config: &ConnectorConfig) -> Result<()> {
        self.client_for(config)?;
        self.load_metadata(config).await?;
        Ok(())
    }

    async fn test(&self, config: &ConnectorConfig) -> Result<()> {
        let client = self.client_for(config)?;
        let url = format!("{}/$metadata", config.base_url.trim_end_matches('/'));
        client
            .get(&url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() })
    }

    async fn execute(&self, config: &ConnectorConfig, request: ConnectorRequest) -> Result<ConnectorResponse> {
        let client = self.client_for(config)?;
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let version = ODataVersion::from_config(config);
        let entity_set = config.endpoint(&request.endpoint).unwrap_or(&request.endpoint);
        let url = format!("{}/{}", config.base_url.trim_end_matches('/'), entity_set.trim_start_matches('/'));
        let is_modifying = !matches!(request.method, Method::Get);

        let mut builder = match request.method {
            Method::Get => client.get(&url),
            Method::Post => client.post(&url),
            Method::Put => client.put(&url),
            Method::Patch => client.patch(&url),
            Method::Delete => client.delete(&url),
        };
        builder = builder.query(&self.query_options(&request));
        for (name, value) in self.version_headers(version) {
            builder = builder.header(name, value);
        }
        if is_modifying {
            if let Some(token) = self.csrf_token(config, &client).await? {
                builder = builder.header("X-CSRF-Token", token);
            }
        }
        for (key, value) in config.default_headers.iter().chain(request.headers.iter()) {
            builder = builder.header(key, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::Timeout { connector_id: config.connector_id.clone(), elapsed_ms: started.elapsed().as_millis() as u64 }
            } else {
                ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() }
            }
        })?;
        let status = response.status().as_u16();
        let body: Option<serde_json::Value> = response.json().await.ok();
        let value = body.map(|b| unwrap_body(version, b));

        Ok(ConnectorResponse {
            status_code: status,
            body: value,
            headers: HashMap::new(),
            success: status < 400,
            error_message: if status >= 400 { Some(format!("HTTP {status}")) } else { None },
            response_time_ms: started.elapsed().as_millis() as u64,
            request_id,
        })
    }

    async fn close(&self, config: &ConnectorConfig) -> Result<()> {
        self.clients.write().remove(&config.connector_id);
        self.entity_sets.write().remove(&config.connector_id);
        self.csrf_tokens.write().remove(&config.connector_id);
        Ok(())
    }
}
