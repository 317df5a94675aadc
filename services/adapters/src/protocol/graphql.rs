//! GraphQL adapter: every call is a single HTTP POST of `{query, variables}`
//! to one endpoint; a non-empty top-level `errors[]` is mapped onto
//! `ConnectorError::Protocol` even when the HTTP status is 200.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use connector_core::{ConnectorConfig, ConnectorError, ConnectorRequest, ConnectorResponse, Method, Result};
use parking_lot::RwLock;
use reqwest::Client;
use uuid::Uuid;

use super::ProtocolAdapter;

/// Convenience constructor for a GraphQL `query` operation. Sets the
/// `query`/`operation_type` metadata `execute`/`execute_batch` read.
pub fn query(endpoint: impl Into<String>, document: impl Into<String>, variables: serde_json::Value) -> ConnectorRequest {
    graphql_request("query", endpoint, document, variables)
}

/// Convenience constructor for a GraphQL `mutation` operation.
pub fn mutation(endpoint: impl Into<String>, document: impl Into<String>, variables: serde_json::Value) -> ConnectorRequest {
    graphql_request("mutation", endpoint, document, variables)
}

/// Convenience constructor for a GraphQL `subscription` operation. The
/// adapter executes it like any other call; streaming delivery of
/// subsequent events is out of scope for this request/response runtime.
pub fn subscription(endpoint: impl Into<String>, document: impl Into<String>, variables: serde_json::Value) -> ConnectorRequest {
    graphql_request("subscription", endpoint, document, variables)
}

fn graphql_request(operation_type: &str, endpoint: impl Into<String>, document: impl Into<String>, variables: serde_json::Value) -> ConnectorRequest {
    ConnectorRequest::new(operation_type, endpoint, Method::Post)
        .with_body(variables)
        .with_metadata("query", document)
        .with_metadata("operation_type", operation_type)
}

pub struct GraphQlAdapter {
    clients: RwLock<HashMap<String, Client>>,
}

impl GraphQlAdapter {
    pub fn new() -> Self {
        Self { clients: RwLock::new(HashMap::new()) }
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
}

impl Default for GraphQlAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for GraphQlAdapter {
    async fn open(&self, config: &ConnectorConfig) -> Result<()> {
        self.client_for(config)?;
        Ok(())
    }

    async fn test(&self, config: &ConnectorConfig) -> Result<()> {
        let client = self.client_for(config)?;
        let body = serde_json::json!({ "query": "{ __typename }" });
        client
            .post(&config.base_url)
            .json(&body)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() })
    }

    async fn execute(&self, config: &ConnectorConfig, request: ConnectorRequest) -> Result<ConnectorResponse> {
        let client = self.client_for(config)?;
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();

        let query = request
            .metadata
            .get("query")
            .cloned()
            .ok_or_else(|| ConnectorError::Validation("GraphQL request missing `query` metadata entry".into()))?;
        let variables = request.body.clone().unwrap_or(serde_json::json!({}));
        let payload = serde_json::json!({ "query": query, "variables": variables });

        let mut builder = client.post(&config.base_url).json(&payload);
        for (key, value) in config.default_headers.iter().chain(request.headers.iter()) {
            builder = builder.header(key, value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::Timeout { connector_id: config.connector_id.clone(), elapsed_ms: started.elapsed().as_millis() as u64 }
            } else {
                ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() }
            }
        })?;
        let status = response.status().as_u16();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ConnectorError::Protocol { connector_id: config.connector_id.clone(), message: e.to_string() })?;

        if let Some(errors) = body.get("errors").and_then(|v| v.as_array()) {
            if !errors.is_empty() {
                let message = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(ConnectorError::Protocol { connector_id: config.connector_id.clone(), message });
            }
        }

        Ok(ConnectorResponse {
            status_code: status,
            body: body.get("data").cloned(),
            headers: HashMap::new(),
            success: status < 400,
            error_message: None,
            response_time_ms: started.elapsed().as_millis() as u64,
            request_id,
        })
    }

    /// Submits one HTTP POST carrying a JSON array of `{query, variables}`
    /// documents, matching the GraphQL batching convention most servers
    /// (Apollo, graphql-java) accept. The response is expected to be the
    /// matching array of `{data, errors}` objects, in request order.
    async fn execute_batch(&self, config: &ConnectorConfig, requests: &[ConnectorRequest]) -> Option<Result<Vec<ConnectorResponse>>> {
        let client = match self.client_for(config) {
            Ok(c) => c,
            Err(e) => return Some(Err(e)),
        };
        let started = Instant::now();

        let mut payload = Vec::with_capacity(requests.len());
        for request in requests {
            let Some(document) = request.metadata.get("query").cloned() else {
                return Some(Err(ConnectorError::Validation("GraphQL request missing `query` metadata entry".into())));
            };
            let variables = request.body.clone().unwrap_or(serde_json::json!({}));
            payload.push(serde_json::json!({ "query": document, "variables": variables }));
        }

        let mut builder = client.post(&config.base_url).json(&serde_json::Value::Array(payload));
        for (key, value) in config.default_headers.iter() {
            builder = builder.header(key, value);
        }
        for request in requests {
            for (key, value) in &request.headers {
                builder = builder.header(key, value);
            }
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                return Some(Err(if e.is_timeout() {
                    ConnectorError::Timeout { connector_id: config.connector_id.clone(), elapsed_ms: started.elapsed().as_millis() as u64 }
                } else {
                    ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() }
                }))
            }
        };
        let status = response.status().as_u16();
        let body: serde_json::Value = match response.json().await {
            Ok(b) => b,
            Err(e) => return Some(Err(ConnectorError::Protocol { connector_id: config.connector_id.clone(), message: e.to_string() })),
        };
        let Some(items) = body.as_array().cloned() else {
            return Some(Err(ConnectorError::Protocol {
                connector_id: config.connector_id.clone(),
                message: "GraphQL batch response was not a JSON array".to_string(),
            }));
        };

        let elapsed = started.elapsed().as_millis() as u64;
        let responses = items
            .into_iter()
            .chain(std::iter::repeat(serde_json::Value::Null))
            .take(requests.len())
            .map(|item| {
                let request_id = Uuid::new_v4().to_string();
                if let Some(errors) = item.get("errors").and_then(|v| v.as_array()) {
                    if !errors.is_empty() {
                        let message =
                            errors.iter().filter_map(|e| e.get("message").and_then(|m| m.as_str())).collect::<Vec<_>>().join("; ");
                        return ConnectorResponse::failed(status, message, request_id);
                    }
                }
                ConnectorResponse {
                    status_code: status,
                    body: item.get("data").cloned(),
                    headers: HashMap::new(),
                    success: status < 400,
                    error_message: None,
                    response_time_ms: elapsed,
                    request_id,
                }
            })
            .collect();
        Some(Ok(responses))
    }

    async fn close(&self, config: &ConnectorConfig) -> Result<()> {
        self.clients.write().remove(&config.connector_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::{AuthScheme, ConnectorKind, DataFormat, Protocol, RateLimit, RetryPolicy};

    fn config_for(base_url: String) -> ConnectorConfig {
        ConnectorConfig {
            connector_id: "gq".to_string(),
            name: "GQ".to_string(),
            kind: ConnectorKind::Erp,
            protocol: Protocol::GraphQl,
            auth_scheme: AuthScheme::None,
            base_url,
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
            custom_settings: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn query_sets_operation_type_metadata() {
        let request = query("/graphql", "{ widgets { id } }", serde_json::json!({}));
        assert_eq!(request.metadata.get("operation_type").map(String::as_str), Some("query"));
        assert_eq!(request.metadata.get("query").map(String::as_str), Some("{ widgets { id } }"));
    }

    #[test]
    fn mutation_sets_operation_type_metadata() {
        let request = mutation("/graphql", "mutation { createWidget { id } }", serde_json::json!({"name": "a"}));
        assert_eq!(request.metadata.get("operation_type").map(String::as_str), Some("mutation"));
        assert_eq!(request.body, Some(serde_json::json!({"name": "a"})));
    }

    #[test]
    fn subscription_sets_operation_type_metadata() {
        let request = subscription("/graphql", "subscription { widgetCreated { id } }", serde_json::json!({}));
        assert_eq!(request.metadata.get("operation_type").map(String::as_str), Some("subscription"));
    }

    #[tokio::test]
    async fn execute_batch_submits_one_array_payload_and_splits_the_response() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::Regex(r#"^\[.*\{.*\}.*,.*\{.*\}.*\]$"#.to_string()))
            .with_body(r#"[{"data": {"id": 1}}, {"errors": [{"message": "not found"}]}]"#)
            .create_async()
            .await;

        let adapter = GraphQlAdapter::new();
        let config = config_for(server.url());
        let requests = vec![
            query("/", "{ widget(id: 1) { id } }", serde_json::json!({})),
            query("/", "{ widget(id: 2) { id } }", serde_json::json!({})),
        ];

        let outcome = adapter.execute_batch(&config, &requests).await.unwrap().unwrap();
        assert_eq!(outcome.len(), 2);
        assert!(outcome[0].success);
        assert_eq!(outcome[0].body, Some(serde_json::json!({"id": 1})));
        assert!(!outcome[1].success);
        assert_eq!(outcome[1].error_message.as_deref(), Some("not found"));

        mock.assert_async().await;
    }
}
