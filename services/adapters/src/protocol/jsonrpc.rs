//! JSON-RPC 2.0 adapter: one HTTP POST per call carrying `{jsonrpc, method,
//! params, id}`; a top-level `error` object is mapped onto
//! `ConnectorError::Protocol`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use connector_core::{ConnectorConfig, ConnectorError, ConnectorRequest, ConnectorResponse, Result};
use parking_lot::RwLock;
use reqwest::Client;
use uuid::Uuid;

use super::ProtocolAdapter;

pub struct JsonRpcAdapter {
    clients: RwLock<HashMap<String, Client>>,
    /// Monotonically increasing JSON-RPC `id`, shared across every call this
    /// adapter makes regardless of connector.
    next_id: AtomicU64,
}

impl JsonRpcAdapter {
    pub fn new() -> Self {
        Self { clients: RwLock::new(HashMap::new()), next_id: AtomicU64::new(1) }
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

impl Default for JsonRpcAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for JsonRpcAdapter {
    async fn open(&self, config: &ConnectorConfig) -> Result<()> {
        self.client_for(config)?;
        Ok(())
    }

    async fn test(&self, config: &ConnectorConfig) -> Result<()> {
        let client = self.client_for(config)?;
        let body = serde_json::json!({ "jsonrpc": "2.0", "method": "system.ping", "params": [], "id": 0 });
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
        let rpc_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let params = request.body.clone().unwrap_or(serde_json::Value::Array(vec![]));
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": request.operation,
            "params": params,
            "id": rpc_id,
        });

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

        if let Some(error) = body.get("error") {
            let message = error.get("message").and_then(|m| m.as_str()).unwrap_or("unknown JSON-RPC error").to_string();
            return Err(ConnectorError::Protocol { connector_id: config.connector_id.clone(), message });
        }

        Ok(ConnectorResponse {
            status_code: status,
            body: body.get("result").cloned(),
            headers: HashMap::new(),
            success: status < 400,
            error_message: None,
            response_time_ms: started.elapsed().as_millis() as u64,
            request_id,
        })
    }

    /// Submits one HTTP POST carrying a JSON-RPC batch (a bare array of
    /// request objects), matching every `id` in the response array back to
    /// its request since JSON-RPC 2.0 does not guarantee batch response
    /// order.
    async fn execute_batch(&self, config: &ConnectorConfig, requests: &[ConnectorRequest]) -> Option<Result<Vec<ConnectorResponse>>> {
        let client = match self.client_for(config) {
            Ok(c) => c,
            Err(e) => return Some(Err(e)),
        };
        let started = Instant::now();

        let mut payload = Vec::with_capacity(requests.len());
        let mut id_to_index = HashMap::new();
        for (index, request) in requests.iter().enumerate() {
            let rpc_id = self.next_id.fetch_add(1, Ordering::SeqCst);
            id_to_index.insert(rpc_id, index);
            let params = request.body.clone().unwrap_or(serde_json::Value::Array(vec![]));
            payload.push(serde_json::json!({
                "jsonrpc": "2.0",
                "method": request.operation,
                "params": params,
                "id": rpc_id,
            }));
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
                message: "JSON-RPC batch response was not a JSON array".to_string(),
            }));
        };

        let elapsed = started.elapsed().as_millis() as u64;
        let mut slots: Vec<Option<ConnectorResponse>> = (0..requests.len()).map(|_| None).collect();
        for item in items {
            let index = item.get("id").and_then(|v| v.as_u64()).and_then(|id| id_to_index.get(&id).copied());
            let Some(index) = index else { continue };
            let request_id = Uuid::new_v4().to_string();
            slots[index] = Some(if let Some(error) = item.get("error") {
                let message = error.get("message").and_then(|m| m.as_str()).unwrap_or("unknown JSON-RPC error").to_string();
                ConnectorResponse::failed(status, message, request_id)
            } else {
                ConnectorResponse {
                    status_code: status,
                    body: item.get("result").cloned(),
                    headers: HashMap::new(),
                    success: status < 400,
                    error_message: None,
                    response_time_ms: elapsed,
                    request_id,
                }
            });
        }

        let responses = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| ConnectorResponse::failed(status, "missing response for batched call", Uuid::new_v4().to_string())))
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
    use connector_core::{AuthScheme, ConnectorKind, DataFormat, Method, Protocol, RateLimit, RetryPolicy};
    use mockito::Matcher;

    fn config_for(base_url: String) -> ConnectorConfig {
        ConnectorConfig {
            connector_id: "jr".to_string(),
            name: "JR".to_string(),
            kind: ConnectorKind::Erp,
            protocol: Protocol::JsonRpc,
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

    #[tokio::test]
    async fn ids_increase_monotonically_across_calls() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJsonString(r#"{"id":1}"#.to_string()))
            .with_body(r#"{"result": "ok"}"#)
            .create_async()
            .await;
        let second = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJsonString(r#"{"id":2}"#.to_string()))
            .with_body(r#"{"result": "ok"}"#)
            .create_async()
            .await;

        let adapter = JsonRpcAdapter::new();
        let config = config_for(server.url());

        adapter.execute(&config, ConnectorRequest::new("ping", "/", Method::Post)).await.unwrap();
        adapter.execute(&config, ConnectorRequest::new("ping", "/", Method::Post)).await.unwrap();

        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn execute_batch_submits_one_array_payload_and_matches_ids() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(r#"^\[\{.*\},\{.*\}\]$"#.to_string()))
            .with_body(r#"[{"id": 2, "result": "second"}, {"id": 1, "result": "first"}]"#)
            .create_async()
            .await;

        let adapter = JsonRpcAdapter::new();
        let config = config_for(server.url());
        let requests = vec![ConnectorRequest::new("one", "/", Method::Post), ConnectorRequest::new("two", "/", Method::Post)];

        let outcome = adapter.execute_batch(&config, &requests).await.unwrap().unwrap();
        assert_eq!(outcome.len(), 2);
        assert_eq!(outcome[0].body, Some(serde_json::json!("first")));
        assert_eq!(outcome[1].body, Some(serde_json::json!("second")));

        mock.assert_async().await;
    }
}
