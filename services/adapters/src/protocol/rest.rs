//! REST adapter: the default wire shape, and the one every other adapter's
//! `open`/`close` connection-pool handling is patterned on.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use connector_core::{ConnectorConfig, ConnectorError, ConnectorRequest, ConnectorResponse, Method, Result};
use parking_lot::RwLock;
use reqwest::Client;
use uuid::Uuid;

use super::ProtocolAdapter;

pub struct RestAdapter {
    clients: RwLock<HashMap<String, Client>>,
}

impl RestAdapter {
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

    fn resolve_url(&self, config: &ConnectorConfig, request: &ConnectorRequest) -> String {
        let path = config.endpoint(&request.endpoint).unwrap_or(&request.endpoint);
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", config.base_url.trim_end_matches('/'), path)
        }
    }
}

impl Default for RestAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for RestAdapter {
    async fn open(&self, config: &ConnectorConfig) -> Result<()> {
        self.client_for(config)?;
        Ok(())
    }

    async fn test(&self, config: &ConnectorConfig) -> Result<()> {
        let client = self.client_for(config)?;
        let url = config.base_url.clone();
        client
            .get(&url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() })
    }

    async fn execute(&self, config: &ConnectorConfig, request: ConnectorRequest) -> Result<ConnectorResponse> {
        let client = self.client_for(config)?;
        let url = self.resolve_url(config, &request);
        let request_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        let mut builder = match request.method {
            Method::Get => client.get(&url),
            Method::Post => client.post(&url),
            Method::Put => client.put(&url),
            Method::Patch => client.patch(&url),
            Method::Delete => client.delete(&url),
        };
        for (key, value) in config.default_headers.iter().chain(request.headers.iter()) {
            builder = builder.header(key, value);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
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
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
            .collect();
        let body: Option<serde_json::Value> = response.json().await.ok();

        Ok(ConnectorResponse {
            status_code: status,
            body,
            headers,
            success: status < 400,
            error_message: if status >= 400 { Some(format!("HTTP {status}")) } else { None },
            response_time_ms: started.elapsed().as_millis() as u64,
            request_id,
        })
    }

    async fn close(&self, config: &ConnectorConfig) -> Result<()> {
        self.clients.write().remove(&config.connector_id);
        Ok(())
    }
}
