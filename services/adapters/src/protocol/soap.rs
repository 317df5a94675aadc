//! SOAP adapter: wraps the request body in a SOAP 1.1 envelope over HTTP
//! POST and unwraps the response envelope, mapping a `<soap:Fault>` onto
//! `ConnectorError::Protocol`. When `wsdl_url` is configured, `open()` fetches
//! and parses the WSDL to learn the service's real endpoint, namespaces and
//! operation catalog before the first call.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use connector_core::{AuthScheme, ConnectorConfig, ConnectorError, ConnectorRequest, ConnectorResponse, Result};
use parking_lot::RwLock;
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use reqwest::Client;
use uuid::Uuid;

use super::ProtocolAdapter;

const WSSE_NS: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";

/// What `open()` learned from a connector's WSDL, if it has one.
#[derive(Debug, Clone, Default)]
struct WsdlInfo {
    service_url: Option<String>,
    target_namespace: Option<String>,
    namespaces: HashMap<String, String>,
    operations: Vec<String>,
}

pub struct SoapAdapter {
    clients: RwLock<HashMap<String, Client>>,
    wsdl: RwLock<HashMap<String, WsdlInfo>>,
}

impl SoapAdapter {
    pub fn new() -> Self {
        Self { clients: RwLock::new(HashMap::new()), wsdl: RwLock::new(HashMap::new()) }
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

    /// Fetches and parses `wsdl_url` (a `custom_settings` key), storing the
    /// endpoint, target namespace, namespace map and operation catalog.
    /// A no-op when the connector has no `wsdl_url` configured.
    async fn load_wsdl(&self, config: &ConnectorConfig) -> Result<()> {
        let Some(wsdl_url) = config.custom_str("wsdl_url") else {
            return Ok(());
        };
        let client = self.client_for(config)?;
        let text = client
            .get(wsdl_url)
            .send()
            .await
            .map_err(|e| ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() })?
            .text()
            .await
            .map_err(|e| ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() })?;
        let info = parse_wsdl(&text)?;
        self.wsdl.write().insert(config.connector_id.clone(), info);
        Ok(())
    }

    fn build_envelope(&self, config: &ConnectorConfig, operation: &str, body: Option<&serde_json::Value>) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer.get_mut().extend_from_slice(br#"<?xml version="1.0" encoding="UTF-8"?>"#);
        writer
            .create_element("soap:Envelope")
            .with_attribute(("xmlns:soap", "http://schemas.xmlsoap.org/soap/envelope/"))
            .write_inner_content::<_, ConnectorError>(|writer| {
                if config.auth_scheme == AuthScheme::CustomToken {
                    if let Some(username) = config.auth_str("username") {
                        write_security_header(writer, username, config.auth_str("password").unwrap_or_default())?;
                    }
                }
                writer
                    .create_element("soap:Body")
                    .write_inner_content::<_, ConnectorError>(|writer| {
                        writer
                            .create_element(operation)
                            .write_inner_content::<_, ConnectorError>(|writer| {
                                if let Some(serde_json::Value::Object(map)) = body {
                                    for (key, value) in map {
                                        let text = match value {
                                            serde_json::Value::String(s) => s.clone(),
                                            other => other.to_string(),
                                        };
                                        writer.create_element(key).write_text_content(BytesText::new(&text)).map_err(xml_err)?;
                                    }
                                }
                                Ok(())
                            })
                            .map_err(xml_err)?;
                        Ok(())
                    })
                    .map_err(xml_err)?;
                Ok(())
            })
            .map_err(xml_err)?;
        Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
    }

    fn parse_response(&self, connector_id: &str, xml: &str) -> Result<serde_json::Value> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut out = serde_json::Map::new();
        let mut current_tag = String::new();
        let mut buf = Vec::new();
        let mut in_fault = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    current_tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if current_tag.eq_ignore_ascii_case("Fault") {
                        in_fault = true;
                    }
                }
                Ok(Event::Text(t)) => {
                    let text = t.unescape().unwrap_or_default().into_owned();
                    if in_fault && current_tag.eq_ignore_ascii_case("faultstring") {
                        return Err(ConnectorError::Protocol { connector_id: connector_id.to_string(), message: text });
                    }
                    if !text.trim().is_empty() {
                        out.insert(current_tag.clone(), serde_json::Value::String(text));
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ConnectorError::Protocol { connector_id: connector_id.to_string(), message: e.to_string() })
                }
                _ => {}
            }
            buf.clear();
        }
        Ok(serde_json::Value::Object(out))
    }
}

fn xml_err(e: quick_xml::Error) -> ConnectorError {
    ConnectorError::Protocol { connector_id: String::new(), message: e.to_string() }
}

/// Writes a `<soap:Header>` carrying a WS-Security `UsernameToken`.
fn write_security_header(writer: &mut Writer<Vec<u8>>, username: &str, password: &str) -> Result<()> {
    writer
        .create_element("soap:Header")
        .write_inner_content::<_, ConnectorError>(|writer| {
            writer
                .create_element("wsse:Security")
                .with_attribute(("xmlns:wsse", WSSE_NS))
                .write_inner_content::<_, ConnectorError>(|writer| {
                    writer
                        .create_element("wsse:UsernameToken")
                        .write_inner_content::<_, ConnectorError>(|writer| {
                            writer.create_element("wsse:Username").write_text_content(BytesText::new(username)).map_err(xml_err)?;
                            writer.create_element("wsse:Password").write_text_content(BytesText::new(password)).map_err(xml_err)?;
                            Ok(())
                        })
                        .map_err(xml_err)?;
                    Ok(())
                })
                .map_err(xml_err)?;
            Ok(())
        })
        .map_err(xml_err)?;
    Ok(())
}

/// Best-effort WSDL parse: pulls the `targetNamespace` and `xmlns:*`
/// declarations off `<definitions>`, the first `<soap:address location="...">`
/// found as the service endpoint, and every `<operation name="...">` as the
/// operation catalog (deduplicated, so `portType` and `binding` entries for
/// the same operation collapse to one).
fn parse_wsdl(xml: &str) -> Result<WsdlInfo> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut info = WsdlInfo::default();

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(e) | Event::Empty(e) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                for attr in e.attributes().flatten() {
                    let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
                    let value = attr.unescape_value().unwrap_or_default().into_owned();
                    if local == "definitions" {
                        if key == "targetNamespace" {
                            info.target_namespace = Some(value.clone());
                        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                            info.namespaces.insert(prefix.to_string(), value.clone());
                        }
                    }
                    if local == "address" && key == "location" && info.service_url.is_none() {
                        info.service_url = Some(value.clone());
                    }
                    if local == "operation" && key == "name" && !info.operations.contains(&value) {
                        info.operations.push(value.clone());
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(info)
}

impl Default for SoapAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for SoapAdapter {
    async fn open(&self, config: &ConnectorConfig) -> Result<()> {
        self.client_for(config)?;
        self.load_wsdl(config).await?;
        Ok(())
    }

    async fn test(&self, config: &ConnectorConfig) -> Result<()> {
        let client = self.client_for(config)?;
        client
            .get(&config.base_url)
            .send()
            .await
            .map(|_| ())
            .map_err(|e| ConnectorError::Connection { connector_id: config.connector_id.clone(), reason: e.to_string() })
    }

    async fn execute(&self, config: &ConnectorConfig, request: ConnectorRequest) -> Result<ConnectorResponse> {
        let client = self.client_for(config)?;
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let envelope = self.build_envelope(config, &request.operation, request.body.as_ref())?;
        let wsdl_service_url = self.wsdl.read().get(&config.connector_id).and_then(|w| w.service_url.clone());
        let url = config
            .endpoints
            .get(&request.endpoint)
            .cloned()
            .or(wsdl_service_url)
            .unwrap_or_else(|| config.endpoint(&request.endpoint).unwrap_or(&config.base_url).to_string());

        let mut builder = client
            .post(&url)
            .header("Content-Type", "text/xml; charset=utf-8")
            .header("SOAPAction", &request.operation)
            .body(envelope);
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
        let text = response.text().await.unwrap_or_default();
        let body = self.parse_response(&config.connector_id, &text)?;

        Ok(ConnectorResponse {
            status_code: status,
            body: Some(body),
            headers: HashMap::new(),
            success: status < 400,
            error_message: if status >= 400 { Some(format!("HTTP {status}")) } else { None },
            response_time_ms: started.elapsed().as_millis() as u64,
            request_id,
        })
    }

    async fn close(&self, config: &ConnectorConfig) -> Result<()> {
        self.clients.write().remove(&config.connector_id);
        self.wsdl.write().remove(&config.connector_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::{ConnectorKind, DataFormat, Protocol, RateLimit, RetryPolicy};

    fn config(auth_scheme: AuthScheme) -> ConnectorConfig {
        let mut auth_config = HashMap::new();
        auth_config.insert("username".to_string(), serde_json::Value::String("alice".to_string()));
        auth_config.insert("password".to_string(), serde_json::Value::String("secret".to_string()));
        ConnectorConfig {
            connector_id: "soap-conn".to_string(),
            name: "SOAP".to_string(),
            kind: ConnectorKind::Erp,
            protocol: Protocol::Soap,
            auth_scheme,
            base_url: "https://example.test/soap".to_string(),
            endpoints: HashMap::new(),
            default_headers: HashMap::new(),
            auth_config,
            connect_timeout_ms: 1_000,
            request_timeout_ms: 5_000,
            retry_policy: RetryPolicy::default(),
            rate_limit: RateLimit::default(),
            batch_size: 50,
            ssl_verify: true,
            data_format: DataFormat::Xml,
            custom_settings: HashMap::new(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn envelope_omits_security_header_without_custom_token_scheme() {
        let adapter = SoapAdapter::new();
        let envelope = adapter.build_envelope(&config(AuthScheme::None), "GetBalance", None).unwrap();
        assert!(!envelope.contains("wsse:UsernameToken"));
    }

    #[test]
    fn envelope_includes_username_token_for_custom_token_scheme() {
        let adapter = SoapAdapter::new();
        let envelope = adapter.build_envelope(&config(AuthScheme::CustomToken), "GetBalance", None).unwrap();
        assert!(envelope.contains("<wsse:UsernameToken>"));
        assert!(envelope.contains("<wsse:Username>alice</wsse:Username>"));
        assert!(envelope.contains("<wsse:Password>secret</wsse:Password>"));
    }

    #[test]
    fn parse_wsdl_discovers_endpoint_namespace_and_operations() {
        let wsdl = r#"<?xml version="1.0"?>
<definitions name="BillingService"
    targetNamespace="urn:billing"
    xmlns:tns="urn:billing"
    xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
    xmlns="http://schemas.xmlsoap.org/wsdl/">
  <portType name="BillingPortType">
    <operation name="GetInvoice"></operation>
  </portType>
  <binding name="BillingBinding" type="tns:BillingPortType">
    <operation name="GetInvoice"></operation>
  </binding>
  <service name="BillingService">
    <port name="BillingPort" binding="tns:BillingBinding">
      <soap:address location="https://billing.example.test/soap"/>
    </port>
  </service>
</definitions>"#;
        let info = parse_wsdl(wsdl).unwrap();
        assert_eq!(info.target_namespace.as_deref(), Some("urn:billing"));
        assert_eq!(info.service_url.as_deref(), Some("https://billing.example.test/soap"));
        assert_eq!(info.operations, vec!["GetInvoice".to_string()]);
        assert_eq!(info.namespaces.get("tns").map(String::as_str), Some("urn:billing"));
    }
}
