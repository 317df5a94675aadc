//! XML-RPC adapter: encodes `request.body`'s top-level JSON object values as
//! a flat `<params>` list, one call argument per map entry, with each
//! `<value>` carrying an explicit type tag (`int`/`boolean`/`double`/
//! `string`/`array`/`struct`) rather than bare text, and decodes typed
//! `<params>`/`<fault>` responses back into the matching JSON shape.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use connector_core::{ConnectorConfig, ConnectorError, ConnectorRequest, ConnectorResponse, Result};
use parking_lot::RwLock;
use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use reqwest::Client;
use uuid::Uuid;

use super::ProtocolAdapter;

pub struct XmlRpcAdapter {
    clients: RwLock<HashMap<String, Client>>,
}

impl XmlRpcAdapter {
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

    fn build_call(&self, method: &str, params: Option<&serde_json::Value>) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        writer
            .create_element("methodCall")
            .write_inner_content::<_, ConnectorError>(|writer| {
                writer
                    .create_element("methodName")
                    .write_text_content(BytesText::new(method))
                    .map_err(xml_err)?;
                writer
                    .create_element("params")
                    .write_inner_content::<_, ConnectorError>(|writer| {
                        if let Some(serde_json::Value::Object(map)) = params {
                            for value in map.values() {
                                writer
                                    .create_element("param")
                                    .write_inner_content::<_, ConnectorError>(|writer| write_value(writer, value))
                                    .map_err(xml_err)?;
                            }
                        }
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
        let mut values = Vec::new();
        let mut in_fault = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf).map_err(xml_err)? {
                Event::Start(e) => {
                    let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if tag == "fault" {
                        in_fault = true;
                    } else if tag == "value" {
                        let value = parse_value(&mut reader, &mut buf)?;
                        if in_fault {
                            return Err(ConnectorError::Protocol {
                                connector_id: connector_id.to_string(),
                                message: fault_message(&value),
                            });
                        }
                        values.push(value);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(serde_json::Value::Array(values))
    }
}

fn xml_err(e: quick_xml::Error) -> ConnectorError {
    ConnectorError::Protocol { connector_id: String::new(), message: e.to_string() }
}

/// Extracts a human-readable message from a parsed `<fault>` struct, falling
/// back to the struct's JSON form when it doesn't carry `faultString`.
fn fault_message(value: &serde_json::Value) -> String {
    value.get("faultString").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| value.to_string())
}

/// Writes one `<value>` element, dispatching on the JSON shape to produce
/// the matching XML-RPC type tag.
fn write_value(writer: &mut Writer<Vec<u8>>, value: &serde_json::Value) -> Result<()> {
    writer.create_element("value").write_inner_content::<_, ConnectorError>(|writer| write_typed(writer, value)).map_err(xml_err)?;
    Ok(())
}

fn write_typed(writer: &mut Writer<Vec<u8>>, value: &serde_json::Value) -> Result<()> {
    match value {
        serde_json::Value::Null => {
            writer.create_element("string").write_text_content(BytesText::new("")).map_err(xml_err)?;
        }
        serde_json::Value::Bool(b) => {
            writer.create_element("boolean").write_text_content(BytesText::new(if *b { "1" } else { "0" })).map_err(xml_err)?;
        }
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                writer.create_element("int").write_text_content(BytesText::new(&i.to_string())).map_err(xml_err)?;
            } else {
                let f = n.as_f64().unwrap_or(0.0);
                writer.create_element("double").write_text_content(BytesText::new(&f.to_string())).map_err(xml_err)?;
            }
        }
        serde_json::Value::String(s) => {
            writer.create_element("string").write_text_content(BytesText::new(s)).map_err(xml_err)?;
        }
        serde_json::Value::Array(items) => {
            writer
                .create_element("array")
                .write_inner_content::<_, ConnectorError>(|writer| {
                    writer
                        .create_element("data")
                        .write_inner_content::<_, ConnectorError>(|writer| {
                            for item in items {
                                write_value(writer, item)?;
                            }
                            Ok(())
                        })
                        .map_err(xml_err)?;
                    Ok(())
                })
                .map_err(xml_err)?;
        }
        serde_json::Value::Object(map) => {
            writer
                .create_element("struct")
                .write_inner_content::<_, ConnectorError>(|writer| {
                    for (key, val) in map {
                        writer
                            .create_element("member")
                            .write_inner_content::<_, ConnectorError>(|writer| {
                                writer.create_element("name").write_text_content(BytesText::new(key)).map_err(xml_err)?;
                                write_value(writer, val)
                            })
                            .map_err(xml_err)?;
                    }
                    Ok(())
                })
                .map_err(xml_err)?;
        }
    }
    Ok(())
}

/// Parses one `<value>` element's content. Called right after the `<value>`
/// start tag has been consumed by the caller; consumes through the matching
/// `</value>` end tag before returning.
fn parse_value(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<serde_json::Value> {
    loop {
        let event = reader.read_event_into(buf).map_err(xml_err)?;
        match event {
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let value = match tag.as_str() {
                    "int" | "i4" => {
                        let text = read_text_until_end(reader, buf, &tag)?;
                        serde_json::Value::Number(text.trim().parse::<i64>().unwrap_or(0).into())
                    }
                    "double" => {
                        let text = read_text_until_end(reader, buf, &tag)?;
                        serde_json::Number::from_f64(text.trim().parse::<f64>().unwrap_or(0.0))
                            .map(serde_json::Value::Number)
                            .unwrap_or(serde_json::Value::Null)
                    }
                    "boolean" => {
                        let text = read_text_until_end(reader, buf, &tag)?;
                        serde_json::Value::Bool(text.trim() == "1")
                    }
                    "array" => parse_array(reader, buf)?,
                    "struct" => parse_struct(reader, buf)?,
                    // "string" and any unrecognized tag (dateTime.iso8601, base64) fall
                    // back to plain text, matching XML-RPC's untyped-value default.
                    _ => serde_json::Value::String(read_text_until_end(reader, buf, &tag)?),
                };
                expect_end(reader, buf, "value")?;
                return Ok(value);
            }
            Event::Empty(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let value = match tag.as_str() {
                    "int" | "i4" | "double" => serde_json::Value::Number(0.into()),
                    "boolean" => serde_json::Value::Bool(false),
                    "array" => serde_json::Value::Array(Vec::new()),
                    "struct" => serde_json::Value::Object(serde_json::Map::new()),
                    _ => serde_json::Value::String(String::new()),
                };
                expect_end(reader, buf, "value")?;
                return Ok(value);
            }
            Event::Text(t) => {
                // No type tag at all: XML-RPC treats a bare <value>text</value> as a string.
                let text = t.unescape().unwrap_or_default().into_owned();
                expect_end(reader, buf, "value")?;
                return Ok(serde_json::Value::String(text));
            }
            Event::End(e) if e.local_name().as_ref() == b"value" => {
                return Ok(serde_json::Value::String(String::new()));
            }
            Event::Eof => return Err(ConnectorError::Protocol { connector_id: String::new(), message: "unexpected eof in value".to_string() }),
            _ => {}
        }
    }
}

fn parse_array(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<serde_json::Value> {
    expect_start(reader, buf, "data")?;
    let mut items = Vec::new();
    loop {
        match reader.read_event_into(buf).map_err(xml_err)? {
            Event::Start(e) if e.local_name().as_ref() == b"value" => {
                items.push(parse_value(reader, buf)?);
            }
            Event::End(e) if e.local_name().as_ref() == b"data" => break,
            Event::Eof => return Err(ConnectorError::Protocol { connector_id: String::new(), message: "unexpected eof in array".to_string() }),
            _ => {}
        }
    }
    expect_end(reader, buf, "array")?;
    Ok(serde_json::Value::Array(items))
}

fn parse_struct(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<serde_json::Value> {
    let mut map = serde_json::Map::new();
    loop {
        match reader.read_event_into(buf).map_err(xml_err)? {
            Event::Start(e) if e.local_name().as_ref() == b"member" => {
                expect_start(reader, buf, "name")?;
                let name = read_text_until_end(reader, buf, "name")?;
                expect_start(reader, buf, "value")?;
                let value = parse_value(reader, buf)?;
                expect_end(reader, buf, "member")?;
                map.insert(name, value);
            }
            Event::End(e) if e.local_name().as_ref() == b"struct" => break,
            Event::Eof => return Err(ConnectorError::Protocol { connector_id: String::new(), message: "unexpected eof in struct".to_string() }),
            _ => {}
        }
    }
    Ok(serde_json::Value::Object(map))
}

fn expect_start(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, tag: &str) -> Result<()> {
    loop {
        match reader.read_event_into(buf).map_err(xml_err)? {
            Event::Start(e) if e.local_name().as_ref() == tag.as_bytes() => return Ok(()),
            Event::Eof => {
                return Err(ConnectorError::Protocol { connector_id: String::new(), message: format!("expected <{tag}>, got eof") })
            }
            _ => {}
        }
    }
}

fn expect_end(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, tag: &str) -> Result<()> {
    loop {
        match reader.read_event_into(buf).map_err(xml_err)? {
            Event::End(e) if e.local_name().as_ref() == tag.as_bytes() => return Ok(()),
            Event::Eof => {
                return Err(ConnectorError::Protocol { connector_id: String::new(), message: format!("expected </{tag}>, got eof") })
            }
            _ => {}
        }
    }
}

fn read_text_until_end(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>, tag: &str) -> Result<String> {
    let mut text = String::new();
    loop {
        match reader.read_event_into(buf).map_err(xml_err)? {
            Event::Text(t) => text.push_str(&t.unescape().unwrap_or_default()),
            Event::End(e) if e.local_name().as_ref() == tag.as_bytes() => break,
            Event::Eof => {
                return Err(ConnectorError::Protocol { connector_id: String::new(), message: format!("expected </{tag}>, got eof") })
            }
            _ => {}
        }
    }
    Ok(text)
}

impl Default for XmlRpcAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProtocolAdapter for XmlRpcAdapter {
    async fn open(&self, config: &ConnectorConfig) -> Result<()> {
        self.client_for(config)?;
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
        let call = self.build_call(&request.operation, request.body.as_ref())?;
        let url = config.endpoint(&request.endpoint).unwrap_or(&config.base_url).to_string();

        let mut builder = client.post(&url).header("Content-Type", "text/xml").body(call);
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
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(value: serde_json::Value) -> serde_json::Value {
        let mut writer = Writer::new(Vec::new());
        write_value(&mut writer, &value).unwrap();
        let xml = String::from_utf8(writer.into_inner()).unwrap();
        let mut reader = Reader::from_str(&xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        expect_start(&mut reader, &mut buf, "value").unwrap();
        parse_value(&mut reader, &mut buf).unwrap()
    }

    #[test]
    fn string_roundtrips() {
        assert_eq!(roundtrip(serde_json::json!("hello")), serde_json::json!("hello"));
    }

    #[test]
    fn int_roundtrips() {
        assert_eq!(roundtrip(serde_json::json!(42)), serde_json::json!(42));
    }

    #[test]
    fn negative_int_roundtrips() {
        assert_eq!(roundtrip(serde_json::json!(-17)), serde_json::json!(-17));
    }

    #[test]
    fn double_roundtrips() {
        assert_eq!(roundtrip(serde_json::json!(3.5)), serde_json::json!(3.5));
    }

    #[test]
    fn boolean_roundtrips() {
        assert_eq!(roundtrip(serde_json::json!(true)), serde_json::json!(true));
        assert_eq!(roundtrip(serde_json::json!(false)), serde_json::json!(false));
    }

    #[test]
    fn array_roundtrips() {
        let value = serde_json::json!([1, "two", true, 3.0]);
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn struct_roundtrips() {
        let value = serde_json::json!({"name": "acme", "active": true, "count": 7});
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn nested_struct_in_array_roundtrips() {
        let value = serde_json::json!([{"id": 1}, {"id": 2}]);
        assert_eq!(roundtrip(value.clone()), value);
    }

    #[test]
    fn build_call_emits_typed_params() {
        let adapter = XmlRpcAdapter::new();
        let params = serde_json::json!({"limit": 10, "active": true});
        let xml = adapter.build_call("listAccounts", Some(&params)).unwrap();
        assert!(xml.contains("<methodName>listAccounts</methodName>"));
        assert!(xml.contains("<int>10</int>"));
        assert!(xml.contains("<boolean>1</boolean>"));
    }

    #[test]
    fn parse_response_extracts_fault_string() {
        let adapter = XmlRpcAdapter::new();
        let xml = r#"<?xml version="1.0"?>
<methodResponse>
  <fault>
    <value>
      <struct>
        <member><name>faultCode</name><value><int>4</int></value></member>
        <member><name>faultString</name><value><string>Too many parameters.</string></value></member>
      </struct>
    </value>
  </fault>
</methodResponse>"#;
        let err = adapter.parse_response("conn", xml).unwrap_err();
        match err {
            ConnectorError::Protocol { message, .. } => assert_eq!(message, "Too many parameters."),
            other => panic!("expected Protocol error, got {other:?}"),
        }
    }

    #[test]
    fn parse_response_decodes_typed_params() {
        let adapter = XmlRpcAdapter::new();
        let xml = r#"<?xml version="1.0"?>
<methodResponse>
  <params>
    <param><value><int>7</int></value></param>
    <param><value><string>ok</string></value></param>
  </params>
</methodResponse>"#;
        let body = adapter.parse_response("conn", xml).unwrap();
        assert_eq!(body, serde_json::json!([7, "ok"]));
    }
}
