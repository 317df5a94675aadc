//! Format converters backing [`crate::model::TransformationType::FormatConversion`]:
//! JSON ↔ XML and CSV ↔ JSON. Grounded on the SOAP/XML-RPC adapters' own
//! `quick_xml` event-reader/writer usage.

use quick_xml::events::{BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

/// Renders a JSON object or array under a configurable root element. Object
/// keys become child elements; list members become `<item>`; nested objects
/// recurse.
pub fn json_to_xml(data: &Value, root_element: &str) -> Result<String, String> {
    let mut writer = Writer::new(Vec::new());
    writer
        .create_element(root_element)
        .write_inner_content::<_, quick_xml::Error>(|writer| {
            match data {
                Value::Object(map) => write_object(writer, map)?,
                Value::Array(items) => write_items(writer, items)?,
                other => {
                    writer.get_mut().extend_from_slice(escape(&scalar_to_string(other)).as_bytes());
                }
            }
            Ok(())
        })
        .map_err(|e| e.to_string())?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).into_owned())
}

fn write_object(writer: &mut Writer<Vec<u8>>, map: &Map<String, Value>) -> Result<(), quick_xml::Error> {
    for (key, value) in map {
        match value {
            Value::Object(nested) => {
                writer.create_element(key).write_inner_content::<_, quick_xml::Error>(|w| write_object(w, nested))?;
            }
            Value::Array(items) => {
                writer.create_element(key).write_inner_content::<_, quick_xml::Error>(|w| write_items(w, items))?;
            }
            other => {
                writer.create_element(key).write_text_content(BytesText::new(&scalar_to_string(other)))?;
            }
        }
    }
    Ok(())
}

fn write_items(writer: &mut Writer<Vec<u8>>, items: &[Value]) -> Result<(), quick_xml::Error> {
    for item in items {
        match item {
            Value::Object(nested) => {
                writer.create_element("item").write_inner_content::<_, quick_xml::Error>(|w| write_object(w, nested))?;
            }
            other => {
                writer.create_element("item").write_text_content(BytesText::new(&scalar_to_string(other)))?;
            }
        }
    }
    Ok(())
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Parses an XML document into nested JSON objects, collapsing
/// single-child-text elements into plain strings and repeated sibling tags
/// into arrays, mirroring the convention libraries like `xmltodict` use.
pub fn xml_to_json(xml: &str) -> Result<Value, String> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let value = parse_element(&mut reader, &tag)?;
                return Ok(value);
            }
            Event::Eof => return Err("empty document".to_string()),
            _ => {}
        }
        buf.clear();
    }
}

fn parse_element(reader: &mut Reader<&[u8]>, _tag: &str) -> Result<Value, String> {
    let mut children: Map<String, Value> = Map::new();
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf).map_err(|e| e.to_string())? {
            Event::Start(e) => {
                let child_tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let child_value = parse_element(reader, &child_tag)?;
                insert_child(&mut children, child_tag, child_value);
            }
            Event::Empty(e) => {
                let child_tag = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                insert_child(&mut children, child_tag, Value::Null);
            }
            Event::Text(t) => {
                text.push_str(&t.unescape().map_err(|e| e.to_string())?);
            }
            Event::End(_) => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if children.is_empty() {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            Ok(Value::Null)
        } else {
            Ok(Value::String(trimmed.to_string()))
        }
    } else {
        Ok(Value::Object(children))
    }
}

fn insert_child(children: &mut Map<String, Value>, tag: String, value: Value) {
    match children.get_mut(&tag) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let previous = existing.clone();
            children.insert(tag, Value::Array(vec![previous, value]));
        }
        None => {
            children.insert(tag, value);
        }
    }
}

/// Parses delimiter-separated text into a JSON array of objects. With
/// `has_header`, the first row supplies field names; otherwise fields are
/// named `column_0`, `column_1`, ...
pub fn csv_to_json(csv_data: &str, delimiter: char, has_header: bool) -> Value {
    let mut reader =
        csv::ReaderBuilder::new().delimiter(delimiter as u8).has_headers(has_header).from_reader(csv_data.as_bytes());

    let mut rows = Vec::new();
    if has_header {
        let headers = reader.headers().map(|h| h.clone()).unwrap_or_default();
        for record in reader.records().flatten() {
            let mut obj = Map::new();
            for (header, field) in headers.iter().zip(record.iter()) {
                obj.insert(header.to_string(), Value::String(field.to_string()));
            }
            rows.push(Value::Object(obj));
        }
    } else {
        for record in reader.records().flatten() {
            let mut obj = Map::new();
            for (i, field) in record.iter().enumerate() {
                obj.insert(format!("column_{i}"), Value::String(field.to_string()));
            }
            rows.push(Value::Object(obj));
        }
    }
    Value::Array(rows)
}

/// Renders a JSON array (or single object, treated as a one-row array) as
/// delimited text with a header row of the union of all keys, sorted for
/// determinism.
pub fn json_to_csv(data: &Value, delimiter: char) -> Result<String, String> {
    let rows: Vec<&Map<String, Value>> = match data {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(map) => vec![map],
        _ => return Err("json_to_csv requires an object or array of objects".to_string()),
    };
    if rows.is_empty() {
        return Ok(String::new());
    }

    let mut keys: Vec<&String> = rows.iter().flat_map(|r| r.keys()).collect();
    keys.sort();
    keys.dedup();

    let mut writer = csv::WriterBuilder::new().delimiter(delimiter as u8).from_writer(Vec::new());
    writer.write_record(keys.iter().map(|k| k.as_str())).map_err(|e| e.to_string())?;
    for row in rows {
        let record: Vec<String> = keys.iter().map(|k| row.get(*k).map(scalar_to_string).unwrap_or_default()).collect();
        writer.write_record(&record).map_err(|e| e.to_string())?;
    }
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_to_xml_nests_objects_and_lists() {
        let data = json!({"name": "Acme", "tags": ["a", "b"]});
        let xml = json_to_xml(&data, "root").unwrap();
        assert!(xml.starts_with("<root>"));
        assert!(xml.contains("<name>Acme</name>"));
        assert!(xml.contains("<item>a</item>"));
    }

    #[test]
    fn xml_round_trips_simple_values() {
        let xml = "<root><name>Acme</name><active>true</active></root>";
        let value = xml_to_json(xml).unwrap();
        assert_eq!(value["name"], json!("Acme"));
        assert_eq!(value["active"], json!("true"));
    }

    #[test]
    fn csv_to_json_uses_header_row() {
        let csv_data = "name,age\nJohn,30\nJane,25\n";
        let value = csv_to_json(csv_data, ',', true);
        assert_eq!(value[0]["name"], json!("John"));
        assert_eq!(value[1]["age"], json!("25"));
    }

    #[test]
    fn json_to_csv_sorts_header_union() {
        let data = json!([{"b": 1, "a": 2}]);
        let csv_text = json_to_csv(&data, ',').unwrap();
        assert!(csv_text.starts_with("a,b"));
    }
}
