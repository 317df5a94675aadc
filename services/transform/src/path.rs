//! Dot-path access into a `serde_json::Value` object, e.g. `"address.city"`.

use serde_json::{Map, Value};

/// Reads a dotted path. Returns `None` if any intermediate segment is
/// missing or not an object.
pub fn get_nested_value(data: &Value, field_path: &str) -> Option<Value> {
    let mut current = data;
    for key in field_path.split('.') {
        current = current.as_object()?.get(key)?;
    }
    Some(current.clone())
}

/// Writes a dotted path, creating intermediate objects as needed. No-op if
/// `data` is not (or cannot become) an object.
pub fn set_nested_value(data: &mut Value, field_path: &str, value: Value) {
    if !data.is_object() {
        *data = Value::Object(Map::new());
    }
    let mut keys = field_path.split('.').peekable();
    let mut current = data.as_object_mut().expect("just ensured object");
    while let Some(key) = keys.next() {
        if keys.peek().is_none() {
            current.insert(key.to_string(), value);
            return;
        }
        let entry = current.entry(key.to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = entry.as_object_mut().expect("just ensured object");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_nested_path() {
        let data = json!({"address": {"city": "Lagos"}});
        assert_eq!(get_nested_value(&data, "address.city"), Some(json!("Lagos")));
        assert_eq!(get_nested_value(&data, "address.zip"), None);
    }

    #[test]
    fn writes_creating_intermediates() {
        let mut data = json!({});
        set_nested_value(&mut data, "address.city", json!("Lagos"));
        assert_eq!(data, json!({"address": {"city": "Lagos"}}));
    }

    #[test]
    fn overwrites_non_object_intermediate() {
        let mut data = json!({"address": "flat"});
        set_nested_value(&mut data, "address.city", json!("Lagos"));
        assert_eq!(data, json!({"address": {"city": "Lagos"}}));
    }
}
