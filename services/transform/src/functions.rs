//! Built-in transformation functions, keyed by name in
//! [`crate::DataTransformer`]'s function registry.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Signature every transformation function implements: the current value
/// plus any `function_args` parameters from the rule, returning the new
/// value.
pub type TransformFn = fn(&Value, &HashMap<String, Value>) -> Value;

fn as_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn uppercase(value: &Value, _args: &HashMap<String, Value>) -> Value {
    Value::String(as_string(value).to_uppercase())
}

fn lowercase(value: &Value, _args: &HashMap<String, Value>) -> Value {
    Value::String(as_string(value).to_lowercase())
}

fn strip(value: &Value, _args: &HashMap<String, Value>) -> Value {
    Value::String(as_string(value).trim().to_string())
}

fn to_string_fn(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        Value::Null
    } else {
        Value::String(as_string(value))
    }
}

fn to_int(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    as_string(value)
        .trim()
        .parse::<f64>()
        .ok()
        .map(|f| Value::from(f as i64))
        .unwrap_or(Value::Null)
}

fn to_float(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    as_string(value).trim().parse::<f64>().ok().map(Value::from).unwrap_or(Value::Null)
}

fn to_bool(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let s = as_string(value).to_lowercase();
    Value::Bool(matches!(s.as_str(), "true" | "1" | "yes" | "on"))
}

fn format_date(value: &Value, _args: &HashMap<String, Value>) -> Value {
    match parse_datetime(value) {
        Some(dt) => Value::String(dt.format("%Y-%m-%d").to_string()),
        None => value.clone(),
    }
}

fn format_datetime(value: &Value, _args: &HashMap<String, Value>) -> Value {
    match parse_datetime(value) {
        Some(dt) => Value::String(dt.to_rfc3339()),
        None => value.clone(),
    }
}

fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?;
    DateTime::parse_from_rfc3339(s.replace('Z', "+00:00").as_str())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc()))
}

/// Nigerian mobile numbers: an 11-digit number with a leading `0` or a bare
/// 10-digit local number both normalize to `+234<9 digits>`; anything else
/// is returned as digits-only.
fn normalize_phone(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]").unwrap());
    let digits = NON_DIGIT.replace_all(&as_string(value), "").to_string();
    let normalized = if digits.len() == 11 && digits.starts_with('0') {
        format!("+234{}", &digits[1..])
    } else if digits.len() == 10 {
        format!("+234{digits}")
    } else if digits.len() == 13 && digits.starts_with("234") {
        format!("+{digits}")
    } else {
        digits
    };
    Value::String(normalized)
}

fn normalize_email(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    Value::String(as_string(value).to_lowercase().trim().to_string())
}

fn extract_numbers(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    static NOT_DIGIT_OR_DOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.]").unwrap());
    Value::String(NOT_DIGIT_OR_DOT.replace_all(&as_string(value), "").to_string())
}

fn remove_special_chars(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    static NOT_ALNUM_OR_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").unwrap());
    Value::String(NOT_ALNUM_OR_SPACE.replace_all(&as_string(value), "").to_string())
}

fn truncate(value: &Value, args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let length = args.get("length").and_then(Value::as_u64).unwrap_or(255) as usize;
    let s = as_string(value);
    Value::String(s.chars().take(length).collect())
}

fn pad_left(value: &Value, args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let width = args.get("width").and_then(Value::as_u64).unwrap_or(10) as usize;
    let ch = args.get("char").and_then(Value::as_str).and_then(|s| s.chars().next()).unwrap_or('0');
    let s = as_string(value);
    let mut padding: String = std::iter::repeat(ch).take(width.saturating_sub(s.chars().count())).collect();
    padding.push_str(&s);
    Value::String(padding)
}

fn pad_right(value: &Value, args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let width = args.get("width").and_then(Value::as_u64).unwrap_or(10) as usize;
    let ch = args.get("char").and_then(Value::as_str).and_then(|s| s.chars().next()).unwrap_or(' ');
    let s = as_string(value);
    let mut padded = s.clone();
    while padded.chars().count() < width {
        padded.push(ch);
    }
    Value::String(padded)
}

fn currency_to_cents(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    as_string(value).trim().parse::<f64>().ok().map(|f| Value::from((f * 100.0).round() as i64)).unwrap_or(Value::Null)
}

fn cents_to_currency(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    value.as_i64().map(|cents| Value::from(cents as f64 / 100.0)).unwrap_or(Value::Null)
}

fn split_string(value: &Value, args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Array(Vec::new());
    }
    let delimiter = args.get("delimiter").and_then(Value::as_str).unwrap_or(",");
    Value::Array(as_string(value).split(delimiter).map(|s| Value::String(s.to_string())).collect())
}

fn join_list(value: &Value, args: &HashMap<String, Value>) -> Value {
    let delimiter = args.get("delimiter").and_then(Value::as_str).unwrap_or(",");
    match value.as_array() {
        Some(items) => Value::String(items.iter().map(as_string).collect::<Vec<_>>().join(delimiter)),
        None => Value::String(as_string(value)),
    }
}

fn hash_value(value: &Value, _args: &HashMap<String, Value>) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    as_string(value).hash(&mut hasher);
    Value::String(hasher.finish().to_string())
}

fn generate_uuid(_value: &Value, _args: &HashMap<String, Value>) -> Value {
    Value::String(uuid::Uuid::new_v4().to_string())
}

fn current_timestamp(_value: &Value, _args: &HashMap<String, Value>) -> Value {
    Value::String(Utc::now().to_rfc3339())
}

/// Returns the full built-in transformation function table, keyed by name.
pub fn builtins() -> HashMap<String, TransformFn> {
    let mut map: HashMap<String, TransformFn> = HashMap::new();
    map.insert("uppercase".into(), uppercase);
    map.insert("lowercase".into(), lowercase);
    map.insert("strip".into(), strip);
    map.insert("to_string".into(), to_string_fn);
    map.insert("to_int".into(), to_int);
    map.insert("to_float".into(), to_float);
    map.insert("to_bool".into(), to_bool);
    map.insert("format_date".into(), format_date);
    map.insert("format_datetime".into(), format_datetime);
    map.insert("normalize_phone".into(), normalize_phone);
    map.insert("normalize_email".into(), normalize_email);
    map.insert("extract_numbers".into(), extract_numbers);
    map.insert("remove_special_chars".into(), remove_special_chars);
    map.insert("truncate".into(), truncate);
    map.insert("pad_left".into(), pad_left);
    map.insert("pad_right".into(), pad_right);
    map.insert("currency_to_cents".into(), currency_to_cents);
    map.insert("cents_to_currency".into(), cents_to_currency);
    map.insert("split_string".into(), split_string);
    map.insert("join_list".into(), join_list);
    map.insert("hash_value".into(), hash_value);
    map.insert("generate_uuid".into(), generate_uuid);
    map.insert("current_timestamp".into(), current_timestamp);
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_nigerian_mobile_numbers() {
        let args = HashMap::new();
        assert_eq!(normalize_phone(&json!("08012345678"), &args), json!("+2348012345678"));
        assert_eq!(normalize_phone(&json!("8012345678"), &args), json!("+2348012345678"));
        assert_eq!(normalize_phone(&json!("+234 801 234 5678"), &args), json!("+2348012345678"));
    }

    #[test]
    fn currency_round_trips_through_cents() {
        let args = HashMap::new();
        let cents = currency_to_cents(&json!("19.99"), &args);
        assert_eq!(cents, json!(1999));
        assert_eq!(cents_to_currency(&cents, &args), json!(19.99));
    }

    #[test]
    fn truncate_and_pad_respect_args() {
        let mut args = HashMap::new();
        args.insert("length".to_string(), json!(3));
        assert_eq!(truncate(&json!("abcdef"), &args), json!("abc"));

        let mut pad_args = HashMap::new();
        pad_args.insert("width".to_string(), json!(5));
        pad_args.insert("char".to_string(), json!("0"));
        assert_eq!(pad_left(&json!("7"), &pad_args), json!("00007"));
    }
}
