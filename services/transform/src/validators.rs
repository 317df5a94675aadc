//! Built-in validation functions, keyed by name in
//! [`crate::DataTransformer`]'s validation registry.
//!
//! A validation rule is written `name` or `name:param,param`, e.g.
//! `"max_length:100"` or `"range:0,100"`; [`crate::DataTransformer::validate_field_value`]
//! splits the rule string and calls the matching function with the raw
//! string params.

use std::collections::HashMap;

use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Signature every validation function implements: the value plus the
/// rule's raw string parameters, returning pass/fail.
pub type ValidateFn = fn(&Value, &[String]) -> bool;

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn as_str(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn required(value: &Value, _params: &[String]) -> bool {
    !is_blank(value)
}

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap());
static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").unwrap());
static NON_DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9]").unwrap());

fn email(value: &Value, _params: &[String]) -> bool {
    if is_blank(value) {
        return false;
    }
    EMAIL_RE.is_match(&as_str(value))
}

fn phone(value: &Value, _params: &[String]) -> bool {
    if is_blank(value) {
        return false;
    }
    let digits = NON_DIGIT_RE.replace_all(&as_str(value), "").to_string();
    (10..=15).contains(&digits.len())
}

fn numeric(value: &Value, _params: &[String]) -> bool {
    as_str(value).trim().parse::<f64>().is_ok()
}

fn date(value: &Value, _params: &[String]) -> bool {
    if is_blank(value) {
        return false;
    }
    let s = as_str(value).replace('Z', "+00:00");
    DateTime::parse_from_rfc3339(&s).is_ok() || chrono::NaiveDate::parse_from_str(&as_str(value), "%Y-%m-%d").is_ok()
}

fn url(value: &Value, _params: &[String]) -> bool {
    if is_blank(value) {
        return false;
    }
    URL_RE.is_match(&as_str(value))
}

fn min_length(value: &Value, params: &[String]) -> bool {
    if is_blank(value) {
        return false;
    }
    let min_len: usize = params.first().and_then(|p| p.parse().ok()).unwrap_or(1);
    as_str(value).chars().count() >= min_len
}

fn max_length(value: &Value, params: &[String]) -> bool {
    if is_blank(value) {
        return true;
    }
    let max_len: usize = params.first().and_then(|p| p.parse().ok()).unwrap_or(255);
    as_str(value).chars().count() <= max_len
}

fn regex_rule(value: &Value, params: &[String]) -> bool {
    if is_blank(value) {
        return false;
    }
    let Some(pattern) = params.first() else { return false };
    Regex::new(pattern).map(|re| re.is_match(&as_str(value))).unwrap_or(false)
}

fn in_list(value: &Value, params: &[String]) -> bool {
    if is_blank(value) {
        return false;
    }
    params.contains(&as_str(value))
}

fn range(value: &Value, params: &[String]) -> bool {
    if is_blank(value) {
        return false;
    }
    let Ok(v) = as_str(value).parse::<f64>() else { return false };
    let (Some(min), Some(max)) = (params.first().and_then(|p| p.parse::<f64>().ok()), params.get(1).and_then(|p| p.parse::<f64>().ok())) else {
        return false;
    };
    v >= min && v <= max
}

/// Returns the full built-in validation function table, keyed by name.
pub fn builtins() -> HashMap<String, ValidateFn> {
    let mut map: HashMap<String, ValidateFn> = HashMap::new();
    map.insert("required".into(), required);
    map.insert("email".into(), email);
    map.insert("phone".into(), phone);
    map.insert("numeric".into(), numeric);
    map.insert("date".into(), date);
    map.insert("url".into(), url);
    map.insert("min_length".into(), min_length);
    map.insert("max_length".into(), max_length);
    map.insert("regex".into(), regex_rule);
    map.insert("in_list".into(), in_list);
    map.insert("range".into(), range);
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_rejects_malformed_addresses() {
        assert!(email(&json!("john.doe@example.com"), &[]));
        assert!(!email(&json!("not-an-email"), &[]));
    }

    #[test]
    fn max_length_allows_blank_but_bounds_present_values() {
        assert!(max_length(&json!(null), &["5".to_string()]));
        assert!(!max_length(&json!("toolong"), &["5".to_string()]));
    }

    #[test]
    fn range_bounds_inclusive() {
        let params = vec!["0".to_string(), "100".to_string()];
        assert!(range(&json!("100"), &params));
        assert!(!range(&json!("101"), &params));
    }
}
