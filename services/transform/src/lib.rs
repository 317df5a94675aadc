//! # Data Transformer
//!
//! Profile-driven data transformation: a [`model::TransformationProfile`]
//! names a source/target [`connector_core::DataFormat`] pair, ordered field
//! mappings and ordered transformation rules; [`DataTransformer::transform_data`]
//! runs a payload through a named profile and reports what happened.
//!
//! Transformation is pure CPU work over JSON, so unlike the connector
//! runtime this crate has no async surface — every collaborator the
//! original reached for (`eval()` for conditions and formulas) is replaced
//! here with a small hand-parsed expression language in [`condition`] rather
//! than carried over as-is.

#![warn(missing_docs)]

mod condition;
mod convert;
pub mod functions;
mod model;
mod path;
pub mod validators;

pub use model::{FieldMapping, TransformationProfile, TransformationResult, TransformationRule, TransformationType, ValidationLevel};

use std::collections::HashMap;

use connector_core::DataFormat;
use functions::TransformFn;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{info, warn};
use validators::ValidateFn;

/// Profile registry plus pluggable transformation/validation function
/// tables; the entry point for running a payload through a named profile.
pub struct DataTransformer {
    profiles: RwLock<HashMap<String, TransformationProfile>>,
    transformation_functions: RwLock<HashMap<String, TransformFn>>,
    validation_functions: RwLock<HashMap<String, ValidateFn>>,
}

impl DataTransformer {
    /// Builds a transformer preloaded with the built-in transform/validation
    /// functions and the four default profiles (`json_to_xml`, `xml_to_json`,
    /// `csv_to_json`, `data_normalization`).
    pub fn new() -> Self {
        let transformer = Self {
            profiles: RwLock::new(HashMap::new()),
            transformation_functions: RwLock::new(functions::builtins()),
            validation_functions: RwLock::new(validators::builtins()),
        };
        for profile in default_profiles() {
            transformer.add_transformation_profile(profile);
        }
        transformer
    }

    /// Registers or replaces a profile.
    pub fn add_transformation_profile(&self, profile: TransformationProfile) {
        let profile_id = profile.profile_id.clone();
        self.profiles.write().insert(profile_id.clone(), profile);
        info!(profile_id, "added transformation profile");
    }

    pub fn get_transformation_profile(&self, profile_id: &str) -> Option<TransformationProfile> {
        self.profiles.read().get(profile_id).cloned()
    }

    pub fn list_transformation_profiles(&self) -> Vec<TransformationProfile> {
        self.profiles.read().values().cloned().collect()
    }

    /// Registers or replaces a named transformation function.
    pub fn add_transformation_function(&self, name: impl Into<String>, function: TransformFn) {
        let name = name.into();
        self.transformation_functions.write().insert(name.clone(), function);
        info!(name, "added transformation function");
    }

    /// Registers or replaces a named validation function.
    pub fn add_validation_function(&self, name: impl Into<String>, function: ValidateFn) {
        let name = name.into();
        self.validation_functions.write().insert(name.clone(), function);
        info!(name, "added validation function");
    }

    /// Runs `data` through the named profile's field mappings and
    /// transformation rules, in ascending `priority` order, skipping
    /// disabled rules and rules whose `condition` does not hold. Returns a
    /// [`TransformationResult`] even on failure; transform pipelines never
    /// panic on malformed input.
    pub fn transform_data(&self, data: Value, profile_id: &str) -> TransformationResult {
        let started = std::time::Instant::now();

        let Some(profile) = self.get_transformation_profile(profile_id) else {
            return TransformationResult::failed(data, format!("transformation profile not found: {profile_id}"));
        };

        let mut result = TransformationResult::seed(data);
        let mut rules = profile.transformation_rules.clone();
        rules.sort_by_key(|r| r.priority);

        let mut field_mapping_applied = false;
        for rule in &rules {
            if !rule.enabled {
                continue;
            }
            if let Some(condition) = &rule.condition {
                let current = result.transformed_data.clone().unwrap_or(Value::Null);
                if !condition::evaluate_condition(&current, condition) {
                    continue;
                }
            }

            result = match rule.transformation_type {
                TransformationType::FormatConversion => self.apply_format_conversion(result, rule, &profile),
                TransformationType::FieldMapping => {
                    field_mapping_applied = true;
                    self.apply_field_mapping(result, &profile.field_mappings)
                }
                TransformationType::ValueTransformation => self.apply_value_transformation(result, rule),
                TransformationType::DataValidation => self.apply_data_validation(result, &profile),
                TransformationType::DataEnrichment => self.apply_data_enrichment(result, rule),
                TransformationType::DataFiltering => self.apply_data_filtering(result, rule),
                TransformationType::DataAggregation => self.apply_data_aggregation(result, rule),
            };

            if !result.success {
                break;
            }
            result.applied_rules.push(rule.rule_id.clone());
        }

        if result.success && !profile.field_mappings.is_empty() && !field_mapping_applied {
            result = self.apply_field_mapping(result, &profile.field_mappings);
        }

        result.transformation_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        result
    }

    fn apply_format_conversion(&self, mut result: TransformationResult, rule: &model::TransformationRule, profile: &TransformationProfile) -> TransformationResult {
        if profile.source_format == profile.target_format {
            return result;
        }
        let data = result.transformed_data.clone().unwrap_or(Value::Null);

        match (profile.source_format, profile.target_format) {
            (DataFormat::Json, DataFormat::Xml) => {
                if data.is_object() || data.is_array() {
                    let root_element = rule.parameters.get("root_element").and_then(Value::as_str).unwrap_or("root");
                    match convert::json_to_xml(&data, root_element) {
                        Ok(xml) => result.transformed_data = Some(Value::String(xml)),
                        Err(e) => {
                            result.errors.push(format!("format conversion failed: {e}"));
                            result.success = false;
                        }
                    }
                } else {
                    result.errors.push("invalid JSON data for XML conversion".to_string());
                    result.success = false;
                }
            }
            (DataFormat::Xml, DataFormat::Json) => {
                if let Some(xml) = data.as_str() {
                    match convert::xml_to_json(xml) {
                        Ok(json) => result.transformed_data = Some(json),
                        Err(e) => {
                            result.errors.push(format!("format conversion failed: {e}"));
                            result.success = false;
                        }
                    }
                } else {
                    result.errors.push("invalid XML data for JSON conversion".to_string());
                    result.success = false;
                }
            }
            (DataFormat::Csv, DataFormat::Json) => {
                if let Some(csv_text) = data.as_str() {
                    let delimiter = rule.parameters.get("delimiter").and_then(Value::as_str).and_then(|s| s.chars().next()).unwrap_or(',');
                    let has_header = rule.parameters.get("has_header").and_then(Value::as_bool).unwrap_or(true);
                    result.transformed_data = Some(convert::csv_to_json(csv_text, delimiter, has_header));
                } else {
                    result.errors.push("invalid CSV data for JSON conversion".to_string());
                    result.success = false;
                }
            }
            (DataFormat::Json, DataFormat::Csv) => {
                if data.is_object() || data.is_array() {
                    let delimiter = rule.parameters.get("delimiter").and_then(Value::as_str).and_then(|s| s.chars().next()).unwrap_or(',');
                    match convert::json_to_csv(&data, delimiter) {
                        Ok(csv_text) => result.transformed_data = Some(Value::String(csv_text)),
                        Err(e) => {
                            result.errors.push(format!("format conversion failed: {e}"));
                            result.success = false;
                        }
                    }
                } else {
                    result.errors.push("invalid JSON data for CSV conversion".to_string());
                    result.success = false;
                }
            }
            _ => {
                result.warnings.push(format!("unsupported format conversion: {:?} to {:?}", profile.source_format, profile.target_format));
            }
        }
        result
    }

    fn apply_field_mapping(&self, mut result: TransformationResult, field_mappings: &[FieldMapping]) -> TransformationResult {
        let Some(source_data) = result.transformed_data.clone() else { return result };
        if !source_data.is_object() {
            result.warnings.push("field mapping requires object data".to_string());
            return result;
        }

        let mut mapped = Value::Object(Default::default());
        for mapping in field_mappings {
            let mut value = path::get_nested_value(&source_data, &mapping.source_field).unwrap_or(Value::Null);

            if let Some(function_name) = &mapping.transformation_function {
                let found = self.transformation_functions.read().get(function_name).copied();
                match found {
                    Some(f) => value = f(&value, &HashMap::new()),
                    None => result.warnings.push(format!("transformation function '{function_name}' not found")),
                }
            }

            if matches!(value, Value::Null) || matches!(&value, Value::String(s) if s.is_empty()) {
                if let Some(default) = &mapping.default_value {
                    value = default.clone();
                }
            }

            for rule in &mapping.validation_rules {
                if !self.validate_field_value(&value, rule) {
                    let message = format!("validation failed for field '{}': {rule}", mapping.target_field);
                    if mapping.required {
                        result.errors.push(message);
                        result.success = false;
                    } else {
                        result.warnings.push(message);
                    }
                }
            }

            path::set_nested_value(&mut mapped, &mapping.target_field, value);
        }

        result.transformed_data = Some(mapped);
        result
    }

    fn apply_value_transformation(&self, mut result: TransformationResult, rule: &model::TransformationRule) -> TransformationResult {
        let Some(function_name) = rule.parameters.get("function").and_then(Value::as_str) else {
            result.warnings.push("value transformation missing 'function' parameter".to_string());
            return result;
        };
        let Some(f) = self.transformation_functions.read().get(function_name).copied() else {
            result.warnings.push(format!("transformation function not found: {function_name}"));
            return result;
        };
        let args: HashMap<String, Value> = rule
            .parameters
            .get("function_args")
            .and_then(Value::as_object)
            .map(|m| m.clone().into_iter().collect())
            .unwrap_or_default();

        let field_path = rule.parameters.get("field").and_then(Value::as_str);
        let Some(current) = result.transformed_data.clone() else { return result };

        match field_path {
            Some(path_str) if current.is_object() => {
                let value = path::get_nested_value(&current, path_str).unwrap_or(Value::Null);
                let mut updated = current;
                path::set_nested_value(&mut updated, path_str, f(&value, &args));
                result.transformed_data = Some(updated);
            }
            _ => {
                result.transformed_data = Some(f(&current, &args));
            }
        }
        result
    }

    fn apply_data_validation(&self, mut result: TransformationResult, profile: &TransformationProfile) -> TransformationResult {
        if profile.validation_level == ValidationLevel::None {
            return result;
        }
        let Some(current) = result.transformed_data.clone() else { return result };
        if !current.is_object() {
            return result;
        }

        let mut hard_errors = Vec::new();
        let mut soft_warnings = Vec::new();
        for mapping in &profile.field_mappings {
            let value = path::get_nested_value(&current, &mapping.target_field).unwrap_or(Value::Null);
            for rule in &mapping.validation_rules {
                if !self.validate_field_value(&value, rule) {
                    let message = format!("validation failed for field '{}': {rule}", mapping.target_field);
                    if mapping.required || profile.validation_level == ValidationLevel::Strict {
                        hard_errors.push(message);
                    } else {
                        soft_warnings.push(message);
                    }
                }
            }
        }

        result.errors.extend(hard_errors.clone());
        result.warnings.extend(soft_warnings);
        if !hard_errors.is_empty() && profile.validation_level == ValidationLevel::Strict {
            result.success = false;
        }
        result
    }

    fn apply_data_enrichment(&self, mut result: TransformationResult, rule: &model::TransformationRule) -> TransformationResult {
        let Some(kind) = rule.parameters.get("type").and_then(Value::as_str) else { return result };
        let Some(current) = result.transformed_data.clone() else { return result };
        if !current.is_object() {
            return result;
        }
        let mut updated = current;

        match kind {
            "add_timestamp" => {
                let field = rule.parameters.get("field").and_then(Value::as_str).unwrap_or("timestamp");
                path::set_nested_value(&mut updated, field, Value::String(chrono::Utc::now().to_rfc3339()));
            }
            "add_uuid" => {
                let field = rule.parameters.get("field").and_then(Value::as_str).unwrap_or("id");
                path::set_nested_value(&mut updated, field, Value::String(uuid::Uuid::new_v4().to_string()));
            }
            "calculate_field" => {
                let formula = rule.parameters.get("formula").and_then(Value::as_str);
                let target_field = rule.parameters.get("target_field").and_then(Value::as_str);
                if let (Some(formula), Some(target_field)) = (formula, target_field) {
                    match condition::evaluate_formula(&updated, formula) {
                        Some(value) => path::set_nested_value(&mut updated, target_field, Value::from(value)),
                        None => result.warnings.push(format!("formula calculation failed: {formula}")),
                    }
                }
            }
            other => warn!(kind = other, "unknown enrichment type"),
        }

        result.transformed_data = Some(updated);
        result
    }

    fn apply_data_filtering(&self, mut result: TransformationResult, rule: &model::TransformationRule) -> TransformationResult {
        let Some(current) = result.transformed_data.clone() else { return result };

        match current {
            Value::Array(items) => {
                if let Some(condition) = rule.parameters.get("condition").and_then(Value::as_str) {
                    let filtered: Vec<Value> = items.into_iter().filter(|item| condition::evaluate_condition(item, condition)).collect();
                    result.transformed_data = Some(Value::Array(filtered));
                } else {
                    result.transformed_data = Some(Value::Array(items));
                }
            }
            Value::Object(mut map) => {
                if let Some(remove_fields) = rule.parameters.get("remove_fields").and_then(Value::as_array) {
                    for field in remove_fields.iter().filter_map(Value::as_str) {
                        map.remove(field);
                    }
                }
                result.transformed_data = Some(Value::Object(map));
            }
            other => result.transformed_data = Some(other),
        }
        result
    }

    fn apply_data_aggregation(&self, mut result: TransformationResult, rule: &model::TransformationRule) -> TransformationResult {
        let Some(Value::Array(items)) = result.transformed_data.clone() else {
            result.warnings.push("data aggregation requires list data".to_string());
            return result;
        };

        let kind = rule.parameters.get("type").and_then(Value::as_str);
        let field = rule.parameters.get("field").and_then(Value::as_str);

        match kind {
            Some("count") => {
                let mut out = serde_json::Map::new();
                out.insert("count".to_string(), Value::from(items.len()));
                result.transformed_data = Some(Value::Object(out));
            }
            Some("sum") => {
                if let Some(field) = field {
                    let total: f64 = items
                        .iter()
                        .filter_map(Value::as_object)
                        .filter_map(|obj| obj.get(field))
                        .filter_map(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
                        .sum();
                    let mut out = serde_json::Map::new();
                    out.insert("sum".to_string(), Value::from(total));
                    result.transformed_data = Some(Value::Object(out));
                }
            }
            Some("group_by") => {
                if let Some(field) = field {
                    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
                    for item in items {
                        if let Some(key_value) = item.as_object().and_then(|o| o.get(field)) {
                            let key = key_value.as_str().map(str::to_string).unwrap_or_else(|| key_value.to_string());
                            groups.entry(key).or_default().push(item);
                        }
                    }
                    let out: serde_json::Map<String, Value> = groups.into_iter().map(|(k, v)| (k, Value::Array(v))).collect();
                    result.transformed_data = Some(Value::Object(out));
                }
            }
            _ => {}
        }
        result
    }

    /// Parses a rule string such as `"max_length:100"` or
    /// `"in_list:gold,silver,bronze"` into a name and raw string
    /// parameters, and dispatches to the matching validation function.
    /// Unknown rule names pass validation, matching the original's
    /// permissive fallback.
    pub fn validate_field_value(&self, value: &Value, rule: &str) -> bool {
        let (name, params) = match rule.split_once(':') {
            Some((name, params)) => (name, params.split(',').map(str::to_string).collect()),
            None => (rule, Vec::new()),
        };
        match self.validation_functions.read().get(name) {
            Some(f) => f(value, &params),
            None => true,
        }
    }

    /// Counts of registered profiles and functions, plus the full name
    /// lists, for operator dashboards.
    pub fn get_transformer_statistics(&self) -> Value {
        let profiles = self.profiles.read();
        let transforms = self.transformation_functions.read();
        let validations = self.validation_functions.read();
        serde_json::json!({
            "total_profiles": profiles.len(),
            "transformation_functions": transforms.len(),
            "validation_functions": validations.len(),
            "available_functions": {
                "transformation": transforms.keys().cloned().collect::<Vec<_>>(),
                "validation": validations.keys().cloned().collect::<Vec<_>>(),
            }
        })
    }
}

impl Default for DataTransformer {
    fn default() -> Self {
        Self::new()
    }
}

fn default_profiles() -> Vec<TransformationProfile> {
    let mut json_to_xml = TransformationProfile::new("json_to_xml", "JSON to XML Converter", "Convert JSON data to XML format", DataFormat::Json, DataFormat::Xml);
    json_to_xml.transformation_rules.push(
        model::TransformationRule::new("json_xml_conversion", "JSON to XML Conversion", TransformationType::FormatConversion)
            .with_parameter("root_element", "root"),
    );

    let mut xml_to_json = TransformationProfile::new("xml_to_json", "XML to JSON Converter", "Convert XML data to JSON format", DataFormat::Xml, DataFormat::Json);
    xml_to_json
        .transformation_rules
        .push(model::TransformationRule::new("xml_json_conversion", "XML to JSON Conversion", TransformationType::FormatConversion));

    let mut csv_to_json = TransformationProfile::new("csv_to_json", "CSV to JSON Converter", "Convert CSV data to JSON format", DataFormat::Csv, DataFormat::Json);
    csv_to_json.transformation_rules.push(
        model::TransformationRule::new("csv_json_conversion", "CSV to JSON Conversion", TransformationType::FormatConversion)
            .with_parameter("delimiter", ",")
            .with_parameter("has_header", true),
    );

    let mut normalization = TransformationProfile::new("data_normalization", "Data Normalization Profile", "Normalize common data fields", DataFormat::Json, DataFormat::Json);
    normalization.field_mappings = vec![
        FieldMapping::new("email", "email").with_function("normalize_email").with_validation("required").with_validation("email"),
        FieldMapping::new("phone", "phone").with_function("normalize_phone").with_validation("phone"),
        FieldMapping::new("name", "name").with_function("strip").with_validation("required").with_validation("max_length:100"),
    ];

    vec![json_to_xml, xml_to_json, csv_to_json, normalization]
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::TransformationRule;
    use serde_json::json;

    #[test]
    fn normalization_profile_trims_and_normalizes() {
        let transformer = DataTransformer::new();
        let data = json!({"name": "  John Doe  ", "email": "JOHN.DOE@EXAMPLE.COM", "phone": "08012345678"});
        let result = transformer.transform_data(data, "data_normalization");
        assert!(result.success, "errors: {:?}", result.errors);
        let out = result.transformed_data.unwrap();
        assert_eq!(out["name"], json!("John Doe"));
        assert_eq!(out["email"], json!("john.doe@example.com"));
        assert_eq!(out["phone"], json!("+2348012345678"));
    }

    #[test]
    fn unknown_profile_fails_without_panicking() {
        let transformer = DataTransformer::new();
        let result = transformer.transform_data(json!({}), "does-not-exist");
        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn strict_validation_escalates_optional_field_failure() {
        let transformer = DataTransformer::new();
        let mut profile = TransformationProfile::new("strict-test", "Strict", "", DataFormat::Json, DataFormat::Json);
        profile.validation_level = ValidationLevel::Strict;
        profile.field_mappings = vec![FieldMapping::new("email", "email").with_validation("email")];
        profile.transformation_rules.push(TransformationRule::new("validate", "Validate", TransformationType::DataValidation));
        transformer.add_transformation_profile(profile);

        let result = transformer.transform_data(json!({"email": "not-an-email"}), "strict-test");
        assert!(!result.success);
    }

    #[test]
    fn field_mapping_required_failure_is_hard_error() {
        let transformer = DataTransformer::new();
        let mut profile = TransformationProfile::new("required-test", "Required", "", DataFormat::Json, DataFormat::Json);
        profile.field_mappings = vec![FieldMapping::new("email", "email").with_validation("email").required()];
        transformer.add_transformation_profile(profile);

        let result = transformer.transform_data(json!({"email": "not-an-email"}), "required-test");
        assert!(!result.success);
    }

    #[test]
    fn data_filtering_removes_named_fields() {
        let transformer = DataTransformer::new();
        let mut profile = TransformationProfile::new("filter-test", "Filter", "", DataFormat::Json, DataFormat::Json);
        profile.transformation_rules.push(
            TransformationRule::new("drop-secret", "Drop secret", TransformationType::DataFiltering)
                .with_parameter("remove_fields", json!(["secret"])),
        );
        transformer.add_transformation_profile(profile);

        let result = transformer.transform_data(json!({"name": "Acme", "secret": "shh"}), "filter-test");
        assert!(result.success);
        assert!(result.transformed_data.unwrap().get("secret").is_none());
    }

    #[test]
    fn data_aggregation_sums_a_field_across_a_list() {
        let transformer = DataTransformer::new();
        let mut profile = TransformationProfile::new("agg-test", "Aggregate", "", DataFormat::Json, DataFormat::Json);
        profile.transformation_rules.push(
            TransformationRule::new("sum-amount", "Sum amount", TransformationType::DataAggregation)
                .with_parameter("type", "sum")
                .with_parameter("field", "amount"),
        );
        transformer.add_transformation_profile(profile);

        let result = transformer.transform_data(json!([{"amount": 10}, {"amount": 15}]), "agg-test");
        assert!(result.success);
        assert_eq!(result.transformed_data.unwrap()["sum"], json!(25.0));
    }
}
