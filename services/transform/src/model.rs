//! Profile, rule and result types for [`crate::DataTransformer`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use connector_core::DataFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of transformation a [`TransformationRule`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationType {
    FormatConversion,
    FieldMapping,
    ValueTransformation,
    DataValidation,
    DataEnrichment,
    DataFiltering,
    DataAggregation,
}

/// Severity with which [`TransformationType::DataValidation`] treats a
/// failed validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ValidationLevel {
    Strict,
    #[default]
    Moderate,
    Lenient,
    None,
}

/// One `source_field -> target_field` mapping, both dotted paths into a JSON
/// object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
    pub transformation_function: Option<String>,
    pub default_value: Option<Value>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub validation_rules: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl FieldMapping {
    pub fn new(source_field: impl Into<String>, target_field: impl Into<String>) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            transformation_function: None,
            default_value: None,
            required: false,
            validation_rules: Vec::new(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_function(mut self, name: impl Into<String>) -> Self {
        self.transformation_function = Some(name.into());
        self
    }

    pub fn with_validation(mut self, rule: impl Into<String>) -> Self {
        self.validation_rules.push(rule.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// A single step in a [`TransformationProfile`]'s pipeline, applied in
/// ascending `priority` order when `enabled` and `condition` (if any) holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationRule {
    pub rule_id: String,
    pub name: String,
    pub transformation_type: TransformationType,
    pub condition: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, Value>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    100
}

impl TransformationRule {
    pub fn new(rule_id: impl Into<String>, name: impl Into<String>, transformation_type: TransformationType) -> Self {
        Self {
            rule_id: rule_id.into(),
            name: name.into(),
            transformation_type,
            condition: None,
            parameters: HashMap::new(),
            enabled: true,
            priority: 100,
            metadata: HashMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// A named, registered pipeline: field mappings plus ordered rules between a
/// source and target [`DataFormat`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationProfile {
    pub profile_id: String,
    pub name: String,
    pub description: String,
    pub source_format: DataFormat,
    pub target_format: DataFormat,
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub transformation_rules: Vec<TransformationRule>,
    #[serde(default)]
    pub validation_level: ValidationLevel,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl TransformationProfile {
    pub fn new(
        profile_id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        source_format: DataFormat,
        target_format: DataFormat,
    ) -> Self {
        Self {
            profile_id: profile_id.into(),
            name: name.into(),
            description: description.into(),
            source_format,
            target_format,
            field_mappings: Vec::new(),
            transformation_rules: Vec::new(),
            validation_level: ValidationLevel::default(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
        }
    }
}

/// Outcome of [`crate::DataTransformer::transform_data`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationResult {
    pub success: bool,
    pub transformed_data: Option<Value>,
    pub original_data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub applied_rules: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    pub transformation_time_ms: f64,
}

impl TransformationResult {
    pub(crate) fn failed(original: Value, error: impl Into<String>) -> Self {
        Self {
            success: false,
            transformed_data: None,
            original_data: Some(original),
            errors: vec![error.into()],
            warnings: Vec::new(),
            applied_rules: Vec::new(),
            metadata: HashMap::new(),
            transformation_time_ms: 0.0,
        }
    }

    pub(crate) fn seed(original: Value) -> Self {
        Self {
            success: true,
            transformed_data: Some(original.clone()),
            original_data: Some(original),
            errors: Vec::new(),
            warnings: Vec::new(),
            applied_rules: Vec::new(),
            metadata: HashMap::new(),
            transformation_time_ms: 0.0,
        }
    }
}
