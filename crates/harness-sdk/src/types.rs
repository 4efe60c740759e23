use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Evaluation subject passed to variable, feature and track calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "user_id", alias = "userId", default)]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_build: Option<f64>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub custom_data: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub private_custom_data: Map<String, Value>,
}

/// Custom event recorded through `track`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VariableType {
    Boolean,
    Number,
    String,
    #[serde(rename = "JSON")]
    Json,
}

impl VariableType {
    /// Infers the variable type carried by a JSON value. `null` has no type.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(_) => Some(Self::Number),
            Value::String(_) => Some(Self::String),
            Value::Object(_) | Value::Array(_) => Some(Self::Json),
            Value::Null => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::Number => "Number",
            Self::String => "String",
            Self::Json => "JSON",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvalReason {
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<String>,
}

impl EvalReason {
    pub fn defaulted(details: &str) -> Self {
        Self {
            reason: "DEFAULT".to_string(),
            details: Some(details.to_string()),
            target_id: None,
        }
    }
}

/// Variable as it appears in a bucketed config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadOnlyVariable {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub key: String,
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    pub value: Value,
    #[serde(rename = "_feature", default, skip_serializing_if = "Option::is_none")]
    pub feature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval: Option<EvalReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub key: String,
    #[serde(rename = "type")]
    pub feature_type: String,
    #[serde(rename = "_variation", default)]
    pub variation: String,
    #[serde(default)]
    pub variation_name: String,
    #[serde(default)]
    pub variation_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval: Option<EvalReason>,
}

/// Result of evaluating one variable for one user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub key: String,
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    pub value: Value,
    pub default_value: Value,
    pub is_defaulted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval: Option<EvalReason>,
}

/// Features and variables already bucketed for the requesting user.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BucketedConfig {
    #[serde(default)]
    pub features: BTreeMap<String, Feature>,
    #[serde(default)]
    pub variables: BTreeMap<String, ReadOnlyVariable>,
}
