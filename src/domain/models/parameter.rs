//! Parameter schemas declared by handlers.
//!
//! A schema drives both the user-facing input form and creation-time
//! validation of a binding's parameter map. Values are coerced to their
//! declared type when they are captured, so handlers receive typed JSON.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Primitive type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Number => write!(f, "number"),
            Self::Boolean => write!(f, "boolean"),
        }
    }
}

/// One named input of a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterField {
    #[serde(rename = "type")]
    pub kind: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

impl ParameterField {
    fn new(kind: ParameterType, description: &str) -> Self {
        Self {
            kind,
            description: Some(description.to_string()),
            example: None,
            optional: false,
        }
    }

    pub fn string(description: &str) -> Self {
        Self::new(ParameterType::String, description)
    }

    pub fn number(description: &str) -> Self {
        Self::new(ParameterType::Number, description)
    }

    pub fn boolean(description: &str) -> Self {
        Self::new(ParameterType::Boolean, description)
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    #[must_use]
    pub fn example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }
}

/// Errors raised while capturing or validating parameters.
#[derive(Debug, Error, PartialEq)]
pub enum ParameterError {
    #[error("Parameters must be a JSON object")]
    NotAnObject,

    #[error("Missing required parameter(s): {}", .0.join(", "))]
    MissingRequired(Vec<String>),

    #[error("Invalid value for '{name}': expected {expected}, got '{value}'")]
    InvalidValue {
        name: String,
        expected: ParameterType,
        value: String,
    },
}

/// Parameter schema of a handler.
///
/// `Opaque` is the legacy form where a handler only documents its inputs
/// as free text; it performs no validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterSchema {
    Fields(BTreeMap<String, ParameterField>),
    Opaque(String),
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::Fields(BTreeMap::new())
    }
}

impl ParameterSchema {
    /// Build a structured schema from `(name, field)` pairs.
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, ParameterField)>,
        S: Into<String>,
    {
        Self::Fields(fields.into_iter().map(|(n, f)| (n.into(), f)).collect())
    }

    pub fn opaque(description: impl Into<String>) -> Self {
        Self::Opaque(description.into())
    }

    /// Check that every non-optional field is present and not an empty string.
    ///
    /// `null` is accepted as an empty map. Opaque schemas always pass.
    pub fn validate(&self, parameters: &Value) -> Result<(), ParameterError> {
        let Self::Fields(fields) = self else {
            return Ok(());
        };

        let empty = Map::new();
        let values = match parameters {
            Value::Object(map) => map,
            Value::Null => &empty,
            _ => return Err(ParameterError::NotAnObject),
        };

        let missing: Vec<String> = fields
            .iter()
            .filter(|(_, field)| !field.optional)
            .filter(|(name, _)| match values.get(name.as_str()) {
                None | Some(Value::Null) => true,
                Some(Value::String(s)) => s.is_empty(),
                Some(_) => false,
            })
            .map(|(name, _)| name.clone())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ParameterError::MissingRequired(missing))
        }
    }

    /// Turn raw `key=value` input into a typed JSON object.
    ///
    /// `number` fields become JSON numbers, `boolean` fields accept
    /// `true/false/1/0/yes/no`. Keys the schema does not declare, and every
    /// key of an opaque schema, are kept as strings.
    pub fn capture(&self, raw: &[(String, String)]) -> Result<Value, ParameterError> {
        let mut out = Map::new();
        for (name, value) in raw {
            let kind = match self {
                Self::Fields(fields) => fields.get(name).map(|f| f.kind),
                Self::Opaque(_) => None,
            };
            let typed = match kind {
                Some(ParameterType::Number) => coerce_number(name, value)?,
                Some(ParameterType::Boolean) => coerce_boolean(name, value)?,
                Some(ParameterType::String) | None => Value::String(value.clone()),
            };
            out.insert(name.clone(), typed);
        }
        Ok(Value::Object(out))
    }
}

fn coerce_number(name: &str, value: &str) -> Result<Value, ParameterError> {
    let trimmed = value.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Ok(Value::Number(n.into()));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| ParameterError::InvalidValue {
            name: name.to_string(),
            expected: ParameterType::Number,
            value: value.to_string(),
        })
}

fn coerce_boolean(name: &str, value: &str) -> Result<Value, ParameterError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(Value::Bool(true)),
        "false" | "0" | "no" => Ok(Value::Bool(false)),
        _ => Err(ParameterError::InvalidValue {
            name: name.to_string(),
            expected: ParameterType::Boolean,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn webhook_schema() -> ParameterSchema {
        ParameterSchema::fields([
            ("url", ParameterField::string("Target URL")),
            ("retries", ParameterField::number("Retry count").optional()),
            ("verbose", ParameterField::boolean("Verbose payload").optional()),
        ])
    }

    #[test]
    fn test_validate_accepts_required_present() {
        let schema = webhook_schema();
        assert!(schema.validate(&json!({"url": "https://example.com"})).is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_and_empty() {
        let schema = ParameterSchema::fields([
            ("url", ParameterField::string("Target URL")),
            ("body", ParameterField::string("Body")),
        ]);

        let err = schema.validate(&json!({"url": ""})).unwrap_err();
        assert_eq!(
            err,
            ParameterError::MissingRequired(vec!["body".to_string(), "url".to_string()])
        );
    }

    #[test]
    fn test_validate_null_counts_as_missing() {
        let schema = webhook_schema();
        assert!(schema.validate(&json!({"url": null})).is_err());
        assert!(schema.validate(&Value::Null).is_err());
    }

    #[test]
    fn test_validate_optional_fields_may_be_absent() {
        let schema = ParameterSchema::fields([("tag", ParameterField::string("Tag").optional())]);
        assert!(schema.validate(&json!({})).is_ok());
        assert!(schema.validate(&Value::Null).is_ok());
    }

    #[test]
    fn test_validate_rejects_non_object() {
        assert_eq!(
            webhook_schema().validate(&json!(["url"])),
            Err(ParameterError::NotAnObject)
        );
    }

    #[test]
    fn test_opaque_schema_always_validates() {
        let schema = ParameterSchema::opaque("url: the target");
        assert!(schema.validate(&json!({})).is_ok());
        assert!(schema.validate(&json!("garbage")).is_ok());
    }

    #[test]
    fn test_capture_coerces_declared_types() {
        let raw = vec![
            ("url".to_string(), "https://example.com".to_string()),
            ("retries".to_string(), "3".to_string()),
            ("verbose".to_string(), "yes".to_string()),
            ("extra".to_string(), "42".to_string()),
        ];
        let value = webhook_schema().capture(&raw).unwrap();
        assert_eq!(
            value,
            json!({"url": "https://example.com", "retries": 3, "verbose": true, "extra": "42"})
        );
    }

    #[test]
    fn test_capture_parses_floats() {
        let raw = vec![("retries".to_string(), "2.5".to_string())];
        let value = webhook_schema().capture(&raw).unwrap();
        assert_eq!(value["retries"], json!(2.5));
    }

    #[test]
    fn test_capture_rejects_bad_number() {
        let raw = vec![("retries".to_string(), "many".to_string())];
        let err = webhook_schema().capture(&raw).unwrap_err();
        assert!(matches!(err, ParameterError::InvalidValue { expected: ParameterType::Number, .. }));
    }

    #[test]
    fn test_capture_opaque_keeps_strings() {
        let raw = vec![("n".to_string(), "1".to_string())];
        let value = ParameterSchema::opaque("anything").capture(&raw).unwrap();
        assert_eq!(value, json!({"n": "1"}));
    }

    #[test]
    fn test_schema_serializes_untagged() {
        let schema = ParameterSchema::fields([("cron", ParameterField::string("Expression").example("*/5 * * * *"))]);
        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["cron"]["type"], "string");
        assert_eq!(value["cron"]["example"], "*/5 * * * *");
        assert!(value["cron"].get("optional").is_none());

        let opaque: ParameterSchema = serde_json::from_value(json!("free text")).unwrap();
        assert_eq!(opaque, ParameterSchema::opaque("free text"));
    }
}
