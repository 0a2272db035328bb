//! Final JSON Schema validation of an assembled specification

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const BUILTIN_SCHEMA: &str = include_str!("../schemas/specification.v1.json");

/// What to do when the final schema check fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaPolicy {
    /// Log the issues and persist anyway.
    #[default]
    Advisory,
    /// Fail the run; nothing is persisted.
    Enforce,
}

impl SchemaPolicy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Advisory => "advisory",
            Self::Enforce => "enforce",
        }
    }
}

impl fmt::Display for SchemaPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "advisory" => Ok(Self::Advisory),
            "enforce" => Ok(Self::Enforce),
            other => Err(format!(
                "Unknown schema policy '{other}'. Expected 'advisory' or 'enforce'"
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Failed to read schema {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Schema is not valid JSON: {0}")]
    Parse(String),

    #[error("Schema failed to compile: {0}")]
    Compile(String),
}

/// Compiled schema for the complete specification document.
pub struct FinalSchemaValidator {
    validator: jsonschema::Validator,
}

impl fmt::Debug for FinalSchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FinalSchemaValidator").finish_non_exhaustive()
    }
}

impl FinalSchemaValidator {
    /// Validator for the schema shipped with specsmith.
    pub fn builtin() -> Result<Self, SchemaError> {
        Self::from_str_schema(BUILTIN_SCHEMA)
    }

    /// Validator for a schema file on disk.
    pub fn from_path(path: &Utf8Path) -> Result<Self, SchemaError> {
        let text = std::fs::read_to_string(path).map_err(|e| SchemaError::Read {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_str_schema(&text)
    }

    /// Use the file at `path` when given, otherwise the built-in schema.
    pub fn load(path: Option<&Utf8Path>) -> Result<Self, SchemaError> {
        match path {
            Some(path) => Self::from_path(path),
            None => Self::builtin(),
        }
    }

    pub fn from_value(schema: &Value) -> Result<Self, SchemaError> {
        let validator =
            jsonschema::validator_for(schema).map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { validator })
    }

    fn from_str_schema(text: &str) -> Result<Self, SchemaError> {
        let schema: Value =
            serde_json::from_str(text).map_err(|e| SchemaError::Parse(e.to_string()))?;
        Self::from_value(&schema)
    }

    /// All schema violations in `document`. Empty means valid.
    #[must_use]
    pub fn validate(&self, document: &Value) -> Vec<String> {
        self.validator
            .iter_errors(document)
            .map(|error| error.to_string())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn complete() -> Value {
        json!({
            "modules": ["Auth", "Billing"],
            "features_by_module": {"Auth": ["Login"], "Billing": ["Invoices"]},
            "user_stories": [{"role": "user", "goal": "log in"}],
            "api_endpoints": [{"method": "POST", "path": "/login"}],
            "db_schema": {"tables": [{"name": "users", "columns": [{"name": "id", "type": "uuid"}]}]},
            "open_questions": ["SSO?"]
        })
    }

    #[test]
    fn test_builtin_schema_accepts_complete_spec() {
        let validator = FinalSchemaValidator::builtin().unwrap();
        assert!(validator.validate(&complete()).is_empty());
    }

    #[test]
    fn test_endpoint_without_path_rejected() {
        let validator = FinalSchemaValidator::builtin().unwrap();
        let mut doc = complete();
        doc["api_endpoints"] = json!([{"method": "GET"}]);
        let issues = validator.validate(&doc);
        assert!(!issues.is_empty());
        assert!(issues.iter().any(|i| i.contains("path")), "{issues:?}");
    }

    #[test]
    fn test_table_without_columns_rejected() {
        let validator = FinalSchemaValidator::builtin().unwrap();
        let mut doc = complete();
        doc["db_schema"] = json!({"tables": [{"name": "users"}]});
        assert!(!validator.validate(&doc).is_empty());
    }

    #[test]
    fn test_missing_section_rejected() {
        let validator = FinalSchemaValidator::builtin().unwrap();
        let mut doc = complete();
        doc.as_object_mut().unwrap().remove("open_questions");
        assert!(!validator.validate(&doc).is_empty());
    }

    #[test]
    fn test_schema_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"type": "object", "required": ["modules"]}"#).unwrap();
        let path = Utf8Path::from_path(&path).unwrap();

        let validator = FinalSchemaValidator::from_path(path).unwrap();
        assert!(validator.validate(&json!({"modules": []})).is_empty());
        assert_eq!(validator.validate(&json!({})).len(), 1);
    }

    #[test]
    fn test_schema_from_missing_path() {
        let err = FinalSchemaValidator::from_path(Utf8Path::new("/no/such/schema.json"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::Read { .. }));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("advisory".parse::<SchemaPolicy>(), Ok(SchemaPolicy::Advisory));
        assert_eq!("ENFORCE".parse::<SchemaPolicy>(), Ok(SchemaPolicy::Enforce));
        assert!("strict".parse::<SchemaPolicy>().is_err());
        assert_eq!(SchemaPolicy::default(), SchemaPolicy::Advisory);
    }
}
