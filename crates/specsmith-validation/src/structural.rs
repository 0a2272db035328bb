//! Structural validation of stage outputs
//!
//! A stage output is structurally valid when it parses as a JSON object that
//! carries every required key with the expected container shape.

use serde_json::Value;
use specsmith_utils::types::StageId;
use std::fmt;

/// Expected JSON container type of a required key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    List,
    Map,
}

impl Shape {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::List => value.is_array(),
            Self::Map => value.is_object(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::List => "a list",
            Self::Map => "a mapping",
        }
    }
}

/// A key the output object must contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredKey {
    pub name: &'static str,
    pub shape: Shape,
}

impl RequiredKey {
    #[must_use]
    pub const fn list(name: &'static str) -> Self {
        Self {
            name,
            shape: Shape::List,
        }
    }

    #[must_use]
    pub const fn map(name: &'static str) -> Self {
        Self {
            name,
            shape: Shape::Map,
        }
    }
}

pub const FEATURES_KEYS: &[RequiredKey] = &[
    RequiredKey::list("modules"),
    RequiredKey::map("features_by_module"),
];

pub const STORIES_KEYS: &[RequiredKey] = &[RequiredKey::list("user_stories")];

pub const API_DB_KEYS: &[RequiredKey] = &[
    RequiredKey::list("api_endpoints"),
    RequiredKey::map("db_schema"),
    RequiredKey::list("open_questions"),
];

pub const SPECIFICATION_KEYS: &[RequiredKey] = &[
    RequiredKey::list("modules"),
    RequiredKey::map("features_by_module"),
    RequiredKey::list("user_stories"),
    RequiredKey::list("api_endpoints"),
    RequiredKey::map("db_schema"),
    RequiredKey::list("open_questions"),
];

/// Keys required from the given stage's output.
#[must_use]
pub const fn required_keys(stage: StageId) -> &'static [RequiredKey] {
    match stage {
        StageId::Features => FEATURES_KEYS,
        StageId::Stories => STORIES_KEYS,
        StageId::ApiDb => API_DB_KEYS,
        StageId::Refine => SPECIFICATION_KEYS,
    }
}

/// Why an output failed structural validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuralIssue {
    Parse(String),
    NotAnObject,
    MissingKey(&'static str),
    WrongShape {
        key: &'static str,
        expected: Shape,
    },
}

impl fmt::Display for StructuralIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(msg) => write!(f, "output is not valid JSON: {msg}"),
            Self::NotAnObject => write!(f, "output is not a JSON object"),
            Self::MissingKey(key) => write!(f, "missing required key '{key}'"),
            Self::WrongShape { key, expected } => {
                write!(f, "key '{key}' must be {}", expected.describe())
            }
        }
    }
}

impl std::error::Error for StructuralIssue {}

/// Check an already-parsed value against the required keys.
///
/// Reports the first issue found, in key order.
pub fn check_structure(value: &Value, keys: &[RequiredKey]) -> Result<(), StructuralIssue> {
    let object = value.as_object().ok_or(StructuralIssue::NotAnObject)?;

    for key in keys {
        let field = object
            .get(key.name)
            .ok_or(StructuralIssue::MissingKey(key.name))?;
        if !key.shape.matches(field) {
            return Err(StructuralIssue::WrongShape {
                key: key.name,
                expected: key.shape,
            });
        }
    }

    Ok(())
}

/// Parse cleaned oracle text and check its structure.
pub fn parse_and_check(text: &str, keys: &[RequiredKey]) -> Result<Value, StructuralIssue> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| StructuralIssue::Parse(e.to_string()))?;
    check_structure(&value, keys)?;
    Ok(value)
}
