//! Typed stage outputs and the assembled specification
//!
//! Each stage's validated JSON is deserialized into its own record; the
//! orchestrator assembles the final [`Specification`] from them. Keys the
//! oracle returns beyond the required ones are kept in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Output of the `features` stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub modules: Vec<Value>,
    pub features_by_module: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Output of the `stories` stage. Anything besides `user_stories` is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorySet {
    pub user_stories: Vec<Value>,
}

/// Output of the `api_db` stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSet {
    pub api_endpoints: Vec<Value>,
    pub db_schema: Map<String, Value>,
    pub open_questions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The complete specification document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specification {
    pub modules: Vec<Value>,
    pub features_by_module: Map<String, Value>,
    pub user_stories: Vec<Value>,
    pub api_endpoints: Vec<Value>,
    pub db_schema: Map<String, Value>,
    pub open_questions: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const NAMED_FIELDS: [&str; 6] = [
    "modules",
    "features_by_module",
    "user_stories",
    "api_endpoints",
    "db_schema",
    "open_questions",
];

impl Specification {
    /// Assemble the three pipeline stage outputs.
    ///
    /// Named fields always come from the stage that owns them. Extra keys
    /// from `api_db` win over extra keys from `features`.
    #[must_use]
    pub fn assemble(features: FeatureSet, stories: StorySet, interfaces: InterfaceSet) -> Self {
        let mut extra = features.extra;
        extra.extend(interfaces.extra);
        for name in NAMED_FIELDS {
            extra.remove(name);
        }

        Self {
            modules: features.modules,
            features_by_module: features.features_by_module,
            user_stories: stories.user_stories,
            api_endpoints: interfaces.api_endpoints,
            db_schema: interfaces.db_schema,
            open_questions: interfaces.open_questions,
            extra,
        }
    }

    /// The JSON document, as persisted and as sent to the refine stage.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("modules".into(), Value::Array(self.modules.clone()));
        object.insert(
            "features_by_module".into(),
            Value::Object(self.features_by_module.clone()),
        );
        object.insert("user_stories".into(), Value::Array(self.user_stories.clone()));
        object.insert("api_endpoints".into(), Value::Array(self.api_endpoints.clone()));
        object.insert("db_schema".into(), Value::Object(self.db_schema.clone()));
        object.insert(
            "open_questions".into(),
            Value::Array(self.open_questions.clone()),
        );
        for (key, value) in &self.extra {
            object.entry(key.clone()).or_insert_with(|| value.clone());
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn features() -> FeatureSet {
        serde_json::from_value(json!({
            "modules": ["Auth", "Lists"],
            "features_by_module": {"Auth": ["Login"], "Lists": ["Create list"]},
            "notes": "from features",
            "glossary": {"list": "a list"}
        }))
        .unwrap()
    }

    fn stories() -> StorySet {
        serde_json::from_value(json!({
            "user_stories": [{"as": "user", "i_want": "to log in"}],
            "ignored": true
        }))
        .unwrap()
    }

    fn interfaces() -> InterfaceSet {
        serde_json::from_value(json!({
            "api_endpoints": [{"method": "POST", "path": "/login"}],
            "db_schema": {"tables": [{"name": "users", "columns": ["id"]}]},
            "open_questions": [],
            "notes": "from api_db",
            "modules": ["Overridden?"]
        }))
        .unwrap()
    }

    #[test]
    fn test_typed_outputs_keep_extra_keys() {
        let features = features();
        assert_eq!(features.modules.len(), 2);
        assert_eq!(features.extra["notes"], "from features");
        assert!(!features.extra.contains_key("modules"));
    }

    #[test]
    fn test_assemble_merges_extras() {
        let spec = Specification::assemble(features(), stories(), interfaces());

        assert_eq!(spec.modules, vec![json!("Auth"), json!("Lists")]);
        assert_eq!(spec.user_stories.len(), 1);
        assert_eq!(spec.api_endpoints[0]["path"], "/login");
        assert_eq!(spec.extra["notes"], "from api_db");
        assert!(spec.extra.contains_key("glossary"));
        assert!(!spec.extra.contains_key("modules"));
        assert!(!spec.extra.contains_key("ignored"));
    }

    #[test]
    fn test_value_roundtrip_preserves_extra() {
        let spec = Specification::assemble(features(), stories(), interfaces());
        let value = spec.to_value();

        assert_eq!(value["modules"], json!(["Auth", "Lists"]));
        assert_eq!(value["glossary"], json!({"list": "a list"}));

        let back: Specification = serde_json::from_value(value).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn test_missing_field_rejected() {
        let result: Result<Specification, _> = serde_json::from_value(json!({
            "modules": [],
            "features_by_module": {},
            "user_stories": [],
            "api_endpoints": [],
            "db_schema": {}
        }));
        assert!(result.is_err());
    }
}
