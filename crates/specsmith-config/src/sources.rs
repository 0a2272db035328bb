use std::collections::BTreeMap;

use specsmith_utils::types::{ConfigSource, StageId};

use crate::model::Config;

impl Config {
    fn source_label(&self, key: &str) -> String {
        self.source_attribution
            .get(key)
            .copied()
            .unwrap_or(ConfigSource::Default)
            .as_str()
            .to_string()
    }

    /// Effective configuration as `key -> (value, source)`, sorted by key.
    #[must_use]
    pub fn effective_config(&self) -> BTreeMap<String, (String, String)> {
        let mut entries = BTreeMap::new();
        let mut add = |key: &str, value: String, source_key: &str| {
            entries.insert(key.to_string(), (value, self.source_label(source_key)));
        };

        add("state_dir", self.state_dir().into_string(), "state_dir");
        add("verbose", self.verbose().to_string(), "verbose");
        add("llm.provider", self.provider().to_string(), "llm_provider");
        if let Some(fallback) = &self.llm.fallback_provider {
            add(
                "llm.fallback_provider",
                fallback.clone(),
                "llm_fallback_provider",
            );
        }
        add("llm.model", self.model(), "llm_model");
        add(
            "llm.timeout_secs",
            self.timeout().as_secs().to_string(),
            "llm_timeout_secs",
        );
        if let Some(budget) = self.budget() {
            add("llm.budget", budget.to_string(), "llm_budget");
        }
        add("pipeline.retries", self.retries().to_string(), "retries");
        add(
            "pipeline.schema_policy",
            self.schema_policy().to_string(),
            "schema_policy",
        );
        if let Some(dir) = self.templates_dir() {
            add("pipeline.templates_dir", dir.into_string(), "templates_dir");
        }
        if let Some(path) = self.schema_path() {
            add("pipeline.schema_path", path.into_string(), "schema_path");
        }

        for stage in [
            StageId::Features,
            StageId::Stories,
            StageId::ApiDb,
            StageId::Refine,
        ] {
            let params = self.stage_params(stage);
            let source_key = format!("stages.{}", stage.as_str());
            add(
                &format!("stages.{}.max_tokens", stage.as_str()),
                params.max_tokens.to_string(),
                &source_key,
            );
            add(
                &format!("stages.{}.temperature", stage.as_str()),
                params.temperature.to_string(),
                &source_key,
            );
        }

        entries
    }
}
