use specsmith_utils::error::ConfigError;
use specsmith_utils::types::StageId;

use crate::model::{Config, SUPPORTED_PROVIDERS};

const MAX_RETRIES: u32 = 10;
const MAX_TEMPERATURE: f32 = 2.0;

fn invalid(key: impl Into<String>, value: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        value: value.into(),
    }
}

impl Config {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(provider) = self.llm.provider.as_deref()
            && !SUPPORTED_PROVIDERS.contains(&provider)
        {
            return Err(invalid(
                "llm.provider",
                format!(
                    "unknown provider '{provider}' (supported: {})",
                    SUPPORTED_PROVIDERS.join(", ")
                ),
            ));
        }

        if let Some(fallback) = self.llm.fallback_provider.as_deref()
            && !SUPPORTED_PROVIDERS.contains(&fallback)
        {
            return Err(invalid(
                "llm.fallback_provider",
                format!("unknown provider '{fallback}'"),
            ));
        }

        if let Some(model) = self.llm.model.as_deref()
            && model.trim().is_empty()
        {
            return Err(invalid("llm.model", "must not be empty"));
        }

        if self.llm.timeout_secs == Some(0) {
            return Err(invalid("llm.timeout_secs", "must be greater than 0"));
        }

        if self.llm.budget == Some(0) {
            return Err(invalid("llm.budget", "must be greater than 0"));
        }

        if let Some(retries) = self.pipeline.retries
            && retries > MAX_RETRIES
        {
            return Err(invalid(
                "pipeline.retries",
                format!("{retries} exceeds maximum limit of {MAX_RETRIES}"),
            ));
        }

        for stage in [
            StageId::Features,
            StageId::Stories,
            StageId::ApiDb,
            StageId::Refine,
        ] {
            let Some(stage_config) = self.stages.get(stage) else {
                continue;
            };

            if stage_config.max_tokens == Some(0) {
                return Err(invalid(
                    format!("stages.{stage}.max_tokens"),
                    "must be greater than 0",
                ));
            }

            if let Some(temperature) = stage_config.temperature
                && !(0.0..=MAX_TEMPERATURE).contains(&temperature)
            {
                return Err(invalid(
                    format!("stages.{stage}.temperature"),
                    format!("{temperature} is outside [0, {MAX_TEMPERATURE}]"),
                ));
            }
        }

        Ok(())
    }
}
