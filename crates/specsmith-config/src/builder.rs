use camino::Utf8PathBuf;
use std::time::Duration;

use specsmith_utils::error::ConfigError;
use specsmith_utils::types::{ConfigSource, StageId};
use specsmith_validation::SchemaPolicy;

use crate::model::{Config, ProviderConfig, StageConfig};

impl Config {
    /// Create a builder for programmatic configuration.
    ///
    /// Use this when embedding specsmith, where behavior must not depend on
    /// config files or environment variables.
    ///
    /// # Example
    ///
    /// ```rust
    /// use specsmith_config::Config;
    /// use specsmith_utils::types::StageId;
    ///
    /// let config = Config::builder()
    ///     .state_dir("/tmp/specsmith-state")
    ///     .retries(3)
    ///     .stage(StageId::ApiDb, 4000, 0.0)
    ///     .build()
    ///     .expect("valid config");
    /// assert_eq!(config.retries(), 3);
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for programmatic configuration.
///
/// All values set via the builder are attributed to
/// `ConfigSource::Programmatic`.
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config: Config,
    touched: Vec<&'static str>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn touch(mut self, key: &'static str) -> Self {
        self.touched.push(key);
        self
    }

    #[must_use]
    pub fn state_dir(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.config.defaults.state_dir = Some(path.into().into_string());
        self.touch("state_dir")
    }

    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.defaults.verbose = Some(verbose);
        self.touch("verbose")
    }

    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.config.llm.provider = Some(provider.into());
        self.touch("llm_provider")
    }

    #[must_use]
    pub fn fallback_provider(mut self, provider: impl Into<String>) -> Self {
        self.config.llm.fallback_provider = Some(provider.into());
        self.touch("llm_fallback_provider")
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = Some(model.into());
        self.touch("llm_model")
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.llm.timeout_secs = Some(timeout.as_secs());
        self.touch("llm_timeout_secs")
    }

    #[must_use]
    pub fn budget(mut self, budget: u32) -> Self {
        self.config.llm.budget = Some(budget);
        self.touch("llm_budget")
    }

    /// Settings for one provider (`groq`, `openrouter`, `anthropic`).
    /// Unknown provider names are ignored.
    #[must_use]
    pub fn provider_settings(mut self, provider: &str, settings: ProviderConfig) -> Self {
        let (slot, key) = match provider {
            "groq" => (&mut self.config.llm.groq, "llm_groq"),
            "openrouter" => (&mut self.config.llm.openrouter, "llm_openrouter"),
            "anthropic" => (&mut self.config.llm.anthropic, "llm_anthropic"),
            _ => return self,
        };
        *slot = Some(settings);
        self.touch(key)
    }

    #[must_use]
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.pipeline.retries = Some(retries);
        self.touch("retries")
    }

    #[must_use]
    pub fn templates_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.config.pipeline.templates_dir = Some(dir.into().into_string());
        self.touch("templates_dir")
    }

    #[must_use]
    pub fn schema_path(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.config.pipeline.schema_path = Some(path.into().into_string());
        self.touch("schema_path")
    }

    #[must_use]
    pub fn schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.config.pipeline.schema_policy = Some(policy);
        self.touch("schema_policy")
    }

    #[must_use]
    pub fn stage(mut self, stage: StageId, max_tokens: u32, temperature: f32) -> Self {
        *self.config.stages.slot_mut(stage) = Some(StageConfig {
            max_tokens: Some(max_tokens),
            temperature: Some(temperature),
        });
        let key = match stage {
            StageId::Features => "stages.features",
            StageId::Stories => "stages.stories",
            StageId::ApiDb => "stages.api_db",
            StageId::Refine => "stages.refine",
        };
        self.touch(key)
    }

    /// Build and validate the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        let Self { mut config, touched } = self;
        for key in touched {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Programmatic);
        }
        config.validate()?;
        Ok(config)
    }
}
