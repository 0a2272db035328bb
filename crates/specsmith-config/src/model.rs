use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use specsmith_utils::types::{ConfigSource, StageId};
use specsmith_validation::SchemaPolicy;

pub const DEFAULT_STATE_DIR: &str = ".specsmith";
pub const DEFAULT_PROVIDER: &str = "groq";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_BUDGET: u32 = 40;
pub const DEFAULT_RETRIES: u32 = 2;
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Providers specsmith can construct a backend for.
pub const SUPPORTED_PROVIDERS: &[&str] = &["groq", "openrouter", "anthropic"];

/// Configuration for specsmith operations.
///
/// `Config` is layered with precedence CLI arguments > config file > built-in
/// defaults. Fields hold what was explicitly set; the accessor methods apply
/// defaults.
///
/// # Discovery
///
/// [`Config::discover()`] searches for `.specsmith/config.toml` upward from the
/// current directory, stopping at a repository root marker.
///
/// # Source Attribution
///
/// Each configuration value tracks its source (`cli`, `env`, `config`,
/// `programmatic` or `default`) for `specsmith config`.
///
/// # Configuration File Format
///
/// ```toml
/// [defaults]
/// state_dir = ".specsmith"
///
/// [llm]
/// provider = "groq"
/// model = "llama-3.3-70b-versatile"
///
/// [pipeline]
/// retries = 2
/// schema_policy = "advisory"
///
/// [stages.api_db]
/// max_tokens = 4000
/// ```
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub defaults: Defaults,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub stages: StagesConfig,
    /// Source attribution for each setting (for `specsmith config`).
    pub source_attribution: HashMap<String, ConfigSource>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Defaults {
    pub state_dir: Option<String>,
    pub verbose: Option<bool>,
}

/// LLM provider configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LlmConfig {
    pub provider: Option<String>,
    pub fallback_provider: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    /// Maximum number of oracle calls per process.
    pub budget: Option<u32>,
    pub groq: Option<ProviderConfig>,
    pub openrouter: Option<ProviderConfig>,
    pub anthropic: Option<ProviderConfig>,
}

/// Per-provider HTTP settings (`[llm.groq]`, `[llm.openrouter]`, `[llm.anthropic]`)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Name of the environment variable holding the API key.
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    /// Model used when this provider is active and `llm.model` is unset.
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Extra attempts per stage after the first.
    pub retries: Option<u32>,
    /// Directory of `<stage>.md` template overrides.
    pub templates_dir: Option<String>,
    /// JSON Schema file replacing the built-in specification schema.
    pub schema_path: Option<String>,
    pub schema_policy: Option<SchemaPolicy>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StagesConfig {
    pub features: Option<StageConfig>,
    pub stories: Option<StageConfig>,
    pub api_db: Option<StageConfig>,
    pub refine: Option<StageConfig>,
}

impl StagesConfig {
    #[must_use]
    pub fn get(&self, stage: StageId) -> Option<&StageConfig> {
        match stage {
            StageId::Features => self.features.as_ref(),
            StageId::Stories => self.stories.as_ref(),
            StageId::ApiDb => self.api_db.as_ref(),
            StageId::Refine => self.refine.as_ref(),
        }
    }

    pub(crate) fn slot_mut(&mut self, stage: StageId) -> &mut Option<StageConfig> {
        match stage {
            StageId::Features => &mut self.features,
            StageId::Stories => &mut self.stories,
            StageId::ApiDb => &mut self.api_db,
            StageId::Refine => &mut self.refine,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
pub struct StageConfig {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Resolved sampling parameters for one stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Built-in output token cap for each stage.
#[must_use]
pub const fn default_max_tokens(stage: StageId) -> u32 {
    match stage {
        StageId::Features => 2500,
        StageId::Stories => 1500,
        StageId::ApiDb => 3000,
        StageId::Refine => 3500,
    }
}

/// Built-in model for each provider.
#[must_use]
pub fn default_model_for(provider: &str) -> &'static str {
    match provider {
        "openrouter" => "meta-llama/llama-3.3-70b-instruct",
        "anthropic" => "claude-3-5-haiku-latest",
        _ => "llama-3.3-70b-versatile",
    }
}

/// Command-line overrides applied on top of the config file.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_path: Option<Utf8PathBuf>,
    pub state_dir: Option<String>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub retries: Option<u32>,
    pub schema_policy: Option<SchemaPolicy>,
    pub verbose: Option<bool>,
}

impl Config {
    #[must_use]
    pub fn state_dir(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(
            self.defaults
                .state_dir
                .as_deref()
                .unwrap_or(DEFAULT_STATE_DIR),
        )
    }

    #[must_use]
    pub fn verbose(&self) -> bool {
        self.defaults.verbose.unwrap_or(false)
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        self.llm.provider.as_deref().unwrap_or(DEFAULT_PROVIDER)
    }

    /// Settings table for the named provider, if present.
    #[must_use]
    pub fn provider_settings(&self, provider: &str) -> Option<&ProviderConfig> {
        match provider {
            "groq" => self.llm.groq.as_ref(),
            "openrouter" => self.llm.openrouter.as_ref(),
            "anthropic" => self.llm.anthropic.as_ref(),
            _ => None,
        }
    }

    /// Model for `provider`: `llm.model`, then `[llm.<provider>].model`, then the built-in default.
    #[must_use]
    pub fn model_for(&self, provider: &str) -> String {
        self.llm
            .model
            .clone()
            .or_else(|| {
                self.provider_settings(provider)
                    .and_then(|p| p.model.clone())
            })
            .unwrap_or_else(|| default_model_for(provider).to_string())
    }

    #[must_use]
    pub fn model(&self) -> String {
        self.model_for(self.provider())
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    #[must_use]
    pub fn budget(&self) -> Option<u32> {
        self.llm.budget
    }

    #[must_use]
    pub fn retries(&self) -> u32 {
        self.pipeline.retries.unwrap_or(DEFAULT_RETRIES)
    }

    #[must_use]
    pub fn schema_policy(&self) -> SchemaPolicy {
        self.pipeline.schema_policy.unwrap_or_default()
    }

    #[must_use]
    pub fn templates_dir(&self) -> Option<Utf8PathBuf> {
        self.pipeline.templates_dir.as_deref().map(Utf8PathBuf::from)
    }

    #[must_use]
    pub fn schema_path(&self) -> Option<Utf8PathBuf> {
        self.pipeline.schema_path.as_deref().map(Utf8PathBuf::from)
    }

    /// Sampling parameters for `stage` with defaults applied.
    #[must_use]
    pub fn stage_params(&self, stage: StageId) -> StageParams {
        let configured = self.stages.get(stage).copied().unwrap_or_default();
        StageParams {
            max_tokens: configured
                .max_tokens
                .unwrap_or_else(|| default_max_tokens(stage)),
            temperature: configured.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }
}
