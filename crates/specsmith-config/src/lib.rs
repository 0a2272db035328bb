//! Configuration management for specsmith
//!
//! Hierarchical configuration with discovery and precedence CLI >
//! `SPECSMITH_LLM_PROVIDER` > file > defaults, read from `.specsmith/config.toml` with `[defaults]`, `[llm]`,
//! `[pipeline]` and `[stages.<name>]` sections.

mod builder;
mod discovery;
mod model;
mod sources;
mod validation;

pub use builder::ConfigBuilder;
pub use discovery::PROVIDER_ENV;
pub use model::{
    CliArgs, Config, DEFAULT_BUDGET, DEFAULT_PROVIDER, DEFAULT_RETRIES, DEFAULT_STATE_DIR,
    DEFAULT_TIMEOUT_SECS, Defaults, LlmConfig, PipelineConfig, ProviderConfig, SUPPORTED_PROVIDERS,
    StageConfig, StageParams, StagesConfig, default_max_tokens, default_model_for,
};
pub use specsmith_validation::SchemaPolicy;
