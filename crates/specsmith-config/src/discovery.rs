use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::env;

use specsmith_utils::error::ConfigError;
use specsmith_utils::types::{ConfigSource, StageId};

use crate::model::{
    CliArgs, Config, Defaults, LlmConfig, PipelineConfig, StagesConfig,
};

/// Environment variable overriding `llm.provider` (below CLI flags).
pub const PROVIDER_ENV: &str = "SPECSMITH_LLM_PROVIDER";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct TomlConfig {
    defaults: Option<Defaults>,
    llm: Option<LlmConfig>,
    pipeline: Option<PipelineConfig>,
    stages: Option<StagesConfig>,
}

impl Config {
    /// Discover and load configuration with precedence:
    /// CLI > `SPECSMITH_LLM_PROVIDER` > file > defaults
    pub fn discover(cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let start_dir = env::current_dir()
            .map_err(|e| ConfigError::InvalidFile(format!("cannot read current directory: {e}")))?;
        let start_dir = Utf8PathBuf::from_path_buf(start_dir).map_err(|p| {
            ConfigError::InvalidFile(format!(
                "current directory is not valid UTF-8: {}",
                p.display()
            ))
        })?;
        Self::discover_from(&start_dir, cli_args)
    }

    /// Discover and load configuration starting from a specific directory.
    ///
    /// Path-driven variant used by tests to avoid process-global state.
    pub fn discover_from(start_dir: &Utf8Path, cli_args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = Config::default();
        for key in [
            "state_dir",
            "verbose",
            "llm_provider",
            "llm_model",
            "llm_timeout_secs",
            "retries",
            "schema_policy",
        ] {
            config
                .source_attribution
                .insert(key.to_string(), ConfigSource::Default);
        }

        let config_path = match &cli_args.config_path {
            Some(explicit) => {
                if !explicit.is_file() {
                    return Err(ConfigError::NotFound {
                        path: explicit.to_string(),
                    });
                }
                Some(explicit.clone())
            }
            None => Self::discover_config_file_from(start_dir),
        };

        if let Some(path) = &config_path {
            let file_config = load_config_file(path)
                .map_err(|e| ConfigError::InvalidFile(format!("{e:#}")))?;
            config.apply_file(file_config);
        }

        config.apply_env_provider(env::var(PROVIDER_ENV).ok().as_deref());
        config.apply_cli(cli_args);
        config.validate()?;

        Ok(config)
    }

    /// Walk up from `start_dir` looking for `.specsmith/config.toml`.
    ///
    /// Stops at a repository root marker (`.git`, `.hg`, `.svn`) or the
    /// filesystem root.
    #[must_use]
    pub fn discover_config_file_from(start_dir: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start_dir);

        while let Some(dir) = current {
            let candidate = dir.join(".specsmith").join("config.toml");
            if candidate.is_file() {
                return Some(candidate);
            }

            if dir.join(".git").exists() || dir.join(".hg").exists() || dir.join(".svn").exists()
            {
                break;
            }

            current = dir.parent();
        }

        None
    }

    fn apply_env_provider(&mut self, value: Option<&str>) {
        let Some(provider) = value.map(str::trim).filter(|p| !p.is_empty()) else {
            return;
        };
        self.llm.provider = Some(provider.to_string());
        self.source_attribution
            .insert("llm_provider".to_string(), ConfigSource::Env);
    }

    fn apply_file(&mut self, file: TomlConfig) {
        let source = ConfigSource::Config;
        let attribution = &mut self.source_attribution;
        let mut mark = |key: &str| {
            attribution.insert(key.to_string(), source);
        };

        if let Some(defaults) = file.defaults {
            if defaults.state_dir.is_some() {
                self.defaults.state_dir = defaults.state_dir;
                mark("state_dir");
            }
            if defaults.verbose.is_some() {
                self.defaults.verbose = defaults.verbose;
                mark("verbose");
            }
        }

        if let Some(llm) = file.llm {
            if llm.provider.is_some() {
                self.llm.provider = llm.provider;
                mark("llm_provider");
            }
            if llm.fallback_provider.is_some() {
                self.llm.fallback_provider = llm.fallback_provider;
                mark("llm_fallback_provider");
            }
            if llm.model.is_some() {
                self.llm.model = llm.model;
                mark("llm_model");
            }
            if llm.timeout_secs.is_some() {
                self.llm.timeout_secs = llm.timeout_secs;
                mark("llm_timeout_secs");
            }
            if llm.budget.is_some() {
                self.llm.budget = llm.budget;
                mark("llm_budget");
            }
            if llm.groq.is_some() {
                self.llm.groq = llm.groq;
                mark("llm_groq");
            }
            if llm.openrouter.is_some() {
                self.llm.openrouter = llm.openrouter;
                mark("llm_openrouter");
            }
            if llm.anthropic.is_some() {
                self.llm.anthropic = llm.anthropic;
                mark("llm_anthropic");
            }
        }

        if let Some(pipeline) = file.pipeline {
            if pipeline.retries.is_some() {
                self.pipeline.retries = pipeline.retries;
                mark("retries");
            }
            if pipeline.templates_dir.is_some() {
                self.pipeline.templates_dir = pipeline.templates_dir;
                mark("templates_dir");
            }
            if pipeline.schema_path.is_some() {
                self.pipeline.schema_path = pipeline.schema_path;
                mark("schema_path");
            }
            if pipeline.schema_policy.is_some() {
                self.pipeline.schema_policy = pipeline.schema_policy;
                mark("schema_policy");
            }
        }

        if let Some(stages) = file.stages {
            for stage in [
                StageId::Features,
                StageId::Stories,
                StageId::ApiDb,
                StageId::Refine,
            ] {
                if let Some(stage_config) = stages.get(stage).copied() {
                    *self.stages.slot_mut(stage) = Some(stage_config);
                    mark(&format!("stages.{}", stage.as_str()));
                }
            }
        }
    }

    fn apply_cli(&mut self, cli_args: &CliArgs) {
        let source = ConfigSource::Cli;

        if let Some(state_dir) = &cli_args.state_dir {
            self.defaults.state_dir = Some(state_dir.clone());
            self.source_attribution.insert("state_dir".to_string(), source);
        }
        if let Some(verbose) = cli_args.verbose {
            self.defaults.verbose = Some(verbose);
            self.source_attribution.insert("verbose".to_string(), source);
        }
        if let Some(provider) = &cli_args.provider {
            self.llm.provider = Some(provider.clone());
            self.source_attribution
                .insert("llm_provider".to_string(), source);
        }
        if let Some(model) = &cli_args.model {
            self.llm.model = Some(model.clone());
            self.source_attribution.insert("llm_model".to_string(), source);
        }
        if let Some(retries) = cli_args.retries {
            self.pipeline.retries = Some(retries);
            self.source_attribution.insert("retries".to_string(), source);
        }
        if let Some(policy) = cli_args.schema_policy {
            self.pipeline.schema_policy = Some(policy);
            self.source_attribution
                .insert("schema_policy".to_string(), source);
        }
    }
}

/// Load configuration from a TOML file.
fn load_config_file(path: &Utf8Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {path}"))?;
    let config: TomlConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML config file: {path}"))?;
    Ok(config)
}
