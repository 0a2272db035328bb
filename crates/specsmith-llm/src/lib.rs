//! LLM backends and the oracle gateway
//!
//! Every provider implements [`LlmBackend`]; the pipeline talks to whichever
//! one the configuration selects through an [`OracleGateway`]. Backends built
//! by [`from_config_with_fallback`] are always wrapped in a
//! [`BudgetedBackend`].

mod anthropic_backend;
mod budgeted_backend;
mod gateway;
mod http_client;
mod openai_compat;
mod types;

pub use budgeted_backend::{BUDGET_ENV_VAR, BudgetedBackend, DEFAULT_BUDGET_LIMIT};
pub use gateway::{CallContext, ORACLE_TOP_P, OracleGateway, clean_output};
pub use types::{LlmBackend, LlmFallbackInfo, LlmInvocation, LlmResult, Message, Role};
pub use specsmith_utils::error::LlmError;

use specsmith_config::{Config, SUPPORTED_PROVIDERS};
use tracing::{info, warn};

use anthropic_backend::AnthropicBackend;
use http_client::redact_error_message;
use openai_compat::{Flavor, OpenAiCompatBackend};

/// Read a provider API key from `env_name`.
pub(crate) fn api_key_from_env(
    display_name: &str,
    provider: &str,
    env_name: &str,
) -> Result<String, LlmError> {
    match std::env::var(env_name) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(LlmError::Misconfiguration(format!(
            "{display_name} API key not found in environment variable '{env_name}'. \
             Set it or configure a different api_key_env in [llm.{provider}]."
        ))),
    }
}

/// Construct the backend for one provider, without fallback or budget.
fn construct_backend_for_provider(
    provider: &str,
    config: &Config,
) -> Result<Box<dyn LlmBackend>, LlmError> {
    match provider {
        "groq" => Ok(Box::new(OpenAiCompatBackend::new_from_config(
            config,
            Flavor::Groq,
        )?)),
        "openrouter" => Ok(Box::new(OpenAiCompatBackend::new_from_config(
            config,
            Flavor::OpenRouter,
        )?)),
        "anthropic" => Ok(Box::new(AnthropicBackend::new_from_config(config)?)),
        unknown => Err(LlmError::Unsupported(format!(
            "Unknown LLM provider '{unknown}'. Supported providers: {}.",
            SUPPORTED_PROVIDERS.join(", ")
        ))),
    }
}

/// Create the configured backend, falling back to `llm.fallback_provider`
/// when the primary cannot be constructed.
///
/// The returned backend is budgeted. When the fallback was used, the second
/// element describes why.
///
/// # Errors
///
/// Returns `LlmError::Unsupported` for unknown providers and
/// `LlmError::Misconfiguration` when a provider cannot be set up (missing API
/// key, HTTP client failure). When both primary and fallback fail, the primary
/// error is returned.
pub fn from_config_with_fallback(
    config: &Config,
) -> Result<(Box<dyn LlmBackend>, Option<LlmFallbackInfo>), LlmError> {
    let provider = config.provider();

    let (backend, fallback) = match construct_backend_for_provider(provider, config) {
        Ok(backend) => (backend, None),
        Err(primary_error) => {
            let Some(fallback_provider) = config.llm.fallback_provider.as_deref() else {
                return Err(primary_error);
            };
            let reason = redact_error_message(&primary_error.to_string());
            warn!(
                primary = provider,
                fallback = fallback_provider,
                reason = %reason,
                "Primary provider failed during construction, trying fallback"
            );

            match construct_backend_for_provider(fallback_provider, config) {
                Ok(backend) => (
                    backend,
                    Some(LlmFallbackInfo {
                        primary_provider: provider.to_string(),
                        fallback_provider: fallback_provider.to_string(),
                        reason,
                    }),
                ),
                Err(fallback_error) => {
                    warn!(
                        fallback = fallback_provider,
                        error = %redact_error_message(&fallback_error.to_string()),
                        "Fallback provider also failed"
                    );
                    return Err(primary_error);
                }
            }
        }
    };

    info!(
        provider = fallback
            .as_ref()
            .map_or(provider, |f| f.fallback_provider.as_str()),
        "LLM backend ready"
    );

    let budgeted = BudgetedBackend::with_limit_from_config(backend, config.budget());
    Ok((Box::new(budgeted), fallback))
}

/// Create the configured backend, discarding fallback metadata.
pub fn from_config(config: &Config) -> Result<Box<dyn LlmBackend>, LlmError> {
    let (backend, _fallback) = from_config_with_fallback(config)?;
    Ok(backend)
}

#[cfg(test)]
mod factory_tests {
    use super::*;
    use specsmith_config::ProviderConfig;

    fn provider_with_key_env(env: &str) -> ProviderConfig {
        ProviderConfig {
            api_key_env: Some(env.to_string()),
            ..ProviderConfig::default()
        }
    }

    #[test]
    fn test_unknown_provider_is_unsupported() {
        let mut config = Config::default();
        config.llm.provider = Some("gemini-cli".to_string());

        let err = from_config(&config).err().unwrap();
        assert!(matches!(err, LlmError::Unsupported(_)));
    }

    #[test]
    fn test_missing_key_without_fallback() {
        let config = Config::builder()
            .provider("anthropic")
            .provider_settings("anthropic", provider_with_key_env("SPECSMITH_TEST_UNSET_KEY"))
            .build()
            .unwrap();

        let err = from_config(&config).err().unwrap();
        assert!(matches!(err, LlmError::Misconfiguration(_)));
    }

    #[test]
    fn test_fallback_used_when_primary_fails() {
        // PATH is set in every test environment; its value only has to be non-empty.
        let config = Config::builder()
            .provider("groq")
            .fallback_provider("anthropic")
            .provider_settings("groq", provider_with_key_env("SPECSMITH_TEST_UNSET_KEY"))
            .provider_settings("anthropic", provider_with_key_env("PATH"))
            .build()
            .unwrap();

        let (_backend, fallback) = from_config_with_fallback(&config).unwrap();
        let fallback = fallback.unwrap();
        assert_eq!(fallback.primary_provider, "groq");
        assert_eq!(fallback.fallback_provider, "anthropic");
        assert!(fallback.reason.contains("SPECSMITH_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_primary_error_returned_when_both_fail() {
        let config = Config::builder()
            .provider("openrouter")
            .fallback_provider("anthropic")
            .provider_settings("openrouter", provider_with_key_env("SPECSMITH_TEST_UNSET_A"))
            .provider_settings("anthropic", provider_with_key_env("SPECSMITH_TEST_UNSET_B"))
            .build()
            .unwrap();

        let err = from_config(&config).err().unwrap();
        assert!(err.to_string().contains("SPECSMITH_TEST_UNSET_A"));
    }
}
