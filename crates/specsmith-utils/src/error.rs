use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::types::StageId;

/// Library-level error type with rich context and user-friendly reporting.
///
/// `SpecsmithError` is the primary error type returned by specsmith library
/// operations. It provides:
/// - Detailed error information for programmatic handling
/// - User-friendly messages with context and suggestions
/// - Mapping to CLI exit codes for consistent error reporting
///
/// # Error Categories
///
/// | Category | Description |
/// |----------|-------------|
/// | `Config` | Configuration file or CLI argument errors |
/// | `Input` | Requirements or refinement text rejected at the boundary |
/// | `TraceId` | Caller-supplied trace identifier is unsafe |
/// | `Llm` | Oracle transport, auth, quota or budget failures |
/// | `GenerationFailed` | A stage exhausted its retries without valid output |
/// | `SchemaRejected` | Final schema check failed under the `enforce` policy |
/// | `Store` | Version history could not be read or written |
///
/// # Exit Code Mapping
///
/// | Exit Code | Error Type |
/// |-----------|------------|
/// | 2 | Configuration, input or trace id errors |
/// | 65 | Stage retries exhausted |
/// | 66 | Schema rejected |
/// | 70 | LLM backend failure |
/// | 74 | Storage failure |
/// | 1 | Other errors |
///
/// Library code returns `SpecsmithError` and does NOT call `std::process::exit()`.
#[derive(Error, Debug)]
pub enum SpecsmithError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    Input(#[from] InputError),

    #[error("Invalid trace id: {0}")]
    TraceId(#[from] TraceIdError),

    #[error("LLM backend error: {0}")]
    Llm(#[from] LlmError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Generation failed at stage {stage} for trace {trace_id}")]
    GenerationFailed { trace_id: String, stage: StageId },

    #[error("Specification for trace {trace_id} rejected by schema: {} issue(s)", .issues.len())]
    SchemaRejected {
        trace_id: String,
        issues: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for providing user-friendly error reporting with context and suggestions
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get contextual information about the error
    fn context(&self) -> Option<String>;

    /// Get suggested actions to resolve the error
    fn suggestions(&self) -> Vec<String>;

    /// Get the error category for grouping similar errors
    fn category(&self) -> ErrorCategory;
}

/// Categories of errors for better organization and handling
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Oracle,
    Generation,
    FileSystem,
    ResourceLimits,
    Validation,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "Configuration"),
            Self::Input => write!(f, "Input"),
            Self::Oracle => write!(f, "Oracle"),
            Self::Generation => write!(f, "Generation"),
            Self::FileSystem => write!(f, "File System"),
            Self::ResourceLimits => write!(f, "Resource Limits"),
            Self::Validation => write!(f, "Validation"),
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration file: {0}")]
    InvalidFile(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Invalid configuration value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found at {path}")]
    NotFound { path: String },
}

impl UserFriendlyError for ConfigError {
    fn user_message(&self) -> String {
        match self {
            Self::InvalidFile(reason) => format!("The configuration file is invalid: {reason}"),
            Self::MissingRequired(key) => format!("Required configuration '{key}' is not set"),
            Self::InvalidValue { key, value } => {
                format!("Configuration '{key}' has an invalid value: {value}")
            }
            Self::NotFound { path } => format!("No configuration file exists at {path}"),
        }
    }

    fn context(&self) -> Option<String> {
        Some(
            "Configuration is loaded with precedence: CLI flags > SPECSMITH_LLM_PROVIDER > .specsmith/config.toml > defaults."
                .to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::InvalidFile(_) => vec![
                "Check the TOML syntax of .specsmith/config.toml".to_string(),
                "Run 'specsmith config' to see the effective configuration".to_string(),
            ],
            Self::MissingRequired(key) => vec![format!("Set '{key}' in the config file or via a CLI flag")],
            Self::InvalidValue { key, .. } => vec![
                format!("Review the allowed values for '{key}'"),
                "Remove the key to fall back to the built-in default".to_string(),
            ],
            Self::NotFound { .. } => vec![
                "Check the path passed to --config".to_string(),
                "Omit --config to use upward discovery from the current directory".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Configuration
    }
}

/// Boundary validation errors for requirements and refinement text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("{field} cannot be empty or whitespace only")]
    Empty { field: &'static str },

    #[error("{field} is too short ({actual} characters, minimum {minimum})")]
    TooShort {
        field: &'static str,
        actual: usize,
        minimum: usize,
    },

    #[error("{field} is too long ({actual} characters, maximum {maximum})")]
    TooLong {
        field: &'static str,
        actual: usize,
        maximum: usize,
    },

    #[error("current specification is not usable: {reason}")]
    InvalidSpecification { reason: String },
}

impl UserFriendlyError for InputError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::TooShort { .. } => Some(
                "Short inputs like 'build a todo app' produce poor results; describe the product and its features."
                    .to_string(),
            ),
            Self::InvalidSpecification { .. } => Some(
                "Refinement needs a complete specification with all six top-level sections."
                    .to_string(),
            ),
            _ => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Empty { .. } | Self::TooShort { .. } => vec![
                "Provide more detail about users, workflows and data".to_string(),
            ],
            Self::TooLong { .. } => vec!["Trim the text or split it into separate runs".to_string()],
            Self::InvalidSpecification { .. } => vec![
                "Omit --spec to refine the trace's latest version".to_string(),
                "Use 'specsmith show <trace>' to export a valid specification".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Input
    }
}

/// Trace identifier validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceIdError {
    #[error("trace id is empty")]
    Empty,

    #[error("trace id is too long ({len} characters, maximum {max})")]
    TooLong { len: usize, max: usize },

    #[error("trace id contains invalid character {ch:?}")]
    InvalidCharacter { ch: char },

    #[error("trace id '{id}' could escape the state directory")]
    PathTraversal { id: String },
}

impl UserFriendlyError for TraceIdError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some("Trace ids name directories under the state directory. Only ASCII alphanumeric characters, dots, dashes and underscores are allowed.".to_string())
    }

    fn suggestions(&self) -> Vec<String> {
        vec![
            "Use the trace id printed by 'specsmith generate'".to_string(),
            "Example: trace_20240101_000000_abcd1234".to_string(),
        ]
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Input
    }
}

/// Errors that can occur during LLM backend operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Transport-level failure (HTTP connectivity, malformed provider response)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Provider authentication failure (401, 403, missing API key)
    #[error("Provider authentication error: {0}")]
    ProviderAuth(String),

    /// Provider quota/rate limit exceeded (429)
    #[error("Provider quota exceeded: {0}")]
    ProviderQuota(String),

    /// Provider service outage (5xx errors)
    #[error("Provider outage: {0}")]
    ProviderOutage(String),

    /// Invocation timed out
    #[error("Timeout after {duration:?}")]
    Timeout { duration: Duration },

    /// Budget limit exceeded
    #[error("Budget exceeded: attempted {attempted} calls, limit is {limit}")]
    BudgetExceeded { limit: u32, attempted: u32 },

    /// Configuration error
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// Unsupported feature or provider
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl UserFriendlyError for LlmError {
    fn user_message(&self) -> String {
        match self {
            Self::Transport(msg) => format!("LLM transport error: {msg}"),
            Self::ProviderAuth(msg) => format!("LLM provider authentication failed: {msg}"),
            Self::ProviderQuota(msg) => format!("LLM provider quota exceeded: {msg}"),
            Self::ProviderOutage(msg) => format!("LLM provider service outage: {msg}"),
            Self::Timeout { duration } => {
                format!("LLM invocation timed out after {:?}", duration)
            }
            Self::BudgetExceeded { limit, attempted } => {
                format!(
                    "LLM budget exceeded: attempted {} calls, limit is {}",
                    attempted, limit
                )
            }
            Self::Misconfiguration(msg) => format!("LLM configuration error: {msg}"),
            Self::Unsupported(msg) => format!("LLM feature not supported: {msg}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Transport(_) => {
                Some("Transport errors occur when the LLM provider cannot be reached.".to_string())
            }
            Self::ProviderAuth(_) => Some(
                "Authentication errors indicate missing or invalid API keys.".to_string(),
            ),
            Self::ProviderQuota(_) => Some(
                "Quota errors occur when rate limits or usage limits are exceeded.".to_string(),
            ),
            Self::ProviderOutage(_) => {
                Some("Provider outages are temporary service disruptions.".to_string())
            }
            Self::Timeout { .. } => Some(
                "Timeouts occur when a completion takes longer than llm.timeout_secs.".to_string(),
            ),
            Self::BudgetExceeded { .. } => Some(
                "The call budget caps how many completions one process may request.".to_string(),
            ),
            Self::Misconfiguration(_) => Some(
                "Configuration errors indicate missing or invalid LLM provider settings."
                    .to_string(),
            ),
            Self::Unsupported(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Transport(_) => vec![
                "Verify network connectivity to the provider".to_string(),
                "Try running with --verbose to see detailed error information".to_string(),
            ],
            Self::ProviderAuth(_) => vec![
                "Check that the API key environment variable is set (GROQ_API_KEY by default)"
                    .to_string(),
                "Verify the API key is valid and not expired".to_string(),
            ],
            Self::ProviderQuota(_) | Self::ProviderOutage(_) => vec![
                "Wait a few minutes and try again".to_string(),
                "Consider configuring llm.fallback_provider".to_string(),
            ],
            Self::Timeout { .. } => vec![
                "Increase llm.timeout_secs in the configuration".to_string(),
                "Lower the stage max_tokens to shorten completions".to_string(),
            ],
            Self::BudgetExceeded { .. } => vec![
                "Raise llm.budget or set SPECSMITH_LLM_BUDGET".to_string(),
                "Lower pipeline.retries to spend fewer calls per stage".to_string(),
            ],
            Self::Misconfiguration(_) | Self::Unsupported(_) => vec![
                "Check the [llm] section in .specsmith/config.toml".to_string(),
                "Supported providers: groq, openrouter, anthropic".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::ProviderAuth(_) | Self::Misconfiguration(_) | Self::Unsupported(_) => {
                ErrorCategory::Configuration
            }
            Self::ProviderQuota(_) | Self::BudgetExceeded { .. } => ErrorCategory::ResourceLimits,
            Self::Transport(_) | Self::ProviderOutage(_) | Self::Timeout { .. } => {
                ErrorCategory::Oracle
            }
        }
    }
}

/// Errors raised by the versioned artifact store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to create trace directory {path}: {reason}")]
    CreateDir { path: String, reason: String },

    #[error("Failed to lock trace '{trace_id}': {reason}")]
    Lock { trace_id: String, reason: String },

    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Failed to write {path}: {reason}")]
    Write { path: String, reason: String },

    #[error("Version file {path} already exists")]
    VersionExists { path: String },

    #[error("{path} is corrupted: {reason}")]
    Corrupted { path: String, reason: String },

    #[error("Trace '{trace_id}' has no {what}")]
    NotFound { trace_id: String, what: String },

    #[error(transparent)]
    InvalidTraceId(#[from] TraceIdError),
}

impl UserFriendlyError for StoreError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn context(&self) -> Option<String> {
        Some(
            "Each trace directory holds immutable v<N>.json records, latest.json and history.json."
                .to_string(),
        )
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::NotFound { .. } => vec![
                "Check the trace id; run 'specsmith generate' to create a new trace".to_string(),
            ],
            Self::Corrupted { .. } => vec![
                "Inspect the file by hand; version records are never rewritten by specsmith"
                    .to_string(),
            ],
            _ => vec![
                "Check permissions and free space in the state directory".to_string(),
                "Use --state-dir to point at a writable location".to_string(),
            ],
        }
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::FileSystem
    }
}

impl UserFriendlyError for SpecsmithError {
    fn user_message(&self) -> String {
        match self {
            Self::Config(e) => e.user_message(),
            Self::Input(e) => e.user_message(),
            Self::TraceId(e) => e.user_message(),
            Self::Llm(e) => e.user_message(),
            Self::Store(e) => e.user_message(),
            Self::GenerationFailed { trace_id, stage } => format!(
                "Generation failed during {} (trace {trace_id})",
                stage.description()
            ),
            Self::SchemaRejected { issues, .. } => format!(
                "The generated specification failed the schema check ({} issue(s))",
                issues.len()
            ),
            Self::Io(e) => format!("File system error: {e}"),
        }
    }

    fn context(&self) -> Option<String> {
        match self {
            Self::Config(e) => e.context(),
            Self::Input(e) => e.context(),
            Self::TraceId(e) => e.context(),
            Self::Llm(e) => e.context(),
            Self::Store(e) => e.context(),
            Self::GenerationFailed { .. } => Some(
                "The model kept returning output that was not valid JSON with the required keys."
                    .to_string(),
            ),
            Self::SchemaRejected { issues, .. } => Some(issues.join("; ")),
            Self::Io(_) => None,
        }
    }

    fn suggestions(&self) -> Vec<String> {
        match self {
            Self::Config(e) => e.suggestions(),
            Self::Input(e) => e.suggestions(),
            Self::TraceId(e) => e.suggestions(),
            Self::Llm(e) => e.suggestions(),
            Self::Store(e) => e.suggestions(),
            Self::GenerationFailed { .. } => vec![
                "Run again; completions are nondeterministic".to_string(),
                "Raise pipeline.retries or stage max_tokens".to_string(),
                "Re-run with --verbose to see each attempt".to_string(),
            ],
            Self::SchemaRejected { .. } => vec![
                "Set pipeline.schema_policy = \"advisory\" to persist imperfect documents"
                    .to_string(),
            ],
            Self::Io(_) => vec!["Check file permissions".to_string()],
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(e) => e.category(),
            Self::Input(e) => e.category(),
            Self::TraceId(e) => e.category(),
            Self::Llm(e) => e.category(),
            Self::Store(e) => e.category(),
            Self::GenerationFailed { .. } => ErrorCategory::Generation,
            Self::SchemaRejected { .. } => ErrorCategory::Validation,
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }
}

impl SpecsmithError {
    /// Get a user-friendly error message with context and actionable suggestions.
    #[must_use]
    pub fn display_for_user(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error: {}\n", self.user_message()));

        if let Some(ctx) = self.context() {
            output.push_str(&format!("\nContext: {}\n", ctx));
        }

        let suggestions = self.suggestions();
        if !suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for suggestion in suggestions {
                output.push_str(&format!("  • {}\n", suggestion));
            }
        }

        output
    }

    /// Map this error to the appropriate CLI exit code.
    ///
    /// # Example
    ///
    /// ```rust
    /// use specsmith_utils::error::{SpecsmithError, LlmError};
    /// use specsmith_utils::exit_codes::ExitCode;
    ///
    /// let err = SpecsmithError::Llm(LlmError::Transport("reset".to_string()));
    /// assert_eq!(err.to_exit_code(), ExitCode::LLM_FAILURE);
    /// ```
    #[must_use]
    pub fn to_exit_code(&self) -> crate::exit_codes::ExitCode {
        use crate::exit_codes::ExitCode;

        match self {
            Self::Config(_) | Self::Input(_) | Self::TraceId(_) => ExitCode::CLI_ARGS,
            Self::Llm(_) => ExitCode::LLM_FAILURE,
            Self::GenerationFailed { .. } => ExitCode::GENERATION_FAILED,
            Self::SchemaRejected { .. } => ExitCode::SCHEMA_REJECTED,
            Self::Store(StoreError::Lock { .. }) => ExitCode::LOCK_HELD,
            Self::Store(StoreError::InvalidTraceId(_)) => ExitCode::CLI_ARGS,
            Self::Store(_) => ExitCode::STORAGE_FAILURE,
            Self::Io(_) => ExitCode::INTERNAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::ExitCode;

    #[test]
    fn test_generation_failed_names_stage_and_trace() {
        let err = SpecsmithError::GenerationFailed {
            trace_id: "trace_x".to_string(),
            stage: StageId::Stories,
        };
        let msg = err.to_string();
        assert!(msg.contains("stories"));
        assert!(msg.contains("trace_x"));
        assert!(err.user_message().contains("user story generation"));
        assert_eq!(err.to_exit_code(), ExitCode::GENERATION_FAILED);
    }

    #[test]
    fn test_display_for_user_includes_suggestions() {
        let err = SpecsmithError::Llm(LlmError::ProviderAuth("401".to_string()));
        let rendered = err.display_for_user();
        assert!(rendered.starts_with("Error: LLM provider authentication failed"));
        assert!(rendered.contains("Suggestions:"));
        assert!(rendered.contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_exit_code_mapping() {
        let cases = [
            (
                SpecsmithError::Input(InputError::Empty {
                    field: "requirements text",
                }),
                ExitCode::CLI_ARGS,
            ),
            (
                SpecsmithError::TraceId(TraceIdError::Empty),
                ExitCode::CLI_ARGS,
            ),
            (
                SpecsmithError::Store(StoreError::Lock {
                    trace_id: "t".to_string(),
                    reason: "busy".to_string(),
                }),
                ExitCode::LOCK_HELD,
            ),
            (
                SpecsmithError::Store(StoreError::NotFound {
                    trace_id: "t".to_string(),
                    what: "history".to_string(),
                }),
                ExitCode::STORAGE_FAILURE,
            ),
            (
                SpecsmithError::SchemaRejected {
                    trace_id: "t".to_string(),
                    issues: vec!["bad".to_string()],
                },
                ExitCode::SCHEMA_REJECTED,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.to_exit_code(), expected, "{err}");
        }
    }

    #[test]
    fn test_llm_error_categories() {
        assert_eq!(
            LlmError::BudgetExceeded {
                limit: 1,
                attempted: 2
            }
            .category(),
            ErrorCategory::ResourceLimits
        );
        assert_eq!(
            LlmError::Timeout {
                duration: Duration::from_secs(1)
            }
            .category(),
            ErrorCategory::Oracle
        );
        assert_eq!(
            LlmError::ProviderAuth(String::new()).category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn test_config_error_suggestions_per_variant() {
        let cases = [
            ConfigError::InvalidFile("bad toml".to_string()),
            ConfigError::MissingRequired("llm.provider".to_string()),
            ConfigError::InvalidValue {
                key: "pipeline.retries".to_string(),
                value: "-1".to_string(),
            },
            ConfigError::NotFound {
                path: "/nowhere/config.toml".to_string(),
            },
        ];

        for err in cases {
            assert!(!err.suggestions().is_empty(), "{err}");
            assert_eq!(err.category(), ErrorCategory::Configuration);
        }

        let rendered = SpecsmithError::Config(ConfigError::InvalidValue {
            key: "pipeline.retries".to_string(),
            value: "-1".to_string(),
        })
        .display_for_user();
        assert!(rendered.contains("pipeline.retries"));
    }
}
