use serde::{Deserialize, Serialize};

/// Stage identifiers for the generation pipeline.
///
/// The initial generation runs `Features → Stories → ApiDb` in order;
/// `Refine` is the single stage used when an existing specification is
/// reworked from feedback.
///
/// # Example
///
/// ```rust
/// use specsmith_utils::types::StageId;
///
/// assert_eq!(StageId::ApiDb.as_str(), "api_db");
/// assert_eq!(StageId::Features.ordinal(), Some(1));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Extracts modules and features grouped by module.
    Features,
    /// Writes user stories for the extracted features.
    Stories,
    /// Derives API endpoints, database schema and open questions.
    ApiDb,
    /// Rewrites a complete specification from a refinement instruction.
    Refine,
}

impl StageId {
    /// Stages of an initial generation run, in execution order.
    pub const PIPELINE: [StageId; 3] = [StageId::Features, StageId::Stories, StageId::ApiDb];

    /// Canonical lowercase name used in logs, config sections and template files.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Features => "features",
            Self::Stories => "stories",
            Self::ApiDb => "api_db",
            Self::Refine => "refine",
        }
    }

    /// 1-based position within the generation pipeline (`None` for `Refine`).
    #[must_use]
    pub const fn ordinal(&self) -> Option<u8> {
        match self {
            Self::Features => Some(1),
            Self::Stories => Some(2),
            Self::ApiDb => Some(3),
            Self::Refine => None,
        }
    }

    /// Human-readable description used in error messages.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Features => "feature extraction",
            Self::Stories => "user story generation",
            Self::ApiDb => "API/DB generation",
            Self::Refine => "refinement",
        }
    }

    /// Parse a stage name as written in configuration files.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "features" => Some(Self::Features),
            "stories" => Some(Self::Stories),
            "api_db" | "api-db" => Some(Self::ApiDb),
            "refine" => Some(Self::Refine),
            _ => None,
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an effective configuration value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Cli,
    Env,
    Config,
    Programmatic,
    Default,
}

impl ConfigSource {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cli => "cli",
            Self::Env => "env",
            Self::Config => "config",
            Self::Programmatic => "programmatic",
            Self::Default => "default",
        }
    }
}
