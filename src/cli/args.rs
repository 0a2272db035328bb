//! CLI argument definitions and parsing structures
//!
//! The `Cli` struct holds the global flags; `Commands` lists the subcommands.

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

use specsmith_validation::SchemaPolicy;

/// specsmith - turn rough requirements into versioned specifications
#[derive(Parser, Debug)]
#[command(name = "specsmith")]
#[command(about = "Generate and refine structured software specifications with an LLM")]
#[command(long_about = r#"
specsmith turns free-form product requirements into a structured specification
(modules, features, user stories, API endpoints, database schema and open
questions) and keeps every result as a numbered version under a trace id.

EXAMPLES:
  # Generate from a file
  specsmith generate --file requirements.txt

  # Generate from stdin
  cat requirements.txt | specsmith generate

  # Refine the latest version of a trace
  specsmith refine trace_20260101_120000_ab12cd34 "Add a password reset flow"

  # Inspect a trace
  specsmith history trace_20260101_120000_ab12cd34
  specsmith show trace_20260101_120000_ab12cd34 --version 1

  # Print the effective configuration
  specsmith config

CONFIGURATION:
  Precedence: CLI flags > SPECSMITH_LLM_PROVIDER > config file > defaults.
  The config file is found by searching upward from the working directory for
  .specsmith/config.toml. Use --config to name one explicitly.

PROVIDERS:
  groq (GROQ_API_KEY), openrouter (OPENROUTER_API_KEY), anthropic (ANTHROPIC_API_KEY)
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<Utf8PathBuf>,

    /// Directory holding the version store
    #[arg(long, global = true)]
    pub state_dir: Option<String>,

    /// LLM provider: groq, openrouter or anthropic
    #[arg(long, global = true)]
    pub provider: Option<String>,

    /// Model to request from the provider
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Corrective retries per stage after the first attempt
    #[arg(long, global = true)]
    pub retries: Option<u32>,

    /// What to do when the final schema check fails: advisory or enforce
    #[arg(long, global = true)]
    pub schema_policy: Option<SchemaPolicy>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a new specification from requirements text
    Generate {
        /// Read requirements from this file instead of stdin
        #[arg(long, short)]
        file: Option<Utf8PathBuf>,
    },

    /// Refine a specification and store it as the next version of a trace
    Refine {
        /// Trace to append the refined version to
        trace_id: String,

        /// What to change, in plain language
        instruction: String,

        /// Refine this JSON file instead of the trace's latest version
        #[arg(long)]
        spec: Option<Utf8PathBuf>,
    },

    /// Show the version history of a trace
    History {
        trace_id: String,

        /// Print the raw history log as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a stored version (the latest when --version is absent)
    Show {
        trace_id: String,

        /// Version number to print
        #[arg(long)]
        version: Option<u32>,
    },

    /// Print the effective configuration and where each value came from
    Config,
}

impl Commands {
    /// Operation name used in error reports.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "generate",
            Self::Refine { .. } => "refine",
            Self::History { .. } => "history",
            Self::Show { .. } => "show",
            Self::Config => "config",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "specsmith",
            "history",
            "trace_a",
            "--state-dir",
            "/tmp/s",
            "--schema-policy",
            "enforce",
            "-v",
        ])
        .unwrap();

        assert_eq!(cli.state_dir.as_deref(), Some("/tmp/s"));
        assert_eq!(cli.schema_policy, Some(SchemaPolicy::Enforce));
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::History { ref trace_id, json: false } if trace_id == "trace_a"
        ));
    }

    #[test]
    fn test_refine_positionals() {
        let cli = Cli::try_parse_from([
            "specsmith",
            "refine",
            "trace_a",
            "Add an audit log for admin actions",
            "--spec",
            "current.json",
        ])
        .unwrap();

        let Commands::Refine {
            trace_id,
            instruction,
            spec,
        } = cli.command
        else {
            panic!("expected refine");
        };
        assert_eq!(trace_id, "trace_a");
        assert_eq!(instruction, "Add an audit log for admin actions");
        assert_eq!(spec.as_deref().map(|p| p.as_str()), Some("current.json"));
    }

    #[test]
    fn test_unknown_schema_policy_rejected() {
        assert!(Cli::try_parse_from(["specsmith", "config", "--schema-policy", "strict"]).is_err());
    }
}
