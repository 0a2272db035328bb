//! specsmith - turn rough product requirements into versioned specifications
//!
//! A three-stage pipeline asks an LLM for modules and features, then user
//! stories, then API endpoints and a database schema. Every stage answer is
//! checked for the keys it must carry and retried with corrective feedback
//! when it falls short. The assembled specification is checked against a
//! JSON schema and stored as a new version under its trace id. Refinement
//! rewrites the latest version from a plain-language instruction.
//!
//! # Quick Start (CLI)
//!
//! ```bash
//! export GROQ_API_KEY=...
//! specsmith generate --file requirements.txt
//! specsmith refine trace_20260101_120000_ab12cd34 "Add a password reset flow via email"
//! specsmith history trace_20260101_120000_ab12cd34
//! specsmith show trace_20260101_120000_ab12cd34 --version 1
//! ```
//!
//! # Quick Start (Library)
//!
//! ```rust,no_run
//! use specsmith::{CliArgs, Config, SpecEngine};
//!
//! # async fn example() -> Result<(), specsmith::SpecsmithError> {
//! let config = Config::discover(&CliArgs::default())?;
//! let engine = SpecEngine::from_config(config)?;
//! let generated = engine
//!     .generate("A team wiki where members write pages, link them together and search everything.")
//!     .await?;
//! println!("{} is at version {}", generated.trace_id, generated.version);
//! # Ok(())
//! # }
//! ```
//!
//! # Stable Public API
//!
//! - [`SpecEngine`], [`GeneratedSpec`] and [`Specification`]
//! - [`Config`], [`ConfigBuilder`] and [`CliArgs`]
//! - [`SpecsmithError`] and [`ExitCode`]
//! - [`StageId`] and [`SchemaPolicy`]
//! - [`VersionStore`] with its record types
//!
//! The member crates stay reachable through the `#[doc(hidden)]` re-exports
//! below but are not covered by semver guarantees.

pub mod cli;

pub use specsmith_config::{CliArgs, Config, ConfigBuilder};
pub use specsmith_engine::{GeneratedSpec, PipelineOutcome, SpecEngine, Specification};
pub use specsmith_llm::{LlmBackend, LlmFallbackInfo};
pub use specsmith_store::{HistoryEntry, LatestPointer, VersionKind, VersionRecord, VersionStore};
pub use specsmith_utils::error::SpecsmithError;
pub use specsmith_utils::exit_codes::ExitCode;
pub use specsmith_utils::types::StageId;
pub use specsmith_validation::SchemaPolicy;

#[doc(hidden)]
pub use specsmith_config as config;
#[doc(hidden)]
pub use specsmith_engine as engine;
#[doc(hidden)]
pub use specsmith_llm as llm;
#[doc(hidden)]
pub use specsmith_prompt_template as prompt_template;
#[doc(hidden)]
pub use specsmith_store as store;
#[doc(hidden)]
pub use specsmith_utils as utils;
#[doc(hidden)]
pub use specsmith_validation as validation;
