//! Engine handle for embedding specsmith.
//!
//! [`SpecEngine`] is the entry point used by the CLI and by library callers.
//! It owns everything a run needs (configuration, oracle gateway, prompt
//! templates, schema and store) and is built once, then reused.
//!
//! # Example
//!
//! ```rust,no_run
//! use specsmith_config::{CliArgs, Config};
//! use specsmith_engine::SpecEngine;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::discover(&CliArgs::default())?;
//! let engine = SpecEngine::from_config(config)?;
//! let generated = engine
//!     .generate("A bookmarking service where users save, tag and search links they find online.")
//!     .await?;
//! println!("{} v{}", generated.trace_id, generated.version);
//! # Ok(())
//! # }
//! ```

use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use specsmith_config::Config;
use specsmith_llm::{LlmBackend, LlmFallbackInfo, OracleGateway};
use specsmith_store::{Provenance, VersionStore};
use specsmith_utils::error::{InputError, SpecsmithError};
use specsmith_utils::input::{validate_refinement, validate_requirements};
use specsmith_utils::trace_id::{generate_trace_id, validate_trace_id};
use specsmith_validation::SchemaPolicy;

use super::{Orchestrator, PipelineAssets, PipelineOutcome, StageFailure};
use crate::spec::Specification;

/// A persisted specification version.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedSpec {
    pub trace_id: String,
    pub version: u32,
    pub specification: Specification,
    /// Final schema messages; non-empty only under the advisory policy.
    pub schema_issues: Vec<String>,
}

pub struct SpecEngine {
    config: Config,
    gateway: OracleGateway,
    assets: PipelineAssets,
    store: VersionStore,
    fallback: Option<LlmFallbackInfo>,
}

impl std::fmt::Debug for SpecEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecEngine")
            .field("gateway", &self.gateway)
            .field("store", &self.store)
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl SpecEngine {
    /// Build an engine with the backend selected by `config`.
    pub fn from_config(config: Config) -> Result<Self, SpecsmithError> {
        let (backend, fallback) = specsmith_llm::from_config_with_fallback(&config)?;
        Self::assemble(config, Arc::from(backend), fallback)
    }

    /// Build an engine around an explicit backend. Tests use this with a
    /// scripted backend.
    pub fn with_backend(
        config: Config,
        backend: Arc<dyn LlmBackend>,
    ) -> Result<Self, SpecsmithError> {
        Self::assemble(config, backend, None)
    }

    fn assemble(
        config: Config,
        backend: Arc<dyn LlmBackend>,
        fallback: Option<LlmFallbackInfo>,
    ) -> Result<Self, SpecsmithError> {
        // Model names are provider specific.
        let model = match &fallback {
            Some(info) => config.model_for(&info.fallback_provider),
            None => config.model(),
        };
        let assets = PipelineAssets::from_config(&config)?;
        let gateway = OracleGateway::new(backend, model, config.timeout());
        let store = VersionStore::new(config.state_dir());

        Ok(Self {
            config,
            gateway,
            assets,
            store,
            fallback,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    /// Set when the configured provider could not be built and the fallback
    /// provider is in use.
    #[must_use]
    pub fn fallback_info(&self) -> Option<&LlmFallbackInfo> {
        self.fallback.as_ref()
    }

    fn orchestrator(&self) -> Orchestrator<'_> {
        Orchestrator::new(&self.gateway, &self.assets, &self.config)
    }

    /// Generate a new specification under a fresh trace id and persist it as
    /// version 1.
    pub async fn generate(&self, requirements: &str) -> Result<GeneratedSpec, SpecsmithError> {
        let requirements = validate_requirements(requirements)?;
        let trace_id = generate_trace_id();
        info!(trace_id = %trace_id, chars = requirements.chars().count(), "Starting generation");

        let outcome = self
            .orchestrator()
            .run_pipeline(&trace_id, &requirements)
            .await?;
        let specification = completed(outcome)?;

        self.finish(
            &trace_id,
            specification,
            Provenance::Initial {
                requirements: &requirements,
            },
        )
    }

    /// Refine `current_spec` and persist the result as the next version of
    /// `trace_id`.
    pub async fn refine(
        &self,
        current_spec: &Value,
        refinement_text: &str,
        trace_id: &str,
    ) -> Result<GeneratedSpec, SpecsmithError> {
        let trace_id = validate_trace_id(trace_id)?;
        let instruction = validate_refinement(refinement_text)?;
        if !current_spec.is_object() {
            return Err(InputError::InvalidSpecification {
                reason: "expected a JSON object".to_string(),
            }
            .into());
        }
        info!(trace_id, "Starting refinement");

        let outcome = self
            .orchestrator()
            .run_refinement(trace_id, current_spec, &instruction)
            .await?;
        let specification = completed(outcome)?;

        self.finish(
            trace_id,
            specification,
            Provenance::Refinement {
                instruction: &instruction,
            },
        )
    }

    /// Refine the newest persisted version of `trace_id`.
    pub async fn refine_latest(
        &self,
        trace_id: &str,
        refinement_text: &str,
    ) -> Result<GeneratedSpec, SpecsmithError> {
        let latest = self.store.latest(trace_id)?;
        self.refine(&latest.specification(), refinement_text, trace_id)
            .await
    }

    /// Final schema check, then persistence.
    fn finish(
        &self,
        trace_id: &str,
        specification: Specification,
        provenance: Provenance<'_>,
    ) -> Result<GeneratedSpec, SpecsmithError> {
        let document = specification.to_value();
        let schema_issues = self.assets.schema.validate(&document);

        if !schema_issues.is_empty() {
            match self.config.schema_policy() {
                SchemaPolicy::Advisory => {
                    warn!(
                        trace_id,
                        issues = ?schema_issues,
                        "Specification failed the schema check; persisting anyway"
                    );
                }
                SchemaPolicy::Enforce => {
                    error!(trace_id, issues = ?schema_issues, "Specification rejected by schema");
                    return Err(SpecsmithError::SchemaRejected {
                        trace_id: trace_id.to_string(),
                        issues: schema_issues,
                    });
                }
            }
        }

        let persisted = self.store.persist(trace_id, &document, provenance)?;

        Ok(GeneratedSpec {
            trace_id: persisted.trace_id,
            version: persisted.version,
            specification,
            schema_issues,
        })
    }
}

fn completed(outcome: PipelineOutcome) -> Result<Specification, SpecsmithError> {
    match outcome {
        PipelineOutcome::Completed { specification, .. } => Ok(specification),
        PipelineOutcome::Failed(StageFailure {
            trace_id,
            stage,
            last_output,
            last_issue,
            attempts,
        }) => {
            error!(
                trace_id = %trace_id,
                stage = %stage,
                attempts,
                issue = %last_issue,
                last_output = %last_output,
                "Generation failed"
            );
            Err(SpecsmithError::GenerationFailed { trace_id, stage })
        }
    }
}
