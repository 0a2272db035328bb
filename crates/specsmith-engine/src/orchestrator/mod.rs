//! Pipeline orchestration
//!
//! [`Orchestrator`] runs the three generation stages in order and the single
//! refinement stage. It never touches storage; [`SpecEngine`] adds input
//! validation, the final schema check and persistence on top.

mod handle;
mod refine;

pub use handle::{GeneratedSpec, SpecEngine};

use serde::Serialize;
use serde_json::Value;
use tracing::{Instrument, info};

use specsmith_config::Config;
use specsmith_llm::{LlmError, OracleGateway};
use specsmith_prompt_template::PromptSet;
use specsmith_utils::error::ConfigError;
use specsmith_utils::logging::run_span;
use specsmith_utils::types::StageId;
use specsmith_validation::{FinalSchemaValidator, StructuralIssue, required_keys};

use crate::spec::{FeatureSet, InterfaceSet, Specification, StorySet};
use crate::stage::{StageExecutor, StageRequest, StageResult};

/// Prompt templates and the final schema, loaded once per engine.
#[derive(Debug)]
pub struct PipelineAssets {
    pub prompts: PromptSet,
    pub schema: FinalSchemaValidator,
}

impl PipelineAssets {
    /// Built-in templates and schema.
    pub fn builtin() -> Result<Self, ConfigError> {
        Ok(Self {
            prompts: PromptSet::builtin(),
            schema: FinalSchemaValidator::builtin()
                .map_err(|e| ConfigError::InvalidFile(e.to_string()))?,
        })
    }

    /// Load assets honoring `pipeline.templates_dir` and `pipeline.schema_path`.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let templates_dir = config.templates_dir();
        let prompts = PromptSet::load(templates_dir.as_deref())
            .map_err(|e| ConfigError::InvalidFile(e.to_string()))?;

        let schema_path = config.schema_path();
        let schema = FinalSchemaValidator::load(schema_path.as_deref())
            .map_err(|e| ConfigError::InvalidFile(e.to_string()))?;

        Ok(Self { prompts, schema })
    }
}

/// A stage that ran out of attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFailure {
    pub trace_id: String,
    pub stage: StageId,
    /// Cleaned text of the last oracle answer.
    pub last_output: String,
    pub last_issue: StructuralIssue,
    pub attempts: u32,
}

/// Terminal state of a generation or refinement run.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed {
        trace_id: String,
        specification: Specification,
    },
    Failed(StageFailure),
}

pub struct Orchestrator<'a> {
    gateway: &'a OracleGateway,
    assets: &'a PipelineAssets,
    config: &'a Config,
}

impl<'a> Orchestrator<'a> {
    #[must_use]
    pub const fn new(
        gateway: &'a OracleGateway,
        assets: &'a PipelineAssets,
        config: &'a Config,
    ) -> Self {
        Self {
            gateway,
            assets,
            config,
        }
    }

    fn request<'r>(&'r self, stage: StageId, bindings: &'r [(&'r str, &'r str)]) -> StageRequest<'r> {
        StageRequest {
            stage,
            template: self.assets.prompts.template(stage),
            bindings,
            required_keys: required_keys(stage),
            params: self.config.stage_params(stage),
            retries: self.config.retries(),
        }
    }

    /// Run `features`, `stories` and `api_db` in order.
    ///
    /// A stage only runs when the one before it produced valid output.
    /// Transport errors end the run with `Err`.
    pub async fn run_pipeline(
        &self,
        trace_id: &str,
        requirements: &str,
    ) -> Result<PipelineOutcome, LlmError> {
        self.run_pipeline_inner(trace_id, requirements)
            .instrument(run_span(trace_id, "generation"))
            .await
    }

    async fn run_pipeline_inner(
        &self,
        trace_id: &str,
        requirements: &str,
    ) -> Result<PipelineOutcome, LlmError> {
        let executor = StageExecutor::new(self.gateway);

        let bindings = [("requirements_text", requirements)];
        let result = executor
            .run_stage(trace_id, self.request(StageId::Features, &bindings))
            .await?;
        let features: FeatureSet = match valid_or_failure(trace_id, StageId::Features, result) {
            Ok(value) => value,
            Err(failure) => return Ok(PipelineOutcome::Failed(failure)),
        };

        let features_json = pretty(&features);
        let bindings = [
            ("features_json", features_json.as_str()),
            ("original_requirements", requirements),
        ];
        let result = executor
            .run_stage(trace_id, self.request(StageId::Stories, &bindings))
            .await?;
        let stories: StorySet = match valid_or_failure(trace_id, StageId::Stories, result) {
            Ok(value) => value,
            Err(failure) => return Ok(PipelineOutcome::Failed(failure)),
        };

        let input_json = pretty(&StoriesInput {
            features: &features,
            user_stories: &stories.user_stories,
        });
        let bindings = [
            ("input_json", input_json.as_str()),
            ("original_requirements", requirements),
        ];
        let result = executor
            .run_stage(trace_id, self.request(StageId::ApiDb, &bindings))
            .await?;
        let interfaces: InterfaceSet = match valid_or_failure(trace_id, StageId::ApiDb, result) {
            Ok(value) => value,
            Err(failure) => return Ok(PipelineOutcome::Failed(failure)),
        };

        info!(trace_id, "All pipeline stages produced valid output");
        Ok(PipelineOutcome::Completed {
            trace_id: trace_id.to_string(),
            specification: Specification::assemble(features, stories, interfaces),
        })
    }
}

fn valid_or_failure<T>(
    trace_id: &str,
    stage: StageId,
    result: StageResult<T>,
) -> Result<T, StageFailure> {
    match result {
        StageResult::Valid { value, .. } => Ok(value),
        StageResult::Exhausted {
            last_output,
            attempts,
            last_issue,
        } => Err(StageFailure {
            trace_id: trace_id.to_string(),
            stage,
            last_output,
            last_issue,
            attempts,
        }),
    }
}

/// `api_db` input: the features output with the stories added.
#[derive(Serialize)]
struct StoriesInput<'a> {
    #[serde(flatten)]
    features: &'a FeatureSet,
    user_stories: &'a [Value],
}

/// Pretty JSON for prompt bindings.
pub(crate) fn pretty<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ScriptedBackend, fixtures};
    use std::sync::Arc;
    use std::time::Duration;

    fn setup(script: Vec<&str>) -> (Arc<ScriptedBackend>, OracleGateway, PipelineAssets, Config) {
        let backend = Arc::new(ScriptedBackend::new(script));
        let gateway = OracleGateway::new(backend.clone(), "", Duration::from_secs(5));
        (backend, gateway, PipelineAssets::builtin().unwrap(), Config::default())
    }

    #[tokio::test]
    async fn test_happy_path_uses_three_calls() {
        let (backend, gateway, assets, config) =
            setup(vec![fixtures::FEATURES, fixtures::STORIES, fixtures::API_DB]);

        let outcome = Orchestrator::new(&gateway, &assets, &config)
            .run_pipeline("trace_t", fixtures::REQUIREMENTS)
            .await
            .unwrap();

        let PipelineOutcome::Completed {
            trace_id,
            specification,
        } = outcome
        else {
            panic!("expected completion");
        };
        assert_eq!(trace_id, "trace_t");
        assert_eq!(specification.modules.len(), 2);
        assert_eq!(specification.user_stories.len(), 2);
        assert_eq!(specification.api_endpoints.len(), 2);
        assert_eq!(specification.open_questions.len(), 1);
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_later_prompts_carry_earlier_outputs() {
        let (backend, gateway, assets, config) =
            setup(vec![fixtures::FEATURES, fixtures::STORIES, fixtures::API_DB]);

        Orchestrator::new(&gateway, &assets, &config)
            .run_pipeline("trace_t", fixtures::REQUIREMENTS)
            .await
            .unwrap();

        let prompts = backend.prompts();
        assert!(prompts[0].contains(fixtures::REQUIREMENTS));
        assert!(prompts[1].contains("\"features_by_module\""));
        assert!(prompts[1].contains(fixtures::REQUIREMENTS));
        assert!(prompts[2].contains("\"user_stories\""));
        assert!(prompts[2].contains("\"Share list\""));
    }

    #[tokio::test]
    async fn test_stories_failure_stops_pipeline() {
        let (backend, gateway, assets, config) = setup(vec![
            fixtures::FEATURES,
            "{}",
            "{\"user_stories\": {}}",
            "still wrong",
        ]);

        let outcome = Orchestrator::new(&gateway, &assets, &config)
            .run_pipeline("trace_t", fixtures::REQUIREMENTS)
            .await
            .unwrap();

        match outcome {
            PipelineOutcome::Failed(failure) => {
                assert_eq!(failure.stage, StageId::Stories);
                assert_eq!(failure.trace_id, "trace_t");
                assert_eq!(failure.last_output, "still wrong");
                assert_eq!(failure.attempts, 3);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(backend.call_count(), 4);
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let backend = Arc::new(ScriptedBackend::from_results([
            Ok(fixtures::FEATURES.to_string()),
            Err(LlmError::Timeout {
                duration: Duration::from_secs(1),
            }),
        ]));
        let gateway = OracleGateway::new(backend.clone(), "", Duration::from_secs(5));
        let assets = PipelineAssets::builtin().unwrap();
        let config = Config::default();

        let err = Orchestrator::new(&gateway, &assets, &config)
            .run_pipeline("trace_t", fixtures::REQUIREMENTS)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout { .. }));
        assert_eq!(backend.call_count(), 2);
    }

    #[tokio::test]
    async fn test_retries_from_config() {
        let (backend, gateway, assets, _) = setup(vec!["bad", "bad"]);
        let config = Config::builder().retries(1).build().unwrap();

        let outcome = Orchestrator::new(&gateway, &assets, &config)
            .run_pipeline("trace_t", fixtures::REQUIREMENTS)
            .await
            .unwrap();
        assert!(matches!(outcome, PipelineOutcome::Failed(ref f) if f.stage == StageId::Features));
        assert_eq!(backend.call_count(), 2);
    }
}
