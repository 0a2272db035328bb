//! Refinement of an existing specification
//!
//! A single `refine` stage rewrites the whole document from the current
//! version plus a change instruction.

use serde_json::Value;
use tracing::{Instrument, info};

use specsmith_llm::LlmError;
use specsmith_utils::logging::run_span;
use specsmith_utils::types::StageId;

use super::{Orchestrator, PipelineOutcome, pretty, valid_or_failure};
use crate::spec::Specification;
use crate::stage::StageExecutor;

impl Orchestrator<'_> {
    /// Rewrite `current_spec` according to `instruction`.
    ///
    /// One `refine` stage with all six specification keys required. The
    /// result replaces the prior specification wholesale.
    pub async fn run_refinement(
        &self,
        trace_id: &str,
        current_spec: &Value,
        instruction: &str,
    ) -> Result<PipelineOutcome, LlmError> {
        async {
            let current = pretty(current_spec);
            let bindings = [
                ("current_spec", current.as_str()),
                ("refinement_text", instruction),
            ];

            let result = StageExecutor::new(self.gateway)
                .run_stage::<Specification>(trace_id, self.request(StageId::Refine, &bindings))
                .await?;

            Ok(match valid_or_failure(trace_id, StageId::Refine, result) {
                Ok(specification) => {
                    info!(trace_id, "Refinement produced a valid specification");
                    PipelineOutcome::Completed {
                        trace_id: trace_id.to_string(),
                        specification,
                    }
                }
                Err(failure) => PipelineOutcome::Failed(failure),
            })
        }
        .instrument(run_span(trace_id, "refinement"))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::PipelineAssets;
    use crate::testing::{ScriptedBackend, fixtures};
    use serde_json::json;
    use specsmith_config::Config;
    use specsmith_llm::OracleGateway;
    use specsmith_prompt_template::corrective_header;
    use std::sync::Arc;
    use std::time::Duration;

    fn current() -> Value {
        json!({"modules": ["Accounts"], "features_by_module": {}, "user_stories": [],
               "api_endpoints": [], "db_schema": {}, "open_questions": []})
    }

    #[tokio::test]
    async fn test_refinement_replaces_spec() {
        let backend = Arc::new(ScriptedBackend::new([fixtures::REFINED]));
        let gateway = OracleGateway::new(backend.clone(), "", Duration::from_secs(5));
        let assets = PipelineAssets::builtin().unwrap();
        let config = Config::default();

        let outcome = Orchestrator::new(&gateway, &assets, &config)
            .run_refinement("trace_r", &current(), fixtures::INSTRUCTION)
            .await
            .unwrap();

        let PipelineOutcome::Completed { specification, .. } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(specification.db_schema["tables"][1]["name"], "reset_tokens");

        let prompt = &backend.prompts()[0];
        assert!(prompt.contains(fixtures::INSTRUCTION));
        assert!(prompt.contains("\"Accounts\""));
    }

    #[tokio::test]
    async fn test_partial_spec_is_rejected_with_refine_header() {
        let partial = r#"{"modules": [], "features_by_module": {}}"#;
        let backend = Arc::new(ScriptedBackend::new([partial, partial, partial]));
        let gateway = OracleGateway::new(backend.clone(), "", Duration::from_secs(5));
        let assets = PipelineAssets::builtin().unwrap();
        let config = Config::default();

        let outcome = Orchestrator::new(&gateway, &assets, &config)
            .run_refinement("trace_r", &current(), fixtures::INSTRUCTION)
            .await
            .unwrap();

        match outcome {
            PipelineOutcome::Failed(failure) => {
                assert_eq!(failure.stage, StageId::Refine);
                assert_eq!(failure.attempts, 3);
            }
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(backend.prompts()[1].starts_with(corrective_header(StageId::Refine)));
    }
}
