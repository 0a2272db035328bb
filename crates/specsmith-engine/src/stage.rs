//! Self-correcting stage executor
//!
//! Renders a stage prompt, asks the oracle, and checks the answer. Invalid
//! answers are retried with a corrective prompt that quotes the bad output;
//! transport errors end the stage at once.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Instrument, debug, info, warn};

use specsmith_config::StageParams;
use specsmith_llm::{CallContext, LlmError, OracleGateway, clean_output};
use specsmith_prompt_template::{corrective_prompt, render};
use specsmith_utils::logging::stage_span;
use specsmith_utils::types::StageId;
use specsmith_validation::{RequiredKey, StructuralIssue, parse_and_check};

use crate::retry::{self, RetryOutcome};

/// Everything needed to run one stage.
#[derive(Debug, Clone, Copy)]
pub struct StageRequest<'a> {
    pub stage: StageId,
    pub template: &'a str,
    pub bindings: &'a [(&'a str, &'a str)],
    pub required_keys: &'a [RequiredKey],
    pub params: StageParams,
    /// Extra attempts after the first.
    pub retries: u32,
}

/// Outcome of one stage.
#[derive(Debug, Clone, PartialEq)]
pub enum StageResult<T> {
    Valid {
        value: T,
        attempts: u32,
    },
    Exhausted {
        /// Cleaned text of the final attempt.
        last_output: String,
        attempts: u32,
        last_issue: StructuralIssue,
    },
}

impl<T> StageResult<T> {
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Valid { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }
}

/// A completion that failed validation.
#[derive(Debug, Clone)]
struct Rejected {
    cleaned: String,
    issue: StructuralIssue,
}

pub struct StageExecutor<'a> {
    gateway: &'a OracleGateway,
}

impl<'a> StageExecutor<'a> {
    #[must_use]
    pub const fn new(gateway: &'a OracleGateway) -> Self {
        Self { gateway }
    }

    /// Run a stage until it yields a valid `T` or attempts run out.
    ///
    /// Validation is: parse JSON, check required keys and their container
    /// shapes, then deserialize into `T`.
    pub async fn run_stage<T: DeserializeOwned>(
        &self,
        trace_id: &str,
        request: StageRequest<'_>,
    ) -> Result<StageResult<T>, LlmError> {
        let stage = request.stage;
        let span = stage_span(trace_id, stage.as_str());
        self.run_stage_inner(trace_id, request)
            .instrument(span)
            .await
            .inspect(|result| match result {
                StageResult::Valid { attempts, .. } => {
                    info!(trace_id, stage = %stage, attempts, "Stage produced valid output");
                }
                StageResult::Exhausted {
                    attempts, last_issue, ..
                } => {
                    warn!(trace_id, stage = %stage, attempts, issue = %last_issue, "Stage exhausted its attempts");
                }
            })
    }

    async fn run_stage_inner<T: DeserializeOwned>(
        &self,
        trace_id: &str,
        request: StageRequest<'_>,
    ) -> Result<StageResult<T>, LlmError> {
        let StageRequest {
            stage,
            template,
            bindings,
            required_keys,
            params,
            retries,
        } = request;

        let rendered = render(template, bindings);
        let key_names: Vec<&str> = required_keys.iter().map(|k| k.name).collect();
        let gateway = self.gateway;
        let ctx = CallContext { trace_id, stage };

        let outcome = retry::with_feedback(
            rendered.clone(),
            retries.saturating_add(1),
            move |prompt: String, attempt: u32| async move {
                debug!(trace_id = ctx.trace_id, stage = %stage, attempt, "Invoking oracle");
                let raw = gateway
                    .invoke(ctx, &prompt, params.temperature, params.max_tokens)
                    .await?;
                let cleaned = clean_output(&raw);
                Ok::<_, LlmError>(validate::<T>(&cleaned, required_keys).map_err(|issue| {
                    warn!(trace_id = ctx.trace_id, stage = %stage, attempt, issue = %issue, "Invalid stage output");
                    Rejected { cleaned, issue }
                }))
            },
            |rejected: &Rejected| corrective_prompt(stage, &key_names, &rejected.cleaned, &rendered),
        )
        .await?;

        Ok(match outcome {
            RetryOutcome::Succeeded { value, attempts } => StageResult::Valid { value, attempts },
            RetryOutcome::Exhausted {
                last_rejection,
                attempts,
            } => StageResult::Exhausted {
                last_output: last_rejection.cleaned,
                attempts,
                last_issue: last_rejection.issue,
            },
        })
    }
}

fn validate<T: DeserializeOwned>(
    cleaned: &str,
    required_keys: &[RequiredKey],
) -> Result<T, StructuralIssue> {
    let value: Value = parse_and_check(cleaned, required_keys)?;
    serde_json::from_value(value).map_err(|e| StructuralIssue::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::FeatureSet;
    use crate::testing::{ScriptedBackend, fixtures};
    use specsmith_prompt_template::corrective_header;
    use specsmith_validation::FEATURES_KEYS;
    use std::sync::Arc;
    use std::time::Duration;

    const TEMPLATE: &str = "List features for: {requirements_text}";
    const BINDINGS: &[(&str, &str)] = &[("requirements_text", "a todo app")];

    fn request(retries: u32) -> StageRequest<'static> {
        StageRequest {
            stage: StageId::Features,
            template: TEMPLATE,
            bindings: BINDINGS,
            required_keys: FEATURES_KEYS,
            params: StageParams {
                max_tokens: 2500,
                temperature: 0.0,
            },
            retries,
        }
    }

    fn gateway(backend: &Arc<ScriptedBackend>) -> OracleGateway {
        OracleGateway::new(backend.clone(), "", Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_first_attempt_valid_uses_one_call() {
        let backend = Arc::new(ScriptedBackend::new([fixtures::FEATURES]));
        let gateway = gateway(&backend);

        let result = StageExecutor::new(&gateway)
            .run_stage::<FeatureSet>("trace_t", request(2))
            .await
            .unwrap();

        assert!(matches!(result, StageResult::Valid { attempts: 1, .. }));
        assert_eq!(backend.call_count(), 1);
        assert_eq!(backend.prompts(), vec!["List features for: a todo app"]);
    }

    #[tokio::test]
    async fn test_fenced_output_is_accepted() {
        let fenced = format!("```json\n{}\n```", fixtures::FEATURES);
        let backend = Arc::new(ScriptedBackend::new([fenced]));
        let gateway = gateway(&backend);

        let result = StageExecutor::new(&gateway)
            .run_stage::<FeatureSet>("trace_t", request(0))
            .await
            .unwrap();
        assert!(matches!(result, StageResult::Valid { .. }));
    }

    #[tokio::test]
    async fn test_success_on_last_attempt_sends_feedback() {
        let backend = Arc::new(ScriptedBackend::new([
            "not json at all",
            r#"{"modules": {}, "features_by_module": {}}"#,
            fixtures::FEATURES,
        ]));
        let gateway = gateway(&backend);

        let result = StageExecutor::new(&gateway)
            .run_stage::<FeatureSet>("trace_t", request(2))
            .await
            .unwrap();

        assert!(matches!(result, StageResult::Valid { attempts: 3, .. }));
        let prompts = backend.prompts();
        assert_eq!(prompts.len(), 3);
        assert_eq!(prompts[0], "List features for: a todo app");
        for (prompt, previous) in prompts[1..]
            .iter()
            .zip(["not json at all", r#"{"modules": {}, "features_by_module": {}}"#])
        {
            assert!(prompt.starts_with(corrective_header(StageId::Features)));
            assert!(prompt.contains("Required keys: modules, features_by_module"));
            assert!(prompt.contains(previous));
            assert!(prompt.ends_with("Try again:\nList features for: a todo app"));
        }
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_output() {
        let backend = Arc::new(ScriptedBackend::new(["nope 1", "nope 2", "```\nnope 3\n```"]));
        let gateway = gateway(&backend);

        let result = StageExecutor::new(&gateway)
            .run_stage::<FeatureSet>("trace_t", request(2))
            .await
            .unwrap();

        match result {
            StageResult::Exhausted {
                last_output,
                attempts,
                last_issue,
            } => {
                assert_eq!(last_output, "nope 3");
                assert_eq!(attempts, 3);
                assert!(matches!(last_issue, StructuralIssue::Parse(_)));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(backend.call_count(), 3);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let backend = Arc::new(ScriptedBackend::from_results([Err(
            LlmError::ProviderOutage("503".into()),
        )]));
        let gateway = gateway(&backend);

        let err = StageExecutor::new(&gateway)
            .run_stage::<FeatureSet>("trace_t", request(2))
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::ProviderOutage(_)));
        assert_eq!(backend.call_count(), 1);
    }
}
