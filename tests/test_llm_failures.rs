//! Provider failures end a run without retries and without writing anything.

mod test_support;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use specsmith::llm::{BudgetedBackend, LlmError, LlmInvocation, LlmResult};
use specsmith::{ExitCode, LlmBackend, SchemaPolicy, SpecEngine, SpecsmithError};
use test_support::{config_for, state_dir};

const REQUIREMENTS: &str = "A library catalogue where members search books, place holds and \
    get notified when a held book is ready for pickup.";

/// Counts calls and always reports a provider outage.
#[derive(Default)]
struct OutageBackend {
    calls: AtomicU32,
}

#[async_trait]
impl LlmBackend for OutageBackend {
    async fn invoke(&self, _inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::ProviderOutage("503 Service Unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_outage_is_not_retried_and_persists_nothing() {
    let (_dir, state) = state_dir();
    let backend = Arc::new(OutageBackend::default());
    let engine =
        SpecEngine::with_backend(config_for(&state, SchemaPolicy::Advisory), backend.clone())
            .unwrap();

    let err = engine.generate(REQUIREMENTS).await.unwrap_err();
    assert!(matches!(
        err,
        SpecsmithError::Llm(LlmError::ProviderOutage(_))
    ));
    assert_eq!(err.to_exit_code(), ExitCode::LLM_FAILURE);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    assert!(engine.store().traces().unwrap().is_empty());
}

#[tokio::test]
async fn test_budget_stops_a_run() {
    let (_dir, state) = state_dir();
    let budgeted = BudgetedBackend::new(Box::new(OutageBackend::default()), 0);
    let engine =
        SpecEngine::with_backend(config_for(&state, SchemaPolicy::Advisory), Arc::new(budgeted))
            .unwrap();

    let err = engine.generate(REQUIREMENTS).await.unwrap_err();
    assert!(matches!(
        err,
        SpecsmithError::Llm(LlmError::BudgetExceeded { limit: 0, attempted: 1 })
    ));
}
