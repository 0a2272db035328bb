//! Call budget for LLM backends
//!
//! Wraps any `LlmBackend` and refuses calls once a per-process limit is
//! reached. The budget counts attempted calls, not successful ones, so a retry
//! loop cannot spend past the limit by failing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

use crate::LlmError;
use crate::types::{LlmBackend, LlmInvocation, LlmResult};

/// Calls allowed per process when neither env nor config sets a limit.
pub const DEFAULT_BUDGET_LIMIT: u32 = 40;

/// Environment variable overriding the budget limit.
pub const BUDGET_ENV_VAR: &str = "SPECSMITH_LLM_BUDGET";

pub struct BudgetedBackend {
    inner: Box<dyn LlmBackend>,
    calls: AtomicU32,
    limit: u32,
}

impl BudgetedBackend {
    #[must_use]
    pub fn new(inner: Box<dyn LlmBackend>, limit: u32) -> Self {
        debug!(limit, "Creating BudgetedBackend");
        Self {
            inner,
            calls: AtomicU32::new(0),
            limit,
        }
    }

    /// Wrap `inner` with the limit resolved as env > config > default.
    #[must_use]
    pub fn with_limit_from_config(inner: Box<dyn LlmBackend>, config_budget: Option<u32>) -> Self {
        let env_value = std::env::var(BUDGET_ENV_VAR).ok();
        Self::new(inner, resolve_limit(env_value.as_deref(), config_budget))
    }

    #[must_use]
    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// Resolve the effective limit. Unparseable or zero env values are ignored.
pub(crate) fn resolve_limit(env_value: Option<&str>, config_budget: Option<u32>) -> u32 {
    if let Some(limit) = env_value
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|limit| *limit > 0)
    {
        debug!(limit, "Using budget limit from {}", BUDGET_ENV_VAR);
        return limit;
    }
    if let Some(limit) = config_budget {
        debug!(limit, "Using budget limit from config");
        return limit;
    }
    DEFAULT_BUDGET_LIMIT
}

#[async_trait]
impl LlmBackend for BudgetedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let current = self.calls.fetch_add(1, Ordering::SeqCst);

        if current >= self.limit {
            warn!(
                limit = self.limit,
                attempted = current + 1,
                trace_id = %inv.trace_id,
                "LLM budget exhausted"
            );
            return Err(LlmError::BudgetExceeded {
                limit: self.limit,
                attempted: current + 1,
            });
        }

        debug!(call = current + 1, limit = self.limit, "Budget check passed");
        self.inner.invoke(inv).await
    }
}
