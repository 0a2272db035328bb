//! Oracle gateway: one prompt in, one trimmed completion out.
//!
//! The gateway never retries; a failed call surfaces its `LlmError` as-is.

use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use specsmith_utils::types::StageId;

use crate::LlmError;
use crate::types::{LlmBackend, LlmInvocation, Message};

/// Nucleus sampling is fixed for every oracle call.
pub const ORACLE_TOP_P: f64 = 1.0;

/// Identifies the run and stage a call belongs to.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    pub trace_id: &'a str,
    pub stage: StageId,
}

#[derive(Clone)]
pub struct OracleGateway {
    backend: Arc<dyn LlmBackend>,
    model: String,
    timeout: Duration,
}

impl std::fmt::Debug for OracleGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleGateway")
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl OracleGateway {
    /// `model` may be empty to use the backend's default model.
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            backend,
            model: model.into(),
            timeout,
        }
    }

    /// Model sent with every invocation; empty means the backend default.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` as a single user message and return the trimmed text.
    pub async fn invoke(
        &self,
        ctx: CallContext<'_>,
        prompt: &str,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Result<String, LlmError> {
        let invocation = LlmInvocation::new(
            ctx.trace_id,
            ctx.stage.as_str(),
            self.model.clone(),
            self.timeout,
            vec![Message::user(prompt)],
        )
        .with_metadata("max_tokens", json!(max_output_tokens))
        .with_metadata("temperature", json!(temperature))
        .with_metadata("top_p", json!(ORACLE_TOP_P));

        let started = Instant::now();
        let result = self.backend.invoke(invocation).await?;

        debug!(
            trace_id = ctx.trace_id,
            stage = %ctx.stage,
            provider = %result.provider,
            model = %result.model_used,
            duration_ms = started.elapsed().as_millis() as u64,
            response_chars = result.raw_response.chars().count(),
            "Oracle call completed"
        );

        Ok(result.raw_response.trim().to_string())
    }
}

const FENCE: &str = "```";

/// Strip one Markdown code fence from around a completion.
///
/// A leading fence may carry a language tag (`json`, `c++`, `x-json`). The
/// tag is only dropped when it is followed by whitespace, an opening JSON
/// bracket, or the end of input.
#[must_use]
pub fn clean_output(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        let tag_len = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-')))
            .unwrap_or(rest.len());
        let after_tag = &rest[tag_len..];
        text = match after_tag.chars().next() {
            None => after_tag,
            Some(c) if c.is_whitespace() || c == '{' || c == '[' => after_tag,
            Some(_) => rest,
        };
    }

    if let Some(rest) = text.strip_suffix(FENCE) {
        text = rest;
    }

    text.trim().to_string()
}
