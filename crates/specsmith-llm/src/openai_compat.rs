//! OpenAI-compatible chat completions backend
//!
//! Serves both Groq and OpenRouter: same request/response shape, different
//! endpoint, key variable and a couple of OpenRouter attribution headers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use specsmith_config::Config;

use crate::LlmError;
use crate::http_client::HttpClient;
use crate::types::{HttpParams, LlmBackend, LlmInvocation, LlmResult, Message, resolve_params};

const OPENROUTER_REFERER: &str = "https://github.com/specsmith/specsmith";
const OPENROUTER_TITLE: &str = "specsmith";

/// Which OpenAI-compatible service a backend talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flavor {
    Groq,
    OpenRouter,
}

impl Flavor {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Groq => "groq",
            Self::OpenRouter => "openrouter",
        }
    }

    const fn display_name(self) -> &'static str {
        match self {
            Self::Groq => "Groq",
            Self::OpenRouter => "OpenRouter",
        }
    }

    const fn default_base_url(self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1/chat/completions",
            Self::OpenRouter => "https://openrouter.ai/api/v1/chat/completions",
        }
    }

    const fn default_key_env(self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    /// Groq pins nucleus sampling to 1.0 for deterministic-ish output.
    const fn default_top_p(self) -> Option<f32> {
        match self {
            Self::Groq => Some(1.0),
            Self::OpenRouter => None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct OpenAiCompatBackend {
    flavor: Flavor,
    client: Arc<HttpClient>,
    base_url: String,
    api_key: String,
    default_model: String,
    default_params: HttpParams,
}

impl OpenAiCompatBackend {
    pub fn new(
        flavor: Flavor,
        api_key: String,
        base_url: Option<String>,
        default_model: String,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            flavor,
            client: Arc::new(HttpClient::new()?),
            base_url: base_url.unwrap_or_else(|| flavor.default_base_url().to_string()),
            api_key,
            default_model,
            default_params: HttpParams {
                top_p: flavor.default_top_p(),
                ..HttpParams::default()
            },
        })
    }

    /// Build from `[llm.<provider>]`; the key is read from the environment.
    pub fn new_from_config(config: &Config, flavor: Flavor) -> Result<Self, LlmError> {
        let settings = config.provider_settings(flavor.name());
        let api_key = crate::api_key_from_env(
            flavor.display_name(),
            flavor.name(),
            settings
                .and_then(|s| s.api_key_env.as_deref())
                .unwrap_or(flavor.default_key_env()),
        )?;
        let base_url = settings.and_then(|s| s.base_url.clone());

        Self::new(flavor, api_key, base_url, config.model_for(flavor.name()))
    }

    fn request_body(&self, inv: &LlmInvocation) -> ChatRequest {
        let (model, params) = resolve_params(inv, &self.default_model, self.default_params);
        ChatRequest {
            model,
            messages: convert_messages(&inv.messages),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            stream: false,
        }
    }
}

fn convert_messages(messages: &[Message]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|msg| ChatMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        })
        .collect()
}

#[async_trait]
impl LlmBackend for OpenAiCompatBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let provider = self.flavor.name();
        let body = self.request_body(&inv);

        debug!(
            provider,
            trace_id = %inv.trace_id,
            stage = %inv.stage,
            model = %body.model,
            max_tokens = body.max_tokens,
            temperature = body.temperature,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking chat completions backend"
        );

        let mut request = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("Content-Type", "application/json");
        if self.flavor == Flavor::OpenRouter {
            request = request
                .header("HTTP-Referer", OPENROUTER_REFERER)
                .header("X-Title", OPENROUTER_TITLE);
        }
        let request = request.json(&body);

        let response = self
            .client
            .execute_with_retry(request, inv.timeout, provider)
            .await?;

        let response_body: ChatResponse = response.json().await.map_err(|e| {
            LlmError::Transport(format!("Failed to parse {provider} response: {e}"))
        })?;

        let content = response_body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Transport(format!("{provider} response missing choices[0]")))?
            .message
            .content
            .ok_or_else(|| {
                LlmError::Transport(format!("{provider} response missing content in choices[0]"))
            })?;

        let mut result = LlmResult::new(content, provider, body.model);
        if let Some(usage) = response_body.usage {
            result = result.with_tokens(usage.prompt_tokens, usage.completion_tokens);
        }

        debug!(
            provider,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Chat completion finished"
        );

        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    prompt_tokens: u64,
    completion_tokens: u64,
}
