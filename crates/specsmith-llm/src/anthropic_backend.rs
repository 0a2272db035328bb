//! Anthropic Messages API backend

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use specsmith_config::Config;

use crate::LlmError;
use crate::http_client::HttpClient;
use crate::types::{HttpParams, LlmBackend, LlmInvocation, LlmResult, Message, Role, resolve_params};

const PROVIDER: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone)]
pub(crate) struct AnthropicBackend {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl AnthropicBackend {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        default_model: String,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Arc::new(HttpClient::new()?),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model,
        })
    }

    pub fn new_from_config(config: &Config) -> Result<Self, LlmError> {
        let settings = config.provider_settings(PROVIDER);
        let api_key = crate::api_key_from_env(
            "Anthropic",
            PROVIDER,
            settings
                .and_then(|s| s.api_key_env.as_deref())
                .unwrap_or(DEFAULT_KEY_ENV),
        )?;
        let base_url = settings.and_then(|s| s.base_url.clone());

        Self::new(api_key, base_url, config.model_for(PROVIDER))
    }

    fn request_body(&self, inv: &LlmInvocation) -> MessagesRequest {
        let (model, params) = resolve_params(inv, &self.default_model, HttpParams::default());
        let (system, messages) = convert_messages(&inv.messages);
        MessagesRequest {
            model,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            system,
        }
    }
}

/// Split system messages out into the top-level `system` field.
///
/// Multiple system messages are joined with a blank line.
fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage>) {
    let mut system: Option<String> = None;
    let mut converted = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => match system.as_mut() {
                Some(existing) => {
                    existing.push_str("\n\n");
                    existing.push_str(&msg.content);
                }
                None => system = Some(msg.content.clone()),
            },
            Role::User | Role::Assistant => converted.push(AnthropicMessage {
                role: msg.role.as_str().to_string(),
                content: msg.content.clone(),
            }),
        }
    }

    (system, converted)
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let body = self.request_body(&inv);

        debug!(
            provider = PROVIDER,
            trace_id = %inv.trace_id,
            stage = %inv.stage,
            model = %body.model,
            max_tokens = body.max_tokens,
            temperature = body.temperature,
            timeout_secs = inv.timeout.as_secs(),
            "Invoking Anthropic backend"
        );

        let request = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);

        let response = self
            .client
            .execute_with_retry(request, inv.timeout, PROVIDER)
            .await?;

        let response_body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("Failed to parse Anthropic response: {e}")))?;

        let content = response_body.text();
        if content.is_empty() {
            return Err(LlmError::Transport(
                "Anthropic response missing text content".to_string(),
            ));
        }

        let mut result = LlmResult::new(content, PROVIDER, body.model);
        if let Some(usage) = response_body.usage {
            result = result.with_tokens(usage.input_tokens, usage.output_tokens);
        }

        debug!(
            provider = PROVIDER,
            tokens_input = ?result.tokens_input,
            tokens_output = ?result.tokens_output,
            "Anthropic invocation completed"
        );

        Ok(result)
    }
}

#[derive(Debug, Clone, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Clone, Serialize)]
struct MessagesRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

impl MessagesResponse {
    /// Concatenated text of all `text` blocks.
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_convert_messages_separates_system() {
        let (system, messages) = convert_messages(&[
            Message::system("be terse"),
            Message::system("json only"),
            Message::user("go"),
        ]);
        assert_eq!(system.as_deref(), Some("be terse\n\njson only"));
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
    }

    #[test]
    fn test_convert_messages_no_system() {
        let (system, messages) = convert_messages(&[Message::user("go")]);
        assert!(system.is_none());
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_request_body_uses_metadata() {
        let backend =
            AnthropicBackend::new("key".into(), None, "claude-3-5-haiku-latest".into()).unwrap();
        let inv = LlmInvocation::new(
            "trace_1",
            "api_db",
            "",
            Duration::from_secs(5),
            vec![Message::user("design the api")],
        )
        .with_metadata("max_tokens", json!(3000));

        let body = serde_json::to_value(backend.request_body(&inv)).unwrap();
        assert_eq!(body["model"], "claude-3-5-haiku-latest");
        assert_eq!(body["max_tokens"], 3000);
        assert!(body.get("system").is_none());
        assert_eq!(backend.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_response_text_joins_text_blocks() {
        let response: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "{\"a\":"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "1}"}
            ],
            "usage": {"input_tokens": 3, "output_tokens": 4}
        }))
        .unwrap();
        assert_eq!(response.text(), "{\"a\":1}");
    }
}
