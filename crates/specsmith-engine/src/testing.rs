//! Test doubles for driving the engine without a network
//!
//! Available to this crate's tests and, with the `test-utils` feature, to
//! downstream integration tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use specsmith_llm::{LlmBackend, LlmError, LlmInvocation, LlmResult};

/// Replays canned completions in order and records every prompt and
/// requested model it receives.
///
/// Once the script runs out, further calls fail with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    models: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_results(responses.into_iter().map(|r| Ok(r.into())))
    }

    pub fn from_results(results: impl IntoIterator<Item = Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(results.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
            models: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }

    /// Model names requested so far; empty strings mean "backend default".
    pub fn models(&self) -> Vec<String> {
        self.models
            .lock()
            .map(|models| models.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().map(|prompts| prompts.len()).unwrap_or(0)
    }

    /// Scripted responses not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.lock().map(|script| script.len()).unwrap_or(0)
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn invoke(&self, inv: LlmInvocation) -> Result<LlmResult, LlmError> {
        let prompt = inv.user_prompt().unwrap_or_default().to_string();
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt);
        }
        if let Ok(mut models) = self.models.lock() {
            models.push(inv.model.clone());
        }

        let next = self
            .script
            .lock()
            .map_err(|_| LlmError::Transport("script lock poisoned".into()))?
            .pop_front();

        match next {
            Some(Ok(text)) => Ok(LlmResult::new(text, "scripted", "scripted-model")),
            Some(Err(e)) => Err(e),
            None => Err(LlmError::Transport(format!(
                "scripted backend exhausted at stage '{}'",
                inv.stage
            ))),
        }
    }
}

/// Canned stage outputs for a small todo-list product.
pub mod fixtures {
    pub const REQUIREMENTS: &str = "Build a collaborative todo list app. Users sign up with email, \
        create lists, add items with due dates and share lists with other users.";

    pub const INSTRUCTION: &str = "Add a password reset flow via email link.";

    pub const FEATURES: &str = r#"{
  "modules": ["Accounts", "Lists"],
  "features_by_module": {
    "Accounts": ["Sign up", "Log in"],
    "Lists": ["Create list", "Add item", "Share list"]
  }
}"#;

    pub const STORIES: &str = r#"{
  "user_stories": [
    {"role": "user", "story": "As a user I can sign up with my email", "module": "Accounts"},
    {"role": "user", "story": "As a user I can share a list", "module": "Lists"}
  ]
}"#;

    pub const API_DB: &str = r#"{
  "api_endpoints": [
    {"method": "POST", "path": "/signup", "description": "Create an account"},
    {"method": "GET", "path": "/lists", "description": "List my lists"}
  ],
  "db_schema": {
    "tables": [
      {"name": "users", "columns": ["id", "email", "password_hash"]},
      {"name": "lists", "columns": ["id", "owner_id", "title"]}
    ]
  },
  "open_questions": ["Should shared lists be editable by collaborators?"]
}"#;

    pub const REFINED: &str = r#"{
  "modules": ["Accounts", "Lists"],
  "features_by_module": {
    "Accounts": ["Sign up", "Log in", "Reset password"],
    "Lists": ["Create list", "Add item", "Share list"]
  },
  "user_stories": [
    {"role": "user", "story": "As a user I can reset my password", "module": "Accounts"}
  ],
  "api_endpoints": [
    {"method": "POST", "path": "/password-reset", "description": "Send reset link"}
  ],
  "db_schema": {
    "tables": [
      {"name": "users", "columns": ["id", "email", "password_hash"]},
      {"name": "reset_tokens", "columns": ["token", "user_id", "expires_at"]}
    ]
  },
  "open_questions": []
}"#;
}

#[cfg(test)]
mod tests {
    use super::*;
    use specsmith_llm::Message;
    use std::time::Duration;

    fn invocation(prompt: &str) -> LlmInvocation {
        LlmInvocation::new(
            "trace_t",
            "features",
            "",
            Duration::from_secs(1),
            vec![Message::user(prompt)],
        )
    }

    #[tokio::test]
    async fn test_replays_in_order_and_records() {
        let backend = ScriptedBackend::new(["one", "two"]);

        let first = backend.invoke(invocation("p1")).await.unwrap();
        let second = backend.invoke(invocation("p2")).await.unwrap();
        assert_eq!(first.raw_response, "one");
        assert_eq!(second.raw_response, "two");
        assert_eq!(backend.prompts(), vec!["p1", "p2"]);
        assert_eq!(backend.remaining(), 0);

        assert!(matches!(
            backend.invoke(invocation("p3")).await,
            Err(LlmError::Transport(_))
        ));
        assert_eq!(backend.call_count(), 3);
    }

    #[test]
    fn test_fixtures_are_json() {
        for text in [
            fixtures::FEATURES,
            fixtures::STORIES,
            fixtures::API_DB,
            fixtures::REFINED,
        ] {
            assert!(serde_json::from_str::<serde_json::Value>(text).is_ok());
        }
        assert!(fixtures::REQUIREMENTS.chars().count() >= 50);
    }
}
