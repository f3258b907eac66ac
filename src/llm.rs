//! Language model provider boundary.
//!
//! The model API wire protocol is out of scope; consumers supply any
//! implementation of [`LlmProvider`]. Deterministic providers are included
//! for tests and offline development.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::errors::SynthError;
use crate::prompt;

/// One model round trip request.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub user_prompt: String,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
}

impl GenerateRequest {
    pub fn new(user_prompt: impl Into<String>) -> Self {
        Self {
            user_prompt: user_prompt.into(),
            system_prompt: None,
            model: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

/// One model round trip response.
#[derive(Debug, Clone)]
pub struct GenerateResponse {
    pub content: String,
}

/// Abstraction over LLM vendors so multiple backends can plug into the core.
///
/// Transport failures surface as [`SynthError::Provider`] and propagate to
/// the calling component; malformed *content* is handled by each caller's
/// own fallback rule instead.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, SynthError>;
}

/// Strip enclosing Markdown code fences from a model response.
///
/// Handles ```json fences, bare fences, and surrounding prose; returns the
/// fenced body when one exists, otherwise the trimmed input.
pub fn strip_code_fences(content: &str) -> String {
    let trimmed = content.trim();
    if let Some(open) = trimmed.find("```") {
        let after_open = &trimmed[open + 3..];
        // Skip the language tag on the opening fence line.
        let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_open[body_start..];
        if let Some(close) = body.rfind("```") {
            return body[..close].trim().to_string();
        }
        return body.trim().to_string();
    }
    trimmed.to_string()
}

/// Deterministic provider used for tests and offline development.
///
/// Replies with a minimal conforming output for each known prompt family:
/// the raw instruction as a one-step plan, and a no-op wait command for
/// synthesis and refinement prompts.
#[derive(Debug, Default, Clone)]
pub struct MockLlmProvider;

#[async_trait]
impl LlmProvider for MockLlmProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, SynthError> {
        let system = request.system_prompt.as_deref().unwrap_or("");
        let content = if system == prompt::PLANNER_SYSTEM_PROMPT {
            first_instruction_line(&request.user_prompt)
        } else {
            r#"{"action": "wait", "ms": 0}"#.to_string()
        };
        Ok(GenerateResponse { content })
    }
}

fn first_instruction_line(user_prompt: &str) -> String {
    user_prompt
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("wait")
        .to_string()
}

/// Provider that replays a scripted queue of responses, in order.
///
/// Once the queue is exhausted further calls fail with a provider error,
/// which exercises the propagation path of unavailable backends.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedProvider {
    pub fn new(responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }

    /// Append one more scripted response.
    pub async fn push(&self, response: impl Into<String>) {
        self.responses.lock().await.push_back(response.into());
    }

    /// Number of unconsumed responses.
    pub async fn remaining(&self) -> usize {
        self.responses.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn generate(&self, _request: &GenerateRequest) -> Result<GenerateResponse, SynthError> {
        let mut responses = self.responses.lock().await;
        match responses.pop_front() {
            Some(content) => Ok(GenerateResponse { content }),
            None => Err(SynthError::provider("scripted provider exhausted")),
        }
    }
}
