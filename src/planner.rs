//! Plan Generator: one model round trip turning an instruction into steps.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::SynthError;
use crate::llm::{GenerateRequest, LlmProvider};
use crate::model::Step;
use crate::prompt;

/// Planner configuration.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Model identifier forwarded to the provider.
    pub model: Option<String>,
    /// Maximum number of steps retained from the response.
    pub max_steps: usize,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_steps: 20,
        }
    }
}

/// Turns a natural-language instruction into an ordered list of atomic steps.
pub struct Planner {
    provider: Arc<dyn LlmProvider>,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(provider: Arc<dyn LlmProvider>, config: PlannerConfig) -> Self {
        Self { provider, config }
    }

    /// Decompose an instruction into steps.
    ///
    /// Always returns at least one step: a non-conforming model response
    /// degrades to a single step equal to the raw instruction. Only
    /// provider transport failures propagate as errors.
    pub async fn create_plan(&self, instruction: &str) -> Result<Vec<Step>, SynthError> {
        let trimmed = instruction.trim();
        if trimmed.is_empty() {
            return Err(SynthError::invalid_request("instruction cannot be empty"));
        }

        let request = GenerateRequest::new(prompt::format_plan_prompt(trimmed))
            .with_system_prompt(prompt::PLANNER_SYSTEM_PROMPT)
            .with_model(self.config.model.clone());

        let response = self.provider.generate(&request).await?;
        let steps = parse_plan_response(&response.content, self.config.max_steps);

        if steps.is_empty() {
            warn!(
                instruction = trimmed,
                "plan response did not conform, degrading to single step"
            );
            return Ok(vec![Step::new(0, trimmed)]);
        }

        debug!(step_count = steps.len(), "plan created");
        Ok(steps)
    }
}

/// Parse a plan response into steps, one line per step.
///
/// Tolerates numbering, bullets, and fences the prompt forbids but models
/// still occasionally emit.
fn parse_plan_response(content: &str, max_steps: usize) -> Vec<Step> {
    let mut steps = Vec::new();
    for line in content.lines() {
        let mut text = line.trim();
        if text.is_empty() || text.starts_with("```") {
            continue;
        }

        text = text
            .trim_start_matches(['-', '*', '•'])
            .trim_start();
        text = strip_leading_number(text);

        if text.is_empty() {
            continue;
        }
        steps.push(Step::new(steps.len(), text));
        if steps.len() == max_steps {
            break;
        }
    }
    steps
}

/// Remove a leading "3." / "3)" ordinal when present.
fn strip_leading_number(text: &str) -> &str {
    let digits = text.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return text;
    }
    let rest = &text[digits..];
    if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
        stripped.trim_start()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmProvider, ScriptedProvider};

    #[test]
    fn test_parse_plan_response_plain_lines() {
        let content = "Open the login menu\nType the username\nClick sign in\n";
        let steps = parse_plan_response(content, 20);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].index, 0);
        assert_eq!(steps[2].text, "Click sign in");
    }

    #[test]
    fn test_parse_plan_response_strips_bullets_and_numbers() {
        let content = "1. Open the menu\n- Click login\n2) Type password\n";
        let steps = parse_plan_response(content, 20);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].text, "Open the menu");
        assert_eq!(steps[1].text, "Click login");
        assert_eq!(steps[2].text, "Type password");
    }

    #[test]
    fn test_parse_plan_response_respects_max_steps() {
        let content = "a\nb\nc\nd\n";
        let steps = parse_plan_response(content, 2);
        assert_eq!(steps.len(), 2);
    }

    #[tokio::test]
    async fn test_create_plan_degrades_to_single_step() {
        let provider = Arc::new(ScriptedProvider::new(["```\n```"]));
        let planner = Planner::new(provider, PlannerConfig::default());
        let steps = planner.create_plan("Log in with user X").await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].text, "Log in with user X");
    }

    #[tokio::test]
    async fn test_create_plan_rejects_empty_instruction() {
        let planner = Planner::new(Arc::new(MockLlmProvider), PlannerConfig::default());
        assert!(planner.create_plan("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_create_plan_never_empty() {
        let planner = Planner::new(Arc::new(MockLlmProvider), PlannerConfig::default());
        let steps = planner.create_plan("Check the weather").await.unwrap();
        assert!(!steps.is_empty());
    }
}
