//! Test Refinement Engine: failure-driven correction of a command sequence.

use std::sync::Arc;

use tracing::debug;

use crate::errors::SynthError;
use crate::llm::{strip_code_fences, GenerateRequest, LlmProvider};
use crate::model::FailureContext;
use crate::prompt;

/// Refinement engine configuration.
#[derive(Debug, Clone, Default)]
pub struct RefinementConfig {
    /// Model identifier forwarded to the provider.
    pub model: Option<String>,
}

/// Asks the model for a corrected command sequence from failure history.
pub struct RefinementEngine {
    provider: Arc<dyn LlmProvider>,
    config: RefinementConfig,
}

impl RefinementEngine {
    pub fn new(provider: Arc<dyn LlmProvider>, config: RefinementConfig) -> Self {
        Self { provider, config }
    }

    /// Produce corrected test content.
    ///
    /// One structured prompt carrying test identity, failure category,
    /// error, failed command, ranked locators, and the rendered history of
    /// prior attempts; enclosing code fences are stripped from the response
    /// before it is returned.
    pub async fn refine(
        &self,
        test_content: &str,
        context: &FailureContext,
        prior_attempts: &[FailureContext],
    ) -> Result<String, SynthError> {
        let request =
            GenerateRequest::new(prompt::format_healing_prompt(test_content, context, prior_attempts))
                .with_system_prompt(prompt::HEALING_SYSTEM_PROMPT)
                .with_model(self.config.model.clone());

        let response = self.provider.generate(&request).await?;
        let corrected = strip_code_fences(&response.content);
        debug!(
            test_id = %context.test_id,
            prior = prior_attempts.len(),
            "test content refined"
        );
        Ok(corrected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedProvider;
    use crate::model::{FailureCategory, TestId};
    use chrono::Utc;

    fn context() -> FailureContext {
        FailureContext {
            test_id: TestId::from("login-test"),
            error: "selector not found: .logo".to_string(),
            failed_command: None,
            category: FailureCategory::LocatorNotFound,
            screenshot: None,
            snapshot: None,
            ranked_locators: vec!["[data-testid=\"logo\"]".to_string()],
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_refine_strips_code_fences() {
        let provider = Arc::new(ScriptedProvider::new([
            "```json\n[{\"action\": \"click\", \"selector\": \"[data-testid=\\\"logo\\\"]\"}]\n```",
        ]));
        let engine = RefinementEngine::new(provider, RefinementConfig::default());
        let corrected = engine.refine("[]", &context(), &[]).await.unwrap();
        assert!(corrected.starts_with('['));
        assert!(!corrected.contains("```"));
    }

    #[tokio::test]
    async fn test_refine_propagates_provider_error() {
        let provider = Arc::new(ScriptedProvider::default());
        let engine = RefinementEngine::new(provider, RefinementConfig::default());
        assert!(engine.refine("[]", &context(), &[]).await.is_err());
    }
}
