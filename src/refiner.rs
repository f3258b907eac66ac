//! Command Refiner: bounded, issue-driven command repair.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::SynthError;
use crate::llm::{GenerateRequest, LlmProvider};
use crate::model::{AttemptRecord, CandidateCommand, Step, ValidationIssue};
use crate::prompt;
use crate::synthesizer::parse_command_response;

/// Refiner configuration.
#[derive(Debug, Clone)]
pub struct RefinerConfig {
    /// Model identifier forwarded to the provider.
    pub model: Option<String>,
    /// Character bound applied to the snapshot section of the prompt.
    pub snapshot_limit: usize,
}

impl Default for RefinerConfig {
    fn default() -> Self {
        Self {
            model: None,
            snapshot_limit: 4_000,
        }
    }
}

/// Asks the model for a corrected command after a validation rejection.
///
/// Invoked only when validation failed and attempts remain; the prompt
/// enumerates the rejected command, its issues, and every prior rejected
/// attempt so the model is biased against repeating mistakes.
pub struct Refiner {
    provider: Arc<dyn LlmProvider>,
    config: RefinerConfig,
}

impl Refiner {
    pub fn new(provider: Arc<dyn LlmProvider>, config: RefinerConfig) -> Self {
        Self { provider, config }
    }

    /// Produce a corrected candidate for one step.
    ///
    /// Same fallback rule as synthesis: an unparseable response degrades to
    /// the safe no-op wait rather than an error.
    pub async fn refine(
        &self,
        step: &Step,
        instruction: &str,
        command: &CandidateCommand,
        issues: &[ValidationIssue],
        snapshot: &str,
        history: &[AttemptRecord],
    ) -> Result<CandidateCommand, SynthError> {
        let request = GenerateRequest::new(prompt::format_refine_prompt(
            step,
            instruction,
            command,
            issues,
            snapshot,
            self.config.snapshot_limit,
            history,
        ))
        .with_system_prompt(prompt::REFINER_SYSTEM_PROMPT)
        .with_model(self.config.model.clone());

        let response = self.provider.generate(&request).await?;
        match parse_command_response(&response.content) {
            Some(refined) => {
                debug!(step = step.index, command = %refined.describe(), "command refined");
                Ok(refined)
            }
            None => {
                warn!(
                    step = step.index,
                    "unparseable refinement response, falling back to no-op wait"
                );
                Ok(CandidateCommand::noop_wait())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedProvider;
    use crate::model::{CommandAction, Locator};

    fn rejected() -> (Step, CandidateCommand, Vec<ValidationIssue>) {
        let step = Step::new(0, "Click the logo");
        let command =
            CandidateCommand::new(CommandAction::Click).with_locator(Locator::parse(".logo"));
        let issues = vec![ValidationIssue::not_found(".logo matches nothing")];
        (step, command, issues)
    }

    #[tokio::test]
    async fn test_refine_returns_corrected_command() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"action": "click", "selector": ".site-logo"}"#,
        ]));
        let refiner = Refiner::new(provider, RefinerConfig::default());
        let (step, command, issues) = rejected();
        let refined = refiner
            .refine(&step, "Open the home page", &command, &issues, "<img>", &[])
            .await
            .unwrap();
        assert_eq!(refined.locator, Some(Locator::parse(".site-logo")));
    }

    #[tokio::test]
    async fn test_refine_falls_back_to_noop() {
        let provider = Arc::new(ScriptedProvider::new(["sorry, I cannot"]));
        let refiner = Refiner::new(provider, RefinerConfig::default());
        let (step, command, issues) = rejected();
        let refined = refiner
            .refine(&step, "Open the home page", &command, &issues, "<img>", &[])
            .await
            .unwrap();
        assert_eq!(refined, CandidateCommand::noop_wait());
    }
}
