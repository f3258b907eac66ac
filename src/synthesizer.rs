//! Command Synthesizer: one model round trip per step producing a candidate.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::SynthError;
use crate::llm::{strip_code_fences, GenerateRequest, LlmProvider};
use crate::model::{CandidateCommand, CommandAction, Locator, Step};
use crate::prompt;

/// Synthesizer configuration.
#[derive(Debug, Clone)]
pub struct SynthesizerConfig {
    /// Model identifier forwarded to the provider.
    pub model: Option<String>,
    /// Character bound applied to the snapshot section of the prompt.
    pub snapshot_limit: usize,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            model: None,
            snapshot_limit: 4_000,
        }
    }
}

/// Produces one candidate command per step from step text plus snapshot.
pub struct Synthesizer {
    provider: Arc<dyn LlmProvider>,
    config: SynthesizerConfig,
}

impl Synthesizer {
    pub fn new(provider: Arc<dyn LlmProvider>, config: SynthesizerConfig) -> Self {
        Self { provider, config }
    }

    /// Generate a candidate command for one step.
    ///
    /// On parse failure or zero commands, returns the safe no-op wait so
    /// the pipeline always makes forward progress. Only provider transport
    /// failures propagate.
    pub async fn generate_command(
        &self,
        step: &Step,
        instruction: &str,
        snapshot: &str,
    ) -> Result<CandidateCommand, SynthError> {
        let request = GenerateRequest::new(prompt::format_synthesis_prompt(
            step,
            instruction,
            snapshot,
            self.config.snapshot_limit,
        ))
        .with_system_prompt(prompt::SYNTHESIZER_SYSTEM_PROMPT)
        .with_model(self.config.model.clone());

        let response = self.provider.generate(&request).await?;
        match parse_command_response(&response.content) {
            Some(command) => {
                debug!(step = step.index, command = %command.describe(), "command synthesized");
                Ok(command)
            }
            None => {
                warn!(
                    step = step.index,
                    "unparseable synthesis response, falling back to no-op wait"
                );
                Ok(CandidateCommand::noop_wait())
            }
        }
    }
}

/// Wire shape the model is asked to emit for a single command.
#[derive(Debug, Deserialize)]
struct RawCommand {
    action: String,
    #[serde(default)]
    selector: Option<String>,
    #[serde(default)]
    fallback_selector: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    ms: Option<u64>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    key: Option<String>,
}

impl From<RawCommand> for CandidateCommand {
    fn from(raw: RawCommand) -> Self {
        let mut command = CandidateCommand::new(CommandAction::from(raw.action));
        command.locator = raw.selector.as_deref().map(Locator::parse);
        command.fallback_locator = raw.fallback_selector.as_deref().map(Locator::parse);
        command.params.text = raw.text;
        command.params.url = raw.url;
        command.params.ms = raw.ms;
        command.params.value = raw.value;
        command.params.key = raw.key;
        command
    }
}

/// Parse a model response into a single candidate command.
///
/// Accepts a bare JSON object, a one-element (or longer) JSON array, and
/// fence-wrapped variants of either; returns `None` when nothing usable
/// can be extracted.
pub(crate) fn parse_command_response(content: &str) -> Option<CandidateCommand> {
    let body = strip_code_fences(content);
    if let Ok(raw) = serde_json::from_str::<RawCommand>(&body) {
        return Some(raw.into());
    }
    if let Ok(raws) = serde_json::from_str::<Vec<RawCommand>>(&body) {
        return raws.into_iter().next().map(Into::into);
    }
    None
}

/// Parse a model response into a full command sequence.
///
/// Used by the healing path, where the refinement engine returns the whole
/// corrected test. A single object is accepted as a one-command sequence.
pub(crate) fn parse_command_sequence(content: &str) -> Option<Vec<CandidateCommand>> {
    let body = strip_code_fences(content);
    if let Ok(raws) = serde_json::from_str::<Vec<RawCommand>>(&body) {
        return Some(raws.into_iter().map(Into::into).collect());
    }
    if let Ok(raw) = serde_json::from_str::<RawCommand>(&body) {
        return Some(vec![raw.into()]);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedProvider;
    use crate::model::LocatorStrategy;

    #[test]
    fn test_parse_command_response_object() {
        let command = parse_command_response(
            r#"{"action": "click", "selector": ".submit", "fallback_selector": "text=Submit"}"#,
        )
        .expect("command");
        assert_eq!(command.action, CommandAction::Click);
        assert_eq!(
            command.locator,
            Some(Locator::new(LocatorStrategy::Class, "submit"))
        );
        assert_eq!(
            command.fallback_locator,
            Some(Locator::new(LocatorStrategy::Text, "Submit"))
        );
    }

    #[test]
    fn test_parse_command_response_fenced_array() {
        let content = "```json\n[{\"action\": \"type_text\", \"selector\": \"#user\", \"text\": \"alice\"}]\n```";
        let command = parse_command_response(content).expect("command");
        assert_eq!(command.action, CommandAction::TypeText);
        assert_eq!(command.params.text.as_deref(), Some("alice"));
    }

    #[test]
    fn test_parse_command_response_garbage() {
        assert!(parse_command_response("I would click the button").is_none());
        assert!(parse_command_response("").is_none());
    }

    #[test]
    fn test_parse_command_sequence() {
        let content = r#"[{"action": "click", "selector": ".a"}, {"action": "wait", "ms": 100}]"#;
        let commands = parse_command_sequence(content).expect("sequence");
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[1].params.ms, Some(100));
    }

    #[tokio::test]
    async fn test_generate_command_falls_back_to_noop() {
        let provider = Arc::new(ScriptedProvider::new(["not json at all"]));
        let synthesizer = Synthesizer::new(provider, SynthesizerConfig::default());
        let step = Step::new(0, "Click submit");
        let command = synthesizer
            .generate_command(&step, "Submit form", "<form>")
            .await
            .unwrap();
        assert_eq!(command, CandidateCommand::noop_wait());
    }

    #[tokio::test]
    async fn test_generate_command_propagates_provider_error() {
        let provider = Arc::new(ScriptedProvider::default());
        let synthesizer = Synthesizer::new(provider, SynthesizerConfig::default());
        let step = Step::new(0, "Click submit");
        assert!(synthesizer
            .generate_command(&step, "Submit form", "<form>")
            .await
            .is_err());
    }
}
