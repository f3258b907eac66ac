//! Self-Healing Orchestrator: execute → analyze → refine → retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::errors::SynthError;
use crate::healing::analyzer::FailureAnalyzer;
use crate::healing::refine::{RefinementConfig, RefinementEngine};
use crate::llm::LlmProvider;
use crate::model::{CandidateCommand, FailureContext, SelfHealingResult, TestId};
use crate::surface::{ExecuteFuture, SurfaceObserver};
use crate::synthesizer::parse_command_sequence;

/// States of one healing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealState {
    Ready,
    Executing,
    AnalyzingFailure,
    Refining,
    Succeeded,
    Exhausted,
}

/// Options for one healing run.
#[derive(Debug, Clone)]
pub struct HealOptions {
    /// Execution attempt ceiling.
    pub max_attempts: u32,
    /// Model identifier forwarded to the provider.
    pub model: Option<String>,
}

impl Default for HealOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            model: None,
        }
    }
}

impl HealOptions {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Drives the self-healing loop over the automation executor boundary.
///
/// Each run exclusively owns its failure-history accumulator; concurrent
/// runs never share one. Healing failure is a return value carrying the
/// complete history, never an error; `Err` is reserved for an unreachable
/// model provider.
pub struct SelfHealer {
    analyzer: FailureAnalyzer,
    engine: RefinementEngine,
    cancelled: AtomicBool,
}

impl SelfHealer {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self::with_config(provider, RefinementConfig::default())
    }

    pub fn with_config(provider: Arc<dyn LlmProvider>, config: RefinementConfig) -> Self {
        Self {
            analyzer: FailureAnalyzer::new(),
            engine: RefinementEngine::new(provider, config),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Request cooperative cancellation.
    ///
    /// Checked between round trips only; there is no mid-call cancellation
    /// contract.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run the healing loop for one test.
    ///
    /// Per attempt: parse the current content into commands, invoke the
    /// caller-supplied executor; on success terminate successfully, on
    /// failure analyze, append to history, refine the content, and retry.
    /// Reaching `max_attempts` without success returns a failure result
    /// carrying the full history.
    pub async fn heal<E>(
        &self,
        test_content: &str,
        test_id: TestId,
        mut execute_fn: E,
        options: &HealOptions,
        observer: Option<&dyn SurfaceObserver>,
    ) -> Result<SelfHealingResult, SynthError>
    where
        E: FnMut(&[CandidateCommand]) -> ExecuteFuture,
    {
        let start = Instant::now();
        let mut content = test_content.to_string();
        let mut history: Vec<FailureContext> = Vec::new();
        let mut state = HealState::Ready;
        let mut attempts = 0;
        debug!(test_id = %test_id, max_attempts = options.max_attempts, state = ?state, "healing run starting");

        for attempt in 1..=options.max_attempts {
            attempts = attempt;
            state = HealState::Executing;
            debug!(test_id = %test_id, attempt, state = ?state, "executing command sequence");

            let commands = parse_command_sequence(&content);
            let failure = match commands {
                Some(ref commands) => execute_fn(commands).await.err(),
                None => Some(crate::surface::ExecutionFailure::new(
                    None,
                    "test content is not a parseable command sequence",
                )),
            };

            let Some(failure) = failure else {
                state = HealState::Succeeded;
                info!(test_id = %test_id, attempt, state = ?state, "healing run succeeded");
                return Ok(SelfHealingResult::succeeded(
                    attempt,
                    content,
                    commands.unwrap_or_default(),
                    history,
                    elapsed_ms(start),
                ));
            };

            state = HealState::AnalyzingFailure;
            debug!(test_id = %test_id, attempt, state = ?state, error = %failure.error, "attempt failed");
            let failed_command = failure
                .command_index
                .and_then(|index| commands.as_ref().and_then(|commands| commands.get(index)));
            let context = self
                .analyzer
                .analyze(&test_id, failed_command, &failure.error, observer)
                .await;
            history.push(context);

            if attempt == options.max_attempts {
                break;
            }
            if self.is_cancelled() {
                warn!(test_id = %test_id, attempt, "healing cancelled between round trips");
                break;
            }

            state = HealState::Refining;
            debug!(test_id = %test_id, attempt, state = ?state, "refining test content");
            let (latest, prior) = history.split_last().expect("history is non-empty");
            content = self.engine.refine(&content, latest, prior).await?;
        }

        state = HealState::Exhausted;
        info!(
            test_id = %test_id,
            attempts,
            failures = history.len(),
            state = ?state,
            "healing run exhausted"
        );
        let final_commands = parse_command_sequence(&content).unwrap_or_default();
        Ok(SelfHealingResult::exhausted(
            attempts,
            content,
            final_commands,
            history,
            elapsed_ms(start),
        ))
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
