//! Composed synthesis pipeline: plan, then generate/validate/refine per step.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::SynthError;
use crate::llm::LlmProvider;
use crate::model::{AttemptRecord, CandidateCommand, Step, StepAttempts};
use crate::planner::{Planner, PlannerConfig};
use crate::refiner::{Refiner, RefinerConfig};
use crate::surface::SurfaceObserver;
use crate::synthesizer::{Synthesizer, SynthesizerConfig};
use crate::validator::{CommandValidator, DeferralPolicy};

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Per-step refinement ceiling, counting the initial synthesis attempt.
    pub max_attempts: u32,
    /// Character bound applied to snapshots embedded in prompts.
    pub snapshot_limit: usize,
    /// Model identifier forwarded to the provider.
    pub model: Option<String>,
    /// Not-found deferral policy for state-dependent targets.
    pub deferral: DeferralPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            snapshot_limit: 4_000,
            model: None,
            deferral: DeferralPolicy::default(),
        }
    }
}

impl PipelineConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_deferral(mut self, deferral: DeferralPolicy) -> Self {
        self.deferral = deferral;
        self
    }
}

/// Outcome of decomposing one instruction.
#[derive(Debug, Clone)]
pub struct DecomposeOutcome {
    /// The plan the commands were synthesized from.
    pub steps: Vec<Step>,
    /// One accepted command per step, in plan order.
    pub commands: Vec<CandidateCommand>,
    /// Full attempt history per step, for diagnostics.
    pub attempts: Vec<StepAttempts>,
}

/// Turns an instruction into a validated command sequence.
///
/// The snapshot is captured once, before synthesis; it is not refreshed
/// between steps, which is why the validator's deferral policy exists.
pub struct Pipeline {
    planner: Planner,
    synthesizer: Synthesizer,
    refiner: Refiner,
    validator: CommandValidator,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(provider: Arc<dyn LlmProvider>, config: PipelineConfig) -> Self {
        let planner = Planner::new(
            provider.clone(),
            PlannerConfig {
                model: config.model.clone(),
                ..PlannerConfig::default()
            },
        );
        let synthesizer = Synthesizer::new(
            provider.clone(),
            SynthesizerConfig {
                model: config.model.clone(),
                snapshot_limit: config.snapshot_limit,
            },
        );
        let refiner = Refiner::new(
            provider,
            RefinerConfig {
                model: config.model.clone(),
                snapshot_limit: config.snapshot_limit,
            },
        );
        let validator = CommandValidator::new(config.deferral.clone());
        Self {
            planner,
            synthesizer,
            refiner,
            validator,
            config,
        }
    }

    /// Decompose an instruction into a validated command sequence.
    ///
    /// Per step the loop runs generate → validate → refine → validate …
    /// up to `max_attempts`; on exhaustion the last candidate is accepted
    /// best-effort so the pipeline never blocks indefinitely.
    pub async fn decompose(
        &self,
        instruction: &str,
        observer: &dyn SurfaceObserver,
    ) -> Result<DecomposeOutcome, SynthError> {
        let steps = self.planner.create_plan(instruction).await?;
        let snapshot = observer.simplified_snapshot().await?;
        info!(step_count = steps.len(), "decomposing instruction");

        let mut commands = Vec::with_capacity(steps.len());
        let mut attempts = Vec::with_capacity(steps.len());

        for step in &steps {
            let step_attempts = self
                .synthesize_step(step, instruction, &snapshot)
                .await?;
            let accepted = step_attempts
                .accepted_command()
                .cloned()
                .unwrap_or_else(CandidateCommand::noop_wait);
            commands.push(accepted);
            attempts.push(step_attempts);
        }

        Ok(DecomposeOutcome {
            steps,
            commands,
            attempts,
        })
    }

    /// Run the bounded generate/validate/refine loop for one step.
    async fn synthesize_step(
        &self,
        step: &Step,
        instruction: &str,
        snapshot: &str,
    ) -> Result<StepAttempts, SynthError> {
        let mut attempts = StepAttempts::new(step.clone());
        let max_attempts = self.config.max_attempts.max(1);

        let mut candidate = self
            .synthesizer
            .generate_command(step, instruction, snapshot)
            .await?;

        for attempt in 1..=max_attempts {
            let validation = self.validator.validate(&candidate, snapshot);
            let is_last = attempt == max_attempts;

            if validation.valid {
                attempts.records.push(AttemptRecord {
                    attempt,
                    command: candidate,
                    issues: validation.issues,
                    accepted: true,
                });
                return Ok(attempts);
            }

            debug!(
                step = step.index,
                attempt,
                issues = validation.issues.len(),
                "candidate rejected"
            );
            attempts.records.push(AttemptRecord {
                attempt,
                command: candidate.clone(),
                issues: validation.issues.clone(),
                // Exhaustion degrades to best-effort acceptance of the last candidate.
                accepted: is_last,
            });

            if is_last {
                warn!(
                    step = step.index,
                    "refinement attempts exhausted, accepting last candidate best-effort"
                );
                break;
            }

            candidate = self
                .refiner
                .refine(
                    step,
                    instruction,
                    &candidate,
                    &validation.issues,
                    snapshot,
                    &attempts.records,
                )
                .await?;
        }

        Ok(attempts)
    }
}
