//! LLM-driven command synthesis and self-healing validation for web automation.
//!
//! Turns a natural-language task instruction into a validated sequence of
//! browser-automation commands ([`Pipeline::decompose`]), and repairs a
//! command sequence from real execution feedback ([`SelfHealer::heal`]).
//! Browser primitives, the model wire protocol, and any CLI or report
//! surface live in external collaborators.

pub mod errors;
pub mod healing;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod planner;
pub mod prompt;
pub mod refiner;
pub mod surface;
pub mod synthesizer;
pub mod validator;

pub use errors::SynthError;
pub use healing::{FailureAnalyzer, HealOptions, HealState, RefinementEngine, SelfHealer};
pub use llm::{GenerateRequest, GenerateResponse, LlmProvider, MockLlmProvider, ScriptedProvider};
pub use model::{
    AttemptRecord, CandidateCommand, CommandAction, CommandParams, FailureCategory,
    FailureContext, IssueKind, Locator, LocatorStrategy, SelfHealingResult, Step, StepAttempts,
    TestId, Validation, ValidationIssue,
};
pub use pipeline::{DecomposeOutcome, Pipeline, PipelineConfig};
pub use planner::{Planner, PlannerConfig};
pub use refiner::{Refiner, RefinerConfig};
pub use surface::{ExecuteFuture, ExecutionFailure, StaticSurface, SurfaceObserver};
pub use synthesizer::{Synthesizer, SynthesizerConfig};
pub use validator::{validate, CommandValidator, DeferralPolicy};
