//! Execution-time self-healing: failure analysis, test refinement, and the
//! orchestrating retry loop.
//!
//! Distinct from pre-execution validation: this cycle runs against real
//! executor failures and rewrites the whole command sequence, while the
//! synthesis pipeline repairs single candidates before anything runs.

pub mod analyzer;
pub mod orchestrator;
pub mod refine;

pub use analyzer::{classify_failure, rank_locators, FailureAnalyzer};
pub use orchestrator::{HealOptions, HealState, SelfHealer};
pub use refine::{RefinementConfig, RefinementEngine};
