//! Core data model shared across the synthesis and healing pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for a test or healing run assigned by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestId(pub String);

impl TestId {
    /// Create a fresh random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TestId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for TestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One atomic instruction produced by the plan generator.
///
/// Steps are produced once per instruction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Zero-based position within the plan.
    pub index: usize,
    /// Natural-language description of the single action.
    pub text: String,
}

impl Step {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }
}

/// Locator strategy enumeration.
///
/// One matcher per tag in the validator; adding a strategy adds one
/// variant and one matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// Class-attribute token match (`.btn`).
    Class,
    /// Exact id-attribute match (`#main`).
    Id,
    /// Arbitrary attribute match (`[name="email"]`).
    Attribute,
    /// Visible-text substring match.
    Text,
    /// Placeholder-attribute match.
    Placeholder,
    /// ARIA role match.
    Role,
    /// XPath expression; existence deferred to execution time.
    XPath,
}

impl LocatorStrategy {
    /// Get strategy name as string.
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Class => "class",
            LocatorStrategy::Id => "id",
            LocatorStrategy::Attribute => "attribute",
            LocatorStrategy::Text => "text",
            LocatorStrategy::Placeholder => "placeholder",
            LocatorStrategy::Role => "role",
            LocatorStrategy::XPath => "xpath",
        }
    }
}

/// A (strategy, value) pair identifying a target element on a live surface.
///
/// For `Class`/`Id` the value excludes the sigil (`btn`, not `.btn`). For
/// `Attribute` the value is the bracket-inner expression (`name="email"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: LocatorStrategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: LocatorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// Parse a selector string into a locator.
    ///
    /// Accepts the common selector spellings the model emits: `.class`,
    /// `#id`, `[attr="value"]`, `text=...`, `placeholder=...`, `role=...`,
    /// XPath expressions, and an optional `css=` prefix. Bare words are
    /// treated as visible-text matches.
    pub fn parse(selector: &str) -> Self {
        let trimmed = selector.trim();
        let trimmed = trimmed.strip_prefix("css=").unwrap_or(trimmed).trim();

        if let Some(rest) = trimmed.strip_prefix("xpath=") {
            return Self::new(LocatorStrategy::XPath, rest);
        }
        if trimmed.starts_with("//") || trimmed.starts_with("(//") {
            return Self::new(LocatorStrategy::XPath, trimmed);
        }
        if let Some(rest) = trimmed.strip_prefix('.') {
            return Self::new(LocatorStrategy::Class, rest);
        }
        if let Some(rest) = trimmed.strip_prefix('#') {
            return Self::new(LocatorStrategy::Id, rest);
        }
        if trimmed.starts_with('[') && trimmed.ends_with(']') {
            return Self::new(LocatorStrategy::Attribute, &trimmed[1..trimmed.len() - 1]);
        }
        if let Some(rest) = trimmed.strip_prefix("text=") {
            return Self::new(LocatorStrategy::Text, rest);
        }
        if let Some(rest) = trimmed.strip_prefix("placeholder=") {
            return Self::new(LocatorStrategy::Placeholder, rest);
        }
        if let Some(rest) = trimmed.strip_prefix("role=") {
            return Self::new(LocatorStrategy::Role, rest);
        }

        Self::new(LocatorStrategy::Text, trimmed)
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.strategy {
            LocatorStrategy::Class => write!(f, ".{}", self.value),
            LocatorStrategy::Id => write!(f, "#{}", self.value),
            LocatorStrategy::Attribute => write!(f, "[{}]", self.value),
            LocatorStrategy::Text => write!(f, "text={}", self.value),
            LocatorStrategy::Placeholder => write!(f, "placeholder={}", self.value),
            LocatorStrategy::Role => write!(f, "role={}", self.value),
            LocatorStrategy::XPath => f.write_str(&self.value),
        }
    }
}

/// Kind of automation command the synthesizer may emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CommandAction {
    Click,
    TypeText,
    Select,
    Navigate,
    Wait,
    AssertText,
    Press,
    /// Any action name this core does not interpret; passed through to the executor.
    Custom(String),
}

impl CommandAction {
    pub fn name(&self) -> &str {
        match self {
            CommandAction::Click => "click",
            CommandAction::TypeText => "type_text",
            CommandAction::Select => "select",
            CommandAction::Navigate => "navigate",
            CommandAction::Wait => "wait",
            CommandAction::AssertText => "assert_text",
            CommandAction::Press => "press",
            CommandAction::Custom(name) => name,
        }
    }

    /// Whether this action targets an element and therefore needs a locator.
    pub fn requires_locator(&self) -> bool {
        matches!(
            self,
            CommandAction::Click
                | CommandAction::TypeText
                | CommandAction::Select
                | CommandAction::AssertText
        )
    }
}

impl From<String> for CommandAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "click" => CommandAction::Click,
            "type_text" | "type" | "input_text" | "fill" => CommandAction::TypeText,
            "select" | "select_option" => CommandAction::Select,
            "navigate" | "goto" | "go_to_url" => CommandAction::Navigate,
            "wait" | "sleep" => CommandAction::Wait,
            "assert_text" | "assert" => CommandAction::AssertText,
            "press" | "press_key" => CommandAction::Press,
            _ => CommandAction::Custom(value),
        }
    }
}

impl From<CommandAction> for String {
    fn from(action: CommandAction) -> Self {
        action.name().to_string()
    }
}

/// Free-form parameters attached to a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandParams {
    /// Text to type or assert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Navigation target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Wait duration in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ms: Option<u64>,
    /// Option value for selects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Key name for press actions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

/// A synthesized automation instruction with its target locator.
///
/// Candidates are replaced, never mutated, on each refinement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateCommand {
    pub action: CommandAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<Locator>,
    #[serde(default)]
    pub params: CommandParams,
    /// Optional alternative locator tried by the executor when the primary misses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_locator: Option<Locator>,
}

impl CandidateCommand {
    pub fn new(action: CommandAction) -> Self {
        Self {
            action,
            locator: None,
            params: CommandParams::default(),
            fallback_locator: None,
        }
    }

    pub fn with_locator(mut self, locator: Locator) -> Self {
        self.locator = Some(locator);
        self
    }

    pub fn with_fallback(mut self, locator: Locator) -> Self {
        self.fallback_locator = Some(locator);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.params.text = Some(text.into());
        self
    }

    /// The safe no-op used when the model response cannot be parsed:
    /// a zero-duration wait always executes successfully.
    pub fn noop_wait() -> Self {
        let mut command = Self::new(CommandAction::Wait);
        command.params.ms = Some(0);
        command
    }

    /// One-line rendering for prompts and logs.
    pub fn describe(&self) -> String {
        let mut parts = vec![self.action.name().to_string()];
        if let Some(ref locator) = self.locator {
            parts.push(locator.to_string());
        }
        if let Some(ref text) = self.params.text {
            parts.push(format!("text={text:?}"));
        }
        if let Some(ref url) = self.params.url {
            parts.push(format!("url={url}"));
        }
        if let Some(ms) = self.params.ms {
            parts.push(format!("ms={ms}"));
        }
        if let Some(ref value) = self.params.value {
            parts.push(format!("value={value:?}"));
        }
        if let Some(ref key) = self.params.key {
            parts.push(format!("key={key}"));
        }
        parts.join(" ")
    }
}

/// Kind of validation issue raised against a candidate command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The locator matches nothing in the snapshot.
    NotFound,
    /// The locator matches more than one disjoint element.
    Ambiguous,
    /// The command or locator is structurally invalid.
    Malformed,
}

impl IssueKind {
    pub fn name(&self) -> &'static str {
        match self {
            IssueKind::NotFound => "not-found",
            IssueKind::Ambiguous => "ambiguous",
            IssueKind::Malformed => "malformed",
        }
    }
}

/// A single problem the validator found with a candidate.
///
/// Transient: issues live for one attempt and are replaced on the next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl ValidationIssue {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::NotFound,
            message: message.into(),
        }
    }

    pub fn ambiguous(message: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Ambiguous,
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: IssueKind::Malformed,
            message: message.into(),
        }
    }
}

/// Outcome of validating one candidate against one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    pub issues: Vec<ValidationIssue>,
}

impl Validation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            issues: Vec::new(),
        }
    }

    pub fn rejected(issues: Vec<ValidationIssue>) -> Self {
        Self {
            valid: false,
            issues,
        }
    }
}

/// Append-only record of one synthesis/refinement attempt for a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    pub command: CandidateCommand,
    pub issues: Vec<ValidationIssue>,
    /// Whether this candidate was accepted (validated or best-effort).
    pub accepted: bool,
}

/// All attempts made for a single step, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepAttempts {
    pub step: Step,
    pub records: Vec<AttemptRecord>,
}

impl StepAttempts {
    pub fn new(step: Step) -> Self {
        Self {
            step,
            records: Vec::new(),
        }
    }

    /// The command that was ultimately accepted for this step, if any.
    pub fn accepted_command(&self) -> Option<&CandidateCommand> {
        self.records
            .iter()
            .rev()
            .find(|record| record.accepted)
            .map(|record| &record.command)
    }
}

/// Classification of a real execution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    LocatorNotFound,
    Timeout,
    AssertionMismatch,
    Unknown,
}

impl FailureCategory {
    pub fn name(&self) -> &'static str {
        match self {
            FailureCategory::LocatorNotFound => "locator-not-found",
            FailureCategory::Timeout => "timeout",
            FailureCategory::AssertionMismatch => "assertion-mismatch",
            FailureCategory::Unknown => "unknown",
        }
    }
}

/// Structured context captured immediately after an execution failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureContext {
    pub test_id: TestId,
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_command: Option<CandidateCommand>,
    pub category: FailureCategory,
    /// Base64 screenshot of the surface at failure time, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    /// Simplified snapshot of the surface at failure time, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<String>,
    /// Currently available locators ranked by stability (most durable first).
    #[serde(default)]
    pub ranked_locators: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Terminal outcome of one healing run. Immutable once returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfHealingResult {
    pub success: bool,
    /// Number of execution attempts consumed (never exceeds the ceiling).
    pub attempts: u32,
    /// Test content as of the final attempt.
    pub final_content: String,
    /// Parsed command sequence of the final attempt, when parseable.
    pub final_commands: Vec<CandidateCommand>,
    /// Complete per-run failure history, one entry per failed attempt.
    pub failure_history: Vec<FailureContext>,
    pub total_time_ms: u64,
}

impl SelfHealingResult {
    /// Create a success result.
    pub fn succeeded(
        attempts: u32,
        final_content: String,
        final_commands: Vec<CandidateCommand>,
        failure_history: Vec<FailureContext>,
        total_time_ms: u64,
    ) -> Self {
        Self {
            success: true,
            attempts,
            final_content,
            final_commands,
            failure_history,
            total_time_ms,
        }
    }

    /// Create a failure result carrying the complete history.
    pub fn exhausted(
        attempts: u32,
        final_content: String,
        final_commands: Vec<CandidateCommand>,
        failure_history: Vec<FailureContext>,
        total_time_ms: u64,
    ) -> Self {
        Self {
            success: false,
            attempts,
            final_content,
            final_commands,
            failure_history,
            total_time_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }
}
