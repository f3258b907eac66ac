//! Command Validator: pure, synchronous locator checks against a snapshot.
//!
//! Dispatch across locator strategies is a tagged variant with one matcher
//! per tag; adding a strategy adds one variant and one matcher. Never
//! performs I/O and never mutates its input.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{
    CandidateCommand, IssueKind, Locator, LocatorStrategy, Validation, ValidationIssue,
};

static CLASS_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"class="([^"]*)""#).expect("class attribute regex"));
static PLACEHOLDER_ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"placeholder="([^"]*)""#).expect("placeholder attribute regex"));
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

/// Policy exempting state-dependent targets from the not-found check.
///
/// Some targets are only rendered after earlier steps mutate page state
/// (password fields behind a login menu, hidden inputs). Because the
/// snapshot is captured before any step executes, rejecting those commands
/// would discard structurally correct work; their existence check is
/// deferred to execution time instead. The marker list is heuristic and
/// deliberately configurable.
#[derive(Debug, Clone)]
pub struct DeferralPolicy {
    /// Lowercase substrings that mark a locator as state-dependent.
    pub markers: Vec<String>,
}

impl Default for DeferralPolicy {
    fn default() -> Self {
        Self {
            markers: vec!["password".to_string(), "hidden".to_string()],
        }
    }
}

impl DeferralPolicy {
    pub fn new(markers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            markers: markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Never defer anything; every not-found is reported.
    pub fn none() -> Self {
        Self {
            markers: Vec::new(),
        }
    }

    /// Whether the not-found check for this command is deferred to execution.
    pub fn defers(&self, command: &CandidateCommand) -> bool {
        let Some(ref locator) = command.locator else {
            return false;
        };
        let value = locator.value.to_lowercase();
        self.markers.iter().any(|marker| value.contains(marker))
    }
}

/// Validates candidate commands against page snapshots.
#[derive(Debug, Clone, Default)]
pub struct CommandValidator {
    policy: DeferralPolicy,
}

impl CommandValidator {
    pub fn new(policy: DeferralPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DeferralPolicy {
        &self.policy
    }

    /// Check a candidate's locator against the snapshot.
    pub fn validate(&self, command: &CandidateCommand, snapshot: &str) -> Validation {
        validate(command, snapshot, &self.policy)
    }
}

/// Check a candidate's locator against the snapshot.
///
/// Absence and ambiguity are distinct issues: a locator matching zero
/// elements is `not-found` (unless deferred by policy), one matching more
/// than one disjoint element is `ambiguous`.
pub fn validate(command: &CandidateCommand, snapshot: &str, policy: &DeferralPolicy) -> Validation {
    let mut issues = Vec::new();

    let Some(ref locator) = command.locator else {
        if command.action.requires_locator() {
            issues.push(ValidationIssue::malformed(format!(
                "action '{}' requires a locator",
                command.action.name()
            )));
        }
        return finish(issues);
    };

    if locator.value.trim().is_empty() {
        issues.push(ValidationIssue::malformed(format!(
            "{} locator has an empty value",
            locator.strategy.name()
        )));
        return finish(issues);
    }

    match count_matches(locator, snapshot) {
        MatchCount::Deferred => {}
        MatchCount::Malformed(message) => issues.push(ValidationIssue {
            kind: IssueKind::Malformed,
            message,
        }),
        MatchCount::Elements(0) => {
            if !policy.defers(command) {
                issues.push(ValidationIssue::not_found(format!(
                    "locator {locator} matches nothing in the snapshot"
                )));
            }
        }
        MatchCount::Elements(1) => {}
        MatchCount::Elements(n) => issues.push(ValidationIssue::ambiguous(format!(
            "locator {locator} matches {n} disjoint elements"
        ))),
    }

    finish(issues)
}

fn finish(issues: Vec<ValidationIssue>) -> Validation {
    if issues.is_empty() {
        Validation::ok()
    } else {
        Validation::rejected(issues)
    }
}

enum MatchCount {
    /// Number of disjoint elements the locator matched.
    Elements(usize),
    /// Existence check cannot be decided from a text snapshot.
    Deferred,
    /// The locator itself is structurally invalid.
    Malformed(String),
}

fn count_matches(locator: &Locator, snapshot: &str) -> MatchCount {
    match locator.strategy {
        LocatorStrategy::Class => MatchCount::Elements(match_class(&locator.value, snapshot)),
        LocatorStrategy::Id => MatchCount::Elements(match_exact_attribute("id", &locator.value, snapshot)),
        LocatorStrategy::Attribute => match_attribute(&locator.value, snapshot),
        LocatorStrategy::Text => MatchCount::Elements(match_text(&locator.value, snapshot)),
        LocatorStrategy::Placeholder => {
            MatchCount::Elements(match_placeholder(&locator.value, snapshot))
        }
        LocatorStrategy::Role => {
            MatchCount::Elements(match_exact_attribute("role", &locator.value, snapshot))
        }
        LocatorStrategy::XPath => match_xpath_shape(&locator.value),
    }
}

/// Count class attributes containing the value as a whole token.
///
/// Token match avoids partial-name false positives: `.btn` must not match
/// an element whose only class is `btn-large`.
fn match_class(value: &str, snapshot: &str) -> usize {
    CLASS_ATTR_RE
        .captures_iter(snapshot)
        .filter(|captures| {
            captures[1]
                .split_whitespace()
                .any(|token| token == value)
        })
        .count()
}

/// Count exact `name="value"` attribute occurrences.
fn match_exact_attribute(name: &str, value: &str, snapshot: &str) -> usize {
    let needle = format!("{name}=\"{value}\"");
    snapshot.matches(&needle).count()
}

/// Parse a bracket-inner attribute expression and count its occurrences.
///
/// `[name="x"]` is matched against `name="x"` occurring anywhere in the
/// snapshot, not the literal bracketed string. Bare `[hidden]` style
/// attributes match the attribute name alone.
fn match_attribute(inner: &str, snapshot: &str) -> MatchCount {
    let inner = inner.trim();
    let (name, value) = match inner.split_once('=') {
        Some((name, value)) => (name.trim(), Some(value.trim().trim_matches(['"', '\'']))),
        None => (inner, None),
    };

    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return MatchCount::Malformed(format!("invalid attribute selector [{inner}]"));
    }

    let count = match value {
        Some(value) => match_exact_attribute(name, value, snapshot),
        None => {
            // Attribute presence, with or without a value.
            Regex::new(&format!(r#"\b{}(=|[\s>])"#, regex::escape(name)))
                .map(|re| re.find_iter(snapshot).count())
                .unwrap_or(0)
        }
    };
    MatchCount::Elements(count)
}

/// Count disjoint text segments containing the value as a substring.
///
/// The snapshot is split at tag boundaries so each segment approximates
/// one element's visible text.
fn match_text(value: &str, snapshot: &str) -> usize {
    let needle = value.trim();
    if needle.is_empty() {
        return 0;
    }
    TAG_RE
        .split(snapshot)
        .filter(|segment| segment.contains(needle))
        .count()
}

/// Count placeholder attributes whose value contains the target.
fn match_placeholder(value: &str, snapshot: &str) -> usize {
    let needle = value.trim();
    PLACEHOLDER_ATTR_RE
        .captures_iter(snapshot)
        .filter(|captures| captures[1].contains(needle))
        .count()
}

/// XPath existence cannot be checked against a text snapshot; only the
/// expression shape is validated here, the rest is deferred to execution.
fn match_xpath_shape(value: &str) -> MatchCount {
    let trimmed = value.trim();
    if trimmed.starts_with('/') || trimmed.starts_with("(/") {
        MatchCount::Deferred
    } else {
        MatchCount::Malformed(format!("xpath expression must start with '/': {trimmed}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommandAction;

    fn click(selector: &str) -> CandidateCommand {
        CandidateCommand::new(CommandAction::Click).with_locator(Locator::parse(selector))
    }

    const SNAPSHOT: &str = r#"
<header class="top-nav">
  <img class="site-logo brand" data-testid="logo" alt="Acme">
  <button class="btn-large" id="login">Log in</button>
</header>
<form>
  <input type="text" name="email" placeholder="Email address">
  <span>Log in</span>
</form>
"#;

    #[test]
    fn test_class_token_no_partial_match() {
        // `.btn` must not match an element whose only class is `btn-large`.
        let result = validate(&click(".btn"), SNAPSHOT, &DeferralPolicy::none());
        assert!(!result.valid);
        assert_eq!(result.issues[0].kind, IssueKind::NotFound);

        let result = validate(&click(".btn-large"), SNAPSHOT, &DeferralPolicy::none());
        assert!(result.valid);

        let result = validate(&click(".site-logo"), SNAPSHOT, &DeferralPolicy::none());
        assert!(result.valid);
    }

    #[test]
    fn test_id_exact_match() {
        assert!(validate(&click("#login"), SNAPSHOT, &DeferralPolicy::none()).valid);
        let result = validate(&click("#log"), SNAPSHOT, &DeferralPolicy::none());
        assert!(!result.valid);
        assert_eq!(result.issues[0].kind, IssueKind::NotFound);
    }

    #[test]
    fn test_attribute_matches_without_brackets() {
        // `[name="email"]` matches `name="email"` in the snapshot even though
        // the literal bracketed string never occurs.
        let result = validate(&click("[name=\"email\"]"), SNAPSHOT, &DeferralPolicy::none());
        assert!(result.valid);

        let result = validate(&click("[name=\"missing\"]"), SNAPSHOT, &DeferralPolicy::none());
        assert!(!result.valid);
        assert_eq!(result.issues[0].kind, IssueKind::NotFound);
    }

    #[test]
    fn test_attribute_presence_only() {
        let result = validate(
            &click("[data-testid=\"logo\"]"),
            SNAPSHOT,
            &DeferralPolicy::none(),
        );
        assert!(result.valid);

        let result = validate(&click("[placeholder]"), SNAPSHOT, &DeferralPolicy::none());
        assert!(result.valid);
    }

    #[test]
    fn test_text_ambiguity_distinct_from_absence() {
        // "Log in" appears in two disjoint elements.
        let result = validate(&click("text=Log in"), SNAPSHOT, &DeferralPolicy::none());
        assert!(!result.valid);
        assert_eq!(result.issues[0].kind, IssueKind::Ambiguous);

        let result = validate(&click("text=Sign out"), SNAPSHOT, &DeferralPolicy::none());
        assert_eq!(result.issues[0].kind, IssueKind::NotFound);

        let result = validate(&click("text=Acme"), SNAPSHOT, &DeferralPolicy::none());
        assert!(result.valid);
    }

    #[test]
    fn test_placeholder_match() {
        let result = validate(
            &click("placeholder=Email"),
            SNAPSHOT,
            &DeferralPolicy::none(),
        );
        assert!(result.valid);
    }

    #[test]
    fn test_deferral_policy_exempts_not_found() {
        let command = CandidateCommand::new(CommandAction::TypeText)
            .with_locator(Locator::parse("#password"))
            .with_text("secret");

        let strict = validate(&command, SNAPSHOT, &DeferralPolicy::none());
        assert!(!strict.valid);

        let deferred = validate(&command, SNAPSHOT, &DeferralPolicy::default());
        assert!(deferred.valid);

        // Deferral applies only to absence; a malformed command stays malformed.
        let custom = DeferralPolicy::new(["modal"]);
        assert!(!custom.defers(&command));
    }

    #[test]
    fn test_missing_locator_is_malformed_for_element_actions() {
        let command = CandidateCommand::new(CommandAction::Click);
        let result = validate(&command, SNAPSHOT, &DeferralPolicy::default());
        assert!(!result.valid);
        assert_eq!(result.issues[0].kind, IssueKind::Malformed);

        // Locator-free actions are fine.
        let wait = CandidateCommand::noop_wait();
        assert!(validate(&wait, SNAPSHOT, &DeferralPolicy::default()).valid);
    }

    #[test]
    fn test_xpath_shape_only() {
        assert!(validate(&click("//button[@id='login']"), SNAPSHOT, &DeferralPolicy::none()).valid);

        let result = validate(&click("xpath=button"), SNAPSHOT, &DeferralPolicy::none());
        assert!(!result.valid);
        assert_eq!(result.issues[0].kind, IssueKind::Malformed);
    }

    #[test]
    fn test_validate_never_mutates_input() {
        let command = click(".btn");
        let before = command.clone();
        let _ = validate(&command, SNAPSHOT, &DeferralPolicy::default());
        assert_eq!(command, before);
    }
}
