//! Failure Analyzer: structured context capture after a real execution failure.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::model::{CandidateCommand, FailureCategory, FailureContext, TestId};
use crate::surface::SurfaceObserver;

static LOCATOR_NOT_FOUND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(not found|no such element|unable to locate|no element|could not find|selector .* failed)")
        .expect("locator-not-found regex")
});
static TIMEOUT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(timed? ?out|timeout|deadline exceeded)").expect("timeout regex"));
static ASSERTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(assert|expected .* (but|got)|mismatch)").expect("assertion regex")
});

/// Captures failure context immediately after an execution failure.
///
/// Analysis never fails: every probe of the live surface is optional and
/// degrades to `None` when the backend cannot supply it.
#[derive(Debug, Clone, Default)]
pub struct FailureAnalyzer;

impl FailureAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Build a failure context from the error, the failing command, and
    /// whatever the live surface can still provide.
    pub async fn analyze(
        &self,
        test_id: &TestId,
        failed_command: Option<&CandidateCommand>,
        error: &str,
        observer: Option<&dyn SurfaceObserver>,
    ) -> FailureContext {
        let category = classify_failure(error);
        debug!(test_id = %test_id, category = category.name(), "analyzing execution failure");

        let (screenshot, snapshot, ranked_locators) = match observer {
            Some(observer) => {
                let screenshot = observer.screenshot_base64().await.unwrap_or_else(|err| {
                    warn!(error = %err, "screenshot capture failed during analysis");
                    None
                });
                let snapshot = match observer.simplified_snapshot().await {
                    Ok(snapshot) => Some(snapshot),
                    Err(err) => {
                        warn!(error = %err, "snapshot capture failed during analysis");
                        None
                    }
                };
                let locators = observer.available_locators().await.unwrap_or_else(|err| {
                    warn!(error = %err, "locator enumeration failed during analysis");
                    Vec::new()
                });
                (screenshot, snapshot, rank_locators(locators))
            }
            None => (None, None, Vec::new()),
        };

        FailureContext {
            test_id: test_id.clone(),
            error: error.to_string(),
            failed_command: failed_command.cloned(),
            category,
            screenshot,
            snapshot,
            ranked_locators,
            timestamp: Utc::now(),
        }
    }
}

/// Classify an execution failure from its error text.
pub fn classify_failure(error: &str) -> FailureCategory {
    if LOCATOR_NOT_FOUND_RE.is_match(error) {
        FailureCategory::LocatorNotFound
    } else if TIMEOUT_RE.is_match(error) {
        FailureCategory::Timeout
    } else if ASSERTION_RE.is_match(error) {
        FailureCategory::AssertionMismatch
    } else {
        FailureCategory::Unknown
    }
}

/// Stability class of a selector string; lower is more durable.
///
/// Ordering biases refinement toward selectors that survive page changes:
/// explicit test identifiers outlive accessibility labels, which outlive
/// ids, which outlive semantic class names, which outlive generic ones.
fn stability_class(locator: &str) -> u8 {
    let lower = locator.to_lowercase();
    if lower.contains("data-testid")
        || lower.contains("data-test")
        || lower.contains("data-cy")
        || lower.contains("data-qa")
    {
        0
    } else if lower.contains("aria-label") || lower.contains("aria-labelledby") {
        1
    } else if lower.starts_with('#') || lower.contains("id=") {
        2
    } else if lower.starts_with('.') && has_semantic_word(&lower) {
        3
    } else if lower.starts_with('.') {
        4
    } else {
        5
    }
}

/// Whether a class selector carries recognizable UI meaning.
fn has_semantic_word(selector: &str) -> bool {
    const SEMANTIC_WORDS: &[&str] = &[
        "nav", "menu", "btn", "button", "submit", "login", "logout", "signin", "signup", "search",
        "header", "footer", "logo", "title", "link", "input", "field", "form", "card", "modal",
        "dialog", "tab", "dropdown", "checkbox", "toggle",
    ];
    selector
        .trim_start_matches('.')
        .split(['-', '_', '.'])
        .any(|word| SEMANTIC_WORDS.contains(&word))
}

/// Order available locators by stability, most durable first.
///
/// The sort is stable, so input order is preserved within a class.
pub fn rank_locators(mut locators: Vec<String>) -> Vec<String> {
    locators.sort_by_key(|locator| stability_class(locator));
    locators
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandAction, Locator};
    use crate::surface::StaticSurface;

    #[test]
    fn test_classify_failure_categories() {
        assert_eq!(
            classify_failure("selector not found: .logo"),
            FailureCategory::LocatorNotFound
        );
        assert_eq!(
            classify_failure("Unable to locate element #submit"),
            FailureCategory::LocatorNotFound
        );
        assert_eq!(
            classify_failure("navigation timed out after 30000ms"),
            FailureCategory::Timeout
        );
        assert_eq!(
            classify_failure("assertion failed: expected 'Welcome' but got 'Error'"),
            FailureCategory::AssertionMismatch
        );
        assert_eq!(
            classify_failure("connection reset by peer"),
            FailureCategory::Unknown
        );
    }

    #[test]
    fn test_rank_locators_by_stability() {
        let ranked = rank_locators(vec![
            ".wrapper".to_string(),
            ".site-logo".to_string(),
            "#main".to_string(),
            "[aria-label=\"Close\"]".to_string(),
            "[data-testid=\"logo\"]".to_string(),
        ]);
        assert_eq!(
            ranked,
            vec![
                "[data-testid=\"logo\"]",
                "[aria-label=\"Close\"]",
                "#main",
                ".site-logo",
                ".wrapper",
            ]
        );
    }

    #[test]
    fn test_rank_locators_stable_within_class() {
        let ranked = rank_locators(vec![
            "[data-testid=\"a\"]".to_string(),
            "[data-testid=\"b\"]".to_string(),
        ]);
        assert_eq!(ranked[0], "[data-testid=\"a\"]");
        assert_eq!(ranked[1], "[data-testid=\"b\"]");
    }

    #[tokio::test]
    async fn test_analyze_with_observer() {
        let analyzer = FailureAnalyzer::new();
        let observer = StaticSurface::new("<div class=\"site-logo\">")
            .with_locators([".site-logo", "[data-testid=\"logo\"]"])
            .with_screenshot("aGVsbG8=");
        let command =
            CandidateCommand::new(CommandAction::Click).with_locator(Locator::parse(".logo"));

        let context = analyzer
            .analyze(
                &TestId::from("t1"),
                Some(&command),
                "selector not found: .logo",
                Some(&observer),
            )
            .await;

        assert_eq!(context.category, FailureCategory::LocatorNotFound);
        assert_eq!(context.ranked_locators[0], "[data-testid=\"logo\"]");
        assert!(context.snapshot.is_some());
        assert!(context.screenshot.is_some());
        assert_eq!(context.failed_command, Some(command));
    }

    #[tokio::test]
    async fn test_analyze_without_observer_degrades() {
        let analyzer = FailureAnalyzer::new();
        let context = analyzer
            .analyze(&TestId::from("t1"), None, "weird failure", None)
            .await;
        assert_eq!(context.category, FailureCategory::Unknown);
        assert!(context.snapshot.is_none());
        assert!(context.ranked_locators.is_empty());
    }
}
