//! Prompt templates and formatters for every model round trip.

use crate::model::{AttemptRecord, CandidateCommand, FailureContext, Step, ValidationIssue};

/// System prompt constraining plan output to one atomic action per line.
pub const PLANNER_SYSTEM_PROMPT: &str = r#"You are a web automation planner. Decompose the user's task instruction into an ordered sequence of atomic browser actions.

## Rules
- Output EXACTLY one atomic action per line, in execution order.
- Each line describes a single interaction: click one element, type into one field, navigate once, wait once, or assert one thing.
- Do not number the lines, do not add commentary, do not wrap the output in code fences.
- Prefer small steps: opening a menu and clicking an entry inside it are two steps.

## Example
Task: "Log in with user alice"
Output:
Click the login menu button
Type "alice" into the username field
Type the password into the password field
Click the sign-in button
"#;

/// System prompt for per-step command synthesis.
pub const SYNTHESIZER_SYSTEM_PROMPT: &str = r##"You are a web automation command generator. Given one plan step and a simplified snapshot of the current page, emit the single command that performs the step.

## Response Format
Respond with ONE JSON object and nothing else:

{"action": "click", "selector": ".submit-btn", "fallback_selector": "text=Submit"}

## Fields
- "action": one of "click", "type_text", "select", "navigate", "wait", "assert_text", "press"
- "selector": target element, using ".class", "#id", "[attr=\"value\"]", "text=...", "placeholder=...", "role=...", or an XPath
- "fallback_selector": optional alternative selector
- "text": text to type or assert
- "url": navigation target
- "ms": wait duration in milliseconds
- "value": option value for select
- "key": key name for press

## Rules
- Use selectors that appear in the snapshot whenever possible.
- Prefer stable selectors: test-id attributes, then accessibility labels, then ids, then specific classes.
- Never invent ids or classes that are not plausibly on the page.
"##;

/// System prompt for issue-driven command refinement.
pub const REFINER_SYSTEM_PROMPT: &str = r#"You are a web automation command repairer. A generated command was rejected by validation against the current page snapshot. Produce a corrected command.

## Response Format
Respond with ONE JSON object in the same schema as the original command and nothing else.

## Rules
- Fix the reported issues; do not repeat any previously rejected selector.
- Choose selectors that actually occur in the snapshot.
- Prefer stable selectors: test-id attributes, then accessibility labels, then ids, then specific classes.
- Keep the action kind unless the issue makes it impossible.
"#;

/// System prompt for execution-failure driven test refinement.
pub const HEALING_SYSTEM_PROMPT: &str = r##"You are a web automation test repairer. A test failed during real execution. Using the failure context and the selectors currently available on the page, produce a corrected version of the complete command sequence.

## Response Format
Respond with a JSON array of command objects and nothing else:

[{"action": "click", "selector": "[data-testid=\"login\"]"}, {"action": "type_text", "selector": "#username", "text": "alice"}]

## Rules
- Keep the test's intent; change only what is needed to make it pass.
- Replace failing selectors with the most stable available alternative.
- Do not repeat selectors that already failed in prior attempts.
"##;

/// Formats the user message for plan generation.
pub fn format_plan_prompt(instruction: &str) -> String {
    format!("## Task Instruction\n{instruction}\n")
}

/// Formats the user message for per-step command synthesis.
pub fn format_synthesis_prompt(
    step: &Step,
    instruction: &str,
    snapshot: &str,
    snapshot_limit: usize,
) -> String {
    let mut message = String::new();
    message.push_str("## Overall Task\n");
    message.push_str(instruction);
    message.push_str(&format!(
        "\n\n## Current Step ({} of plan)\n{}\n",
        step.index + 1,
        step.text
    ));
    message.push_str("\n## Page Snapshot\n");
    message.push_str(&truncate_snapshot(snapshot, snapshot_limit));
    message.push('\n');
    message
}

/// Formats the user message for command refinement after validation failure.
pub fn format_refine_prompt(
    step: &Step,
    instruction: &str,
    command: &CandidateCommand,
    issues: &[ValidationIssue],
    snapshot: &str,
    snapshot_limit: usize,
    history: &[AttemptRecord],
) -> String {
    let mut message = String::new();
    message.push_str("## Overall Task\n");
    message.push_str(instruction);
    message.push_str(&format!("\n\n## Step\n{}\n", step.text));

    message.push_str("\n## Rejected Command\n");
    message.push_str(&command.describe());
    message.push('\n');

    message.push_str("\n## Validation Issues\n");
    for issue in issues {
        message.push_str(&format!("- [{}] {}\n", issue.kind.name(), issue.message));
    }

    if !history.is_empty() {
        message.push_str("\n## Previously Rejected Attempts\n");
        for record in history {
            message.push_str(&format!(
                "- attempt {}: {}",
                record.attempt,
                record.command.describe()
            ));
            if let Some(issue) = record.issues.first() {
                message.push_str(&format!(" ({}: {})", issue.kind.name(), issue.message));
            }
            message.push('\n');
        }
    }

    message.push_str("\n## Page Snapshot\n");
    message.push_str(&truncate_snapshot(snapshot, snapshot_limit));
    message.push('\n');
    message
}

/// Formats the user message for execution-failure driven test refinement.
pub fn format_healing_prompt(
    test_content: &str,
    context: &FailureContext,
    prior: &[FailureContext],
) -> String {
    let mut message = String::new();
    message.push_str(&format!("## Test\nid: {}\n", context.test_id));
    message.push_str(&format!("category: {}\n", context.category.name()));
    message.push_str(&format!("error: {}\n", context.error));

    if let Some(ref command) = context.failed_command {
        message.push_str(&format!("failed command: {}\n", command.describe()));
    }

    message.push_str("\n## Current Command Sequence\n");
    message.push_str(test_content);
    message.push('\n');

    if !context.ranked_locators.is_empty() {
        message.push_str("\n## Available Locators (most stable first)\n");
        for locator in &context.ranked_locators {
            message.push_str(&format!("- {locator}\n"));
        }
    }

    if let Some(ref snapshot) = context.snapshot {
        message.push_str("\n## Page Snapshot At Failure\n");
        message.push_str(&truncate_snapshot(snapshot, 4_000));
        message.push('\n');
    }

    if !prior.is_empty() {
        message.push_str("\n## Prior Failed Attempts\n");
        for (index, attempt) in prior.iter().enumerate() {
            message.push_str(&format!(
                "### Attempt {}\ncategory: {}\nerror: {}\n",
                index + 1,
                attempt.category.name(),
                attempt.error
            ));
            if let Some(ref command) = attempt.failed_command {
                message.push_str(&format!("failed command: {}\n", command.describe()));
            }
        }
    }

    message
}

/// Truncate a snapshot to a character bound, char-boundary safe.
pub fn truncate_snapshot(snapshot: &str, max_chars: usize) -> String {
    if snapshot.chars().count() <= max_chars {
        snapshot.to_string()
    } else {
        let truncated: String = snapshot.chars().take(max_chars).collect();
        format!("{truncated}\n[snapshot truncated]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommandAction, Locator, TestId};
    use chrono::Utc;

    #[test]
    fn test_format_synthesis_prompt_contains_parts() {
        let step = Step::new(1, "Click the submit button");
        let message =
            format_synthesis_prompt(&step, "Submit the form", "<button class=\"go\">", 4_000);
        assert!(message.contains("## Overall Task"));
        assert!(message.contains("Submit the form"));
        assert!(message.contains("Current Step (2 of plan)"));
        assert!(message.contains("<button class=\"go\">"));
    }

    #[test]
    fn test_format_refine_prompt_lists_history() {
        let step = Step::new(0, "Click submit");
        let rejected = CandidateCommand::new(CommandAction::Click)
            .with_locator(Locator::parse(".missing"));
        let issues = vec![ValidationIssue::not_found("no .missing in snapshot")];
        let history = vec![AttemptRecord {
            attempt: 1,
            command: rejected.clone(),
            issues: issues.clone(),
            accepted: false,
        }];
        let message =
            format_refine_prompt(&step, "Submit", &rejected, &issues, "<form>", 4_000, &history);
        assert!(message.contains("## Rejected Command"));
        assert!(message.contains("[not-found]"));
        assert!(message.contains("Previously Rejected Attempts"));
    }

    #[test]
    fn test_format_healing_prompt_ranks_locators() {
        let context = FailureContext {
            test_id: TestId::from("login-test"),
            error: "selector not found: .logo".to_string(),
            failed_command: None,
            category: crate::model::FailureCategory::LocatorNotFound,
            screenshot: None,
            snapshot: None,
            ranked_locators: vec!["[data-testid=\"logo\"]".to_string(), ".site-logo".to_string()],
            timestamp: Utc::now(),
        };
        let message = format_healing_prompt("[]", &context, &[]);
        assert!(message.contains("Available Locators"));
        assert!(message.contains("[data-testid=\"logo\"]"));
        assert!(message.contains("category: locator-not-found"));
    }

    #[test]
    fn test_truncate_snapshot_bound() {
        let text = "x".repeat(50);
        let truncated = truncate_snapshot(&text, 10);
        assert!(truncated.starts_with("xxxxxxxxxx"));
        assert!(truncated.contains("[snapshot truncated]"));
        assert_eq!(truncate_snapshot("short", 10), "short");
    }
}
