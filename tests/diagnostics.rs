// ABOUTME: Property and fixture tests for the diagnostic extractor and categorizer.
// ABOUTME: The event filter must be idempotent and order-preserving.

mod support;

use dockyard::diagnostics::{categorize_error, extract_essential_pod_info, filter_relevant_events};
use dockyard::result::ErrorCategory;
use proptest::prelude::*;
use support::{DESCRIBE, EVENTS};

#[test]
fn fixture_events_keep_failures_only() {
    let filtered = filter_relevant_events(EVENTS);
    let lines: Vec<&str> = filtered.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].contains("Failed to pull image"));
    assert!(lines[1].contains("BackOff"));
}

#[test]
fn fixture_describe_keeps_container_state_and_conditions() {
    let essential = extract_essential_pod_info(DESCRIBE, "web-7d9f8c6b5-fghij");
    assert!(essential.contains("  Status:           Pending"));
    assert!(essential.contains("  State:          Waiting"));
    assert!(essential.contains("  Ready             False"));
    assert!(essential.contains("Failed to pull image"));
    assert!(!essential.contains("kube-api-access"));
    assert!(!essential.contains("Scheduled"));
}

#[test]
fn categorizer_reads_output_as_well_as_error() {
    assert_eq!(
        categorize_error("exit status 1", "error: You must be logged in to the server (Unauthorized)"),
        ErrorCategory::Auth
    );
    assert_eq!(categorize_error("exit status 1", "something odd"), ErrorCategory::Kubectl);
}

fn event_line() -> impl Strategy<Value = String> {
    let reason = prop::sample::select(vec![
        "Scheduled", "Pulling", "Pulled", "Created", "Started", "Failed", "BackOff", "Unhealthy", "Killing",
    ]);
    let kind = prop::sample::select(vec!["Normal", "Warning"]);
    (reason, kind, "[a-z ]{0,20}").prop_map(|(reason, kind, message)| {
        format!("12s   {kind}   {reason}   pod/web-1   {message}")
    })
}

proptest! {
    #[test]
    fn event_filter_is_idempotent(lines in prop::collection::vec(event_line(), 0..20)) {
        let input = format!("LAST SEEN   TYPE   REASON   OBJECT   MESSAGE\n{}", lines.join("\n"));
        let once = filter_relevant_events(&input);
        prop_assert_eq!(filter_relevant_events(&once), once.clone());

        // Kept lines appear in input order.
        let kept: Vec<&str> = once.lines().map(str::trim).collect();
        let expected: Vec<&str> = lines.iter().map(|l| l.trim()).filter(|l| kept.contains(l)).collect();
        prop_assert_eq!(kept, expected);
    }
}
