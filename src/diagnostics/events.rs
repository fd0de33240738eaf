// ABOUTME: Keyword filter over `get events` tabular output.
// ABOUTME: Keeps problem and lifecycle lines in input order, drops the header.

/// Substrings that make an event line worth keeping.
const RELEVANT_EVENT_KEYWORDS: &[&str] = &[
    "Failed",
    "Error",
    "Warning",
    "BackOff",
    "Unhealthy",
    "ImagePull",
    "Created container",
    "Started container",
    "Pulled",
];

const HEADER_MARKER: &str = "LAST SEEN";

/// Keep only event lines that mention a failure or container lifecycle step.
///
/// Lines are trimmed and re-indented by two spaces, so applying the filter to
/// its own output yields the same text.
pub fn filter_relevant_events(events: &str) -> String {
    events
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains(HEADER_MARKER))
        .filter(|line| RELEVANT_EVENT_KEYWORDS.iter().any(|k| line.contains(k)))
        .map(|line| format!("  {line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
