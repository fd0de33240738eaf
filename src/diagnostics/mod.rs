// ABOUTME: Diagnostic extraction and error categorization over kubectl text output.
// ABOUTME: Pure functions; only invoked on the failure path.

mod categorize;
mod describe;
mod events;

pub use categorize::{categorize_error, categorize_with_fallback};
pub use describe::{Section, extract_essential_pod_info};
pub use events::filter_relevant_events;

/// The last `lines` lines of `text`, for failure excerpts.
pub fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}
