// ABOUTME: Section-tracking scanner over `describe pod` text.
// ABOUTME: Keeps container state, conditions, and failure events; drops the rest.

/// Where the scanner currently is inside a describe document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    Outside,
    Containers,
    Conditions,
    Events,
}

/// Line prefixes that switch sections. Exit markers return to `Outside`.
const TRANSITIONS: &[(&str, Section)] = &[
    ("Containers:", Section::Containers),
    ("Conditions:", Section::Conditions),
    ("Events:", Section::Events),
    ("Volumes:", Section::Outside),
    ("QoS Class:", Section::Outside),
    ("Node-Selectors:", Section::Outside),
    ("Tolerations:", Section::Outside),
];

/// Retained in every section.
const ALWAYS_KEYS: &[&str] = &["Status:", "Reason:", "Message:"];

const CONTAINER_KEYS: &[&str] = &[
    "State:",
    "Last State:",
    "Ready:",
    "Restart Count:",
    "Image:",
    "Reason:",
    "Exit Code:",
    "Started:",
    "Finished:",
];

const EVENT_KEYS: &[&str] = &[
    "Failed",
    "Error",
    "Warning",
    "BackOff",
    "ImagePull",
    "Started",
    "Created",
];

impl Section {
    /// The section entered by `line`, if it is a section marker.
    pub fn transition(line: &str) -> Option<Section> {
        TRANSITIONS
            .iter()
            .find(|(marker, _)| line.starts_with(marker))
            .map(|(_, next)| *next)
    }

    /// Whether `line` (already trimmed) is worth keeping while in this section.
    pub fn retains(self, line: &str) -> bool {
        if line.is_empty() {
            return false;
        }
        if contains_any(line, ALWAYS_KEYS) {
            return true;
        }
        match self {
            Section::Outside => false,
            Section::Containers => contains_any(line, CONTAINER_KEYS),
            Section::Conditions => true,
            Section::Events => contains_any(line, EVENT_KEYS),
        }
    }
}

fn contains_any(line: &str, keys: &[&str]) -> bool {
    keys.iter().any(|k| line.contains(k))
}

/// Extract the lines of a pod description that explain why it is not ready.
///
/// Returns an empty string when nothing relevant was found.
pub fn extract_essential_pod_info(describe: &str, pod_name: &str) -> String {
    let mut section = Section::Outside;
    let mut essential = Vec::new();

    for line in describe.lines().map(str::trim) {
        if let Some(next) = Section::transition(line) {
            section = next;
            continue;
        }
        if section.retains(line) {
            essential.push(format!("  {line}"));
        }
    }

    tracing::debug!(pod = pod_name, lines = essential.len(), "extracted pod diagnostics");
    essential.join("\n")
}
