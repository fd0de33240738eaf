// ABOUTME: Parsers for kubectl apply output and `get pods -o wide` tables.
// ABOUTME: Best-effort text contracts; unrecognized lines are skipped.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceStatus {
    Created,
    Configured,
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Created => f.write_str("created"),
            ResourceStatus::Configured => f.write_str("configured"),
        }
    }
}

/// One resource reported by `kubectl apply`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedResource {
    pub kind: String,
    pub name: String,
    pub status: ResourceStatus,
}

/// Parse lines like `deployment.apps/my-app created`.
///
/// Only lines whose first field is `<kind>[.<group>]/<name>` and that mention
/// `created` or `configured` produce a resource.
pub fn parse_apply_output(output: &str) -> Vec<DeployedResource> {
    output
        .lines()
        .filter_map(|line| {
            let status = if line.contains("configured") {
                ResourceStatus::Configured
            } else if line.contains("created") {
                ResourceStatus::Created
            } else {
                return None;
            };
            let (qualified, name) = line.split_whitespace().next()?.split_once('/')?;
            if name.contains('/') {
                return None;
            }
            let kind = qualified.split('.').next().unwrap_or(qualified);
            if kind.is_empty() || name.is_empty() {
                return None;
            }
            Some(DeployedResource {
                kind: kind.to_string(),
                name: name.to_string(),
                status,
            })
        })
        .collect()
}

/// One row of `kubectl get pods -o wide`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodStatus {
    pub name: String,
    /// Ready ratio as printed, e.g. `1/2`.
    pub ready: String,
    pub status: String,
    pub restarts: u32,
    pub age: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

impl PodStatus {
    /// `(ready, total)` containers, when the ratio parses.
    pub fn ready_counts(&self) -> Option<(u32, u32)> {
        let (ready, total) = self.ready.split_once('/')?;
        Some((ready.parse().ok()?, total.parse().ok()?))
    }

    /// Every container is ready, or the pod reports a Running phase.
    pub fn is_ready(&self) -> bool {
        let complete = matches!(self.ready_counts(), Some((ready, total)) if total > 0 && ready == total);
        complete || self.status.contains("Running")
    }
}

fn optional(field: Option<&str>) -> Option<String> {
    field
        .filter(|f| !matches!(*f, "<none>" | "<pending>"))
        .map(str::to_string)
}

/// Parse the tabular pod list. Header and malformed rows are skipped.
pub fn parse_pod_list(output: &str) -> Vec<PodStatus> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with("NAME"))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let name = fields.next()?;
            let ready = fields.next()?;
            let status = fields.next()?;
            let restarts = fields.next()?.parse().ok()?;

            let mut next = fields.next()?;
            // `3 (2m ago)` spills the last-restart age over two fields.
            if next.starts_with('(') {
                while !next.ends_with(')') {
                    next = fields.next()?;
                }
                next = fields.next()?;
            }
            let age = next;

            Some(PodStatus {
                name: name.to_string(),
                ready: ready.to_string(),
                status: status.to_string(),
                restarts,
                age: age.to_string(),
                ip: optional(fields.next()),
                node: optional(fields.next()),
            })
        })
        .collect()
}
