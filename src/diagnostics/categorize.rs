// ABOUTME: Maps kubectl error text to the flat failure taxonomy.
// ABOUTME: Earlier rows of the precedence table win when several match.

use crate::result::ErrorCategory;

/// Checked top to bottom; the first row with a matching pattern decides.
const PRECEDENCE: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Cluster,
        &["connection refused", "unable to connect"],
    ),
    (ErrorCategory::Auth, &["unauthorized", "forbidden"]),
    (ErrorCategory::Validation, &["validation", "invalid"]),
    (ErrorCategory::Timeout, &["timeout"]),
];

/// Categorize a kubectl failure from its error text and captured output.
///
/// Unrecognized failures are `kubectl_error`.
pub fn categorize_error(err: &str, output: &str) -> ErrorCategory {
    categorize_with_fallback(err, output, ErrorCategory::Kubectl)
}

/// Same as [`categorize_error`] with a caller-chosen default.
pub fn categorize_with_fallback(err: &str, output: &str, fallback: ErrorCategory) -> ErrorCategory {
    let haystack = format!("{err}\n{output}").to_lowercase();
    PRECEDENCE
        .iter()
        .find(|(_, patterns)| patterns.iter().any(|p| haystack.contains(p)))
        .map(|(category, _)| *category)
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_failures_are_cluster_errors() {
        let category = categorize_error(
            "exit status 1",
            "The connection to the server localhost:8080 was refused - did you specify the right host or port?\nUnable to connect to the server: dial tcp: connection refused",
        );
        assert_eq!(category, ErrorCategory::Cluster);
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert_eq!(
            categorize_error("", "Error from server (Forbidden): pods is forbidden"),
            ErrorCategory::Auth
        );
        assert_eq!(
            categorize_error("Unauthorized", ""),
            ErrorCategory::Auth
        );
    }

    #[test]
    fn auth_outranks_timeout() {
        assert_eq!(
            categorize_error("request timeout", "error: You must be logged in (Unauthorized)"),
            ErrorCategory::Auth
        );
    }

    #[test]
    fn cluster_outranks_everything() {
        assert_eq!(
            categorize_error("unauthorized", "unable to connect to the server: i/o timeout"),
            ErrorCategory::Cluster
        );
    }

    #[test]
    fn invalid_manifest_is_validation_error() {
        assert_eq!(
            categorize_error(
                "exit status 1",
                "error: error validating \"app.yaml\": error validating data: invalid type"
            ),
            ErrorCategory::Validation
        );
    }

    #[test]
    fn timed_out_wording_is_not_a_timeout_keyword() {
        assert_eq!(
            categorize_error(
                "exit status 1",
                "error: timed out waiting for the condition on deployments/web"
            ),
            ErrorCategory::Kubectl
        );
        assert_eq!(
            categorize_error("exit status 1", "Unable to connect: i/o timeout"),
            ErrorCategory::Cluster
        );
        assert_eq!(
            categorize_error("context deadline exceeded (Client.Timeout exceeded)", ""),
            ErrorCategory::Timeout
        );
    }

    #[test]
    fn unknown_text_uses_fallback() {
        assert_eq!(
            categorize_error("exit status 1", "something odd"),
            ErrorCategory::Kubectl
        );
        assert_eq!(
            categorize_with_fallback("denied: requested access", "", ErrorCategory::Build),
            ErrorCategory::Build
        );
    }
}
