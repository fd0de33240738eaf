// ABOUTME: Static checks over generated Dockerfile text.
// ABOUTME: Best-effort lint; callers record issues without blocking the build.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const INSTRUCTIONS: &[&str] = &[
    "FROM",
    "RUN",
    "CMD",
    "LABEL",
    "MAINTAINER",
    "EXPOSE",
    "ENV",
    "ADD",
    "COPY",
    "ENTRYPOINT",
    "VOLUME",
    "USER",
    "WORKDIR",
    "ARG",
    "ONBUILD",
    "STOPSIGNAL",
    "HEALTHCHECK",
    "SHELL",
];

static PORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(/tcp|/udp)?$").expect("port pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintIssue {
    pub code: String,
    pub message: String,
    pub severity: Severity,
    /// 1-based line where the instruction starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    pub valid: bool,
    pub issues: Vec<LintIssue>,
}

impl LintReport {
    pub fn errors(&self) -> impl Iterator<Item = &LintIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LintIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// One issue per line, errors first.
    pub fn summary(&self) -> String {
        self.errors()
            .chain(self.warnings())
            .map(|issue| match issue.line {
                Some(line) => format!("line {line}: {}", issue.message),
                None => issue.message.clone(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A logical instruction after joining `\` continuations.
struct Instruction {
    keyword: String,
    args: Vec<String>,
    text: String,
    line: usize,
}

fn instructions(dockerfile: &str) -> Vec<Instruction> {
    let mut out = Vec::new();
    let mut pending: Option<(usize, String)> = None;

    for (idx, raw) in dockerfile.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (body, continues) = match trimmed.strip_suffix('\\') {
            Some(body) => (body.trim_end(), true),
            None => (trimmed, false),
        };
        let (start, mut text) = pending.take().unwrap_or((idx + 1, String::new()));
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(body);
        if continues {
            pending = Some((start, text));
        } else {
            out.push(instruction(start, text));
        }
    }
    if let Some((start, text)) = pending {
        out.push(instruction(start, text));
    }
    out
}

fn instruction(line: usize, text: String) -> Instruction {
    let mut words = text.split_whitespace().map(str::to_string);
    let keyword = words.next().unwrap_or_default().to_uppercase();
    Instruction {
        keyword,
        args: words.collect(),
        text,
        line,
    }
}

struct Linter {
    issues: Vec<LintIssue>,
    stages: Vec<String>,
}

impl Linter {
    fn error(&mut self, code: &str, message: impl Into<String>, line: Option<usize>) {
        self.push(code, message, line, Severity::Error);
    }

    fn warn(&mut self, code: &str, message: impl Into<String>, line: Option<usize>) {
        self.push(code, message, line, Severity::Warning);
    }

    fn push(&mut self, code: &str, message: impl Into<String>, line: Option<usize>, severity: Severity) {
        self.issues.push(LintIssue {
            code: code.to_string(),
            message: message.into(),
            severity,
            line,
        });
    }

    fn check(&mut self, ins: &Instruction) {
        let line = Some(ins.line);
        match ins.keyword.as_str() {
            "FROM" => self.check_from(ins),
            "RUN" => {
                if ins.text.contains("apt-get install") {
                    if !ins.text.contains("apt-get update") {
                        self.warn("RUN_APT_UPDATE", "apt-get install should be preceded by apt-get update", line);
                    }
                    if !ins.text.contains("rm -rf /var/lib/apt/lists/*") {
                        self.warn("RUN_CACHE_CLEANUP", "package manager cache is not cleaned up", line);
                    }
                }
            }
            "COPY" | "ADD" => {
                let paths: Vec<&String> = ins.args.iter().filter(|a| !a.starts_with("--")).collect();
                if paths.len() < 2 {
                    self.error(
                        &format!("{}_MISSING_ARGS", ins.keyword),
                        format!("{} instruction requires source and destination", ins.keyword),
                        line,
                    );
                } else if ins.keyword == "ADD"
                    && !ins.text.contains("http")
                    && !paths[0].ends_with(".tar")
                    && !paths[0].ends_with(".tar.gz")
                {
                    self.warn("ADD_VS_COPY", "COPY is preferred over ADD for plain files", line);
                }
            }
            "EXPOSE" => {
                if ins.args.is_empty() {
                    self.error("EXPOSE_MISSING_PORT", "EXPOSE instruction requires a port number", line);
                }
                for port in &ins.args {
                    if !PORT.is_match(port) {
                        self.error("EXPOSE_INVALID_PORT", format!("invalid port format: {port}"), line);
                    }
                }
            }
            "USER" => match ins.args.first().map(String::as_str) {
                None => self.error("USER_MISSING_ARGS", "USER instruction requires a username or UID", line),
                Some("root") | Some("0") => self.warn("USER_ROOT", "running as root user", line),
                Some(_) => {}
            },
            "WORKDIR" => match ins.args.first() {
                None => self.error("WORKDIR_MISSING_ARGS", "WORKDIR instruction requires a directory path", line),
                Some(dir) if !dir.starts_with('/') && !dir.starts_with('$') => {
                    self.warn("WORKDIR_RELATIVE", "WORKDIR should use an absolute path", line)
                }
                Some(_) => {}
            },
            "CMD" | "ENTRYPOINT" => {
                if ins.args.is_empty() {
                    self.error(
                        &format!("{}_MISSING_COMMAND", ins.keyword),
                        format!("{} instruction requires a command", ins.keyword),
                        line,
                    );
                }
            }
            known if INSTRUCTIONS.contains(&known) => {}
            unknown => self.error("UNKNOWN_INSTRUCTION", format!("unknown instruction: {unknown}"), line),
        }
    }

    fn check_from(&mut self, ins: &Instruction) {
        let line = Some(ins.line);
        let mut args = ins.args.iter().filter(|a| !a.starts_with("--"));
        let Some(image) = args.next() else {
            self.error("FROM_MISSING_IMAGE", "FROM instruction requires an image name", line);
            return;
        };

        let is_stage = self.stages.iter().any(|s| s.eq_ignore_ascii_case(image));
        let unpinned = image.ends_with(":latest") || !image.contains(':');
        if unpinned && !is_stage && image != "scratch" && !image.starts_with('$') {
            self.warn("FROM_LATEST_TAG", format!("base image {image} is not pinned to a version tag"), line);
        }

        if let (Some(kw), Some(alias)) = (args.next(), args.next())
            && kw.eq_ignore_ascii_case("as")
        {
            self.stages.push(alias.clone());
        }
    }
}

/// Lint Dockerfile text. `valid` is false only when an error-severity issue exists.
pub fn validate_build_spec(dockerfile: &str) -> LintReport {
    let mut linter = Linter {
        issues: Vec::new(),
        stages: Vec::new(),
    };

    if dockerfile.trim().is_empty() {
        linter.error("EMPTY_DOCKERFILE", "Dockerfile is empty", None);
        return LintReport {
            valid: false,
            issues: linter.issues,
        };
    }

    let parsed = instructions(dockerfile);
    match parsed.iter().find(|i| i.keyword != "ARG") {
        None => linter.error("NO_INSTRUCTIONS", "Dockerfile contains no instructions", None),
        Some(first) if first.keyword != "FROM" => linter.error(
            "NO_FROM",
            "Dockerfile must start with a FROM instruction",
            Some(first.line),
        ),
        Some(_) => {}
    }

    for ins in &parsed {
        linter.check(ins);
    }

    for keyword in ["CMD", "ENTRYPOINT"] {
        let count = parsed.iter().filter(|i| i.keyword == keyword).count();
        if count > 1 {
            linter.warn(
                &format!("MULTIPLE_{keyword}"),
                format!("{count} {keyword} instructions found; only the last one takes effect"),
                None,
            );
        }
    }

    let valid = !linter.issues.iter().any(|i| i.severity == Severity::Error);
    LintReport {
        valid,
        issues: linter.issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(report: &LintReport) -> Vec<&str> {
        report.issues.iter().map(|i| i.code.as_str()).collect()
    }

    #[test]
    fn clean_dockerfile_has_no_issues() {
        let report = validate_build_spec(
            "FROM python:3.12-slim\nWORKDIR /app\nCOPY . .\nEXPOSE 8000/tcp\nUSER app\nCMD [\"python\", \"main.py\"]\n",
        );
        assert!(report.valid);
        assert!(report.issues.is_empty(), "{:?}", report.issues);
    }

    #[test]
    fn empty_file_is_invalid() {
        let report = validate_build_spec("  \n");
        assert!(!report.valid);
        assert_eq!(codes(&report), ["EMPTY_DOCKERFILE"]);
    }

    #[test]
    fn comments_only_has_no_instructions() {
        let report = validate_build_spec("# nothing here\n\n");
        assert_eq!(codes(&report), ["NO_INSTRUCTIONS"]);
    }

    #[test]
    fn must_start_with_from_after_args() {
        assert!(validate_build_spec("ARG VERSION=3.12\nFROM python:${VERSION}\n").valid);
        let report = validate_build_spec("RUN echo hi\nFROM alpine:3.20\n");
        assert!(!report.valid);
        assert!(codes(&report).contains(&"NO_FROM"));
    }

    #[test]
    fn continuation_lines_form_one_instruction() {
        let report = validate_build_spec(
            "FROM debian:12\nRUN apt-get update && \\\n    apt-get install -y curl && \\\n    rm -rf /var/lib/apt/lists/*\n",
        );
        assert!(report.issues.is_empty(), "{:?}", report.issues);
    }

    #[test]
    fn apt_install_without_update_warns_but_stays_valid() {
        let report = validate_build_spec("FROM debian:12\nRUN apt-get install -y curl\n");
        assert!(report.valid);
        assert_eq!(codes(&report), ["RUN_APT_UPDATE", "RUN_CACHE_CLEANUP"]);
        assert_eq!(report.issues[0].line, Some(2));
    }

    #[test]
    fn argument_errors() {
        let report = validate_build_spec("FROM alpine:3.20\nCOPY app\nEXPOSE http\nUSER\nWORKDIR\nCMD\nFOO bar\n");
        assert!(!report.valid);
        assert_eq!(
            codes(&report),
            [
                "COPY_MISSING_ARGS",
                "EXPOSE_INVALID_PORT",
                "USER_MISSING_ARGS",
                "WORKDIR_MISSING_ARGS",
                "CMD_MISSING_COMMAND",
                "UNKNOWN_INSTRUCTION"
            ]
        );
    }

    #[test]
    fn style_warnings() {
        let report = validate_build_spec(
            "FROM node\nADD app.js /srv/\nUSER root\nWORKDIR srv\nCMD a\nCMD b\n",
        );
        assert!(report.valid);
        assert_eq!(
            codes(&report),
            ["FROM_LATEST_TAG", "ADD_VS_COPY", "USER_ROOT", "WORKDIR_RELATIVE", "MULTIPLE_CMD"]
        );
    }

    #[test]
    fn stage_references_are_not_unpinned_images() {
        let report = validate_build_spec(
            "FROM golang:1.22 AS builder\nRUN go build -o /out/app\nFROM builder\nFROM gcr.io/distroless/static:nonroot\nCOPY --from=builder /out/app /app\n",
        );
        assert!(report.issues.is_empty(), "{:?}", report.issues);
    }

    #[test]
    fn summary_lists_errors_first() {
        let report = validate_build_spec("FROM node\nEXPOSE abc\n");
        let summary = report.summary();
        assert!(summary.starts_with("line 2: invalid port format: abc"));
        assert!(summary.contains("line 1: base image node"));
    }
}
