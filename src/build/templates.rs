// ABOUTME: Dockerfile template catalogue, heuristic selection, and generation.
// ABOUTME: Selection is a deterministic score over language, framework, dependencies, and config files.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::result::{ErrorCategory, StageError};

pub const TEMPLATE_PREFIX: &str = "dockerfile-";
pub const FALLBACK_TEMPLATE: &str = "dockerfile-generic";
pub const DOCKERFILE: &str = "Dockerfile";

/// One entry of the built-in catalogue.
#[derive(Debug)]
pub struct Template {
    pub name: &'static str,
    pub description: &'static str,
    languages: &'static [&'static str],
    related: &'static [&'static str],
    frameworks: &'static [&'static str],
    dependencies: &'static [&'static str],
    config_files: &'static [&'static str],
    pub dockerfile: &'static str,
}

static CATALOGUE: &[Template] = &[
    Template {
        name: "dockerfile-python",
        description: "Python application on python:3.12-slim",
        languages: &["python"],
        related: &[],
        frameworks: &["flask", "django", "fastapi", "streamlit"],
        dependencies: &["flask", "django", "fastapi", "gunicorn", "uvicorn"],
        config_files: &["requirements.txt", "pyproject.toml", "setup.py", "pipfile"],
        dockerfile: include_str!("dockerfiles/python.Dockerfile"),
    },
    Template {
        name: "dockerfile-javascript",
        description: "Node.js application on node:20-alpine",
        languages: &["javascript"],
        related: &["typescript"],
        frameworks: &["express", "next", "nextjs", "nestjs", "react", "vue", "koa"],
        dependencies: &["express", "next", "react", "vue", "koa"],
        config_files: &["package.json"],
        dockerfile: include_str!("dockerfiles/javascript.Dockerfile"),
    },
    Template {
        name: "dockerfile-go",
        description: "Static Go binary on distroless",
        languages: &["go"],
        related: &[],
        frameworks: &["gin", "echo", "fiber", "chi"],
        dependencies: &["github.com/gin-gonic/gin", "github.com/labstack/echo"],
        config_files: &["go.mod"],
        dockerfile: include_str!("dockerfiles/go.Dockerfile"),
    },
    Template {
        name: "dockerfile-java",
        description: "Maven build on Temurin 21",
        languages: &["java"],
        related: &["kotlin", "scala"],
        frameworks: &["spring", "spring-boot", "springboot", "quarkus", "micronaut"],
        dependencies: &["spring-boot-starter-web", "quarkus-core"],
        config_files: &["pom.xml"],
        dockerfile: include_str!("dockerfiles/java.Dockerfile"),
    },
    Template {
        name: "dockerfile-gradle",
        description: "Gradle build on Temurin 21",
        languages: &["kotlin"],
        related: &["java", "scala"],
        frameworks: &["spring", "spring-boot", "springboot", "ktor", "micronaut"],
        dependencies: &["ktor-server-core"],
        config_files: &["build.gradle", "build.gradle.kts", "settings.gradle"],
        dockerfile: include_str!("dockerfiles/gradle.Dockerfile"),
    },
    Template {
        name: "dockerfile-csharp",
        description: ".NET 8 publish on aspnet runtime",
        languages: &["csharp"],
        related: &["fsharp"],
        frameworks: &["aspnet", "aspnetcore", "asp.net"],
        dependencies: &["microsoft.aspnetcore.app"],
        config_files: &[".csproj", ".sln"],
        dockerfile: include_str!("dockerfiles/csharp.Dockerfile"),
    },
    Template {
        name: "dockerfile-ruby",
        description: "Bundler application on ruby:3.3-slim",
        languages: &["ruby"],
        related: &[],
        frameworks: &["rails", "sinatra", "hanami"],
        dependencies: &["rails", "sinatra", "puma"],
        config_files: &["gemfile"],
        dockerfile: include_str!("dockerfiles/ruby.Dockerfile"),
    },
    Template {
        name: "dockerfile-php",
        description: "PHP application on Apache",
        languages: &["php"],
        related: &[],
        frameworks: &["laravel", "symfony"],
        dependencies: &["laravel/framework", "symfony/framework-bundle"],
        config_files: &["composer.json"],
        dockerfile: include_str!("dockerfiles/php.Dockerfile"),
    },
    Template {
        name: "dockerfile-rust",
        description: "Cargo release build on debian slim",
        languages: &["rust"],
        related: &[],
        frameworks: &["actix", "actix-web", "axum", "rocket"],
        dependencies: &["actix-web", "axum", "rocket", "tokio"],
        config_files: &["cargo.toml"],
        dockerfile: include_str!("dockerfiles/rust.Dockerfile"),
    },
    Template {
        name: FALLBACK_TEMPLATE,
        description: "Copy the tree into alpine; start command must be supplied",
        languages: &[],
        related: &[],
        frameworks: &[],
        dependencies: &[],
        config_files: &[],
        dockerfile: include_str!("dockerfiles/generic.Dockerfile"),
    },
];

/// The built-in templates, in tie-break order.
pub fn catalogue() -> &'static [Template] {
    CATALOGUE
}

pub fn find_template(name: &str) -> Option<&'static Template> {
    let name = map_template_name(name);
    CATALOGUE.iter().find(|t| t.name == name)
}

/// Normalize a language name to the catalogue's spelling.
fn canonical_language(language: &str) -> String {
    let lower = language.trim().to_lowercase();
    match lower.as_str() {
        "golang" => "go",
        "js" | "node" | "nodejs" | "node.js" => "javascript",
        "ts" => "typescript",
        "c#" | "dotnet" | ".net" | "cs" => "csharp",
        "py" | "python3" => "python",
        "rb" => "ruby",
        "rs" => "rust",
        "kt" => "kotlin",
        other => other,
    }
    .to_string()
}

/// Map a user-supplied template name to a catalogue name.
///
/// Names already carrying the `dockerfile-` prefix pass through; common
/// language aliases resolve to their template; anything else is prefixed and
/// left for generation to reject.
pub fn map_template_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.starts_with(TEMPLATE_PREFIX) {
        return trimmed.to_string();
    }
    let language = match canonical_language(trimmed).as_str() {
        "typescript" => "javascript".to_string(),
        "maven" => "java".to_string(),
        other => other.to_string(),
    };
    format!("{TEMPLATE_PREFIX}{language}")
}

/// What the caller knows about the repository being containerized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateHints {
    pub language: String,
    pub framework: String,
    pub dependencies: Vec<String>,
    pub config_files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSelection {
    pub template: String,
    /// In `0.0..=1.0`.
    pub score: f64,
    /// Other positive-scoring templates, best first.
    pub suggestions: Vec<String>,
    pub reasoning: Vec<String>,
}

// Scores are kept in hundredths so ties compare exactly.
const EXACT_LANGUAGE: u32 = 60;
const RELATED_LANGUAGE: u32 = 30;
const FRAMEWORK: u32 = 30;
const COMPAT_EACH: u32 = 5;
const COMPAT_MAX: u32 = 10;
const SCORE_MAX: u32 = 100;

fn file_matches(file: &str, hint: &str) -> bool {
    let base = Path::new(file)
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if hint.starts_with('.') {
        base.ends_with(hint)
    } else {
        base == hint
    }
}

fn score(template: &Template, hints: &TemplateHints, language: &str, reasons: &mut Vec<String>) -> u32 {
    let mut points = 0;

    if !language.is_empty() {
        if template.languages.contains(&language) {
            points += EXACT_LANGUAGE;
            reasons.push(format!("language {language} matches {}", template.name));
        } else if template.related.contains(&language) {
            points += RELATED_LANGUAGE;
            reasons.push(format!("language {language} is supported by {}", template.name));
        }
    }

    let framework = hints.framework.trim().to_lowercase();
    if !framework.is_empty() && template.frameworks.contains(&framework.as_str()) {
        points += FRAMEWORK;
        reasons.push(format!("framework {framework} fits {}", template.name));
    }

    let mut compat = 0;
    for dep in &hints.dependencies {
        let dep = dep.trim().to_lowercase();
        if template.dependencies.contains(&dep.as_str()) {
            compat += COMPAT_EACH;
        }
    }
    for file in &hints.config_files {
        if let Some(hint) = template.config_files.iter().find(|h| file_matches(file, h)) {
            compat += COMPAT_EACH;
            reasons.push(format!("config file {file} indicates {} ({hint})", template.name));
        }
    }
    points += compat.min(COMPAT_MAX);

    points.min(SCORE_MAX)
}

/// Pick the best template for `hints`.
///
/// The highest score wins, ties go to the earlier catalogue entry, and the
/// generic template is used when nothing scores.
pub fn select_template(hints: &TemplateHints) -> TemplateSelection {
    let language = canonical_language(&hints.language);

    let mut scored: Vec<(u32, &Template, Vec<String>)> = CATALOGUE
        .iter()
        .filter_map(|t| {
            let mut reasons = Vec::new();
            let points = score(t, hints, &language, &mut reasons);
            (points > 0).then_some((points, t, reasons))
        })
        .collect();
    // Stable sort keeps catalogue order among equal scores.
    scored.sort_by(|a, b| b.0.cmp(&a.0));

    let mut ranked = scored.into_iter();
    let Some((points, best, reasoning)) = ranked.next() else {
        return TemplateSelection {
            template: FALLBACK_TEMPLATE.to_string(),
            score: 0.0,
            suggestions: Vec::new(),
            reasoning: vec![format!("no template matched; using {FALLBACK_TEMPLATE}")],
        };
    };

    TemplateSelection {
        template: best.name.to_string(),
        score: f64::from(points) / f64::from(SCORE_MAX),
        suggestions: ranked.map(|(_, t, _)| t.name.to_string()).collect(),
        reasoning,
    }
}

/// Outcome of writing a Dockerfile into a target directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub success: bool,
    pub template: String,
    pub path: PathBuf,
    pub dockerfile: String,
}

/// Write the named template as `Dockerfile` inside `target_dir`.
pub fn generate_from_template(name: &str, target_dir: &Path) -> Result<GenerationResult, StageError> {
    let mapped = map_template_name(name);
    let template = CATALOGUE.iter().find(|t| t.name == mapped).ok_or_else(|| {
        StageError::new(
            ErrorCategory::Generation,
            format!("unknown template: {name}"),
        )
        .with_target(mapped.clone())
        .with_context("available", catalogue().iter().map(|t| t.name).collect::<Vec<_>>())
    })?;

    let dir_display = target_dir.display().to_string();
    match std::fs::metadata(target_dir) {
        Ok(meta) if meta.is_dir() => {}
        Ok(_) => {
            return Err(StageError::new(
                ErrorCategory::Directory,
                format!("target path is not a directory: {dir_display}"),
            )
            .with_target(dir_display));
        }
        Err(e) => {
            return Err(StageError::new(
                ErrorCategory::Directory,
                format!("target directory is not accessible: {dir_display}: {e}"),
            )
            .with_target(dir_display));
        }
    }

    let path = target_dir.join(DOCKERFILE);
    std::fs::write(&path, template.dockerfile).map_err(|e| {
        StageError::new(
            ErrorCategory::Generation,
            format!("failed to write {}: {e}", path.display()),
        )
        .with_target(path.display().to_string())
    })?;

    tracing::debug!(template = template.name, path = %path.display(), "wrote Dockerfile");

    Ok(GenerationResult {
        success: true,
        template: template.name.to_string(),
        path,
        dockerfile: template.dockerfile.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::lint::validate_build_spec;

    fn hints(language: &str, framework: &str, files: &[&str]) -> TemplateHints {
        TemplateHints {
            language: language.into(),
            framework: framework.into(),
            dependencies: Vec::new(),
            config_files: files.iter().map(|f| f.to_string()).collect(),
        }
    }

    #[test]
    fn aliases_map_to_catalogue_names() {
        assert_eq!(map_template_name("golang"), "dockerfile-go");
        assert_eq!(map_template_name("Node"), "dockerfile-javascript");
        assert_eq!(map_template_name("typescript"), "dockerfile-javascript");
        assert_eq!(map_template_name("C#"), "dockerfile-csharp");
        assert_eq!(map_template_name("dockerfile-rust"), "dockerfile-rust");
        assert_eq!(map_template_name("cobol"), "dockerfile-cobol");
        assert!(find_template("cobol").is_none());
        assert!(find_template("maven").is_some());
    }

    #[test]
    fn every_template_lints_clean() {
        for template in catalogue() {
            let report = validate_build_spec(template.dockerfile);
            assert!(
                report.valid && report.issues.is_empty(),
                "{}: {:?}",
                template.name,
                report.issues
            );
        }
    }

    #[test]
    fn exact_language_and_framework_wins() {
        let selection = select_template(&hints("Python", "flask", &["requirements.txt"]));
        assert_eq!(selection.template, "dockerfile-python");
        assert!((selection.score - 0.95).abs() < f64::EPSILON);
        assert!(selection.suggestions.is_empty());
        assert_eq!(selection.reasoning.len(), 3);
    }

    #[test]
    fn gradle_file_breaks_java_tie() {
        let maven = select_template(&hints("java", "spring-boot", &[]));
        assert_eq!(maven.template, "dockerfile-java");
        assert_eq!(maven.suggestions, ["dockerfile-gradle"]);

        let gradle = select_template(&hints("kotlin", "", &["app/build.gradle.kts"]));
        assert_eq!(gradle.template, "dockerfile-gradle");
        assert_eq!(gradle.suggestions, ["dockerfile-java"]);
    }

    #[test]
    fn config_files_alone_select_a_template() {
        let selection = select_template(&hints("", "", &["go.mod"]));
        assert_eq!(selection.template, "dockerfile-go");
        assert!((selection.score - 0.05).abs() < f64::EPSILON);

        let selection = select_template(&hints("", "", &["src/Api/Api.csproj"]));
        assert_eq!(selection.template, "dockerfile-csharp");
    }

    #[test]
    fn dependency_bonus_is_capped() {
        let mut h = hints("rust", "axum", &["Cargo.toml"]);
        h.dependencies = vec!["axum".into(), "tokio".into(), "rocket".into()];
        assert_eq!(select_template(&h).score, 1.0);
    }

    #[test]
    fn nothing_scores_falls_back_to_generic() {
        let selection = select_template(&hints("cobol", "", &["Makefile"]));
        assert_eq!(selection.template, FALLBACK_TEMPLATE);
        assert_eq!(selection.score, 0.0);
        assert!(selection.suggestions.is_empty());
    }

    #[test]
    fn generation_writes_dockerfile() {
        let dir = tempfile::tempdir().unwrap();
        let result = generate_from_template("go", dir.path()).unwrap();
        assert_eq!(result.template, "dockerfile-go");
        let written = std::fs::read_to_string(dir.path().join("Dockerfile")).unwrap();
        assert_eq!(written, result.dockerfile);
    }

    #[test]
    fn unknown_template_is_generation_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_from_template("cobol", dir.path()).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Generation);
        assert!(!dir.path().join("Dockerfile").exists());
    }

    #[test]
    fn missing_directory_is_directory_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_from_template("python", &dir.path().join("absent")).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Directory);
    }

    #[test]
    fn unknown_template_wins_over_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = generate_from_template("cobol", &dir.path().join("absent")).unwrap_err();
        assert_eq!(err.category, ErrorCategory::Generation);
    }
}
